use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::{Gateway, GatewayError, Method, Resource};
use crate::config::TradingConfig;
use crate::types::{
    ActionAck, BalanceSnapshot, BotStatus, LogLine, LogsResponse, Position, PositionsResponse,
    TestConnectionReport,
};

/// Typed view of the bot's endpoints on top of any [`Gateway`].
#[derive(Clone)]
pub struct BotApi {
    gateway: Arc<dyn Gateway>,
}

impl BotApi {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    async fn get<T: DeserializeOwned>(&self, resource: Resource) -> Result<T, GatewayError> {
        let value = self.gateway.call(&resource, Method::Get, None).await?;
        decode(&resource, value)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        resource: Resource,
        body: Option<Value>,
    ) -> Result<T, GatewayError> {
        let value = self.gateway.call(&resource, Method::Post, body).await?;
        decode(&resource, value)
    }

    pub async fn status(&self) -> Result<BotStatus, GatewayError> {
        self.get(Resource::Status).await
    }

    pub async fn balance(&self) -> Result<BalanceSnapshot, GatewayError> {
        self.get(Resource::Balance).await
    }

    pub async fn positions(&self) -> Result<Vec<Position>, GatewayError> {
        let response: PositionsResponse = self.get(Resource::Positions).await?;
        Ok(response.positions)
    }

    pub async fn logs(&self) -> Result<Vec<LogLine>, GatewayError> {
        let response: LogsResponse = self.get(Resource::Logs).await?;
        Ok(response.logs)
    }

    /// Raw config body; default filling happens at the fallback boundary.
    pub async fn config(&self) -> Result<Value, GatewayError> {
        self.gateway.call(&Resource::Config, Method::Get, None).await
    }

    pub async fn save_config(&self, config: &TradingConfig) -> Result<Value, GatewayError> {
        let body = serde_json::to_value(config)
            .map_err(|e| GatewayError::backend(None, format!("config not serializable: {}", e)))?;
        self.gateway
            .call(&Resource::Config, Method::Post, Some(body))
            .await
    }

    pub async fn start(&self) -> Result<ActionAck, GatewayError> {
        self.post(Resource::Start, None).await
    }

    pub async fn stop(&self) -> Result<ActionAck, GatewayError> {
        self.post(Resource::Stop, None).await
    }

    pub async fn close_position(&self, symbol: &str) -> Result<ActionAck, GatewayError> {
        self.post(Resource::ClosePosition(symbol.to_string()), None)
            .await
    }

    pub async fn test_connection(&self) -> Result<TestConnectionReport, GatewayError> {
        self.post(Resource::TestConnection, None).await
    }

    /// Any 2xx counts; the body is ignored.
    pub async fn health(&self) -> Result<(), GatewayError> {
        self.gateway
            .call(&Resource::Health, Method::Get, None)
            .await
            .map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(resource: &Resource, value: Value) -> Result<T, GatewayError> {
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| {
        GatewayError::backend(None, format!("unexpected {} payload: {}", resource, e))
    })
}
