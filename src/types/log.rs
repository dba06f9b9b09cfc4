use serde::{Deserialize, Serialize};

/// Display tier of a raw log line. Only used for colouring; lines stay opaque strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Default,
}

impl LogLevel {
    /// Case-sensitive substring match; the bot logs in both English and Portuguese.
    pub fn classify(line: &str) -> Self {
        if line.contains("ERROR") || line.contains("ERRO") {
            LogLevel::Error
        } else if line.contains("WARNING") || line.contains("AVISO") {
            LogLevel::Warning
        } else if line.contains("INFO") {
            LogLevel::Info
        } else {
            LogLevel::Default
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLine(pub String);

impl LogLine {
    pub fn level(&self) -> LogLevel {
        LogLevel::classify(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Wire shape of `GET /logs`. The bot reports its own file errors in `error` but still
/// answers 2xx with an empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsResponse {
    #[serde(default)]
    pub logs: Vec<LogLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_order() {
        assert_eq!(LogLevel::classify("2024-01-01 - ERROR - boom"), LogLevel::Error);
        assert_eq!(LogLevel::classify("Erro ao carregar"), LogLevel::Default);
        assert_eq!(LogLevel::classify("ERRO ao obter saldo"), LogLevel::Error);
        assert_eq!(LogLevel::classify("WARNING - slow"), LogLevel::Warning);
        assert_eq!(LogLevel::classify("AVISO: margem"), LogLevel::Warning);
        assert_eq!(LogLevel::classify("INFO - started"), LogLevel::Info);
        assert_eq!(LogLevel::classify("info lowercase"), LogLevel::Default);
        // error wins over info when both appear
        assert_eq!(LogLevel::classify("INFO then ERROR"), LogLevel::Error);
    }

    #[test]
    fn test_logs_response_lines_are_plain_strings() {
        let response: LogsResponse =
            serde_json::from_str(r#"{"logs": ["a INFO", "b WARNING"]}"#).unwrap();
        assert_eq!(response.logs.len(), 2);
        assert_eq!(response.logs[1].level(), LogLevel::Warning);
        assert!(response.error.is_none());
    }
}
