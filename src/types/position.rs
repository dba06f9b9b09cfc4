use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// An open position as reported by the bot. `symbol` is unique within the open set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
}

impl Position {
    pub fn is_profitable(&self) -> bool {
        self.pnl >= 0.0
    }
}

/// Wire shape of `GET /positions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// Looks up a position by symbol within one poll result.
pub fn find_position<'a>(positions: &'a [Position], symbol: &str) -> Option<&'a Position> {
    positions.iter().find(|p| p.symbol == symbol)
}
