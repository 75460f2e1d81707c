//! Structured trade records exchanged with the extension

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Opening or adding to a long position
    #[serde(alias = "long", alias = "BUY", alias = "Buy")]
    Buy,
    /// Closing a long or opening a short position
    #[serde(alias = "short", alias = "SELL", alias = "Sell")]
    Sell,
}

impl TradeSide {
    /// Display label used in remote pages
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            TradeSide::Buy => "Buy",
            TradeSide::Sell => "Sell",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// Ticker symbol
    pub symbol: String,
    /// Buy or sell
    pub side: TradeSide,
    /// Shares or contracts
    pub quantity: f64,
    /// Execution price per unit
    pub price: f64,
    /// Execution time, when the source text included one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    /// Commission and fees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<f64>,
    /// Realized profit or loss
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    /// ISO currency code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Free-form notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Existing remote page; present means update instead of create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notion_page_id: Option<String>,
}

impl TradeRecord {
    /// Gross value (`quantity * price`)
    #[must_use]
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}
