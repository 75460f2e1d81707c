//! Trade record to Notion page properties

use serde_json::{json, Map, Value};
use tradesync_core::TradeRecord;

/// Notion caps a rich text segment at 2000 characters
const RICH_TEXT_LIMIT: usize = 2000;

/// Database column names the journal template uses
pub mod columns {
    /// Title column
    pub const SYMBOL: &str = "Symbol";
    /// Select column
    pub const SIDE: &str = "Side";
    /// Number column
    pub const QUANTITY: &str = "Quantity";
    /// Number column
    pub const PRICE: &str = "Price";
    /// Date column
    pub const DATE: &str = "Date";
    /// Number column
    pub const FEES: &str = "Fees";
    /// Number column
    pub const PNL: &str = "P&L";
    /// Select column
    pub const CURRENCY: &str = "Currency";
    /// Rich text column
    pub const NOTES: &str = "Notes";
}

fn number(value: f64) -> Value {
    json!({ "number": value })
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

fn rich_text(text: &str) -> Value {
    let content: String = text.chars().take(RICH_TEXT_LIMIT).collect();
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

/// Build the `properties` object for a trade's page
///
/// Optional fields that are absent are left out so an update never clears a
/// value the user entered in Notion.
#[must_use]
pub fn trade_properties(trade: &TradeRecord) -> Value {
    let mut props = Map::new();

    props.insert(
        columns::SYMBOL.to_string(),
        json!({ "title": [{ "text": { "content": trade.symbol } }] }),
    );
    props.insert(columns::SIDE.to_string(), select(trade.side.label()));
    props.insert(columns::QUANTITY.to_string(), number(trade.quantity));
    props.insert(columns::PRICE.to_string(), number(trade.price));

    if let Some(executed_at) = trade.executed_at {
        props.insert(
            columns::DATE.to_string(),
            json!({ "date": { "start": executed_at.to_rfc3339() } }),
        );
    }
    if let Some(fees) = trade.fees {
        props.insert(columns::FEES.to_string(), number(fees));
    }
    if let Some(pnl) = trade.pnl {
        props.insert(columns::PNL.to_string(), number(pnl));
    }
    if let Some(currency) = &trade.currency {
        props.insert(columns::CURRENCY.to_string(), select(&currency.to_uppercase()));
    }
    if let Some(notes) = trade.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        props.insert(columns::NOTES.to_string(), rich_text(notes));
    }

    Value::Object(props)
}
