//! Prompt text and model reply decoding

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tradesync_core::TradeRecord;

pub(crate) const PARSE_SYSTEM_PROMPT: &str = "You convert broker trade confirmations, \
statements and tables into JSON. Reply with a single JSON object of the form \
{\"trades\": [{\"symbol\", \"side\" (buy|sell), \"quantity\", \"price\", \"executedAt\" \
(RFC 3339, optional), \"fees\", \"pnl\", \"currency\", \"notes\"}]}. Omit unknown optional \
fields. If the text contains no trades reply {\"error\": \"NOT_TRADE_DATA\", \"message\": \
\"<short reason>\"}.";

pub(crate) const ANALYZE_SYSTEM_PROMPT: &str = "You are a trading coach reviewing a retail \
trader's executions. Reply with a single JSON object of the form {\"summary\": string, \
\"insights\": [string], \"suggestions\": [string], \"score\": number from 0 to 100}. \
If the input cannot be reviewed reply {\"error\": \"<CODE>\", \"message\": \"<short reason>\"}.";

/// Kind of review requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Review of one session's trades
    Session,
    /// Recurring behavior across many trades
    Patterns,
    /// Position sizing and loss control
    Risk,
}

impl AnalysisKind {
    /// Instruction appended to the user message
    #[must_use]
    pub fn focus(&self) -> &'static str {
        match self {
            AnalysisKind::Session => "Review these trades as a single trading session.",
            AnalysisKind::Patterns => "Identify recurring habits and patterns across these trades.",
            AnalysisKind::Risk => "Assess position sizing, risk per trade and loss control.",
        }
    }
}

/// AI-generated trade review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAnalysis {
    /// One-paragraph overview
    pub summary: String,
    /// Observations
    #[serde(default)]
    pub insights: Vec<String>,
    /// Concrete next steps
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Overall score, 0 to 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TradesEnvelope {
    #[serde(default)]
    pub(crate) trades: Vec<TradeRecord>,
}

#[derive(Deserialize)]
struct RejectionReply {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

/// Strip a surrounding markdown code fence (```` ```json … ``` ````), if any
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (`json`) on the opening line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Decode a model reply, surfacing `{error, message}` as [`Error::Rejected`]
pub(crate) fn decode_reply<T: DeserializeOwned>(content: &str) -> Result<T> {
    let json = strip_code_fences(content);
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| Error::InvalidResponse(format!("reply is not JSON: {}", e)))?;

    if value.get("error").is_some_and(serde_json::Value::is_string) {
        let rejection: RejectionReply = serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        return Err(Error::Rejected {
            message: rejection
                .message
                .unwrap_or_else(|| "The model declined the request".to_string()),
            code: rejection.error,
        });
    }

    serde_json::from_value(value).map_err(|e| Error::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```\n{\"a\":1}\n```  \n"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_decode_trades() {
        let reply = "```json\n{\"trades\":[{\"symbol\":\"AAPL\",\"side\":\"long\",\"quantity\":3,\"price\":190}]}\n```";
        let envelope: TradesEnvelope = decode_reply(reply).unwrap();
        assert_eq!(envelope.trades.len(), 1);
        assert_eq!(envelope.trades[0].symbol, "AAPL");
    }

    #[test]
    fn test_decode_rejection() {
        let err = decode_reply::<TradesEnvelope>(
            r#"{"error":"NOT_TRADE_DATA","message":"This looks like a recipe"}"#,
        )
        .unwrap_err();
        match err {
            Error::Rejected { code, message } => {
                assert_eq!(code, "NOT_TRADE_DATA");
                assert_eq!(message, "This looks like a recipe");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_reply::<TradesEnvelope>("Sure! Here are your trades"),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_reply::<TradeAnalysis>(r#"{"insights":[]}"#),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_analysis_kind_serde() {
        let kind: AnalysisKind = serde_json::from_str(r#""patterns""#).unwrap();
        assert_eq!(kind, AnalysisKind::Patterns);
    }
}
