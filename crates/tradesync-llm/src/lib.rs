//! TradeSync LLM - Trade parsing and review
//!
//! This crate wraps an OpenAI-compatible chat completions API:
//! - Client: JSON-mode requests with per-operation timeouts
//! - Reply: Code fence stripping, rejection replies, typed decoding

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod reply;

pub use client::{Completion, LlmClient, LlmConfig, TokenUsage};
pub use error::{Error, Result};
pub use reply::{strip_code_fences, AnalysisKind, TradeAnalysis};
