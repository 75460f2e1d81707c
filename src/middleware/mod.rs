//! Middleware module for the TradeSync HTTP server
//!
//! Provides:
//! - License authentication middleware (key, timestamp, signature)
//! - `LicenseContext` extractor for handlers behind it

pub mod auth;
