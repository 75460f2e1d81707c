//! TradeSync Notion - Journal database sync
//!
//! This crate talks to the Notion REST API:
//! - Client: Page create/update and OAuth code exchange
//! - Properties: Trade record to page property mapping
//! - Sync: Paced, retrying batch writes of trades

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod properties;
mod sync;

pub use client::{NotionClient, NotionConfig, OAuthToken, MAX_BATCH_SIZE, NOTION_VERSION};
pub use error::{Error, Result};
pub use properties::trade_properties;
