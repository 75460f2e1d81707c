//! Server module for TradeSync
//!
//! Contains the main server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Configuration validation
//! - `init`: Store and client wiring, HTTP run loop

pub mod config;
mod init;
mod loader;
mod validation;

// Re-export public API
pub use init::{build_services, run};
pub use loader::load_config;
