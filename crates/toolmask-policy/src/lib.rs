//! Toolmask Policy - configuration for the tool-hiding MCP proxy
//!
//! Defines which server gets wrapped and which of its tools stay visible.

mod config;
mod error;

pub use config::*;
pub use error::*;
