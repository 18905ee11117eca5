//! Toolmask Runtime - the parts that own a live MCP server process
//!
//! Spawns the wrapped server, relays traffic through the tool filter, and
//! provides the one-shot tool listing.

mod error;
mod lister;
mod process;
mod session;

pub use error::*;
pub use lister::*;
pub use process::*;
pub use session::*;
