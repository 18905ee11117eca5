//! Toolmask Proxy - JSON-RPC framing and tool-list filtering
//!
//! Pure message handling: splits the byte stream into frames, recognizes
//! `tools/list` results and hides the tools the configuration asks for.
//! Everything else is forwarded untouched.

mod error;
mod filter;
mod framing;
mod pattern;
mod protocol;

pub use error::*;
pub use filter::*;
pub use framing::*;
pub use pattern::*;
pub use protocol::*;
