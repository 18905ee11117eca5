//! Runtime error types

use std::time::Duration;

use thiserror::Error;
use toolmask_policy::ConfigError;
use toolmask_proxy::ProxyError;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Target server is already running")]
    ProcessAlreadyRunning,

    #[error("Failed to spawn target server '{command}': {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Target server is not running")]
    NotRunning,

    #[error("Proxy session has already been stopped")]
    SessionStopped,

    #[error("initialize failed: {0}")]
    InitializeFailed(String),

    #[error("tools/list failed: {0}")]
    ToolsListFailed(String),

    #[error("Target server closed its output before responding")]
    ServerClosed,

    #[error("Invalid response from target server: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0:?} waiting for the target server")]
    Timeout(Duration),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
