//! One-shot tool listing: handshake with the target, print what stays visible

use std::collections::VecDeque;

use serde_json::Value;
use tokio::process::ChildStdout;
use toolmask_policy::ProxyConfig;
use toolmask_proxy::{
    parse_tool_list, FrameReader, InitializeParams, JsonRpcMessage, JsonRpcRequest,
    JsonRpcResponse, MessageKind, ToolDescriptor, ToolFilter, METHOD_INITIALIZE,
    METHOD_TOOLS_LIST, NOTIFICATION_INITIALIZED,
};
use tracing::{debug, info};

use crate::error::RuntimeError;
use crate::process::{ChildInput, ChildProcessManager};

pub const INITIALIZE_REQUEST_ID: u64 = 1;
pub const TOOLS_LIST_REQUEST_ID: u64 = 2;

/// Shown in place of a missing tool description
pub const NO_DESCRIPTION: &str = "No description available";

/// Runs `initialize` + `tools/list` against the target and filters the answer
pub struct Lister {
    config: ProxyConfig,
    filter: ToolFilter,
    manager: ChildProcessManager,
}

impl Lister {
    pub fn new(config: ProxyConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let filter = ToolFilter::from_config(&config)?;
        Ok(Self {
            config,
            filter,
            manager: ChildProcessManager::new(),
        })
    }

    /// Fetch the visible tools. The target is stopped before this returns,
    /// whatever the outcome.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, RuntimeError> {
        let result = match self.config.list_timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange())
                .await
                .unwrap_or(Err(RuntimeError::Timeout(limit))),
            None => self.exchange().await,
        };
        self.manager.stop().await;
        result
    }

    /// Whether a target process is currently held
    pub fn is_running(&self) -> bool {
        self.manager.is_running()
    }

    async fn exchange(&mut self) -> Result<Vec<ToolDescriptor>, RuntimeError> {
        let handle = self.manager.start(&self.config)?;
        let input = handle.input();
        let output = handle.take_output().ok_or(RuntimeError::NotRunning)?;
        let mut responses = ResponseReader::new(output);

        let params = InitializeParams::new(&self.config.server_name, &self.config.server_version);
        send(
            &input,
            &JsonRpcRequest::new(
                INITIALIZE_REQUEST_ID,
                METHOD_INITIALIZE,
                Some(serde_json::to_value(params).map_err(toolmask_proxy::ProxyError::from)?),
            ),
        )
        .await?;

        let init = responses.next_response().await?;
        if let Some(error) = init.error {
            return Err(RuntimeError::InitializeFailed(error.message));
        }
        debug!("Target server initialized: {:?}", init.result);

        send(&input, &JsonRpcRequest::notification(NOTIFICATION_INITIALIZED, None)).await?;
        send(
            &input,
            &JsonRpcRequest::new(TOOLS_LIST_REQUEST_ID, METHOD_TOOLS_LIST, None),
        )
        .await?;

        let expected_id = Value::from(TOOLS_LIST_REQUEST_ID);
        let listing = loop {
            let response = responses.next_response().await?;
            if response.id.as_ref() == Some(&expected_id) {
                break response;
            }
            debug!("Skipping response with id {:?}", response.id);
        };

        if let Some(error) = listing.error {
            return Err(RuntimeError::ToolsListFailed(error.message));
        }
        let result = listing.result.unwrap_or(Value::Null);
        let tools = parse_tool_list(&result).ok_or_else(|| {
            RuntimeError::InvalidResponse("tools/list result has no tools array".to_string())
        })?;

        let total = tools.len();
        let visible = self.filter.apply_descriptors(tools);
        info!("{} of {} tools visible", visible.len(), total);
        Ok(visible)
    }
}

/// `<name>: <description>`
pub fn format_tool_line(tool: &ToolDescriptor) -> String {
    let description = tool
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(NO_DESCRIPTION);
    format!("{}: {}", tool.name, description)
}

/// One line per tool, in server order
pub fn format_listing(tools: &[ToolDescriptor]) -> Vec<String> {
    tools.iter().map(format_tool_line).collect()
}

async fn send(input: &ChildInput, request: &JsonRpcRequest) -> Result<(), RuntimeError> {
    let mut line = serde_json::to_string(request).map_err(toolmask_proxy::ProxyError::from)?;
    line.push('\n');
    match input.write_all(line.as_bytes()).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(RuntimeError::ServerClosed),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Err(RuntimeError::ServerClosed),
        Err(e) => Err(e.into()),
    }
}

/// Pulls JSON-RPC responses out of the target's stdout, skipping everything else
struct ResponseReader {
    frames: FrameReader<ChildStdout>,
    backlog: VecDeque<String>,
}

impl ResponseReader {
    fn new(output: ChildStdout) -> Self {
        Self {
            frames: FrameReader::new(output),
            backlog: VecDeque::new(),
        }
    }

    async fn next_line(&mut self) -> Result<String, RuntimeError> {
        loop {
            if let Some(line) = self.backlog.pop_front() {
                return Ok(line);
            }
            match self.frames.next_lines().await? {
                Some(lines) => self.backlog.extend(lines),
                None => return Err(RuntimeError::ServerClosed),
            }
        }
    }

    async fn next_response(&mut self) -> Result<JsonRpcResponse, RuntimeError> {
        loop {
            let line = self.next_line().await?;
            if line.trim().is_empty() {
                continue;
            }

            let is_response = JsonRpcMessage::parse(&line).is_some_and(|m| {
                matches!(m.kind(), MessageKind::Response | MessageKind::ErrorResponse)
            });
            if !is_response {
                debug!("Skipping non-response frame from target server");
                continue;
            }

            return serde_json::from_str(&line)
                .map_err(|e| RuntimeError::InvalidResponse(e.to_string()));
        }
    }
}
