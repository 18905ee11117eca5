//! Lifecycle of the wrapped MCP server process

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use toolmask_policy::ProxyConfig;
use tracing::{debug, info, warn};

use crate::error::RuntimeError;

/// Writer for the child's stdin.
///
/// Clones share one pipe. Once the manager closes it, writes report `false`
/// instead of failing.
#[derive(Debug, Clone)]
pub struct ChildInput {
    inner: Arc<Mutex<Option<ChildStdin>>>,
}

impl ChildInput {
    fn new(stdin: ChildStdin) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(stdin))),
        }
    }

    /// Write and flush `data`. `Ok(false)` if the pipe has been closed.
    pub async fn write_all(&self, data: &[u8]) -> std::io::Result<bool> {
        let mut guard = self.inner.lock().await;
        match guard.as_mut() {
            Some(stdin) => {
                stdin.write_all(data).await?;
                stdin.flush().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close the pipe so the child sees end of input
    pub async fn close(&self) {
        if let Some(mut stdin) = self.inner.lock().await.take() {
            if let Err(e) = stdin.shutdown().await {
                debug!("Error closing child stdin: {}", e);
            }
        }
    }
}

/// The single live child process
#[derive(Debug)]
pub struct ChildProcessHandle {
    child: Child,
    input: ChildInput,
    output: Option<ChildStdout>,
    program: String,
}

impl ChildProcessHandle {
    /// Shared writer for the child's stdin
    pub fn input(&self) -> ChildInput {
        self.input.clone()
    }

    /// Hand the child's stdout to its one consumer
    pub fn take_output(&mut self) -> Option<ChildStdout> {
        self.output.take()
    }
}

/// Owns at most one child process at a time
#[derive(Debug, Default)]
pub struct ChildProcessManager {
    current: Option<ChildProcessHandle>,
}

impl ChildProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `config.target_command` with piped stdin/stdout and inherited stderr.
    ///
    /// A spawn that the OS only reports later (for example a wrapper script that
    /// fails to exec) shows up as the child closing its output, not as an error here.
    pub fn start(&mut self, config: &ProxyConfig) -> Result<&mut ChildProcessHandle, RuntimeError> {
        if self.current.is_some() {
            return Err(RuntimeError::ProcessAlreadyRunning);
        }
        config.validate()?;

        let program = config.program().to_string();
        let mut child = Command::new(&program)
            .args(&config.target_command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::SpawnFailure {
                command: config.target_command.join(" "),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(RuntimeError::NotRunning)?;
        let stdout = child.stdout.take().ok_or(RuntimeError::NotRunning)?;

        info!("Started target server: {} (pid {:?})", program, child.id());

        Ok(self.current.insert(ChildProcessHandle {
            child,
            input: ChildInput::new(stdin),
            output: Some(stdout),
            program,
        }))
    }

    /// Close stdin, kill and reap the child. Never fails; a no-op when nothing runs.
    pub async fn stop(&mut self) {
        let Some(mut handle) = self.current.take() else {
            return;
        };

        handle.input.close().await;

        if let Err(e) = handle.child.start_kill() {
            debug!("Kill request for {} failed: {}", handle.program, e);
        }

        match handle.child.wait().await {
            Ok(status) => info!("Target server {} exited: {}", handle.program, status),
            Err(e) => warn!("Failed to wait for target server {}: {}", handle.program, e),
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&ChildProcessHandle> {
        self.current.as_ref()
    }
}
