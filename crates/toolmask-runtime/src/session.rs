//! Interactive proxy session: client <-> toolmask <-> target server

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::ChildStdout;
use tokio::task::JoinHandle;
use toolmask_policy::ProxyConfig;
use toolmask_proxy::{FrameReader, MessageFilter};
use tracing::{debug, info, warn};

use crate::error::RuntimeError;
use crate::process::{ChildInput, ChildProcessManager};

const CLIENT_READ_BUFFER: usize = 8 * 1024;

/// Lifecycle of a [`ProxySession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Which side ended a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed its input
    ClientClosed,
    /// The target server closed its output, usually because it exited
    ServerClosed,
}

/// Traffic counters shared with the pump tasks
#[derive(Debug, Default)]
struct SessionMetrics {
    client_bytes: AtomicU64,
    server_frames: AtomicU64,
    tool_lists_rewritten: AtomicU64,
}

/// Point-in-time copy of the session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Bytes the server accepted from the client. A chunk whose write fails
    /// is not counted.
    pub client_bytes: u64,
    /// Frames relayed from the server to the client
    pub server_frames: u64,
    /// `tools/list` results that went through the filter
    pub tool_lists_rewritten: u64,
}

struct Pumps {
    client_to_server: JoinHandle<()>,
    server_to_client: JoinHandle<()>,
    ended: Option<SessionEnd>,
}

/// Relays one client to one target server.
///
/// Client bytes go to the server untouched. Server output is split into
/// frames and each frame passes through the [`MessageFilter`].
pub struct ProxySession {
    config: ProxyConfig,
    filter: Arc<MessageFilter>,
    manager: ChildProcessManager,
    state: SessionState,
    pumps: Option<Pumps>,
    metrics: Arc<SessionMetrics>,
}

impl ProxySession {
    /// Validate the config and compile its patterns. Nothing is spawned yet.
    pub fn new(config: ProxyConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let filter = MessageFilter::new(&config)?;
        Ok(Self {
            config,
            filter: Arc::new(filter),
            manager: ChildProcessManager::new(),
            state: SessionState::Idle,
            pumps: None,
            metrics: Arc::new(SessionMetrics::default()),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            client_bytes: self.metrics.client_bytes.load(Ordering::Relaxed),
            server_frames: self.metrics.server_frames.load(Ordering::Relaxed),
            tool_lists_rewritten: self.metrics.tool_lists_rewritten.load(Ordering::Relaxed),
        }
    }

    /// Spawn the target and start relaying between it and the process's own stdio
    pub fn start_stdio(&mut self) -> Result<(), RuntimeError> {
        self.start(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Spawn the target and start relaying between it and `client_in`/`client_out`
    pub fn start<R, W>(&mut self, client_in: R, client_out: W) -> Result<(), RuntimeError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match self.state {
            SessionState::Idle => {}
            SessionState::Starting | SessionState::Running => {
                return Err(RuntimeError::ProcessAlreadyRunning)
            }
            SessionState::Stopping | SessionState::Stopped => {
                return Err(RuntimeError::SessionStopped)
            }
        }

        self.state = SessionState::Starting;
        let (input, output) = match self.manager.start(&self.config) {
            Ok(handle) => {
                let input = handle.input();
                let output = handle.take_output();
                (input, output)
            }
            Err(e) => {
                self.state = SessionState::Stopped;
                return Err(e);
            }
        };
        let Some(output) = output else {
            self.state = SessionState::Stopped;
            return Err(RuntimeError::NotRunning);
        };

        let client_to_server = tokio::spawn(pump_client_to_server(
            client_in,
            input,
            self.metrics.clone(),
        ));
        let server_to_client = tokio::spawn(pump_server_to_client(
            output,
            client_out,
            self.filter.clone(),
            self.metrics.clone(),
        ));

        self.pumps = Some(Pumps {
            client_to_server,
            server_to_client,
            ended: None,
        });
        self.state = SessionState::Running;
        info!("Proxy session running for {}", self.config.program());
        Ok(())
    }

    /// Resolve once either direction has finished: the client closed its
    /// input or the server closed its output. `None` if the session is not running.
    pub async fn wait(&mut self) -> Option<SessionEnd> {
        let pumps = self.pumps.as_mut()?;
        if pumps.ended.is_some() {
            return pumps.ended;
        }

        let end = tokio::select! {
            _ = &mut pumps.client_to_server => {
                debug!("Client input closed");
                SessionEnd::ClientClosed
            }
            _ = &mut pumps.server_to_client => {
                debug!("Target server output closed");
                SessionEnd::ServerClosed
            }
        };
        pumps.ended = Some(end);
        pumps.ended
    }

    /// Tear everything down. Idempotent and infallible.
    pub async fn stop(&mut self) {
        if matches!(self.state, SessionState::Idle | SessionState::Stopped) {
            return;
        }

        self.state = SessionState::Stopping;
        if let Some(pumps) = self.pumps.take() {
            pumps.client_to_server.abort();
            pumps.server_to_client.abort();
        }
        self.manager.stop().await;
        self.state = SessionState::Stopped;

        let stats = self.stats();
        debug!(
            "Proxy session stopped: {} client bytes, {} server frames, {} tool lists filtered",
            stats.client_bytes, stats.server_frames, stats.tool_lists_rewritten
        );
    }

    /// `start` + `wait` + `stop`
    pub async fn run<R, W>(
        &mut self,
        client_in: R,
        client_out: W,
    ) -> Result<SessionEnd, RuntimeError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.start(client_in, client_out)?;
        let end = self.wait().await;
        self.stop().await;
        end.ok_or(RuntimeError::SessionStopped)
    }
}

/// Client bytes go to the server exactly as received
async fn pump_client_to_server<R>(
    mut client_in: R,
    server: ChildInput,
    metrics: Arc<SessionMetrics>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CLIENT_READ_BUFFER];
    loop {
        let n = match client_in.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to read client input: {}", e);
                break;
            }
        };

        match server.write_all(&buf[..n]).await {
            Ok(true) => {
                metrics.client_bytes.fetch_add(n as u64, Ordering::Relaxed);
            }
            Ok(false) => {
                debug!("Target server input closed, dropping client pump");
                break;
            }
            Err(e) => {
                warn!("Failed to write to target server: {}", e);
                break;
            }
        }
    }
}

/// Server frames go to the client through the filter, one per line
async fn pump_server_to_client<W>(
    server_out: ChildStdout,
    mut client_out: W,
    filter: Arc<MessageFilter>,
    metrics: Arc<SessionMetrics>,
) where
    W: AsyncWrite + Unpin,
{
    let mut frames = FrameReader::new(server_out);
    loop {
        let lines = match frames.next_lines().await {
            Ok(Some(lines)) => lines,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read target server output: {}", e);
                break;
            }
        };
        if lines.is_empty() {
            continue;
        }

        let mut out = String::new();
        for line in &lines {
            if !line.trim().is_empty() {
                let processed = filter.process(line);
                if matches!(processed, Cow::Owned(_)) {
                    metrics.tool_lists_rewritten.fetch_add(1, Ordering::Relaxed);
                }
                out.push_str(&processed);
            }
            out.push('\n');
        }
        metrics
            .server_frames
            .fetch_add(lines.len() as u64, Ordering::Relaxed);

        let written = async {
            client_out.write_all(out.as_bytes()).await?;
            client_out.flush().await
        };
        if let Err(e) = written.await {
            warn!("Failed to write to client: {}", e);
            break;
        }
    }
}
