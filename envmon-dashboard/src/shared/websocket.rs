/// Live feed client: STOMP topic subscription over WebSocket
///
/// Provides automatic reconnection, STOMP heart-beats, and sample decoding.
/// Malformed payloads are dropped here and never reach the dashboard state.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, info, warn};

use super::stomp::{self, Command, Frame, Inbound};
use super::types::Sample;

/// Time allowed between opening the socket and receiving CONNECTED
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a graceful shutdown may take before the task is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const SUBSCRIPTION_ID: &str = "sub-0";

/// Live feed configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint of the STOMP broker
    pub url: String,
    /// Topic to subscribe to
    pub topic: String,
    /// Heart-beat interval offered to the broker, both directions
    pub heartbeat: Duration,
    /// Fixed delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws/websocket".to_string(),
            topic: "/topic/environment".to_string(),
            heartbeat: Duration::from_secs(4),
            reconnect_delay: Duration::from_secs(5),
            channel_buffer_size: 256,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Zero disables heart-beats
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    /// Host announced in the CONNECT frame
    fn virtual_host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Everything the live feed reports to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Sample(Sample),
    Status(ConnectionStatus),
}

/// Errors that end one connection attempt (the client then reconnects)
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("WebSocket error: {0}")]
    Socket(#[from] WsError),

    #[error("STOMP handshake failed: {0}")]
    Handshake(String),

    #[error("broker sent ERROR: {0}")]
    Rejected(String),

    #[error("no data received for {0:?}")]
    Timeout(Duration),
}

/// Why a connection ended without error
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Broker or network closed the socket
    Closed,
    /// Shutdown requested or event receiver dropped
    Stopped,
}

/// Live feed client for environment samples
pub struct LiveFeed {
    config: FeedConfig,
}

impl LiveFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    /// Spawn the reconnecting feed task.
    ///
    /// Events are converted into the consumer's queue type, so the feed can
    /// share one queue with other producers.
    pub fn spawn<E>(self, tx: mpsc::Sender<E>) -> FeedHandle
    where
        E: From<FeedEvent> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(run_feed_loop(self.config, tx, shutdown_rx));

        FeedHandle {
            shutdown_tx,
            task,
        }
    }

    /// Spawn the feed with its own event channel
    pub fn start(self) -> (mpsc::Receiver<FeedEvent>, FeedHandle) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        (rx, self.spawn(tx))
    }
}

/// Owner handle of a running live feed task
#[derive(Debug)]
pub struct FeedHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Ask the feed to DISCONNECT and wait briefly for it, aborting it if it
    /// does not stop in time.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.try_send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task).await.is_err() {
            warn!("Live feed did not stop in time, aborting");
            self.task.abort();
        }
    }

    /// Stop the feed immediately without a STOMP DISCONNECT
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Main feed loop with fixed-delay auto-reconnect
async fn run_feed_loop<E>(
    config: FeedConfig,
    tx: mpsc::Sender<E>,
    mut shutdown_rx: mpsc::Receiver<()>,
) where
    E: From<FeedEvent> + Send + 'static,
{
    info!("Starting live feed for {} on {}", config.topic, config.url);

    loop {
        if !notify(&tx, ConnectionStatus::Reconnecting).await {
            return;
        }

        match run_connection(&config, &tx, &mut shutdown_rx).await {
            Ok(SessionEnd::Stopped) => {
                info!("Live feed stopped");
                return;
            }
            Ok(SessionEnd::Closed) => warn!("Live feed connection closed, will reconnect..."),
            Err(e) => error!("Live feed error: {}", e),
        }

        if !notify(&tx, ConnectionStatus::Disconnected).await {
            return;
        }

        debug!("Waiting {:?} before reconnecting...", config.reconnect_delay);
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.recv() => {
                info!("Live feed stopped while disconnected");
                return;
            }
        }
    }
}

/// One connection: handshake, subscribe, then pump frames until it ends
async fn run_connection<E>(
    config: &FeedConfig,
    tx: &mpsc::Sender<E>,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<SessionEnd, FeedError>
where
    E: From<FeedEvent> + Send + 'static,
{
    let ws_stream = tokio::select! {
        connected = connect_async(&config.url) => connected?.0,
        _ = shutdown_rx.recv() => return Ok(SessionEnd::Stopped),
    };
    let (mut write, mut read) = ws_stream.split();

    let heartbeat_ms = config.heartbeat.as_millis() as u64;
    send_frame(&mut write, &Frame::connect(&config.virtual_host(), heartbeat_ms, heartbeat_ms)).await?;

    let connected = match tokio::time::timeout(HANDSHAKE_TIMEOUT, await_connected(&mut read)).await {
        Ok(result) => result?,
        Err(_) => return Err(FeedError::Handshake("timed out waiting for CONNECTED".into())),
    };
    let (outgoing, incoming) = negotiate_heartbeat(heartbeat_ms, heartbeat_ms, connected.header("heart-beat"));

    send_frame(&mut write, &Frame::subscribe(SUBSCRIPTION_ID, &config.topic)).await?;
    info!("Subscribed to {} at {}", config.topic, config.url);
    if !notify(tx, ConnectionStatus::Connected).await {
        return Ok(SessionEnd::Stopped);
    }

    // The broker may stay silent for up to twice its heart-beat interval
    let idle_limit = incoming.map(|d| d * 2);
    let mut last_inbound = Instant::now();
    let mut heartbeat = tokio::time::interval(outgoing.unwrap_or(Duration::from_secs(3600)));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        let idle_deadline = idle_limit.map(|limit| last_inbound + limit);
        let idle = async move {
            match idle_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = send_frame(&mut write, &Frame::disconnect()).await;
                let _ = write.close().await;
                return Ok(SessionEnd::Stopped);
            }
            _ = heartbeat.tick(), if outgoing.is_some() => {
                write.send(Message::Text("\n".to_string().into())).await?;
            }
            _ = idle => {
                return Err(FeedError::Timeout(idle_limit.unwrap_or_default()));
            }
            msg = read.next() => {
                last_inbound = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let (samples, rejected) = handle_text(&text);
                        for sample in samples {
                            if tx.send(FeedEvent::Sample(sample).into()).await.is_err() {
                                warn!("Event receiver dropped, stopping live feed");
                                return Ok(SessionEnd::Stopped);
                            }
                        }
                        if let Some(e) = rejected {
                            return Err(e);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Broker closed connection");
                        return Ok(SessionEnd::Closed);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // WebSocket-level heartbeat, tungstenite answers pings itself
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Closed),
                }
            }
        }
    }
}

/// Decode one text message into the samples it carries.
///
/// Undecodable frames and malformed samples are logged and skipped. A broker
/// ERROR frame stops decoding; samples from frames before it are still
/// returned alongside the error.
fn handle_text(text: &str) -> (Vec<Sample>, Option<FeedError>) {
    let inbound = match stomp::decode(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            let preview: String = text.chars().take(100).collect();
            debug!("Failed to decode STOMP frame: {} - {}", e, preview);
            return (Vec::new(), None);
        }
    };

    let mut samples = Vec::new();
    for item in inbound {
        let Inbound::Frame(frame) = item else {
            continue;
        };
        match frame.command {
            Command::Message => {
                if let Some(sub) = frame.header("subscription") {
                    if sub != SUBSCRIPTION_ID {
                        debug!("Ignoring message for subscription {}", sub);
                        continue;
                    }
                }
                match Sample::from_json(&frame.body) {
                    Ok(sample) => samples.push(sample),
                    Err(e) => warn!("Dropping malformed sample: {}", e),
                }
            }
            Command::Error => {
                let message = frame
                    .header("message")
                    .map(str::to_string)
                    .unwrap_or_else(|| frame.body.clone());
                return (samples, Some(FeedError::Rejected(message)));
            }
            Command::Receipt => debug!("Received receipt {:?}", frame.header("receipt-id")),
            other => debug!("Ignoring unexpected {} frame", other),
        }
    }
    (samples, None)
}

async fn await_connected<S>(read: &mut S) -> Result<Frame, FeedError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let inbound = stomp::decode(&text).map_err(|e| FeedError::Handshake(e.to_string()))?;
        for item in inbound {
            match item {
                Inbound::Heartbeat => {}
                Inbound::Frame(frame) if frame.command == Command::Connected => return Ok(frame),
                Inbound::Frame(frame) if frame.command == Command::Error => {
                    let message = frame.header("message").unwrap_or(&frame.body).to_string();
                    return Err(FeedError::Rejected(message));
                }
                Inbound::Frame(frame) => {
                    return Err(FeedError::Handshake(format!("unexpected {} frame", frame.command)));
                }
            }
        }
    }
    Err(FeedError::Handshake("connection closed before CONNECTED".into()))
}

async fn send_frame<W>(write: &mut W, frame: &Frame) -> Result<(), FeedError>
where
    W: Sink<Message, Error = WsError> + Unpin,
{
    write.send(Message::Text(frame.encode().into())).await?;
    Ok(())
}

/// Returns `(outgoing, incoming)` heart-beat intervals.
///
/// `server` is the broker's `heart-beat: sx,sy` header; a direction is
/// disabled when either side offers 0.
fn negotiate_heartbeat(
    client_out_ms: u64,
    client_in_ms: u64,
    server: Option<&str>,
) -> (Option<Duration>, Option<Duration>) {
    let (server_out_ms, server_in_ms) = server
        .and_then(|h| h.split_once(','))
        .and_then(|(sx, sy)| Some((sx.trim().parse::<u64>().ok()?, sy.trim().parse::<u64>().ok()?)))
        .unwrap_or((0, 0));

    let pick = |ours: u64, theirs: u64| {
        (ours > 0 && theirs > 0).then(|| Duration::from_millis(ours.max(theirs)))
    };

    (pick(client_out_ms, server_in_ms), pick(client_in_ms, server_out_ms))
}

/// Returns false once the consumer has gone away
async fn notify<E>(tx: &mpsc::Sender<E>, status: ConnectionStatus) -> bool
where
    E: From<FeedEvent>,
{
    tx.send(FeedEvent::Status(status).into()).await.is_ok()
}
