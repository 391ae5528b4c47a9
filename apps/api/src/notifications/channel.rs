//! Live-Update Channel: one persistent push connection per mounted context.
//!
//! The channel reconnects forever on a fixed interval after any close it did
//! not ask for. There is no backoff growth and no retry cap, so a dead
//! endpoint is retried every interval until the channel is closed.
//!
//! Transport is abstracted behind [`Connector`] / [`Connection`] so the
//! reconnect and decode logic can be driven without a socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::Dispatcher;
use super::envelope::{self, Inbound};

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("channel is not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    Connect(String),
}

/// What a connection yields, already stripped of control frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

#[async_trait]
pub trait Connection: Send {
    /// `None` means the peer went away without a close frame.
    async fn next_frame(&mut self) -> Option<Result<Frame, ChannelError>>;

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    async fn close(&mut self) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, ChannelError>;
}

/// WebSocket transport.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, ChannelError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, ChannelError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            let frame = match message {
                Message::Text(text) => Frame::Text(text),
                Message::Binary(bytes) => Frame::Binary(bytes),
                Message::Close(_) => Frame::Close,
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    /// Waiting out the reconnect interval.
    ReconnectWait,
    Closed,
}

pub struct LiveUpdateChannel {
    url: String,
    reconnect_interval: Duration,
    connector: Arc<dyn Connector>,
}

impl LiveUpdateChannel {
    pub fn new(url: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            url: url.into(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connector,
        }
    }

    pub fn websocket(url: impl Into<String>) -> Self {
        Self::new(url, Arc::new(WsConnector))
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Starts the connect/reconnect loop; inbound notifications go to
    /// `dispatcher`.
    pub fn open(self, dispatcher: Dispatcher) -> ChannelHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(
            self,
            dispatcher,
            cancel.clone(),
            state_tx,
            outbound_rx,
        ));

        ChannelHandle {
            cancel,
            state: state_rx,
            outbound: outbound_tx,
            task,
        }
    }
}

pub struct ChannelHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ChannelState>,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Queues one text frame for the open connection. Text still queued when
    /// that connection ends is dropped, not replayed after a reconnect.
    pub fn send(&self, text: impl Into<String>) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        self.outbound
            .send(text.into())
            .map_err(|_| ChannelError::NotConnected)
    }

    /// Client-initiated close. Suppresses any reconnect, including one whose
    /// wait is already running, and waits for the loop to finish.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Live-update channel task ended abnormally");
        }
    }
}

async fn run(
    channel: LiveUpdateChannel,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    state: watch::Sender<ChannelState>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let url = channel.url.as_str();

    loop {
        state.send_replace(ChannelState::Connecting);
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = channel.connector.connect(url) => result,
        };

        match connected {
            Ok(mut connection) => {
                info!(url, "Live-update channel connected");
                discard_outbound(&mut outbound);
                state.send_replace(ChannelState::Open);

                let client_closed =
                    pump(connection.as_mut(), &dispatcher, &cancel, &mut outbound).await;
                if client_closed {
                    if let Err(e) = connection.close().await {
                        debug!(error = %e, "Error while closing live-update connection");
                    }
                    info!(url, "Live-update channel closed by client");
                    break;
                }
                warn!(
                    url,
                    retry_ms = channel.reconnect_interval.as_millis() as u64,
                    "Live-update channel disconnected, reconnecting"
                );
            }
            Err(e) => {
                warn!(
                    url,
                    error = %e,
                    retry_ms = channel.reconnect_interval.as_millis() as u64,
                    "Live-update channel connect failed"
                );
            }
        }

        state.send_replace(ChannelState::ReconnectWait);
        discard_outbound(&mut outbound);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(channel.reconnect_interval) => {}
        }
    }

    state.send_replace(ChannelState::Closed);
}

/// Drops text queued for a connection that is gone. Nothing sent while one
/// connection was open is ever written to the next.
fn discard_outbound(outbound: &mut mpsc::UnboundedReceiver<String>) {
    let mut dropped = 0usize;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        warn!(dropped, "Dropping unsent frames from closed live-update connection");
    }
}

/// Reads frames until the connection ends. Returns `true` when the client
/// asked to close, `false` when the peer or transport ended it.
async fn pump(
    connection: &mut dyn Connection,
    dispatcher: &Dispatcher,
    cancel: &CancellationToken,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> bool {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return true,
            Some(text) = outbound.recv() => {
                if let Err(e) = connection.send_text(text).await {
                    warn!(error = %e, "Failed to send on live-update channel");
                }
            }
            frame = connection.next_frame() => match frame {
                Some(Ok(Frame::Text(text))) => handle_payload(&text, dispatcher),
                Some(Ok(Frame::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => handle_payload(&text, dispatcher),
                    Err(e) => warn!(error = %e, "Discarding non-UTF-8 push payload"),
                },
                Some(Ok(Frame::Close)) | None => return false,
                Some(Err(e)) => {
                    warn!(error = %e, "Live-update transport error");
                    return false;
                }
            },
        }
    }
}

fn handle_payload(text: &str, dispatcher: &Dispatcher) {
    match envelope::decode(text) {
        Ok(Inbound::Notification(push)) => {
            let id = dispatcher.dispatch_push(push);
            debug!(%id, "Push notification dispatched");
        }
        Ok(Inbound::Ignored(event_type)) => {
            debug!(%event_type, "Ignoring non-notification push");
        }
        Err(e) => warn!(error = %e, "Discarding malformed push payload"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::notifications::dispatcher::StoreCommand;
    use crate::notifications::model::NotificationKind;

    /// Server side of a scripted connection.
    struct Peer {
        frames: mpsc::UnboundedSender<Frame>,
        sent: mpsc::UnboundedReceiver<String>,
    }

    struct ScriptedConnection {
        frames: mpsc::UnboundedReceiver<Frame>,
        sent: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn next_frame(&mut self) -> Option<Result<Frame, ChannelError>> {
            self.frames.recv().await.map(Ok)
        }

        async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
            self.sent.send(text).map_err(|_| ChannelError::NotConnected)
        }

        async fn close(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    /// Hands out queued connections; refuses once the script runs out.
    #[derive(Default)]
    struct ScriptedConnector {
        script: Mutex<VecDeque<ScriptedConnection>>,
        attempts: AtomicUsize,
    }

    impl ScriptedConnector {
        fn push_connection(&self) -> Peer {
            let (frames_tx, frames_rx) = mpsc::unbounded_channel();
            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            self.script.lock().unwrap().push_back(ScriptedConnection {
                frames: frames_rx,
                sent: sent_tx,
            });
            Peer {
                frames: frames_tx,
                sent: sent_rx,
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Connection>, ChannelError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(connection) => Ok(Box::new(connection)),
                None => Err(ChannelError::Connect("connection refused".to_string())),
            }
        }
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn open(connector: &Arc<ScriptedConnector>) -> (ChannelHandle, mpsc::UnboundedReceiver<StoreCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = LiveUpdateChannel::new("ws://test/notifications", connector.clone())
            .open(Dispatcher::new(tx));
        (handle, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StoreCommand>) -> Vec<StoreCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_push_dispatches_one_show() {
        let connector = Arc::new(ScriptedConnector::default());
        let peer = connector.push_connection();
        let (handle, mut commands) = open(&connector);
        settle().await;
        assert!(handle.is_connected());

        peer.frames
            .send(Frame::Text(
                r#"{"type":"notification","notificationType":"success","title":"Saved","message":"OK"}"#
                    .to_string(),
            ))
            .unwrap();
        settle().await;

        let commands = drain(&mut commands);
        assert_eq!(commands.len(), 1);
        let StoreCommand::Show { spec, .. } = &commands[0] else {
            panic!("expected show");
        };
        assert_eq!(spec.kind, NotificationKind::Success);
        assert_eq!(spec.title, "Saved");
        assert_eq!(spec.message, "OK");

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payloads_are_discarded() {
        let connector = Arc::new(ScriptedConnector::default());
        let peer = connector.push_connection();
        let (handle, mut commands) = open(&connector);
        settle().await;

        for junk in [
            "{not json",
            r#"{"type":"notification","title":"missing kind","message":"M"}"#,
            r#"{"type":"heartbeat"}"#,
        ] {
            peer.frames.send(Frame::Text(junk.to_string())).unwrap();
        }
        peer.frames.send(Frame::Binary(vec![0xff, 0xfe])).unwrap();
        settle().await;
        assert!(drain(&mut commands).is_empty());
        assert!(handle.is_connected(), "bad payloads never drop the connection");

        peer.frames
            .send(Frame::Binary(
                br#"{"type":"notification","notificationType":"info","title":"T","message":"M"}"#.to_vec(),
            ))
            .unwrap();
        settle().await;
        assert_eq!(drain(&mut commands).len(), 1);

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_fixed_interval() {
        let connector = Arc::new(ScriptedConnector::default());
        let peer = connector.push_connection();
        let _second = connector.push_connection();
        let (handle, _commands) = open(&connector);
        settle().await;
        assert_eq!(connector.attempts(), 1);

        peer.frames.send(Frame::Close).unwrap();
        settle().await;
        assert_eq!(handle.state(), ChannelState::ReconnectWait);

        tokio::time::advance(Duration::from_millis(4999)).await;
        settle().await;
        assert_eq!(connector.attempts(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(connector.attempts(), 2);
        assert!(handle.is_connected());

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connects_retry_without_backoff_growth() {
        let connector = Arc::new(ScriptedConnector::default());
        let (handle, _commands) = open(&connector);
        settle().await;
        assert_eq!(connector.attempts(), 1);

        for expected in 2..=5 {
            tokio::time::advance(DEFAULT_RECONNECT_INTERVAL).await;
            settle().await;
            assert_eq!(connector.attempts(), expected);
        }

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_dropping_connection_triggers_reconnect() {
        let connector = Arc::new(ScriptedConnector::default());
        let peer = connector.push_connection();
        let (handle, _commands) = open(&connector);
        settle().await;

        drop(peer);
        settle().await;
        assert_eq!(handle.state(), ChannelState::ReconnectWait);

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_reconnect_wait_prevents_reconnect() {
        let connector = Arc::new(ScriptedConnector::default());
        let (handle, _commands) = open(&connector);
        settle().await;
        assert_eq!(handle.state(), ChannelState::ReconnectWait);

        let mut state = handle.subscribe_state();
        handle.close().await;
        assert_eq!(*state.borrow_and_update(), ChannelState::Closed);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_close_on_open_connection_does_not_reconnect() {
        let connector = Arc::new(ScriptedConnector::default());
        let _peer = connector.push_connection();
        let _spare = connector.push_connection();
        let (handle, _commands) = open(&connector);
        settle().await;
        assert!(handle.is_connected());

        handle.close().await;
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_open_connection() {
        let connector = Arc::new(ScriptedConnector::default());
        let (handle, _commands) = open(&connector);
        settle().await;
        assert!(matches!(handle.send("hello"), Err(ChannelError::NotConnected)));
        handle.close().await;

        let connector = Arc::new(ScriptedConnector::default());
        let mut peer = connector.push_connection();
        let (handle, _commands) = open(&connector);
        settle().await;
        handle.send(r#"{"type":"ack"}"#).unwrap();
        settle().await;
        assert_eq!(peer.sent.try_recv().ok().as_deref(), Some(r#"{"type":"ack"}"#));
        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsent_text_is_not_carried_to_next_connection() {
        let connector = Arc::new(ScriptedConnector::default());
        let first = connector.push_connection();
        let mut second = connector.push_connection();
        let (handle, _commands) = open(&connector);
        settle().await;
        assert!(handle.is_connected());

        // Close and send land in the same tick.
        first.frames.send(Frame::Close).unwrap();
        handle.send("stale").unwrap();
        settle().await;
        assert_eq!(handle.state(), ChannelState::ReconnectWait);

        tokio::time::advance(DEFAULT_RECONNECT_INTERVAL).await;
        settle().await;
        assert!(handle.is_connected());
        assert_eq!(connector.attempts(), 2);
        assert!(second.sent.try_recv().is_err());

        handle.close().await;
    }
}
