//! WebSocket transport for talking to the relay server.
//!
//! Uses a background thread for non-blocking operation: `publish` queues a
//! command and returns, the thread writes it to the socket and routes
//! incoming server messages into the subscribed inbox.

use super::protocol::{ClientMessage, ServerMessage};
use super::{ConnectionState, InboxSender, SyncEvent, Transport};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, connect};
use url::Url;

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

type Inboxes = Arc<Mutex<HashMap<String, InboxSender>>>;

/// Transport backed by a WebSocket connection to a relay server.
///
/// The relay keeps one session per connection, so subscribing to a second
/// session moves the connection there.
pub struct WebSocketTransport {
    url: String,
    state: Arc<Mutex<ConnectionState>>,
    /// Channel to send commands to the WebSocket thread.
    cmd_tx: Mutex<Option<Sender<WsCommand>>>,
    inboxes: Inboxes,
    /// Handle to the WebSocket thread.
    _thread: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    /// Connect to a relay server. Returns once the connection thread is
    /// running; the handshake itself completes in the background.
    pub fn connect(url: &str) -> Result<Self> {
        let parsed_url =
            Url::parse(url).map_err(|e| Error::SyncDelivery(format!("Invalid URL: {}", e)))?;
        if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
            return Err(Error::SyncDelivery(format!(
                "Invalid WebSocket URL scheme: {}",
                parsed_url.scheme()
            )));
        }

        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let inboxes: Inboxes = Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = channel::<WsCommand>();

        let handle = {
            let url = url.to_string();
            let state = state.clone();
            let inboxes = inboxes.clone();
            thread::spawn(move || run_socket(&url, cmd_rx, &state, &inboxes))
        };

        Ok(Self {
            url: url.to_string(),
            state,
            cmd_tx: Mutex::new(Some(cmd_tx)),
            inboxes,
            _thread: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Error)
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Close the connection.
    pub fn disconnect(&self) {
        if let Ok(mut cmd_tx) = self.cmd_tx.lock() {
            if let Some(tx) = cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
        }
        set_state(&self.state, ConnectionState::Disconnected);
    }

    fn send(&self, msg: &ClientMessage) -> Result<()> {
        let json = msg
            .to_json()
            .map_err(|e| Error::SyncDelivery(format!("Encode failed: {}", e)))?;
        let cmd_tx = self
            .cmd_tx
            .lock()
            .map_err(|e| Error::SyncDelivery(format!("Lock error: {}", e)))?;
        match cmd_tx.as_ref() {
            Some(tx) => tx
                .send(WsCommand::Send(json))
                .map_err(|e| Error::SyncDelivery(format!("Send failed: {}", e))),
            None => Err(Error::SyncDelivery("Not connected".to_string())),
        }
    }
}

impl Transport for WebSocketTransport {
    fn subscribe(&self, session_id: &str, inbox: InboxSender) -> Result<()> {
        {
            let mut inboxes = self
                .inboxes
                .lock()
                .map_err(|e| Error::SyncDelivery(format!("Lock error: {}", e)))?;
            inboxes.clear();
            inboxes.insert(session_id.to_string(), inbox);
        }
        self.send(&ClientMessage::Join {
            session: session_id.to_string(),
        })
    }

    fn unsubscribe(&self, session_id: &str) {
        let removed = self
            .inboxes
            .lock()
            .map(|mut inboxes| inboxes.remove(session_id).is_some())
            .unwrap_or(false);
        if removed {
            if let Err(e) = self.send(&ClientMessage::Leave) {
                log::debug!("Leave not sent: {}", e);
            }
        }
    }

    fn publish(&self, session_id: &str, event: &SyncEvent) -> Result<()> {
        let subscribed = self
            .inboxes
            .lock()
            .map(|inboxes| inboxes.contains_key(session_id))
            .unwrap_or(false);
        if !subscribed {
            return Err(Error::SyncDelivery(format!(
                "Not subscribed to session {}",
                session_id
            )));
        }
        self.send(&ClientMessage::Publish {
            event: event.clone(),
        })
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn set_state(state: &Mutex<ConnectionState>, value: ConnectionState) {
    if let Ok(mut s) = state.lock() {
        *s = value;
    }
}

/// Hand a connection update or failure to every subscribed inbox.
fn broadcast(inboxes: &Inboxes, f: impl Fn(&InboxSender) -> bool) {
    // Clone the senders out so a blocking inbox never holds the lock.
    let targets: Vec<InboxSender> = match inboxes.lock() {
        Ok(inboxes) => inboxes.values().cloned().collect(),
        Err(_) => return,
    };
    for inbox in &targets {
        f(inbox);
    }
}

fn inbox_for(inboxes: &Inboxes, session: &str) -> Option<InboxSender> {
    inboxes.lock().ok()?.get(session).cloned()
}

/// Route one server message into the matching inbox.
fn dispatch(inboxes: &Inboxes, msg: ServerMessage) {
    match msg {
        ServerMessage::Joined {
            session,
            peer_count,
            history,
        } => {
            log::info!(
                "Joined session {} with {} peer(s), replaying {} event(s)",
                session,
                peer_count,
                history.len()
            );
            if let Some(inbox) = inbox_for(inboxes, &session) {
                for event in history {
                    if !inbox.deliver(prepare(event)) {
                        break;
                    }
                }
            }
        }
        ServerMessage::Event { session, event } => match inbox_for(inboxes, &session) {
            Some(inbox) => {
                inbox.deliver(prepare(event));
            }
            None => log::debug!("Event for unsubscribed session {}", session),
        },
        ServerMessage::Error { message } => {
            log::warn!("Server error: {}", message);
            broadcast(inboxes, |inbox| inbox.report_failure(message.clone()));
        }
    }
}

/// First 100 characters of a message, for logging.
fn preview(msg: &str) -> &str {
    msg.char_indices().nth(100).map_or(msg, |(i, _)| &msg[..i])
}

fn prepare(mut event: SyncEvent) -> SyncEvent {
    if let super::EventPayload::Stroke { path } = &mut event.payload {
        path.refresh_rendered_form();
    }
    event
}

fn run_socket(
    url: &str,
    cmd_rx: Receiver<WsCommand>,
    state: &Mutex<ConnectionState>,
    inboxes: &Inboxes,
) {
    log::info!("WebSocket thread: connecting to {}", url);

    let (mut socket, response) = match connect(url) {
        Ok(connected) => connected,
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            set_state(state, ConnectionState::Error);
            broadcast(inboxes, |inbox| {
                inbox.report_failure(format!("Connection failed: {}", e))
            });
            return;
        }
    };

    log::info!("WebSocket connected, status: {}", response.status());
    set_state(state, ConnectionState::Connected);
    broadcast(inboxes, |inbox| inbox.report_connection(ConnectionState::Connected));

    // Short read timeout so queued commands are not starved by a quiet socket.
    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => {
            log::debug!("TLS or other stream - using default timeout handling");
        }
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                log::debug!("WebSocket sending: {}", preview(&msg));
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("WebSocket send error: {}", e);
                    broadcast(inboxes, |inbox| {
                        inbox.report_failure(format!("Send failed: {}", e))
                    });
                    break;
                }
            }
            Ok(WsCommand::Close) => {
                log::info!("WebSocket close requested");
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Disconnected) => {
                log::info!("WebSocket command channel disconnected");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                log::debug!("WebSocket received: {}", preview(&txt));
                match serde_json::from_str::<ServerMessage>(&txt) {
                    Ok(msg) => dispatch(inboxes, msg),
                    Err(e) => log::warn!("Failed to parse server message: {}", e),
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                broadcast(inboxes, |inbox| {
                    inbox.report_failure(format!("Read failed: {}", e))
                });
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    set_state(state, ConnectionState::Disconnected);
    broadcast(inboxes, |inbox| {
        inbox.report_connection(ConnectionState::Disconnected)
    });
}
