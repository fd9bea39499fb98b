//! Push-channel connection manager.
//!
//! Owns one logical WebSocket per game session, reconnects with a linear
//! backoff after unexpected closes and turns inbound frames into
//! [`ConnectionEvent`]s.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::config::{Endpoints, ReconnectPolicy};
use crate::error::ConnectionError;
use crate::model::{GameStateSnapshot, PlayerId, PuzzleId, SessionId};
use crate::protocol::{
    CursorSample, InboundMessage, InteractionKind, OutboundMessage, PushNotification,
    format_timestamp,
};
use crate::schedule::{LatestCell, SharedScheduler, TimeoutHandle};

/// Raw socket lifecycle as reported by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed { code: u16, reason: String },
}

pub type TransportSink = Rc<dyn Fn(TransportEvent)>;

/// A text WebSocket.
///
/// `open` replaces any previous socket. Events for the new socket are
/// delivered to `sink`, never synchronously from inside `open`.
pub trait Transport {
    fn open(&self, url: &str, sink: TransportSink) -> Result<(), ConnectionError>;
    fn send(&self, text: &str) -> Result<(), ConnectionError>;
    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    Connecting,
    Open,
    #[default]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub status: ChannelStatus,
    pub reconnect_attempt: u32,
}

#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected,
    Closed { code: u16, reason: String },
    Error(ConnectionError),
    StateUpdate(Rc<GameStateSnapshot>),
    Notification(PushNotification),
    RemoteCursor(CursorSample),
    /// Reconnection gave up; the channel stays closed.
    ReconnectExhausted { attempts: u32 },
}

#[derive(Default)]
struct Link {
    state: ConnectionState,
    session: Option<SessionId>,
    generation: u64,
    reconnect: Option<TimeoutHandle>,
}

struct Inner {
    transport: Box<dyn Transport>,
    scheduler: SharedScheduler,
    policy: ReconnectPolicy,
    endpoints: Endpoints,
    listener: LatestCell<dyn Fn(ConnectionEvent)>,
    link: RefCell<Link>,
}

/// Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Rc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        transport: Box<dyn Transport>,
        scheduler: SharedScheduler,
        endpoints: Endpoints,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                transport,
                scheduler,
                policy,
                endpoints,
                listener: LatestCell::new(Rc::new(|_| {})),
                link: RefCell::new(Link::default()),
            }),
        }
    }

    /// Replaces the event listener. Takes effect for the next event.
    pub fn set_listener(&self, listener: Rc<dyn Fn(ConnectionEvent)>) {
        self.inner.listener.replace(listener);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link.borrow().state
    }

    pub fn is_open(&self) -> bool {
        self.state().status == ChannelStatus::Open
    }

    pub fn session(&self) -> Option<SessionId> {
        self.inner.link.borrow().session
    }

    /// Opens the channel for `session_id`.
    ///
    /// Calling again for the same session while connecting, open or waiting
    /// to reconnect does nothing. A different session replaces the old one.
    pub fn connect(&self, session_id: SessionId) {
        let current = {
            let link = self.inner.link.borrow();
            let busy = link.state.status != ChannelStatus::Closed || link.reconnect.is_some();
            (link.session, busy)
        };
        match current {
            (Some(id), true) if id == session_id => {
                tracing::debug!(session_id, "connect ignored, channel already active");
                return;
            }
            (Some(_), _) => self.disconnect(),
            (None, _) => {}
        }

        {
            let mut link = self.inner.link.borrow_mut();
            link.session = Some(session_id);
            link.state.reconnect_attempt = 0;
        }
        self.open();
    }

    /// Closes the channel and cancels any pending reconnect.
    pub fn disconnect(&self) {
        let pending = {
            let mut link = self.inner.link.borrow_mut();
            link.generation += 1;
            link.session = None;
            link.state = ConnectionState::default();
            link.reconnect.take()
        };
        drop(pending);
        self.inner.transport.close();
        tracing::info!("push channel disconnected");
    }

    /// Sends a message on the open channel.
    ///
    /// When the channel is not open the error is also reported to the
    /// listener.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), ConnectionError> {
        if !self.is_open() {
            let err = ConnectionError::NotConnected;
            tracing::warn!("{err}");
            self.emit(ConnectionEvent::Error(err.clone()));
            return Err(err);
        }
        let text = message
            .to_json()
            .map_err(|e| ConnectionError::Encode(e.to_string()))?;
        self.inner.transport.send(&text)
    }

    pub fn send_pointer_sample(&self, sample: CursorSample) -> Result<(), ConnectionError> {
        self.send(&OutboundMessage::MousePosition(sample))
    }

    pub fn send_puzzle_interaction(
        &self,
        user_id: PlayerId,
        puzzle_id: PuzzleId,
        interaction_type: InteractionKind,
        interaction_data: Value,
    ) -> Result<(), ConnectionError> {
        self.send(&OutboundMessage::PuzzleInteraction {
            user_id,
            puzzle_id,
            interaction_type,
            interaction_data,
            timestamp: format_timestamp(self.inner.scheduler.now_ms()),
        })
    }

    fn emit(&self, event: ConnectionEvent) {
        (self.inner.listener.get())(event);
    }

    fn open(&self) {
        let (url, generation) = {
            let mut link = self.inner.link.borrow_mut();
            let Some(session_id) = link.session else {
                return;
            };
            link.generation += 1;
            link.state.status = ChannelStatus::Connecting;
            (
                self.inner.endpoints.game_socket_url(session_id),
                link.generation,
            )
        };
        // The reconnect timer (if any) has fired or is obsolete.
        let stale = self.inner.link.borrow_mut().reconnect.take();
        drop(stale);

        tracing::info!(%url, "opening push channel");
        let weak = Rc::downgrade(&self.inner);
        let sink: TransportSink = Rc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                ConnectionManager { inner }.handle(generation, event);
            }
        });

        if let Err(err) = self.inner.transport.open(&url, sink) {
            tracing::warn!("{err}");
            self.inner.link.borrow_mut().state.status = ChannelStatus::Closed;
            self.emit(ConnectionEvent::Error(err));
            self.schedule_reconnect();
        }
    }

    fn handle(&self, generation: u64, event: TransportEvent) {
        if self.inner.link.borrow().generation != generation {
            tracing::trace!(?event, "event from replaced socket ignored");
            return;
        }

        match event {
            TransportEvent::Opened => {
                {
                    let mut link = self.inner.link.borrow_mut();
                    link.state.status = ChannelStatus::Open;
                    link.state.reconnect_attempt = 0;
                }
                tracing::info!("push channel open");
                self.emit(ConnectionEvent::Connected);
            }
            TransportEvent::Message(text) => self.dispatch(&text),
            TransportEvent::Error(message) => {
                tracing::warn!(%message, "push channel error");
                self.emit(ConnectionEvent::Error(ConnectionError::Transport(message)));
            }
            TransportEvent::Closed { code, reason } => {
                self.inner.link.borrow_mut().state.status = ChannelStatus::Closed;
                tracing::info!(code, %reason, "push channel closed");
                self.emit(ConnectionEvent::Closed { code, reason });
                self.schedule_reconnect();
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match InboundMessage::parse(text) {
            Ok(InboundMessage::StateUpdate(snapshot)) => {
                self.emit(ConnectionEvent::StateUpdate(Rc::new(snapshot)));
            }
            Ok(InboundMessage::Notification(notification)) => {
                self.emit(ConnectionEvent::Notification(notification));
            }
            Ok(InboundMessage::Cursor(sample)) => {
                self.emit(ConnectionEvent::RemoteCursor(sample));
            }
            Ok(InboundMessage::Unrecognized(kind)) => {
                tracing::debug!(%kind, "unhandled message type");
            }
            Err(err) => {
                tracing::warn!("dropping malformed message: {err}");
            }
        }
    }

    fn schedule_reconnect(&self) {
        let max = self.inner.policy.max_attempts;
        let attempt = {
            let mut link = self.inner.link.borrow_mut();
            if link.session.is_none() {
                return;
            }
            if link.state.reconnect_attempt >= max {
                None
            } else {
                link.state.reconnect_attempt += 1;
                Some(link.state.reconnect_attempt)
            }
        };

        let Some(attempt) = attempt else {
            tracing::error!(attempts = max, "giving up on push channel");
            self.emit(ConnectionEvent::ReconnectExhausted { attempts: max });
            return;
        };

        let delay = self.inner.policy.delay_for(attempt);
        tracing::info!(attempt, delay, "scheduling reconnect");
        let weak = Rc::downgrade(&self.inner);
        let handle = TimeoutHandle::schedule(&self.inner.scheduler, delay, move || {
            if let Some(inner) = weak.upgrade() {
                ConnectionManager { inner }.open();
            }
        });
        self.inner.link.borrow_mut().reconnect = Some(handle);
    }
}

#[cfg(any(test, feature = "testing"))]
#[derive(Default)]
struct RecordingLog {
    opened: Vec<String>,
    sinks: Vec<TransportSink>,
    sent: Vec<String>,
    closes: usize,
    fail_next_open: Option<String>,
}

#[cfg(any(test, feature = "testing"))]
/// In-memory transport that records traffic and lets the caller inject
/// socket events.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    log: Rc<RefCell<RecordingLog>>,
}

#[cfg(any(test, feature = "testing"))]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.log.borrow().opened.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.log.borrow().sent.clone()
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.log
            .borrow()
            .sent
            .iter()
            .filter_map(|s| serde_json::from_str(s).ok())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.log.borrow().closes
    }

    pub fn fail_next_open(&self, message: &str) {
        self.log.borrow_mut().fail_next_open = Some(message.to_string());
    }

    /// Delivers an event to the most recently opened socket.
    pub fn deliver(&self, event: TransportEvent) {
        let sink = self.log.borrow().sinks.last().cloned();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    /// Delivers an event to the `index`-th socket ever opened.
    pub fn deliver_to(&self, index: usize, event: TransportEvent) {
        let sink = self.log.borrow().sinks.get(index).cloned();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn deliver_text(&self, text: &str) {
        self.deliver(TransportEvent::Message(text.to_string()));
    }
}

#[cfg(any(test, feature = "testing"))]
impl Transport for RecordingTransport {
    fn open(&self, url: &str, sink: TransportSink) -> Result<(), ConnectionError> {
        let mut log = self.log.borrow_mut();
        if let Some(message) = log.fail_next_open.take() {
            return Err(ConnectionError::OpenFailed(message));
        }
        log.opened.push(url.to_string());
        log.sinks.push(sink);
        Ok(())
    }

    fn send(&self, text: &str) -> Result<(), ConnectionError> {
        self.log.borrow_mut().sent.push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.log.borrow_mut().closes += 1;
    }
}
