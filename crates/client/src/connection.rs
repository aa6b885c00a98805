//! Connection manager: session lifecycle against the remote service.
//!
//! Each connect attempt walks `Disconnected → Connecting → Connected` and
//! ends back in `Disconnected` when the session drops. A failed attempt
//! passes through `ConnectError` on its way to `Disconnected`, so transition
//! listeners see the failure while `state()` reads `Disconnected` once the
//! attempt has settled. Nothing here retries or reconnects on its own.

use crate::protocol::ClientMessage;
use crate::transport::{ConnectRequest, Transport};
use goban_core::{Error, Identity, Result};
use goban_mirror::{ListenerHandle, ListenerSet};
use std::cell::{Cell, RefCell};
use std::fmt;

/// Counter identifying one established session.
pub type SessionId = u64;

/// Connection state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ConnectError,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::ConnectError => write!(f, "connect_error"),
        }
    }
}

/// An established session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub identity: Identity,
    /// Renewed auth token. Persisting it is the caller's job.
    pub token: String,
    pub uri: String,
    pub module_name: String,
}

/// Delivered to connection listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    Connected(Session),
    ConnectFailed(Error),
    Disconnected {
        session: Option<SessionId>,
        reason: Option<String>,
        /// True when the caller asked for the disconnect.
        requested: bool,
    },
}

/// One edge of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Owns the transport and the current session.
pub struct ConnectionManager {
    transport: RefCell<Box<dyn Transport>>,
    state: Cell<ConnectionState>,
    pending: RefCell<Option<ConnectRequest>>,
    session: RefCell<Option<Session>>,
    next_session: Cell<SessionId>,
    events: ListenerSet<ConnectionEvent>,
    transitions: ListenerSet<StateTransition>,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport: RefCell::new(transport),
            state: Cell::new(ConnectionState::Disconnected),
            pending: RefCell::new(None),
            session: RefCell::new(None),
            next_session: Cell::new(1),
            events: ListenerSet::new(),
            transitions: ListenerSet::new(),
        }
    }

    /// Starts a connect attempt.
    ///
    /// Returns once the transport is open; the attempt completes when the
    /// handshake reply is handed to [`handle_identity`](Self::handle_identity)
    /// or [`handle_rejected`](Self::handle_rejected). A transport that fails
    /// to open fails the attempt immediately.
    pub fn connect(&self, request: ConnectRequest) -> Result<()> {
        match self.state.get() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                return Err(Error::AlreadyConnected)
            }
            ConnectionState::Disconnected | ConnectionState::ConnectError => {}
        }

        tracing::info!(uri = %request.uri, module = %request.module_name, "connecting");
        self.set_state(ConnectionState::Connecting);
        *self.pending.borrow_mut() = Some(request.clone());

        let opened = self.transport.borrow_mut().open(&request);
        match opened {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Completes the pending attempt with the identity and renewed token
    /// issued by the remote service.
    pub fn handle_identity(&self, identity: Identity, token: String) -> Result<Session> {
        self.handle_identity_with(identity, token, |_| ())
    }

    /// Like [`handle_identity`](Self::handle_identity), running `prepare`
    /// once the handshake is accepted and before any listener observes the
    /// new session or the `Connected` transition.
    pub fn handle_identity_with<F>(&self, identity: Identity, token: String, prepare: F) -> Result<Session>
    where
        F: FnOnce(&Session),
    {
        if self.state.get() != ConnectionState::Connecting {
            return Err(Error::protocol(format!(
                "identity token received while {}",
                self.state.get()
            )));
        }
        let request = self
            .pending
            .borrow_mut()
            .take()
            .ok_or_else(|| Error::protocol("identity token without a connect request"))?;

        let id = self.next_session.get();
        self.next_session.set(id + 1);
        let session = Session {
            id,
            identity,
            token,
            uri: request.uri,
            module_name: request.module_name,
        };
        prepare(&session);
        *self.session.borrow_mut() = Some(session.clone());
        self.set_state(ConnectionState::Connected);
        tracing::info!(identity = %identity, session = id, "connected");
        self.events.notify(&ConnectionEvent::Connected(session.clone()));
        Ok(session)
    }

    /// Fails the pending attempt because the remote service refused it.
    /// Returns the error that was reported.
    pub fn handle_rejected(&self, message: impl Into<String>) -> Error {
        let message = message.into();
        if self.state.get() != ConnectionState::Connecting {
            tracing::warn!(state = %self.state.get(), "connect rejection outside of an attempt");
            return Error::protocol(format!("connect rejected while {}: {}", self.state.get(), message));
        }
        self.fail(Error::connection(message))
    }

    /// Handles the session dropping from the remote side.
    ///
    /// A drop during the handshake fails the attempt and returns its error.
    pub fn handle_disconnect(&self, reason: Option<String>) -> Option<Error> {
        match self.state.get() {
            ConnectionState::Connected => {
                self.transport.borrow_mut().close();
                let session = self.session.borrow_mut().take().map(|s| s.id);
                self.set_state(ConnectionState::Disconnected);
                tracing::info!(session = ?session, reason = ?reason, "disconnected");
                self.events.notify(&ConnectionEvent::Disconnected {
                    session,
                    reason,
                    requested: false,
                });
                None
            }
            ConnectionState::Connecting => {
                let message = reason.unwrap_or_else(|| String::from("connection closed during handshake"));
                Some(self.fail(Error::connection(message)))
            }
            ConnectionState::Disconnected | ConnectionState::ConnectError => {
                tracing::debug!("disconnect while not connected ignored");
                None
            }
        }
    }

    /// Closes the session at the caller's request. No-op when disconnected.
    pub fn disconnect(&self) {
        let state = self.state.get();
        if !matches!(state, ConnectionState::Connected | ConnectionState::Connecting) {
            return;
        }
        self.transport.borrow_mut().close();
        self.pending.borrow_mut().take();
        let session = self.session.borrow_mut().take().map(|s| s.id);
        self.set_state(ConnectionState::Disconnected);
        tracing::info!(session = ?session, "disconnected by caller");
        self.events.notify(&ConnectionEvent::Disconnected {
            session,
            reason: None,
            requested: true,
        });
    }

    /// Sends a frame over the established session.
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        if self.state.get() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        tracing::debug!(kind = message.kind(), "send");
        self.transport.borrow_mut().send(message)
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Connected
    }

    pub fn session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.borrow().as_ref().map(|s| s.id)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.borrow().as_ref().map(|s| s.identity)
    }

    /// Registers a listener for connect, connect-failure and disconnect events.
    pub fn on_event<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ConnectionEvent) + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Registers a listener for every state transition.
    pub fn on_transition<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&StateTransition) + 'static,
    {
        self.transitions.subscribe(listener)
    }

    fn fail(&self, error: Error) -> Error {
        self.pending.borrow_mut().take();
        self.transport.borrow_mut().close();
        self.set_state(ConnectionState::ConnectError);
        tracing::warn!(error = %error, "connect failed");
        self.set_state(ConnectionState::Disconnected);
        self.events.notify(&ConnectionEvent::ConnectFailed(error.clone()));
        error
    }

    fn set_state(&self, to: ConnectionState) {
        let from = self.state.replace(to);
        if from != to {
            self.transitions.notify(&StateTransition { from, to });
        }
    }
}
