//! Outbound transport seam.
//!
//! A transport carries client frames to the remote service. Inbound frames
//! take the other path: the transport's delivery callback pushes them into
//! `ClientContext::handle_message` on the same event queue.

use crate::protocol::ClientMessage;
use goban_core::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything needed to open a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    pub uri: String,
    pub module_name: String,
    /// Previously issued auth token; `None` asks for a fresh identity.
    pub token: Option<String>,
}

impl ConnectRequest {
    /// The handshake frame sent once the transport is open.
    pub fn handshake(&self) -> ClientMessage {
        ClientMessage::Connect {
            module_name: self.module_name.clone(),
            token: self.token.clone(),
        }
    }
}

/// A persistent, ordered connection to the remote service.
pub trait Transport {
    /// Opens the underlying connection. Must not block waiting for the
    /// handshake reply; that arrives later as an inbound frame.
    fn open(&mut self, request: &ConnectRequest) -> Result<()>;

    /// Queues one frame for delivery.
    fn send(&mut self, message: ClientMessage) -> Result<()>;

    /// Closes the connection. Closing a closed transport is a no-op.
    fn close(&mut self);
}

/// Frames observed by a [`RecordingTransport`].
#[derive(Debug, Default)]
pub struct Recording {
    pub opened: Vec<ConnectRequest>,
    pub sent: Vec<ClientMessage>,
    pub closed: usize,
    fail_open: Option<String>,
    is_open: bool,
}

/// In-memory transport that records every call.
///
/// Clones share the same recording, so a test can keep one clone and hand
/// the other to a `ClientContext`.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    recording: Rc<RefCell<Recording>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open` fail with `message`.
    pub fn fail_next_open(&self, message: impl Into<String>) {
        self.recording.borrow_mut().fail_open = Some(message.into());
    }

    /// Returns the frames sent so far.
    pub fn sent(&self) -> Vec<ClientMessage> {
        self.recording.borrow().sent.clone()
    }

    /// Removes and returns the frames sent so far.
    pub fn take_sent(&self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.recording.borrow_mut().sent)
    }

    /// Returns every connect request passed to `open`.
    pub fn opened(&self) -> Vec<ConnectRequest> {
        self.recording.borrow().opened.clone()
    }

    pub fn close_count(&self) -> usize {
        self.recording.borrow().closed
    }

    pub fn is_open(&self) -> bool {
        self.recording.borrow().is_open
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, request: &ConnectRequest) -> Result<()> {
        let mut recording = self.recording.borrow_mut();
        recording.opened.push(request.clone());
        if let Some(message) = recording.fail_open.take() {
            return Err(Error::connection(message));
        }
        recording.is_open = true;
        recording.sent.push(request.handshake());
        Ok(())
    }

    fn send(&mut self, message: ClientMessage) -> Result<()> {
        let mut recording = self.recording.borrow_mut();
        if !recording.is_open {
            return Err(Error::NotConnected);
        }
        recording.sent.push(message);
        Ok(())
    }

    fn close(&mut self) {
        let mut recording = self.recording.borrow_mut();
        if recording.is_open {
            recording.is_open = false;
            recording.closed += 1;
        }
    }
}
