//! Reducer gateway: fire-and-forget calls to remote procedures.
//!
//! A call only sends a frame. It never touches a mirror; its effect shows up
//! when the resulting row events come back. The remote service's verdict is
//! delivered to per-kind result listeners, which are meant for diagnostics
//! and not as a source of UI state.

use crate::connection::ConnectionManager;
use crate::protocol::{ClientMessage, ReducerOutcome, RequestId};
use goban_core::{Error, GameId, Result};
use goban_mirror::{ListenerHandle, ListenerSet};
use hashbrown::HashMap;
use serde_json::{json, Value as JsonValue};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

const KIND_COUNT: usize = 5;

/// The remote procedures this client invokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReducerKind {
    SendMessage,
    SetName,
    CreateGame,
    JoinGame,
    PlaceStone,
}

impl ReducerKind {
    pub const ALL: [ReducerKind; KIND_COUNT] = [
        ReducerKind::SendMessage,
        ReducerKind::SetName,
        ReducerKind::CreateGame,
        ReducerKind::JoinGame,
        ReducerKind::PlaceStone,
    ];

    /// Wire name of the reducer.
    pub fn name(&self) -> &'static str {
        match self {
            ReducerKind::SendMessage => "send_message",
            ReducerKind::SetName => "set_name",
            ReducerKind::CreateGame => "create_game",
            ReducerKind::JoinGame => "join_game",
            ReducerKind::PlaceStone => "place_stone",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settlement of one reducer call.
#[derive(Clone, Debug, PartialEq)]
pub struct ReducerEvent {
    pub request_id: RequestId,
    pub kind: ReducerKind,
    pub outcome: core::result::Result<(), Error>,
}

impl ReducerEvent {
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub struct ReducerGateway {
    connection: Rc<ConnectionManager>,
    next_request: Cell<RequestId>,
    in_flight: RefCell<HashMap<RequestId, ReducerKind>>,
    /// One set per kind, indexed by discriminant.
    listeners: [ListenerSet<ReducerEvent>; KIND_COUNT],
}

impl ReducerGateway {
    pub fn new(connection: Rc<ConnectionManager>) -> Self {
        Self {
            connection,
            next_request: Cell::new(1),
            in_flight: RefCell::new(HashMap::new()),
            listeners: std::array::from_fn(|_| ListenerSet::new()),
        }
    }

    pub fn send_message(&self, text: &str) -> Result<RequestId> {
        self.call(ReducerKind::SendMessage, vec![json!(text)])
    }

    pub fn set_name(&self, name: &str) -> Result<RequestId> {
        self.call(ReducerKind::SetName, vec![json!(name)])
    }

    pub fn create_game(&self, board_size: u32) -> Result<RequestId> {
        self.call(ReducerKind::CreateGame, vec![json!(board_size)])
    }

    pub fn join_game(&self, game_id: GameId) -> Result<RequestId> {
        self.call(ReducerKind::JoinGame, vec![json!(game_id)])
    }

    pub fn place_stone(&self, game_id: GameId, x: u32, y: u32) -> Result<RequestId> {
        self.call(ReducerKind::PlaceStone, vec![json!(game_id), json!(x), json!(y)])
    }

    /// Sends a reducer call and returns its request id.
    pub fn call(&self, kind: ReducerKind, args: Vec<JsonValue>) -> Result<RequestId> {
        let request_id = self.next_request.get();
        self.connection.send(ClientMessage::CallReducer {
            request_id,
            reducer: kind.name().to_string(),
            args,
        })?;
        self.next_request.set(request_id + 1);
        self.in_flight.borrow_mut().insert(request_id, kind);
        tracing::debug!(request_id, reducer = kind.name(), "reducer called");
        Ok(request_id)
    }

    /// Delivers the remote verdict for an earlier call.
    pub fn handle_result(
        &self,
        request_id: RequestId,
        reducer: &str,
        outcome: ReducerOutcome,
    ) -> Result<ReducerEvent> {
        let kind = self
            .in_flight
            .borrow_mut()
            .remove(&request_id)
            .or_else(|| ReducerKind::from_name(reducer))
            .ok_or_else(|| Error::protocol(format!("result for unknown reducer `{}`", reducer)))?;

        let outcome = match outcome {
            ReducerOutcome::Committed => {
                tracing::debug!(request_id, reducer = kind.name(), "reducer committed");
                Ok(())
            }
            ReducerOutcome::Failed { message } => {
                let error = Error::reducer(kind.name(), message);
                tracing::warn!(request_id, error = %error, "reducer failed");
                Err(error)
            }
        };
        let event = ReducerEvent {
            request_id,
            kind,
            outcome,
        };
        self.listeners[kind as usize].notify(&event);
        Ok(event)
    }

    /// Registers a result listener for one reducer kind.
    pub fn on_result<F>(&self, kind: ReducerKind, listener: F) -> ListenerHandle
    where
        F: Fn(&ReducerEvent) + 'static,
    {
        self.listeners[kind as usize].subscribe(listener)
    }

    /// Number of calls sent and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.borrow().len()
    }

    /// Forgets calls still awaiting a result. Request ids keep increasing,
    /// so a late result falls back to its reducer name.
    pub fn reset(&self) {
        let dropped = self.in_flight.borrow_mut().drain().count();
        if dropped > 0 {
            tracing::debug!(dropped, "unsettled reducer calls forgotten");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ConnectRequest, RecordingTransport};
    use goban_core::{ErrorKind, Identity, IDENTITY_LEN};

    fn connected() -> (RecordingTransport, ReducerGateway) {
        let transport = RecordingTransport::new();
        let connection = Rc::new(ConnectionManager::new(Box::new(transport.clone())));
        connection
            .connect(ConnectRequest {
                uri: "ws://localhost:3000".into(),
                module_name: "quickstart-chat".into(),
                token: None,
            })
            .unwrap();
        connection
            .handle_identity(Identity::new([1; IDENTITY_LEN]), "t".into())
            .unwrap();
        transport.take_sent();
        (transport, ReducerGateway::new(connection))
    }

    fn call(request_id: RequestId, reducer: &str, args: Vec<JsonValue>) -> ClientMessage {
        ClientMessage::CallReducer {
            request_id,
            reducer: reducer.into(),
            args,
        }
    }

    #[test]
    fn test_reducer_names_roundtrip() {
        for kind in ReducerKind::ALL {
            assert_eq!(ReducerKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ReducerKind::from_name("drop_table"), None);
    }

    #[test]
    fn test_calls_send_positional_args() {
        let (transport, gateway) = connected();
        gateway.send_message("hello").unwrap();
        gateway.set_name("Alice").unwrap();
        gateway.create_game(9).unwrap();
        gateway.join_game(4).unwrap();
        gateway.place_stone(4, 2, 3).unwrap();

        assert_eq!(
            transport.sent(),
            vec![
                call(1, "send_message", vec![json!("hello")]),
                call(2, "set_name", vec![json!("Alice")]),
                call(3, "create_game", vec![json!(9)]),
                call(4, "join_game", vec![json!(4)]),
                call(5, "place_stone", vec![json!(4), json!(2), json!(3)]),
            ]
        );
        assert_eq!(gateway.in_flight(), 5);
    }

    #[test]
    fn test_call_without_session() {
        let connection = Rc::new(ConnectionManager::new(Box::new(RecordingTransport::new())));
        let gateway = ReducerGateway::new(connection);
        assert_eq!(gateway.send_message("hi"), Err(Error::NotConnected));
        assert_eq!(gateway.in_flight(), 0);
    }

    #[test]
    fn test_results_reach_kind_listeners() {
        let (_transport, gateway) = connected();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _h = gateway.on_result(ReducerKind::SetName, move |e| sink.borrow_mut().push(e.clone()));
        let other = Rc::new(Cell::new(0));
        let o = other.clone();
        let _g = gateway.on_result(ReducerKind::CreateGame, move |_| o.set(o.get() + 1));

        let id = gateway.set_name("").unwrap();
        let event = gateway
            .handle_result(
                id,
                "set_name",
                ReducerOutcome::Failed {
                    message: "Names must not be empty".into(),
                },
            )
            .unwrap();

        assert!(!event.is_committed());
        assert_eq!(event.outcome.as_ref().unwrap_err().kind(), ErrorKind::ReducerInvocation);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(other.get(), 0);
        assert_eq!(gateway.in_flight(), 0);
    }

    #[test]
    fn test_reset_forgets_unsettled_calls() {
        let (transport, gateway) = connected();
        gateway.send_message("one").unwrap();
        gateway.send_message("two").unwrap();
        assert_eq!(gateway.in_flight(), 2);

        gateway.reset();
        assert_eq!(gateway.in_flight(), 0);

        let id = gateway.send_message("three").unwrap();
        assert_eq!(id, 3);
        assert_eq!(transport.sent().len(), 3);
        assert_eq!(gateway.in_flight(), 1);
    }

    #[test]
    fn test_result_for_unknown_request_falls_back_to_name() {
        let (_transport, gateway) = connected();
        let event = gateway
            .handle_result(42, "join_game", ReducerOutcome::Committed)
            .unwrap();
        assert_eq!(event.kind, ReducerKind::JoinGame);
        assert!(event.is_committed());

        let err = gateway
            .handle_result(43, "drop_table", ReducerOutcome::Committed)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
