//! JSON wire messages exchanged with the remote service.
//!
//! Inbound frames decode into [`ServerMessage`]; outbound calls are built as
//! [`ClientMessage`]. Rows travel as untyped JSON values and are decoded
//! into the typed row of their relation by [`decode_row`].

use goban_core::{Error, Identity, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Client-assigned subscription query id.
pub type QueryId = u32;

/// Client-assigned reducer request id.
pub type RequestId = u64;

/// A single row operation inside a table update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RowOp {
    Insert { row: JsonValue },
    Update { old: JsonValue, new: JsonValue },
    Delete { row: JsonValue },
}

/// How the remote service settled a reducer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReducerOutcome {
    Committed,
    Failed { message: String },
}

/// Messages sent from the remote service to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted: the session identity and a renewed token.
    IdentityToken { identity: Identity, token: String },

    /// Handshake refused, e.g. because the token is invalid.
    ConnectRejected { message: String },

    /// The session was closed by the remote side or the transport.
    Disconnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// A subscription query was accepted and its initial rows delivered.
    SubscribeApplied { query_id: QueryId },

    /// A subscription query was rejected.
    SubscriptionError { query_id: QueryId, message: String },

    /// Row operations for one relation, in delivery order.
    TableUpdate { table: String, ops: Vec<RowOp> },

    /// Settlement of an earlier reducer call.
    ReducerResult {
        request_id: RequestId,
        reducer: String,
        outcome: ReducerOutcome,
    },
}

impl ServerMessage {
    /// Decodes one JSON text frame.
    pub fn decode(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| Error::protocol(e.to_string()))
    }

    /// Encodes this message as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::protocol(e.to_string()))
    }
}

/// Messages sent from the client to the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a session against a module, presenting a saved token if any.
    Connect {
        module_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Issues one declarative row-set query.
    Subscribe { query_id: QueryId, query: String },

    /// Invokes a remote procedure with positional arguments.
    CallReducer {
        request_id: RequestId,
        reducer: String,
        args: Vec<JsonValue>,
    },
}

impl ClientMessage {
    /// Encodes this message as a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::protocol(e.to_string()))
    }

    /// Decodes one JSON text frame.
    pub fn decode(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(|e| Error::protocol(e.to_string()))
    }

    /// Returns the message type tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Connect { .. } => "connect",
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::CallReducer { .. } => "call_reducer",
        }
    }
}

/// Decodes an untyped row of `table` into its typed form.
///
/// A row that does not match the relation's shape is a malformed event.
pub fn decode_row<R: DeserializeOwned>(table: &'static str, row: JsonValue) -> Result<R> {
    serde_json::from_value(row).map_err(|e| Error::malformed_event(table, e.to_string()))
}
