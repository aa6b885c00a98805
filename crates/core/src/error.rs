//! Error types for the goban mirror and client.

use alloc::string::String;

/// Result type alias for goban operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Coarse error categories, used by callers that only route on the kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Failed handshake or authentication.
    Connection,
    /// A specific subscription query was rejected.
    Subscription,
    /// A row event referenced a row the mirror does not hold.
    MalformedEvent,
    /// A remote procedure call was rejected.
    ReducerInvocation,
    /// A wire frame could not be decoded.
    Protocol,
    /// Invalid client configuration.
    Config,
    /// The caller used the API out of order (e.g. calling a reducer offline).
    Usage,
}

/// Error types for goban operations.
///
/// None of these are fatal: the worst outcome of any of them is a stale
/// snapshot, never a corrupted one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Handshake or authentication failed.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// A subscription query was rejected by the remote service.
    #[error("subscription to `{query}` failed: {message}")]
    Subscription { query: String, message: String },

    /// A row event could not be matched against the mirror.
    #[error("malformed event on table {table}: {message}")]
    MalformedEvent { table: &'static str, message: String },

    /// Update event on a relation whose rows carry no primary key.
    #[error("update is not defined for table {table}")]
    UnsupportedUpdate { table: &'static str },

    /// A remote procedure was rejected.
    #[error("reducer {reducer} failed: {message}")]
    ReducerInvocation { reducer: String, message: String },

    /// A hex identity could not be parsed.
    #[error("invalid identity: {message}")]
    InvalidIdentity { message: String },

    /// The operation needs an established session.
    #[error("not connected")]
    NotConnected,

    /// A connect attempt was made while a session is open or pending.
    #[error("a session is already active or connecting")]
    AlreadyConnected,

    /// A wire frame could not be decoded or encoded.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Invalid configuration.
    #[error("invalid config: {message}")]
    Config { message: String },
}

impl Error {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            message: message.into(),
        }
    }

    /// Creates a subscription error.
    pub fn subscription(query: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Subscription {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed event error.
    pub fn malformed_event(table: &'static str, message: impl Into<String>) -> Self {
        Error::MalformedEvent {
            table,
            message: message.into(),
        }
    }

    /// Creates a reducer invocation error.
    pub fn reducer(reducer: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ReducerInvocation {
            reducer: reducer.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid identity error.
    pub fn invalid_identity(message: impl Into<String>) -> Self {
        Error::InvalidIdentity {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    /// Creates a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Returns the coarse category of this error.
    ///
    /// `UnsupportedUpdate` is reported as a malformed event.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Subscription { .. } => ErrorKind::Subscription,
            Error::MalformedEvent { .. } | Error::UnsupportedUpdate { .. } => {
                ErrorKind::MalformedEvent
            }
            Error::ReducerInvocation { .. } => ErrorKind::ReducerInvocation,
            Error::InvalidIdentity { .. } | Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Config { .. } => ErrorKind::Config,
            Error::NotConnected | Error::AlreadyConnected => ErrorKind::Usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::malformed_event("game", "no row with key 7");
        assert!(err.to_string().contains("game"));
        assert!(err.to_string().contains("no row with key 7"));

        let err = Error::subscription("SELECT * FROM user", "rejected");
        assert!(err.to_string().contains("SELECT * FROM user"));

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "not connected");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::connection("bad token").kind(), ErrorKind::Connection);
        assert_eq!(
            Error::UnsupportedUpdate { table: "message" }.kind(),
            ErrorKind::MalformedEvent
        );
        assert_eq!(Error::reducer("set_name", "empty").kind(), ErrorKind::ReducerInvocation);
        assert_eq!(Error::AlreadyConnected.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::reducer("place_stone", "occupied");
        match err {
            Error::ReducerInvocation { reducer, message } => {
                assert_eq!(reducer, "place_stone");
                assert_eq!(message, "occupied");
            }
            _ => panic!("Wrong error type"),
        }
    }
}
