//! Subscription manager: issues the configured queries once per session and
//! tracks whether each one was applied.

use crate::connection::{ConnectionManager, SessionId};
use crate::protocol::{ClientMessage, QueryId};
use goban_core::{Error, Result};
use goban_mirror::{ListenerHandle, ListenerSet};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Lifecycle of one subscription query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    Pending,
    Applied,
    Failed,
}

/// Tracked state of one issued query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryState {
    pub id: QueryId,
    pub query: String,
    pub status: QueryStatus,
    /// Diagnostic from the remote service once `Failed`.
    pub error: Option<String>,
}

/// Delivered to subscription listeners.
#[derive(Clone, Debug, PartialEq)]
pub enum SubscriptionEvent {
    /// The query's initial rows are in the mirror ("cache ready").
    Applied { query_id: QueryId, query: String },
    /// The query was rejected. Sibling queries are unaffected.
    Failed { query_id: QueryId, error: Error },
}

pub struct SubscriptionManager {
    connection: Rc<ConnectionManager>,
    queries: RefCell<Vec<QueryState>>,
    session: Cell<Option<SessionId>>,
    /// Never reset, so replies addressed to an earlier session never match.
    next_query_id: Cell<QueryId>,
    events: ListenerSet<SubscriptionEvent>,
}

impl SubscriptionManager {
    pub fn new(connection: Rc<ConnectionManager>) -> Self {
        Self {
            connection,
            queries: RefCell::new(Vec::new()),
            session: Cell::new(None),
            next_query_id: Cell::new(1),
            events: ListenerSet::new(),
        }
    }

    /// Issues every query in `queries` as its own subscription on the
    /// current session.
    ///
    /// Calling this again for the same session is a no-op that returns the
    /// ids already issued. A query whose frame cannot be sent is marked
    /// `Failed` and reported; the others are still issued.
    pub fn subscribe_all(&self, queries: &[String]) -> Result<Vec<QueryId>> {
        let session = self.connection.session_id().ok_or(Error::NotConnected)?;
        if self.session.get() == Some(session) {
            return Ok(self.queries.borrow().iter().map(|q| q.id).collect());
        }

        self.session.set(Some(session));
        self.queries.borrow_mut().clear();

        let mut ids = Vec::with_capacity(queries.len());
        for query in queries {
            let id = self.next_query_id.get();
            self.next_query_id.set(id + 1);
            self.queries.borrow_mut().push(QueryState {
                id,
                query: query.clone(),
                status: QueryStatus::Pending,
                error: None,
            });
            ids.push(id);

            tracing::debug!(query_id = id, query = %query, "subscribing");
            let sent = self.connection.send(ClientMessage::Subscribe {
                query_id: id,
                query: query.clone(),
            });
            if let Err(err) = sent {
                self.fail(id, err.to_string());
            }
        }
        Ok(ids)
    }

    /// Marks a query applied. Repeated acknowledgements are ignored.
    pub fn handle_applied(&self, query_id: QueryId) -> Result<()> {
        let query = {
            let mut queries = self.queries.borrow_mut();
            let state = queries
                .iter_mut()
                .find(|q| q.id == query_id)
                .ok_or_else(|| Error::protocol(format!("applied for unknown query {}", query_id)))?;
            if state.status == QueryStatus::Applied {
                tracing::debug!(query_id, "duplicate subscription ack");
                return Ok(());
            }
            state.status = QueryStatus::Applied;
            state.error = None;
            state.query.clone()
        };
        tracing::info!(query_id, query = %query, "subscription applied");
        self.events
            .notify(&SubscriptionEvent::Applied { query_id, query });
        Ok(())
    }

    /// Marks a query failed and returns the reported error.
    pub fn handle_error(&self, query_id: QueryId, message: impl Into<String>) -> Result<Error> {
        if !self.queries.borrow().iter().any(|q| q.id == query_id) {
            return Err(Error::protocol(format!("error for unknown query {}", query_id)));
        }
        Ok(self.fail(query_id, message.into()))
    }

    /// Forgets the current session's queries.
    pub fn reset(&self) {
        self.session.set(None);
        self.queries.borrow_mut().clear();
    }

    pub fn status(&self, query_id: QueryId) -> Option<QueryStatus> {
        self.queries
            .borrow()
            .iter()
            .find(|q| q.id == query_id)
            .map(|q| q.status)
    }

    /// Status of a query by its text, within the current session.
    pub fn status_of(&self, query: &str) -> Option<QueryStatus> {
        self.queries
            .borrow()
            .iter()
            .find(|q| q.query == query)
            .map(|q| q.status)
    }

    /// True once every issued query is applied.
    pub fn all_applied(&self) -> bool {
        let queries = self.queries.borrow();
        !queries.is_empty() && queries.iter().all(|q| q.status == QueryStatus::Applied)
    }

    pub fn queries(&self) -> Vec<QueryState> {
        self.queries.borrow().clone()
    }

    pub fn on_event<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&SubscriptionEvent) + 'static,
    {
        self.events.subscribe(listener)
    }

    fn fail(&self, query_id: QueryId, message: String) -> Error {
        let error = {
            let mut queries = self.queries.borrow_mut();
            let query = match queries.iter_mut().find(|q| q.id == query_id) {
                Some(state) => {
                    state.status = QueryStatus::Failed;
                    state.error = Some(message.clone());
                    state.query.clone()
                }
                None => String::new(),
            };
            Error::subscription(query, message)
        };
        tracing::warn!(query_id, error = %error, "subscription failed");
        self.events.notify(&SubscriptionEvent::Failed {
            query_id,
            error: error.clone(),
        });
        error
    }
}
