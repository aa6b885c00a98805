//! Composition root.
//!
//! `ClientContext` owns everything one client session needs: the connection
//! and subscription managers, the reducer gateway, the three mirrors and the
//! views derived from them. The embedding application creates one context,
//! feeds every inbound frame through [`ClientContext::handle_message`] on a
//! single event queue, and calls [`ClientContext::teardown`] when done.

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::protocol::{decode_row, RowOp, ServerMessage};
use crate::reducer::ReducerGateway;
use crate::subscription::SubscriptionManager;
use crate::token::{saved_token, TokenStore};
use crate::transport::{ConnectRequest, Transport};
use goban_core::{Error, Game, Identity, Message, Result, User};
use goban_mirror::{ListenerHandle, ListenerSet, TableMirror, TableRow};
use goban_reactive::{MessageFeed, NameResolver, PresenceLog};
use serde::de::DeserializeOwned;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub struct ClientContext {
    config: ClientConfig,
    connection: Rc<ConnectionManager>,
    subscriptions: SubscriptionManager,
    reducers: ReducerGateway,
    token_store: RefCell<Box<dyn TokenStore>>,
    messages: Rc<TableMirror<Message>>,
    users: Rc<TableMirror<User>>,
    games: Rc<TableMirror<Game>>,
    feed: MessageFeed,
    presence: PresenceLog,
    names: NameResolver,
    errors: ListenerSet<Error>,
    torn_down: Cell<bool>,
}

impl ClientContext {
    /// Creates a context with empty mirrors. Fails if `config` is invalid.
    pub fn new<T, S>(config: ClientConfig, transport: T, token_store: S) -> Result<Self>
    where
        T: Transport + 'static,
        S: TokenStore + 'static,
    {
        config.validate()?;
        let connection = Rc::new(ConnectionManager::new(Box::new(transport)));
        let messages = Rc::new(TableMirror::new());
        let users = Rc::new(TableMirror::new());
        let games = Rc::new(TableMirror::new());

        Ok(Self {
            subscriptions: SubscriptionManager::new(connection.clone()),
            reducers: ReducerGateway::new(connection.clone()),
            connection,
            token_store: RefCell::new(Box::new(token_store)),
            feed: MessageFeed::new(&messages, &users),
            presence: PresenceLog::new(&users),
            names: NameResolver::new(users.clone()),
            messages,
            users,
            games,
            config,
            errors: ListenerSet::new(),
            torn_down: Cell::new(false),
        })
    }

    /// Starts a connect attempt with the saved token, if any.
    pub fn connect(&self) -> Result<()> {
        if self.torn_down.get() {
            return Err(Error::NotConnected);
        }
        let request = ConnectRequest {
            uri: self.config.uri.clone(),
            module_name: self.config.module_name.clone(),
            token: self.saved_token(),
        };
        self.connection.connect(request).map_err(|e| self.report(e))
    }

    /// Closes the current session at the caller's request.
    pub fn disconnect(&self) {
        self.connection.disconnect();
        self.subscriptions.reset();
        self.reducers.reset();
    }

    /// Decodes and handles one inbound JSON frame.
    pub fn handle_frame(&self, frame: &str) -> Result<()> {
        let message = ServerMessage::decode(frame).map_err(|e| {
            tracing::warn!(error = %e, "undecodable frame dropped");
            self.report(e)
        })?;
        self.handle_message(message)
    }

    /// Handles one inbound message.
    ///
    /// Every error is logged and passed to the error listeners before it is
    /// returned; none of them leaves a mirror partially updated.
    pub fn handle_message(&self, message: ServerMessage) -> Result<()> {
        if self.torn_down.get() {
            tracing::debug!("message after teardown ignored");
            return Ok(());
        }
        match message {
            ServerMessage::IdentityToken { identity, token } => self.on_identity(identity, token),
            ServerMessage::ConnectRejected { message } => {
                Err(self.report(self.connection.handle_rejected(message)))
            }
            ServerMessage::Disconnected { reason } => {
                self.subscriptions.reset();
                self.reducers.reset();
                match self.connection.handle_disconnect(reason) {
                    Some(err) => Err(self.report(err)),
                    None => Ok(()),
                }
            }
            ServerMessage::SubscribeApplied { query_id } => self
                .subscriptions
                .handle_applied(query_id)
                .map_err(|e| self.report(e)),
            ServerMessage::SubscriptionError { query_id, message } => {
                let err = match self.subscriptions.handle_error(query_id, message) {
                    Ok(err) | Err(err) => err,
                };
                Err(self.report(err))
            }
            ServerMessage::TableUpdate { table, ops } => self.apply_table_update(&table, ops),
            ServerMessage::ReducerResult {
                request_id,
                reducer,
                outcome,
            } => {
                let event = self
                    .reducers
                    .handle_result(request_id, &reducer, outcome)
                    .map_err(|e| self.report(e))?;
                match event.outcome {
                    Ok(()) => Ok(()),
                    Err(err) => Err(self.report(err)),
                }
            }
        }
    }

    fn on_identity(&self, identity: Identity, token: String) -> Result<()> {
        // Connection listeners see the renewed token and empty mirrors.
        self.connection
            .handle_identity_with(identity, token, |session| {
                self.token_store
                    .borrow_mut()
                    .set(&self.config.token_key, &session.token);
                self.messages.clear();
                self.users.clear();
                self.games.clear();
                self.subscriptions.reset();
                self.reducers.reset();
            })
            .map_err(|e| self.report(e))?;
        self.subscriptions
            .subscribe_all(&self.config.queries)
            .map(|_| ())
            .map_err(|e| self.report(e))
    }

    /// Applies one relation's row operations in order. A malformed op is
    /// reported and skipped; the rest of the batch is still applied.
    pub fn apply_table_update(&self, table: &str, ops: Vec<RowOp>) -> Result<()> {
        match table {
            t if t == Message::TABLE => self.apply_ops(&self.messages, ops),
            t if t == User::TABLE => self.apply_ops(&self.users, ops),
            t if t == Game::TABLE => self.apply_ops(&self.games, ops),
            other => {
                tracing::warn!(table = other, ops = ops.len(), "rows for unknown table dropped");
                Ok(())
            }
        }
    }

    fn apply_ops<R>(&self, mirror: &TableMirror<R>, ops: Vec<RowOp>) -> Result<()>
    where
        R: TableRow + DeserializeOwned,
    {
        let mut first_error = None;
        for op in ops {
            let applied = match op {
                RowOp::Insert { row } => {
                    decode_row::<R>(R::TABLE, row).and_then(|row| mirror.apply_insert(row))
                }
                RowOp::Update { old, new } => decode_row::<R>(R::TABLE, old)
                    .and_then(|old| decode_row::<R>(R::TABLE, new).map(|new| (old, new)))
                    .and_then(|(old, new)| mirror.apply_update(old, new)),
                RowOp::Delete { row } => {
                    decode_row::<R>(R::TABLE, row).and_then(|row| mirror.apply_delete(row))
                }
            };
            if let Err(err) = applied {
                let err = self.report(err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Registers a listener for every error the context handles.
    pub fn on_error<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Error) + 'static,
    {
        self.errors.subscribe(listener)
    }

    /// Releases every listener registration the context made and closes the
    /// transport. Safe to call more than once.
    pub fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        self.feed.teardown();
        self.presence.teardown();
        self.connection.disconnect();
        self.subscriptions.reset();
        self.reducers.reset();
        self.errors.clear();
        tracing::info!("client context torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn messages(&self) -> &Rc<TableMirror<Message>> {
        &self.messages
    }

    pub fn users(&self) -> &Rc<TableMirror<User>> {
        &self.users
    }

    pub fn games(&self) -> &Rc<TableMirror<Game>> {
        &self.games
    }

    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    pub fn presence(&self) -> &PresenceLog {
        &self.presence
    }

    pub fn names(&self) -> &NameResolver {
        &self.names
    }

    pub fn reducers(&self) -> &ReducerGateway {
        &self.reducers
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.connection.identity()
    }

    /// Display name of the local identity, once connected.
    pub fn own_display_name(&self) -> Option<String> {
        self.identity().map(|identity| self.names.resolve(&identity))
    }

    /// The token currently saved under the configured key.
    pub fn saved_token(&self) -> Option<String> {
        saved_token(&**self.token_store.borrow(), &self.config.token_key)
    }

    fn report(&self, error: Error) -> Error {
        tracing::debug!(kind = ?error.kind(), error = %error, "reporting error");
        self.errors.notify(&error);
        error
    }
}

impl Drop for ClientContext {
    fn drop(&mut self) {
        self.teardown();
    }
}
