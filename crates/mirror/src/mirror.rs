//! Table mirror: the local copy of one remote relation.
//!
//! A `TableMirror` applies insert/update/delete events in delivery order and
//! notifies listeners synchronously after every successful apply. Events
//! that reference a row the mirror does not hold are dropped with a
//! `MalformedEvent` error; the mirror is left untouched in that case.
//!
//! All methods take `&self`. The mirror is meant to be shared as
//! `Rc<TableMirror<R>>` on a single logical event queue, and no internal
//! borrow is held while listeners run, so a listener may read the mirror
//! it is registered on.

use crate::change::{RowChange, RowPosition};
use crate::listener::{ListenerHandle, ListenerSet};
use crate::snapshot::Snapshot;
use crate::table::{KeyPolicy, TableRow};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use goban_core::{Error, Result};
use hashbrown::HashMap;

struct MirrorState<R: TableRow> {
    /// Position → row, iterated in arrival order.
    rows: BTreeMap<RowPosition, Rc<R>>,
    /// Key → positions holding that key, oldest first.
    index: HashMap<R::Key, Vec<RowPosition>>,
    next_position: RowPosition,
    version: u64,
    cached: Option<Snapshot<R>>,
}

impl<R: TableRow> MirrorState<R> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            index: HashMap::new(),
            next_position: 0,
            version: 0,
            cached: None,
        }
    }

    fn first_position(&self, key: &R::Key) -> Option<RowPosition> {
        self.index.get(key).and_then(|positions| positions.first().copied())
    }

    fn allocate(&mut self) -> RowPosition {
        let position = self.next_position;
        self.next_position += 1;
        position
    }

    fn index_add(&mut self, key: R::Key, position: RowPosition) {
        self.index.entry(key).or_default().push(position);
    }

    fn index_remove(&mut self, key: &R::Key, position: RowPosition) {
        if let Some(positions) = self.index.get_mut(key) {
            positions.retain(|p| *p != position);
            if positions.is_empty() {
                self.index.remove(key);
            }
        }
    }

    fn touch(&mut self) {
        self.version += 1;
        self.cached = None;
    }
}

/// In-memory mirror of a single relation.
pub struct TableMirror<R: TableRow> {
    state: RefCell<MirrorState<R>>,
    listeners: ListenerSet<RowChange<R>>,
}

impl<R: TableRow> Default for TableMirror<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TableRow> TableMirror<R> {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MirrorState::new()),
            listeners: ListenerSet::new(),
        }
    }

    /// Returns the relation name.
    #[inline]
    pub fn table(&self) -> &'static str {
        R::TABLE
    }

    /// Applies an insert event.
    ///
    /// On a primary-key relation an insert whose key is already present
    /// replaces the existing row in place (last write wins).
    pub fn apply_insert(&self, row: R) -> Result<()> {
        let key = row.key();
        let row = Rc::new(row);
        let change = {
            let mut state = self.state.borrow_mut();
            let existing = match R::KEY_POLICY {
                KeyPolicy::PrimaryKey => state.first_position(&key),
                KeyPolicy::RowTuple => None,
            };
            let change = match existing {
                Some(position) => {
                    tracing::warn!(table = R::TABLE, key = ?key, "insert replaced an existing row");
                    let replaced = state.rows.insert(position, row.clone());
                    RowChange::Insert {
                        position,
                        row,
                        replaced,
                    }
                }
                None => {
                    let position = state.allocate();
                    state.rows.insert(position, row.clone());
                    state.index_add(key, position);
                    RowChange::Insert {
                        position,
                        row,
                        replaced: None,
                    }
                }
            };
            state.touch();
            change
        };
        tracing::debug!(table = R::TABLE, position = ?change.position(), "applied insert");
        self.listeners.notify(&change);
        Ok(())
    }

    /// Applies an update event.
    ///
    /// The row stored under `key(old)` is replaced by `new`, keeping its
    /// position. Relations keyed by the row tuple reject updates.
    pub fn apply_update(&self, old: R, new: R) -> Result<()> {
        if R::KEY_POLICY == KeyPolicy::RowTuple {
            tracing::warn!(table = R::TABLE, "update dropped: relation has no primary key");
            return Err(Error::UnsupportedUpdate { table: R::TABLE });
        }

        let old_key = old.key();
        let new_key = new.key();
        let new = Rc::new(new);
        let changes = {
            let mut state = self.state.borrow_mut();
            let position = match state.first_position(&old_key) {
                Some(position) => position,
                None => {
                    drop(state);
                    tracing::warn!(table = R::TABLE, key = ?old_key, "update dropped: no such row");
                    return Err(Error::malformed_event(
                        R::TABLE,
                        format!("update for absent key {:?}", old_key),
                    ));
                }
            };

            let mut changes = Vec::with_capacity(2);
            if new_key != old_key {
                tracing::warn!(table = R::TABLE, old = ?old_key, new = ?new_key, "update changed the primary key");
                // The new key may already belong to another row; that row goes.
                if let Some(other) = state.first_position(&new_key) {
                    if let Some(row) = state.rows.remove(&other) {
                        state.index_remove(&new_key, other);
                        changes.push(RowChange::Delete {
                            position: other,
                            row,
                        });
                    }
                }
                state.index_remove(&old_key, position);
                state.index_add(new_key, position);
            }

            let previous = state.rows.insert(position, new.clone());
            if let Some(old) = previous {
                changes.push(RowChange::Update { position, old, new });
            }
            state.touch();
            changes
        };
        tracing::debug!(table = R::TABLE, "applied update");
        for change in &changes {
            self.listeners.notify(change);
        }
        Ok(())
    }

    /// Applies a delete event.
    ///
    /// Primary-key relations match by key. Row-tuple relations match by full
    /// row equality and remove the oldest matching row.
    pub fn apply_delete(&self, row: R) -> Result<()> {
        let key = row.key();
        let change = {
            let mut state = self.state.borrow_mut();
            let removed = state
                .first_position(&key)
                .and_then(|position| state.rows.remove(&position).map(|row| (position, row)));
            match removed {
                Some((position, row)) => {
                    state.index_remove(&key, position);
                    state.touch();
                    RowChange::Delete { position, row }
                }
                None => {
                    drop(state);
                    tracing::warn!(table = R::TABLE, key = ?key, "delete dropped: no such row");
                    return Err(Error::malformed_event(
                        R::TABLE,
                        format!("delete for absent key {:?}", key),
                    ));
                }
            }
        };
        tracing::debug!(table = R::TABLE, position = ?change.position(), "applied delete");
        self.listeners.notify(&change);
        Ok(())
    }

    /// Empties the mirror and notifies listeners with `RowChange::Reset`.
    pub fn clear(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.rows.clear();
            state.index.clear();
            state.touch();
        }
        tracing::debug!(table = R::TABLE, "mirror reset");
        self.listeners.notify(&RowChange::Reset);
    }

    /// Returns an immutable snapshot of the current rows, in arrival order.
    pub fn snapshot(&self) -> Snapshot<R> {
        let mut state = self.state.borrow_mut();
        if let Some(snapshot) = &state.cached {
            return snapshot.clone();
        }
        let rows: Vec<Rc<R>> = state.rows.values().cloned().collect();
        let snapshot = Snapshot::new(rows, state.version);
        state.cached = Some(snapshot.clone());
        snapshot
    }

    /// Returns the current rows paired with their arrival positions.
    pub fn positioned_rows(&self) -> Vec<(RowPosition, Rc<R>)> {
        self.state
            .borrow()
            .rows
            .iter()
            .map(|(position, row)| (*position, row.clone()))
            .collect()
    }

    /// Looks up a row by key. For row-tuple relations the oldest match is
    /// returned.
    pub fn get(&self, key: &R::Key) -> Option<Rc<R>> {
        let state = self.state.borrow();
        state
            .first_position(key)
            .and_then(|position| state.rows.get(&position).cloned())
    }

    /// Returns the row at an arrival position.
    pub fn get_at(&self, position: RowPosition) -> Option<Rc<R>> {
        self.state.borrow().rows.get(&position).cloned()
    }

    /// Returns true if a row with `key` is present.
    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.state.borrow().index.contains_key(key)
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.state.borrow().rows.len()
    }

    /// Returns true if the mirror holds no rows.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().rows.is_empty()
    }

    /// Returns the mutation counter. Every successful apply bumps it.
    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Registers a change listener.
    pub fn on_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&RowChange<R>) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use alloc::string::String;
    use alloc::vec;
    use core::cell::Cell;
    use goban_core::{ErrorKind, Game, Identity, Message, User, IDENTITY_LEN};

    fn identity(byte: u8) -> Identity {
        Identity::new([byte; IDENTITY_LEN])
    }

    fn user(byte: u8, name: Option<&str>, online: bool) -> User {
        User::new(identity(byte), name.map(String::from), online)
    }

    #[test]
    fn test_mirror_insert_and_get() {
        let mirror: TableMirror<User> = TableMirror::new();
        mirror.apply_insert(user(1, Some("Alice"), true)).unwrap();

        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror.get(&identity(1)).unwrap().name.as_deref(), Some("Alice"));
        assert!(mirror.contains_key(&identity(1)));
        assert!(!mirror.contains_key(&identity(2)));
    }

    #[test]
    fn test_mirror_duplicate_insert_replaces() {
        let mirror: TableMirror<User> = TableMirror::new();
        mirror.apply_insert(user(1, Some("Alice"), true)).unwrap();
        mirror.apply_insert(user(2, None, true)).unwrap();
        mirror.apply_insert(user(1, Some("Alicia"), false)).unwrap();

        let snapshot = mirror.snapshot();
        assert_eq!(snapshot.len(), 2);
        // Replaced row keeps its arrival position.
        assert_eq!(snapshot.get(0).unwrap().name.as_deref(), Some("Alicia"));
    }

    #[test]
    fn test_mirror_update_keeps_position() {
        let mirror: TableMirror<Game> = TableMirror::new();
        mirror.apply_insert(Game::new(1, 9, None)).unwrap();
        mirror.apply_insert(Game::new(2, 9, None)).unwrap();

        let mut joined = Game::new(1, 9, None);
        joined.player_white = Some(identity(5));
        mirror.apply_update(Game::new(1, 9, None), joined.clone()).unwrap();

        let snapshot = mirror.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(0).map(|g| g.as_ref()), Some(&joined));
    }

    #[test]
    fn test_mirror_update_absent_is_malformed() {
        let mirror: TableMirror<Game> = TableMirror::new();
        mirror.apply_insert(Game::new(1, 9, None)).unwrap();
        let version = mirror.version();

        let err = mirror
            .apply_update(Game::new(9, 9, None), Game::new(9, 9, None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEvent);
        assert_eq!(mirror.version(), version);
        assert!(!mirror.contains_key(&9));
    }

    #[test]
    fn test_mirror_update_with_changed_key() {
        let mirror: TableMirror<Game> = TableMirror::new();
        mirror.apply_insert(Game::new(1, 9, None)).unwrap();
        mirror.apply_insert(Game::new(2, 9, None)).unwrap();

        mirror
            .apply_update(Game::new(1, 9, None), Game::new(2, 13, None))
            .unwrap();

        assert_eq!(mirror.len(), 1);
        assert!(!mirror.contains_key(&1));
        assert_eq!(mirror.get(&2).unwrap().board_size, 13);
    }

    #[test]
    fn test_mirror_delete_absent_game_is_malformed() {
        let mirror: TableMirror<Game> = TableMirror::new();
        mirror.apply_insert(Game::new(1, 9, None)).unwrap();
        let before = mirror.snapshot();

        let err = mirror.apply_delete(Game::new(7, 9, None)).unwrap_err();
        assert!(matches!(err, Error::MalformedEvent { table: "game", .. }));
        assert_eq!(mirror.snapshot(), before);
        assert_eq!(mirror.snapshot().version(), before.version());
    }

    #[test]
    fn test_mirror_message_update_unsupported() {
        let mirror: TableMirror<Message> = TableMirror::new();
        let msg = Message::new(identity(1), "hi", 100);
        mirror.apply_insert(msg.clone()).unwrap();

        let err = mirror
            .apply_update(msg.clone(), Message::new(identity(1), "edited", 100))
            .unwrap_err();
        assert_eq!(err, Error::UnsupportedUpdate { table: "message" });
        assert_eq!(mirror.snapshot().get(0).map(|m| m.as_ref()), Some(&msg));
    }

    #[test]
    fn test_mirror_message_duplicates_and_tuple_delete() {
        let mirror: TableMirror<Message> = TableMirror::new();
        let msg = Message::new(identity(1), "hi", 100);
        mirror.apply_insert(msg.clone()).unwrap();
        mirror.apply_insert(Message::new(identity(2), "yo", 100)).unwrap();
        mirror.apply_insert(msg.clone()).unwrap();
        assert_eq!(mirror.len(), 3);

        mirror.apply_delete(msg.clone()).unwrap();
        let snapshot = mirror.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(0).unwrap().text, "yo");
        assert_eq!(snapshot.get(1).map(|m| m.as_ref()), Some(&msg));

        // Only an exact tuple match is removed.
        let err = mirror.apply_delete(Message::new(identity(2), "yo", 101));
        assert!(err.is_err());
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn test_mirror_on_change_receives_every_apply() {
        let mirror: TableMirror<User> = TableMirror::new();
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let sink = kinds.clone();
        let handle = mirror.on_change(move |change| sink.borrow_mut().push(change.kind()));

        mirror.apply_insert(user(1, None, true)).unwrap();
        mirror
            .apply_update(user(1, None, true), user(1, Some("A"), true))
            .unwrap();
        let _ = mirror.apply_delete(user(2, None, true));
        mirror.apply_delete(user(1, Some("A"), true)).unwrap();
        mirror.clear();

        assert_eq!(
            *kinds.borrow(),
            vec![
                ChangeKind::Insert,
                ChangeKind::Update,
                ChangeKind::Delete,
                ChangeKind::Reset
            ]
        );

        handle.cancel();
        mirror.apply_insert(user(3, None, true)).unwrap();
        assert_eq!(kinds.borrow().len(), 4);
    }

    #[test]
    fn test_listener_can_read_mirror() {
        let mirror: Rc<TableMirror<User>> = Rc::new(TableMirror::new());
        let seen = Rc::new(Cell::new(0));
        let reader = Rc::downgrade(&mirror);
        let sink = seen.clone();
        let _handle = mirror.on_change(move |_| {
            if let Some(m) = reader.upgrade() {
                sink.set(m.snapshot().len());
            }
        });

        mirror.apply_insert(user(1, None, true)).unwrap();
        mirror.apply_insert(user(2, None, true)).unwrap();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let mirror: TableMirror<User> = TableMirror::new();
        mirror.apply_insert(user(1, None, true)).unwrap();
        let before = mirror.snapshot();

        mirror.apply_insert(user(2, None, true)).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(mirror.snapshot().len(), 2);
        assert!(mirror.snapshot().version() > before.version());
    }

    #[test]
    fn test_snapshot_cached_until_mutation() {
        let mirror: TableMirror<User> = TableMirror::new();
        mirror.apply_insert(user(1, None, true)).unwrap();
        let a = mirror.snapshot();
        let b = mirror.snapshot();
        assert!(core::ptr::eq(a.rows().as_ptr(), b.rows().as_ptr()));
    }

    #[test]
    fn test_clear_empties_mirror() {
        let mirror: TableMirror<Game> = TableMirror::new();
        mirror.apply_insert(Game::new(1, 9, None)).unwrap();
        mirror.clear();
        assert!(mirror.is_empty());
        assert!(mirror.get(&1).is_none());

        mirror.apply_insert(Game::new(1, 9, None)).unwrap();
        assert_eq!(mirror.len(), 1);
    }
}
