//! Presence transition log.

use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use goban_core::{Identity, User};
use goban_mirror::{ListenerHandle, ListenerSet, RowChange, TableMirror};

/// Direction of an online-flag flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transition {
    Connected,
    Disconnected,
}

impl Transition {
    /// Compares the online flag before and after a user row change.
    /// A row with no previous state counts as offline.
    pub fn between(previous: Option<&User>, current: &User) -> Option<Self> {
        let was_online = previous.is_some_and(|user| user.online);
        match (was_online, current.online) {
            (false, true) => Some(Transition::Connected),
            (true, false) => Some(Transition::Disconnected),
            _ => None,
        }
    }
}

/// One line of the presence log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceLine {
    pub identity: Identity,
    /// Display name of the row as it was after the change.
    pub name: String,
    pub transition: Transition,
}

impl fmt::Display for PresenceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transition {
            Transition::Connected => write!(f, "{} has connected.", self.name),
            Transition::Disconnected => write!(f, "{} has disconnected.", self.name),
        }
    }
}

struct PresenceInner {
    lines: RefCell<Vec<PresenceLine>>,
    listeners: ListenerSet<PresenceLine>,
}

impl PresenceInner {
    fn on_user_change(&self, change: &RowChange<User>) {
        let (previous, current) = match change {
            RowChange::Insert { row, replaced, .. } => (replaced.as_deref(), row.as_ref()),
            RowChange::Update { old, new, .. } => (Some(old.as_ref()), new.as_ref()),
            RowChange::Delete { .. } | RowChange::Reset => return,
        };
        let Some(transition) = Transition::between(previous, current) else {
            return;
        };

        let line = PresenceLine {
            identity: current.identity,
            name: current.display_name(),
            transition,
        };
        tracing::debug!(identity = %line.identity, "{}", line);
        self.lines.borrow_mut().push(line.clone());
        self.listeners.notify(&line);
    }
}

/// Append-only log of users connecting and disconnecting.
///
/// The log is never trimmed, and a reset of the user mirror does not clear
/// it: lines already written stay part of the session history.
pub struct PresenceLog {
    inner: Rc<PresenceInner>,
    handle: RefCell<Option<ListenerHandle>>,
}

impl PresenceLog {
    /// Starts following `users`. Rows already in the mirror produce no lines.
    pub fn new(users: &Rc<TableMirror<User>>) -> Self {
        let inner = Rc::new(PresenceInner {
            lines: RefCell::new(Vec::new()),
            listeners: ListenerSet::new(),
        });
        let weak: Weak<PresenceInner> = Rc::downgrade(&inner);
        let handle = users.on_change(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_user_change(change);
            }
        });
        Self {
            inner,
            handle: RefCell::new(Some(handle)),
        }
    }

    /// Returns the rendered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.inner.lines.borrow().iter().map(ToString::to_string).collect()
    }

    /// Returns the structured entries, oldest first.
    pub fn entries(&self) -> Vec<PresenceLine> {
        self.inner.lines.borrow().clone()
    }

    pub fn last(&self) -> Option<PresenceLine> {
        self.inner.lines.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lines.borrow().is_empty()
    }

    /// Returns the whole log as newline-separated text.
    pub fn text(&self) -> String {
        self.lines().join("\n")
    }

    /// Registers a listener invoked for each new line.
    pub fn on_line<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&PresenceLine) + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Stops following the user mirror. Idempotent.
    pub fn teardown(&self) {
        if let Some(handle) = self.handle.borrow_mut().take() {
            handle.cancel();
        }
        self.inner.listeners.clear();
    }
}

impl Drop for PresenceLog {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::cell::Cell;
    use goban_core::IDENTITY_LEN;

    fn identity(byte: u8) -> Identity {
        Identity::new([byte; IDENTITY_LEN])
    }

    fn user(byte: u8, name: Option<&str>, online: bool) -> User {
        User::new(identity(byte), name.map(String::from), online)
    }

    fn setup() -> (Rc<TableMirror<User>>, PresenceLog) {
        let users = Rc::new(TableMirror::new());
        let log = PresenceLog::new(&users);
        (users, log)
    }

    #[test]
    fn test_insert_online_uses_short_hex() {
        let (users, log) = setup();
        users.apply_insert(user(0xaa, None, true)).unwrap();
        assert_eq!(log.lines(), vec!["aaaaaaaa has connected."]);
    }

    #[test]
    fn test_insert_offline_emits_nothing() {
        let (users, log) = setup();
        users.apply_insert(user(1, Some("Alice"), false)).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_online_flips() {
        let (users, log) = setup();
        users.apply_insert(user(1, Some("Alice"), true)).unwrap();
        users
            .apply_update(user(1, Some("Alice"), true), user(1, Some("Alice"), false))
            .unwrap();
        users
            .apply_update(user(1, Some("Alice"), false), user(1, Some("Alice"), true))
            .unwrap();

        assert_eq!(
            log.lines(),
            vec!["Alice has connected.", "Alice has disconnected.", "Alice has connected."]
        );
    }

    #[test]
    fn test_update_without_flip_emits_nothing() {
        let (users, log) = setup();
        users.apply_insert(user(1, None, true)).unwrap();
        users
            .apply_update(user(1, None, true), user(1, Some("Alice"), true))
            .unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_uses_newer_row_name() {
        let (users, log) = setup();
        users.apply_insert(user(1, Some("Old"), true)).unwrap();
        users
            .apply_update(user(1, Some("Old"), true), user(1, Some("New"), false))
            .unwrap();
        assert_eq!(log.last().map(|l| l.to_string()).as_deref(), Some("New has disconnected."));
    }

    #[test]
    fn test_replacing_insert_compares_with_replaced_row() {
        let (users, log) = setup();
        users.apply_insert(user(1, None, true)).unwrap();
        // Duplicate insert of an online row is not a second connection.
        users.apply_insert(user(1, None, true)).unwrap();
        assert_eq!(log.len(), 1);

        users.apply_insert(user(1, None, false)).unwrap();
        assert_eq!(log.entries()[1].transition, Transition::Disconnected);
    }

    #[test]
    fn test_delete_and_reset_emit_nothing() {
        let (users, log) = setup();
        users.apply_insert(user(1, None, true)).unwrap();
        users.apply_delete(user(1, None, true)).unwrap();
        users.clear();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_text_and_on_line() {
        let (users, log) = setup();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let handle = log.on_line(move |_| c.set(c.get() + 1));

        users.apply_insert(user(0xaa, None, true)).unwrap();
        users.apply_insert(user(0xbb, Some("Bob"), true)).unwrap();
        assert_eq!(log.text(), "aaaaaaaa has connected.\nBob has connected.");
        assert_eq!(count.get(), 2);

        handle.cancel();
        users
            .apply_update(user(0xbb, Some("Bob"), true), user(0xbb, Some("Bob"), false))
            .unwrap();
        assert_eq!(count.get(), 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (users, log) = setup();
        log.teardown();
        log.teardown();
        assert_eq!(users.listener_count(), 0);
        users.apply_insert(user(1, None, true)).unwrap();
        assert!(log.is_empty());
    }
}
