//! Change notifications emitted by a table mirror.
//!
//! A `RowChange` tells listeners which row changed and how. Every row
//! carries the `RowPosition` it was assigned on arrival, so derived views
//! can match deletes and updates without re-scanning the mirror.

use alloc::rc::Rc;

/// Arrival position of a row inside one mirror. Positions are never reused
/// within the lifetime of a mirror, and an update keeps the row's position.
pub type RowPosition = u64;

/// The kind of a change, without the row payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Reset,
}

/// A single applied change.
#[derive(Debug)]
pub enum RowChange<R> {
    /// A row was inserted. `replaced` holds the previous row when the insert
    /// collided with an existing primary key and replaced it.
    Insert {
        position: RowPosition,
        row: Rc<R>,
        replaced: Option<Rc<R>>,
    },
    /// A row was updated in place.
    Update {
        position: RowPosition,
        old: Rc<R>,
        new: Rc<R>,
    },
    /// A row was removed.
    Delete { position: RowPosition, row: Rc<R> },
    /// The mirror was emptied, e.g. at the start of a new session.
    Reset,
}

impl<R> RowChange<R> {
    /// Returns the kind of this change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            RowChange::Insert { .. } => ChangeKind::Insert,
            RowChange::Update { .. } => ChangeKind::Update,
            RowChange::Delete { .. } => ChangeKind::Delete,
            RowChange::Reset => ChangeKind::Reset,
        }
    }

    /// Returns the position of the affected row, if any.
    pub fn position(&self) -> Option<RowPosition> {
        match self {
            RowChange::Insert { position, .. }
            | RowChange::Update { position, .. }
            | RowChange::Delete { position, .. } => Some(*position),
            RowChange::Reset => None,
        }
    }

    /// Returns the row as it is after the change, if it still exists.
    pub fn current(&self) -> Option<&Rc<R>> {
        match self {
            RowChange::Insert { row, .. } => Some(row),
            RowChange::Update { new, .. } => Some(new),
            RowChange::Delete { .. } | RowChange::Reset => None,
        }
    }

    /// Returns the row as it was before the change, if there was one.
    pub fn previous(&self) -> Option<&Rc<R>> {
        match self {
            RowChange::Insert { replaced, .. } => replaced.as_ref(),
            RowChange::Update { old, .. } => Some(old),
            RowChange::Delete { row, .. } => Some(row),
            RowChange::Reset => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_and_position() {
        let insert = RowChange::Insert {
            position: 3,
            row: Rc::new(10),
            replaced: None,
        };
        assert_eq!(insert.kind(), ChangeKind::Insert);
        assert_eq!(insert.position(), Some(3));
        assert_eq!(insert.current().map(|r| **r), Some(10));
        assert!(insert.previous().is_none());

        let reset: RowChange<i32> = RowChange::Reset;
        assert_eq!(reset.kind(), ChangeKind::Reset);
        assert_eq!(reset.position(), None);
    }

    #[test]
    fn test_change_previous_and_current() {
        let update = RowChange::Update {
            position: 1,
            old: Rc::new(1),
            new: Rc::new(2),
        };
        assert_eq!(update.previous().map(|r| **r), Some(1));
        assert_eq!(update.current().map(|r| **r), Some(2));

        let delete = RowChange::Delete {
            position: 1,
            row: Rc::new(2),
        };
        assert_eq!(delete.previous().map(|r| **r), Some(2));
        assert!(delete.current().is_none());
    }
}
