//! Immutable snapshots of a mirror.

use alloc::rc::Rc;
use alloc::vec::Vec;

/// An immutable view of a mirror's rows, in arrival order.
///
/// Snapshots share their row storage: cloning is cheap, and a snapshot taken
/// before a mutation keeps showing the rows as they were.
#[derive(Debug)]
pub struct Snapshot<R> {
    rows: Rc<[Rc<R>]>,
    version: u64,
}

impl<R> Clone for Snapshot<R> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            version: self.version,
        }
    }
}

impl<R> Snapshot<R> {
    pub(crate) fn new(rows: Vec<Rc<R>>, version: u64) -> Self {
        Self {
            rows: rows.into(),
            version,
        }
    }

    /// Returns the mirror version this snapshot was taken at.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the snapshot holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row at `index` in arrival order.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Rc<R>> {
        self.rows.get(index)
    }

    /// Iterates the rows in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.iter().map(|r| r.as_ref())
    }

    /// Returns the shared row handles.
    #[inline]
    pub fn rows(&self) -> &[Rc<R>] {
        &self.rows
    }

    /// Returns the first row matching `pred`.
    pub fn find<P>(&self, mut pred: P) -> Option<&Rc<R>>
    where
        P: FnMut(&R) -> bool,
    {
        self.rows.iter().find(|r| pred(r))
    }
}

/// Snapshots compare by row contents, ignoring version.
impl<R: PartialEq> PartialEq for Snapshot<R> {
    fn eq(&self, other: &Self) -> bool {
        self.rows.len() == other.rows.len()
            && self.rows.iter().zip(other.rows.iter()).all(|(a, b)| a == b)
    }
}

impl<'a, R> IntoIterator for &'a Snapshot<R> {
    type Item = &'a Rc<R>;
    type IntoIter = core::slice::Iter<'a, Rc<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
