//! Time-ordered message feed.
//!
//! `MessageFeed` keeps the message mirror's rows sorted by
//! `(sent, arrival position)` and is updated incrementally from mirror
//! notifications: an insert or delete costs one binary search plus a shift.
//! Sender names are resolved when the feed is iterated, so a rename in the
//! user mirror re-annotates every entry without touching the sort order.

use crate::names::NameResolver;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use goban_core::{Identity, Message, Timestamp, User};
use goban_mirror::{ListenerHandle, ListenerSet, RowChange, RowPosition, TableMirror};

#[derive(Clone, Debug)]
struct FeedSlot {
    position: RowPosition,
    message: Rc<Message>,
}

impl FeedSlot {
    #[inline]
    fn sort_key(&self) -> (Timestamp, RowPosition) {
        (self.message.sent, self.position)
    }
}

/// One rendered feed entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedEntry {
    pub message: Rc<Message>,
    pub sender_name: String,
}

impl FeedEntry {
    #[inline]
    pub fn sender(&self) -> &Identity {
        &self.message.sender
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.message.text
    }

    #[inline]
    pub fn sent(&self) -> Timestamp {
        self.message.sent
    }
}

/// What changed in the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedChange {
    /// A message was placed at `index`.
    Inserted { index: usize },
    /// The message at `index` was removed.
    Removed { index: usize },
    /// A user row changed; entries from that sender may render differently.
    /// `None` means the whole user mirror was reset.
    NamesChanged { identity: Option<Identity> },
    /// The message mirror was emptied.
    Reset,
}

struct FeedInner {
    names: NameResolver,
    /// Copy-on-write, so iterators keep the order they started with.
    slots: RefCell<Rc<Vec<FeedSlot>>>,
    listeners: ListenerSet<FeedChange>,
    version: Cell<u64>,
}

impl FeedInner {
    fn search(slots: &[FeedSlot], key: (Timestamp, RowPosition)) -> core::result::Result<usize, usize> {
        slots.binary_search_by(|slot| slot.sort_key().cmp(&key))
    }

    fn insert(&self, position: RowPosition, message: Rc<Message>) -> usize {
        let slot = FeedSlot { position, message };
        let mut guard = self.slots.borrow_mut();
        let slots = Rc::make_mut(&mut guard);
        let index = match Self::search(slots, slot.sort_key()) {
            Ok(index) | Err(index) => index,
        };
        slots.insert(index, slot);
        index
    }

    fn remove(&self, position: RowPosition, message: &Message) -> Option<usize> {
        let mut slots = self.slots.borrow_mut();
        let index = Self::search(&slots, (message.sent, position)).ok()?;
        Rc::make_mut(&mut slots).remove(index);
        Some(index)
    }

    fn on_message_change(&self, change: &RowChange<Message>) {
        let mut events = Vec::with_capacity(2);
        match change {
            RowChange::Insert {
                position,
                row,
                replaced,
            } => {
                if let Some(old) = replaced {
                    if let Some(index) = self.remove(*position, old) {
                        events.push(FeedChange::Removed { index });
                    }
                }
                let index = self.insert(*position, row.clone());
                events.push(FeedChange::Inserted { index });
            }
            RowChange::Update { position, old, new } => {
                if let Some(index) = self.remove(*position, old) {
                    events.push(FeedChange::Removed { index });
                }
                let index = self.insert(*position, new.clone());
                events.push(FeedChange::Inserted { index });
            }
            RowChange::Delete { position, row } => match self.remove(*position, row) {
                Some(index) => events.push(FeedChange::Removed { index }),
                None => tracing::warn!(position = *position, "feed out of sync with message mirror"),
            },
            RowChange::Reset => {
                *self.slots.borrow_mut() = Rc::new(Vec::new());
                events.push(FeedChange::Reset);
            }
        }
        self.version.set(self.version.get() + 1);
        for event in &events {
            self.listeners.notify(event);
        }
    }

    fn on_user_change(&self, change: &RowChange<User>) {
        let identity = change
            .current()
            .or_else(|| change.previous())
            .map(|user| user.identity);
        self.version.set(self.version.get() + 1);
        self.listeners.notify(&FeedChange::NamesChanged { identity });
    }
}

/// Messages sorted ascending by sent timestamp, ties broken by arrival.
pub struct MessageFeed {
    inner: Rc<FeedInner>,
    handles: RefCell<Vec<ListenerHandle>>,
}

impl MessageFeed {
    /// Builds the feed from the current mirror contents and starts following
    /// both mirrors.
    pub fn new(messages: &Rc<TableMirror<Message>>, users: &Rc<TableMirror<User>>) -> Self {
        let mut slots: Vec<FeedSlot> = messages
            .positioned_rows()
            .into_iter()
            .map(|(position, message)| FeedSlot { position, message })
            .collect();
        slots.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let inner = Rc::new(FeedInner {
            names: NameResolver::new(users.clone()),
            slots: RefCell::new(Rc::new(slots)),
            listeners: ListenerSet::new(),
            version: Cell::new(0),
        });

        let weak: Weak<FeedInner> = Rc::downgrade(&inner);
        let on_message = messages.on_change(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_message_change(change);
            }
        });
        let weak: Weak<FeedInner> = Rc::downgrade(&inner);
        let on_user = users.on_change(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_user_change(change);
            }
        });

        Self {
            inner,
            handles: RefCell::new(alloc::vec![on_message, on_user]),
        }
    }

    /// Returns a lazy iterator over the feed as it is now.
    ///
    /// The iterator holds its own reference to the current order, so later
    /// mirror events do not affect it; clone it or call this again to restart.
    /// Names are resolved against the user mirror at the moment each entry
    /// is yielded.
    pub fn ordered_messages(&self) -> OrderedMessages {
        OrderedMessages {
            slots: self.inner.slots.borrow().clone(),
            names: self.inner.names.clone(),
            next: 0,
        }
    }

    /// Returns the number of messages in the feed.
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Returns true if the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.slots.borrow().is_empty()
    }

    /// Bumped on every change notification from either mirror.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Registers a feed change listener.
    pub fn on_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&FeedChange) + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Deregisters the feed from both mirrors and drops its own listeners.
    /// Safe to call more than once.
    pub fn teardown(&self) {
        for handle in self.handles.borrow_mut().drain(..) {
            handle.cancel();
        }
        self.inner.listeners.clear();
    }

    /// Returns true once `teardown()` has run.
    pub fn is_torn_down(&self) -> bool {
        self.handles.borrow().is_empty()
    }
}

impl Drop for MessageFeed {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Iterator returned by [`MessageFeed::ordered_messages`].
#[derive(Clone)]
pub struct OrderedMessages {
    slots: Rc<Vec<FeedSlot>>,
    names: NameResolver,
    next: usize,
}

impl OrderedMessages {
    /// Rewinds to the first entry.
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for OrderedMessages {
    type Item = FeedEntry;

    fn next(&mut self) -> Option<FeedEntry> {
        let slot = self.slots.get(self.next)?;
        self.next += 1;
        Some(FeedEntry {
            sender_name: self.names.resolve(&slot.message.sender),
            message: slot.message.clone(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.slots.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for OrderedMessages {}
