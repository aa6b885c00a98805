//! Listener registration for change notifications.
//!
//! Every `on_change`-style registration returns a [`ListenerHandle`] whose
//! only operation is `cancel()`. Cancelling is synchronous and idempotent,
//! and a listener cancelled while a notification is in flight is not
//! invoked for the remainder of that notification.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

/// Unique identifier for a listener within one [`ListenerSet`].
pub type ListenerId = u64;

struct Listener<E> {
    id: ListenerId,
    callback: Box<dyn Fn(&E)>,
    active: Cell<bool>,
}

struct Registry<E> {
    listeners: Vec<Rc<Listener<E>>>,
    next_id: ListenerId,
}

/// Type-erased removal used by [`ListenerHandle`].
trait Detach {
    fn detach(&self, id: ListenerId) -> bool;
}

impl<E> Detach for RefCell<Registry<E>> {
    fn detach(&self, id: ListenerId) -> bool {
        let mut registry = self.borrow_mut();
        match registry.listeners.iter().position(|l| l.id == id) {
            Some(pos) => {
                let listener = registry.listeners.remove(pos);
                listener.active.set(false);
                true
            }
            None => false,
        }
    }
}

/// A set of callbacks notified in registration order.
pub struct ListenerSet<E> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E: 'static> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> ListenerSet<E> {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                listeners: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Registers a callback and returns the handle that removes it.
    pub fn subscribe<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&E) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push(Rc::new(Listener {
            id,
            callback: Box::new(callback),
            active: Cell::new(true),
        }));
        drop(registry);

        let weak: Weak<RefCell<Registry<E>>> = Rc::downgrade(&self.registry);
        let weak: Weak<dyn Detach> = weak;
        ListenerHandle {
            id,
            registry: weak,
            cancelled: Cell::new(false),
        }
    }

    /// Invokes every active listener with `event`.
    ///
    /// The registry is not borrowed while callbacks run, so a callback may
    /// register or cancel listeners on this same set.
    pub fn notify(&self, event: &E) {
        let listeners: Vec<Rc<Listener<E>>> = self.registry.borrow().listeners.clone();
        for listener in listeners {
            if listener.active.get() {
                (listener.callback)(event);
            }
        }
    }

    /// Returns the number of registered listeners.
    #[inline]
    pub fn len(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Returns true if there are no listeners.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().listeners.is_empty()
    }

    /// Removes every listener. Outstanding handles become no-ops.
    pub fn clear(&self) {
        let drained: Vec<Rc<Listener<E>>> = self.registry.borrow_mut().listeners.drain(..).collect();
        for listener in drained {
            listener.active.set(false);
        }
    }
}

/// Handle returned by every listener registration.
pub struct ListenerHandle {
    id: ListenerId,
    registry: Weak<dyn Detach>,
    cancelled: Cell<bool>,
}

impl ListenerHandle {
    /// Returns the listener ID.
    #[inline]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Deregisters the listener. Safe to call any number of times, and
    /// after the listener set itself was dropped.
    pub fn cancel(&self) {
        if self.cancelled.replace(true) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }

    /// Returns true once `cancel()` has been called.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl core::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}
