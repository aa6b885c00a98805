//! Identity → display-name resolution against the user mirror.

use alloc::rc::Rc;
use alloc::string::String;
use goban_core::{display_name, Identity, User};
use goban_mirror::TableMirror;

/// Resolves display names from the current user mirror.
///
/// Each lookup is a single hash probe; nothing is cached, so the result
/// always reflects the latest applied user event.
#[derive(Clone)]
pub struct NameResolver {
    users: Rc<TableMirror<User>>,
}

impl NameResolver {
    /// Creates a resolver over the given user mirror.
    pub fn new(users: Rc<TableMirror<User>>) -> Self {
        Self { users }
    }

    /// Returns the user's name if set and non-empty, else the first eight
    /// hex characters of the identity.
    pub fn resolve(&self, identity: &Identity) -> String {
        match self.users.get(identity) {
            Some(user) => display_name(identity, user.name.as_deref()),
            None => identity.short_hex(),
        }
    }

    /// Returns the user row for `identity`, if mirrored.
    pub fn user(&self, identity: &Identity) -> Option<Rc<User>> {
        self.users.get(identity)
    }
}
