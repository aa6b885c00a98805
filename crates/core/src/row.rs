//! Row types for the `user` and `message` relations.

use crate::identity::Identity;
use alloc::string::{String, ToString};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Send time of a message, in microseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from microseconds since the Unix epoch.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns microseconds since the Unix epoch.
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(micros: u64) -> Self {
        Self(micros)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves the name shown for an identity.
///
/// Returns `name` when it is set and non-empty, else the first eight hex
/// characters of the identity.
pub fn display_name(identity: &Identity, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => identity.short_hex(),
    }
}

/// A row of the `user` relation, keyed by identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key.
    pub identity: Identity,
    /// Display name; `None` means unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the principal currently holds a session.
    pub online: bool,
}

impl User {
    /// Creates a user row.
    pub fn new(identity: Identity, name: Option<String>, online: bool) -> Self {
        Self {
            identity,
            name,
            online,
        }
    }

    /// Returns the resolved display name of this user.
    pub fn display_name(&self) -> String {
        display_name(&self.identity, self.name.as_deref())
    }
}

/// A row of the `message` relation.
///
/// Messages carry no primary key; the full `(sender, text, sent)` tuple is
/// what delete events are matched on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub sender: Identity,
    pub text: String,
    pub sent: Timestamp,
}

impl Message {
    /// Creates a message row.
    pub fn new(sender: Identity, text: impl Into<String>, sent: impl Into<Timestamp>) -> Self {
        Self {
            sender,
            text: text.into(),
            sent: sent.into(),
        }
    }
}
