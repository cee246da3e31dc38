//! Identifier canonicalization.
//!
//! Every user and room identifier is folded into the backend-legal alphabet
//! `[a-z0-9_-]` before it is used as a key anywhere else.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::RoomMode;

/// Joins the two halves of a direct room id. `normalize` never emits it, so
/// a direct room id splits back into exactly one pair.
pub const DIRECT_KEY_SEPARATOR: &str = "~";

/// Lower-cases `raw` and replaces every character outside `[a-z0-9_-]` with `_`.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A normalized user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn normalize(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Identity {
    fn from(raw: String) -> Self {
        Self::normalize(&raw)
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one room on the call backend.
///
/// Direct and group rooms live in separate namespaces, and a normalized group
/// id can never contain the direct separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    mode: RoomMode,
    id: String,
}

impl RoomKey {
    /// Symmetric in its arguments: `direct(a, b) == direct(b, a)`.
    pub fn direct(a: &Identity, b: &Identity) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            mode: RoomMode::Direct,
            id: format!("{first}{DIRECT_KEY_SEPARATOR}{second}"),
        }
    }

    pub fn group(raw_room_id: &str) -> Self {
        Self {
            mode: RoomMode::Group,
            id: normalize(raw_room_id),
        }
    }

    pub fn mode(&self) -> RoomMode {
        self.mode
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key under which admissions for this room are serialized.
    pub fn exclusion_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode, self.id)
    }
}

/// Normalizes both raw identifiers and derives their shared direct room key.
pub fn direct_room_key(a: &str, b: &str) -> RoomKey {
    RoomKey::direct(&Identity::normalize(a), &Identity::normalize(b))
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
