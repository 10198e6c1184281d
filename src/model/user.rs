//! User identity.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifiers shorter than this are treated as handles ("guest") and
/// hashed into a UUID rather than parsed.
const HANDLE_MAX_LEN: usize = 32;

/// Newtype for user IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Resolve a client-supplied identifier.
    ///
    /// Short handles map to a deterministic UUIDv5 in the DNS namespace, so
    /// `guest` always lands on the same row. Anything else must be a UUID.
    pub fn resolve(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidUserId("empty".to_string()));
        }
        if raw.len() < HANDLE_MAX_LEN {
            return Ok(Self::from_handle(raw));
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| Error::InvalidUserId(raw.to_string()))
    }

    /// Deterministic id for a short handle.
    pub fn from_handle(handle: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_DNS, handle.as_bytes()))
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}
