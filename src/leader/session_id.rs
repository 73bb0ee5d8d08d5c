use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Fencing token minted every time leadership is granted.
///
/// A random (v4) UUID; a fresh value is drawn per grant, even when the same
/// contender is re-elected, so work tagged with an older id can always be
/// told apart from work of the current session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaderSessionId(Uuid);

impl LeaderSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LeaderSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for LeaderSessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for LeaderSessionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for LeaderSessionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "LeaderSessionId({})", self.0)
    }
}
