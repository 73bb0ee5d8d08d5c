use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::LeaderSessionId;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LeaderRecord {
    session_id: LeaderSessionId,
    address: String,
    metadata: Vec<u8>,
}

/// Identity of a leader as published to the coordination substrate.
///
/// Either empty ("no leader") or a record that always carries the session id
/// it was confirmed under. Equality is structural.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderInformation {
    record: Option<LeaderRecord>,
}

impl LeaderInformation {
    pub fn new(
        session_id: LeaderSessionId,
        address: impl Into<String>,
    ) -> Self {
        Self {
            record: Some(LeaderRecord {
                session_id,
                address: address.into(),
                metadata: Vec::new(),
            }),
        }
    }

    /// The "no leader" value. Writing it clears the stored record.
    pub fn empty() -> Self {
        Self { record: None }
    }

    /// Attaches opaque backend metadata. No-op on the empty value.
    pub fn with_metadata(
        mut self,
        metadata: impl Into<Vec<u8>>,
    ) -> Self {
        if let Some(record) = self.record.as_mut() {
            record.metadata = metadata.into();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_none()
    }

    pub fn session_id(&self) -> Option<LeaderSessionId> {
        self.record.as_ref().map(|r| r.session_id)
    }

    pub fn address(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.address.as_str())
    }

    pub fn metadata(&self) -> &[u8] {
        self.record.as_ref().map(|r| r.metadata.as_slice()).unwrap_or(&[])
    }
}

impl fmt::Debug for LeaderInformation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.record {
            None => f.write_str("LeaderInformation(empty)"),
            Some(r) => f
                .debug_struct("LeaderInformation")
                .field("session_id", &r.session_id)
                .field("address", &r.address)
                .field("metadata_len", &r.metadata.len())
                .finish(),
        }
    }
}
