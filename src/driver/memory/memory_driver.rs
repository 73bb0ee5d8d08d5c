use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tracing::debug;

use super::MemoryCoordinationStore;
use super::ParticipantId;
use crate::DriverError;
use crate::ElectionDriver;
use crate::LeaderInformation;
use crate::Result;

/// Driver bound to one participant slot of a [`MemoryCoordinationStore`].
pub struct MemoryElectionDriver {
    id: ParticipantId,
    store: MemoryCoordinationStore,
    closed: AtomicBool,
}

impl MemoryElectionDriver {
    pub(crate) fn new(
        id: ParticipantId,
        store: MemoryCoordinationStore,
    ) -> Self {
        Self {
            id,
            store,
            closed: AtomicBool::new(false),
        }
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.id
    }
}

#[async_trait]
impl ElectionDriver for MemoryElectionDriver {
    async fn write_leader_information(
        &self,
        info: &LeaderInformation,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed.into());
        }
        self.store.write(self.id, info)
    }

    fn has_leadership(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.store.holds_lock(self.id)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("[{}] closing driver for participant {}", self.store.name(), self.id);
        self.store.leave(self.id);
        Ok(())
    }

    fn description(&self) -> String {
        format!("memory:{}/{}", self.store.name(), self.id)
    }
}

impl Drop for MemoryElectionDriver {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.store.leave(self.id);
        }
    }
}
