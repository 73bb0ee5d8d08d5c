use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::DriverError;
use crate::DriverEvent;
use crate::DriverEventSender;
use crate::ElectionDriver;
use crate::ElectionDriverFactory;
use crate::LeaderInformation;
use crate::Result;

/// Driver for single-process deployments: there is nobody to compete with,
/// so leadership is granted on creation and held until close.
pub struct StandaloneElectionDriver {
    events: DriverEventSender,
    leader_information: Mutex<LeaderInformation>,
    closed: AtomicBool,
}

impl StandaloneElectionDriver {
    pub fn new(events: DriverEventSender) -> Self {
        info!("standalone election driver created, granting leadership");
        events.send(DriverEvent::LeadershipGranted);
        Self {
            events,
            leader_information: Mutex::new(LeaderInformation::empty()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn leader_information(&self) -> LeaderInformation {
        self.leader_information.lock().clone()
    }
}

#[async_trait]
impl ElectionDriver for StandaloneElectionDriver {
    async fn write_leader_information(
        &self,
        info: &LeaderInformation,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed.into());
        }

        let mut current = self.leader_information.lock();
        if *current != *info {
            *current = info.clone();
            self.events.send(DriverEvent::LeaderInformationChanged(info.clone()));
        }
        Ok(())
    }

    fn has_leadership(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Factory producing [`StandaloneElectionDriver`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandaloneDriverFactory;

impl ElectionDriverFactory for StandaloneDriverFactory {
    fn create_driver(
        &self,
        events: DriverEventSender,
    ) -> Result<Arc<dyn ElectionDriver>> {
        Ok(Arc::new(StandaloneElectionDriver::new(events)))
    }
}
