use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::DriverError;
use crate::DriverEvent;
use crate::DriverEventSender;
use crate::ElectionDriver;
use crate::ElectionDriverFactory;
use crate::LeaderInformation;
use crate::Result;

/// Driver whose notifications are injected by the test.
///
/// Successful writes are echoed back as `LeaderInformationChanged`, the way a
/// watching backend would report them.
#[derive(Default)]
pub struct ScriptedDriver {
    events: Mutex<Option<DriverEventSender>>,
    writes: Mutex<Vec<LeaderInformation>>,
    write_delay: Mutex<Option<Duration>>,
    fail_writes: AtomicBool,
    leadership: AtomicBool,
    creates: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Factory handing out this very driver.
    pub fn factory(self: &Arc<Self>) -> impl ElectionDriverFactory {
        let driver = self.clone();
        move |events: DriverEventSender| -> Result<Arc<dyn ElectionDriver>> {
            *driver.events.lock() = Some(events);
            driver.creates.fetch_add(1, Ordering::SeqCst);
            let driver: Arc<dyn ElectionDriver> = driver.clone();
            Ok(driver)
        }
    }

    pub fn inject(
        &self,
        event: DriverEvent,
    ) {
        let events = self.events.lock().clone();
        events.expect("driver not created yet").send(event);
    }

    pub fn grant(&self) {
        self.leadership.store(true, Ordering::SeqCst);
        self.inject(DriverEvent::LeadershipGranted);
    }

    pub fn revoke(&self) {
        self.leadership.store(false, Ordering::SeqCst);
        self.inject(DriverEvent::LeadershipLost);
    }

    pub fn set_leadership(
        &self,
        leadership: bool,
    ) {
        self.leadership.store(leadership, Ordering::SeqCst);
    }

    pub fn fail_writes(
        &self,
        fail: bool,
    ) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn delay_writes(
        &self,
        delay: Duration,
    ) {
        *self.write_delay.lock() = Some(delay);
    }

    pub fn writes(&self) -> Vec<LeaderInformation> {
        self.writes.lock().clone()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ElectionDriver for ScriptedDriver {
    async fn write_leader_information(
        &self,
        info: &LeaderInformation,
    ) -> Result<()> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DriverError::WriteFailed("scripted failure".to_string()).into());
        }
        self.writes.lock().push(info.clone());
        let events = self.events.lock().clone();
        if let Some(events) = events {
            events.send(DriverEvent::LeaderInformationChanged(info.clone()));
        }
        Ok(())
    }

    fn has_leadership(&self) -> bool {
        self.leadership.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
