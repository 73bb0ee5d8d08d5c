//! Bridge to the external coordination substrate.
//!
//! A driver performs the actual mutual exclusion and the durable write of
//! [`LeaderInformation`]. All leader state lives in the election service;
//! drivers only push raw [`DriverEvent`]s through a [`DriverEventSender`].
//!
//! **Important**: a driver cannot guarantee that no event is delivered after
//! [`ElectionDriver::close`] returns. Receivers must re-check their own state.

mod memory;
mod standalone;

pub use memory::*;
pub use standalone::*;


///--------------------------------------
/// Trait Definition
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::LeaderInformation;
use crate::Result;

/// Raw notifications as observed by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// The backend believes this participant now holds the lock
    LeadershipGranted,
    /// The lock is definitively gone
    LeadershipLost,
    /// The stored leader record changed (by anyone, including us)
    LeaderInformationChanged(LeaderInformation),
    /// Connectivity to the substrate is in doubt; lock state unknown
    ConnectionSuspended,
    /// Connectivity restored after a suspension
    ConnectionReconnected,
}

/// Producer side of the driver notification channel.
///
/// Sending never fails from the driver's point of view: once the service has
/// stopped listening, late events are dropped.
#[derive(Debug, Clone)]
pub struct DriverEventSender {
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl DriverEventSender {
    pub fn new(tx: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DriverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(
        &self,
        event: DriverEvent,
    ) {
        if let Err(e) = self.tx.send(event) {
            trace!("driver event dropped, receiver gone: {:?}", e.0);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ElectionDriver: Send + Sync + 'static {
    /// Durably writes the leader record.
    ///
    /// Takes effect only while this driver still holds the lock; otherwise it
    /// is a logged no-op. Writing [`LeaderInformation::empty`] clears the
    /// record and must only happen before a new leader has written its own.
    async fn write_leader_information(
        &self,
        info: &LeaderInformation,
    ) -> Result<()>;

    /// Local, possibly stale belief of holding the lock.
    fn has_leadership(&self) -> bool;

    /// Releases watches, connections and background tasks.
    async fn close(&self) -> Result<()>;

    fn description(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Creates the driver once the service has its notification channel ready.
pub trait ElectionDriverFactory: Send + Sync + 'static {
    fn create_driver(
        &self,
        events: DriverEventSender,
    ) -> Result<Arc<dyn ElectionDriver>>;
}

impl<F> ElectionDriverFactory for F
where F: Fn(DriverEventSender) -> Result<Arc<dyn ElectionDriver>> + Send + Sync + 'static
{
    fn create_driver(
        &self,
        events: DriverEventSender,
    ) -> Result<Arc<dyn ElectionDriver>> {
        (self)(events)
    }
}
