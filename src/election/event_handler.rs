//! Normalizes raw driver notifications into leadership transitions.
//!
//! The handler keeps a shadow of "do we believe we lead" that is separate
//! from the service's confirmed state. From it, it derives:
//! - no two `LeadershipGranted` without a `LeadershipLost` in between,
//! - no `LeadershipLost` unless a grant was delivered,
//! - no repeated identical `LeaderInformationChanged`,
//! - ambiguous connectivity handled per [`ConnectionLossPolicy`].

use tokio::time::Instant;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::ConnectionLossPolicy;
use crate::DriverEvent;
use crate::LeaderInformation;
use crate::SUPPRESSED_DRIVER_EVENT_METRIC;

/// Leadership transitions delivered to the election service, in driver order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionEvent {
    LeadershipGranted,
    LeadershipLost,
    LeaderInformationChanged(LeaderInformation),
}

pub struct ElectionEventHandler {
    resource: String,
    policy: ConnectionLossPolicy,
    believes_leader: bool,
    last_observed: Option<LeaderInformation>,
    suspended: bool,
    grace_deadline: Option<Instant>,
}

impl ElectionEventHandler {
    pub fn new(
        resource: impl Into<String>,
        policy: ConnectionLossPolicy,
    ) -> Self {
        Self {
            resource: resource.into(),
            policy,
            believes_leader: false,
            last_observed: None,
            suspended: false,
            grace_deadline: None,
        }
    }

    pub fn believes_leader(&self) -> bool {
        self.believes_leader
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// When the pending grace period runs out, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.grace_deadline
    }

    /// Drops the shadow belief after the service gave up a session on its own.
    pub fn forget_leadership(&mut self) {
        if self.believes_leader {
            debug!("[Election:{}] shadow leadership forgotten", self.resource);
        }
        self.believes_leader = false;
        self.grace_deadline = None;
    }

    pub fn on_driver_event(
        &mut self,
        event: DriverEvent,
        now: Instant,
    ) -> Option<ElectionEvent> {
        trace!("[Election:{}] driver event: {:?}", self.resource, event);

        match event {
            DriverEvent::LeadershipGranted => {
                self.suspended = false;
                self.grace_deadline = None;
                if self.believes_leader {
                    self.suppressed("duplicate grant");
                    return None;
                }
                self.believes_leader = true;
                Some(ElectionEvent::LeadershipGranted)
            }
            DriverEvent::LeadershipLost => {
                self.grace_deadline = None;
                if !self.believes_leader {
                    self.suppressed("loss without grant");
                    return None;
                }
                self.believes_leader = false;
                Some(ElectionEvent::LeadershipLost)
            }
            DriverEvent::LeaderInformationChanged(info) => {
                if self.last_observed.as_ref() == Some(&info) {
                    self.suppressed("unchanged leader information");
                    return None;
                }
                self.last_observed = Some(info.clone());
                Some(ElectionEvent::LeaderInformationChanged(info))
            }
            DriverEvent::ConnectionSuspended => {
                self.suspended = true;
                match self.policy.grace_period() {
                    None => {
                        if !self.believes_leader {
                            return None;
                        }
                        warn!(
                            "[Election:{}] connection suspended, assuming leadership lost",
                            self.resource
                        );
                        self.believes_leader = false;
                        Some(ElectionEvent::LeadershipLost)
                    }
                    Some(grace) => {
                        if self.believes_leader && self.grace_deadline.is_none() {
                            warn!(
                                "[Election:{}] connection suspended, keeping leadership for {:?}",
                                self.resource, grace
                            );
                            self.grace_deadline = Some(now + grace);
                        }
                        None
                    }
                }
            }
            DriverEvent::ConnectionReconnected => {
                if self.grace_deadline.take().is_some() {
                    debug!("[Election:{}] reconnected within grace period", self.resource);
                }
                self.suspended = false;
                None
            }
        }
    }

    /// Fires the grace period once `now` has reached it.
    pub fn on_deadline(
        &mut self,
        now: Instant,
    ) -> Option<ElectionEvent> {
        match self.grace_deadline {
            Some(deadline) if now >= deadline => {
                self.grace_deadline = None;
                if !self.believes_leader {
                    return None;
                }
                warn!(
                    "[Election:{}] grace period expired while suspended, leadership lost",
                    self.resource
                );
                self.believes_leader = false;
                Some(ElectionEvent::LeadershipLost)
            }
            _ => None,
        }
    }

    fn suppressed(
        &self,
        reason: &str,
    ) {
        trace!("[Election:{}] suppressed driver event: {}", self.resource, reason);
        SUPPRESSED_DRIVER_EVENT_METRIC
            .with_label_values(&[self.resource.as_str()])
            .inc();
    }
}
