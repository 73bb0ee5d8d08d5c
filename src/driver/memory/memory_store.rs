//! In-process coordination substrate.
//!
//! One lock plus one leader record per store. Participants queue FIFO for the
//! lock; the record can only be changed by the current lock holder, which
//! gives the same fencing guarantee a conditional write offers on a real
//! backend. Every accepted change is broadcast to all participants.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::MemoryElectionDriver;
use crate::DriverError;
use crate::DriverEvent;
use crate::DriverEventSender;
use crate::ElectionDriver;
use crate::ElectionDriverFactory;
use crate::LeaderInformation;
use crate::Result;

pub type ParticipantId = u64;

struct Participant {
    events: DriverEventSender,
    suspended: bool,
}

pub(crate) struct StoreState {
    next_participant: ParticipantId,
    participants: BTreeMap<ParticipantId, Participant>,
    waiting: VecDeque<ParticipantId>,
    holder: Option<ParticipantId>,
    leader_information: LeaderInformation,
}

impl StoreState {
    fn notify(
        &self,
        id: ParticipantId,
        event: DriverEvent,
    ) {
        if let Some(p) = self.participants.get(&id) {
            p.events.send(event);
        }
    }

    fn broadcast(
        &self,
        event: DriverEvent,
    ) {
        for p in self.participants.values() {
            p.events.send(event.clone());
        }
    }

    /// Hands the free lock to the first reachable participant in line.
    fn grant_next(&mut self) {
        if self.holder.is_some() {
            return;
        }

        let position = self
            .waiting
            .iter()
            .position(|id| self.participants.get(id).map(|p| !p.suspended).unwrap_or(false));

        if let Some(pos) = position {
            if let Some(next) = self.waiting.remove(pos) {
                debug!("lock granted to participant {}", next);
                self.holder = Some(next);
                self.notify(next, DriverEvent::LeadershipGranted);
            }
        }
    }
}

#[derive(Clone)]
pub struct MemoryCoordinationStore {
    name: Arc<str>,
    inner: Arc<Mutex<StoreState>>,
}

impl MemoryCoordinationStore {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        info!("Initializing in-memory coordination store: {}", name);
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(StoreState {
                next_participant: 1,
                participants: BTreeMap::new(),
                waiting: VecDeque::new(),
                holder: None,
                leader_information: LeaderInformation::empty(),
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provides read access to the state
    pub(crate) fn blocking_read<R>(
        &self,
        f: impl FnOnce(&StoreState) -> R,
    ) -> R {
        let guard = self.inner.lock();
        f(&guard)
    }

    /// Provides write access to the state
    pub(crate) fn blocking_write<R>(
        &self,
        f: impl FnOnce(&mut StoreState) -> R,
    ) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Joins the lock queue. The participant is granted at once if the lock is free.
    pub fn register(
        &self,
        events: DriverEventSender,
    ) -> MemoryElectionDriver {
        let id = self.blocking_write(|state| {
            let id = state.next_participant;
            state.next_participant += 1;
            state.participants.insert(
                id,
                Participant {
                    events,
                    suspended: false,
                },
            );
            state.waiting.push_back(id);
            state.grant_next();
            id
        });
        debug!("[{}] participant {} registered", self.name, id);

        MemoryElectionDriver::new(id, self.clone())
    }

    pub(crate) fn write(
        &self,
        id: ParticipantId,
        info: &LeaderInformation,
    ) -> Result<()> {
        self.blocking_write(|state| {
            if state.holder != Some(id) {
                warn!(
                    "[{}] participant {} does not hold the lock, write of {:?} ignored",
                    self.name, id, info
                );
                return Ok(());
            }
            if state.participants.get(&id).map(|p| p.suspended).unwrap_or(true) {
                return Err(DriverError::Backend(format!("participant {} connection suspended", id)).into());
            }
            if state.leader_information == *info {
                return Ok(());
            }

            state.leader_information = info.clone();
            state.broadcast(DriverEvent::LeaderInformationChanged(info.clone()));
            Ok(())
        })
    }

    pub(crate) fn holds_lock(
        &self,
        id: ParticipantId,
    ) -> bool {
        self.blocking_read(|state| {
            state.holder == Some(id) && state.participants.get(&id).map(|p| !p.suspended).unwrap_or(false)
        })
    }

    pub(crate) fn leave(
        &self,
        id: ParticipantId,
    ) {
        self.blocking_write(|state| {
            state.participants.remove(&id);
            state.waiting.retain(|w| *w != id);
            if state.holder == Some(id) {
                state.holder = None;
                state.grant_next();
            }
        });
        debug!("[{}] participant {} left", self.name, id);
    }

    /// The current holder loses its lock (e.g. session expiry) and re-enters the queue.
    pub fn revoke_current_holder(&self) -> Option<ParticipantId> {
        self.blocking_write(|state| {
            let holder = state.holder.take()?;
            state.notify(holder, DriverEvent::LeadershipLost);
            state.waiting.push_back(holder);
            state.grant_next();
            Some(holder)
        })
    }

    /// Connectivity blip: the participant keeps its place but its lock state is unknown.
    pub fn suspend(
        &self,
        id: ParticipantId,
    ) {
        self.blocking_write(|state| {
            if let Some(p) = state.participants.get_mut(&id) {
                p.suspended = true;
                p.events.send(DriverEvent::ConnectionSuspended);
            }
        });
    }

    pub fn reconnect(
        &self,
        id: ParticipantId,
    ) {
        self.blocking_write(|state| {
            let Some(p) = state.participants.get_mut(&id) else {
                return;
            };
            p.suspended = false;
            p.events.send(DriverEvent::ConnectionReconnected);

            if state.holder == Some(id) {
                state.notify(id, DriverEvent::LeadershipGranted);
            } else {
                state.grant_next();
            }
        });
    }

    /// Replaces the record without holding the lock, as an external actor would.
    pub fn overwrite_leader_information(
        &self,
        info: LeaderInformation,
    ) {
        self.blocking_write(|state| {
            warn!("[{}] leader information overwritten externally: {:?}", self.name, info);
            state.leader_information = info.clone();
            state.broadcast(DriverEvent::LeaderInformationChanged(info));
        });
    }

    pub fn leader_information(&self) -> LeaderInformation {
        self.blocking_read(|state| state.leader_information.clone())
    }

    pub fn current_holder(&self) -> Option<ParticipantId> {
        self.blocking_read(|state| state.holder)
    }

    /// Registered participants in registration order.
    pub fn participants(&self) -> Vec<ParticipantId> {
        self.blocking_read(|state| state.participants.keys().copied().collect())
    }
}

impl ElectionDriverFactory for MemoryCoordinationStore {
    fn create_driver(
        &self,
        events: DriverEventSender,
    ) -> Result<Arc<dyn ElectionDriver>> {
        Ok(Arc::new(self.register(events)))
    }
}
