//! Leader election orchestrator.
//!
//! ```text
//! driver thread(s) --DriverEvent--> mpsc --> event loop --ElectionEvent--> ElectionService
//!                                             (ElectionEventHandler)          |  (state lock)
//!                                                                             v
//!                                                             Contender::{grant,revoke,handle_error}
//! ```
//!
//! All state transitions happen under one `parking_lot::Mutex`; contender
//! callbacks and driver I/O always run with that lock released. Grant and
//! revoke are only ever invoked from the single event loop task, which gives
//! the total order the contender relies on. A failed confirmation reports
//! through `handle_error` on the confirming task, and only while the session
//! it belongs to is still the current one.
//!
//! A leader whose record was overwritten behind its back gives up the
//! backend lock: the driver is closed and a new one is created through the
//! factory, so the election is contended again.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::sleep_until;
use tokio::time::timeout;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Contender;
use super::ElectionEvent;
use super::ElectionEventHandler;
use crate::DriverError;
use crate::DriverEvent;
use crate::DriverEventSender;
use crate::ElectionConfig;
use crate::ElectionDriver;
use crate::ElectionDriverFactory;
use crate::ElectionError;
use crate::LeaderInformation;
use crate::LeaderSessionId;
use crate::Result;
use crate::DRIVER_WRITE_FAILURE_METRIC;
use crate::FENCED_CONFIRMATION_METRIC;
use crate::LEADERSHIP_CONFIRMED_METRIC;
use crate::LEADERSHIP_GRANTED_METRIC;
use crate::LEADERSHIP_REVOKED_METRIC;
use crate::LEADER_INFORMATION_MISMATCH_METRIC;
use crate::MAX_UNACKNOWLEDGED_WRITES;

/// Where a service instance stands. Exactly one at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    /// No session held; the driver may be contending
    Unelected,
    /// Session issued, waiting for the contender to confirm
    PendingConfirmation(LeaderSessionId),
    /// Session confirmed and its leader information written
    Leading(LeaderSessionId),
    /// Terminal
    Closed,
}

impl ElectionState {
    pub fn session_id(&self) -> Option<LeaderSessionId> {
        match self {
            ElectionState::PendingConfirmation(s) | ElectionState::Leading(s) => Some(*s),
            ElectionState::Unelected | ElectionState::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ElectionState::Closed)
    }
}

struct ElectionInner {
    state: ElectionState,
    started: bool,
    contender: Option<Arc<dyn Contender>>,
    driver: Option<Arc<dyn ElectionDriver>>,
    /// Stops the event loop bound to the current driver
    event_loop: Option<CancellationToken>,
    /// What this instance last wrote under the current session
    confirmed: LeaderInformation,
    /// Own writes whose change notification has not been observed yet
    unacknowledged: VecDeque<LeaderInformation>,
}

impl ElectionInner {
    fn reset_session(&mut self) {
        self.confirmed = LeaderInformation::empty();
        self.unacknowledged.clear();
    }

    /// True if `observed` is the echo of one of our own writes.
    fn acknowledge(
        &mut self,
        observed: &LeaderInformation,
    ) -> bool {
        match self.unacknowledged.iter().position(|w| w == observed) {
            Some(pos) => {
                self.unacknowledged.drain(..=pos);
                true
            }
            None => false,
        }
    }
}

pub struct ElectionService {
    config: ElectionConfig,
    factory: Box<dyn ElectionDriverFactory>,
    inner: Mutex<ElectionInner>,

    // Serializes driver writes so a stale write always lands before the next one
    write_lock: tokio::sync::Mutex<()>,

    observed_tx: watch::Sender<LeaderInformation>,
    shutdown: CancellationToken,
}

impl ElectionService {
    pub fn new(
        factory: impl ElectionDriverFactory,
        config: ElectionConfig,
    ) -> Arc<Self> {
        let (observed_tx, _) = watch::channel(LeaderInformation::empty());
        Arc::new(Self {
            config,
            factory: Box::new(factory),
            inner: Mutex::new(ElectionInner {
                state: ElectionState::Unelected,
                started: false,
                contender: None,
                driver: None,
                event_loop: None,
                confirmed: LeaderInformation::empty(),
                unacknowledged: VecDeque::new(),
            }),
            write_lock: tokio::sync::Mutex::new(()),
            observed_tx,
            shutdown: CancellationToken::new(),
        })
    }

    fn resource(&self) -> &str {
        &self.config.resource
    }

    /// Creates the driver and spawns the event loop. Must run inside a tokio runtime.
    pub fn start(
        self: &Arc<Self>,
        contender: Arc<dyn Contender>,
    ) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state.is_closed() {
                return Err(ElectionError::Closed {
                    resource: self.resource().to_string(),
                }
                .into());
            }
            if inner.started {
                return Err(ElectionError::AlreadyStarted {
                    resource: self.resource().to_string(),
                }
                .into());
            }
            inner.started = true;
            inner.contender = Some(contender.clone());
        }

        let driver = match self.connect() {
            Ok(Some(driver)) => driver,
            Ok(None) => return Ok(()),
            Err(e) => {
                error!("[Election:{}] failed to create driver: {:?}", self.resource(), e);
                let mut inner = self.inner.lock();
                inner.started = false;
                inner.contender = None;
                return Err(e);
            }
        };

        info!(
            "[Election:{}] started for {} on {}",
            self.resource(),
            contender.description(),
            driver.description()
        );
        Ok(())
    }

    /// Creates a driver with a fresh notification channel and spawns its event loop.
    ///
    /// Returns `None` if the service was closed meanwhile; the new driver is
    /// then released right away.
    fn connect(self: &Arc<Self>) -> Result<Option<Arc<dyn ElectionDriver>>> {
        let (events, event_rx) = DriverEventSender::channel();
        let driver = self.factory.create_driver(events)?;
        let event_loop = self.shutdown.child_token();
        {
            let mut inner = self.inner.lock();
            if inner.state.is_closed() {
                drop(inner);
                warn!("[Election:{}] closed while connecting, releasing driver", self.resource());
                tokio::spawn(async move {
                    if let Err(e) = driver.close().await {
                        error!("driver close failed: {:?}", e);
                    }
                });
                return Ok(None);
            }
            inner.driver = Some(driver.clone());
            inner.event_loop = Some(event_loop.clone());
        }

        let handler = ElectionEventHandler::new(self.resource(), self.config.connection_loss);
        tokio::spawn(Self::run(Arc::downgrade(self), event_rx, handler, event_loop));
        Ok(Some(driver))
    }

    /// Drops the current driver (and with it the backend lock) and joins the election again.
    fn recontend(
        self: &Arc<Self>,
        driver: Option<Arc<dyn ElectionDriver>>,
        event_loop: Option<CancellationToken>,
    ) {
        if let Some(event_loop) = event_loop {
            event_loop.cancel();
        }

        let service = self.clone();
        tokio::spawn(async move {
            if let Some(driver) = driver {
                if let Err(e) = driver.close().await {
                    warn!(
                        "[Election:{}] failed to release driver before re-contending: {:?}",
                        service.resource(),
                        e
                    );
                }
            }

            match service.connect() {
                Ok(Some(driver)) => {
                    info!(
                        "[Election:{}] contending again on {}",
                        service.resource(),
                        driver.description()
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    error!("[Election:{}] failed to recreate driver: {:?}", service.resource(), e);
                    let contender = service.inner.lock().contender.clone();
                    if let Some(contender) = contender {
                        contender.handle_error(e);
                    }
                }
            }
        });
    }

    async fn run(
        service: Weak<Self>,
        mut event_rx: mpsc::UnboundedReceiver<DriverEvent>,
        mut handler: ElectionEventHandler,
        shutdown: CancellationToken,
    ) {
        loop {
            let deadline = handler.next_deadline();
            let event = tokio::select! {
                biased;
                // P0: shutdown
                _ = shutdown.cancelled() => {
                    debug!("event loop shutdown signal received.");
                    return;
                }
                // P1: connection grace period
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    handler.on_deadline(Instant::now())
                }
                // P2: driver notifications
                raw = event_rx.recv() => match raw {
                    Some(raw) => handler.on_driver_event(raw, Instant::now()),
                    None => {
                        debug!("driver event channel closed, stopping event loop.");
                        return;
                    }
                }
            };

            let Some(service) = service.upgrade() else {
                return;
            };
            if let Some(event) = event {
                service.handle_election_event(event);
            }
            if handler.believes_leader() && service.state().session_id().is_none() {
                handler.forget_leadership();
            }
        }
    }

    pub(crate) fn handle_election_event(
        self: &Arc<Self>,
        event: ElectionEvent,
    ) {
        trace!("[Election:{}] election event: {:?}", self.resource(), event);
        match event {
            ElectionEvent::LeadershipGranted => self.on_grant_leadership(),
            ElectionEvent::LeadershipLost => self.on_revoke_leadership(),
            ElectionEvent::LeaderInformationChanged(info) => self.on_leader_information_change(info),
        }
    }

    fn on_grant_leadership(&self) {
        let (session_id, contender) = {
            let mut inner = self.inner.lock();
            match inner.state {
                ElectionState::Closed => {
                    debug!("[Election:{}] ignoring grant after close", self.resource());
                    return;
                }
                ElectionState::PendingConfirmation(s) | ElectionState::Leading(s) => {
                    warn!(
                        "[Election:{}] grant while session {} is active, ignoring",
                        self.resource(),
                        s
                    );
                    return;
                }
                ElectionState::Unelected => {}
            }

            let session_id = LeaderSessionId::new();
            inner.state = ElectionState::PendingConfirmation(session_id);
            inner.reset_session();
            (session_id, inner.contender.clone())
        };

        LEADERSHIP_GRANTED_METRIC
            .with_label_values(&[self.resource()])
            .inc();
        info!(
            "[Election:{}] leadership granted, session {}",
            self.resource(),
            session_id
        );

        if let Some(contender) = contender {
            contender.grant_leadership(session_id);
        }
    }

    fn on_revoke_leadership(&self) {
        let (session_id, contender) = {
            let mut inner = self.inner.lock();
            let Some(session_id) = inner.state.session_id() else {
                debug!(
                    "[Election:{}] ignoring revoke in state {:?}",
                    self.resource(),
                    inner.state
                );
                return;
            };
            inner.state = ElectionState::Unelected;
            inner.reset_session();
            (session_id, inner.contender.clone())
        };

        LEADERSHIP_REVOKED_METRIC
            .with_label_values(&[self.resource()])
            .inc();
        info!(
            "[Election:{}] leadership revoked, session {}",
            self.resource(),
            session_id
        );

        if let Some(contender) = contender {
            contender.revoke_leadership();
        }
    }

    fn on_leader_information_change(
        self: &Arc<Self>,
        observed: LeaderInformation,
    ) {
        self.observed_tx.send_replace(observed.clone());

        let (expected, contender, driver, event_loop) = {
            let mut inner = self.inner.lock();
            if inner.acknowledge(&observed) {
                return;
            }
            let ElectionState::Leading(_) = inner.state else {
                return;
            };
            if observed == inner.confirmed {
                return;
            }

            inner.state = ElectionState::Unelected;
            let expected = mem::take(&mut inner.confirmed);
            inner.reset_session();
            (
                expected,
                inner.contender.clone(),
                inner.driver.take(),
                inner.event_loop.take(),
            )
        };

        LEADER_INFORMATION_MISMATCH_METRIC
            .with_label_values(&[self.resource()])
            .inc();
        LEADERSHIP_REVOKED_METRIC
            .with_label_values(&[self.resource()])
            .inc();
        error!(
            "[Election:{}] stored leader information {:?} diverged from confirmed {:?}, revoking",
            self.resource(),
            observed,
            expected
        );

        if let Some(contender) = contender {
            contender.handle_error(
                ElectionError::LeaderInformationMismatch {
                    expected: Box::new(expected),
                    observed: Box::new(observed),
                }
                .into(),
            );
            contender.revoke_leadership();
        }

        self.recontend(driver, event_loop);
    }

    /// Publishes `info` for `session_id` once the contender has acted on a grant.
    ///
    /// Silently discarded if the session is no longer the active one.
    /// Driver failures are reported through [`Contender::handle_error`].
    pub async fn confirm_leadership(
        &self,
        session_id: LeaderSessionId,
        info: LeaderInformation,
    ) {
        if info.session_id() != Some(session_id) {
            let contender = self.inner.lock().contender.clone();
            error!(
                "[Election:{}] confirmation for {} carries {:?}",
                self.resource(),
                session_id,
                info
            );
            if let Some(contender) = contender {
                contender.handle_error(
                    ElectionError::SessionMismatch {
                        confirmed: session_id,
                        carried: info.session_id(),
                    }
                    .into(),
                );
            }
            return;
        }

        let _write_guard = self.write_lock.lock().await;

        let driver = {
            let mut inner = self.inner.lock();
            if inner.state.session_id() != Some(session_id) {
                drop(inner);
                self.fenced(session_id, "before write");
                return;
            }
            let Some(driver) = inner.driver.clone() else {
                return;
            };
            if inner.unacknowledged.len() == MAX_UNACKNOWLEDGED_WRITES {
                inner.unacknowledged.pop_front();
            }
            inner.unacknowledged.push_back(info.clone());
            driver
        };

        let outcome = self.write_with_timeout(&driver, &info).await;

        let failure = {
            let mut inner = self.inner.lock();
            if outcome.is_err() && inner.unacknowledged.back() == Some(&info) {
                inner.unacknowledged.pop_back();
            }
            let current = inner.state.session_id() == Some(session_id);
            match outcome {
                Ok(()) if current => {
                    inner.state = ElectionState::Leading(session_id);
                    inner.confirmed = info;
                    None
                }
                Ok(()) => {
                    drop(inner);
                    self.fenced(session_id, "after write");
                    return;
                }
                Err(e) if current => Some((e, inner.contender.clone())),
                Err(e) => {
                    drop(inner);
                    debug!("[Election:{}] write for stale session failed: {:?}", self.resource(), e);
                    self.fenced(session_id, "write failed");
                    return;
                }
            }
        };

        match failure {
            None => {
                LEADERSHIP_CONFIRMED_METRIC
                    .with_label_values(&[self.resource()])
                    .inc();
                info!(
                    "[Election:{}] leadership confirmed, session {}",
                    self.resource(),
                    session_id
                );
            }
            Some((e, contender)) => {
                DRIVER_WRITE_FAILURE_METRIC
                    .with_label_values(&[self.resource()])
                    .inc();
                warn!(
                    "[Election:{}] failed to write leader information for {}: {:?}",
                    self.resource(),
                    session_id,
                    e
                );
                if let Some(contender) = contender {
                    contender.handle_error(e);
                }
            }
        }
    }

    fn fenced(
        &self,
        session_id: LeaderSessionId,
        stage: &str,
    ) {
        FENCED_CONFIRMATION_METRIC
            .with_label_values(&[self.resource()])
            .inc();
        debug!(
            "[Election:{}] confirmation for stale session {} discarded ({})",
            self.resource(),
            session_id,
            stage
        );
    }

    async fn write_with_timeout(
        &self,
        driver: &Arc<dyn ElectionDriver>,
        info: &LeaderInformation,
    ) -> Result<()> {
        let limit: Duration = self.config.write_timeout();
        match timeout(limit, driver.write_leader_information(info)).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::WriteTimeout(limit).into()),
        }
    }

    /// True while `session_id` is the issued session and the driver still holds the lock.
    pub fn has_leadership(
        &self,
        session_id: LeaderSessionId,
    ) -> bool {
        let inner = self.inner.lock();
        if inner.state.session_id() != Some(session_id) {
            return false;
        }
        inner.driver.as_ref().map(|d| d.has_leadership()).unwrap_or(false)
    }

    pub fn state(&self) -> ElectionState {
        self.inner.lock().state
    }

    pub fn current_session_id(&self) -> Option<LeaderSessionId> {
        self.inner.lock().state.session_id()
    }

    /// Latest leader record observed in the coordination backend.
    pub fn watch_leader_information(&self) -> watch::Receiver<LeaderInformation> {
        self.observed_tx.subscribe()
    }

    /// Stops the service. Idempotent.
    ///
    /// A confirmed leader clears its own record first (if configured), then
    /// the driver is closed. Contender callbacks already in progress are not
    /// awaited.
    pub async fn close(&self) -> Result<()> {
        let (driver, clear) = {
            let mut inner = self.inner.lock();
            if inner.state.is_closed() {
                return Ok(());
            }
            let was_leading = matches!(inner.state, ElectionState::Leading(_));
            inner.state = ElectionState::Closed;
            inner.unacknowledged.clear();
            inner.contender = None;
            inner.event_loop = None;
            (inner.driver.take(), was_leading && self.config.clear_on_close)
        };

        info!("[Election:{}] closing", self.resource());
        self.shutdown.cancel();

        let Some(driver) = driver else {
            return Ok(());
        };

        if clear {
            let _write_guard = self.write_lock.lock().await;
            if let Err(e) = self
                .write_with_timeout(&driver, &LeaderInformation::empty())
                .await
            {
                warn!(
                    "[Election:{}] failed to clear leader information on close: {:?}",
                    self.resource(),
                    e
                );
            }
        }

        driver.close().await.map_err(|e| {
            error!("[Election:{}] driver close failed: {:?}", self.resource(), e);
            e
        })
    }
}

impl Drop for ElectionService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for ElectionService {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ElectionService")
            .field("resource", &self.config.resource)
            .field("state", &self.state())
            .finish()
    }
}
