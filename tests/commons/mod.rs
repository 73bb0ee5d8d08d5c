use std::sync::Arc;
use std::time::Duration;

use d_election::Contender;
use d_election::ElectionConfig;
use d_election::ElectionDriverFactory;
use d_election::ElectionService;
use d_election::ElectionState;
use d_election::Error;
use d_election::LeaderInformation;
use d_election::LeaderSessionId;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Granted(LeaderSessionId),
    Revoked,
    Error(String),
}

/// Forwards every callback to the test body.
pub struct ChannelContender {
    tx: mpsc::UnboundedSender<Callback>,
}

impl Contender for ChannelContender {
    fn grant_leadership(
        &self,
        session_id: LeaderSessionId,
    ) {
        let _ = self.tx.send(Callback::Granted(session_id));
    }

    fn revoke_leadership(&self) {
        let _ = self.tx.send(Callback::Revoked);
    }

    fn handle_error(
        &self,
        error: Error,
    ) {
        let _ = self.tx.send(Callback::Error(error.to_string()));
    }
}

pub struct TestNode {
    pub address: String,
    pub service: Arc<ElectionService>,
    pub callbacks: mpsc::UnboundedReceiver<Callback>,
}

impl TestNode {
    pub fn start(
        factory: impl ElectionDriverFactory,
        config: ElectionConfig,
        address: &str,
    ) -> Self {
        crate::enable_logger();
        let service = ElectionService::new(factory, config);
        let (tx, callbacks) = mpsc::unbounded_channel();
        service
            .start(Arc::new(ChannelContender { tx }))
            .expect("start election service");
        Self {
            address: address.to_string(),
            service,
            callbacks,
        }
    }

    pub async fn next_callback(&mut self) -> Callback {
        timeout(CALLBACK_TIMEOUT, self.callbacks.recv())
            .await
            .expect("timed out waiting for contender callback")
            .expect("contender channel closed")
    }

    pub async fn expect_grant(&mut self) -> LeaderSessionId {
        match self.next_callback().await {
            Callback::Granted(session_id) => session_id,
            other => panic!("[{}] expected grant, got {:?}", self.address, other),
        }
    }

    pub async fn expect_revoke(&mut self) {
        assert_eq!(self.next_callback().await, Callback::Revoked, "[{}]", self.address);
    }

    pub fn has_no_callback(&mut self) -> bool {
        self.callbacks.try_recv().is_err()
    }

    /// Grant then confirm with this node's address.
    pub async fn become_leader(&mut self) -> (LeaderSessionId, LeaderInformation) {
        let session_id = self.expect_grant().await;
        let info = LeaderInformation::new(session_id, self.address.as_str());
        self.service.confirm_leadership(session_id, info.clone()).await;
        assert_eq!(self.service.state(), ElectionState::Leading(session_id));
        (session_id, info)
    }
}

pub fn config(resource: &str) -> ElectionConfig {
    ElectionConfig {
        resource: resource.to_string(),
        write_timeout_ms: 1_000,
        ..Default::default()
    }
}

/// Polls `check` until it holds or the callback timeout elapses.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + CALLBACK_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
