//! Case 3: Connectivity blips under both connection loss policies.
//!
//! Expected Result:
//!
//! - AssumeLost: suspension revokes at once; reconnecting while still holding
//!   the lock grants a fresh session.
//! - GracePeriod: a reconnect within the grace period goes unnoticed by the
//!   contender and the session survives.

use std::time::Duration;

use d_election::ConnectionLossPolicy;
use d_election::ElectionState;
use d_election::MemoryCoordinationStore;

use crate::commons::config;
use crate::commons::TestNode;

#[tokio::test]
async fn test_suspension_assume_lost() {
    let store = MemoryCoordinationStore::new("suspension_case3_lost");
    let mut a = TestNode::start(store.clone(), config("suspension_case3_lost"), "node-a:9281");
    let mut b = TestNode::start(store.clone(), config("suspension_case3_lost"), "node-b:9282");

    let (s1, _) = a.become_leader().await;
    let holder = store.current_holder().unwrap();

    store.suspend(holder);
    a.expect_revoke().await;
    assert!(!a.service.has_leadership(s1));

    store.reconnect(holder);
    let (s2, info) = a.become_leader().await;
    assert_ne!(s1, s2);
    assert_eq!(store.leader_information(), info);
    assert!(b.has_no_callback());
}

#[tokio::test]
async fn test_suspension_within_grace_period() {
    let mut cfg = config("suspension_case3_grace");
    cfg.connection_loss = ConnectionLossPolicy::GracePeriod { grace_period_ms: 5_000 };

    let store = MemoryCoordinationStore::new("suspension_case3_grace");
    let mut a = TestNode::start(store.clone(), cfg, "node-a:9291");

    let (s1, _) = a.become_leader().await;
    let holder = store.current_holder().unwrap();

    store.suspend(holder);
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.reconnect(holder);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(a.has_no_callback());
    assert_eq!(a.service.state(), ElectionState::Leading(s1));
    assert!(a.service.has_leadership(s1));
}
