//! Case 1: Leadership moves to the next contender when the leader closes.
//!
//! Scenario:
//!
//! 1. Three election services (A, B, C) contend on one coordination store.
//! 2. A is granted first and confirms its address.
//! 3. A closes.
//!
//! Expected Result:
//!
//! - A clears its own record before releasing the lock.
//! - B is granted next, confirms, and every node observes B's record.
//! - C never receives a callback.

use d_election::ElectionState;
use d_election::LeaderInformation;
use d_election::MemoryCoordinationStore;

use crate::commons::config;
use crate::commons::eventually;
use crate::commons::TestNode;

#[tokio::test]
async fn test_failover_after_leader_close() {
    let store = MemoryCoordinationStore::new("failover_case1");
    let mut a = TestNode::start(store.clone(), config("failover_case1"), "node-a:9081");
    let mut b = TestNode::start(store.clone(), config("failover_case1"), "node-b:9082");
    let mut c = TestNode::start(store.clone(), config("failover_case1"), "node-c:9083");

    let (s_a, info_a) = a.become_leader().await;
    assert_eq!(store.leader_information(), info_a);
    assert!(a.service.has_leadership(s_a));
    assert!(b.has_no_callback());

    let watcher = c.service.watch_leader_information();
    a.service.close().await.unwrap();
    assert!(a.service.close().await.is_ok());
    assert_eq!(a.service.state(), ElectionState::Closed);

    let (s_b, info_b) = b.become_leader().await;
    assert_ne!(s_a, s_b);
    assert_eq!(store.leader_information(), info_b);
    assert!(!a.service.has_leadership(s_a));

    assert!(eventually(|| *watcher.borrow() == info_b).await);
    assert_ne!(info_b, LeaderInformation::empty());
    assert!(c.has_no_callback());
    assert!(a.has_no_callback());
}
