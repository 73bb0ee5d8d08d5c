//! Case 4: Someone else rewrites the leader record behind the leader's back.
//!
//! Expected Result:
//!
//! - The leader gets a mismatch error followed by a revoke.
//! - The leader releases the lock, so the next contender is granted and
//!   publishes its own record.
//! - The former leader queues up again and is granted a fresh session later.

use d_election::ElectionState;
use d_election::LeaderInformation;
use d_election::LeaderSessionId;
use d_election::MemoryCoordinationStore;

use crate::commons::config;
use crate::commons::Callback;
use crate::commons::TestNode;

#[tokio::test]
async fn test_external_overwrite_hands_leadership_on() {
    let store = MemoryCoordinationStore::new("tamper_case4");
    let mut a = TestNode::start(store.clone(), config("tamper_case4"), "node-a:9381");
    let mut b = TestNode::start(store.clone(), config("tamper_case4"), "node-b:9382");

    let (s_a1, _) = a.become_leader().await;
    let a_holder = store.current_holder();

    let foreign = LeaderInformation::new(LeaderSessionId::new(), "rogue:6666");
    store.overwrite_leader_information(foreign);

    match a.next_callback().await {
        Callback::Error(msg) => assert!(msg.contains("mismatch"), "{}", msg),
        other => panic!("expected mismatch error, got {:?}", other),
    }
    a.expect_revoke().await;
    assert_eq!(a.service.state(), ElectionState::Unelected);
    assert!(!a.service.has_leadership(s_a1));

    let (s_b, info_b) = b.become_leader().await;
    assert_ne!(store.current_holder(), a_holder);
    assert_eq!(store.leader_information(), info_b);
    assert!(a.has_no_callback());

    assert!(store.revoke_current_holder().is_some());
    b.expect_revoke().await;
    assert!(!b.service.has_leadership(s_b));

    let (s_a2, info_a2) = a.become_leader().await;
    assert_ne!(s_a1, s_a2);
    assert_eq!(store.leader_information(), info_a2);
}
