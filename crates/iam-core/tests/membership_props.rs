//! Property tests for membership status changes.

use std::sync::Arc;

use iam_core::{ErrorKind, IamConfig, MemoryGraph, MemoryStore, StatusLifecycleManager};
use iam_events::MemoryEventBus;
use iam_org::{Status, TransitionTable, User};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

fn status() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: whatever sequence of status requests arrives, the pair keeps
    /// exactly one current row, legal requests succeed, illegal ones fail
    /// without writing anything.
    #[test]
    fn single_current_row_for_any_request_sequence(
        requests in prop::collection::vec(status(), 1..20)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let manager = StatusLifecycleManager::new(
                store.clone(),
                Arc::new(MemoryGraph::new()),
                Arc::new(MemoryEventBus::new()),
                &IamConfig::default(),
            );
            let cancel = CancellationToken::new();

            let owner = User::new("Owner", "owner@example.com");
            let member = User::new("Member", "member@example.com");
            store.insert_user(owner.clone()).await;
            store.insert_user(member.clone()).await;

            let org = manager
                .register_organization("Acme", owner.id, &cancel)
                .await
                .unwrap();
            manager
                .add_membership(org.id, member.id, Status::Active, owner.id, &cancel)
                .await
                .unwrap();

            let table = TransitionTable::membership();
            let mut expected = Status::Active;
            let mut rows = 1;

            for requested in requests {
                let result = manager
                    .change_user_status(org.id, member.id, requested, owner.id, &cancel)
                    .await;

                if table.can_transition(expected, requested) {
                    let row = result.unwrap();
                    assert_eq!(row.status, requested);
                    expected = requested;
                    rows += 1;
                } else {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::FailedPrecondition);
                }

                let current = store.current_memberships(org.id, member.id).await;
                assert_eq!(current.len(), 1);
                assert_eq!(current[0].status, expected);
                assert_eq!(
                    manager.membership_history(org.id, member.id).await.unwrap().len(),
                    rows
                );
            }
        });
    }
}
