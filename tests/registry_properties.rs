//! Property-based tests for the registry invariants.
//!
//! For every sequence of register/unregister/lock/unlock operations,
//! the three indices must stay mutually consistent at every observable
//! point: a connection is in `all` iff it is in exactly one `by_user`
//! bucket and, when it has a company, exactly one `by_company` bucket;
//! and no lock entry may ever reference a dead connection.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use tokio::sync::mpsc::Receiver;

use pushgate::adapters::websocket::{
    Connection, Envelope, Hub, MessageType, OutboundFrame, RecordLockPayload,
};
use pushgate::domain::foundation::{CompanyId, ConnectionIdentity, UserId};

#[derive(Debug, Clone)]
enum Op {
    Register { user: u8, company: Option<u8> },
    Unregister { slot: u8 },
    Lock { slot: u8, key: u8 },
    Unlock { slot: u8, key: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..5, proptest::option::of(0u8..3))
            .prop_map(|(user, company)| Op::Register { user, company }),
        2 => (0u8..16).prop_map(|slot| Op::Unregister { slot }),
        2 => (0u8..16, 0u8..4).prop_map(|(slot, key)| Op::Lock { slot, key }),
        1 => (0u8..16, 0u8..4).prop_map(|(slot, key)| Op::Unlock { slot, key }),
    ]
}

fn lock_envelope(key: u8, acquire: bool) -> Envelope {
    let message_type = if acquire {
        MessageType::RecordLock
    } else {
        MessageType::RecordUnlock
    };
    Envelope::with_payload(
        message_type,
        &RecordLockPayload {
            entity_type: "record".to_string(),
            entity_id: key.to_string(),
            user_id: String::new(),
            user_email: String::new(),
        },
    )
    .unwrap()
}

/// Checks the §3-style consistency invariant against the live set.
async fn assert_registry_consistent(hub: &Arc<Hub>, live: &[(Arc<Connection>, Receiver<OutboundFrame>)]) {
    let snapshot = hub.snapshot().await;

    let live_ids: HashSet<_> = live.iter().map(|(conn, _)| conn.id()).collect();
    let all_ids: HashSet<_> = snapshot.connections.iter().copied().collect();
    assert_eq!(all_ids, live_ids, "`all` must mirror the live connections");

    // Every live connection sits in exactly its own user bucket.
    let mut seen_in_user_buckets = 0;
    for (user, ids) in &snapshot.by_user {
        assert!(!ids.is_empty(), "empty by_user bucket left behind");
        for id in ids {
            let (conn, _) = live
                .iter()
                .find(|(conn, _)| conn.id() == *id)
                .expect("by_user references a dead connection");
            assert_eq!(conn.user_id(), user, "connection filed under wrong user");
            seen_in_user_buckets += 1;
        }
    }
    assert_eq!(seen_in_user_buckets, live.len());

    // Company buckets cover exactly the scoped connections.
    let mut seen_in_company_buckets = 0;
    for (company, ids) in &snapshot.by_company {
        assert!(!ids.is_empty(), "empty by_company bucket left behind");
        for id in ids {
            let (conn, _) = live
                .iter()
                .find(|(conn, _)| conn.id() == *id)
                .expect("by_company references a dead connection");
            assert_eq!(
                conn.company_id(),
                Some(company),
                "connection filed under wrong company"
            );
            seen_in_company_buckets += 1;
        }
    }
    let scoped = live
        .iter()
        .filter(|(conn, _)| conn.company_id().is_some())
        .count();
    assert_eq!(seen_in_company_buckets, scoped);

    // No orphaned lock entries.
    for (key, holder) in &snapshot.locks {
        assert!(
            live_ids.contains(holder),
            "lock {:?} held by dead connection {}",
            key,
            holder
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn registry_indices_stay_consistent(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let hub = Hub::new();
            let mut live: Vec<(Arc<Connection>, Receiver<OutboundFrame>)> = Vec::new();

            for op in ops {
                match op {
                    Op::Register { user, company } => {
                        let identity = ConnectionIdentity::new(
                            UserId::new(format!("user-{}", user)).unwrap(),
                            company.map(|c| CompanyId::new(format!("co-{}", c)).unwrap()),
                            format!("user-{}@example.com", user),
                        );
                        let (conn, rx) = Connection::new(identity, 8);
                        let conn = Arc::new(conn);
                        hub.register(Arc::clone(&conn)).await;
                        live.push((conn, rx));
                    }
                    Op::Unregister { slot } => {
                        if !live.is_empty() {
                            let index = slot as usize % live.len();
                            let (conn, _rx) = live.remove(index);
                            hub.unregister(conn.id()).await;
                        }
                    }
                    Op::Lock { slot, key } => {
                        if !live.is_empty() {
                            let index = slot as usize % live.len();
                            hub.handle_client_message(&live[index].0, lock_envelope(key, true))
                                .await;
                        }
                    }
                    Op::Unlock { slot, key } => {
                        if !live.is_empty() {
                            let index = slot as usize % live.len();
                            hub.handle_client_message(&live[index].0, lock_envelope(key, false))
                                .await;
                        }
                    }
                }

                assert_registry_consistent(&hub, &live).await;
            }

            // Tearing everything down leaves no trace.
            for (conn, _rx) in live.drain(..) {
                hub.unregister(conn.id()).await;
            }
            let snapshot = hub.snapshot().await;
            assert!(snapshot.connections.is_empty());
            assert!(snapshot.by_user.is_empty());
            assert!(snapshot.by_company.is_empty());
            assert!(snapshot.locks.is_empty());
        });
    }
}
