//! Admission scenarios run against every registry realization.
//!
//! Each scenario is written once, generic over [`ConstraintRegistry`], and
//! instantiated for the in-memory registry, the key-value registry over the
//! deterministic store, and the key-value registry over redb.

use std::sync::Arc;

use tempfile::TempDir;
use tollgate::Constraint;
use tollgate::ConstraintError;
use tollgate::ConstraintId;
use tollgate::ConstraintRegistry;
use tollgate::ConsumerId;
use tollgate::ConsumerState;
use tollgate::InMemoryConstraintRegistry;
use tollgate::KvConstraintRegistry;
use tollgate::RedbKeyValueStore;
use tollgate::Spec;
use tollgate::tollgate_core::test_support::DeterministicKeyValueStore;

fn cid(id: &str) -> ConsumerId {
    ConsumerId::new(id)
}

fn redb_registry() -> (KvConstraintRegistry<RedbKeyValueStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = RedbKeyValueStore::new(dir.path().join("tollgate.redb")).unwrap();
    (KvConstraintRegistry::new(Arc::new(store)), dir)
}

async fn create<R: ConstraintRegistry>(registry: &R, id: &str, spec: Spec) -> Constraint {
    Constraint::create(ConstraintId::new(id), spec, registry).await.unwrap()
}

async fn first_registration_always_runs<R: ConstraintRegistry>(registry: &R) {
    let fifo = create(registry, "fifo", Spec::fifo(10)).await;
    let asap = create(registry, "asap", Spec::asap(10)).await;

    assert_eq!(fifo.register_consumer(&cid("c1"), 10, registry).await.unwrap(), ConsumerState::Running);
    assert_eq!(asap.register_consumer(&cid("c1"), 1, registry).await.unwrap(), ConsumerState::Running);
}

async fn fifo_queues_behind_blocked<R: ConstraintRegistry>(registry: &R) {
    let constraint = create(registry, "deploys", Spec::fifo(10)).await;

    assert_eq!(constraint.register_consumer(&cid("c1"), 1, registry).await.unwrap(), ConsumerState::Running);
    assert_eq!(constraint.register_consumer(&cid("c2"), 10, registry).await.unwrap(), ConsumerState::Blocked);
    // Would fit in the 9 free permits, but c2 is ahead of it.
    assert_eq!(constraint.register_consumer(&cid("c3"), 1, registry).await.unwrap(), ConsumerState::Blocked);

    assert_eq!(constraint.running_permits(registry).await.unwrap(), 1);
    assert_eq!(constraint.available_permits(registry).await.unwrap(), 9);
}

async fn asap_admits_whatever_fits<R: ConstraintRegistry>(registry: &R) {
    let constraint = create(registry, "deploys", Spec::asap(10)).await;

    assert_eq!(constraint.register_consumer(&cid("c1"), 1, registry).await.unwrap(), ConsumerState::Running);
    assert_eq!(constraint.register_consumer(&cid("c2"), 10, registry).await.unwrap(), ConsumerState::Blocked);
    assert_eq!(constraint.register_consumer(&cid("c3"), 1, registry).await.unwrap(), ConsumerState::Running);
    assert_eq!(constraint.register_consumer(&cid("c4"), 9, registry).await.unwrap(), ConsumerState::Blocked);

    assert_eq!(constraint.running_permits(registry).await.unwrap(), 2);
}

async fn finish_then_unblock_in_order<R: ConstraintRegistry>(registry: &R) {
    let constraint = create(registry, "deploys", Spec::fifo(10)).await;
    assert_eq!(constraint.register_consumer(&cid("c1"), 10, registry).await.unwrap(), ConsumerState::Running);
    for (id, permits) in [("c2", 3), ("c3", 5), ("c4", 5)] {
        assert_eq!(constraint.register_consumer(&cid(id), permits, registry).await.unwrap(), ConsumerState::Blocked);
    }

    assert!(constraint.consumer_finished(&cid("c1"), registry).await.unwrap());
    assert_eq!(constraint.running_permits(registry).await.unwrap(), 0);
    assert_eq!(constraint.next_unblock_candidate(registry).await.unwrap().map(|c| c.id), Some(cid("c2")));

    assert!(constraint.consumer_unblocked(&cid("c2"), 0, registry).await.unwrap());
    assert!(constraint.consumer_unblocked(&cid("c3"), 3, registry).await.unwrap());
    // 8 + 5 > 10
    assert!(!constraint.consumer_unblocked(&cid("c4"), 8, registry).await.unwrap());

    let c4 = registry.load_consumer(constraint.id(), &cid("c4")).await.unwrap().unwrap();
    assert_eq!(c4.state, ConsumerState::Blocked);
    assert_eq!(constraint.running_permits(registry).await.unwrap(), 8);
    assert!(constraint.next_unblock_candidate(registry).await.unwrap().is_none());
}

async fn fifo_head_is_earliest_arrival<R: ConstraintRegistry>(registry: &R) {
    let constraint = create(registry, "deploys", Spec::fifo(10)).await;
    constraint.register_consumer(&cid("holder"), 10, registry).await.unwrap();
    // Registered back to back, so typically within one millisecond; ids out of lexical order.
    for (id, permits) in [("zeta", 10), ("mid", 4), ("alpha", 1)] {
        assert_eq!(constraint.register_consumer(&cid(id), permits, registry).await.unwrap(), ConsumerState::Blocked);
    }
    constraint.consumer_finished(&cid("holder"), registry).await.unwrap();

    let listed: Vec<_> = constraint.consumers(registry).await.unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(listed, vec![cid("zeta"), cid("mid"), cid("alpha")]);
    assert_eq!(constraint.next_unblock_candidate(registry).await.unwrap().map(|c| c.id), Some(cid("zeta")));

    assert!(constraint.consumer_unblocked(&cid("zeta"), 0, registry).await.unwrap());
    constraint.consumer_finished(&cid("zeta"), registry).await.unwrap();
    assert_eq!(constraint.next_unblock_candidate(registry).await.unwrap().map(|c| c.id), Some(cid("mid")));
}

async fn finish_requires_running<R: ConstraintRegistry>(registry: &R) {
    let constraint = create(registry, "deploys", Spec::fifo(4)).await;
    constraint.register_consumer(&cid("running"), 4, registry).await.unwrap();
    constraint.register_consumer(&cid("blocked"), 1, registry).await.unwrap();

    let err = constraint.consumer_finished(&cid("blocked"), registry).await.unwrap_err();
    assert!(matches!(err, ConstraintError::InvalidState { .. }), "{err}");
    let err = constraint.consumer_finished(&cid("unknown"), registry).await.unwrap_err();
    assert!(matches!(err, ConstraintError::InvalidState { .. }), "{err}");

    assert!(constraint.consumer_finished(&cid("running"), registry).await.unwrap());
    assert_eq!(constraint.available_permits(registry).await.unwrap(), 4);

    let err = constraint.consumer_finished(&cid("running"), registry).await.unwrap_err();
    assert!(matches!(err, ConstraintError::InvalidState { .. }), "{err}");
}

async fn unblock_requires_blocked<R: ConstraintRegistry>(registry: &R) {
    let constraint = create(registry, "deploys", Spec::asap(4)).await;
    constraint.register_consumer(&cid("running"), 2, registry).await.unwrap();
    constraint.register_consumer(&cid("done"), 1, registry).await.unwrap();
    constraint.consumer_finished(&cid("done"), registry).await.unwrap();

    for id in ["running", "done", "unknown"] {
        let err = constraint.consumer_unblocked(&cid(id), 0, registry).await.unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidState { .. }), "{id}: {err}");
    }
}

async fn load_distinguishes_missing<R: ConstraintRegistry>(registry: &R) {
    assert!(Constraint::load(ConstraintId::new("never-created"), registry).await.unwrap().is_none());

    let created = create(registry, "deploys", Spec::asap(7)).await;
    let loaded = Constraint::load(ConstraintId::new("deploys"), registry).await.unwrap().unwrap();
    assert_eq!(loaded, created);
}

async fn rejects_invalid_requests<R: ConstraintRegistry>(registry: &R) {
    let err = Constraint::create(ConstraintId::new("empty"), Spec::fifo(0), registry).await.unwrap_err();
    assert!(matches!(err, ConstraintError::InvalidLimit { .. }), "{err}");

    let constraint = create(registry, "deploys", Spec::fifo(5)).await;
    for permits in [0, 6] {
        let err = constraint.register_consumer(&cid("c1"), permits, registry).await.unwrap_err();
        assert!(matches!(err, ConstraintError::InvalidPermits { .. }), "{permits}: {err}");
    }
    assert!(constraint.consumers(registry).await.unwrap().is_empty());
}

async fn registration_replay<R: ConstraintRegistry>(registry: &R) {
    let constraint = create(registry, "deploys", Spec::fifo(5)).await;
    assert_eq!(constraint.register_consumer(&cid("c1"), 5, registry).await.unwrap(), ConsumerState::Running);
    assert_eq!(constraint.register_consumer(&cid("c2"), 2, registry).await.unwrap(), ConsumerState::Blocked);

    assert_eq!(constraint.register_consumer(&cid("c1"), 5, registry).await.unwrap(), ConsumerState::Running);
    assert_eq!(constraint.register_consumer(&cid("c2"), 2, registry).await.unwrap(), ConsumerState::Blocked);
    assert_eq!(constraint.consumers(registry).await.unwrap().len(), 2);

    let err = constraint.register_consumer(&cid("c2"), 3, registry).await.unwrap_err();
    assert!(matches!(err, ConstraintError::InvalidState { .. }), "{err}");
}

async fn concurrent_distinct_registrations<R: ConstraintRegistry + 'static>(registry: Arc<R>) {
    let constraint = create(registry.as_ref(), "builds", Spec::asap(64)).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = Arc::clone(&registry);
        let constraint = constraint.clone();
        handles.push(tokio::spawn(async move {
            constraint.register_consumer(&ConsumerId::new(format!("worker-{i}")), 2, registry.as_ref()).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), ConsumerState::Running);
    }

    let consumers = constraint.consumers(registry.as_ref()).await.unwrap();
    assert_eq!(consumers.len(), 16);
    assert_eq!(constraint.running_permits(registry.as_ref()).await.unwrap(), 32);
}

macro_rules! registry_scenarios {
    ($name:ident, $make:expr) => {
        mod $name {
            use super::*;

            #[tokio::test]
            async fn test_first_registration_always_runs() {
                let (registry, _guard) = $make;
                first_registration_always_runs(&registry).await;
            }

            #[tokio::test]
            async fn test_fifo_queues_behind_blocked() {
                let (registry, _guard) = $make;
                fifo_queues_behind_blocked(&registry).await;
            }

            #[tokio::test]
            async fn test_asap_admits_whatever_fits() {
                let (registry, _guard) = $make;
                asap_admits_whatever_fits(&registry).await;
            }

            #[tokio::test]
            async fn test_finish_then_unblock_in_order() {
                let (registry, _guard) = $make;
                finish_then_unblock_in_order(&registry).await;
            }

            #[tokio::test]
            async fn test_fifo_head_is_earliest_arrival() {
                let (registry, _guard) = $make;
                fifo_head_is_earliest_arrival(&registry).await;
            }

            #[tokio::test]
            async fn test_finish_requires_running() {
                let (registry, _guard) = $make;
                finish_requires_running(&registry).await;
            }

            #[tokio::test]
            async fn test_unblock_requires_blocked() {
                let (registry, _guard) = $make;
                unblock_requires_blocked(&registry).await;
            }

            #[tokio::test]
            async fn test_load_distinguishes_missing() {
                let (registry, _guard) = $make;
                load_distinguishes_missing(&registry).await;
            }

            #[tokio::test]
            async fn test_rejects_invalid_requests() {
                let (registry, _guard) = $make;
                rejects_invalid_requests(&registry).await;
            }

            #[tokio::test]
            async fn test_registration_replay() {
                let (registry, _guard) = $make;
                registration_replay(&registry).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_concurrent_distinct_registrations() {
                let (registry, _guard) = $make;
                concurrent_distinct_registrations(Arc::new(registry)).await;
            }
        }
    };
}

registry_scenarios!(in_memory, (InMemoryConstraintRegistry::new(), ()));
registry_scenarios!(kv_deterministic, (KvConstraintRegistry::new(DeterministicKeyValueStore::new()), ()));
registry_scenarios!(kv_redb, redb_registry());

#[tokio::test]
async fn test_redb_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tollgate.redb");

    {
        let registry = KvConstraintRegistry::new(Arc::new(RedbKeyValueStore::new(&path).unwrap()));
        let constraint = create(&registry, "deploys", Spec::fifo(10)).await;
        constraint.register_consumer(&cid("c1"), 10, &registry).await.unwrap();
        constraint.register_consumer(&cid("c2"), 3, &registry).await.unwrap();
    }

    let registry = KvConstraintRegistry::new(Arc::new(RedbKeyValueStore::new(&path).unwrap()));
    let constraint = Constraint::load(ConstraintId::new("deploys"), &registry).await.unwrap().unwrap();
    assert_eq!(*constraint.spec(), Spec::fifo(10));

    constraint.consumer_finished(&cid("c1"), &registry).await.unwrap();
    assert!(constraint.consumer_unblocked(&cid("c2"), 0, &registry).await.unwrap());
    assert_eq!(constraint.running_permits(&registry).await.unwrap(), 3);
}
