//! Property-based tests for admission invariants.
//!
//! Properties verified against the in-memory registry:
//! - The first consumer of a fresh constraint always runs
//! - Running permits never exceed the limit over arbitrary operation sequences
//! - FIFO: once a consumer is blocked, every later registration is blocked
//! - ASAP: a registration runs exactly when it fits in the free permits
//! - Unblocking succeeds exactly when the permits fit beside the running count

use proptest::prelude::*;
use tollgate::Constraint;
use tollgate::ConstraintError;
use tollgate::ConstraintId;
use tollgate::ConstraintRegistry;
use tollgate::ConsumerId;
use tollgate::ConsumerState;
use tollgate::InMemoryConstraintRegistry;
use tollgate::Spec;
use tollgate::Strategy as Admission;

#[derive(Debug, Clone)]
enum Op {
    Register { consumer: u8, permits: u32 },
    Finish { consumer: u8 },
    UnblockNext,
}

fn arbitrary_admission() -> impl Strategy<Value = Admission> {
    prop_oneof![Just(Admission::Fifo), Just(Admission::Asap)]
}

fn arbitrary_op(limit: u32) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..12, 1..=limit).prop_map(|(consumer, permits)| Op::Register { consumer, permits }),
        2 => (0u8..12).prop_map(|consumer| Op::Finish { consumer }),
        2 => Just(Op::UnblockNext),
    ]
}

fn arbitrary_ops() -> impl Strategy<Value = (u32, Vec<Op>)> {
    (1u32..=16).prop_flat_map(|limit| (Just(limit), prop::collection::vec(arbitrary_op(limit), 1..60)))
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

async fn create(registry: &InMemoryConstraintRegistry, strategy: Admission, limit: u32) -> Result<Constraint, TestCaseError> {
    Constraint::create(ConstraintId::new("prop"), Spec::new(strategy, limit), registry).await.map_err(fail)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_first_registration_runs(
        strategy in arbitrary_admission(),
        (limit, permits) in (1u32..=1000).prop_flat_map(|limit| (Just(limit), 1..=limit)),
    ) {
        runtime().block_on(async {
            let registry = InMemoryConstraintRegistry::new();
            let constraint = create(&registry, strategy, limit).await?;
            let state = constraint.register_consumer(&ConsumerId::new("first"), permits, &registry).await.map_err(fail)?;
            prop_assert_eq!(state, ConsumerState::Running);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn test_running_permits_never_exceed_limit(
        strategy in arbitrary_admission(),
        (limit, ops) in arbitrary_ops(),
    ) {
        runtime().block_on(async {
            let registry = InMemoryConstraintRegistry::new();
            let constraint = create(&registry, strategy, limit).await?;

            for op in ops {
                match op {
                    Op::Register { consumer, permits } => {
                        let id = ConsumerId::new(format!("c{consumer}"));
                        match constraint.register_consumer(&id, permits, &registry).await {
                            // Replay of a live consumer with a different permit count.
                            Ok(_) | Err(ConstraintError::InvalidState { .. }) => {}
                            Err(e) => return Err(fail(e)),
                        }
                    }
                    Op::Finish { consumer } => {
                        let id = ConsumerId::new(format!("c{consumer}"));
                        match constraint.consumer_finished(&id, &registry).await {
                            Ok(finished) => prop_assert!(finished),
                            Err(ConstraintError::InvalidState { .. }) => {}
                            Err(e) => return Err(fail(e)),
                        }
                    }
                    Op::UnblockNext => {
                        if let Some(candidate) = constraint.next_unblock_candidate(&registry).await.map_err(fail)? {
                            let running = constraint.running_permits(&registry).await.map_err(fail)?;
                            let unblocked =
                                constraint.consumer_unblocked(&candidate.id, running, &registry).await.map_err(fail)?;
                            prop_assert!(unblocked, "candidate {} did not fit", candidate.id);
                        }
                    }
                }

                let running = constraint.running_permits(&registry).await.map_err(fail)?;
                prop_assert!(running <= limit, "running {} exceeds limit {}", running, limit);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn test_fifo_blocks_everything_after_first_block(
        (limit, requests) in (1u32..=16).prop_flat_map(|limit| (Just(limit), prop::collection::vec(1..=limit, 1..30))),
    ) {
        runtime().block_on(async {
            let registry = InMemoryConstraintRegistry::new();
            let constraint = create(&registry, Admission::Fifo, limit).await?;

            let mut seen_blocked = false;
            for (i, permits) in requests.into_iter().enumerate() {
                let state = constraint.register_consumer(&ConsumerId::new(format!("c{i}")), permits, &registry)
                    .await
                    .map_err(fail)?;
                if seen_blocked {
                    prop_assert_eq!(state, ConsumerState::Blocked);
                }
                seen_blocked |= state == ConsumerState::Blocked;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn test_asap_runs_exactly_what_fits(
        (limit, requests) in (1u32..=16).prop_flat_map(|limit| (Just(limit), prop::collection::vec(1..=limit, 1..30))),
    ) {
        runtime().block_on(async {
            let registry = InMemoryConstraintRegistry::new();
            let constraint = create(&registry, Admission::Asap, limit).await?;

            let mut running = 0u32;
            for (i, permits) in requests.into_iter().enumerate() {
                let state = constraint.register_consumer(&ConsumerId::new(format!("c{i}")), permits, &registry)
                    .await
                    .map_err(fail)?;
                let fits = running + permits <= limit;
                prop_assert_eq!(state == ConsumerState::Running, fits);
                if fits {
                    running += permits;
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn test_unblock_succeeds_iff_permits_fit(
        strategy in arbitrary_admission(),
        (limit, permits, reported_running) in (1u32..=32).prop_flat_map(|limit| (Just(limit), 1..=limit, 0..=limit * 2)),
    ) {
        runtime().block_on(async {
            let registry = InMemoryConstraintRegistry::new();
            let constraint = create(&registry, strategy, limit).await?;
            let holder = ConsumerId::new("holder");
            let waiter = ConsumerId::new("waiter");

            constraint.register_consumer(&holder, limit, &registry).await.map_err(fail)?;
            let state = constraint.register_consumer(&waiter, permits, &registry).await.map_err(fail)?;
            prop_assert_eq!(state, ConsumerState::Blocked);

            let unblocked = constraint.consumer_unblocked(&waiter, reported_running, &registry).await.map_err(fail)?;
            prop_assert_eq!(unblocked, reported_running + permits <= limit);

            let stored = registry.load_consumer(constraint.id(), &waiter).await.map_err(fail)?;
            let expected = if unblocked { ConsumerState::Running } else { ConsumerState::Blocked };
            prop_assert_eq!(stored.map(|c| c.state), Some(expected));
            Ok::<(), TestCaseError>(())
        })?;
    }
}
