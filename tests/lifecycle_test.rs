use bakery_sim::framework::FrameworkError;
use bakery_sim::lifecycle::{BakerySystem, Phase, SystemError};
use bakery_sim::model::{CheckoutRequest, ConfigError, CustomerId, RegisterId, SimulationConfig};
use std::time::Duration;

#[tokio::test]
async fn test_invalid_config_is_rejected_before_spawning() {
    let config = SimulationConfig {
        max_occupancy: 2,
        ..Default::default()
    };
    let err = BakerySystem::start(config).err().expect("start must fail");
    assert!(matches!(
        err,
        SystemError::Config(ConfigError::OutOfRange {
            field: "max_occupancy",
            ..
        })
    ));
}

#[tokio::test]
async fn test_start_publishes_initial_state() {
    let system = BakerySystem::start(SimulationConfig::default()).expect("Failed to start bakery");
    assert_eq!(system.phase(), Phase::Initializing);

    let snapshot = system.observer().snapshot().expect("state published");
    assert!(snapshot.running);
    assert!(snapshot.producing);
    assert!(!snapshot.shop_open);
    assert_eq!(snapshot.occupancy, 0);
    assert_eq!(snapshot.entry_gate_free, Some(10));
    assert!(snapshot.registers[0].open);
    assert!(!snapshot.registers[1].open);

    let roster = system.context().state.read(|s| s.actors.clone()).unwrap();
    assert_eq!(roster.bakers.len(), 1);
    assert_eq!(roster.cashiers.len(), 2);
}

/// Teardown runs once; a second call and the one from `Drop` do nothing.
#[tokio::test]
async fn test_teardown_is_idempotent() {
    let mut system = BakerySystem::start(SimulationConfig::default()).expect("Failed to start bakery");
    let observer = system.observer();
    let control = system.control_client();

    assert!(system.teardown());
    assert!(!system.teardown());
    assert_eq!(system.phase(), Phase::Terminated);

    assert_eq!(observer.snapshot(), Err(FrameworkError::Gone("shared state")));
    let ctx = system.context();
    assert!(ctx.entry.is_closed());
    assert_eq!(ctx.entry.peek(), None);
    assert!(ctx.checkout.is_closed());
    assert!(ctx.receipts.is_closed());
    assert!(ctx.state.read(|s| s.occupancy).is_err());

    drop(system);
    assert_eq!(
        control.request_evacuation().await,
        Err(FrameworkError::Gone("orchestrator"))
    );
}

/// Dropping a running system without shutting it down still releases
/// everything it built.
#[tokio::test]
async fn test_drop_tears_down() {
    let system = BakerySystem::start(SimulationConfig::default()).expect("Failed to start bakery");
    let observer = system.observer();
    let entry = system.context().entry.clone();

    drop(system);
    assert!(entry.is_closed());
    assert!(observer.snapshot().is_err());
}

/// A cashier stuck scanning a huge cart outlives the grace period: phase 2
/// aborts it and the counters are reconciled from the entry gate.
#[tokio::test]
async fn test_shutdown_forces_stuck_actor_and_reconciles() {
    let config = SimulationConfig {
        tick_ms: 2000,
        shutdown_grace_ms: 50,
        ..Default::default()
    };
    let system = BakerySystem::start(config).expect("Failed to start bakery");
    let ctx = system.context().clone();
    let products = ctx.catalog.len();

    ctx.state
        .with_lock(|s| s.registers[0].queue_len += 1)
        .expect("state open");
    ctx.checkout
        .try_send(
            RegisterId(0),
            CheckoutRequest {
                customer: CustomerId(1),
                register: RegisterId(0),
                quantities: vec![50; products],
            },
        )
        .expect("line has room");

    // once the request is taken the cashier sleeps through its scan
    tokio::time::timeout(Duration::from_secs(5), async {
        while ctx.checkout.len_for(&RegisterId(0)) > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("cashier never took the request");

    // counters left behind by actors that will never settle them
    ctx.state
        .with_lock(|s| {
            s.occupancy = 3;
            s.registers[1].queue_len = 2;
        })
        .expect("state open");

    let report = system.shutdown().await.expect("Failed to shut down");

    assert!(report.shutdown.forced >= 1, "{:?}", report.shutdown);
    assert_eq!(report.shutdown.live_after, 0);
    assert_eq!(report.shutdown.entry_free, Some(10));
    assert_eq!(report.occupancy, 0);
    assert!(report.registers.iter().all(|r| r.queue_len == 0));
    assert!(ctx.entry.is_closed());
}
