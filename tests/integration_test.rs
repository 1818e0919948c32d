use bakery_sim::lifecycle::{BakerySystem, StopReason};
use bakery_sim::model::SimulationConfig;
use std::time::Duration;

/// One logical hour of trading plus warmup at one millisecond per minute.
fn short_day() -> SimulationConfig {
    SimulationConfig {
        tick_ms: 1,
        open_hour: 11,
        close_hour: 12,
        warmup_minutes: 20,
        entry_attempts: 20,
        entry_backoff_ms: 2,
        max_customers_total: 150,
        receipt_wait_ms: 200,
        seed: Some(42),
        ..Default::default()
    }
}

/// Full end-to-end run with all real actors: the baker fills the conveyors
/// during warmup, customers come and go while the shop is open and the run
/// ends once the shop is closed.
#[tokio::test]
async fn test_full_day_integration() {
    let mut system = BakerySystem::start(short_day()).expect("Failed to start bakery");
    let observer = system.observer();

    // sample the published state while the day runs
    let sampler = tokio::spawn(async move {
        let mut samples = 0u32;
        while let Ok(snapshot) = observer.snapshot() {
            assert!(snapshot.occupancy <= snapshot.max_occupancy);
            if let Some(free) = snapshot.entry_gate_free {
                assert!(free <= snapshot.max_occupancy);
            }
            samples += 1;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        samples
    });

    let reason = system.run().await;
    assert!(
        matches!(reason, StopReason::ClosedAndEmpty | StopReason::ClosingGraceExpired),
        "unexpected stop: {reason:?}"
    );

    if reason == StopReason::ClosedAndEmpty {
        let ctx = system.context();
        assert_eq!(ctx.state.read(|s| s.occupancy), Ok(0));
        assert_eq!(ctx.entry.peek(), Some(ctx.entry.bound()));
    }

    // once production has stopped every shelf accounts for each conveyor slot
    tokio::time::sleep(Duration::from_millis(50)).await;
    {
        let ctx = system.context();
        for (id, _) in ctx.catalog.iter() {
            let free = ctx.conveyor.shelf_free(id).expect("shelf gate open");
            assert_eq!(free + ctx.conveyor.on_belt(id), ctx.conveyor.capacity(id));
        }
    }

    let report = system.shutdown().await.expect("Failed to shut down");
    let samples = sampler.await.expect("sampler panicked");
    assert!(samples > 0);

    assert!(!report.evacuated);
    assert_eq!(report.shutdown.forced, 0);
    assert_eq!(report.unexpected_deaths, 0);
    assert!(report.admitted > 0, "nobody got in");
    assert!(report.served > 0, "nobody was served");
    assert_eq!(report.admitted, report.served + report.unserved);
    assert!(report.inventory.is_none());
    assert_eq!(report.registers.len(), 2);
    assert_eq!(report.products.len(), 12);

    // the conveyors never hand out more than was baked
    for tally in &report.products {
        assert!(tally.sold + tally.abandoned <= tally.produced, "{tally:?}");
    }
    let sold: u64 = report.products.iter().map(|p| p.sold).sum();
    let registered: u64 = report
        .registers
        .iter()
        .flat_map(|r| r.sales.iter().map(|(_, n)| *n))
        .sum();
    assert_eq!(sold, registered);
    assert!(report.total_revenue() > 0.0);
}

/// Evacuation requested through the control client while customers are
/// inside: everybody leaves, carts are abandoned and the run reports it.
#[tokio::test]
async fn test_evacuation_mid_day() {
    let mut system = BakerySystem::start(short_day()).expect("Failed to start bakery");
    let observer = system.observer();
    let control = system.control_client();

    let trigger = tokio::spawn(async move {
        loop {
            match observer.snapshot() {
                Ok(snapshot) if snapshot.shop_open && (snapshot.admitted >= 3 || snapshot.ticks >= 50) => {
                    break
                }
                Ok(_) => tokio::time::sleep(Duration::from_millis(1)).await,
                Err(e) => panic!("state vanished before evacuation: {e}"),
            }
        }
        control.request_evacuation().await
    });

    let reason = system.run().await;
    trigger
        .await
        .expect("trigger panicked")
        .expect("evacuation not acknowledged");
    assert!(
        matches!(reason, StopReason::Evacuated | StopReason::ClosingGraceExpired),
        "unexpected stop: {reason:?}"
    );

    let flags = system.context().state.read(|s| s.flags).unwrap();
    assert!(flags.evacuation);
    assert!(!flags.shop_open);
    assert!(!flags.producing);

    let report = system.shutdown().await.expect("Failed to shut down");
    assert!(report.evacuated);
    assert_eq!(report.admitted, report.served + report.unserved);
    for tally in &report.products {
        assert!(tally.sold + tally.abandoned <= tally.produced, "{tally:?}");
    }
}

/// An inventory audit leaves production running and adds the conveyor
/// listing to the report.
#[tokio::test]
async fn test_inventory_audit_is_reported() {
    let config = SimulationConfig {
        max_logical_minutes: Some(40),
        ..short_day()
    };
    let mut system = BakerySystem::start(config).expect("Failed to start bakery");
    let control = system.control_client();

    let audit = tokio::spawn(async move { control.request_inventory_audit().await });
    let reason = system.run().await;
    assert_eq!(reason, StopReason::LogicalTimeBound);
    audit
        .await
        .expect("audit task panicked")
        .expect("audit not acknowledged");

    let flags = system.context().state.read(|s| s.flags).unwrap();
    assert!(flags.inventory_audit);
    assert!(flags.producing);

    let report = system.shutdown().await.expect("Failed to shut down");
    let inventory = report.inventory.expect("audit requested");
    assert_eq!(inventory.len(), 12);
    assert_eq!(inventory[0].name, "Bread Loaf");
    assert!(inventory
        .iter()
        .zip(&report.products)
        .all(|(line, tally)| line.name == tally.name));
    assert_eq!(report.ticks, 40);
}
