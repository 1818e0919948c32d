use crate::baker_actor::Baker;
use crate::cashier_actor::Cashier;
use crate::clients::{ControlClient, ControlRequest, SnapshotObserver};
use crate::customer_actor::{Customer, VisitTicket};
use crate::framework::{ActorKind, FrameworkError, Handle, SignalBroadcaster};
use crate::lifecycle::policy::{apply_schedule, LoadPolicy, ScheduleChange};
use crate::lifecycle::supervisor::{ActorReport, ExitStatus, Exited, Supervisor};
use crate::lifecycle::{ShopContext, SystemError};
use crate::model::{
    BatchReport, Clock, CustomerId, InventoryLine, RegisterId, RegisterSummary, ShutdownTally,
    SimulationConfig, SimulationReport, REGISTERS,
};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Lifecycle phase of a [`BakerySystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

/// Why the running phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ClosedAndEmpty,
    Evacuated,
    ClosingGraceExpired,
    LogicalTimeBound,
    WallClockBound,
    StateGone,
}

#[derive(Debug, Default)]
struct RunTally {
    batches: u64,
    units_baked: u64,
    audit_requested: bool,
}

/// The orchestrator of the simulation.
///
/// `BakerySystem` is responsible for:
/// - **Setup**: creating the shared record, gates and channels, and spawning
///   the baker and one cashier per register
/// - **The tick loop**: advancing the logical clock, applying the schedule and
///   the load policy, admitting customers, reaping finished actors and
///   forwarding control requests as broadcasts
/// - **Shutdown**: graceful termination with a grace period, forced
///   termination of whatever remains, counter reconciliation
/// - **Teardown**: closing every primitive exactly once, on the normal path or
///   from `Drop`
///
/// # Example
///
/// ```ignore
/// let mut system = BakerySystem::start(SimulationConfig::default())?;
/// let control = system.control_client();
/// let reason = system.run().await;
/// let report = system.shutdown().await?;
/// ```
pub struct BakerySystem {
    ctx: ShopContext,
    signals: SignalBroadcaster,
    batches: mpsc::Receiver<BatchReport>,
    control_tx: mpsc::Sender<ControlRequest>,
    control_rx: mpsc::Receiver<ControlRequest>,
    supervisor: Supervisor,
    /// Live customers by supervisor handle.
    customers: HashMap<Handle, (CustomerId, VisitTicket)>,
    active_customers: Arc<AtomicUsize>,
    policy: LoadPolicy,
    rng: StdRng,
    phase: Phase,
    spawned_customers: u64,
    closed_at: Option<u64>,
    started: Instant,
    tally: RunTally,
    torn_down: bool,
}

impl BakerySystem {
    /// Validates `config`, builds the shared primitives and spawns the
    /// long-lived actors. Must be called inside a Tokio runtime.
    pub fn start(config: SimulationConfig) -> Result<Self, SystemError> {
        config.validate()?;
        info!(
            max_occupancy = config.max_occupancy,
            products = config.product_count,
            tick_ms = config.tick_ms,
            "Starting bakery"
        );

        let rng = config.rng(0);
        let policy = LoadPolicy::new(config.register_open_fraction, config.register_close_fraction);
        let hard_cap = config.max_active_customers + 1 + REGISTERS;
        let (ctx, parts) = ShopContext::build(config);
        let (control_tx, control_rx) = mpsc::channel(16);

        let mut system = Self {
            ctx,
            signals: parts.signals,
            batches: parts.batches,
            control_tx,
            control_rx,
            supervisor: Supervisor::new(16, hard_cap),
            customers: HashMap::new(),
            active_customers: Arc::new(AtomicUsize::new(0)),
            policy,
            rng,
            phase: Phase::Initializing,
            spawned_customers: 0,
            closed_at: None,
            started: Instant::now(),
            tally: RunTally::default(),
            torn_down: false,
        };

        system.ctx.state.with_lock(|s| s.flags.producing = true)?;

        let baker = system
            .supervisor
            .spawn(Baker::new(system.ctx.config.baker_workers), system.ctx.clone())
            .map_err(|source| SystemError::Spawn {
                actor: "baker".into(),
                source,
            })?;
        let mut cashiers = Vec::with_capacity(REGISTERS);
        for register in 0..REGISTERS {
            let handle = system
                .supervisor
                .spawn(Cashier::new(RegisterId(register)), system.ctx.clone())
                .map_err(|source| SystemError::Spawn {
                    actor: format!("cashier-{register}"),
                    source,
                })?;
            cashiers.push(handle);
        }
        system.ctx.state.with_lock(|s| {
            s.actors.bakers = vec![baker];
            s.actors.cashiers = cashiers;
        })?;

        Ok(system)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> &ShopContext {
        &self.ctx
    }

    pub fn control_client(&self) -> ControlClient {
        ControlClient::new(self.control_tx.clone())
    }

    pub fn observer(&self) -> SnapshotObserver {
        SnapshotObserver::new(
            self.ctx.state.subscribe(),
            self.ctx.entry.clone(),
            Arc::clone(&self.active_customers),
        )
    }

    /// Drives the tick loop until a stop condition holds.
    pub async fn run(&mut self) -> StopReason {
        self.phase = Phase::Running;
        let mut ticker = tokio::time::interval(self.ctx.config.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Ok(now) = self.ctx.state.with_lock(|s| {
                s.clock.advance();
                s.clock
            }) else {
                return StopReason::StateGone;
            };

            self.apply_policies(now);
            self.admit_customers();
            self.reap().await;
            self.drain_batches();
            self.drain_control(now);

            if let Some(reason) = self.stop_reason(now) {
                info!(?reason, clock = %now, "Stopping");
                return reason;
            }
        }
    }

    fn apply_policies(&mut self, now: Clock) {
        let policy = self.policy;
        let Ok((schedule, register)) = self
            .ctx
            .state
            .with_lock(|s| (apply_schedule(s), policy.apply(s)))
        else {
            return;
        };
        match schedule {
            Some(ScheduleChange::ShopOpened) => info!(clock = %now, "Shop opened"),
            Some(ScheduleChange::ShopClosed) => {
                info!(clock = %now, "Shop closed, production stopped");
                self.closed_at.get_or_insert(now.ticks);
            }
            None => {}
        }
        if let Some(change) = register {
            info!(register = 1, ?change, clock = %now, "Load policy");
        }
    }

    fn admit_customers(&mut self) {
        let open = self
            .ctx
            .state
            .read(|s| s.flags.shop_open && !s.flags.evacuation)
            .unwrap_or(false);
        if !open {
            return;
        }

        let config = Arc::clone(&self.ctx.config);
        let arrivals = self.rng.gen_range(0..=config.arrivals_per_tick);
        for _ in 0..arrivals {
            if self.customers.len() >= config.max_active_customers
                || self.spawned_customers >= config.max_customers_total
            {
                trace!("admission caps reached");
                break;
            }
            let id = CustomerId(self.spawned_customers + 1);
            let customer = Customer::random(id, self.ctx.catalog.len(), &mut self.rng);
            let ticket = customer.ticket();
            match self.supervisor.spawn(customer, self.ctx.clone()) {
                Ok(handle) => {
                    self.customers.insert(handle, (id, ticket));
                    self.spawned_customers += 1;
                }
                Err(e) => {
                    warn!(error = %e, "customer not spawned");
                    break;
                }
            }
        }
        self.active_customers
            .store(self.customers.len(), Ordering::Relaxed);
    }

    async fn reap(&mut self) {
        for exited in self.supervisor.reap().await {
            self.record_exit(exited, false);
        }

        // receipts for customers that are no longer around would hold slots forever
        let live: HashSet<CustomerId> = self.customers.values().map(|(id, _)| *id).collect();
        let purged = self.ctx.receipts.purge_where(|id| !live.contains(id));
        if purged > 0 {
            debug!(purged, "orphan receipts purged");
        }
        self.active_customers
            .store(self.customers.len(), Ordering::Relaxed);
    }

    fn record_exit(&mut self, exited: Exited, shutting_down: bool) {
        let customer = self.customers.remove(&exited.handle);
        let unexpected = match &exited.status {
            ExitStatus::Finished(ActorReport::Customer(outcome)) => {
                trace!(name = %exited.name, ?outcome, "customer reaped");
                false
            }
            ExitStatus::Finished(report) => {
                debug!(kind = %exited.kind, name = %exited.name, ?report, "actor finished");
                false
            }
            ExitStatus::Panicked => true,
            ExitStatus::Cancelled => !shutting_down,
        };
        if !unexpected {
            return;
        }

        warn!(kind = %exited.kind, name = %exited.name, "Unexpected actor death");
        let settle = customer.is_some_and(|(_, ticket)| ticket.settle());
        self.ctx.update("unexpected death", |s| {
            s.unexpected_deaths += 1;
            if settle {
                s.occupancy = s.occupancy.saturating_sub(1);
            }
        });
        if settle {
            warn!(name = %exited.name, "occupancy reconciled for a customer that died inside");
        }
        if exited.kind == ActorKind::Baker && !shutting_down {
            warn!("baker is gone, conveyors will not be refilled");
        }
    }

    fn drain_batches(&mut self) {
        while let Ok(batch) = self.batches.try_recv() {
            self.tally.batches += 1;
            self.tally.units_baked += u64::from(batch.units);
        }
    }

    fn drain_control(&mut self, now: Clock) {
        while let Ok(request) = self.control_rx.try_recv() {
            info!(request = request.name(), clock = %now, "Control request");
            let respond_to = match request {
                ControlRequest::InventoryAudit { respond_to } => {
                    self.inventory_audit();
                    respond_to
                }
                ControlRequest::Evacuation { respond_to } => {
                    self.evacuate(now);
                    respond_to
                }
            };
            let _ = respond_to.send(Ok(()));
        }
    }

    fn inventory_audit(&mut self) {
        self.ctx.update("inventory audit", |s| s.flags.inventory_audit = true);
        self.signals.audit();
        self.tally.audit_requested = true;
    }

    fn evacuate(&mut self, now: Clock) {
        self.ctx.update("evacuation", |s| {
            s.flags.evacuation = true;
            s.flags.shop_open = false;
            s.flags.producing = false;
        });
        self.signals.evacuate();
        self.closed_at.get_or_insert(now.ticks);
    }

    fn stop_reason(&self, now: Clock) -> Option<StopReason> {
        let config = &self.ctx.config;
        if config.max_logical_minutes.is_some_and(|limit| now.ticks >= limit) {
            return Some(StopReason::LogicalTimeBound);
        }
        if config
            .max_wall_clock()
            .is_some_and(|limit| self.started.elapsed() >= limit)
        {
            return Some(StopReason::WallClockBound);
        }

        let closed_at = self.closed_at?;
        let (occupancy, evacuated) = self
            .ctx
            .state
            .read(|s| (s.occupancy, s.flags.evacuation))
            .ok()?;
        if self.customers.is_empty() && occupancy == 0 {
            return Some(if evacuated {
                StopReason::Evacuated
            } else {
                StopReason::ClosedAndEmpty
            });
        }
        if now.ticks >= closed_at + u64::from(config.closing_grace_minutes) {
            return Some(StopReason::ClosingGraceExpired);
        }
        None
    }

    /// Two-phase shutdown followed by teardown.
    ///
    /// Phase 1 clears `running`, broadcasts termination and waits up to the
    /// configured grace period. Phase 2 aborts what is left and reconciles the
    /// counters: occupancy from the entry gate, queue lengths to zero.
    pub async fn shutdown(mut self) -> Result<SimulationReport, SystemError> {
        self.phase = Phase::ShuttingDown;
        info!("Shutting down bakery...");

        self.ctx.update("shutdown flags", |s| {
            s.flags.running = false;
            s.flags.shop_open = false;
            s.flags.producing = false;
        });
        self.signals.terminate();

        let grace = self.ctx.config.shutdown_grace();
        let outcome = self.supervisor.shutdown(grace).await;
        let mut tally = ShutdownTally {
            graceful: outcome.graceful,
            forced: outcome.forced,
            ..Default::default()
        };
        for exited in outcome.exited {
            self.record_exit(exited, true);
        }
        self.drain_batches();
        if tally.forced > 0 {
            warn!(forced = tally.forced, "actors terminated by force");
        }

        let free = self.ctx.entry.peek();
        self.ctx.state.with_lock(|s| {
            if let Some(free) = free {
                s.occupancy = s.max_occupancy.saturating_sub(free);
            }
            for register in s.registers.iter_mut() {
                register.queue_len = 0;
            }
        })?;
        self.customers.clear();
        self.active_customers.store(0, Ordering::Relaxed);
        tally.entry_free = self.ctx.entry.peek();
        tally.live_after = self.supervisor.live();

        let report = self.build_report(tally)?;
        self.teardown();
        info!(
            served = report.served,
            revenue = report.total_revenue(),
            "Bakery shut down"
        );
        Ok(report)
    }

    fn build_report(&self, shutdown: ShutdownTally) -> Result<SimulationReport, FrameworkError> {
        let catalog = &self.ctx.catalog;
        let inventory = self.tally.audit_requested.then(|| {
            catalog
                .iter()
                .map(|(id, product)| InventoryLine {
                    name: product.name.clone(),
                    on_conveyor: self.ctx.conveyor.on_belt(id),
                })
                .collect()
        });
        self.ctx.state.read(|s| SimulationReport {
            closed_at: s.clock.to_string(),
            ticks: s.clock.ticks,
            evacuated: s.flags.evacuation,
            admitted: s.admitted,
            served: s.served,
            unserved: s.unserved,
            turned_away: s.turned_away,
            unexpected_deaths: s.unexpected_deaths,
            occupancy: s.occupancy,
            batches: self.tally.batches,
            units_baked: self.tally.units_baked,
            products: SimulationReport::products_from_state(s, catalog),
            registers: (0..REGISTERS)
                .filter_map(|r| RegisterSummary::from_state(s, RegisterId(r)))
                .collect(),
            inventory,
            shutdown,
        })
    }

    /// Closes every channel and gate and takes the shared record down.
    /// Returns `false` when teardown had already run.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;

        let aborted = self.supervisor.abort_all();
        if aborted > 0 {
            warn!(aborted, "actors still alive at teardown");
        }
        self.ctx.checkout.close();
        self.ctx.receipts.close();
        self.ctx.conveyor.close();
        self.ctx.entry.close();
        self.ctx.state.take();
        self.phase = Phase::Terminated;
        info!("Teardown complete");
        true
    }
}

impl Drop for BakerySystem {
    fn drop(&mut self) {
        if self.teardown() {
            debug!("teardown ran from drop");
        }
    }
}
