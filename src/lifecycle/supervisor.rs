//! # Supervisor
//!
//! Keeps one [`SlotTable`] entry per spawned actor: its role, its name and the
//! join handle of its task. The orchestrator polls it once per tick to reap
//! finished actors and tell normal exits from deaths.
//!
//! ## Two-phase shutdown
//!
//! [`Supervisor::shutdown`] assumes termination has already been broadcast.
//! It waits for every actor against one shared deadline (phase 1) and aborts
//! whatever is still running once the deadline passes (phase 2). An aborted
//! task drops its future, which releases every permit it held.

use crate::baker_actor::BakeSummary;
use crate::customer_actor::CustomerOutcome;
use crate::framework::{Actor, ActorKind, FrameworkError, Handle, SlotTable};
use crate::model::RegisterSummary;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{info_span, warn, Instrument};

/// What a supervised actor hands back on a normal exit.
#[derive(Debug, Clone, PartialEq)]
pub enum ActorReport {
    Baker(BakeSummary),
    Cashier(RegisterSummary),
    Customer(CustomerOutcome),
}

impl From<BakeSummary> for ActorReport {
    fn from(summary: BakeSummary) -> Self {
        ActorReport::Baker(summary)
    }
}

impl From<RegisterSummary> for ActorReport {
    fn from(summary: RegisterSummary) -> Self {
        ActorReport::Cashier(summary)
    }
}

impl From<CustomerOutcome> for ActorReport {
    fn from(outcome: CustomerOutcome) -> Self {
        ActorReport::Customer(outcome)
    }
}

#[derive(Debug)]
pub enum ExitStatus {
    Finished(ActorReport),
    Panicked,
    /// Aborted before it could finish.
    Cancelled,
}

#[derive(Debug)]
pub struct Exited {
    pub handle: Handle,
    pub kind: ActorKind,
    pub name: String,
    pub status: ExitStatus,
}

#[derive(Debug, Default)]
pub struct ShutdownOutcome {
    pub graceful: usize,
    pub forced: usize,
    pub exited: Vec<Exited>,
}

struct Entry {
    kind: ActorKind,
    name: String,
    task: JoinHandle<ActorReport>,
}

pub struct Supervisor {
    table: SlotTable<Entry>,
}

impl Supervisor {
    pub fn new(initial: usize, hard_cap: usize) -> Self {
        Self {
            table: SlotTable::new(initial, hard_cap),
        }
    }

    /// Spawns `actor` on its own task inside an `actor` span.
    pub fn spawn<A>(&mut self, actor: A, ctx: A::Context) -> Result<Handle, FrameworkError>
    where
        A: Actor,
        A::Output: Into<ActorReport>,
    {
        if self.table.is_full() {
            return Err(FrameworkError::Full(self.table.hard_cap()));
        }
        let kind = actor.kind();
        let name = actor.name();
        let span = info_span!("actor", %kind, name = %name);
        let task = tokio::spawn(
            async move {
                let report: ActorReport = actor.run(ctx).await.into();
                report
            }
            .instrument(span),
        );
        self.table
            .insert(Entry { kind, name, task })
            .inspect_err(|_| warn!("slot table refused a spawned actor"))
    }

    pub fn live(&self) -> usize {
        self.table.len()
    }

    pub fn live_of(&self, kind: ActorKind) -> usize {
        self.table.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Removes every actor whose task has completed.
    pub async fn reap(&mut self) -> Vec<Exited> {
        let finished = self.table.handles_where(|e| e.task.is_finished());
        let mut exited = Vec::with_capacity(finished.len());
        for handle in finished {
            if let Some(entry) = self.table.remove(handle) {
                let status = status_of(entry.task.await);
                exited.push(Exited {
                    handle,
                    kind: entry.kind,
                    name: entry.name,
                    status,
                });
            }
        }
        exited
    }

    /// Waits up to `grace` for every actor, then aborts the rest.
    pub async fn shutdown(&mut self, grace: Duration) -> ShutdownOutcome {
        let deadline = Instant::now() + grace;
        let mut outcome = ShutdownOutcome::default();

        for (handle, mut entry) in self.table.drain() {
            let status = match tokio::time::timeout_at(deadline, &mut entry.task).await {
                Ok(joined) => {
                    outcome.graceful += 1;
                    status_of(joined)
                }
                Err(_) => {
                    warn!(kind = %entry.kind, name = %entry.name, "grace period expired, forcing termination");
                    entry.task.abort();
                    outcome.forced += 1;
                    status_of(entry.task.await)
                }
            };
            outcome.exited.push(Exited {
                handle,
                kind: entry.kind,
                name: entry.name,
                status,
            });
        }
        outcome
    }

    /// Aborts every live actor without waiting. Returns how many there were.
    pub fn abort_all(&mut self) -> usize {
        let entries = self.table.drain();
        for (_, entry) in &entries {
            entry.task.abort();
        }
        entries.len()
    }
}

fn status_of(joined: Result<ActorReport, JoinError>) -> ExitStatus {
    match joined {
        Ok(report) => ExitStatus::Finished(report),
        Err(e) if e.is_panic() => ExitStatus::Panicked,
        Err(_) => ExitStatus::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegisterId;
    use async_trait::async_trait;

    /// Cashier-shaped actor that either answers at once or never returns.
    struct TestCashier {
        register: usize,
        stalled: bool,
    }

    #[async_trait]
    impl Actor for TestCashier {
        type Context = ();
        type Output = RegisterSummary;

        fn name(&self) -> String {
            format!("test-cashier-{}", self.register)
        }

        fn kind(&self) -> ActorKind {
            ActorKind::Cashier
        }

        async fn run(self, _ctx: ()) -> RegisterSummary {
            if self.stalled {
                std::future::pending::<()>().await;
            }
            RegisterSummary {
                register: RegisterId(self.register),
                customers_served: 0,
                revenue: 0.0,
                queue_len: 0,
                sales: Vec::new(),
            }
        }
    }

    struct Crasher;

    #[async_trait]
    impl Actor for Crasher {
        type Context = ();
        type Output = CustomerOutcome;

        fn name(&self) -> String {
            "crasher".into()
        }

        fn kind(&self) -> ActorKind {
            ActorKind::Customer
        }

        async fn run(self, _ctx: ()) -> CustomerOutcome {
            panic!("customer crashed");
        }
    }

    #[tokio::test]
    async fn test_unresponsive_actor_is_forced_down() {
        let mut supervisor = Supervisor::new(2, 8);
        supervisor
            .spawn(TestCashier { register: 0, stalled: false }, ())
            .unwrap();
        supervisor
            .spawn(TestCashier { register: 1, stalled: true }, ())
            .unwrap();
        assert_eq!(supervisor.live_of(ActorKind::Cashier), 2);

        let outcome = supervisor.shutdown(Duration::from_millis(50)).await;

        assert_eq!(outcome.graceful, 1);
        assert_eq!(outcome.forced, 1);
        assert_eq!(supervisor.live(), 0);
        let stalled = outcome
            .exited
            .iter()
            .find(|e| e.name == "test-cashier-1")
            .unwrap();
        assert!(matches!(stalled.status, ExitStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_reap_separates_deaths_from_normal_exits() {
        let mut supervisor = Supervisor::new(1, 8);
        supervisor
            .spawn(TestCashier { register: 0, stalled: false }, ())
            .unwrap();
        supervisor.spawn(Crasher, ()).unwrap();
        supervisor
            .spawn(TestCashier { register: 1, stalled: true }, ())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let exited = supervisor.reap().await;
        assert_eq!(exited.len(), 2);
        assert!(exited
            .iter()
            .any(|e| e.kind == ActorKind::Customer && matches!(e.status, ExitStatus::Panicked)));
        assert!(exited
            .iter()
            .any(|e| matches!(e.status, ExitStatus::Finished(ActorReport::Cashier(_)))));
        assert_eq!(supervisor.live(), 1);

        assert_eq!(supervisor.abort_all(), 1);
        assert_eq!(supervisor.live(), 0);
    }

    #[tokio::test]
    async fn test_spawn_refused_at_hard_cap() {
        let mut supervisor = Supervisor::new(1, 1);
        supervisor
            .spawn(TestCashier { register: 0, stalled: true }, ())
            .unwrap();
        let refused = supervisor.spawn(TestCashier { register: 1, stalled: true }, ());
        assert_eq!(refused, Err(FrameworkError::Full(1)));
        supervisor.abort_all();
    }
}
