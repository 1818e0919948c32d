//! # Cashier
//!
//! One checkout register. The cashier serves checkout requests routed to its
//! register, books sales and revenue in the shared record and answers each
//! customer with a receipt routed by customer id.
//!
//! While its register is closed and nobody is queued the cashier parks on a
//! `watch` flag kept current by a small monitor task (see [`monitor`]), so an
//! idle register costs nothing until the load policy opens it.
//!
//! ## Exit paths
//!
//! - `running` cleared with an empty queue: normal close.
//! - termination: requests already queued are served, then exit.
//! - evacuation: the queue is dropped unserved.

pub mod monitor;

use crate::framework::{Actor, ActorKind, FrameworkError, RecvKey};
use crate::lifecycle::ShopContext;
use crate::model::{CheckoutRequest, ProductId, Receipt, RegisterId, RegisterSummary};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, Instrument};

pub struct Cashier {
    register: RegisterId,
}

impl Cashier {
    pub fn new(register: RegisterId) -> Self {
        Self { register }
    }

    async fn serve(&self, request: CheckoutRequest, ctx: &ShopContext) {
        let register = self.register;
        let scan = ctx.config.scan_delay();
        let mut total = 0.0;

        for (index, &units) in request.quantities.iter().enumerate() {
            if units == 0 {
                continue;
            }
            tokio::time::sleep(scan * units).await;
            total += ctx.catalog.price(ProductId(index)) * f64::from(units);
            ctx.update("sale", |s| {
                if let Some(sold) = s
                    .register_mut(register)
                    .and_then(|r| r.sales.get_mut(index))
                {
                    *sold += u64::from(units);
                }
            });
        }
        ctx.update("revenue", |s| {
            if let Some(r) = s.register_mut(register) {
                r.revenue += total;
                r.customers_served += 1;
            }
        });

        let customer = request.customer;
        let receipt = Receipt {
            register,
            customer,
            total,
            granted: request.quantities,
        };
        if let Err(e) = ctx
            .receipts
            .send_interruptible(customer, receipt, ctx.signals.evacuation())
            .await
        {
            debug!(%customer, error = %e, "receipt not delivered");
        }

        ctx.update("queue length", |s| {
            if let Some(r) = s.register_mut(register) {
                r.queue_len = r.queue_len.saturating_sub(1);
            }
        });
        debug!(%customer, total, "customer served");
    }

    /// Serves whatever is already queued, without waiting for more.
    async fn drain(&self, ctx: &ShopContext) {
        while let Ok(request) = ctx.checkout.try_recv(&RecvKey::Key(self.register)) {
            self.serve(request, ctx).await;
        }
    }

    /// Evacuation: every queued cart goes to the abandoned basket in the same
    /// section that shortens the line. A customer whose request was purged
    /// here can no longer withdraw it, so nobody else books those units.
    fn drop_queue(&self, ctx: &ShopContext) {
        let register = self.register;
        let purged = ctx.checkout.purge(&register);
        let dropped = purged.len();
        ctx.update("evacuated queue", |s| {
            for request in &purged {
                s.add_abandoned(&request.quantities);
            }
            if let Some(r) = s.register_mut(register) {
                r.queue_len = r.queue_len.saturating_sub(dropped);
            }
        });
        info!(%register, dropped, "Evacuation, queue dropped");
    }
}

#[async_trait]
impl Actor for Cashier {
    type Context = ShopContext;
    type Output = RegisterSummary;

    fn name(&self) -> String {
        format!("cashier-{}", self.register.0)
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Cashier
    }

    async fn run(self, ctx: ShopContext) -> RegisterSummary {
        let register = self.register;
        let initially_open = ctx
            .state
            .read(|s| s.register(register).is_some_and(|r| r.open))
            .unwrap_or(false);
        let (active_tx, mut active) = watch::channel(initially_open);
        let monitor = tokio::spawn(
            monitor::watch_register(register, ctx.state.subscribe(), active_tx).in_current_span(),
        );
        let idle = ctx.config.tick() * 5;
        info!(%register, open = initially_open, "Cashier started");

        loop {
            if ctx.signals.is_evacuating() {
                self.drop_queue(&ctx);
                break;
            }
            if ctx.signals.is_terminating() {
                self.drain(&ctx).await;
                break;
            }

            let view = ctx.state.read(|s| {
                let r = s.register(register);
                (
                    r.is_some_and(|r| r.open),
                    r.map_or(0, |r| r.queue_len),
                    s.flags.running,
                )
            });
            let Ok((open, queued, running)) = view else {
                break;
            };
            if !running && queued == 0 {
                break;
            }

            if !open && queued == 0 {
                tokio::select! {
                    biased;
                    _ = ctx.signals.interrupt().cancelled() => {}
                    changed = active.changed() => {
                        if changed.is_err() {
                            tokio::time::sleep(idle).await;
                        }
                    }
                    _ = tokio::time::sleep(idle) => {}
                }
                continue;
            }

            match ctx
                .checkout
                .recv_timeout(RecvKey::Key(register), ctx.config.tick(), ctx.signals.interrupt())
                .await
            {
                Ok(request) => self.serve(request, &ctx).await,
                Err(FrameworkError::TimedOut | FrameworkError::Interrupted) => continue,
                Err(e) => {
                    debug!(error = %e, "checkout line gone");
                    break;
                }
            }
        }

        monitor.abort();
        let summary = ctx
            .state
            .read(|s| RegisterSummary::from_state(s, register))
            .ok()
            .flatten()
            .unwrap_or(RegisterSummary {
                register,
                customers_served: 0,
                revenue: 0.0,
                queue_len: 0,
                sales: Vec::new(),
            });
        info!(
            %register,
            customers = summary.customers_served,
            revenue = summary.revenue,
            "Register closed"
        );
        summary
    }
}
