//! # Customer
//!
//! Short-lived actor with a fixed path through the shop:
//!
//! 1. leave at once if the shop is closed;
//! 2. try the entry gate a bounded number of times, backing off in between;
//! 3. take what is on the conveyors, accepting partial fulfilment;
//! 4. queue at the accepting register with the shortest line and wait,
//!    with a bounded number of attempts, for the receipt;
//! 5. leave.
//!
//! Leaving is not a step anybody has to remember: the [`Visit`] held from
//! step 2 onwards releases occupancy and the entry permit when it drops.
//! Evacuation seen at any wait point empties the cart into the shop's
//! abandoned basket before leaving.

pub mod visit;

pub use visit::{QueueSpot, Visit, VisitTicket};

use crate::framework::{Actor, ActorKind, FrameworkError, GatePermit, RecvKey};
use crate::lifecycle::ShopContext;
use crate::model::{CheckoutRequest, CustomerId, ProductId, Quantities, RegisterId};
use async_trait::async_trait;
use rand::seq::IteratorRandom;
use rand::Rng;
use tracing::{debug, trace};

/// How a customer's visit ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerOutcome {
    ShopClosed,
    TurnedAway,
    EmptyHanded,
    /// No register was taking customers.
    NoRegister,
    Served { total: f64 },
    GaveUp,
    Evacuated,
    Interrupted,
}

pub struct Customer {
    id: CustomerId,
    list: Vec<(ProductId, u32)>,
    ticket: VisitTicket,
}

impl Customer {
    pub fn with_list(id: CustomerId, list: Vec<(ProductId, u32)>) -> Self {
        Self {
            id,
            list,
            ticket: VisitTicket::default(),
        }
    }

    /// 2 to 5 distinct products (never more than the catalog holds), 1 to 3
    /// units each.
    pub fn random(id: CustomerId, products: usize, rng: &mut impl Rng) -> Self {
        let kinds = rng.gen_range(2..=5).min(products);
        let picked = (0..products).choose_multiple(rng, kinds);
        let list = picked
            .into_iter()
            .map(|p| (ProductId(p), rng.gen_range(1..=3)))
            .collect();
        Self::with_list(id, list)
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn shopping_list(&self) -> &[(ProductId, u32)] {
        &self.list
    }

    pub fn ticket(&self) -> VisitTicket {
        self.ticket.clone()
    }

    async fn visit(&self, ctx: &ShopContext) -> CustomerOutcome {
        match ctx.state.read(|s| s.flags.shop_open) {
            Ok(true) => {}
            Ok(false) => return CustomerOutcome::ShopClosed,
            Err(_) => return CustomerOutcome::Interrupted,
        }

        let permit = match self.enter(ctx).await {
            Ok(permit) => permit,
            Err(outcome) => return outcome,
        };
        let _visit = match Visit::begin(permit, ctx.state.clone(), self.ticket.clone()) {
            Ok(visit) => visit,
            Err(_) => return CustomerOutcome::Interrupted,
        };

        let mut cart: Quantities = vec![0; ctx.catalog.len()];
        for &(product, wanted) in &self.list {
            tokio::select! {
                biased;
                _ = ctx.signals.interrupt().cancelled() => {}
                _ = tokio::time::sleep(ctx.config.tick()) => {}
            }
            if ctx.signals.should_stop() {
                return self.cut_short(ctx, &cart);
            }
            for _ in 0..wanted {
                match ctx.conveyor.take(product) {
                    Ok(_) => {
                        if let Some(units) = cart.get_mut(product.0) {
                            *units += 1;
                        }
                    }
                    Err(FrameworkError::WouldBlock) => break,
                    Err(_) => return self.cut_short(ctx, &cart),
                }
            }
            trace!(%product, wanted, got = cart.get(product.0).copied().unwrap_or(0), "shelf visited");
        }

        if cart.iter().all(|units| *units == 0) {
            count_unserved(ctx);
            return CustomerOutcome::EmptyHanded;
        }
        self.checkout(ctx, cart).await
    }

    /// Bounded, non-blocking entry attempts. Counts the customer as turned
    /// away when the budget runs out.
    async fn enter(&self, ctx: &ShopContext) -> Result<GatePermit, CustomerOutcome> {
        for attempt in 0..ctx.config.entry_attempts {
            match ctx.entry.try_acquire() {
                Ok(permit) => return Ok(permit),
                Err(FrameworkError::WouldBlock) => {}
                Err(_) => return Err(CustomerOutcome::Interrupted),
            }
            trace!(attempt, "shop full, waiting at the door");
            tokio::select! {
                biased;
                _ = ctx.signals.interrupt().cancelled() => {
                    return Err(if ctx.signals.is_evacuating() {
                        CustomerOutcome::Evacuated
                    } else {
                        CustomerOutcome::Interrupted
                    });
                }
                _ = tokio::time::sleep(ctx.config.entry_backoff()) => {}
            }
            if !ctx.state.read(|s| s.flags.shop_open).unwrap_or(false) {
                return Err(CustomerOutcome::ShopClosed);
            }
        }
        ctx.update("turned away", |s| s.turned_away += 1);
        Err(CustomerOutcome::TurnedAway)
    }

    async fn checkout(&self, ctx: &ShopContext, cart: Quantities) -> CustomerOutcome {
        let picked = ctx.state.with_lock(|s| {
            let register = s.pick_register()?;
            if let Some(r) = s.register_mut(register) {
                r.queue_len += 1;
            }
            Some(register)
        });
        let register = match picked {
            Ok(Some(register)) => register,
            Ok(None) => {
                debug!("no register taking customers");
                count_unserved(ctx);
                return CustomerOutcome::NoRegister;
            }
            Err(_) => return CustomerOutcome::Interrupted,
        };

        let mut spot = QueueSpot::new(ctx.state.clone(), register);
        let request = CheckoutRequest {
            customer: self.id,
            register,
            quantities: cart.clone(),
        };
        if let Err(e) = ctx
            .checkout
            .send_interruptible(register, request, ctx.signals.interrupt())
            .await
        {
            debug!(%register, error = %e, "could not join the line");
            drop(spot);
            return self.cut_short(ctx, &cart);
        }
        spot.disarm();

        for attempt in 0..ctx.config.receipt_attempts {
            match ctx
                .receipts
                .recv_timeout(RecvKey::Key(self.id), ctx.config.receipt_wait(), ctx.signals.interrupt())
                .await
            {
                Ok(receipt) => return self.paid(ctx, receipt.total),
                Err(FrameworkError::TimedOut) => trace!(attempt, %register, "still waiting for receipt"),
                Err(_) => break,
            }
        }

        let withdrawn = self.leave_line(ctx, register);
        if withdrawn {
            debug!(%register, "left the line");
        } else if let Ok(receipt) = ctx.receipts.try_recv(&RecvKey::Key(self.id)) {
            return self.paid(ctx, receipt.total);
        }

        if withdrawn && ctx.signals.should_stop() {
            return self.cut_short(ctx, &cart);
        }
        // a request the cashier took or purged is booked there, the cart went with it
        count_unserved(ctx);
        if ctx.signals.is_evacuating() {
            CustomerOutcome::Evacuated
        } else if ctx.signals.should_stop() {
            CustomerOutcome::Interrupted
        } else {
            CustomerOutcome::GaveUp
        }
    }

    /// Withdraws the queued request. Only a withdrawn request gives its queue
    /// spot back; one the cashier already took or purged is accounted there.
    fn leave_line(&self, ctx: &ShopContext, register: RegisterId) -> bool {
        let id = self.id;
        if ctx.checkout.withdraw(&register, |r| r.customer == id).is_none() {
            return false;
        }
        ctx.update("left the line", |s| {
            if let Some(r) = s.register_mut(register) {
                r.queue_len = r.queue_len.saturating_sub(1);
            }
        });
        true
    }

    fn paid(&self, ctx: &ShopContext, total: f64) -> CustomerOutcome {
        ctx.update("served", |s| s.served += 1);
        CustomerOutcome::Served { total }
    }

    /// Stop signal inside the shop. Evacuation dumps the cart.
    fn cut_short(&self, ctx: &ShopContext, cart: &[u32]) -> CustomerOutcome {
        let evacuating = ctx.signals.is_evacuating();
        ctx.update("cut short", |s| {
            if evacuating {
                s.add_abandoned(cart);
            }
            s.unserved += 1;
        });
        if evacuating {
            CustomerOutcome::Evacuated
        } else {
            CustomerOutcome::Interrupted
        }
    }
}

fn count_unserved(ctx: &ShopContext) {
    ctx.update("unserved", |s| s.unserved += 1);
}

#[async_trait]
impl Actor for Customer {
    type Context = ShopContext;
    type Output = CustomerOutcome;

    fn name(&self) -> String {
        self.id.to_string()
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Customer
    }

    async fn run(self, ctx: ShopContext) -> CustomerOutcome {
        let outcome = self.visit(&ctx).await;
        debug!(customer = %self.id, ?outcome, "customer left");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_random_list_is_distinct_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 0..200 {
            let customer = Customer::random(CustomerId(n), 12, &mut rng);
            let list = customer.shopping_list();
            assert!((2..=5).contains(&list.len()));
            let distinct: HashSet<_> = list.iter().map(|(p, _)| *p).collect();
            assert_eq!(distinct.len(), list.len());
            assert!(list.iter().all(|(p, q)| p.0 < 12 && (1..=3).contains(q)));
        }

        let customer = Customer::random(CustomerId(0), 3, &mut rng);
        assert!(customer.shopping_list().len() <= 3);
    }

    #[tokio::test]
    async fn test_closed_shop_is_left_at_once() {
        let (ctx, _parts) = ShopContext::build(Default::default());
        let outcome = Customer::with_list(CustomerId(1), vec![(ProductId(0), 1)])
            .run(ctx.clone())
            .await;
        assert_eq!(outcome, CustomerOutcome::ShopClosed);
        assert_eq!(ctx.state.read(|s| s.admitted), Ok(0));
    }

    #[tokio::test]
    async fn test_full_shop_turns_customer_away() {
        let config = crate::model::SimulationConfig {
            max_occupancy: 3,
            entry_attempts: 3,
            entry_backoff_ms: 1,
            ..Default::default()
        };
        let (ctx, _parts) = ShopContext::build(config);
        ctx.state.with_lock(|s| s.flags.shop_open = true).unwrap();
        let _held: Vec<_> = (0..3).map(|_| ctx.entry.try_acquire().unwrap()).collect();

        let outcome = Customer::with_list(CustomerId(1), vec![(ProductId(0), 1)])
            .run(ctx.clone())
            .await;
        assert_eq!(outcome, CustomerOutcome::TurnedAway);
        assert_eq!(ctx.state.read(|s| (s.turned_away, s.admitted)), Ok((1, 0)));
    }

    #[tokio::test]
    async fn test_empty_conveyor_leaves_empty_handed() {
        let config = crate::model::SimulationConfig {
            tick_ms: 1,
            ..Default::default()
        };
        let (ctx, _parts) = ShopContext::build(config);
        ctx.state.with_lock(|s| s.flags.shop_open = true).unwrap();

        let outcome = Customer::with_list(CustomerId(1), vec![(ProductId(0), 2)])
            .run(ctx.clone())
            .await;
        assert_eq!(outcome, CustomerOutcome::EmptyHanded);
        assert_eq!(ctx.state.read(|s| (s.occupancy, s.unserved)), Ok((0, 1)));
        assert_eq!(ctx.entry.peek(), Some(ctx.entry.bound()));
    }
}
