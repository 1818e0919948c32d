//! # Shared State
//!
//! The single aggregate record every actor reads and mutates. It lives inside
//! a [`StateGuard`](crate::framework::StateGuard); counters and register state
//! are only ever changed inside `with_lock`.

use crate::framework::Handle;
use crate::model::{Catalog, ProductId, RegisterId, SimulationConfig};
use std::fmt;
use std::sync::Arc;

/// Number of checkout registers.
pub const REGISTERS: usize = 2;

/// Logical time of day, advanced one minute per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    pub hour: u32,
    pub minute: u32,
    pub ticks: u64,
}

impl Clock {
    pub fn starting_at(minute_of_day: u32) -> Self {
        Self {
            hour: minute_of_day / 60,
            minute: minute_of_day % 60,
            ticks: 0,
        }
    }

    pub fn advance(&mut self) {
        self.ticks += 1;
        self.minute += 1;
        if self.minute == 60 {
            self.minute = 0;
            self.hour = (self.hour + 1) % 24;
        }
    }

    pub fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub shop_open: bool,
    pub producing: bool,
    pub inventory_audit: bool,
    pub evacuation: bool,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterState {
    pub open: bool,
    /// Whether new customers may join the queue. Cleared before `open` when
    /// the register drains.
    pub accepting: bool,
    /// Customers whose checkout request is queued or being served.
    pub queue_len: usize,
    pub sales: Vec<u64>,
    pub revenue: f64,
    pub customers_served: u64,
}

impl RegisterState {
    fn new(products: usize, open: bool) -> Self {
        Self {
            open,
            accepting: open,
            queue_len: 0,
            sales: vec![0; products],
            revenue: 0.0,
            customers_served: 0,
        }
    }

    pub fn takes_customers(&self) -> bool {
        self.open && self.accepting
    }
}

/// Supervisor handles of the long-lived actors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorRoster {
    pub orchestrator: u32,
    pub bakers: Vec<Handle>,
    pub cashiers: Vec<Handle>,
}

#[derive(Debug, Clone)]
pub struct SharedState {
    pub max_occupancy: usize,
    pub catalog: Arc<Catalog>,
    pub open_hour: u32,
    pub close_hour: u32,
    pub warmup_minutes: u32,

    pub occupancy: usize,
    pub admitted: u64,
    pub served: u64,
    pub unserved: u64,
    pub turned_away: u64,
    pub unexpected_deaths: u64,

    pub registers: [RegisterState; REGISTERS],
    pub produced: Vec<u64>,
    pub abandoned: Vec<u64>,

    pub flags: ModeFlags,
    pub clock: Clock,
    pub actors: ActorRoster,
}

impl SharedState {
    /// Zeroed record. Register 0 is always staffed, register 1 starts closed.
    pub fn new(config: &SimulationConfig, catalog: Arc<Catalog>) -> Self {
        let products = catalog.len();
        Self {
            max_occupancy: config.max_occupancy,
            catalog,
            open_hour: config.open_hour,
            close_hour: config.close_hour,
            warmup_minutes: config.warmup_minutes,
            occupancy: 0,
            admitted: 0,
            served: 0,
            unserved: 0,
            turned_away: 0,
            unexpected_deaths: 0,
            registers: [
                RegisterState::new(products, true),
                RegisterState::new(products, false),
            ],
            produced: vec![0; products],
            abandoned: vec![0; products],
            flags: ModeFlags {
                running: true,
                ..ModeFlags::default()
            },
            clock: Clock::starting_at(config.start_minute()),
            actors: ActorRoster {
                orchestrator: std::process::id(),
                ..ActorRoster::default()
            },
        }
    }

    pub fn register(&self, id: RegisterId) -> Option<&RegisterState> {
        self.registers.get(id.0)
    }

    pub fn register_mut(&mut self, id: RegisterId) -> Option<&mut RegisterState> {
        self.registers.get_mut(id.0)
    }

    /// Among registers taking customers, the one with the shortest queue.
    /// Ties go to the lowest id.
    pub fn pick_register(&self) -> Option<RegisterId> {
        self.registers
            .iter()
            .enumerate()
            .filter(|(_, r)| r.takes_customers())
            .min_by_key(|(i, r)| (r.queue_len, *i))
            .map(|(i, _)| RegisterId(i))
    }

    pub fn add_abandoned(&mut self, cart: &[u32]) {
        for (slot, units) in self.abandoned.iter_mut().zip(cart) {
            *slot += u64::from(*units);
        }
    }

    pub fn abandoned_total(&self) -> u64 {
        self.abandoned.iter().sum()
    }

    pub fn sold(&self, product: ProductId) -> u64 {
        self.registers
            .iter()
            .filter_map(|r| r.sales.get(product.0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SharedState {
        let config = SimulationConfig::default();
        SharedState::new(&config, Arc::new(Catalog::with_size(config.product_count)))
    }

    #[test]
    fn test_clock_rolls_over_the_hour() {
        let mut clock = Clock::starting_at(7 * 60 + 59);
        clock.advance();
        assert_eq!(clock.to_string(), "08:00");
        assert_eq!(clock.ticks, 1);
    }

    #[test]
    fn test_pick_register_prefers_shorter_queue_then_lowest_id() {
        let mut s = state();
        assert_eq!(s.pick_register(), Some(RegisterId(0)));

        s.registers[1].open = true;
        s.registers[1].accepting = true;
        assert_eq!(s.pick_register(), Some(RegisterId(0)));

        s.registers[0].queue_len = 2;
        s.registers[1].queue_len = 1;
        assert_eq!(s.pick_register(), Some(RegisterId(1)));

        s.registers[1].accepting = false;
        assert_eq!(s.pick_register(), Some(RegisterId(0)));
    }

    #[test]
    fn test_abandoned_basket_accumulates() {
        let mut s = state();
        let mut cart = vec![0; s.catalog.len()];
        cart[1] = 3;
        s.add_abandoned(&cart);
        s.add_abandoned(&cart);
        assert_eq!(s.abandoned[1], 6);
        assert_eq!(s.abandoned_total(), 6);
    }
}
