//! # Schedule and Load Policy
//!
//! Pure transitions over the shared record, applied by the orchestrator under
//! the state lock once per tick.
//!
//! ## Second register hysteresis
//!
//! Register 0 is always staffed. Register 1 follows occupancy with a band
//! between two fractions of the shop capacity:
//!
//! - above `open_fraction`: open and accepting;
//! - at or below `close_fraction`: stop accepting, keep serving the line;
//! - not accepting and the line is empty: close.
//!
//! Inside the band nothing changes, so the register does not flap.

use crate::model::SharedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleChange {
    ShopOpened,
    ShopClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterChange {
    Opened,
    Draining,
    Closed,
}

/// Opens the doors at opening time and closes them, together with
/// production, at closing time.
pub fn apply_schedule(state: &mut SharedState) -> Option<ScheduleChange> {
    if state.flags.evacuation {
        return None;
    }
    let now = state.clock.minute_of_day();
    let opens = state.open_hour * 60;
    let closes = state.close_hour * 60;

    if !state.flags.shop_open && (opens..closes).contains(&now) {
        state.flags.shop_open = true;
        return Some(ScheduleChange::ShopOpened);
    }
    if state.flags.shop_open && now >= closes {
        state.flags.shop_open = false;
        state.flags.producing = false;
        return Some(ScheduleChange::ShopClosed);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadPolicy {
    open_fraction: f64,
    close_fraction: f64,
}

impl LoadPolicy {
    pub fn new(open_fraction: f64, close_fraction: f64) -> Self {
        Self {
            open_fraction,
            close_fraction,
        }
    }

    pub fn apply(&self, state: &mut SharedState) -> Option<RegisterChange> {
        let capacity = state.max_occupancy as f64;
        let occupancy = state.occupancy as f64;
        let shop_open = state.flags.shop_open;
        let second = state.registers.get_mut(1)?;

        if shop_open && occupancy > self.open_fraction * capacity {
            if second.open && second.accepting {
                return None;
            }
            second.open = true;
            second.accepting = true;
            return Some(RegisterChange::Opened);
        }
        if second.accepting && occupancy <= self.close_fraction * capacity {
            second.accepting = false;
            return Some(RegisterChange::Draining);
        }
        if second.open && !second.accepting && second.queue_len == 0 {
            second.open = false;
            return Some(RegisterChange::Closed);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Catalog, SimulationConfig};
    use std::sync::Arc;

    fn state() -> SharedState {
        let config = SimulationConfig::default();
        let mut s = SharedState::new(&config, Arc::new(Catalog::with_size(config.product_count)));
        s.flags.shop_open = true;
        s
    }

    #[test]
    fn test_second_register_follows_hysteresis_band() {
        let policy = LoadPolicy::new(0.5, 1.0 / 3.0);
        let mut s = state();

        s.occupancy = 5;
        assert_eq!(policy.apply(&mut s), None, "at the open threshold nothing happens");

        s.occupancy = 6;
        assert_eq!(policy.apply(&mut s), Some(RegisterChange::Opened));
        assert_eq!(policy.apply(&mut s), None);

        s.occupancy = 4;
        assert_eq!(policy.apply(&mut s), None, "inside the band the register stays");

        s.occupancy = 3;
        s.registers[1].queue_len = 2;
        assert_eq!(policy.apply(&mut s), Some(RegisterChange::Draining));
        assert!(s.registers[1].open);
        assert_eq!(policy.apply(&mut s), None, "waits for the line to empty");

        s.registers[1].queue_len = 0;
        assert_eq!(policy.apply(&mut s), Some(RegisterChange::Closed));
        assert!(!s.registers[1].open);
    }

    #[test]
    fn test_draining_register_reopens_under_load() {
        let policy = LoadPolicy::new(0.5, 1.0 / 3.0);
        let mut s = state();
        s.registers[1].open = true;
        s.registers[1].queue_len = 1;
        s.occupancy = 9;
        assert_eq!(policy.apply(&mut s), Some(RegisterChange::Opened));
        assert!(s.registers[1].accepting);
    }

    #[test]
    fn test_schedule_opens_and_closes() {
        let mut s = state();
        s.flags.shop_open = false;
        s.flags.producing = true;

        s.clock.hour = 7;
        s.clock.minute = 59;
        assert_eq!(apply_schedule(&mut s), None);

        s.clock.advance();
        assert_eq!(apply_schedule(&mut s), Some(ScheduleChange::ShopOpened));

        s.clock.hour = 16;
        s.clock.minute = 0;
        assert_eq!(apply_schedule(&mut s), Some(ScheduleChange::ShopClosed));
        assert!(!s.flags.producing);
        assert_eq!(apply_schedule(&mut s), None, "never reopens the same day");
    }
}
