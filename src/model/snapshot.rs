//! # Diagnostic Snapshot
//!
//! A flat, point-in-time view of the shared record for read-only observers.
//! Fields are copied from the last published state, so there is no atomicity
//! across fields relative to in-flight actors. Values the observer could not
//! obtain are `None` and render as `unavailable`.

use crate::model::SharedState;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterView {
    pub open: bool,
    pub accepting: bool,
    pub queue_len: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub clock: String,
    pub ticks: u64,
    pub shop_open: bool,
    pub producing: bool,
    pub inventory_audit: bool,
    pub evacuation: bool,
    pub running: bool,
    pub occupancy: usize,
    pub max_occupancy: usize,
    pub admitted: u64,
    pub served: u64,
    pub unserved: u64,
    pub turned_away: u64,
    /// Customer tasks currently supervised.
    pub active_customers: Option<usize>,
    /// Free units at the entry gate.
    pub entry_gate_free: Option<usize>,
    pub registers: Vec<RegisterView>,
    pub produced: Vec<(String, u64)>,
    pub abandoned_total: u64,
}

impl Snapshot {
    pub fn capture(
        state: &SharedState,
        entry_gate_free: Option<usize>,
        active_customers: Option<usize>,
    ) -> Self {
        Self {
            clock: state.clock.to_string(),
            ticks: state.clock.ticks,
            shop_open: state.flags.shop_open,
            producing: state.flags.producing,
            inventory_audit: state.flags.inventory_audit,
            evacuation: state.flags.evacuation,
            running: state.flags.running,
            occupancy: state.occupancy,
            max_occupancy: state.max_occupancy,
            admitted: state.admitted,
            served: state.served,
            unserved: state.unserved,
            turned_away: state.turned_away,
            active_customers,
            entry_gate_free,
            registers: state
                .registers
                .iter()
                .map(|r| RegisterView {
                    open: r.open,
                    accepting: r.accepting,
                    queue_len: r.queue_len,
                    revenue: r.revenue,
                })
                .collect(),
            produced: state
                .catalog
                .iter()
                .map(|(id, p)| (p.name.clone(), state.produced.get(id.0).copied().unwrap_or(0)))
                .collect(),
            abandoned_total: state.abandoned_total(),
        }
    }
}

struct Maybe<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for Maybe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("unavailable"),
        }
    }
}

/// One `key=value` pair per line.
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "clock={}", self.clock)?;
        writeln!(f, "ticks={}", self.ticks)?;
        writeln!(f, "shop_open={}", u8::from(self.shop_open))?;
        writeln!(f, "producing={}", u8::from(self.producing))?;
        writeln!(f, "inventory_audit={}", u8::from(self.inventory_audit))?;
        writeln!(f, "evacuation={}", u8::from(self.evacuation))?;
        writeln!(f, "running={}", u8::from(self.running))?;
        writeln!(f, "occupancy={}", self.occupancy)?;
        writeln!(f, "max_occupancy={}", self.max_occupancy)?;
        writeln!(f, "admitted={}", self.admitted)?;
        writeln!(f, "served={}", self.served)?;
        writeln!(f, "unserved={}", self.unserved)?;
        writeln!(f, "turned_away={}", self.turned_away)?;
        writeln!(f, "active_customers={}", Maybe(self.active_customers))?;
        writeln!(f, "entry_gate_free={}", Maybe(self.entry_gate_free))?;
        for (i, r) in self.registers.iter().enumerate() {
            writeln!(f, "register{i}_open={}", u8::from(r.open))?;
            writeln!(f, "register{i}_accepting={}", u8::from(r.accepting))?;
            writeln!(f, "register{i}_queue_len={}", r.queue_len)?;
            writeln!(f, "register{i}_revenue={:.2}", r.revenue)?;
        }
        for (i, (name, produced)) in self.produced.iter().enumerate() {
            writeln!(f, "produced{i}={produced} # {name}")?;
        }
        write!(f, "abandoned_total={}", self.abandoned_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Catalog, SimulationConfig};
    use std::sync::Arc;

    #[test]
    fn test_absent_fields_render_unavailable() {
        let config = SimulationConfig::default();
        let state = SharedState::new(&config, Arc::new(Catalog::with_size(config.product_count)));
        let text = Snapshot::capture(&state, None, Some(0)).to_string();

        assert!(text.contains("entry_gate_free=unavailable"));
        assert!(text.contains("active_customers=0"));
        assert!(text.contains("register0_open=1"));
        assert!(text.contains("register1_open=0"));
        assert!(text.lines().all(|line| line.contains('=')));
    }
}
