//! End-of-run records.

use crate::model::{Catalog, RegisterId, SharedState};
use serde::Serialize;

/// Per-register totals read from the shared record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterSummary {
    pub register: RegisterId,
    pub customers_served: u64,
    pub revenue: f64,
    pub queue_len: usize,
    /// Units sold per product name, zero lines omitted.
    pub sales: Vec<(String, u64)>,
}

impl RegisterSummary {
    pub fn from_state(state: &SharedState, register: RegisterId) -> Option<Self> {
        let r = state.register(register)?;
        Some(Self {
            register,
            customers_served: r.customers_served,
            revenue: r.revenue,
            queue_len: r.queue_len,
            sales: state
                .catalog
                .iter()
                .filter_map(|(id, p)| {
                    let sold = r.sales.get(id.0).copied().unwrap_or(0);
                    (sold > 0).then(|| (p.name.clone(), sold))
                })
                .collect(),
        })
    }
}

/// Sent by a baker worker after every batch that put at least one unit out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub worker: usize,
    pub units: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTally {
    pub name: String,
    pub produced: u64,
    pub sold: u64,
    pub abandoned: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryLine {
    pub name: String,
    pub on_conveyor: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownTally {
    pub graceful: usize,
    pub forced: usize,
    /// Free entry slots once every actor is down. `None` if the gate was
    /// already closed.
    pub entry_free: Option<usize>,
    /// Actors still registered after phase 2.
    pub live_after: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub closed_at: String,
    pub ticks: u64,
    pub evacuated: bool,
    pub admitted: u64,
    pub served: u64,
    pub unserved: u64,
    pub turned_away: u64,
    pub unexpected_deaths: u64,
    /// Occupancy after shutdown reconciliation.
    pub occupancy: usize,
    pub batches: u64,
    pub units_baked: u64,
    pub products: Vec<ProductTally>,
    pub registers: Vec<RegisterSummary>,
    /// Units left on each conveyor. Only taken when an audit was requested.
    pub inventory: Option<Vec<InventoryLine>>,
    pub shutdown: ShutdownTally,
}

impl SimulationReport {
    pub fn total_revenue(&self) -> f64 {
        self.registers.iter().map(|r| r.revenue).sum()
    }

    pub fn products_from_state(state: &SharedState, catalog: &Catalog) -> Vec<ProductTally> {
        catalog
            .iter()
            .map(|(id, p)| ProductTally {
                name: p.name.clone(),
                produced: state.produced.get(id.0).copied().unwrap_or(0),
                sold: state.sold(id),
                abandoned: state.abandoned.get(id.0).copied().unwrap_or(0),
            })
            .collect()
    }
}
