//! # Baker
//!
//! Production actor. The baker splits the catalog into contiguous, disjoint
//! slices and runs one worker task per slice, so no two workers ever contend
//! for the same shelf gate.
//!
//! A worker never blocks on a full conveyor: a unit whose shelf has no room is
//! skipped. The only wait that can park a worker is the belt slot, and that
//! wait is interruptible.

pub mod conveyor;

pub use conveyor::{Conveyor, Tray};

use crate::framework::{Actor, ActorKind, FrameworkError, GatePermit};
use crate::lifecycle::ShopContext;
use crate::model::{BatchReport, ConveyorItem, ProductId};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::Rng;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};

/// Production actor owning `workers` concurrent worker tasks.
pub struct Baker {
    workers: usize,
}

/// What the baker put out over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BakeSummary {
    pub units: u64,
    pub batches: u64,
    /// Units not baked because their conveyor was full.
    pub skipped: u64,
}

impl BakeSummary {
    fn merge(&mut self, other: BakeSummary) {
        self.units += other.units;
        self.batches += other.batches;
        self.skipped += other.skipped;
    }
}

impl Baker {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

#[async_trait]
impl Actor for Baker {
    type Context = ShopContext;
    type Output = BakeSummary;

    fn name(&self) -> String {
        "baker".to_string()
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Baker
    }

    async fn run(self, ctx: ShopContext) -> BakeSummary {
        let sequence = Arc::new(AtomicU64::new(0));
        let mut workers = JoinSet::new();

        for (worker, slice) in split_catalog(ctx.catalog.len(), self.workers)
            .into_iter()
            .enumerate()
        {
            let rng = ctx.config.rng(worker as u64 + 1);
            let span = info_span!("worker", worker);
            workers.spawn(work(worker, slice, ctx.clone(), Arc::clone(&sequence), rng).instrument(span));
        }

        let mut summary = BakeSummary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(tally) => summary.merge(tally),
                Err(e) => warn!(error = %e, "baker worker died"),
            }
        }

        info!(
            units = summary.units,
            batches = summary.batches,
            skipped = summary.skipped,
            "Baker finished"
        );
        summary
    }
}

/// Splits `products` ids into `workers` contiguous slices.
pub fn split_catalog(products: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.clamp(1, products.max(1));
    (0..workers)
        .map(|i| (i * products / workers)..((i + 1) * products / workers))
        .collect()
}

async fn work(
    worker: usize,
    slice: Range<usize>,
    ctx: ShopContext,
    sequence: Arc<AtomicU64>,
    mut rng: StdRng,
) -> BakeSummary {
    let mut signals = ctx.signals.clone();
    let mut tally = BakeSummary::default();
    if slice.is_empty() {
        return tally;
    }
    debug!(first = slice.start, last = slice.end - 1, "worker started");

    'production: loop {
        let pause = ctx.config.tick() * rng.gen_range(5..=15);
        tokio::select! {
            biased;
            _ = signals.interrupt().cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }

        if let Some(generation) = signals.take_audit() {
            info!(generation, "inventory audit acknowledged, production continues");
        }
        match ctx.state.read(|s| s.flags.producing && s.flags.running) {
            Ok(true) => {}
            Ok(false) | Err(_) => break,
        }

        let kinds = rng.gen_range(1..=slice.len());
        let picked = slice.clone().choose_multiple(&mut rng, kinds);
        let mut placed = 0u32;

        for index in picked {
            let product = ProductId(index);
            let units = rng.gen_range(1..=4);
            for _ in 0..units {
                let shelf = match ctx.conveyor.try_reserve(product) {
                    Ok(shelf) => shelf,
                    Err(FrameworkError::WouldBlock) => {
                        trace!(%product, "conveyor full, unit skipped");
                        tally.skipped += 1;
                        continue;
                    }
                    Err(_) => break 'production,
                };
                let item = ConveyorItem {
                    product,
                    sequence: sequence.fetch_add(1, Ordering::Relaxed),
                };
                if let Err(e) = put_out(&ctx, shelf, item, signals.interrupt()).await {
                    debug!(error = %e, "placement abandoned");
                    break 'production;
                }
                placed += 1;
            }
        }

        if placed > 0 {
            tally.units += u64::from(placed);
            tally.batches += 1;
            debug!(units = placed, "batch placed");
            // the report channel is advisory, a full one just drops the batch note
            let _ = ctx.batches.try_send(BatchReport {
                worker,
                units: placed,
            });
        }
    }

    debug!(units = tally.units, "worker stopped");
    tally
}

/// Counts a unit as produced, then puts it on the belt. A unit is never
/// takeable before it is counted; a failed placement takes the count back.
async fn put_out(
    ctx: &ShopContext,
    shelf: GatePermit,
    item: ConveyorItem,
    cancel: &CancellationToken,
) -> Result<(), FrameworkError> {
    let index = item.product.0;
    ctx.state.with_lock(|s| {
        if let Some(produced) = s.produced.get_mut(index) {
            *produced += 1;
        }
    })?;
    if let Err(e) = ctx.conveyor.place(shelf, item, cancel).await {
        ctx.update("produced rollback", |s| {
            if let Some(produced) = s.produced.get_mut(index) {
                *produced = produced.saturating_sub(1);
            }
        });
        return Err(e);
    }
    Ok(())
}
