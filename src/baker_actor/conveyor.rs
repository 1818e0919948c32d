//! # Conveyor
//!
//! Per-product shelves in front of one shared production channel. A baker
//! first reserves a unit on the product's shelf gate, then places the item on
//! the belt; the shelf permit rides along inside the [`Tray`] and is released
//! when a customer takes the item off. Free shelf units plus items on the belt
//! therefore always add up to the product's conveyor capacity.

use crate::framework::{BoundedChannel, CapacityGate, FrameworkError, GatePermit, RecvKey};
use crate::model::{Catalog, ConveyorItem, ProductId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct Tray {
    pub item: ConveyorItem,
    _shelf: GatePermit,
}

#[derive(Clone)]
pub struct Conveyor {
    shelves: Arc<[CapacityGate]>,
    belt: BoundedChannel<ProductId, Tray>,
}

impl Conveyor {
    pub fn new(catalog: &Catalog, byte_budget: usize) -> Self {
        let shelves: Vec<CapacityGate> = catalog
            .iter()
            .map(|(id, product)| CapacityGate::new(format!("shelf-{}", id.0), product.conveyor_capacity))
            .collect();
        Self {
            shelves: shelves.into(),
            belt: BoundedChannel::with_byte_budget("conveyor", byte_budget),
        }
    }

    fn shelf(&self, product: ProductId) -> Result<&CapacityGate, FrameworkError> {
        self.shelves
            .get(product.0)
            .ok_or(FrameworkError::Gone("conveyor shelf"))
    }

    /// Reserves room for one unit. `WouldBlock` when the conveyor is full.
    pub fn try_reserve(&self, product: ProductId) -> Result<GatePermit, FrameworkError> {
        self.shelf(product)?.try_acquire()
    }

    /// Puts a reserved unit on the belt. Interrupted placements drop the
    /// reservation.
    pub async fn place(
        &self,
        shelf: GatePermit,
        item: ConveyorItem,
        cancel: &CancellationToken,
    ) -> Result<(), FrameworkError> {
        let tray = Tray { item, _shelf: shelf };
        self.belt.send_interruptible(item.product, tray, cancel).await
    }

    /// Takes one unit off without waiting. `WouldBlock` when none is there.
    pub fn take(&self, product: ProductId) -> Result<ConveyorItem, FrameworkError> {
        self.belt
            .try_recv(&RecvKey::Key(product))
            .map(|tray| tray.item)
    }

    pub fn on_belt(&self, product: ProductId) -> usize {
        self.belt.len_for(&product)
    }

    /// Free shelf units, `None` once torn down.
    pub fn shelf_free(&self, product: ProductId) -> Option<usize> {
        self.shelf(product).ok().and_then(CapacityGate::peek)
    }

    pub fn capacity(&self, product: ProductId) -> usize {
        self.shelf(product).map_or(0, CapacityGate::bound)
    }

    pub fn close(&self) {
        self.belt.close();
        for shelf in self.shelves.iter() {
            shelf.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Product;

    fn conveyor() -> Conveyor {
        let catalog = Catalog::from_products(vec![
            Product {
                name: "Roll".into(),
                price: 1.0,
                conveyor_capacity: 2,
            },
            Product {
                name: "Pie".into(),
                price: 9.0,
                conveyor_capacity: 1,
            },
        ]);
        Conveyor::new(&catalog, 4096)
    }

    #[tokio::test]
    async fn test_shelf_free_plus_on_belt_is_capacity() {
        let conveyor = conveyor();
        let cancel = CancellationToken::new();
        let roll = ProductId(0);

        for sequence in 0..2 {
            let shelf = conveyor.try_reserve(roll).unwrap();
            conveyor
                .place(shelf, ConveyorItem { product: roll, sequence }, &cancel)
                .await
                .unwrap();
            assert_eq!(conveyor.shelf_free(roll).unwrap() + conveyor.on_belt(roll), 2);
        }
        assert_eq!(conveyor.try_reserve(roll).unwrap_err(), FrameworkError::WouldBlock);

        assert_eq!(conveyor.take(roll).unwrap().sequence, 0);
        assert_eq!(conveyor.shelf_free(roll), Some(1));
        assert_eq!(conveyor.on_belt(roll), 1);
    }

    #[tokio::test]
    async fn test_every_item_is_taken_exactly_once() {
        let conveyor = conveyor();
        let cancel = CancellationToken::new();
        let pie = ProductId(1);

        let shelf = conveyor.try_reserve(pie).unwrap();
        conveyor
            .place(shelf, ConveyorItem { product: pie, sequence: 7 }, &cancel)
            .await
            .unwrap();

        assert_eq!(conveyor.take(pie).map(|i| i.sequence), Ok(7));
        assert_eq!(conveyor.take(pie), Err(FrameworkError::WouldBlock));
        assert_eq!(conveyor.take(ProductId(0)), Err(FrameworkError::WouldBlock));
    }

    #[tokio::test]
    async fn test_interrupted_placement_frees_the_shelf() {
        let conveyor = conveyor();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let shelf = conveyor.try_reserve(ProductId(1)).unwrap();
        let item = ConveyorItem { product: ProductId(1), sequence: 0 };
        let placed = conveyor.place(shelf, item, &cancel).await;
        assert_eq!(placed, Err(FrameworkError::Interrupted));
        assert_eq!(conveyor.shelf_free(ProductId(1)), Some(1));
        assert_eq!(conveyor.on_belt(ProductId(1)), 0);
    }
}
