//! Identifiers and the messages carried by the bounded channels.

use serde::Serialize;
use std::fmt;

/// Index into the catalog. Routing key of the conveyors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProductId(pub usize);

/// Register index. Routing key of the checkout line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegisterId(pub usize);

/// Routing key of the receipt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CustomerId(pub u64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product_{}", self.0)
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "register_{}", self.0)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "customer_{}", self.0)
    }
}

/// One unit placed on a conveyor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConveyorItem {
    pub product: ProductId,
    pub sequence: u64,
}

/// Quantities indexed by product id.
pub type Quantities = Vec<u32>;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub customer: CustomerId,
    pub register: RegisterId,
    pub quantities: Quantities,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub register: RegisterId,
    pub customer: CustomerId,
    pub total: f64,
    pub granted: Quantities,
}

impl CheckoutRequest {
    pub fn units(&self) -> u32 {
        self.quantities.iter().sum()
    }
}
