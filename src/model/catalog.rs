use crate::model::ProductId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub name: String,
    pub price: f64,
    /// Units that fit on this product's conveyor at once.
    pub conveyor_capacity: usize,
}

/// Products sold by the shop, indexed by [`ProductId`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    products: Vec<Product>,
}

const STANDARD: &[(&str, f64, usize)] = &[
    ("Bread Loaf", 4.50, 10),
    ("Baguette", 3.20, 8),
    ("Croissant", 2.80, 12),
    ("Rye Bread", 5.00, 8),
    ("Kaiser Roll", 0.80, 20),
    ("Doughnut", 2.50, 15),
    ("Cheesecake", 12.00, 6),
    ("Apple Pie", 9.50, 6),
    ("Cinnamon Bun", 3.60, 10),
    ("Sourdough", 6.20, 8),
    ("Bagel", 1.90, 14),
    ("Muffin", 2.70, 12),
];

impl Catalog {
    /// The standard assortment, padded with generic products past its end.
    pub fn with_size(count: usize) -> Self {
        let products = (0..count)
            .map(|i| match STANDARD.get(i) {
                Some(&(name, price, conveyor_capacity)) => Product {
                    name: name.to_string(),
                    price,
                    conveyor_capacity,
                },
                None => Product {
                    name: format!("Product-{}", i + 1),
                    price: 3.0 + (i % 10) as f64,
                    conveyor_capacity: 6 + i % 5,
                },
            })
            .collect();
        Self { products }
    }

    pub fn from_products(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.get(id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = ProductId> {
        (0..self.products.len()).map(ProductId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, &Product)> {
        self.products.iter().enumerate().map(|(i, p)| (ProductId(i), p))
    }

    pub fn name(&self, id: ProductId) -> &str {
        self.get(id).map_or("unknown", |p| p.name.as_str())
    }

    pub fn price(&self, id: ProductId) -> f64 {
        self.get(id).map_or(0.0, |p| p.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_products_are_generated() {
        let catalog = Catalog::with_size(14);
        assert_eq!(catalog.len(), 14);
        assert_eq!(catalog.name(ProductId(0)), "Bread Loaf");

        let extra = catalog.get(ProductId(13)).unwrap();
        assert_eq!(extra.name, "Product-14");
        assert_eq!(extra.price, 6.0);
        assert_eq!(extra.conveyor_capacity, 9);
    }
}
