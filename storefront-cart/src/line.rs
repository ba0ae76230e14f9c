use serde::{Deserialize, Serialize};
use storefront_core::RemoteCartLine;
use storefront_shared::{Money, ProductRef};

/// One product in the cart. Quantity is never below 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price: Money,
    pub stock_available: u32,
}

impl CartLine {
    pub fn new(product: ProductRef, quantity: u32, unit_price: Money, stock_available: u32) -> Self {
        Self {
            product,
            quantity: quantity.max(1),
            unit_price,
            stock_available,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_available == 0
    }
}

impl From<RemoteCartLine> for CartLine {
    fn from(remote: RemoteCartLine) -> Self {
        CartLine::new(remote.product, remote.quantity, remote.unit_price, remote.stock_available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_zero_quantity_is_clamped() {
        let line = CartLine::from(RemoteCartLine {
            product: ProductRef::new("p1"),
            quantity: 0,
            unit_price: Money::new(20),
            stock_available: 3,
        });
        assert_eq!(line.quantity, 1);
        assert_eq!(line.line_total(), Money::new(20));
        assert!(!line.is_out_of_stock());
    }
}
