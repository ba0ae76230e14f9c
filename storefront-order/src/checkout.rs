use std::sync::Arc;
use storefront_cart::{CartLine, CartStore};
use storefront_core::{CartGateway, GatewayError, NewOrder, OrderLineRecord, PaymentMethod};
use storefront_shared::{Money, ProductRef, UserId};
use tracing::{error, info};

use crate::models::{Order, OrderLine};

/// Turns the cart selection into an order
pub struct CheckoutOrchestrator {
    gateway: Arc<dyn CartGateway>,
}

impl CheckoutOrchestrator {
    pub fn new(gateway: Arc<dyn CartGateway>) -> Self {
        Self { gateway }
    }

    /// Create an order from the currently selected cart lines.
    ///
    /// Sends exactly one creation request, or none when validation fails.
    /// The selection is left alone: the caller clears it once the payment
    /// step is reached, so a failed hand-off can be retried as is.
    pub async fn checkout(&self, cart: &CartStore) -> Result<Order, CheckoutError> {
        let selected = cart.selected_lines().await;
        self.place(cart.user(), &selected).await
    }

    async fn place(&self, user: &UserId, selected: &[CartLine]) -> Result<Order, CheckoutError> {
        let (lines, total_price) = prepare(selected)?;

        let request = NewOrder {
            user: user.clone(),
            lines: lines.iter().map(OrderLineRecord::from).collect(),
            total_price,
            payment_method: PaymentMethod::Unassigned,
        };

        let order_id = self.gateway.create_order(&request).await.map_err(|e| {
            error!(user = %user, error = %e, "Order creation failed");
            CheckoutError::OrderCreationFailed(e)
        })?;

        info!(order_id = %order_id, total = %total_price, lines = lines.len(), "Order created");
        Ok(Order::placed(order_id, lines, total_price))
    }
}

/// Validate the selection and snapshot its lines and total
fn prepare(selected: &[CartLine]) -> Result<(Vec<OrderLine>, Money), CheckoutError> {
    if selected.is_empty() {
        return Err(CheckoutError::EmptySelection);
    }

    let unavailable: Vec<ProductRef> = selected
        .iter()
        .filter(|l| l.is_out_of_stock())
        .map(|l| l.product.clone())
        .collect();
    if !unavailable.is_empty() {
        return Err(CheckoutError::OutOfStock(unavailable));
    }

    let lines: Vec<OrderLine> = selected
        .iter()
        .map(|l| OrderLine {
            product: l.product.clone(),
            quantity: l.quantity,
            unit_price_snapshot: l.unit_price,
        })
        .collect();
    let total = lines.iter().map(OrderLine::line_total).sum();
    Ok((lines, total))
}

fn join_refs(refs: &[ProductRef]) -> String {
    refs.iter().map(ProductRef::as_str).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("No cart lines selected")]
    EmptySelection,

    #[error("Out of stock: {}", join_refs(.0))]
    OutOfStock(Vec<ProductRef>),

    #[error("Order creation failed: {0}")]
    OrderCreationFailed(#[from] GatewayError),
}

impl CheckoutError {
    /// Input errors need the user to change the selection first
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::EmptySelection | CheckoutError::OutOfStock(_) => false,
            CheckoutError::OrderCreationFailed(e) => e.is_retryable(),
        }
    }
}
