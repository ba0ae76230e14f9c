use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_shared::{Money, OrderId, ProductRef, UserId};

use crate::payment::PaymentMethod;
use crate::GatewayResult;

/// A cart line as the remote store reports it, product details populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCartLine {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price: Money,
    pub stock_available: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCart {
    pub lines: Vec<RemoteCartLine>,
}

/// One purchased line, with the unit price captured when the order was placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRecord {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Body of an order creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user: UserId,
    pub lines: Vec<OrderLineRecord>,
    pub total_price: Money,
    pub payment_method: PaymentMethod,
}

/// An order as the remote store reports it. `status` stays raw here;
/// interpreting it belongs to the order lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub status: String,
    pub lines: Vec<OrderLineRecord>,
    pub total_price: Money,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Remote cart and order endpoints
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Fetch the user's cart. A missing cart is `GatewayError::NotFound`.
    async fn fetch_cart(&self, user: &UserId) -> GatewayResult<RemoteCart>;

    /// Put a product in the cart with the given quantity
    async fn add_to_cart(&self, user: &UserId, product: &ProductRef, quantity: u32) -> GatewayResult<()>;

    /// Set a line's quantity. Returns the quantity the server stored.
    async fn update_quantity(
        &self,
        user: &UserId,
        product: &ProductRef,
        quantity: u32,
    ) -> GatewayResult<u32>;

    async fn remove_line(&self, user: &UserId, product: &ProductRef) -> GatewayResult<()>;

    /// Create an order; returns the id the store assigned
    async fn create_order(&self, order: &NewOrder) -> GatewayResult<OrderId>;

    /// Best-effort cancellation of an order that was never paid
    async fn cancel_order(&self, order_id: &OrderId) -> GatewayResult<()>;

    async fn fetch_order(&self, order_id: &OrderId) -> GatewayResult<OrderRecord>;

    async fn list_orders(&self, user: &UserId) -> GatewayResult<Vec<OrderRecord>>;
}
