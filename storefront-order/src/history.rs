use std::sync::Arc;
use storefront_core::{CartGateway, GatewayError};
use storefront_shared::{OrderId, UserId};
use tracing::debug;

use crate::lifecycle::observe_transition;
use crate::models::Order;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl HistoryError {
    fn for_order(order_id: &OrderId, error: GatewayError) -> Self {
        match error {
            GatewayError::NotFound(_) => HistoryError::NotFound(order_id.clone()),
            other => HistoryError::Gateway(other),
        }
    }
}

/// Read side of the order lifecycle: past orders and their current status
pub struct OrderHistory {
    gateway: Arc<dyn CartGateway>,
}

impl OrderHistory {
    pub fn new(gateway: Arc<dyn CartGateway>) -> Self {
        Self { gateway }
    }

    /// All orders for `user`, newest first
    pub async fn list(&self, user: &UserId) -> Result<Vec<Order>, HistoryError> {
        let records = match self.gateway.list_orders(user).await {
            Ok(records) => records,
            Err(GatewayError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let mut orders: Vec<Order> = records.into_iter().map(Order::from_record).collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        debug!(user = %user, count = orders.len(), "Order history loaded");
        Ok(orders)
    }

    pub async fn detail(&self, order_id: &OrderId) -> Result<Order, HistoryError> {
        let record = self
            .gateway
            .fetch_order(order_id)
            .await
            .map_err(|e| HistoryError::for_order(order_id, e))?;
        Ok(Order::from_record(record))
    }

    /// Re-read an order; the server's status replaces the one held locally
    pub async fn refresh(&self, order: &Order) -> Result<Order, HistoryError> {
        let latest = self.detail(order.id()).await?;
        observe_transition(order.status(), latest.status());
        Ok(latest)
    }
}
