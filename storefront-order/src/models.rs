use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{OrderLineRecord, OrderRecord, PaymentMethod};
use storefront_shared::{Money, OrderId, ProductRef};
use tracing::warn;

use crate::lifecycle::{LifecycleError, OrderStatus};

/// A purchased line, priced at the moment the order was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price_snapshot: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price_snapshot.times(self.quantity)
    }
}

impl From<OrderLineRecord> for OrderLine {
    fn from(record: OrderLineRecord) -> Self {
        Self {
            product: record.product,
            quantity: record.quantity,
            unit_price_snapshot: record.unit_price,
        }
    }
}

impl From<&OrderLine> for OrderLineRecord {
    fn from(line: &OrderLine) -> Self {
        Self {
            product: line.product.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price_snapshot,
        }
    }
}

/// A created order.
///
/// Fields are read-only from outside the crate: the total is the snapshot
/// taken at creation and the status only moves through the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    lines: Vec<OrderLine>,
    total_price: Money,
    payment_method: PaymentMethod,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Order the store just accepted; status starts at `Pending`
    pub(crate) fn placed(id: OrderId, lines: Vec<OrderLine>, total_price: Money) -> Self {
        Self {
            id,
            lines,
            total_price,
            payment_method: PaymentMethod::Unassigned,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Build from what the store reports. The reported total is kept as is.
    pub fn from_record(record: OrderRecord) -> Self {
        let payment_method = match record.payment_method.as_deref() {
            None => PaymentMethod::Unassigned,
            Some(raw) => PaymentMethod::from_wire(raw).unwrap_or_else(|| {
                warn!(order_id = %record.id, method = raw, "Unrecognised payment method");
                PaymentMethod::Unassigned
            }),
        };
        Self {
            id: record.id,
            lines: record.lines.into_iter().map(OrderLine::from).collect(),
            total_price: record.total_price,
            payment_method,
            status: OrderStatus::from(record.status),
            created_at: record.created_at,
        }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> &OrderStatus {
        &self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub(crate) fn assign_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    /// Record a client-issued cancellation (abandoned payment)
    pub(crate) fn mark_cancelled(&mut self) -> Result<(), LifecycleError> {
        self.status = self.status.transition(OrderStatus::Cancelled)?;
        Ok(())
    }
}
