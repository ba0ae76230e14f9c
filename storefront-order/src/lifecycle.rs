use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Order status in the lifecycle. The server owns it; the client reads it.
///
/// `Pending → Processing → Shipped → Completed`, and `Cancelled` from any
/// non-terminal status. Anything else the server sends is kept verbatim as
/// `Unknown` and displayed with the fallback badge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
    Unknown(String),
}

/// Stages of the progress bar on the order detail view
pub const PROGRESS_STAGES: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Completed,
];

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OrderStatus::Unknown(_))
    }

    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Processing) | (Processing, Shipped) | (Shipped, Completed) => true,
            (Pending | Processing | Shipped, Cancelled) => true,
            _ => false,
        }
    }

    /// Checked transition for the few changes the client itself drives
    pub fn transition(&self, next: OrderStatus) -> Result<OrderStatus, LifecycleError> {
        if !self.can_transition_to(&next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }

    /// Position in the four-stage progress bar; `None` when off the happy path
    pub fn progress_stage(&self) -> Option<usize> {
        PROGRESS_STAGES.iter().position(|s| s == self)
    }

    pub fn badge(&self) -> StatusBadge {
        match self {
            OrderStatus::Pending => StatusBadge::new("Not processed", BadgeTone::InProgress),
            OrderStatus::Processing => StatusBadge::new("Processing", BadgeTone::InProgress),
            OrderStatus::Shipped => StatusBadge::new("Delivered", BadgeTone::Success),
            OrderStatus::Completed => StatusBadge::new("Completed", BadgeTone::Success),
            OrderStatus::Cancelled => StatusBadge::new("Cancelled", BadgeTone::Fallback),
            OrderStatus::Unknown(_) => StatusBadge::new("Unknown", BadgeTone::Fallback),
        }
    }
}

/// Log how a refreshed status relates to the one shown before.
///
/// The server's value always wins; an illegal jump is only worth a warning.
pub fn observe_transition(previous: &OrderStatus, observed: &OrderStatus) {
    if previous == observed {
        return;
    }
    if !observed.is_known() {
        debug!(from = %previous, to = %observed, "Order moved to an unrecognised status");
    } else if previous.can_transition_to(observed) {
        info!(from = %previous, to = %observed, "Order status advanced");
    } else {
        warn!(from = %previous, to = %observed, "Server reported an out-of-order status change");
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "completed" => OrderStatus::Completed,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            _ => OrderStatus::Unknown(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Unknown(raw) => raw,
            known => known.to_string(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => f.write_str("Pending"),
            OrderStatus::Processing => f.write_str("Processing"),
            OrderStatus::Shipped => f.write_str("Shipped"),
            OrderStatus::Completed => f.write_str("Completed"),
            OrderStatus::Cancelled => f.write_str("Cancelled"),
            OrderStatus::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    InProgress,
    Success,
    /// Cancelled and anything unrecognised
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

impl StatusBadge {
    const fn new(label: &'static str, tone: BadgeTone) -> Self {
        Self { label, tone }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
