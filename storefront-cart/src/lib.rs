pub mod line;
pub mod selection;
pub mod store;

pub use line::CartLine;
pub use selection::Selection;
pub use store::{CartStore, QuantitySync};

use storefront_core::GatewayError;
use storefront_shared::ProductRef;

/// A cart line the remote store refused to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelete {
    pub product: ProductRef,
    pub error: GatewayError,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Cart line not found: {0}")]
    LineNotFound(ProductRef),

    #[error("Cart service error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("None of the {} selected line(s) could be deleted", .failed.len())]
    DeleteFailed { failed: Vec<FailedDelete> },

    #[error("Removed {} line(s), {} still in cart after failed delete", .removed.len(), .failed.len())]
    PartialDeleteFailure {
        removed: Vec<ProductRef>,
        failed: Vec<FailedDelete>,
    },
}

impl CartError {
    /// Lines the caller still has in the cart after a failed bulk delete
    pub fn remaining_lines(&self) -> Vec<ProductRef> {
        match self {
            CartError::DeleteFailed { failed } | CartError::PartialDeleteFailure { failed, .. } => {
                failed.iter().map(|f| f.product.clone()).collect()
            }
            _ => Vec::new(),
        }
    }
}
