pub mod gateway;
pub mod payment;
pub mod mock;

pub use gateway::{
    CartGateway, NewOrder, OrderLineRecord, OrderRecord, RemoteCart, RemoteCartLine,
};
pub use payment::{PaymentLink, PaymentLinkProvider, PaymentLinkRequest, PaymentMethod, RedirectOpener};

/// Failure talking to the remote storefront services
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Whether showing "try again" to the user makes sense
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::NetworkUnavailable(_) => true,
            GatewayError::Rejected { status, .. } => *status >= 500,
            GatewayError::NotFound(_) | GatewayError::MalformedResponse(_) => false,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
