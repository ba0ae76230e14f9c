use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use storefront_shared::{Money, OrderId};

use crate::GatewayResult;

/// How an order gets paid. `Unassigned` is what checkout sends; the
/// payment step picks one of the two real channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Unassigned,
    CashOnDelivery,
    ExternalWallet,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Unassigned => "unassigned",
            PaymentMethod::CashOnDelivery => "cash on delivery",
            PaymentMethod::ExternalWallet => "e-wallet",
        };
        f.write_str(label)
    }
}

impl PaymentMethod {
    /// Name used on the wire
    pub fn as_wire_str(self) -> &'static str {
        match self {
            PaymentMethod::Unassigned => "UNASSIGNED",
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentMethod::ExternalWallet => "EXTERNAL_WALLET",
        }
    }

    /// Parse a stored method name; also accepts the legacy `cod` / `momo` values
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UNASSIGNED" | "" => Some(PaymentMethod::Unassigned),
            "CASH_ON_DELIVERY" | "COD" => Some(PaymentMethod::CashOnDelivery),
            "EXTERNAL_WALLET" | "MOMO" => Some(PaymentMethod::ExternalWallet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLinkRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub order_info: String,
}

impl PaymentLinkRequest {
    pub fn for_order(order_id: OrderId, amount: Money) -> Self {
        let order_info = format!("Payment for order #{}", order_id);
        Self {
            order_id,
            amount,
            order_info,
        }
    }
}

/// Wallet gateway answer. The gateway may answer 200 without a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub redirect_url: Option<String>,
}

/// External wallet provider (e.g. MoMo) that hands out payment redirects
#[async_trait]
pub trait PaymentLinkProvider: Send + Sync {
    async fn request_payment_link(&self, request: &PaymentLinkRequest) -> GatewayResult<PaymentLink>;
}

/// Opens a redirect URL outside the app (browser, wallet app)
#[async_trait]
pub trait RedirectOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
