use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{CartGateway, GatewayError, PaymentLinkProvider, PaymentLinkRequest, PaymentMethod, RedirectOpener};
use storefront_shared::{Money, OrderId};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::Order;

/// Client-side outcome of a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Pending,
    Confirmed,
    Abandoned,
}

impl PaymentOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentOutcome::Pending)
    }

    pub fn can_transition_to(self, next: PaymentOutcome) -> bool {
        matches!(
            (self, next),
            (PaymentOutcome::Pending, PaymentOutcome::Confirmed) | (PaymentOutcome::Pending, PaymentOutcome::Abandoned)
        )
    }
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentOutcome::Pending => "PENDING",
            PaymentOutcome::Confirmed => "CONFIRMED",
            PaymentOutcome::Abandoned => "ABANDONED",
        };
        f.write_str(name)
    }
}

/// One visit to the payment screen for a created order. Lives only as long
/// as that screen; nothing here is persisted.
#[derive(Debug)]
pub struct PaymentAttempt {
    id: Uuid,
    order: Order,
    method: Option<PaymentMethod>,
    outcome: PaymentOutcome,
}

impl PaymentAttempt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    /// Channel that settled the attempt, if any
    pub fn method(&self) -> Option<PaymentMethod> {
        self.method
    }

    pub fn outcome(&self) -> PaymentOutcome {
        self.outcome
    }

    /// Prompt text shown before the user confirms a channel
    pub fn summary(&self, method: PaymentMethod) -> String {
        let total = self.order.total_price();
        let id = self.order.id();
        match method {
            PaymentMethod::CashOnDelivery => {
                format!("Order #{} will be paid {} in cash on delivery.", id, total)
            }
            PaymentMethod::ExternalWallet => {
                format!("Redirecting to the e-wallet to pay {} for order #{}.", total, id)
            }
            PaymentMethod::Unassigned => format!("Order #{} total: {}", id, total),
        }
    }

    fn transition(&mut self, next: PaymentOutcome) -> Result<(), PaymentError> {
        if !self.outcome.can_transition_to(next) {
            warn!(attempt_id = %self.id, from = %self.outcome, to = %next, "Rejected payment transition");
            return Err(PaymentError::InvalidTransition {
                from: self.outcome,
                to: next,
            });
        }
        self.outcome = next;
        Ok(())
    }

    fn ensure_pending(&self, next: PaymentOutcome) -> Result<(), PaymentError> {
        if self.outcome.can_transition_to(next) {
            Ok(())
        } else {
            Err(PaymentError::InvalidTransition {
                from: self.outcome,
                to: next,
            })
        }
    }
}

/// Shown to the user once an attempt is confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
    pub redirect_url: Option<String>,
}

impl PaymentReceipt {
    pub fn message(&self) -> &'static str {
        match self.method {
            PaymentMethod::CashOnDelivery => "Order placed. Please have cash ready on delivery.",
            _ => "Payment complete. Thank you for paying with the e-wallet!",
        }
    }
}

/// Result of leaving the payment screen without confirming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abandonment {
    /// The cancellation request went through
    Cancelled,
    /// The single cancellation request failed; the store may expire the order
    CancellationFailed { error: GatewayError },
    /// Already abandoned earlier; nothing was sent this time
    AlreadyAbandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("No usable payment link for order {order_id}; choose another payment method")]
    PaymentLinkUnavailable { order_id: OrderId },

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Could not open payment redirect: {0}")]
    RedirectFailed(String),

    #[error("Invalid payment transition from {from} to {to}")]
    InvalidTransition { from: PaymentOutcome, to: PaymentOutcome },
}

/// Drives a created order to a client-observable payment outcome
pub struct PaymentDispatcher {
    gateway: Arc<dyn CartGateway>,
    wallet: Arc<dyn PaymentLinkProvider>,
    opener: Arc<dyn RedirectOpener>,
    settlement_delay: Duration,
}

impl PaymentDispatcher {
    pub fn new(
        gateway: Arc<dyn CartGateway>,
        wallet: Arc<dyn PaymentLinkProvider>,
        opener: Arc<dyn RedirectOpener>,
        settlement_delay: Duration,
    ) -> Self {
        Self {
            gateway,
            wallet,
            opener,
            settlement_delay,
        }
    }

    /// Start paying for an order. Taking an `Order` means creation has
    /// already completed, so an abandon can never overlap it.
    pub fn begin(&self, order: Order) -> PaymentAttempt {
        let attempt = PaymentAttempt {
            id: Uuid::new_v4(),
            order,
            method: None,
            outcome: PaymentOutcome::Pending,
        };
        info!(attempt_id = %attempt.id, order_id = %attempt.order.id(), "Payment attempt started");
        attempt
    }

    /// Cash on delivery: the user confirmed the summary. No remote call.
    pub fn confirm_cash_on_delivery(&self, attempt: &mut PaymentAttempt) -> Result<PaymentReceipt, PaymentError> {
        attempt.transition(PaymentOutcome::Confirmed)?;
        attempt.method = Some(PaymentMethod::CashOnDelivery);
        attempt.order.assign_payment_method(PaymentMethod::CashOnDelivery);
        info!(attempt_id = %attempt.id, order_id = %attempt.order.id(), "Cash on delivery confirmed");

        Ok(PaymentReceipt {
            order_id: attempt.order.id().clone(),
            method: PaymentMethod::CashOnDelivery,
            amount: attempt.order.total_price(),
            redirect_url: None,
        })
    }

    /// External wallet: fetch a redirect, open it, wait out the settlement
    /// delay and confirm.
    ///
    /// Without a usable URL the attempt stays `Pending` and the order is not
    /// touched, so the user can still pick cash on delivery.
    pub async fn pay_with_wallet(&self, attempt: &mut PaymentAttempt) -> Result<PaymentReceipt, PaymentError> {
        attempt.ensure_pending(PaymentOutcome::Confirmed)?;

        let order_id = attempt.order.id().clone();
        let request = PaymentLinkRequest::for_order(order_id.clone(), attempt.order.total_price());
        let link = self.wallet.request_payment_link(&request).await.map_err(|e| {
            warn!(attempt_id = %attempt.id, order_id = %order_id, error = %e, "Payment link request failed");
            PaymentError::from(e)
        })?;

        let url = match link.redirect_url.as_deref().and_then(usable_redirect) {
            Some(url) => url,
            None => {
                warn!(attempt_id = %attempt.id, order_id = %order_id, "Wallet returned no usable redirect URL");
                return Err(PaymentError::PaymentLinkUnavailable { order_id });
            }
        };

        self.opener
            .open(&url)
            .await
            .map_err(|e| PaymentError::RedirectFailed(e.to_string()))?;

        // Pacing only: the wallet reports the real result out of band
        tokio::time::sleep(self.settlement_delay).await;

        attempt.transition(PaymentOutcome::Confirmed)?;
        attempt.method = Some(PaymentMethod::ExternalWallet);
        attempt.order.assign_payment_method(PaymentMethod::ExternalWallet);
        info!(attempt_id = %attempt.id, order_id = %order_id, "Wallet payment confirmed");

        Ok(PaymentReceipt {
            order_id,
            method: PaymentMethod::ExternalWallet,
            amount: attempt.order.total_price(),
            redirect_url: Some(url),
        })
    }

    /// The user is leaving the payment screen before confirming.
    ///
    /// Sends exactly one cancellation for the order: the attempt becomes
    /// `Abandoned` before the request goes out, and later calls send nothing.
    pub async fn abandon(&self, attempt: &mut PaymentAttempt) -> Result<Abandonment, PaymentError> {
        if attempt.outcome == PaymentOutcome::Abandoned {
            return Ok(Abandonment::AlreadyAbandoned);
        }
        attempt.transition(PaymentOutcome::Abandoned)?;

        let order_id = attempt.order.id().clone();
        match self.gateway.cancel_order(&order_id).await {
            Ok(()) => {
                if let Err(e) = attempt.order.mark_cancelled() {
                    warn!(order_id = %order_id, error = %e, "Cancelled remotely but local status disagrees");
                }
                info!(attempt_id = %attempt.id, order_id = %order_id, "Order cancelled after abandoned payment");
                Ok(Abandonment::Cancelled)
            }
            Err(error) => {
                warn!(attempt_id = %attempt.id, order_id = %order_id, error = %error, "Best-effort order cancellation failed");
                Ok(Abandonment::CancellationFailed { error })
            }
        }
    }
}

/// The trimmed URL, if it is an absolute http(s) URL with a host
fn usable_redirect(raw: &str) -> Option<String> {
    let url = raw.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    Some(url.to_string())
}
