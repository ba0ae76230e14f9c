use std::sync::Arc;
use std::time::Duration;
use storefront_cart::CartStore;
use storefront_core::{CartGateway, PaymentLinkProvider, RedirectOpener};
use storefront_order::{CheckoutError, CheckoutOrchestrator, Order, OrderHistory, PaymentAttempt, PaymentDispatcher};
use storefront_shared::UserId;
use storefront_store::{Config, ConsoleRedirectOpener, HttpCartGateway, HttpWalletGateway};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Everything one signed-in user works with, wired explicitly.
///
/// Screens get the pieces they need from here instead of reaching for
/// shared global state.
pub struct StorefrontSession {
    cart: CartStore,
    checkout: CheckoutOrchestrator,
    payments: PaymentDispatcher,
    history: OrderHistory,
}

impl StorefrontSession {
    pub fn new(
        user: UserId,
        gateway: Arc<dyn CartGateway>,
        wallet: Arc<dyn PaymentLinkProvider>,
        opener: Arc<dyn RedirectOpener>,
        settlement_delay: Duration,
    ) -> Self {
        Self {
            cart: CartStore::new(user, gateway.clone()),
            checkout: CheckoutOrchestrator::new(gateway.clone()),
            payments: PaymentDispatcher::new(gateway.clone(), wallet, opener, settlement_delay),
            history: OrderHistory::new(gateway),
        }
    }

    /// Session backed by the HTTP services named in `config`
    pub fn from_config(config: &Config) -> Self {
        let gateway = Arc::new(HttpCartGateway::new(
            config.api.base_url.clone(),
            config.api.api_token.clone(),
        ));
        let wallet = Arc::new(HttpWalletGateway::new(config.payment.gateway_url.clone()));
        Self::new(
            config.session.user_id.clone(),
            gateway,
            wallet,
            Arc::new(ConsoleRedirectOpener),
            config.payment.settlement_delay(),
        )
    }

    pub fn user(&self) -> &UserId {
        self.cart.user()
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.checkout
    }

    pub fn payments(&self) -> &PaymentDispatcher {
        &self.payments
    }

    pub fn history(&self) -> &OrderHistory {
        &self.history
    }

    /// Create an order from the current selection
    pub async fn place_order(&self) -> Result<Order, CheckoutError> {
        self.checkout.checkout(&self.cart).await
    }

    /// Hand a created order to the payment step. The selection is cleared
    /// only now that the user has reached it.
    pub async fn begin_payment(&self, order: Order) -> PaymentAttempt {
        let attempt = self.payments.begin(order);
        self.cart.select_none().await;
        attempt
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
