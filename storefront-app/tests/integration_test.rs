use std::sync::Arc;
use std::time::Duration;
use storefront_app::StorefrontSession;
use storefront_core::mock::{GatewayCall, MockCartGateway, MockWalletGateway, RecordingOpener};
use storefront_core::{GatewayError, PaymentMethod, RemoteCartLine};
use storefront_order::{Abandonment, CheckoutError, OrderStatus, PaymentError, PaymentOutcome};
use storefront_shared::{Money, ProductRef, UserId};

struct World {
    gateway: Arc<MockCartGateway>,
    wallet: Arc<MockWalletGateway>,
    opener: Arc<RecordingOpener>,
    session: StorefrontSession,
}

fn user() -> UserId {
    UserId::new("user-1")
}

fn line(product: &str, quantity: u32, price: i64, stock: u32) -> RemoteCartLine {
    RemoteCartLine {
        product: ProductRef::new(product),
        quantity,
        unit_price: Money::new(price),
        stock_available: stock,
    }
}

async fn world(lines: Vec<RemoteCartLine>, wallet: MockWalletGateway) -> World {
    let gateway = Arc::new(MockCartGateway::new().with_cart(&user(), lines));
    let wallet = Arc::new(wallet);
    let opener = Arc::new(RecordingOpener::new());
    let session = StorefrontSession::new(
        user(),
        gateway.clone(),
        wallet.clone(),
        opener.clone(),
        Duration::from_millis(5),
    );
    session.cart().load().await.unwrap();
    World {
        gateway,
        wallet,
        opener,
        session,
    }
}

fn count(gateway: &MockCartGateway, pred: impl Fn(&GatewayCall) -> bool) -> usize {
    gateway.count_calls(pred)
}

#[tokio::test]
async fn test_cash_on_delivery_flow() {
    let w = world(
        vec![line("A", 2, 10, 5), line("B", 1, 30, 5)],
        MockWalletGateway::returning_url("https://wallet.test/pay"),
    )
    .await;
    w.session.cart().toggle_select(&ProductRef::new("A")).await;
    w.session.cart().toggle_select(&ProductRef::new("B")).await;

    let order = w.session.place_order().await.unwrap();
    assert_eq!(order.total_price(), Money::new(50));

    let mut attempt = w.session.begin_payment(order).await;
    assert!(w.session.cart().selection().await.is_empty());

    let receipt = w.session.payments().confirm_cash_on_delivery(&mut attempt).unwrap();
    assert_eq!(attempt.outcome(), PaymentOutcome::Confirmed);
    assert_eq!(receipt.method, PaymentMethod::CashOnDelivery);
    assert_eq!(receipt.amount, Money::new(50));
    assert!(w.wallet.requests().is_empty());
    assert!(w.opener.opened().is_empty());
}

#[tokio::test]
async fn test_out_of_stock_produces_no_order() {
    let w = world(vec![line("C", 1, 20, 0)], MockWalletGateway::returning_no_url()).await;
    w.session.cart().toggle_select(&ProductRef::new("C")).await;

    let err = w.session.place_order().await.unwrap_err();
    assert_eq!(err, CheckoutError::OutOfStock(vec![ProductRef::new("C")]));
    assert_eq!(count(&w.gateway, |c| matches!(c, GatewayCall::CreateOrder(_))), 0);
    // Selection survives so the user can adjust it
    assert_eq!(w.session.cart().selection().await.len(), 1);
}

#[tokio::test]
async fn test_wallet_flow_then_history() {
    let w = world(
        vec![line("A", 1, 120000, 3)],
        MockWalletGateway::returning_url("https://wallet.test/pay/abc"),
    )
    .await;
    w.session.cart().select_all().await;

    let order = w.session.place_order().await.unwrap();
    let order_id = order.id().clone();
    let mut attempt = w.session.begin_payment(order).await;
    let receipt = w.session.payments().pay_with_wallet(&mut attempt).await.unwrap();

    assert_eq!(receipt.redirect_url.as_deref(), Some("https://wallet.test/pay/abc"));
    assert_eq!(w.opener.opened().len(), 1);
    assert_eq!(w.wallet.requests()[0].order_info, format!("Payment for order #{}", order_id));

    let history = w.session.history().list(w.session.user()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), &order_id);
    assert_eq!(history[0].total_price(), Money::new(120000));
    assert_eq!(history[0].status(), &OrderStatus::Pending);
}

#[tokio::test]
async fn test_missing_wallet_link_falls_back_to_cash() {
    let w = world(vec![line("A", 1, 10, 3)], MockWalletGateway::returning_no_url()).await;
    w.session.cart().select_all().await;
    let order = w.session.place_order().await.unwrap();
    let mut attempt = w.session.begin_payment(order).await;

    let err = w.session.payments().pay_with_wallet(&mut attempt).await.unwrap_err();
    assert!(matches!(err, PaymentError::PaymentLinkUnavailable { .. }));
    assert_eq!(count(&w.gateway, |c| matches!(c, GatewayCall::CancelOrder(_))), 0);

    w.session.payments().confirm_cash_on_delivery(&mut attempt).unwrap();
    assert_eq!(attempt.method(), Some(PaymentMethod::CashOnDelivery));
}

#[tokio::test]
async fn test_abandoned_payment_cancels_order_once() {
    let w = world(vec![line("A", 1, 10, 3)], MockWalletGateway::returning_no_url()).await;
    w.session.cart().select_all().await;
    let order = w.session.place_order().await.unwrap();
    let order_id = order.id().clone();
    let mut attempt = w.session.begin_payment(order).await;

    assert_eq!(w.session.payments().abandon(&mut attempt).await.unwrap(), Abandonment::Cancelled);
    assert_eq!(
        w.session.payments().abandon(&mut attempt).await.unwrap(),
        Abandonment::AlreadyAbandoned
    );
    assert_eq!(count(&w.gateway, |c| matches!(c, GatewayCall::CancelOrder(_))), 1);

    let refreshed = w.session.history().refresh(attempt.order()).await.unwrap();
    assert_eq!(refreshed.id(), &order_id);
    assert_eq!(refreshed.status(), &OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_remove_selected_then_reload() {
    let w = world(
        vec![line("A", 1, 10, 3), line("B", 1, 10, 3), line("C", 1, 10, 3)],
        MockWalletGateway::returning_no_url(),
    )
    .await;
    w.gateway.fail_remove_for(&ProductRef::new("B"));
    w.session.cart().select_all().await;

    let err = w.session.cart().remove_selected().await.unwrap_err();
    assert_eq!(err.remaining_lines(), vec![ProductRef::new("B")]);

    w.session.cart().load().await.unwrap();
    let products: Vec<ProductRef> = w
        .session
        .cart()
        .lines()
        .await
        .into_iter()
        .map(|l| l.product)
        .collect();
    assert_eq!(products, vec![ProductRef::new("B")]);
}

#[tokio::test]
async fn test_offline_checkout_is_retryable() {
    let w = world(vec![line("A", 1, 10, 3)], MockWalletGateway::returning_no_url()).await;
    w.session.cart().select_all().await;
    w.gateway.set_network_down(true);

    let err = w.session.place_order().await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::OrderCreationFailed(GatewayError::NetworkUnavailable(_))
    ));
    assert!(err.is_retryable());
    assert_eq!(count(&w.gateway, |c| matches!(c, GatewayCall::CreateOrder(_))), 1);
}
