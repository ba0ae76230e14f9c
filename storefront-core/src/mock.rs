//! In-memory stand-ins for the remote services.
//!
//! They behave like the real store (404 for a missing cart, ids assigned on
//! order creation) and record every call so tests can assert on exactly
//! which requests went out. Failures are injected per operation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use storefront_shared::{OrderId, ProductRef, UserId};
use tokio::sync::oneshot;

use crate::gateway::{CartGateway, NewOrder, OrderRecord, RemoteCart, RemoteCartLine};
use crate::payment::{PaymentLink, PaymentLinkProvider, PaymentLinkRequest, RedirectOpener};
use crate::{GatewayError, GatewayResult};

/// A request the mock gateway received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    FetchCart(UserId),
    AddToCart { product: ProductRef, quantity: u32 },
    UpdateQuantity { product: ProductRef, quantity: u32 },
    RemoveLine(ProductRef),
    CreateOrder(NewOrder),
    CancelOrder(OrderId),
    FetchOrder(OrderId),
    ListOrders(UserId),
}

#[derive(Default)]
struct Failures {
    network_down: bool,
    update: HashSet<ProductRef>,
    remove: HashSet<ProductRef>,
    create_order: bool,
    cancel_order: bool,
}

struct StoredOrder {
    owner: UserId,
    record: OrderRecord,
}

#[derive(Default)]
struct MockState {
    catalog: HashMap<ProductRef, RemoteCartLine>,
    carts: HashMap<UserId, Vec<RemoteCartLine>>,
    orders: Vec<StoredOrder>,
    calls: Vec<GatewayCall>,
    failures: Failures,
    update_gates: HashMap<ProductRef, VecDeque<oneshot::Receiver<()>>>,
    fetch_gates: VecDeque<oneshot::Receiver<()>>,
}

#[derive(Default)]
pub struct MockCartGateway {
    state: Mutex<MockState>,
}

impl MockCartGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a remote cart for `user`
    pub fn with_cart(self, user: &UserId, lines: Vec<RemoteCartLine>) -> Self {
        self.state().carts.insert(user.clone(), lines);
        self
    }

    /// Make a product available to `add_to_cart`; `quantity` is ignored
    pub fn with_product(self, template: RemoteCartLine) -> Self {
        self.state().catalog.insert(template.product.clone(), template);
        self
    }

    /// Seed an existing order owned by `user`, as if placed earlier
    pub fn with_order(self, user: &UserId, order: OrderRecord) -> Self {
        self.state().orders.push(StoredOrder {
            owner: user.clone(),
            record: order,
        });
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Lines currently held by the remote cart, `None` if the user has no cart
    pub fn remote_lines(&self, user: &UserId) -> Option<Vec<RemoteCartLine>> {
        self.state().carts.get(user).cloned()
    }

    /// Change a remote line behind the client's back (e.g. price update)
    pub fn set_remote_line(&self, user: &UserId, line: RemoteCartLine) {
        let mut state = self.state();
        let lines = state.carts.entry(user.clone()).or_default();
        match lines.iter_mut().find(|l| l.product == line.product) {
            Some(existing) => *existing = line,
            None => lines.push(line),
        }
    }

    pub fn order(&self, order_id: &OrderId) -> Option<OrderRecord> {
        self.state()
            .orders
            .iter()
            .find(|o| &o.record.id == order_id)
            .map(|o| o.record.clone())
    }

    pub fn set_network_down(&self, down: bool) {
        self.state().failures.network_down = down;
    }

    pub fn fail_update_for(&self, product: &ProductRef) {
        self.state().failures.update.insert(product.clone());
    }

    pub fn fail_remove_for(&self, product: &ProductRef) {
        self.state().failures.remove.insert(product.clone());
    }

    pub fn fail_create_order(&self, fail: bool) {
        self.state().failures.create_order = fail;
    }

    pub fn fail_cancel_order(&self, fail: bool) {
        self.state().failures.cancel_order = fail;
    }

    /// Hold the next quantity update for `product` until the returned sender
    /// fires (or is dropped). Lets tests reorder responses.
    pub fn gate_next_update(&self, product: &ProductRef) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state()
            .update_gates
            .entry(product.clone())
            .or_default()
            .push_back(rx);
        tx
    }

    /// Hold the next cart fetch after it has taken its snapshot, until the
    /// returned sender fires (or is dropped)
    pub fn gate_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state().fetch_gates.push_back(rx);
        tx
    }

    fn record(&self, call: GatewayCall) -> GatewayResult<()> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failures.network_down {
            return Err(GatewayError::NetworkUnavailable("mock network is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CartGateway for MockCartGateway {
    async fn fetch_cart(&self, user: &UserId) -> GatewayResult<RemoteCart> {
        self.record(GatewayCall::FetchCart(user.clone()))?;
        let (snapshot, gate) = {
            let mut state = self.state();
            let snapshot = state
                .carts
                .get(user)
                .map(|lines| RemoteCart { lines: lines.clone() })
                .ok_or_else(|| GatewayError::NotFound(format!("cart for user {}", user)));
            (snapshot, state.fetch_gates.pop_front())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        snapshot
    }

    async fn add_to_cart(&self, user: &UserId, product: &ProductRef, quantity: u32) -> GatewayResult<()> {
        self.record(GatewayCall::AddToCart {
            product: product.clone(),
            quantity,
        })?;
        let mut state = self.state();
        let template = state.catalog.get(product).cloned();
        let lines = state.carts.entry(user.clone()).or_default();
        if let Some(line) = lines.iter_mut().find(|l| &l.product == product) {
            line.quantity += quantity;
            return Ok(());
        }
        let mut line = template.ok_or_else(|| GatewayError::NotFound(format!("product {}", product)))?;
        line.quantity = quantity;
        lines.push(line);
        Ok(())
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        product: &ProductRef,
        quantity: u32,
    ) -> GatewayResult<u32> {
        self.record(GatewayCall::UpdateQuantity {
            product: product.clone(),
            quantity,
        })?;

        let gate = self
            .state()
            .update_gates
            .get_mut(product)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            // A dropped sender releases the request as well
            let _ = gate.await;
        }

        let mut state = self.state();
        if state.failures.update.contains(product) {
            return Err(GatewayError::Rejected {
                status: 500,
                message: format!("update of {} failed", product),
            });
        }
        let line = state
            .carts
            .get_mut(user)
            .and_then(|lines| lines.iter_mut().find(|l| &l.product == product))
            .ok_or_else(|| GatewayError::NotFound(format!("cart line {}", product)))?;
        line.quantity = quantity;
        Ok(quantity)
    }

    async fn remove_line(&self, user: &UserId, product: &ProductRef) -> GatewayResult<()> {
        self.record(GatewayCall::RemoveLine(product.clone()))?;
        let mut state = self.state();
        if state.failures.remove.contains(product) {
            return Err(GatewayError::Rejected {
                status: 500,
                message: format!("delete of {} failed", product),
            });
        }
        if let Some(lines) = state.carts.get_mut(user) {
            lines.retain(|l| &l.product != product);
        }
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder) -> GatewayResult<OrderId> {
        self.record(GatewayCall::CreateOrder(order.clone()))?;
        let mut state = self.state();
        if state.failures.create_order {
            return Err(GatewayError::Rejected {
                status: 500,
                message: "order creation failed".to_string(),
            });
        }
        let id = OrderId::new(format!("order-{}", state.orders.len() + 1));
        state.orders.push(StoredOrder {
            owner: order.user.clone(),
            record: OrderRecord {
                id: id.clone(),
                status: "Pending".to_string(),
                lines: order.lines.clone(),
                total_price: order.total_price,
                payment_method: Some(order.payment_method.as_wire_str().to_string()),
                created_at: Utc::now(),
            },
        });
        Ok(id)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> GatewayResult<()> {
        self.record(GatewayCall::CancelOrder(order_id.clone()))?;
        let mut state = self.state();
        if state.failures.cancel_order {
            return Err(GatewayError::Rejected {
                status: 500,
                message: format!("cancel of {} failed", order_id),
            });
        }
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.record.id == order_id)
            .ok_or_else(|| GatewayError::NotFound(format!("order {}", order_id)))?;
        order.record.status = "Cancelled".to_string();
        Ok(())
    }

    async fn fetch_order(&self, order_id: &OrderId) -> GatewayResult<OrderRecord> {
        self.record(GatewayCall::FetchOrder(order_id.clone()))?;
        self.order(order_id)
            .ok_or_else(|| GatewayError::NotFound(format!("order {}", order_id)))
    }

    async fn list_orders(&self, user: &UserId) -> GatewayResult<Vec<OrderRecord>> {
        self.record(GatewayCall::ListOrders(user.clone()))?;
        Ok(self
            .state()
            .orders
            .iter()
            .filter(|o| &o.owner == user)
            .map(|o| o.record.clone())
            .collect())
    }
}

enum WalletBehaviour {
    Url(String),
    NoUrl,
    Fail(GatewayError),
}

/// Wallet gateway double; answers every request the same way
pub struct MockWalletGateway {
    behaviour: WalletBehaviour,
    requests: Mutex<Vec<PaymentLinkRequest>>,
}

impl MockWalletGateway {
    pub fn returning_url(url: impl Into<String>) -> Self {
        Self::with_behaviour(WalletBehaviour::Url(url.into()))
    }

    /// Gateway answers but without a redirect URL
    pub fn returning_no_url() -> Self {
        Self::with_behaviour(WalletBehaviour::NoUrl)
    }

    pub fn failing(error: GatewayError) -> Self {
        Self::with_behaviour(WalletBehaviour::Fail(error))
    }

    fn with_behaviour(behaviour: WalletBehaviour) -> Self {
        Self {
            behaviour,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PaymentLinkRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentLinkProvider for MockWalletGateway {
    async fn request_payment_link(&self, request: &PaymentLinkRequest) -> GatewayResult<PaymentLink> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        match &self.behaviour {
            WalletBehaviour::Url(url) => Ok(PaymentLink {
                redirect_url: Some(url.clone()),
            }),
            WalletBehaviour::NoUrl => Ok(PaymentLink { redirect_url: None }),
            WalletBehaviour::Fail(error) => Err(error.clone()),
        }
    }
}

/// Remembers every URL it was asked to open
#[derive(Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RedirectOpener for RecordingOpener {
    async fn open(&self, url: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(url, "Opening payment redirect (recorded)");
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_shared::Money;

    fn line(product: &str, quantity: u32) -> RemoteCartLine {
        RemoteCartLine {
            product: ProductRef::new(product),
            quantity,
            unit_price: Money::new(10),
            stock_available: 5,
        }
    }

    #[tokio::test]
    async fn test_missing_cart_is_not_found() {
        let gateway = MockCartGateway::new();
        let result = gateway.fetch_cart(&UserId::new("u1")).await;
        assert!(matches!(result, Err(GatewayError::NotFound(_))));
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_remove_touch_remote_cart() {
        let user = UserId::new("u1");
        let gateway = MockCartGateway::new().with_cart(&user, vec![line("a", 1), line("b", 2)]);

        let stored = gateway.update_quantity(&user, &ProductRef::new("a"), 4).await.unwrap();
        assert_eq!(stored, 4);
        gateway.remove_line(&user, &ProductRef::new("b")).await.unwrap();

        let remote = gateway.remote_lines(&user).unwrap();
        assert_eq!(remote, vec![line("a", 4)]);
    }

    #[tokio::test]
    async fn test_list_orders_only_returns_the_users_orders() {
        let gateway = MockCartGateway::new();
        for owner in ["u1", "u2", "u1"] {
            let order = NewOrder {
                user: UserId::new(owner),
                lines: Vec::new(),
                total_price: Money::new(10),
                payment_method: crate::PaymentMethod::Unassigned,
            };
            gateway.create_order(&order).await.unwrap();
        }

        let ids: Vec<String> = gateway
            .list_orders(&UserId::new("u1"))
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id.to_string())
            .collect();
        assert_eq!(ids, vec!["order-1", "order-3"]);
        assert!(gateway.list_orders(&UserId::new("u3")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_down_still_records_call() {
        let user = UserId::new("u1");
        let gateway = MockCartGateway::new().with_cart(&user, vec![line("a", 1)]);
        gateway.set_network_down(true);

        let result = gateway.fetch_cart(&user).await;
        assert!(matches!(result, Err(GatewayError::NetworkUnavailable(_))));
        assert_eq!(gateway.count_calls(|c| matches!(c, GatewayCall::FetchCart(_))), 1);
    }
}
