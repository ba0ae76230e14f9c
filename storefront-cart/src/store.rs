use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use storefront_core::{CartGateway, GatewayError};
use storefront_shared::{Money, ProductRef, UserId};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::line::CartLine;
use crate::selection::Selection;
use crate::{CartError, FailedDelete};

/// What happened to the remote side of a quantity edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantitySync {
    /// Requested quantity was below 1; nothing changed, nothing sent
    Skipped,
    /// Server confirmed; its stored quantity is now the local value
    Applied { quantity: u32 },
    /// A newer edit (or a reload) happened while this request was in flight;
    /// the response was discarded
    Superseded,
    /// Remote update failed. The local value stays until the next `load()`.
    Unsynced { error: GatewayError },
}

#[derive(Debug, Default)]
struct CartState {
    lines: Vec<CartLine>,
    selection: Selection,
    /// Latest sequence issued per line; a response only applies if it matches
    latest_seq: HashMap<ProductRef, u64>,
    next_seq: u64,
}

impl CartState {
    fn line_mut(&mut self, product: &ProductRef) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| &l.product == product)
    }

    fn issue_seq(&mut self, product: &ProductRef) -> u64 {
        self.next_seq += 1;
        self.latest_seq.insert(product.clone(), self.next_seq);
        self.next_seq
    }

    fn is_latest(&self, product: &ProductRef, seq: u64) -> bool {
        self.latest_seq.get(product) == Some(&seq)
    }

    fn remove_line(&mut self, product: &ProductRef) {
        self.lines.retain(|l| &l.product != product);
        self.selection.remove(product);
        self.latest_seq.remove(product);
    }
}

/// Local view of one user's cart plus the checkbox selection.
///
/// Every method takes `&self`; the lock is never held across a remote call,
/// so edits to different lines can be in flight together.
pub struct CartStore {
    user: UserId,
    gateway: Arc<dyn CartGateway>,
    state: RwLock<CartState>,
}

impl CartStore {
    pub fn new(user: UserId, gateway: Arc<dyn CartGateway>) -> Self {
        Self {
            user,
            gateway,
            state: RwLock::new(CartState::default()),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Replace local lines with the remote cart. A missing remote cart is an
    /// empty cart; any other failure leaves local state as it was.
    ///
    /// Quantities edited while the fetch was in flight are newer than the
    /// snapshot and are kept.
    pub async fn load(&self) -> Result<(), CartError> {
        // Edits issued after this point are newer than the snapshot
        let watermark = self.state.read().await.next_seq;

        let mut lines: Vec<CartLine> = match self.gateway.fetch_cart(&self.user).await {
            Ok(cart) => {
                let mut lines: Vec<CartLine> = Vec::with_capacity(cart.lines.len());
                for remote in cart.lines {
                    if lines.iter().any(|l| l.product == remote.product) {
                        warn!(product = %remote.product, "Duplicate cart line from server, keeping first");
                        continue;
                    }
                    lines.push(remote.into());
                }
                lines
            }
            Err(GatewayError::NotFound(_)) => {
                debug!(user = %self.user, "No remote cart, treating as empty");
                Vec::new()
            }
            Err(e) => {
                warn!(user = %self.user, error = %e, "Cart fetch failed, keeping local state");
                return Err(e.into());
            }
        };

        let mut state = self.state.write().await;
        for line in &mut lines {
            let edited_since = state
                .latest_seq
                .get(&line.product)
                .is_some_and(|&seq| seq > watermark);
            if !edited_since {
                continue;
            }
            if let Some(local) = state.lines.iter().find(|l| l.product == line.product) {
                debug!(product = %line.product, local = local.quantity, remote = line.quantity,
                    "Keeping quantity edited during load");
                line.quantity = local.quantity;
            }
        }
        state.selection.retain(|r| lines.iter().any(|l| &l.product == r));
        // Confirmations for edits older than the snapshot are now stale
        state
            .latest_seq
            .retain(|product, seq| *seq > watermark && lines.iter().any(|l| &l.product == product));
        state.lines = lines;
        info!(user = %self.user, lines = state.lines.len(), "Cart loaded");
        Ok(())
    }

    /// Add one unit of a product, then refresh from the server
    pub async fn add_product(&self, product: &ProductRef) -> Result<(), CartError> {
        self.gateway.add_to_cart(&self.user, product, 1).await?;
        info!(user = %self.user, product = %product, "Product added to cart");
        self.load().await
    }

    /// Optimistically set a line's quantity, then sync it to the server.
    ///
    /// The local value changes before the request goes out and is never
    /// rolled back. A server response is applied only when no newer edit for
    /// the same line has been issued since.
    pub async fn set_quantity(&self, product: &ProductRef, new_quantity: u32) -> Result<QuantitySync, CartError> {
        if new_quantity < 1 {
            return Ok(QuantitySync::Skipped);
        }

        let seq = {
            let mut state = self.state.write().await;
            let line = state
                .line_mut(product)
                .ok_or_else(|| CartError::LineNotFound(product.clone()))?;
            line.quantity = new_quantity;
            state.issue_seq(product)
        };

        let response = self
            .gateway
            .update_quantity(&self.user, product, new_quantity)
            .await;

        let mut state = self.state.write().await;
        if !state.is_latest(product, seq) {
            debug!(product = %product, seq, "Discarding stale quantity confirmation");
            return Ok(QuantitySync::Superseded);
        }

        match response {
            Ok(stored) => {
                let quantity = stored.max(1);
                if let Some(line) = state.line_mut(product) {
                    line.quantity = quantity;
                }
                Ok(QuantitySync::Applied { quantity })
            }
            Err(error) => {
                warn!(product = %product, quantity = new_quantity, error = %error,
                    "Quantity update not saved remotely; will reconcile on next load");
                Ok(QuantitySync::Unsynced { error })
            }
        }
    }

    pub async fn increment(&self, product: &ProductRef) -> Result<QuantitySync, CartError> {
        let current = self.quantity_of(product).await?;
        self.set_quantity(product, current.saturating_add(1)).await
    }

    /// Decrementing a line at quantity 1 does nothing; removal is explicit
    pub async fn decrement(&self, product: &ProductRef) -> Result<QuantitySync, CartError> {
        let current = self.quantity_of(product).await?;
        if current <= 1 {
            return Ok(QuantitySync::Skipped);
        }
        self.set_quantity(product, current - 1).await
    }

    async fn quantity_of(&self, product: &ProductRef) -> Result<u32, CartError> {
        self.line(product)
            .await
            .map(|l| l.quantity)
            .ok_or_else(|| CartError::LineNotFound(product.clone()))
    }

    /// Flip a line's checkbox; unknown refs are ignored. Returns whether the
    /// line is selected afterwards.
    pub async fn toggle_select(&self, product: &ProductRef) -> bool {
        let mut state = self.state.write().await;
        if !state.lines.iter().any(|l| &l.product == product) {
            return false;
        }
        state.selection.toggle(product)
    }

    pub async fn select_all(&self) {
        let mut state = self.state.write().await;
        let refs: Vec<ProductRef> = state.lines.iter().map(|l| l.product.clone()).collect();
        for product in refs {
            state.selection.insert(product);
        }
    }

    pub async fn select_none(&self) {
        self.state.write().await.selection.clear();
    }

    /// Delete every selected line remotely, one request per line.
    ///
    /// Lines whose delete succeeded leave the cart and the selection; the
    /// others stay. A mixed result is `PartialDeleteFailure`, so the caller
    /// can tell which lines remain.
    pub async fn remove_selected(&self) -> Result<Vec<ProductRef>, CartError> {
        let targets: Vec<ProductRef> = self.state.read().await.selection.iter().cloned().collect();
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let results = join_all(
            targets
                .iter()
                .map(|product| self.gateway.remove_line(&self.user, product)),
        )
        .await;

        let mut removed = Vec::new();
        let mut failed = Vec::new();
        for (product, result) in targets.into_iter().zip(results) {
            match result {
                Ok(()) => removed.push(product),
                Err(error) => {
                    warn!(product = %product, error = %error, "Cart line delete failed");
                    failed.push(FailedDelete { product, error });
                }
            }
        }

        {
            let mut state = self.state.write().await;
            for product in &removed {
                state.remove_line(product);
            }
        }
        info!(user = %self.user, removed = removed.len(), failed = failed.len(), "Removed selected cart lines");

        match (removed.is_empty(), failed.is_empty()) {
            (_, true) => Ok(removed),
            (true, false) => Err(CartError::DeleteFailed { failed }),
            (false, false) => Err(CartError::PartialDeleteFailure { removed, failed }),
        }
    }

    pub async fn lines(&self) -> Vec<CartLine> {
        self.state.read().await.lines.clone()
    }

    pub async fn line(&self, product: &ProductRef) -> Option<CartLine> {
        self.state
            .read()
            .await
            .lines
            .iter()
            .find(|l| &l.product == product)
            .cloned()
    }

    pub async fn selection(&self) -> Selection {
        self.state.read().await.selection.clone()
    }

    /// Selected lines in cart order
    pub async fn selected_lines(&self) -> Vec<CartLine> {
        let state = self.state.read().await;
        state
            .lines
            .iter()
            .filter(|l| state.selection.contains(&l.product))
            .cloned()
            .collect()
    }

    /// Live total of the selected lines, for the cart footer
    pub async fn selected_total(&self) -> Money {
        self.selected_lines().await.iter().map(CartLine::line_total).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::mock::{GatewayCall, MockCartGateway};
    use storefront_core::RemoteCartLine;

    fn user() -> UserId {
        UserId::new("user-1")
    }

    fn remote(product: &str, quantity: u32, price: i64, stock: u32) -> RemoteCartLine {
        RemoteCartLine {
            product: ProductRef::new(product),
            quantity,
            unit_price: Money::new(price),
            stock_available: stock,
        }
    }

    async fn loaded_store(lines: Vec<RemoteCartLine>) -> (CartStore, Arc<MockCartGateway>) {
        let gateway = Arc::new(MockCartGateway::new().with_cart(&user(), lines));
        let store = CartStore::new(user(), gateway.clone());
        store.load().await.unwrap();
        (store, gateway)
    }

    async fn assert_selection_subset(store: &CartStore) {
        let lines = store.lines().await;
        for selected in store.selection().await.iter() {
            assert!(lines.iter().any(|l| &l.product == selected), "{} selected but not in cart", selected);
        }
    }

    #[tokio::test]
    async fn test_load_missing_cart_is_empty() {
        let gateway = Arc::new(MockCartGateway::new());
        let store = CartStore::new(user(), gateway);

        store.load().await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_state() {
        let (store, gateway) = loaded_store(vec![remote("a", 2, 10, 5)]).await;
        gateway.set_network_down(true);

        let result = store.load().await;
        assert!(matches!(result, Err(CartError::Gateway(GatewayError::NetworkUnavailable(_)))));
        assert_eq!(store.lines().await.len(), 1);
    }

    #[tokio::test]
    async fn test_load_prunes_selection_of_vanished_lines() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5), remote("b", 1, 30, 5)]).await;
        store.select_all().await;

        gateway.remove_line(&user(), &ProductRef::new("b")).await.unwrap();
        store.load().await.unwrap();

        let selection = store.selection().await;
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(&ProductRef::new("a")));
        assert_selection_subset(&store).await;
    }

    #[tokio::test]
    async fn test_set_quantity_below_one_is_noop() {
        let (store, gateway) = loaded_store(vec![remote("a", 2, 10, 5)]).await;

        let sync = store.set_quantity(&ProductRef::new("a"), 0).await.unwrap();
        assert_eq!(sync, QuantitySync::Skipped);
        assert_eq!(store.line(&ProductRef::new("a")).await.unwrap().quantity, 2);
        assert_eq!(gateway.count_calls(|c| matches!(c, GatewayCall::UpdateQuantity { .. })), 0);
    }

    #[tokio::test]
    async fn test_decrement_at_one_keeps_line() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;

        let sync = store.decrement(&ProductRef::new("a")).await.unwrap();
        assert_eq!(sync, QuantitySync::Skipped);
        assert_eq!(store.line(&ProductRef::new("a")).await.unwrap().quantity, 1);
        assert_eq!(gateway.calls().len(), 1); // only the initial fetch
    }

    #[tokio::test]
    async fn test_increment_syncs_remote() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;

        let sync = store.increment(&ProductRef::new("a")).await.unwrap();
        assert_eq!(sync, QuantitySync::Applied { quantity: 2 });
        assert_eq!(gateway.remote_lines(&user()).unwrap()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_optimistic_value() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;
        gateway.fail_update_for(&ProductRef::new("a"));

        let sync = store.set_quantity(&ProductRef::new("a"), 3).await.unwrap();
        assert!(matches!(sync, QuantitySync::Unsynced { .. }));
        assert_eq!(store.line(&ProductRef::new("a")).await.unwrap().quantity, 3);

        // Next load reconciles with the server
        store.load().await.unwrap();
        assert_eq!(store.line(&ProductRef::new("a")).await.unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_set_quantity_unknown_line() {
        let (store, _gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;

        let result = store.set_quantity(&ProductRef::new("zzz"), 2).await;
        assert_eq!(result, Err(CartError::LineNotFound(ProductRef::new("zzz"))));
    }

    #[tokio::test]
    async fn test_stale_confirmation_never_overwrites_newer_edit() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;
        let product = ProductRef::new("a");
        let first_gate = gateway.gate_next_update(&product);
        let second_gate = gateway.gate_next_update(&product);

        let (first, second, ()) = tokio::join!(
            store.set_quantity(&product, 2),
            store.set_quantity(&product, 3),
            async {
                // Newer response lands first, then the older one
                second_gate.send(()).ok();
                tokio::task::yield_now().await;
                first_gate.send(()).ok();
            }
        );

        assert_eq!(first.unwrap(), QuantitySync::Superseded);
        assert_eq!(second.unwrap(), QuantitySync::Applied { quantity: 3 });
        assert_eq!(store.line(&product).await.unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_load_keeps_edit_made_while_fetch_in_flight() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;
        let product = ProductRef::new("a");
        let fetch_gate = gateway.gate_next_fetch();

        let (loaded, sync) = tokio::join!(store.load(), async {
            // Let the fetch take its snapshot first
            tokio::task::yield_now().await;
            let sync = store.set_quantity(&product, 3).await;
            fetch_gate.send(()).ok();
            sync
        });

        loaded.unwrap();
        assert_eq!(sync.unwrap(), QuantitySync::Applied { quantity: 3 });
        assert_eq!(gateway.remote_lines(&user()).unwrap()[0].quantity, 3);
        assert_eq!(store.line(&product).await.unwrap().quantity, 3);

        // A later load with no newer edit simply adopts the server value
        store.load().await.unwrap();
        assert_eq!(store.line(&product).await.unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_confirmation_issued_before_load_is_superseded() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;
        let product = ProductRef::new("a");
        let update_gate = gateway.gate_next_update(&product);

        let (sync, loaded) = tokio::join!(store.set_quantity(&product, 4), async {
            let loaded = store.load().await;
            update_gate.send(()).ok();
            loaded
        });

        loaded.unwrap();
        assert_eq!(sync.unwrap(), QuantitySync::Superseded);
        // Snapshot was taken before the server applied 4
        assert_eq!(store.line(&product).await.unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_edits_on_different_lines_do_not_interfere() {
        let (store, _gateway) = loaded_store(vec![remote("a", 1, 10, 5), remote("b", 1, 30, 5)]).await;
        let a = ProductRef::new("a");
        let b = ProductRef::new("b");

        let (ra, rb) = tokio::join!(store.set_quantity(&a, 4), store.set_quantity(&b, 2));
        assert_eq!(ra.unwrap(), QuantitySync::Applied { quantity: 4 });
        assert_eq!(rb.unwrap(), QuantitySync::Applied { quantity: 2 });
    }

    #[tokio::test]
    async fn test_toggle_unknown_ref_is_ignored() {
        let (store, _gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;

        assert!(!store.toggle_select(&ProductRef::new("ghost")).await);
        assert!(store.selection().await.is_empty());
        assert!(store.toggle_select(&ProductRef::new("a")).await);
        assert_selection_subset(&store).await;
    }

    #[tokio::test]
    async fn test_remove_selected_all_succeed() {
        let (store, gateway) =
            loaded_store(vec![remote("a", 1, 10, 5), remote("b", 1, 30, 5), remote("c", 1, 5, 5)]).await;
        store.toggle_select(&ProductRef::new("a")).await;
        store.toggle_select(&ProductRef::new("c")).await;

        let removed = store.remove_selected().await.unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(gateway.count_calls(|c| matches!(c, GatewayCall::RemoveLine(_))), 2);
        assert!(store.selection().await.is_empty());

        store.load().await.unwrap();
        let lines = store.lines().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product, ProductRef::new("b"));
    }

    #[tokio::test]
    async fn test_remove_selected_partial_failure_lists_remaining() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5), remote("b", 1, 30, 5)]).await;
        gateway.fail_remove_for(&ProductRef::new("b"));
        store.select_all().await;

        let err = store.remove_selected().await.unwrap_err();
        match &err {
            CartError::PartialDeleteFailure { removed, failed } => {
                assert_eq!(removed, &vec![ProductRef::new("a")]);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].product, ProductRef::new("b"));
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
        assert_eq!(err.remaining_lines(), vec![ProductRef::new("b")]);

        // Failed line stays in both cart and selection
        assert!(store.line(&ProductRef::new("b")).await.is_some());
        assert!(store.selection().await.contains(&ProductRef::new("b")));
        assert_selection_subset(&store).await;
    }

    #[tokio::test]
    async fn test_remove_selected_total_failure() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;
        gateway.fail_remove_for(&ProductRef::new("a"));
        store.select_all().await;

        let err = store.remove_selected().await.unwrap_err();
        assert!(matches!(err, CartError::DeleteFailed { ref failed } if failed.len() == 1));
        assert_eq!(store.lines().await.len(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_after_line_removed_is_discarded() {
        let (store, gateway) = loaded_store(vec![remote("a", 1, 10, 5)]).await;
        let product = ProductRef::new("a");
        let gate = gateway.gate_next_update(&product);

        let (sync, removed) = tokio::join!(store.set_quantity(&product, 2), async {
            store.select_all().await;
            let removed = store.remove_selected().await;
            gate.send(()).ok();
            removed
        });

        assert_eq!(removed.unwrap(), vec![product.clone()]);
        // Remote line is gone, the late response must not resurrect anything
        assert!(matches!(sync.unwrap(), QuantitySync::Superseded));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_product_reloads_cart() {
        let gateway = Arc::new(MockCartGateway::new().with_product(remote("p", 0, 99, 4)));
        let store = CartStore::new(user(), gateway.clone());

        store.add_product(&ProductRef::new("p")).await.unwrap();
        let line = store.line(&ProductRef::new("p")).await.unwrap();
        assert_eq!(line.quantity, 1);
        assert_eq!(line.unit_price, Money::new(99));
    }

    #[tokio::test]
    async fn test_selected_total_tracks_live_prices() {
        let (store, _gateway) = loaded_store(vec![remote("a", 2, 10, 5), remote("b", 1, 30, 5)]).await;
        store.select_all().await;
        assert_eq!(store.selected_total().await, Money::new(50));
    }
}
