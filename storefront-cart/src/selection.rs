use std::collections::BTreeSet;
use storefront_shared::ProductRef;

/// Lines the user ticked for the next checkout.
///
/// Holds only refs of lines currently in the cart; the owning store prunes it
/// whenever lines go away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    refs: BTreeSet<ProductRef>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership; returns whether `product` is selected afterwards
    pub fn toggle(&mut self, product: &ProductRef) -> bool {
        if self.refs.remove(product) {
            false
        } else {
            self.refs.insert(product.clone());
            true
        }
    }

    pub fn insert(&mut self, product: ProductRef) {
        self.refs.insert(product);
    }

    pub fn remove(&mut self, product: &ProductRef) -> bool {
        self.refs.remove(product)
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }

    /// Drop every ref for which `keep` is false
    pub fn retain(&mut self, mut keep: impl FnMut(&ProductRef) -> bool) {
        self.refs.retain(|r| keep(r));
    }

    pub fn contains(&self, product: &ProductRef) -> bool {
        self.refs.contains(product)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductRef> {
        self.refs.iter()
    }
}
