//! The active shopping cart and its mutation engine.
//!
//! Each session owns exactly one cart; other sessions never see it
//! directly, only its draft projection. Every mutation is followed,
//! unconditionally, by full persistence of the cart and a draft-store
//! sync. There is no mutate-without-announcing path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::draft::{CustomerNameProvider, DraftStore};
use crate::storage::{StorageAdapter, keys};

/// One cart line. Name and unit price are captured from the catalog when
/// the line is first created and never re-fetched afterwards: a later
/// catalog price change does not retroactively affect an existing line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    /// Always at least 1; a line reaching zero is removed, never persisted.
    pub quantity: u32,
}

impl CartItem {
    /// Line subtotal: `unit_price * quantity`.
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Ordered collection of cart lines, unique by product id. Persisted as a
/// plain JSON array under the `cart` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    pub(crate) items: Vec<CartItem>,
}

impl Cart {
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Sum of line subtotals over the whole cart.
    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::subtotal).sum()
    }
}

/// Direction of a single-step quantity change on a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Increase,
    Decrease,
}

/// Mutation engine for the session's exclusive cart.
///
/// The engine is the sole writer of this session's draft entry: every
/// mutating operation persists the cart under the `cart` key and projects
/// it into the draft store, which in turn announces `drafts_updated`.
pub struct CartEngine {
    cart: Cart,
    storage: StorageAdapter,
    drafts: DraftStore,
    customer: Arc<dyn CustomerNameProvider>,
}

// Manual `Debug` because the name provider is an opaque capability.
impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine").field("cart", &self.cart).finish()
    }
}

impl CartEngine {
    pub(crate) fn new(
        storage: StorageAdapter,
        drafts: DraftStore,
        customer: Arc<dyn CustomerNameProvider>,
    ) -> Self {
        Self {
            cart: Cart::default(),
            storage,
            drafts,
            customer,
        }
    }

    /// The current cart state.
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Hydrate the cart from storage at session startup. Any failure
    /// resets to an empty cart.
    pub fn load(&mut self) {
        self.cart = self.storage.read(keys::CART, Cart::default());
    }

    /// Add one unit of `product_id` from `catalog`.
    ///
    /// An unknown product is a no-op. An existing line has its quantity
    /// incremented, keeping the name and price captured at first add;
    /// otherwise a new line is appended with quantity 1.
    pub fn add(&mut self, product_id: &str, catalog: &Catalog) {
        let Some(product) = catalog.product(product_id) else {
            tracing::debug!(product_id, "add for unknown product ignored");
            return;
        };

        if let Some(line) = self
            .cart
            .items
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            line.quantity += 1;
        } else {
            self.cart.items.push(CartItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: 1,
            });
        }
        self.after_mutation();
    }

    /// Step the quantity of the line at `index` up or down.
    ///
    /// An out-of-range index is a no-op. A decrease that would reach zero
    /// removes the line entirely.
    pub fn change_quantity(&mut self, index: usize, change: QuantityChange) {
        if index >= self.cart.items.len() {
            return;
        }

        match change {
            QuantityChange::Increase => self.cart.items[index].quantity += 1,
            QuantityChange::Decrease => {
                if self.cart.items[index].quantity <= 1 {
                    self.cart.items.remove(index);
                } else {
                    self.cart.items[index].quantity -= 1;
                }
            }
        }
        self.after_mutation();
    }

    /// Delete the line matching `product_id`, if present.
    pub fn remove_line(&mut self, product_id: &str) {
        self.cart.items.retain(|line| line.product_id != product_id);
        self.after_mutation();
    }

    /// Empty the cart. The empty collection is persisted explicitly (the
    /// storage key is overwritten, not deleted), and the draft sync sees
    /// an empty cart and deletes this session's draft.
    pub fn clear(&mut self) {
        self.cart.items.clear();
        self.after_mutation();
    }

    /// The two side effects inseparable from every mutation: persist the
    /// full cart state, then project it into the draft store.
    fn after_mutation(&self) {
        self.storage.write(keys::CART, &self.cart);
        self.drafts
            .upsert_from_cart(&self.cart, self.customer.as_ref());
    }
}
