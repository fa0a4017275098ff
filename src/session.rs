//! Per-tab composition root.
//!
//! A [`TabSession`] bundles everything one browser tab runs against: the
//! storage adapter, the notification bus, the exclusive cart engine, and
//! the shared draft and order stores. Sessions opened on the same
//! [`Profile`] model tabs of one browser: independent in-memory state over
//! shared persistent storage, loosely coupled through best-effort
//! notifications.

use std::sync::Arc;

use uuid::Uuid;

use crate::bus::{BusSubscription, NotificationBus};
use crate::cart::CartEngine;
use crate::catalog::Catalog;
use crate::draft::{CustomerNameProvider, DEFAULT_CUSTOMER_NAME, DraftStore};
use crate::error::SubmitError;
use crate::order::{Order, OrderStore};
use crate::profile::Profile;
use crate::storage::StorageAdapter;

/// One tab's view of the system.
pub struct TabSession {
    tab_id: Uuid,
    adapter: StorageAdapter,
    bus: NotificationBus,
    drafts: DraftStore,
    orders: OrderStore,
    cart: CartEngine,
    customer: Arc<dyn CustomerNameProvider>,
}

impl std::fmt::Debug for TabSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabSession")
            .field("tab_id", &self.tab_id)
            .finish()
    }
}

impl Profile {
    /// Open a new session (tab) on this profile with no customer-name
    /// source; drafts and checkouts fall back to the default placeholder.
    pub fn open_tab(&self) -> TabSession {
        TabSession::open(self)
    }
}

impl TabSession {
    /// Open a session with no customer-name source.
    pub fn open(profile: &Profile) -> Self {
        Self::open_with(profile, Arc::new(|| None::<String>))
    }

    /// Open a session with an injected customer-name capability (in the
    /// original this reads a form field on the page).
    pub fn open_with(profile: &Profile, customer: Arc<dyn CustomerNameProvider>) -> Self {
        let tab_id = Uuid::new_v4();
        let adapter = StorageAdapter::new(profile.clone(), tab_id);
        let bus = NotificationBus::new(profile.clone(), adapter.clone(), tab_id);
        let drafts = DraftStore::new(adapter.clone(), bus.clone());
        let orders = OrderStore::new(adapter.clone(), bus.clone());

        let mut cart = CartEngine::new(adapter.clone(), drafts.clone(), customer.clone());
        cart.load();

        tracing::debug!(%tab_id, "session opened");
        Self {
            tab_id,
            adapter,
            bus,
            drafts,
            orders,
            cart,
            customer,
        }
    }

    /// This session's unique id, used to filter self-notifications.
    pub fn tab_id(&self) -> Uuid {
        self.tab_id
    }

    /// The session's storage adapter (shared backend, contained failures).
    pub fn storage(&self) -> &StorageAdapter {
        &self.adapter
    }

    /// The session's notification bus.
    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Listen for foreign change cues. Dashboard sessions re-read the
    /// order and draft stores on every receipt.
    pub fn subscribe(&self) -> BusSubscription {
        self.bus.subscribe()
    }

    /// The menu this session sells from: the cached catalog if one has
    /// been written, the builtin fallback otherwise.
    pub fn catalog(&self) -> Catalog {
        Catalog::load_cached(&self.adapter)
    }

    /// Read access to the exclusive cart.
    pub fn cart(&self) -> &CartEngine {
        &self.cart
    }

    /// Mutation access to the exclusive cart.
    pub fn cart_mut(&mut self) -> &mut CartEngine {
        &mut self.cart
    }

    /// The shared order store.
    pub fn orders(&self) -> &OrderStore {
        &self.orders
    }

    /// The shared draft store.
    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    /// Submit the current cart as an order, then clear the cart.
    ///
    /// Submission is the event that ends a draft's life: the follow-up
    /// clear persists an explicit empty cart and the draft sync deletes
    /// this session's entry, so the `orders_updated` announcement is
    /// always followed by a `drafts_updated` one.
    ///
    /// # Errors
    ///
    /// [`SubmitError::EmptyCart`] if there is nothing in the cart; no
    /// order is created and nothing is mutated.
    pub fn checkout(&mut self) -> Result<Order, SubmitError> {
        let customer_name = self
            .customer
            .customer_name()
            .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_owned());

        let order = self.orders.submit(self.cart.cart(), &customer_name)?;
        self.cart.clear();
        Ok(order)
    }
}
