//! Draft store: live snapshots of in-progress carts, keyed by client
//! identity.
//!
//! A draft exists if and only if the owning session's cart is non-empty;
//! emptying the cart deletes the draft. The whole mapping is rewritten on
//! every change and every write announces `drafts_updated`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::{NotificationBus, NotificationMessage};
use crate::cart::{Cart, CartItem};
use crate::storage::{StorageAdapter, epoch_millis, keys};

/// Placeholder used when no customer name has been provided.
pub const DEFAULT_CUSTOMER_NAME: &str = "Cliente";

/// Capability for resolving the customer's display name at snapshot time,
/// injected instead of reached for ambiently.
///
/// Returning `None` means "nothing entered yet"; consumers substitute
/// [`DEFAULT_CUSTOMER_NAME`].
pub trait CustomerNameProvider: Send + Sync {
    fn customer_name(&self) -> Option<String>;
}

impl<F> CustomerNameProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn customer_name(&self) -> Option<String> {
        self()
    }
}

/// A live, unsent snapshot of a customer's in-progress cart, visible to
/// operator sessions before checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Identity of the session this draft belongs to.
    pub client_id: String,
    /// Customer name as entered so far.
    pub customer_name: String,
    /// Snapshot of the cart lines at the time of the last mutation.
    pub items: Vec<CartItem>,
    /// Sum of `unit_price * quantity` over `items`.
    pub total: f64,
    /// Milliseconds since the Unix epoch at snapshot time.
    pub timestamp: u64,
}

/// Store of one draft per client identity, persisted as a whole mapping
/// under the `drafts` key.
///
/// `Clone` is cheap; clones share the session's adapter and bus.
#[derive(Debug, Clone)]
pub struct DraftStore {
    adapter: StorageAdapter,
    bus: NotificationBus,
}

impl DraftStore {
    pub(crate) fn new(adapter: StorageAdapter, bus: NotificationBus) -> Self {
        Self { adapter, bus }
    }

    /// The stable client identity of this storage partition, generated and
    /// persisted under the `client-id` key on first access.
    ///
    /// Sessions sharing a partition converge on one token; in practice the
    /// token is never cleared, so it is stable for the partition's life.
    pub fn client_id(&self) -> String {
        if let Some(id) = self.adapter.read(keys::CLIENT_ID, None::<String>) {
            return id;
        }
        let id = format!("client-{}", Uuid::new_v4().simple());
        self.adapter.write(keys::CLIENT_ID, &id);
        id
    }

    /// The full client-id to draft mapping, empty on any read failure.
    pub fn read_all(&self) -> HashMap<String, Draft> {
        self.adapter.read(keys::DRAFTS, HashMap::new())
    }

    /// Project `cart` into this session's draft entry.
    ///
    /// A non-empty cart overwrites the entry with a fresh snapshot (items,
    /// total, resolved customer name, current timestamp); an empty cart
    /// deletes the entry. Either way the whole mapping is persisted and
    /// `drafts_updated` is announced.
    pub fn upsert_from_cart(&self, cart: &Cart, provider: &dyn CustomerNameProvider) {
        let client_id = self.client_id();
        let mut drafts = self.read_all();

        if cart.is_empty() {
            drafts.remove(&client_id);
        } else {
            let customer_name = provider
                .customer_name()
                .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_owned());
            drafts.insert(
                client_id.clone(),
                Draft {
                    client_id,
                    customer_name,
                    items: cart.items().to_vec(),
                    total: cart.total(),
                    timestamp: epoch_millis(),
                },
            );
        }

        self.adapter.write(keys::DRAFTS, &drafts);
        self.bus.notify(NotificationMessage::DraftsUpdated);
    }

    /// Delete this session's draft entry, if present.
    ///
    /// Persists and announces only when a deletion actually occurred, so a
    /// session without a draft causes no redundant broadcast.
    pub fn remove(&self) {
        let client_id = self.client_id();
        let mut drafts = self.read_all();
        if drafts.remove(&client_id).is_none() {
            return;
        }
        self.adapter.write(keys::DRAFTS, &drafts);
        self.bus.notify(NotificationMessage::DraftsUpdated);
    }
}

/// Order drafts for display, most recently touched first.
///
/// Storage assigns no meaning to mapping order; recency ordering is purely
/// a read-time concern.
pub fn sorted_by_recency(drafts: &HashMap<String, Draft>) -> Vec<Draft> {
    let mut drafts: Vec<Draft> = drafts.values().cloned().collect();
    drafts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;

    fn store() -> (Profile, DraftStore) {
        let profile = Profile::new();
        let tab = Uuid::new_v4();
        let adapter = StorageAdapter::new(profile.clone(), tab);
        let bus = NotificationBus::new(profile.clone(), adapter.clone(), tab);
        (profile, DraftStore::new(adapter, bus))
    }

    fn cart_with(lines: &[(&str, &str, f64, u32)]) -> Cart {
        let mut cart = Cart::default();
        for (id, name, price, qty) in lines {
            cart.items.push(CartItem {
                product_id: (*id).to_owned(),
                name: (*name).to_owned(),
                unit_price: *price,
                quantity: *qty,
            });
        }
        cart
    }

    fn no_name() -> impl CustomerNameProvider {
        || None::<String>
    }

    #[test]
    fn client_id_is_generated_once_and_persisted() {
        let (_profile, store) = store();
        let first = store.client_id();
        let second = store.client_id();

        assert!(first.starts_with("client-"));
        assert_eq!(first, second, "identity must be stable across calls");
    }

    #[test]
    fn upsert_snapshots_items_total_and_name() {
        let (_profile, store) = store();
        let cart = cart_with(&[("p1", "Pastel Grande (G)", 12.00, 2)]);

        store.upsert_from_cart(&cart, &(|| Some("Ana".to_owned())));

        let drafts = store.read_all();
        let draft = drafts
            .get(&store.client_id())
            .expect("draft should exist for a non-empty cart");
        assert_eq!(draft.customer_name, "Ana");
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].quantity, 2);
        assert_eq!(draft.total, 24.00);
    }

    #[test]
    fn missing_customer_name_falls_back_to_placeholder() {
        let (_profile, store) = store();
        let cart = cart_with(&[("b1", "Coca-Cola Lata", 6.00, 1)]);

        store.upsert_from_cart(&cart, &no_name());

        let drafts = store.read_all();
        let draft = drafts.get(&store.client_id()).expect("draft should exist");
        assert_eq!(draft.customer_name, DEFAULT_CUSTOMER_NAME);
    }

    #[test]
    fn empty_cart_deletes_the_draft() {
        let (_profile, store) = store();

        store.upsert_from_cart(&cart_with(&[("p1", "Pastel", 12.00, 1)]), &no_name());
        assert_eq!(store.read_all().len(), 1);

        store.upsert_from_cart(&Cart::default(), &no_name());
        assert!(
            store.read_all().is_empty(),
            "emptying the cart must delete the draft, never leave it with no items"
        );
    }

    #[test]
    fn draft_roundtrips_structurally_equal() {
        let (profile, store) = store();
        let cart = cart_with(&[("l1", "Misto", 7.00, 3), ("b2", "Água Mineral", 3.00, 1)]);

        store.upsert_from_cart(&cart, &(|| Some("Rui".to_owned())));
        let written = store.read_all();

        // Read through a second session of the same profile.
        let other_tab = Uuid::new_v4();
        let other_adapter = StorageAdapter::new(profile.clone(), other_tab);
        let other_bus = NotificationBus::new(profile, other_adapter.clone(), other_tab);
        let other = DraftStore::new(other_adapter, other_bus);

        assert_eq!(other.read_all(), written);
    }

    #[test]
    fn remove_is_silent_when_no_draft_exists() {
        let (profile, store) = store();
        let mut frames = profile.channel.subscribe();

        store.remove();

        // No deletion happened, so nothing may be broadcast at all, not
        // even a frame other sessions would have to filter.
        assert!(matches!(
            frames.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn remove_deletes_only_own_entry() {
        let (_profile, store) = store();
        store.upsert_from_cart(&cart_with(&[("p2", "Pastel de Carne", 14.00, 1)]), &no_name());

        // A draft from another storage partition is already in the map.
        let mut drafts = store.read_all();
        drafts.insert(
            "client-foreign".to_owned(),
            Draft {
                client_id: "client-foreign".to_owned(),
                customer_name: DEFAULT_CUSTOMER_NAME.to_owned(),
                items: Vec::new(),
                total: 10.00,
                timestamp: 1,
            },
        );
        store.adapter.write(keys::DRAFTS, &drafts);

        assert_eq!(store.read_all().len(), 2);
        store.remove();

        let remaining = store.read_all();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key("client-foreign"));
    }

    #[test]
    fn sorted_by_recency_is_newest_first() {
        let mut drafts = HashMap::new();
        for (id, ts) in [("a", 10u64), ("b", 30), ("c", 20)] {
            drafts.insert(
                id.to_owned(),
                Draft {
                    client_id: id.to_owned(),
                    customer_name: DEFAULT_CUSTOMER_NAME.to_owned(),
                    items: Vec::new(),
                    total: 0.0,
                    timestamp: ts,
                },
            );
        }

        let ordered = sorted_by_recency(&drafts);
        let ids: Vec<&str> = ordered.iter().map(|d| d.client_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
