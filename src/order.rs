//! The authoritative order sequence and its lifecycle.
//!
//! Orders are immutable except for their status. The sequence is persisted
//! whole under the `orders` key on every mutation, newest first, and every
//! persist goes through [`OrderStore::save_all`] so that no write ever
//! happens without an `orders_updated` announcement.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::{NotificationBus, NotificationMessage};
use crate::cart::{Cart, CartItem};
use crate::error::SubmitError;
use crate::storage::{StorageAdapter, epoch_millis, keys};

/// Lifecycle status of a submitted order.
///
/// The workflow convention is pending → preparing → ready → completed,
/// with cancelled reachable from any active state, but the data model
/// itself does not constrain transitions; see [`StatusPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether consuming views file this status under the archived
    /// partition. Archived orders are not structurally distinct records.
    pub fn is_archived(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// An order created at checkout: immutable content, mutable status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique id derived from creation time plus a random disambiguator.
    pub order_id: String,
    pub customer_name: String,
    /// Snapshot of the cart lines at submission.
    pub items: Vec<CartItem>,
    pub total: f64,
    pub status: OrderStatus,
    /// Milliseconds since the Unix epoch at submission.
    pub created_at: u64,
}

/// Validation hook consulted before a status overwrite: `(current,
/// requested) -> allowed`. The default store carries none, matching the
/// observed unconstrained behavior; a stricter workflow can be layered on
/// without touching the store.
pub type StatusPolicy = Arc<dyn Fn(OrderStatus, OrderStatus) -> bool + Send + Sync>;

/// Store of the submitted-order sequence.
///
/// `Clone` is cheap; clones share the session's adapter, bus, and policy.
#[derive(Clone)]
pub struct OrderStore {
    adapter: StorageAdapter,
    bus: NotificationBus,
    policy: Option<StatusPolicy>,
}

// Manual `Debug` because the policy is an opaque callable.
impl std::fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStore")
            .field("has_policy", &self.policy.is_some())
            .finish()
    }
}

impl OrderStore {
    pub(crate) fn new(adapter: StorageAdapter, bus: NotificationBus) -> Self {
        Self {
            adapter,
            bus,
            policy: None,
        }
    }

    /// Attach a status-transition policy. Transitions the policy rejects
    /// are logged and dropped exactly like an unknown order id.
    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// The full order sequence, newest first, empty on any read failure.
    pub fn load_all(&self) -> Vec<Order> {
        self.adapter.read(keys::ORDERS, Vec::new())
    }

    /// Persist the sequence verbatim and announce `orders_updated`.
    ///
    /// This is the single choke point for order mutations: callers apply
    /// their change to a loaded copy and hand the whole sequence back, so
    /// no write can ever happen without its notification.
    pub fn save_all(&self, orders: &[Order]) {
        self.adapter.write(keys::ORDERS, &orders);
        self.bus.notify(NotificationMessage::OrdersUpdated);
    }

    /// Create a pending order from `cart` and prepend it to the sequence.
    ///
    /// # Errors
    ///
    /// [`SubmitError::EmptyCart`] if the cart has no items; the store is
    /// left untouched.
    pub fn submit(&self, cart: &Cart, customer_name: &str) -> Result<Order, SubmitError> {
        if cart.is_empty() {
            return Err(SubmitError::EmptyCart);
        }

        let order = Order {
            order_id: generate_order_id(),
            customer_name: customer_name.to_owned(),
            items: cart.items().to_vec(),
            total: cart.total(),
            status: OrderStatus::Pending,
            created_at: epoch_millis(),
        };

        let mut orders = self.load_all();
        orders.insert(0, order.clone());
        self.save_all(&orders);

        tracing::info!(
            order_id = %order.order_id,
            customer = %order.customer_name,
            total = order.total,
            "order submitted"
        );
        Ok(order)
    }

    /// Overwrite the status of the order with `order_id`.
    ///
    /// # Returns
    ///
    /// `true` if the status was written. An unknown id or a
    /// policy-rejected transition is logged and leaves the store
    /// untouched, returning `false`.
    pub fn set_status(&self, order_id: &str, new_status: OrderStatus) -> bool {
        let mut orders = self.load_all();
        let Some(order) = orders.iter_mut().find(|o| o.order_id == order_id) else {
            tracing::warn!(order_id, "status update for unknown order ignored");
            return false;
        };

        if let Some(policy) = &self.policy
            && !policy(order.status, new_status)
        {
            tracing::warn!(
                order_id,
                from = ?order.status,
                to = ?new_status,
                "status transition rejected by policy"
            );
            return false;
        }

        order.status = new_status;
        self.save_all(&orders);
        true
    }

    /// Remove every archived (completed or cancelled) order.
    ///
    /// Irreversible; confirming with the operator is the caller's concern.
    ///
    /// # Returns
    ///
    /// The number of orders removed.
    pub fn clear_archived(&self) -> usize {
        let mut orders = self.load_all();
        let before = orders.len();
        orders.retain(|o| !o.status.is_archived());
        let removed = before - orders.len();
        self.save_all(&orders);

        tracing::info!(removed, "archived orders cleared");
        removed
    }
}

/// Split a loaded sequence into (active, archived) views. Purely a
/// read-side concern derived from status.
pub fn partition_by_archive(orders: Vec<Order>) -> (Vec<Order>, Vec<Order>) {
    orders.into_iter().partition(|o| !o.status.is_archived())
}

/// Build an order id from the local time of day, the trailing digits of
/// the creation timestamp, and a 3-digit random disambiguator. Collisions
/// are treated as negligible, not formally prevented.
fn generate_order_id() -> String {
    let millis = epoch_millis();
    let disambiguator = 100 + (Uuid::new_v4().as_u128() % 900) as u16;
    format!(
        "{}-{:04}{}",
        chrono::Local::now().format("%H%M"),
        millis % 10_000,
        disambiguator
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;

    fn store() -> (Profile, OrderStore) {
        let profile = Profile::new();
        let tab = Uuid::new_v4();
        let adapter = StorageAdapter::new(profile.clone(), tab);
        let bus = NotificationBus::new(profile.clone(), adapter.clone(), tab);
        (profile, OrderStore::new(adapter, bus))
    }

    fn cart_with(lines: &[(&str, f64, u32)]) -> Cart {
        let mut cart = Cart::default();
        for (id, price, qty) in lines {
            cart.items.push(CartItem {
                product_id: (*id).to_owned(),
                name: (*id).to_owned(),
                unit_price: *price,
                quantity: *qty,
            });
        }
        cart
    }

    #[test]
    fn submit_empty_cart_is_rejected_without_mutation() {
        let (profile, store) = store();

        let result = store.submit(&Cart::default(), "Ana");
        assert_eq!(result, Err(SubmitError::EmptyCart));

        let raw = profile
            .backend()
            .get(keys::ORDERS)
            .expect("get should succeed");
        assert!(raw.is_none(), "no write may happen on rejection");
    }

    #[test]
    fn submit_builds_a_pending_order_snapshot() {
        let (_profile, store) = store();
        let cart = cart_with(&[("p1", 12.00, 1)]);

        let order = store.submit(&cart, "Ana").expect("submit should succeed");

        assert_eq!(order.customer_name, "Ana");
        assert_eq!(order.total, 12.00);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items, cart.items());

        let loaded = store.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], order);
    }

    #[test]
    fn submit_prepends_newest_first() {
        let (_profile, store) = store();

        let first = store
            .submit(&cart_with(&[("p1", 12.00, 1)]), "A")
            .expect("submit");
        let second = store
            .submit(&cart_with(&[("b1", 6.00, 2)]), "B")
            .expect("submit");

        let loaded = store.load_all();
        assert_eq!(loaded[0].order_id, second.order_id);
        assert_eq!(loaded[1].order_id, first.order_id);
    }

    #[test]
    fn save_all_dispatches_on_both_transports() {
        let (profile, store) = store();
        let mut frames = profile.channel.subscribe();
        let mut events = profile.subscribe_storage_events();

        store.save_all(&[]);

        // Exactly one frame on the direct channel.
        let frame = frames.try_recv().expect("one frame should be queued");
        assert_eq!(frame.msg, NotificationMessage::OrdersUpdated);
        assert!(frames.try_recv().is_err(), "no second frame");

        // Exactly one relay write (plus the orders write itself).
        let mut orders_writes = 0;
        let mut relay_writes = 0;
        while let Ok(event) = events.try_recv() {
            match event.key.as_str() {
                keys::ORDERS => orders_writes += 1,
                keys::NOTIFY_RELAY => relay_writes += 1,
                other => panic!("unexpected write to {other}"),
            }
        }
        assert_eq!(orders_writes, 1);
        assert_eq!(relay_writes, 1);
    }

    #[test]
    fn set_status_on_unknown_id_leaves_storage_byte_identical() {
        let (profile, store) = store();
        store
            .submit(&cart_with(&[("l1", 7.00, 1)]), "Ana")
            .expect("submit");

        let before = profile
            .backend()
            .get(keys::ORDERS)
            .expect("get should succeed");

        assert!(!store.set_status("no-such-id", OrderStatus::Completed));

        let after = profile
            .backend()
            .get(keys::ORDERS)
            .expect("get should succeed");
        assert_eq!(before, after);
    }

    #[test]
    fn set_status_overwrites_in_place() {
        let (_profile, store) = store();
        let order = store
            .submit(&cart_with(&[("l2", 10.00, 1)]), "Ana")
            .expect("submit");

        assert!(store.set_status(&order.order_id, OrderStatus::Completed));

        let loaded = store.load_all();
        assert_eq!(loaded[0].status, OrderStatus::Completed);

        // The order now shows up only in the archived partition.
        let (active, archived) = partition_by_archive(loaded);
        assert!(active.is_empty());
        assert_eq!(archived.len(), 1);
    }

    #[test]
    fn transitions_are_unconstrained_by_default() {
        let (_profile, store) = store();
        let order = store
            .submit(&cart_with(&[("b2", 3.00, 1)]), "Ana")
            .expect("submit");

        // completed back to pending: allowed without a policy.
        assert!(store.set_status(&order.order_id, OrderStatus::Completed));
        assert!(store.set_status(&order.order_id, OrderStatus::Pending));
        assert_eq!(store.load_all()[0].status, OrderStatus::Pending);
    }

    #[test]
    fn status_policy_can_reject_transitions() {
        let (_profile, store) = store();
        let store = store.with_status_policy(Arc::new(|from, _to| from != OrderStatus::Completed));

        let order = store
            .submit(&cart_with(&[("p2", 14.00, 1)]), "Ana")
            .expect("submit");
        assert!(store.set_status(&order.order_id, OrderStatus::Completed));

        // Completed is terminal under this policy.
        assert!(!store.set_status(&order.order_id, OrderStatus::Pending));
        assert_eq!(store.load_all()[0].status, OrderStatus::Completed);
    }

    #[test]
    fn clear_archived_drops_completed_and_cancelled_only() {
        let (_profile, store) = store();
        let a = store.submit(&cart_with(&[("p1", 12.00, 1)]), "A").expect("submit");
        let b = store.submit(&cart_with(&[("p2", 14.00, 1)]), "B").expect("submit");
        let c = store.submit(&cart_with(&[("l1", 7.00, 1)]), "C").expect("submit");

        store.set_status(&a.order_id, OrderStatus::Completed);
        store.set_status(&b.order_id, OrderStatus::Cancelled);

        let removed = store.clear_archived();
        assert_eq!(removed, 2);

        let remaining = store.load_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].order_id, c.order_id);
    }

    #[test]
    fn order_id_has_time_and_disambiguator_shape() {
        let id = generate_order_id();
        let (clock, tail) = id.split_once('-').expect("id should contain a dash");

        assert_eq!(clock.len(), 4);
        assert!(clock.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(tail.len(), 7);
        assert!(tail.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn status_wire_names_are_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Preparing).expect("serialize");
        assert_eq!(json, "\"preparing\"");

        let status: OrderStatus = serde_json::from_str("\"cancelled\"").expect("deserialize");
        assert_eq!(status, OrderStatus::Cancelled);
    }
}
