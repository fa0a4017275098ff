//! Cross-session state synchronization and order lifecycle for a small
//! point-of-sale counter.
//!
//! Sessions opened on one [`Profile`] share a key-value storage partition
//! and a best-effort notification bus; the shared stores (orders, drafts)
//! are rewritten whole on every mutation and every write is announced so
//! that other sessions re-read. The cart is the one piece of state each
//! session keeps to itself, published only as a draft projection.

mod bus;
pub use bus::{BusSubscription, NotificationBus, NotificationMessage, RelayRecord};
mod cart;
pub use cart::{Cart, CartEngine, CartItem, QuantityChange};
mod catalog;
pub use catalog::{Catalog, Category, Product};
mod draft;
pub use draft::{
    CustomerNameProvider, DEFAULT_CUSTOMER_NAME, Draft, DraftStore, sorted_by_recency,
};
mod error;
pub use error::SubmitError;
mod order;
pub use order::{Order, OrderStatus, OrderStore, StatusPolicy, partition_by_archive};
mod profile;
pub use profile::Profile;
mod session;
pub use session::TabSession;
mod storage;
pub use storage::{FileBackend, MemoryBackend, StorageAdapter, StorageBackend, StorageEvent, keys};
