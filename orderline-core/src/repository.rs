use async_trait::async_trait;

use crate::model::{Item, NewItem, NewUser, Order, Reservation, User};
use crate::CoreResult;

/// Access to the user records owned by the user service.
///
/// The order flow only ever calls [`UserDirectory::get_user`].
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> CoreResult<User>;

    /// `NotFound` when no user has this id.
    async fn get_user(&self, id: &str) -> CoreResult<User>;
}

/// Access to the inventory service's items.
///
/// Stock only moves through [`InventoryStore::reserve_stock`]; a reservation is then
/// either committed (it backs a stored order) or released. There is no quantity setter.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn create_item(&self, new_item: NewItem) -> CoreResult<Item>;

    async fn get_item(&self, id: &str) -> CoreResult<Item>;

    /// Atomically checks existence, checks `quantity <= available` and decrements.
    ///
    /// Concurrent calls against one item behave as if serialized. Fails with `NotFound`
    /// for an unknown item and `PreconditionFailed(InsufficientStock)` when the item
    /// cannot cover `quantity`; neither failure changes any state.
    async fn reserve_stock(&self, item_id: &str, quantity: i64) -> CoreResult<Reservation>;

    /// Marks an outstanding reservation as consumed by a stored order. Its stock can no
    /// longer be released.
    async fn commit_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item>;

    /// Hands back the stock of an outstanding reservation whose order could not be stored.
    ///
    /// `NotFound` when the reservation is unknown, already committed or already released.
    async fn release_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item>;
}

/// Append-only order storage.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Stores a new order. An id that is already taken is an `Internal` error.
    async fn insert_order(&self, order: Order) -> CoreResult<Order>;

    async fn get_order(&self, id: &str) -> CoreResult<Order>;
}
