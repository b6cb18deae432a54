use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use orderline_core::model::require_id;
use orderline_core::{
    CoreResult, IdGenerator, InventoryStore, Item, NewItem, Reservation, ServiceError, UuidGenerator,
};

/// Per-item state. `outstanding` holds reservations that are neither committed nor
/// released, keyed by reservation id; only those can give stock back.
#[derive(Debug)]
struct StockEntry {
    item: Item,
    outstanding: HashMap<String, i64>,
}

/// In-memory inventory with one lock per item.
///
/// The outer map lock is only held long enough to find (or insert) an entry; the
/// read-compare-decrement of a reservation runs under that item's own mutex, so
/// reservations against different items never wait on each other.
pub struct InMemoryInventory {
    items: RwLock<HashMap<String, Arc<Mutex<StockEntry>>>>,
    ids: Arc<dyn IdGenerator>,
    reservation_ids: UuidGenerator,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UuidGenerator))
    }

    /// Item ids come from `ids`; reservation ids are always random UUIDs.
    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            ids,
            reservation_ids: UuidGenerator,
        }
    }

    /// Register a new item with its initial stock
    pub fn create(&self, new_item: NewItem) -> CoreResult<Item> {
        new_item.validate()?;

        let item = new_item.into_item(self.ids.next_id());
        let entry = Arc::new(Mutex::new(StockEntry { item: item.clone(), outstanding: HashMap::new() }));

        let mut items = self.items.write();
        if items.contains_key(&item.id) {
            return Err(ServiceError::internal(format!("item id {} already in use", item.id)));
        }
        items.insert(item.id.clone(), entry);
        drop(items);

        info!("Item created: {} ({}) with quantity {}", item.id, item.name, item.quantity);
        Ok(item)
    }

    /// Snapshot of the current state
    pub fn get(&self, item_id: &str) -> Option<Item> {
        self.entry(item_id).map(|entry| entry.lock().item.clone())
    }

    /// Take `quantity` units out of stock, all or nothing
    pub fn reserve(&self, item_id: &str, quantity: i64) -> Result<Reservation, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let entry = self
            .entry(item_id)
            .ok_or_else(|| InventoryError::NotFound(item_id.to_string()))?;

        let mut stock = entry.lock();
        if stock.item.quantity < quantity {
            return Err(InventoryError::InsufficientInventory {
                requested: quantity,
                available: stock.item.quantity,
            });
        }

        let id = self.reservation_ids.next_id();
        stock.item.quantity -= quantity;
        stock.outstanding.insert(id.clone(), quantity);
        debug!("Reserved {} of {} as {}, {} left", quantity, item_id, id, stock.item.quantity);

        Ok(Reservation { id, quantity, item: stock.item.clone() })
    }

    /// The reservation now backs a stored order; its units leave the releasable pool
    pub fn commit(&self, item_id: &str, reservation_id: &str) -> Result<Item, InventoryError> {
        let entry = self
            .entry(item_id)
            .ok_or_else(|| InventoryError::NotFound(item_id.to_string()))?;

        let mut stock = entry.lock();
        stock
            .outstanding
            .remove(reservation_id)
            .ok_or_else(|| InventoryError::UnknownReservation(reservation_id.to_string()))?;
        debug!("Committed reservation {} of {}", reservation_id, item_id);

        Ok(stock.item.clone())
    }

    /// Return an outstanding reservation to stock (order could not be stored)
    pub fn release(&self, item_id: &str, reservation_id: &str) -> Result<Item, InventoryError> {
        let entry = self
            .entry(item_id)
            .ok_or_else(|| InventoryError::NotFound(item_id.to_string()))?;

        let mut stock = entry.lock();
        let quantity = stock
            .outstanding
            .remove(reservation_id)
            .ok_or_else(|| InventoryError::UnknownReservation(reservation_id.to_string()))?;

        stock.item.quantity += quantity;
        info!("Released {} of {}, {} available", quantity, item_id, stock.item.quantity);

        Ok(stock.item.clone())
    }

    /// Units held by reservations that are neither committed nor released
    pub fn outstanding(&self, item_id: &str) -> Option<i64> {
        self.entry(item_id).map(|entry| entry.lock().outstanding.values().sum())
    }

    fn entry(&self, item_id: &str) -> Option<Arc<Mutex<StockEntry>>> {
        self.items.read().get(item_id).cloned()
    }
}

impl Default for InMemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn create_item(&self, new_item: NewItem) -> CoreResult<Item> {
        self.create(new_item)
    }

    async fn get_item(&self, id: &str) -> CoreResult<Item> {
        require_id(id)?;
        self.get(id)
            .ok_or_else(|| ServiceError::not_found(format!("item {} not found", id)))
    }

    async fn reserve_stock(&self, item_id: &str, quantity: i64) -> CoreResult<Reservation> {
        require_id(item_id)?;
        Ok(self.reserve(item_id, quantity)?)
    }

    async fn commit_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item> {
        require_id(item_id)?;
        require_id(reservation_id)?;
        Ok(self.commit(item_id, reservation_id)?)
    }

    async fn release_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item> {
        require_id(item_id)?;
        require_id(reservation_id)?;
        Ok(self.release(item_id, reservation_id)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory not found: {0}")]
    NotFound(String),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("Insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: i64,
        available: i64,
    },

    #[error("No outstanding reservation {0}")]
    UnknownReservation(String),
}

impl From<InventoryError> for ServiceError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => ServiceError::not_found(format!("item {} not found", id)),
            InventoryError::InvalidQuantity(_) => ServiceError::invalid_input("quantity must be > 0"),
            InventoryError::InsufficientInventory { requested, available } => {
                ServiceError::insufficient_stock(requested, available)
            }
            InventoryError::UnknownReservation(id) => {
                ServiceError::not_found(format!("reservation {} is not outstanding", id))
            }
        }
    }
}
