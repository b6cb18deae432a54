use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use orderline_core::{CoreResult, Order, OrderStore, ServiceError};

/// Append-only in-memory order storage: orders are inserted once and never updated or removed.
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
        }
    }

    /// Store a freshly placed order
    pub fn create(&self, order: Order) -> Result<Order, OrderError> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(OrderError::DuplicateId(order.id));
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    /// Get an order by ID
    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.read().get(order_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: Order) -> CoreResult<Order> {
        Ok(self.create(order)?)
    }

    async fn get_order(&self, id: &str) -> CoreResult<Order> {
        self.get(id).ok_or_else(|| OrderError::NotFound(id.to_string()).into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Order id already taken: {0}")]
    DuplicateId(String),
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => ServiceError::not_found(format!("order {} not found", id)),
            e @ OrderError::DuplicateId(_) => ServiceError::internal(e.to_string()),
        }
    }
}
