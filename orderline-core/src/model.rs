use chrono::{DateTime, Utc};
use orderline_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::{CoreResult, ServiceError};

/// Rejects empty identifiers before any store is touched.
pub fn require_id(id: &str) -> CoreResult<()> {
    if id.trim().is_empty() {
        return Err(ServiceError::invalid_input("id is required"));
    }
    Ok(())
}

/// A registered user. Owned by the user directory; never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Masked<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(ServiceError::invalid_input("name and email are required"));
        }
        Ok(())
    }

    pub fn into_user(self, id: String) -> User {
        User {
            id,
            name: self.name,
            email: Masked::new(self.email),
            created_at: Utc::now(),
        }
    }
}

/// A stock-keeping item. `quantity` is only ever changed through reservations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub quantity: i64,
}

impl NewItem {
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::invalid_input("name is required"));
        }
        if self.quantity < 0 {
            return Err(ServiceError::invalid_input("quantity must be >= 0"));
        }
        Ok(())
    }

    pub fn into_item(self, id: String) -> Item {
        Item {
            id,
            name: self.name,
            quantity: self.quantity,
            created_at: Utc::now(),
        }
    }
}

/// Stock taken by one successful reservation.
///
/// `id` is the only handle that can later commit or release it, so stock backing a
/// stored order can never be handed back by anyone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub quantity: i64,
    /// The item right after the decrement
    pub item: Item,
}

/// A placed order. Immutable once stored; later stock changes never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: String, request: &NewOrder) -> Self {
        Self {
            id,
            user_id: request.user_id.clone(),
            item_id: request.item_id.clone(),
            quantity: request.quantity,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: String,
    pub item_id: String,
    pub quantity: i64,
}

impl NewOrder {
    pub fn validate(&self) -> CoreResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(ServiceError::invalid_input("user_id is required"));
        }
        if self.item_id.trim().is_empty() {
            return Err(ServiceError::invalid_input("item_id is required"));
        }
        if self.quantity <= 0 {
            return Err(ServiceError::invalid_input("quantity must be > 0"));
        }
        Ok(())
    }
}
