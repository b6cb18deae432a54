//! Record stores owned by the standalone user and inventory services.

pub mod inventory;
pub mod users;

pub use inventory::{InMemoryInventory, InventoryError};
pub use users::InMemoryUserDirectory;
