pub mod models;
pub mod pii;

pub use models::events::OrderPlacedEvent;
pub use pii::Masked;
