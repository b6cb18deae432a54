pub mod manager;
pub mod orchestrator;

pub use manager::{InMemoryOrderStore, OrderError};
pub use orchestrator::OrderCoordinator;
