pub mod identity;
pub mod model;
pub mod repository;
pub mod wire;

pub use identity::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use model::{Item, NewItem, NewOrder, NewUser, Order, Reservation, User};
pub use repository::{InventoryStore, OrderStore, UserDirectory};
pub use wire::{ErrorBody, StockRequest};

/// Why a cross-service dependency of an operation is unmet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("user not found")]
    UserNotFound,
    #[error("item not found")]
    ItemNotFound,
    #[error("not enough stock")]
    InsufficientStock { requested: i64, available: i64 },
}

impl Precondition {
    /// Stable machine-readable tag, carried in error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            Precondition::UserNotFound => "user_not_found",
            Precondition::ItemNotFound => "item_not_found",
            Precondition::InsufficientStock { .. } => "insufficient_stock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(Precondition),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::PreconditionFailed(Precondition::InsufficientStock { requested, available })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::PreconditionFailed(_) => "precondition_failed",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// Only `Unavailable` is safe to retry blindly: nothing was committed for a call that never completed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

pub type CoreResult<T> = Result<T, ServiceError>;
