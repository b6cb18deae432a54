use serde::{Deserialize, Serialize};

use crate::{Precondition, ServiceError};

/// Body of a reservation or release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub quantity: i64,
}

/// JSON error body shared by every HTTP endpoint, and parsed back by remote clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        let mut body = ErrorBody {
            error: err.code().to_string(),
            message: String::new(),
            reason: None,
            requested: None,
            available: None,
        };
        match err {
            ServiceError::InvalidInput(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Unavailable(msg)
            | ServiceError::Internal(msg) => body.message = msg.clone(),
            ServiceError::PreconditionFailed(precondition) => {
                body.message = precondition.to_string();
                body.reason = Some(precondition.reason().to_string());
                if let Precondition::InsufficientStock { requested, available } = precondition {
                    body.requested = Some(*requested);
                    body.available = Some(*available);
                }
            }
        }
        body
    }
}

impl ErrorBody {
    /// Rebuild the error a remote endpoint reported. Unknown codes become `Internal`.
    pub fn into_error(self) -> ServiceError {
        match self.error.as_str() {
            "invalid_input" => ServiceError::InvalidInput(self.message),
            "not_found" => ServiceError::NotFound(self.message),
            "unavailable" => ServiceError::Unavailable(self.message),
            "precondition_failed" => match self.reason.as_deref() {
                Some("user_not_found") => ServiceError::PreconditionFailed(Precondition::UserNotFound),
                Some("item_not_found") => ServiceError::PreconditionFailed(Precondition::ItemNotFound),
                Some("insufficient_stock") => ServiceError::insufficient_stock(
                    self.requested.unwrap_or_default(),
                    self.available.unwrap_or_default(),
                ),
                _ => ServiceError::Internal(format!("unrecognised precondition: {}", self.message)),
            },
            _ => ServiceError::Internal(self.message),
        }
    }
}
