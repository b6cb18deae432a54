use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use orderline_core::{ErrorBody, ServiceError};

#[derive(Debug)]
pub enum AppError {
    Service(ServiceError),
    Anyhow(anyhow::Error),
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::Service(ServiceError::Internal(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                ServiceError::internal("Internal Server Error")
            }
            AppError::Service(err) => err,
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                ServiceError::internal("Internal Server Error")
            }
        };

        (status_for(&err), Json(ErrorBody::from(&err))).into_response()
    }
}

// Domain errors and body rejections keep their kind; anything else is a 500.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = match err.into().downcast::<ServiceError>() {
            Ok(service) => return Self::Service(service),
            Err(err) => err,
        };
        match err.downcast::<JsonRejection>() {
            Ok(rejection) => Self::Service(ServiceError::invalid_input(rejection.body_text())),
            Err(err) => Self::Anyhow(err),
        }
    }
}
