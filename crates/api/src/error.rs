//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::OrderError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed input rejected before reaching the orchestrator.
    BadRequest(String),
    /// Failure reported by an order workflow.
    Order(OrderError),
}

impl ApiError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Order(err) => order_error_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Order(err) => err.to_string(),
        };

        metrics::counter!("http_request_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Only malformed input is the caller's fault; every other failure is a
/// server error carrying its cause.
fn order_error_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        OrderError::CollaboratorUnavailable { .. } | OrderError::IdempotencyUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        OrderError::DuplicateSubmission(_)
        | OrderError::NotFound(_)
        | OrderError::OutOfStock { .. }
        | OrderError::LineAmount { .. }
        | OrderError::TotalAmount(_)
        | OrderError::Persistence(_)
        | OrderError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, ProductId};
    use domain::MoneyError;
    use order_store::StoreError;
    use orchestrator::{CollaboratorError, IdempotencyError, PublishError};

    fn status_of(err: OrderError) -> StatusCode {
        ApiError::from(err).status()
    }

    #[test]
    fn test_only_malformed_input_is_a_client_error() {
        assert_eq!(
            status_of(OrderError::InvalidRequest("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::BadRequest("bad id".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_rejected_orders_are_server_errors() {
        assert_eq!(
            status_of(OrderError::DuplicateSubmission("t".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(OrderError::NotFound(OrderId::new(1))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(OrderError::OutOfStock {
                product_id: ProductId::new(1)
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(OrderError::TotalAmount(MoneyError::Overflow)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_backend_failures_are_server_errors() {
        assert_eq!(
            status_of(OrderError::CollaboratorUnavailable {
                product_id: ProductId::new(1),
                source: CollaboratorError::TaskFailed("panic".into()),
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(OrderError::IdempotencyUnavailable(
                IdempotencyError::Unavailable("down".into())
            )),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(OrderError::Persistence(StoreError::InjectedFailure("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(OrderError::Publish(PublishError::Config("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
