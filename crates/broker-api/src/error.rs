use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use csi_broker::{BrokerError, ErrorCategory};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Error body returned on every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub description: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    description: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Log `err` at a level matching its category and convert it.
    pub fn logged(operation: &'static str, err: BrokerError) -> Self {
        match err.category() {
            ErrorCategory::Plugin | ErrorCategory::Persistence | ErrorCategory::Internal => {
                error!(operation, code = err.code(), error = %err, "request failed")
            }
            _ => warn!(operation, code = err.code(), error = %err, "request rejected"),
        }
        err.into()
    }
}

pub fn status_for(err: &BrokerError) -> StatusCode {
    match err {
        BrokerError::AppGuidNotProvided => StatusCode::UNPROCESSABLE_ENTITY,
        _ => match err.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::NotFound => StatusCode::GONE,
            ErrorCategory::Plugin => StatusCode::BAD_GATEWAY,
            ErrorCategory::Unsupported => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Persistence | ErrorCategory::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        Self {
            status: status_for(&err),
            code: err.code(),
            description: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "MalformedRequest",
            description: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "MalformedRequest",
            description: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code.to_string(),
            description: self.description,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csi_broker::RegistryError;
    use tracing_test::traced_test;

    #[test]
    fn statuses_follow_categories() {
        assert_eq!(
            status_for(&BrokerError::InvalidParameters("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&BrokerError::AppGuidNotProvided),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&BrokerError::InstanceAlreadyExists("i".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&BrokerError::BindingDoesNotExist("b".into())),
            StatusCode::GONE
        );
        assert_eq!(
            status_for(&BrokerError::Registry(RegistryError::UnknownService("s".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&BrokerError::Unsupported("update")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn api_error_carries_stable_code() {
        let err = ApiError::from(BrokerError::MissingField("plan_id"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "MissingField");
    }

    #[traced_test]
    #[test]
    fn rejected_requests_are_logged_with_their_code() {
        let err = ApiError::logged("bind", BrokerError::AppGuidNotProvided);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(logs_contain("request rejected"));
        assert!(logs_contain("RequiresApp"));
    }
}
