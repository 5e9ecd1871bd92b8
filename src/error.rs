use crate::observability::{QueryError, StoreError};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// A required query parameter is absent
    #[error("Missing parameter")]
    MissingParameter,
    /// `page` is not a non-negative integer
    #[error("Malformed page")]
    MalformedPage,
    /// `day` is not a JSON `{day, month, year}` naming a real date
    #[error("Malformed day")]
    MalformedDay,
    /// Authentication error
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Log store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    /// Internal server error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter | Self::MalformedPage | Self::MalformedDay => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Storage(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            // Client input errors answer with a short plain-text reason
            Self::MissingParameter | Self::MalformedPage | Self::MalformedDay => {
                (status, self.to_string()).into_response()
            }
            Self::Unauthorized(msg) => (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"log viewer\"")],
                Json(json!({
                    "error": {
                        "message": msg,
                        "type": error_type_name(&self),
                    }
                })),
            )
                .into_response(),
            Self::Storage(_) | Self::InternalError(_) => {
                tracing::error!(error = %self, "Request failed");
                let body = Json(json!({
                    "error": {
                        "message": self.to_string(),
                        "type": error_type_name(&self),
                    }
                }));
                (status, body).into_response()
            }
        }
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::MissingParameter => "missing_parameter",
        AppError::MalformedPage => "malformed_page",
        AppError::MalformedDay => "malformed_day",
        AppError::Unauthorized(_) => "unauthorized",
        AppError::Storage(_) => "storage_error",
        AppError::InternalError(_) => "internal_error",
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidDay(_) => Self::MalformedDay,
            QueryError::Store(e) => Self::Storage(e),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Day;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_error_display() {
        assert_eq!(AppError::MissingParameter.to_string(), "Missing parameter");
        assert_eq!(AppError::MalformedPage.to_string(), "Malformed page");
        assert_eq!(AppError::MalformedDay.to_string(), "Malformed day");
    }

    #[test]
    fn test_error_type_name() {
        assert_eq!(error_type_name(&AppError::Unauthorized("test".to_string())), "unauthorized");
        assert_eq!(error_type_name(&AppError::MalformedDay), "malformed_day");
    }

    #[test]
    fn test_invalid_day_maps_to_malformed_day() {
        let error: AppError = QueryError::InvalidDay(Day::new(2023, 2, 30)).into();
        assert!(matches!(error, AppError::MalformedDay));
    }

    #[tokio::test]
    async fn test_client_errors_are_plain_text_400() {
        let response = AppError::MalformedPage.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Malformed page");
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let response = AppError::Unauthorized("Invalid credentials".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
}
