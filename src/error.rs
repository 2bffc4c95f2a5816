use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};
use validator::ValidationErrors;

use crate::itinerary::ItineraryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Itinerary(#[from] ItineraryError),
    #[error("upstream service failed: {0}")]
    Upstream(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

// Malformed bodies and fields are input errors, rendered like any other.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        ItineraryError::Validation(rejection.body_text()).into()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Migrate(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Itinerary(err) => match err {
                ItineraryError::InvalidRange { .. } | ItineraryError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
                ItineraryError::CityMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ItineraryError::Duplicate { .. } => StatusCode::CONFLICT,
                ItineraryError::NotFound { .. } => StatusCode::NOT_FOUND,
            },
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Itinerary(err) => err.kind(),
            AppError::Upstream(_) => "upstream",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            _ => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("request failed: {self:?}");
            if matches!(self, AppError::Upstream(_)) {
                self.to_string()
            } else {
                "internal server error".to_string()
            }
        } else {
            debug!("request rejected: {self}");
            self.to_string()
        };

        (status, Json(json!({ "error": message, "kind": self.kind() }))).into_response()
    }
}
