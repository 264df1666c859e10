//! Common error types for the colorization service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::bridge::ColorizeError;
use crate::imaging::decoder::DecodeError;
use crate::model::InitError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request body failed validation before any decoding took place
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Colorization failed: {0}")]
    ModelUnavailable(#[from] InitError),

    #[error("{}", colorize_message(.0))]
    Colorize(#[from] ColorizeError),

    #[error("Failed to encode colorized image: {0}")]
    Encoding(#[source] image::ImageError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn colorize_message(err: &ColorizeError) -> String {
    match err {
        ColorizeError::EmptyResult => {
            "Failed to colorize image. Colorization backend returned no image.".to_string()
        }
        other => format!("Colorization failed: {}", other),
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::Decode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short cause tag used in server-side logs
    fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => "internal",
            AppError::InvalidRequest(_) | AppError::Decode(_) => "client_input",
            AppError::ModelUnavailable(InitError::WeightsMissing { .. }) => "model_weights_missing",
            AppError::ModelUnavailable(_) => "model_unavailable",
            AppError::Colorize(_) => "colorization_failed",
            AppError::Encoding(_) => "encoding",
        }
    }

    /// Message returned to the client
    pub fn client_message(&self) -> String {
        match self {
            AppError::Config(_) | AppError::Io(_) => format!("Internal server error: {}", self),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(kind = self.kind(), error = ?self, "Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.client_message(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
