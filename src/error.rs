use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::render::RenderError;

#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("Not found")]
    NotFound,

    #[error("Path is outside root directory")]
    PathTraversal,

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    code: &'static str,
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        // Traversal and missing paths must produce identical responses.
        let (status, error, code) = match &self {
            FileServerError::NotFound | FileServerError::PathTraversal => {
                (StatusCode::NOT_FOUND, "Not found", "NOT_FOUND")
            }
            FileServerError::Render(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to render listing",
                "RENDER_ERROR",
            ),
            FileServerError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "IO_ERROR",
            ),
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        (status, Json(ErrorResponse { error, code })).into_response()
    }
}
