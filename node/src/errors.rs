// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rewind_core::error::{RecoveryError, SessionError, StoreError};
use rewind_persistence::PersistenceError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Snapshot error: {0}")]
    Store(#[from] StoreError),
    #[error("Companion handshake incomplete, restore refused")]
    NotSafe,
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Operation not supported by the {0} strategy")]
    Unsupported(&'static str),
    #[error("Unknown parameter: {0}")]
    UnknownParam(String),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RecoveryError> for NodeError {
    fn from(e: RecoveryError) -> Self {
        match e {
            RecoveryError::Store(e) => NodeError::Store(e),
            RecoveryError::Session(e) => NodeError::Session(e),
            RecoveryError::NotSafe => NodeError::NotSafe,
        }
    }
}

impl NodeError {
    pub fn status(&self) -> StatusCode {
        match self {
            NodeError::Session(SessionError::DeviceUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::Session(SessionError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::Session(SessionError::InvalidDuration) => StatusCode::BAD_REQUEST,
            NodeError::Session(_) => StatusCode::CONFLICT,
            NodeError::Store(StoreError::AlreadyUsed) => StatusCode::CONFLICT,
            NodeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::NotSafe => StatusCode::CONFLICT,
            NodeError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::Unsupported(_) => StatusCode::BAD_REQUEST,
            NodeError::UnknownParam(_) => StatusCode::NOT_FOUND,
            NodeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
