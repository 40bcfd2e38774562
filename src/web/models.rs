//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

/// Body returned by every motion route and by failed camera requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "OK".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "Error".to_string(),
            message: message.into(),
        }
    }
}

/// Body of `POST /drive`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DriveRequest {
    pub left: f32,
    pub right: f32,
}
