//! Wire payloads of the question backend.

use serde::{Deserialize, Serialize};

/// `POST /users/login` body.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

/// `POST /users/login` success body.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    #[allow(dead_code)] // informational only
    pub message: String,
    #[serde(default)]
    pub token: String,
}

/// `POST /ask` body.
#[derive(Debug, Serialize)]
pub(crate) struct AskRequest<'a> {
    pub chat_room_id: &'a str,
    pub request: &'a str,
}

/// `POST /ask` body on 200.
#[derive(Debug, Deserialize)]
pub(crate) struct AskAccepted {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
}

/// `POST /ask` body on 400.
#[derive(Debug, Deserialize)]
pub(crate) struct AskRejected {
    #[serde(default)]
    pub message: String,
    /// Sent as a string by current backends, kept loose.
    #[serde(default)]
    pub status: serde_json::Value,
}

/// `GET /get/gpt/responce` body. The misspelling is the backend's.
#[derive(Debug, Deserialize)]
pub(crate) struct FinalAnswer {
    #[serde(rename = "responce", default)]
    pub response: String,
}
