use serde::{Deserialize, Serialize};

/// Body of `POST oauth2/token` for both the authorization code and the refresh grant
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Vec<String>,
}

/// Body of `GET oauth2/validate`
#[derive(Debug, Clone, Deserialize)]
pub struct Validation {
    pub client_id: String,
    pub login: String,
    pub user_id: String,
    /// `null` for tokens without any scope
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    pub expires_in: i64,
}

impl Validation {
    pub fn scopes(&self) -> &[String] {
        self.scopes.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct SendChatMessage<'a> {
    pub broadcaster_id: &'a str,
    pub sender_id: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropReason {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: String,
    pub is_sent: bool,
    pub drop_reason: Option<DropReason>,
}

#[derive(Debug, Deserialize)]
pub struct Data<T> {
    pub data: Vec<T>,
}
