use std::fmt::{Debug, Formatter};

use serde::Deserialize;

use crate::error::Error;

/// Twitch application id and secret
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Create credentials from environment variables, reading `.env` first if present
    ///
    /// # Variables
    /// - `TWITCH_CLIENT_ID`: Client ID
    /// - `TWITCH_CLIENT_SECRET`: Client secret
    pub fn from_env() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        Ok(envy::prefixed("TWITCH_").from_env()?)
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_secret() {
        let creds = Credentials::new("id", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("id"));
        assert!(!debug.contains("hunter2"));
    }
}
