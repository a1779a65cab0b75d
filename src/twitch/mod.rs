//! Twitch user authentication and Helix chat

pub mod auth;
mod credentials;
pub mod response;

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub use auth::{AuthToken, TokenCallback, UserAuthenticator, AUTH_BASE_URL, USER_WRITE_CHAT};
pub use credentials::Credentials;

use crate::config::Config;
use crate::error::Error;
use crate::poller::ChatSink;
use crate::response::ApiResponse;
use crate::Shared;
use response::{Data, SendChatMessage, SentMessage, Validation};

pub static HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";
static SERVICE: &str = "Twitch";

/// Twitch asks apps to validate user tokens at least once an hour
const VALIDATE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Account the session is logged in as
#[derive(Debug, Clone, PartialEq)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
}

/// The login steps the credential manager drives
#[allow(async_fn_in_trait)]
pub trait TwitchLogin {
    fn set_refresh_callback(&mut self, callback: TokenCallback);
    async fn set_user_authentication(&mut self, token: &str, refresh_token: &str) -> Result<(), Error>;
    async fn authenticate_interactively(&mut self) -> Result<AuthToken, Error>;
}

/// Renews the shared token and reports every new pair to the registered callback
#[derive(Debug, Clone)]
struct TokenRefresher {
    client: reqwest::Client,
    auth_base_url: String,
    credentials: Credentials,
    token: Shared<RwLock<Option<AuthToken>>>,
    callback: Option<TokenCallback>,
}

impl TokenRefresher {
    async fn refresh(&self) -> Result<AuthToken, Error> {
        let refresh_token = self
            .token
            .read()
            .await
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .ok_or_else(|| Error::custom("twitch session is not authenticated"))?;

        let token =
            auth::refresh(&self.client, &self.auth_base_url, &self.credentials, &refresh_token).await?;
        *self.token.write().await = Some(token.clone());

        if let Some(callback) = &self.callback {
            callback.call(&token)?;
        }
        Ok(token)
    }

    /// Decide whether the current token has to be renewed now
    async fn needs_refresh(&self, margin: Duration) -> bool {
        let current = self.token.read().await.clone();
        let Some(current) = current else {
            return false;
        };

        if current.is_expired(margin) {
            return true;
        }

        match auth::validate(&self.client, &self.auth_base_url, &current.access_token).await {
            Ok(Some(_)) => false,
            Ok(None) => {
                log::warn!("Twitch revoked the access token");
                true
            }
            Err(err) => {
                log::warn!("Failed to validate twitch access token: {err}");
                false
            }
        }
    }

    /// Background task: wake up before the token expires (or hourly) and renew it
    async fn run(self, margin: Duration) {
        loop {
            let wait = match self.token.read().await.as_ref() {
                Some(token) => token.refresh_in(margin).min(VALIDATE_INTERVAL),
                None => VALIDATE_INTERVAL,
            };
            tokio::time::sleep(wait).await;

            if !self.needs_refresh(margin).await {
                continue;
            }

            match self.refresh().await {
                Ok(_) => log::info!("Refreshed twitch access token"),
                Err(err) => {
                    log::error!("Failed to refresh twitch access token: {err}");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}

/// Authenticated twitch user session
#[derive(Debug)]
pub struct TwitchSession {
    refresher: TokenRefresher,
    helix_base_url: String,
    scopes: Vec<String>,
    redirect_uri: String,
    refresh_margin: Duration,
    user: Option<TwitchUser>,
    refresh_task: Option<JoinHandle<()>>,
}

impl TwitchSession {
    pub fn new(credentials: Credentials, config: &Config) -> Self {
        Self {
            refresher: TokenRefresher {
                client: reqwest::Client::new(),
                auth_base_url: AUTH_BASE_URL.to_string(),
                credentials,
                token: Shared::new(RwLock::new(None)),
                callback: None,
            },
            helix_base_url: HELIX_BASE_URL.to_string(),
            scopes: vec![USER_WRITE_CHAT.to_string()],
            redirect_uri: config.redirect_uri(),
            refresh_margin: config.refresh_margin(),
            user: None,
            refresh_task: None,
        }
    }

    /// Point the session at other OAuth and Helix hosts
    pub fn with_base_urls<A: Into<String>, H: Into<String>>(mut self, auth: A, helix: H) -> Self {
        self.refresher.auth_base_url = auth.into();
        self.helix_base_url = helix.into();
        self
    }

    pub fn user(&self) -> Option<&TwitchUser> {
        self.user.as_ref()
    }

    pub async fn token(&self) -> Option<AuthToken> {
        self.refresher.token.read().await.clone()
    }

    /// Register the handler called with every refreshed token pair
    pub fn set_refresh_callback(&mut self, callback: TokenCallback) {
        self.refresher.callback = Some(callback);
        if self.refresh_task.is_some() {
            self.start_refresh_task();
        }
    }

    fn start_refresh_task(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        let refresher = self.refresher.clone();
        self.refresh_task = Some(tokio::spawn(refresher.run(self.refresh_margin)));
    }

    async fn authenticated(&mut self, token: AuthToken, validation: Validation) -> Result<(), Error> {
        let missing = self
            .scopes
            .iter()
            .filter(|scope| !validation.scopes().contains(scope))
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Error::Auth {
                error: String::from("missing_scope"),
                message: format!("token lacks the scopes {}", missing.join(", ")),
            });
        }

        log::debug!("Authenticated twitch user {} ({})", validation.login, validation.user_id);
        self.user = Some(TwitchUser {
            id: validation.user_id,
            login: validation.login,
        });
        *self.refresher.token.write().await = Some(token);
        self.start_refresh_task();
        Ok(())
    }

    async fn validated(&self, access_token: &str) -> Result<Validation, Error> {
        auth::validate(&self.refresher.client, &self.refresher.auth_base_url, access_token)
            .await?
            .ok_or_else(|| Error::Auth {
                error: String::from("invalid_token"),
                message: String::from("twitch refused a freshly issued token"),
            })
    }

    /// Restore the session from a stored token pair.
    ///
    /// A refused access token is refreshed once with `refresh_token`, which reports
    /// the new pair to the refresh callback.
    pub async fn set_user_authentication(&mut self, token: &str, refresh_token: &str) -> Result<(), Error> {
        *self.refresher.token.write().await = Some(AuthToken::new(token, refresh_token, &self.scopes, 0));

        let validation = auth::validate(&self.refresher.client, &self.refresher.auth_base_url, token).await?;
        let (token, validation) = match validation {
            Some(validation) => (
                AuthToken::from_validation(token, refresh_token, &validation),
                validation,
            ),
            None => {
                log::info!("Stored twitch access token expired, refreshing");
                let token = self.refresher.refresh().await?;
                let validation = self.validated(&token.access_token).await?;
                (token, validation)
            }
        };

        self.authenticated(token, validation).await
    }

    /// Log in through the browser and return the issued token pair
    pub async fn authenticate_interactively(&mut self) -> Result<AuthToken, Error> {
        let authenticator = UserAuthenticator::new(
            self.refresher.credentials.clone(),
            self.scopes.clone(),
            self.redirect_uri.clone(),
        )
        .with_base_url(self.refresher.auth_base_url.as_str());
        let token = authenticator.authenticate().await?;
        let validation = self.validated(&token.access_token).await?;
        self.authenticated(token.clone(), validation).await?;
        Ok(token)
    }

    async fn post_chat(&self, body: &SendChatMessage<'_>) -> Result<ApiResponse, Error> {
        let token = self
            .token()
            .await
            .ok_or_else(|| Error::custom("twitch session is not authenticated"))?;

        let response = self
            .refresher
            .client
            .post(format!("{}/chat/messages", self.helix_base_url))
            .header(AUTHORIZATION, token.to_header())
            .header("Client-Id", &self.refresher.credentials.client_id)
            .json(body)
            .send()
            .await?;

        ApiResponse::from_response(SERVICE, response).await
    }

    /// Send `message` to `broadcaster_id`'s chat. A refused token is refreshed and
    /// the message sent once more.
    pub async fn send_chat_message(
        &self,
        broadcaster_id: &str,
        sender_id: &str,
        message: &str,
    ) -> Result<SentMessage, Error> {
        if self.token().await.is_some_and(|t| t.is_expired(Duration::ZERO)) {
            self.refresher.refresh().await?;
        }

        let body = SendChatMessage {
            broadcaster_id,
            sender_id,
            message,
        };
        let response = match self.post_chat(&body).await {
            Err(err) if err.status() == Some(401) => {
                log::warn!("Twitch refused the access token, refreshing");
                self.refresher.refresh().await?;
                self.post_chat(&body).await?
            }
            other => other?,
        };

        let sent: Data<SentMessage> = response.json()?;
        let sent = sent
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::custom("twitch did not report the sent message"))?;

        if !sent.is_sent {
            match &sent.drop_reason {
                Some(reason) => log::warn!("Twitch dropped chat message `{message}`: {} ({})", reason.message, reason.code),
                None => log::warn!("Twitch dropped chat message `{message}`"),
            }
        }
        Ok(sent)
    }

    /// Stop the background refresh. The stored token pair stays valid.
    pub async fn close(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
            let _ = task.await;
        }
        if let Some(user) = self.user.take() {
            log::info!("Closed twitch session for {}", user.login);
        }
    }
}

impl Drop for TwitchSession {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

impl TwitchLogin for TwitchSession {
    fn set_refresh_callback(&mut self, callback: TokenCallback) {
        TwitchSession::set_refresh_callback(self, callback)
    }

    async fn set_user_authentication(&mut self, token: &str, refresh_token: &str) -> Result<(), Error> {
        TwitchSession::set_user_authentication(self, token, refresh_token).await
    }

    async fn authenticate_interactively(&mut self) -> Result<AuthToken, Error> {
        TwitchSession::authenticate_interactively(self).await
    }
}

impl ChatSink for TwitchSession {
    /// Post into the logged in user's own chat
    async fn send_chat(&self, message: &str) -> Result<(), Error> {
        let user = self
            .user()
            .ok_or_else(|| Error::custom("twitch session is not authenticated"))?;
        self.send_chat_message(&user.id, &user.id, message).await?;
        Ok(())
    }
}
