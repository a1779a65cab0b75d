mod callback;

use std::collections::HashSet;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::net::TcpListener;
use uuid::Uuid;

pub use callback::Callback;

use super::response::{TokenResponse, Validation};
use super::Credentials;
use crate::error::Error;
use crate::response::ApiResponse;
use crate::Shared;

pub static AUTH_BASE_URL: &str = "https://id.twitch.tv/oauth2";
pub static USER_WRITE_CHAT: &str = "user:write:chat";
static SERVICE: &str = "Twitch auth";

/// Twitch user access token with the refresh token that renews it
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub scopes: HashSet<String>,
    pub expires: DateTime<Local>,
}

impl AuthToken {
    pub fn new<I, S>(access_token: &str, refresh_token: &str, scopes: I, expires_in: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            scopes: scopes.into_iter().map(|s| s.to_string()).collect(),
            expires: Local::now() + Duration::seconds(expires_in),
        }
    }

    pub fn from_validation(access_token: &str, refresh_token: &str, validation: &Validation) -> Self {
        Self::new(access_token, refresh_token, validation.scopes(), validation.expires_in)
    }

    /// Whether the token expires within `margin`
    pub fn is_expired(&self, margin: std::time::Duration) -> bool {
        self.expires - Duration::seconds(margin.as_secs() as i64) <= Local::now()
    }

    /// Time left until the token is within `margin` of expiring
    pub fn refresh_in(&self, margin: std::time::Duration) -> std::time::Duration {
        (self.expires - Duration::seconds(margin.as_secs() as i64) - Local::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }

    /// Get the auth header for the token
    pub fn to_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl From<TokenResponse> for AuthToken {
    fn from(value: TokenResponse) -> Self {
        Self::new(
            &value.access_token,
            &value.refresh_token,
            value.scope,
            value.expires_in,
        )
    }
}

/// Called with every token the session obtains by refreshing
#[derive(Clone)]
pub struct TokenCallback(pub Shared<dyn Fn(&AuthToken) -> Result<(), Error> + Send + Sync>);

impl Debug for TokenCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn<TokenCallback>()")
    }
}

impl TokenCallback {
    pub fn new<F: Fn(&AuthToken) -> Result<(), Error> + 'static + Send + Sync>(f: F) -> Self {
        Self(Shared::new(f))
    }

    pub fn call(&self, token: &AuthToken) -> Result<(), Error> {
        (self.0)(token)
    }
}

/// Ask twitch who owns `access_token`. `None` when twitch refuses the token.
pub async fn validate(
    client: &reqwest::Client,
    base_url: &str,
    access_token: &str,
) -> Result<Option<Validation>, Error> {
    let response = client
        .get(format!("{base_url}/validate"))
        .header(AUTHORIZATION, format!("OAuth {access_token}"))
        .send()
        .await?;

    if response.status() == StatusCode::UNAUTHORIZED {
        return Ok(None);
    }

    Ok(Some(ApiResponse::from_response(SERVICE, response).await?.json()?))
}

async fn request_token(
    client: &reqwest::Client,
    base_url: &str,
    form: &[(&str, &str)],
) -> Result<AuthToken, Error> {
    let response = client
        .post(format!("{base_url}/token"))
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(serde_urlencoded::to_string(form)?)
        .send()
        .await?;

    let response = ApiResponse::from_response(SERVICE, response)
        .await
        .map_err(|err| match err {
            Error::Request { error, message, .. } => Error::Auth { error, message },
            other => other,
        })?;
    let token: TokenResponse = response.json()?;
    Ok(token.into())
}

/// Exchange a refresh token for a new token pair
pub async fn refresh(
    client: &reqwest::Client,
    base_url: &str,
    credentials: &Credentials,
    refresh_token: &str,
) -> Result<AuthToken, Error> {
    log::debug!("Refreshing twitch token");
    request_token(
        client,
        base_url,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ],
    )
    .await
}

/// Authorization code flow through the user's browser
#[derive(Debug)]
pub struct UserAuthenticator {
    credentials: Credentials,
    scopes: Vec<String>,
    redirect_uri: String,
    base_url: String,
    state: Uuid,
    client: reqwest::Client,
}

impl UserAuthenticator {
    pub fn new(credentials: Credentials, scopes: Vec<String>, redirect_uri: String) -> Self {
        Self {
            credentials,
            scopes,
            redirect_uri,
            base_url: AUTH_BASE_URL.to_string(),
            state: Uuid::new_v4(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn authorization_url(&self) -> Result<String, Error> {
        Ok(format!(
            "{}/authorize?{}",
            self.base_url,
            serde_urlencoded::to_string([
                ("response_type", "code".to_string()),
                ("client_id", self.credentials.client_id.clone()),
                ("redirect_uri", self.redirect_uri.clone()),
                ("scope", self.scopes.join(" ")),
                ("state", self.state.to_string()),
                ("force_verify", "false".to_string()),
            ])?
        ))
    }

    pub async fn new_authentication_code(&self) -> Result<String, Error> {
        let uri = hyper::Uri::from_str(self.redirect_uri.as_str())?;

        // Mini http server to serve callback and parse auth code from twitch
        let addr = SocketAddr::from(([127, 0, 0, 1], uri.port_u16().unwrap_or(17563)));
        let listener = TcpListener::bind(addr).await?;
        log::debug!("Listening for the twitch redirect on {addr}");

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let callback = Callback::new(uri.path(), self.state, tx);
        let handle = tokio::task::spawn(async move {
            loop {
                let stream = match listener.accept().await {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        log::error!("Failed to accept twitch callback connection: {err}");
                        continue;
                    }
                };
                let io = hyper_util::rt::TokioIo::new(stream);

                let cb = callback.clone();
                tokio::task::spawn(async move {
                    if let Err(err) = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, cb)
                        .await
                    {
                        log::error!("Error serving connection to twitch callback: {:?}", err);
                    }
                });
            }
        });

        // Open the default browser to the twitch login page.
        // When it is successful, the callback will be triggered and the result is returned
        let url = self.authorization_url()?;
        println!("Log in to Twitch in your browser: {url}");
        if let Err(err) = open::that(&url) {
            log::warn!("Could not open a browser ({err}), open the link above manually");
        }

        let result = rx.recv().await.ok_or("Twitch did not send a response");
        handle.abort();
        result?
    }

    /// Run the browser login and exchange the code for a token pair
    pub async fn authenticate(&self) -> Result<AuthToken, Error> {
        let authentication_code = self.new_authentication_code().await?;

        request_token(
            &self.client,
            &self.base_url,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", authentication_code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
        .await
    }
}
