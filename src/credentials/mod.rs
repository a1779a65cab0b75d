//! Loading, validating and persisting the StreamElements JWT and the twitch
//! token pair.

mod store;

use std::sync::MutexGuard;

pub use store::{CredentialStore, Tokens};

use crate::error::Error;
use crate::streamelements::Channel;
use crate::twitch::{TokenCallback, TwitchLogin};
use crate::{Locked, Shared};

pub type SharedStore = Shared<Locked<CredentialStore>>;

/// Outcome of checking a JWT against StreamElements
#[derive(Debug, Clone, PartialEq)]
pub enum JwtCheck {
    Valid(Channel),
    Rejected { error: String, message: String },
}

#[allow(async_fn_in_trait)]
pub trait JwtValidator {
    /// `Err` only for transport failures, a refused token is [`JwtCheck::Rejected`]
    async fn validate(&self, jwt: &str) -> Result<JwtCheck, Error>;
}

/// Source of a JWT when none is stored or the stored one was refused
pub trait JwtPrompt {
    fn prompt(&mut self) -> Result<String, Error>;
}

/// Reads the JWT from the terminal
pub struct ConsolePrompt;

impl JwtPrompt for ConsolePrompt {
    fn prompt(&mut self) -> Result<String, Error> {
        let jwt: String = dialoguer::Input::new()
            .with_prompt("Please enter your JWT token from StreamElements")
            .interact_text()?;
        Ok(jwt.trim().to_string())
    }
}

/// Validated StreamElements login
#[derive(Debug, Clone, PartialEq)]
pub struct StreamElementsLogin {
    pub jwt: String,
    pub channel: Channel,
}

#[derive(Debug, Clone)]
pub struct CredentialManager {
    store: SharedStore,
}

impl CredentialManager {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store: Shared::new(Locked::new(store)),
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    fn lock(store: &SharedStore) -> Result<MutexGuard<'_, CredentialStore>, Error> {
        store
            .lock()
            .map_err(|_| Error::custom("credential store lock was poisoned"))
    }

    /// Make sure a working JWT is stored, prompting until StreamElements accepts one.
    ///
    /// A refused value is dropped before prompting again and never reaches the file.
    /// The accepted value is saved right away.
    pub async fn load<P: JwtPrompt, V: JwtValidator>(
        &self,
        prompt: &mut P,
        validator: &V,
    ) -> Result<StreamElementsLogin, Error> {
        let mut candidate = Self::lock(&self.store)?.jwt_token().map(str::to_string);

        loop {
            let jwt = match candidate.take() {
                Some(jwt) => jwt,
                None => prompt.prompt()?,
            };

            match validator.validate(&jwt).await? {
                JwtCheck::Valid(channel) => {
                    println!("\nConnected to StreamElements API");
                    println!("User ID: {}", channel.id);

                    let mut store = Self::lock(&self.store)?;
                    store.set_jwt_token(jwt.clone());
                    store.save()?;
                    return Ok(StreamElementsLogin { jwt, channel });
                }
                JwtCheck::Rejected { error, message } => {
                    println!("\nConnection to StreamElements API failed");
                    println!("Error: {error}\nMessage: {message}\n");
                    log::debug!("Discarding rejected StreamElements jwt");
                    Self::lock(&self.store)?.clear_jwt_token();
                }
            }
        }
    }

    /// Authenticate `twitch` with the stored token pair, falling back to the browser
    /// login when there is no pair or twitch refuses it.
    ///
    /// The refresh handler is registered first so a pair refreshed while restoring
    /// the session is persisted too.
    pub async fn authenticate<T: TwitchLogin>(&self, twitch: &mut T) -> Result<(), Error> {
        twitch.set_refresh_callback(self.refresh_handler());

        let stored = Self::lock(&self.store)?.twitch_pair();
        if let Some((token, refresh_token)) = stored {
            match twitch.set_user_authentication(&token, &refresh_token).await {
                Ok(()) => return Ok(()),
                Err(err) => log::warn!("Stored twitch tokens were refused: {err}"),
            }
        } else {
            log::info!("No stored twitch tokens, starting browser login");
        }

        let token = twitch.authenticate_interactively().await?;
        Self::on_refresh(&self.store, &token.access_token, &token.refresh_token)
    }

    /// Persist a refreshed twitch pair. Writing the same pair twice leaves the
    /// same file behind.
    pub fn on_refresh(store: &SharedStore, token: &str, refresh_token: &str) -> Result<(), Error> {
        let mut store = Self::lock(store)?;
        store.set_twitch_pair(token, refresh_token);
        store.save()
    }

    /// Handler to register with the twitch session
    pub fn refresh_handler(&self) -> TokenCallback {
        let store = self.store.clone();
        TokenCallback::new(move |token| {
            log::info!("Twitch tokens refreshed, saving");
            Self::on_refresh(&store, &token.access_token, &token.refresh_token)
        })
    }
}
