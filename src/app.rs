use crate::config::Config;
use crate::credentials::{ConsolePrompt, CredentialManager, CredentialStore};
use crate::error::Error;
use crate::media_key::SystemMediaKeys;
use crate::poller::{ChatSink, Poller};
use crate::streamelements::{JwtCheckClient, StreamElements};
use crate::twitch::{Credentials, TwitchSession};

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Log in to both services and poll until Ctrl+C.
    ///
    /// The twitch session is closed however the poll loop ends.
    pub async fn run(self) -> Result<(), Error> {
        let credentials = Credentials::from_env()?;
        let manager = CredentialManager::new(CredentialStore::load(&self.config.credentials_path)?);

        let login = manager.load(&mut ConsolePrompt, &JwtCheckClient::new()).await?;
        let streamelements = StreamElements::new(login.jwt, login.channel.id);

        println!("\nConnecting to Twitch");
        let mut twitch = TwitchSession::new(credentials, &self.config);

        let result = tokio::select! {
            result = self.session(&manager, &mut twitch, streamelements) => result,
            _ = tokio::signal::ctrl_c() => {
                log::debug!("Interrupted");
                Ok(())
            }
        };

        twitch.close().await;
        result
    }

    async fn session(
        &self,
        manager: &CredentialManager,
        twitch: &mut TwitchSession,
        streamelements: StreamElements,
    ) -> Result<(), Error> {
        manager.authenticate(twitch).await?;

        let user = twitch
            .user()
            .cloned()
            .ok_or_else(|| Error::custom("twitch session has no user after login"))?;
        println!("Connected to chatroom: {}", user.login);
        twitch.send_chat(&self.config.connect_message).await?;

        let mut poller = Poller::new(streamelements, &*twitch, SystemMediaKeys, &self.config);
        poller.run().await
    }
}
