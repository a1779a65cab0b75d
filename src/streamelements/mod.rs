//! Read-only client for the StreamElements song request ("mediashare") api

pub mod response;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;

pub use response::Channel;

use crate::credentials::{JwtCheck, JwtValidator};
use crate::error::Error;
use crate::poller::PlaybackSource;
use crate::response::{ApiResponse, ErrorBody};

pub static API_BASE_URL: &str = "https://api.streamelements.com/kappa/v2/";
static SERVICE: &str = "StreamElements";

/// Build the api url for `endpoint`, substituting the `:channel` placeholder
pub fn url(endpoint: &str, channel: Option<&str>) -> Result<String, Error> {
    if endpoint.contains(":channel") {
        let channel = channel.ok_or_else(|| Error::custom(format!("`{endpoint}` needs a channel id")))?;
        return Ok(format!("{API_BASE_URL}{}", endpoint.replace(":channel", channel)));
    }
    Ok(format!("{API_BASE_URL}{endpoint}"))
}

fn get(client: &reqwest::Client, url: String, jwt: &str) -> reqwest::RequestBuilder {
    client
        .get(url)
        .header(AUTHORIZATION, format!("Bearer {jwt}"))
        .header(ACCEPT, "application/json; charset=utf-8")
}

/// Authenticated view of one channel's song request queue
#[derive(Debug, Clone)]
pub struct StreamElements {
    client: reqwest::Client,
    jwt: String,
    channel: String,
}

impl StreamElements {
    pub fn new<S1: Into<String>, S2: Into<String>>(jwt: S1, channel: S2) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwt: jwt.into(),
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn request(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<ApiResponse, Error> {
        let url = url(endpoint, Some(&self.channel))?;
        let response = get(&self.client, url, &self.jwt).query(params).send().await?;
        ApiResponse::from_response(SERVICE, response).await
    }

    /// Id of the song currently loaded in the mediashare player
    pub async fn playing(&self) -> Result<Option<String>, Error> {
        let playing: Option<response::Playing> = self
            .request("songrequest/:channel/playing", &[])
            .await?
            .json()?;
        Ok(playing.and_then(|p| p.id))
    }

    /// Id of the most recently finished song
    pub async fn last_played(&self) -> Result<Option<String>, Error> {
        let history: response::History = self
            .request("songrequest/:channel/history", &[("limit", "1")])
            .await?
            .json()?;
        Ok(history.history.into_iter().next().map(|entry| entry.song.id))
    }

    /// Next song waiting in the queue, `None` when the queue is empty
    pub async fn next(&self) -> Result<Option<Value>, Error> {
        let next: response::Next = self.request("songrequest/:channel/next", &[]).await?.json()?;
        Ok(next.song.filter(|song| !song.is_null()))
    }
}

impl PlaybackSource for StreamElements {
    async fn current_id(&self) -> Result<Option<String>, Error> {
        self.playing().await
    }

    async fn last_history_id(&self) -> Result<Option<String>, Error> {
        self.last_played().await
    }

    async fn next_song(&self) -> Result<Option<Value>, Error> {
        self.next().await
    }
}

/// Checks a JWT against `channels/me`
#[derive(Debug, Clone, Default)]
pub struct JwtCheckClient {
    client: reqwest::Client,
}

impl JwtCheckClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JwtValidator for JwtCheckClient {
    async fn validate(&self, jwt: &str) -> Result<JwtCheck, Error> {
        let response = get(&self.client, url("channels/me", None)?, jwt).send().await?;
        let status = response.status();

        if status == StatusCode::OK {
            let channel: Channel = ApiResponse::from_response(SERVICE, response).await?.json()?;
            return Ok(JwtCheck::Valid(channel));
        }

        let body = response.text().await?;
        log::debug!("{SERVICE} rejected jwt with [{status}] {body}");
        let details: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        Ok(JwtCheck::Rejected {
            error: details
                .error
                .unwrap_or_else(|| status.to_string()),
            message: details.message.unwrap_or(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_substitutes_channel() {
        assert_eq!(
            url("songrequest/:channel/playing", Some("123")).unwrap(),
            "https://api.streamelements.com/kappa/v2/songrequest/123/playing"
        );
    }

    #[test]
    fn url_without_placeholder() {
        assert_eq!(
            url("channels/me", None).unwrap(),
            "https://api.streamelements.com/kappa/v2/channels/me"
        );
    }

    #[test]
    fn url_requires_channel_for_placeholder() {
        assert!(url("songrequest/:channel/next", None).is_err());
    }
}
