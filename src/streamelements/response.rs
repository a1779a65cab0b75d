use serde::Deserialize;
use serde_json::Value;

/// Channel owning the JWT, as returned by `channels/me`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Channel {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// Body of `songrequest/:channel/playing`. The endpoint answers `null` or `{}`
/// when nothing is loaded in the player.
#[derive(Debug, Default, Deserialize)]
pub struct Playing {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Song {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub song: Song,
}

/// Body of `songrequest/:channel/history`
#[derive(Debug, Default, Deserialize)]
pub struct History {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Body of `songrequest/:channel/next`
#[derive(Debug, Default, Deserialize)]
pub struct Next {
    #[serde(default)]
    pub song: Option<Value>,
}
