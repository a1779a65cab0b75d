use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The `tokens` section of the credentials file
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch_refresh_token: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    tokens: Tokens,
    /// Sections this program does not own, written back untouched
    #[serde(flatten)]
    other: BTreeMap<String, serde_yaml::Value>,
}

/// Credentials persisted between runs. Every `save` rewrites the whole file.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    file: CredentialFile,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl CredentialStore {
    /// Read the store at `path`. A missing file is an empty store.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, Error> {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => CredentialFile::default(),
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No credentials at {}, starting empty", path.display());
                CredentialFile::default()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, file })
    }

    pub fn save(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yaml::to_string(&self.file)?)?;
        log::debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tokens(&self) -> &Tokens {
        &self.file.tokens
    }

    pub fn jwt_token(&self) -> Option<&str> {
        non_empty(&self.file.tokens.jwt_token)
    }

    pub fn set_jwt_token<S: Into<String>>(&mut self, token: S) {
        self.file.tokens.jwt_token = Some(token.into());
    }

    pub fn clear_jwt_token(&mut self) {
        self.file.tokens.jwt_token = None;
    }

    /// Stored twitch access and refresh token, only when both are present
    pub fn twitch_pair(&self) -> Option<(String, String)> {
        let token = non_empty(&self.file.tokens.twitch_token)?;
        let refresh = non_empty(&self.file.tokens.twitch_refresh_token)?;
        Some((token.to_string(), refresh.to_string()))
    }

    pub fn set_twitch_pair<S1: Into<String>, S2: Into<String>>(&mut self, token: S1, refresh_token: S2) {
        self.file.tokens.twitch_token = Some(token.into());
        self.file.tokens.twitch_refresh_token = Some(refresh_token.into());
    }
}

#[cfg(test)]
pub(crate) fn temp_path() -> PathBuf {
    std::env::temp_dir()
        .join("mediashare-autoskip-tests")
        .join(format!("{}.yml", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let store = CredentialStore::load(temp_path()).unwrap();
        assert_eq!(store.tokens(), &Tokens::default());
        assert!(store.twitch_pair().is_none());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path();
        let mut store = CredentialStore::load(&path).unwrap();
        store.set_jwt_token("jwt");
        store.set_twitch_pair("access", "refresh");
        store.save().unwrap();

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.jwt_token(), Some("jwt"));
        assert_eq!(store.twitch_pair(), Some(("access".into(), "refresh".into())));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn blank_values_count_as_missing() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "tokens:\n  jwt_token: ''\n  twitch_token: abc\n").unwrap();

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.jwt_token(), None);
        assert!(store.twitch_pair().is_none());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn unknown_sections_survive_a_rewrite() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "tokens:\n  jwt_token: jwt\nobs:\n  scene: main\n").unwrap();

        let mut store = CredentialStore::load(&path).unwrap();
        store.set_twitch_pair("a", "b");
        store.save().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("scene: main"), "{contents}");
        std::fs::remove_file(path).unwrap();
    }
}
