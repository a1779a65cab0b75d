use std::fmt::{Display, Formatter};

use color_eyre::{Report, Section};
pub use color_eyre::Result;

/// Errors raised while talking to StreamElements or Twitch, or while
/// reading and writing local state.
#[derive(Debug)]
pub enum Error {
    /// Non-success response from a remote API
    Request {
        code: u16,
        error: String,
        message: String,
    },
    /// Rejected credentials or a failed OAuth exchange
    Auth { error: String, message: String },
    Config(String),
    Io(std::io::Error),
    Http(reqwest::Error),
    Json(serde_json::Error),
    Custom(String),
}

impl Error {
    pub fn custom<S: Display>(message: S) -> Self {
        Self::Custom(message.to_string())
    }

    /// Status code of a failed remote request, if that is what this error is
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { code, .. } => Some(*code),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request {
                code,
                error,
                message,
            } => write!(f, "[{code}] {error}: {message}"),
            Self::Auth { error, message } => write!(f, "authentication failed: {error}: {message}"),
            Self::Config(message) => write!(f, "invalid configuration: {message}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Http(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "malformed response: {err}"),
            Self::Custom(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for Error {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        Self::Custom(format!("malformed response at `{}`: {}", value.path(), value.inner()))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(value: serde_urlencoded::ser::Error) -> Self {
        Self::Custom(value.to_string())
    }
}

impl From<serde_qs::Error> for Error {
    fn from(value: serde_qs::Error) -> Self {
        Self::Custom(value.to_string())
    }
}

impl From<envy::Error> for Error {
    fn from(value: envy::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<dialoguer::Error> for Error {
    fn from(value: dialoguer::Error) -> Self {
        match value {
            dialoguer::Error::IO(err) => Self::Io(err),
        }
    }
}

impl From<hyper::http::uri::InvalidUri> for Error {
    fn from(value: hyper::http::uri::InvalidUri) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::Custom(value.to_string())
    }
}

impl Error {
    /// Convert into a report carrying a hint for the user
    pub fn into_report(self) -> Report {
        let suggestion = match &self {
            Error::Auth { .. } => "Delete the twitch tokens from the credentials file and log in again",
            Error::Config(_) => "Check config.yml and the TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET variables",
            _ => "Try again later",
        };
        Report::new(self).suggestion(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_display() {
        let err = Error::Request {
            code: 401,
            error: "Unauthorized".into(),
            message: "invalid token".into(),
        };
        assert_eq!(err.to_string(), "[401] Unauthorized: invalid token");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn custom_has_no_status() {
        assert_eq!(Error::custom("nope").status(), None);
    }
}
