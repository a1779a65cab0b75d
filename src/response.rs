use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::Error;
use crate::logging::ResponseLogger;

/// Error body shared by StreamElements (`statusCode`) and twitch (`status`)
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Successful response body, kept as text until the caller picks a type for it
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// Read the full response, turning any non-success status into [`Error::Request`]
    pub async fn from_response(service: &str, response: reqwest::Response) -> Result<Self, Error> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(Self { status, body });
        }

        ResponseLogger::log_error(service, status, &body);
        let details: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        Err(Error::Request {
            code: status.as_u16(),
            error: details
                .error
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| String::from("Unknown")),
            message: details
                .message
                .unwrap_or_else(|| format!("{service} request failed")),
        })
    }

    /// Deserialize the body, reporting the json path that failed to parse
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let deserializer = &mut serde_json::Deserializer::from_str(&self.body);
        Ok(serde_path_to_error::deserialize(deserializer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Outer {
        #[allow(dead_code)]
        inner: Inner,
    }

    #[derive(Debug, Deserialize)]
    struct Inner {
        #[allow(dead_code)]
        id: String,
    }

    #[test]
    fn json_reports_failing_path() {
        let response = ApiResponse {
            status: StatusCode::OK,
            body: r#"{"inner":{"id":5}}"#.to_string(),
        };
        let err = response.json::<Outer>().unwrap_err();
        assert!(err.to_string().contains("inner.id"), "{err}");
    }

    #[test]
    fn error_body_accepts_either_service_shape() {
        let se: ErrorBody =
            serde_json::from_str(r#"{"statusCode":401,"error":"Unauthorized","message":"invalid jwt"}"#).unwrap();
        assert_eq!(se.error.as_deref(), Some("Unauthorized"));

        let twitch: ErrorBody = serde_json::from_str(r#"{"status":400,"message":"Invalid refresh token"}"#).unwrap();
        assert_eq!(twitch.error, None);
        assert_eq!(twitch.message.as_deref(), Some("Invalid refresh token"));
    }
}
