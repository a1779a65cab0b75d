use std::convert::Infallible;

use html_to_string_macro::html;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub(crate) struct AuthCodeResponse {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub state: Option<String>,
}

/// Serves the OAuth redirect and hands the authorization code back to the flow
#[derive(Clone)]
pub struct Callback {
    pub path: String,
    pub state: String,
    pub tx: UnboundedSender<Result<String, Error>>,
}

macro_rules! layout {
    ($($html: tt)*) => {
        layout(html! { $($html)*})
    };
}

fn page(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

impl Callback {
    pub fn new<S: Into<String>>(path: S, state: Uuid, tx: UnboundedSender<Result<String, Error>>) -> Self {
        Self {
            path: path.into(),
            state: state.to_string(),
            tx,
        }
    }

    /// Parse the redirect query into an authorization code.
    ///
    /// `None` for requests that don't belong to this login: no query at all or a
    /// foreign state.
    pub(crate) fn parse(query: Option<&str>, state: &str) -> Option<Result<String, Error>> {
        let response: AuthCodeResponse = match serde_qs::from_str(query?) {
            Ok(response) => response,
            Err(err) => return Some(Err(err.into())),
        };

        // Validate State for cross-site request forgery
        if response.state.as_deref() != Some(state) {
            log::warn!("Ignoring twitch redirect with an unexpected state");
            return None;
        }

        if let Some(error) = response.error {
            return Some(Err(Error::Auth {
                error,
                message: response.error_description.unwrap_or_default(),
            }));
        }

        Some(response.code.ok_or_else(|| Error::Auth {
            error: String::from("missing_code"),
            message: String::from("OAuth redirect carried no authorization code"),
        }))
    }
}

impl Service<Request<Incoming>> for Callback {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        if req.method() != Method::GET || req.uri().path() != self.path {
            return Box::pin(async {
                Ok(page(
                    StatusCode::NOT_FOUND,
                    layout! {
                        <h1>"404 Page not found"</h1>
                    },
                ))
            });
        }

        let Some(result) = Callback::parse(req.uri().query(), &self.state) else {
            return Box::pin(async {
                Ok(page(
                    StatusCode::BAD_REQUEST,
                    layout! {
                        <h1>"This page does not belong to a pending Twitch login"</h1>
                        <h3>"Finish the login in the tab opened by Mediashare Autoskip"</h3>
                    },
                ))
            });
        };

        let response = match &result {
            Ok(_) => page(
                StatusCode::OK,
                layout! {
                   <h1>
                       "Successfully connected Mediashare Autoskip to "
                       <span class="purple">"Twitch"</span>
                   </h1>
                   <h3>"This tab may now be closed"</h3>
                },
            ),
            Err(err) => page(
                StatusCode::BAD_REQUEST,
                layout! {
                    <h1>"Twitch login failed"</h1>
                    <h3>{err.to_string()}</h3>
                },
            ),
        };

        let _ = self.tx.send(result);
        Box::pin(async move { Ok(response) })
    }
}

fn layout(body: String) -> String {
    html! {
        <html>
            <head>
                <title>"Mediashare Autoskip"</title>
                <style>"
                * {
                    box-sizing: border-box
                }
                html {
                    font-family: Arial;
                    background-color: #18181B;
                    color: #EFEFF1
                }
                :is(h1, h3) {
                    text-align: center;
                }
                body {
                    padding: 1.5rem;
                }
                .purple {
                    color: #9146FF
                }
                "</style>
            </head>
            <body>
                {body}
            </body>
        </html>
    }
}
