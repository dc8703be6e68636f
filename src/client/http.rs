//! HTTP transport for the client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::domain::{Error, User};
use crate::transport::http::{CreateUserRequest, ErrorResponse, USERS_PATH};

use super::Transport;

/// Talks to the HTTP API with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::internal().with_cause(e))
    }

    /// URL of one user, with the id encoded as a single path segment.
    fn user_url(&self, id: &str) -> Result<Url, Error> {
        let mut url = self.url(USERS_PATH)?;
        url.path_segments_mut()
            .map_err(|()| Error::internal().with_cause("base URL cannot carry a path"))?
            .push(id);
        Ok(url)
    }
}

fn network(err: reqwest::Error) -> Error {
    tracing::debug!(error = %err, "HTTP round trip failed");
    Error::internal().with_cause(err)
}

/// Decode a success body as `T`, or an error body as the error it carries.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(network)?;

    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(|e| Error::internal().with_cause(e));
    }
    match serde_json::from_slice::<ErrorResponse>(&bytes) {
        Ok(body) => Err(body.error.into()),
        Err(e) => Err(Error::internal().with_cause(format!("status {status}: {e}"))),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn find_user_by_id(&self, id: &str) -> Result<User, Error> {
        if id.is_empty() {
            return Err(Error::invalid_user_id());
        }
        let response = self
            .http
            .get(self.user_url(id)?)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }

    async fn create_user(&self, username: &str) -> Result<String, Error> {
        let request = CreateUserRequest {
            username: username.to_string(),
        };
        let response = self
            .http
            .post(self.url(USERS_PATH)?)
            .json(&request)
            .send()
            .await
            .map_err(network)?;
        let user: User = decode(response).await?;
        Ok(user.id)
    }
}
