//! Subscription-token exchange.
//!
//! Private relay topics require a token signed by the chat backend. The
//! [`AuthBroker`] trait is the seam; [`HttpAuthBroker`] calls
//! `POST <base>/api/v1/pusher.auth`. Brokers never retry: a failure goes
//! back to the session, which applies its reconnect policy.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{SubscriptionToken, TopicName};
use crate::error::{AuthError, RealtimeError};

/// Path of the auth endpoint relative to the API base URL.
pub const AUTH_PATH: &str = "api/v1/pusher.auth";

/// Longest response body kept in an [`AuthError::Status`].
const MAX_ERROR_BODY: usize = 256;

/// Exchanges a socket id and topic for a subscription token.
#[async_trait]
pub trait AuthBroker: Send + Sync {
    /// Authorizes `socket_id` to subscribe to `topic`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] on any transport, status, or body failure.
    async fn authorize(
        &self,
        socket_id: &str,
        topic: &TopicName,
    ) -> Result<SubscriptionToken, AuthError>;
}

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    socket_id: &'a str,
    channel_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth: Option<String>,
}

/// [`AuthBroker`] backed by the chat backend's REST API.
#[derive(Clone)]
pub struct HttpAuthBroker {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl HttpAuthBroker {
    /// Creates a broker for the backend at `api_base_url`.
    ///
    /// Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`] if the HTTP client cannot be
    /// built.
    pub fn new(
        api_base_url: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RealtimeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RealtimeError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/{AUTH_PATH}", api_base_url.trim_end_matches('/')),
            access_token: access_token.into(),
        })
    }

    /// Returns the full auth endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AuthBroker for HttpAuthBroker {
    async fn authorize(
        &self,
        socket_id: &str,
        topic: &TopicName,
    ) -> Result<SubscriptionToken, AuthError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&AuthRequest {
                socket_id,
                channel_name: topic.as_str(),
            })
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: AuthResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::Body(e.to_string()))?;
        match parsed.auth {
            Some(token) if !token.is_empty() => {
                tracing::debug!(%topic, "subscription authorized");
                Ok(SubscriptionToken::new(token))
            }
            _ => Err(AuthError::Body("no auth token in response".to_string())),
        }
    }
}

impl fmt::Debug for HttpAuthBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuthBroker")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
