//! Bearer-token session and its refresh service.
//!
//! The session lives in the local store under `accessToken` and
//! `refreshToken`. When a refresh fails the session is torn down: both
//! tokens are removed and `redirectTo` records where the user was, so a
//! front-end can send them back after signing in.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, StoreError};
use crate::store::LocalStore;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const REDIRECT_TO_KEY: &str = "redirectTo";

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl Session {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Reads the stored session; `None` when no access token is stored.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on I/O failure.
    pub async fn load(store: &LocalStore) -> Result<Option<Self>, StoreError> {
        let Some(access_token) = store.get_string(ACCESS_TOKEN_KEY).await? else {
            return Ok(None);
        };
        let refresh_token = store.get_string(REFRESH_TOKEN_KEY).await?;
        Ok(Some(Self {
            access_token,
            refresh_token,
        }))
    }

    /// Persists both tokens; a missing refresh token removes the stored one.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on I/O failure.
    pub async fn save(&self, store: &LocalStore) -> Result<(), StoreError> {
        store.set_string(ACCESS_TOKEN_KEY, &self.access_token).await?;
        match &self.refresh_token {
            Some(token) => store.set_string(REFRESH_TOKEN_KEY, token).await?,
            None => store.remove(REFRESH_TOKEN_KEY).await?,
        }
        store.remove(REDIRECT_TO_KEY).await
    }

    /// Removes both tokens.
    ///
    /// # Errors
    ///
    /// [`StoreError`] on I/O failure.
    pub async fn clear(store: &LocalStore) -> Result<(), StoreError> {
        store.remove(ACCESS_TOKEN_KEY).await?;
        store.remove(REFRESH_TOKEN_KEY).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchanges a refresh token for a new access token.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    client: Client,
    url: Url,
}

impl TokenRefresher {
    pub const PATH: &'static str = "auth/refresh-token";

    /// # Errors
    ///
    /// [`ClientError::InvalidUrl`] if the refresh URL cannot be built from
    /// `base_url`.
    pub fn new(client: Client, base_url: &Url) -> Result<Self, ClientError> {
        let url = base_url
            .join(Self::PATH)
            .map_err(|e| ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, url })
    }

    /// Builds a refresher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// As [`TokenRefresher::new`], or [`ClientError::Http`] if the client
    /// cannot be built.
    pub fn standalone(base_url: &Url, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::new(client, base_url)
    }

    /// Requests a new session. A response without a refresh token keeps the
    /// current one.
    ///
    /// # Errors
    ///
    /// [`ClientError::Unauthorized`] when there is no refresh token or the
    /// auth service refuses it; transport and decode errors otherwise.
    pub async fn refresh(&self, session: &Session) -> Result<Session, ClientError> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(ClientError::Unauthorized)?;

        let response = self
            .client
            .post(self.url.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ClientError::Unauthorized);
        }
        let response = response.error_for_status()?;
        let body = response.text().await?;
        let refreshed: RefreshResponse =
            serde_json::from_str(&body).map_err(|source| ClientError::Deserialize {
                context: self.url.to_string(),
                source,
            })?;

        Ok(Session {
            access_token: refreshed.access_token,
            refresh_token: refreshed
                .refresh_token
                .or_else(|| session.refresh_token.clone()),
        })
    }
}

async fn tear_down(store: &LocalStore, path: &str) -> Result<(), StoreError> {
    Session::clear(store).await?;
    store.set_string(REDIRECT_TO_KEY, path).await
}

/// Tears the stored session down after an authorization failure on
/// `path` and returns the error to hand back to the caller:
/// [`ClientError::Unauthorized`], or the [`StoreError`] if the store could
/// not be updated.
pub async fn force_logout(store: &LocalStore, path: &str) -> ClientError {
    match tear_down(store, path).await {
        Ok(()) => {
            tracing::warn!(redirect_to = path, "session refresh failed, signed out");
            ClientError::Unauthorized
        }
        Err(e) => e.into(),
    }
}
