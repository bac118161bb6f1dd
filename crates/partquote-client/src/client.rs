//! HTTP client for the offer API.
//!
//! Wraps `reqwest` with the API's JSON envelopes, bearer-token session
//! handling and bounded retry. A 401 triggers one token refresh followed by
//! one replay of the request; a failed refresh signs the session out.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use partquote_core::{ClientConfig, NewPartLine, OfferStatus, SelectionRequest};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ClientError;
use crate::retry::{
    is_retriable, is_retriable_without_replay, retry_with_backoff, RetryPolicy,
};
use crate::session::{force_logout, Session, TokenRefresher};
use crate::store::LocalStore;
use crate::types::{DataEnvelope, ErrorEnvelope, OfferDocument, OfferPage, OfferQuery};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOfferBody<'a> {
    order_id: Uuid,
    parts: &'a [NewPartLine],
}

#[derive(Debug, Serialize)]
struct PartLinesBody<'a> {
    parts: &'a [NewPartLine],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryBody {
    delivery_status: OfferStatus,
}

/// Client for the offer API.
///
/// Holds the HTTP client, the local store and the current session. Use
/// [`OfferClient::from_config`] for real use or [`OfferClient::with_store`]
/// to point at a mock server in tests.
#[derive(Debug)]
pub struct OfferClient {
    http: Client,
    base_url: Url,
    retry: RetryPolicy,
    store: LocalStore,
    refresher: TokenRefresher,
    session: Mutex<Option<Session>>,
}

impl OfferClient {
    /// Opens the local store under `config.state_dir` and builds a client
    /// for `config.api_url`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Store`] if the store cannot be opened, otherwise as
    /// [`OfferClient::with_store`].
    pub async fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let store = LocalStore::open(&config.state_dir).await?;
        let retry = RetryPolicy {
            max_attempts: config.max_attempts,
            backoff_base_ms: config.backoff_base_ms,
        };
        Self::with_store(
            &config.api_url,
            Duration::from_secs(config.request_timeout_secs),
            retry,
            store,
        )
        .await
    }

    /// # Errors
    ///
    /// - [`ClientError::InvalidUrl`] if `api_url` does not parse.
    /// - [`ClientError::Http`] if the `reqwest::Client` cannot be built.
    /// - [`ClientError::Store`] if the stored session cannot be read.
    pub async fn with_store(
        api_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
        store: LocalStore,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("partquote/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // One trailing slash so that `join` appends instead of replacing the
        // last path segment.
        let normalised = format!("{}/", api_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ClientError::InvalidUrl {
            url: api_url.to_owned(),
            reason: e.to_string(),
        })?;
        let refresher = TokenRefresher::new(http.clone(), &base_url)?;
        let session = Session::load(&store).await?;

        Ok(Self {
            http,
            base_url,
            retry,
            store,
            refresher,
            session: Mutex::new(session),
        })
    }

    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Stores `session` and uses it for subsequent calls.
    ///
    /// # Errors
    ///
    /// [`ClientError::Store`] if the tokens cannot be written.
    pub async fn sign_in(&self, session: Session) -> Result<(), ClientError> {
        session.save(&self.store).await?;
        self.set_session(Some(session));
        Ok(())
    }

    /// Drops the session and its stored tokens.
    ///
    /// # Errors
    ///
    /// [`ClientError::Store`] if the tokens cannot be removed.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        Session::clear(&self.store).await?;
        self.set_session(None);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Admin endpoints
    // -----------------------------------------------------------------------

    /// `GET /offer/admin`
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn list_offers(&self, query: &OfferQuery) -> Result<OfferPage, ClientError> {
        self.call(Method::GET, "/offer/admin", &query.to_pairs(), None::<&()>)
            .await
    }

    /// `POST /offer/admin`
    ///
    /// Not repeated after a timeout or a 5xx, which may follow a committed
    /// insert; list the order's offers before creating again.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn create_offer(
        &self,
        order_id: Uuid,
        parts: &[NewPartLine],
    ) -> Result<OfferDocument, ClientError> {
        let body = CreateOfferBody { order_id, parts };
        self.call(Method::POST, "/offer/admin", &[], Some(&body))
            .await
    }

    /// `PATCH /offer/admin/:id/send`
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn send_offer(&self, id: Uuid) -> Result<OfferDocument, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/offer/admin/{id}/send"),
            &[],
            None::<&()>,
        )
        .await
    }

    /// `PUT /offer/admin/:id/update-products`
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn update_products(
        &self,
        id: Uuid,
        parts: &[NewPartLine],
    ) -> Result<OfferDocument, ClientError> {
        self.call(
            Method::PUT,
            &format!("/offer/admin/{id}/update-products"),
            &[],
            Some(&PartLinesBody { parts }),
        )
        .await
    }

    /// `POST /offer/admin/:id/add-products`
    ///
    /// Retried like [`OfferClient::create_offer`].
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn add_products(
        &self,
        id: Uuid,
        parts: &[NewPartLine],
    ) -> Result<OfferDocument, ClientError> {
        self.call(
            Method::POST,
            &format!("/offer/admin/{id}/add-products"),
            &[],
            Some(&PartLinesBody { parts }),
        )
        .await
    }

    /// `PATCH /offer/admin/:id/delivery`
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn update_delivery(
        &self,
        id: Uuid,
        delivery_status: OfferStatus,
    ) -> Result<OfferDocument, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/offer/admin/{id}/delivery"),
            &[],
            Some(&DeliveryBody { delivery_status }),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Client endpoints
    // -----------------------------------------------------------------------

    /// `GET /offer/:id`, with the order embedded.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn get_offer(&self, id: Uuid) -> Result<OfferDocument, ClientError> {
        self.call(Method::GET, &format!("/offer/{id}"), &[], None::<&()>)
            .await
    }

    /// `PATCH /offer/:id/selected-parts`
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn submit_selection(
        &self,
        id: Uuid,
        selection: &SelectionRequest,
    ) -> Result<OfferDocument, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/offer/{id}/selected-parts"),
            &[],
            Some(selection),
        )
        .await
    }

    /// `PATCH /offer/:id/accept`
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn accept_offer(&self, id: Uuid) -> Result<OfferDocument, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/offer/{id}/accept"),
            &[],
            None::<&()>,
        )
        .await
    }

    /// `PATCH /offer/:id/reject`
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn reject_offer(&self, id: Uuid) -> Result<OfferDocument, ClientError> {
        self.call(
            Method::PATCH,
            &format!("/offer/{id}/reject"),
            &[],
            None::<&()>,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Sends with retry; on 401 refreshes the session once and replays.
    async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.session().map(|s| s.access_token);
        match self
            .send_with_retry(&method, path, query, body, token.as_deref())
            .await
        {
            Err(ClientError::Api { status: 401, .. }) => {}
            other => return other,
        }

        let refreshed = self.refresh_session(path).await?;
        match self
            .send_with_retry(&method, path, query, body, Some(&refreshed.access_token))
            .await
        {
            Err(ClientError::Api { status: 401, .. }) => Err(self.sign_out_after(path).await),
            other => other,
        }
    }

    async fn refresh_session(&self, path: &str) -> Result<Session, ClientError> {
        let Some(current) = self.session() else {
            return Err(self.sign_out_after(path).await);
        };
        match self.refresher.refresh(&current).await {
            Ok(session) => {
                session.save(&self.store).await?;
                self.set_session(Some(session.clone()));
                tracing::debug!("access token refreshed");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                Err(self.sign_out_after(path).await)
            }
        }
    }

    async fn sign_out_after(&self, path: &str) -> ClientError {
        self.set_session(None);
        force_logout(&self.store, path).await
    }

    async fn send_with_retry<B, T>(
        &self,
        method: &Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let retriable: fn(&ClientError) -> bool = if *method == Method::POST {
            is_retriable_without_replay
        } else {
            is_retriable
        };
        retry_with_backoff(self.retry, retriable, || {
            self.send_once(method.clone(), url.clone(), query, body, token)
        })
        .await
    }

    async fn send_once<B, T>(
        &self,
        method: Method,
        url: Url,
        query: &[(&'static str, String)],
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut builder = self.http.request(method, url.clone());
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }

        serde_json::from_slice::<DataEnvelope<T>>(&bytes)
            .map(|envelope| envelope.data)
            .map_err(|source| ClientError::Deserialize {
                context: url.to_string(),
                source,
            })
    }
}

/// Builds [`ClientError::Api`] from an error response, preferring the
/// envelope's code and message.
fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
        return ClientError::Api {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        };
    }
    let text = String::from_utf8_lossy(body).trim().to_owned();
    let message = if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    } else {
        text
    };
    ClientError::Api {
        status: status.as_u16(),
        code: "http_error".to_owned(),
        message,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
