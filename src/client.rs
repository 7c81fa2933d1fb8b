//! The reqwest-backed marketplace API client.
//!
//! [`ApiClient`] owns transport concerns only: URL joining, bearer auth, JSON
//! (de)serialization and error mapping. The endpoint methods live next to the stores
//! that use them, as implementations of each module's API trait.

use crate::{config::ClientConfig, error::ApiError};
use parking_lot::RwLock;
use reqwest::{multipart, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fmt, sync::Arc};
use url::Url;

/// HTTP client for the marketplace REST API.
///
/// Clones share the connection pool and the bearer token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Arc<RwLock<Option<String>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.token.read().is_some())
            .finish()
    }
}

/// Some endpoints wrap their payload as `{ "data": ... }`, others return it bare.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

impl ApiClient {
    /// Creates a client from the given configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        #[cfg(not(target_family = "wasm"))]
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        #[cfg(target_family = "wasm")]
        let http = reqwest::Client::new();

        Ok(Self::with_client(http, config.api_base_url.clone()))
    }

    /// Creates a client reusing an existing [`reqwest::Client`].
    ///
    /// A base with a path prefix (`https://host/backend`) is treated as a directory, so
    /// endpoints resolve below it.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sets or clears the bearer token sent with every request.
    pub fn set_token(&self, token: Option<&str>) {
        *self.token.write() = token.map(str::to_string);
    }

    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    /// Resolves `path` below the base URL, keeping any path prefix the base has.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        let builder = self.http.request(method, url);
        Ok(match self.token.read().as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Sends the request and maps non-2xx statuses to [`ApiError::Status`].
    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let error = ApiError::from_response_body(status.as_u16(), &body);
        #[cfg(feature = "tracing")]
        tracing::warn!(status = status.as_u16(), "API request failed: {error}");
        Err(error)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.into_inner())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = Self::send(self.request(Method::GET, path)?).await?;
        Self::decode(response).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = Self::send(self.request(Method::POST, path)?.json(body)).await?;
        Self::decode(response).await
    }

    pub(crate) async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = Self::send(self.request(Method::PUT, path)?.json(body)).await?;
        Self::decode(response).await
    }

    /// Sends a request whose response body is ignored.
    pub(crate) async fn send_empty<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = self.request(method, path)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Self::send(builder).await?;
        Ok(())
    }

    pub(crate) async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> Result<T, ApiError> {
        let response = Self::send(self.request(Method::POST, path)?.multipart(form)).await?;
        Self::decode(response).await
    }
}
