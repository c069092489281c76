//! A reqwest client with loam-conformant defaults.

use std::{borrow::Cow, time::Duration};

use http::Method;
use reqwest::IntoUrl;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{ApiError, ErrorResponse};

/// Upper bound on any single API request.
pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Avoid `Method::` prefix. Associated constants can't be imported.
pub const GET: Method = Method::GET;
pub const POST: Method = Method::POST;

/// A generic `RestClient` which conforms to loam's API conventions:
/// requests time out, TCP keep-alive probes are enabled on the underlying
/// sockets, non-2xx responses carry a JSON [`ErrorResponse`] body, and the
/// `from` field rides the user agent so servers can tell callers apart.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    /// The process this client is being called from, e.g. "dir-client".
    from: Cow<'static, str>,
    /// The process this client is calling, e.g. "dirserver".
    to: &'static str,
}

impl RestClient {
    /// Build a [`RestClient`] with the given TLS config and safe defaults.
    pub fn new(
        from: impl Into<Cow<'static, str>>,
        to: &'static str,
        tls_config: rustls::ClientConfig,
        tcp_keepalive: Duration,
    ) -> Self {
        fn inner(
            from: Cow<'static, str>,
            to: &'static str,
            tls_config: rustls::ClientConfig,
            tcp_keepalive: Duration,
        ) -> RestClient {
            let client = RestClient::client_builder(&from, tcp_keepalive)
                .use_preconfigured_tls(tls_config)
                .https_only(true)
                .build()
                .expect("Failed to build reqwest Client");
            RestClient { client, from, to }
        }
        inner(from.into(), to, tls_config, tcp_keepalive)
    }

    /// [`RestClient::new`] but without TLS. Only for tests and local
    /// loopback servers; `remote` endpoints always use TLS.
    pub fn new_insecure(from: impl Into<Cow<'static, str>>, to: &'static str) -> Self {
        fn inner(from: Cow<'static, str>, to: &'static str) -> RestClient {
            let client = RestClient::client_builder(&from, API_REQUEST_TIMEOUT)
                .https_only(false)
                .build()
                .expect("Failed to build reqwest Client");
            RestClient { client, from, to }
        }
        inner(from.into(), to)
    }

    /// A [`reqwest::ClientBuilder`] with loam defaults set.
    pub fn client_builder(from: impl AsRef<str>, tcp_keepalive: Duration) -> reqwest::ClientBuilder {
        fn inner(from: &str, tcp_keepalive: Duration) -> reqwest::ClientBuilder {
            reqwest::Client::builder()
                .user_agent(from)
                .https_only(true)
                .timeout(API_REQUEST_TIMEOUT)
                .tcp_keepalive(Some(tcp_keepalive))
        }
        inner(from.as_ref(), tcp_keepalive)
    }

    #[inline]
    pub fn user_agent(&self) -> &str {
        &self.from
    }

    // --- RequestBuilder helpers --- //

    #[inline]
    pub fn get<U, T>(&self, url: U, data: &T) -> reqwest::RequestBuilder
    where
        U: IntoUrl,
        T: Serialize + ?Sized,
    {
        self.builder(GET, url).query(data)
    }

    #[inline]
    pub fn post<U, T>(&self, url: U, data: &T) -> reqwest::RequestBuilder
    where
        U: IntoUrl,
        T: Serialize + ?Sized,
    {
        self.builder(POST, url).json(data)
    }

    /// A clean slate [`reqwest::RequestBuilder`] for non-standard requests.
    pub fn builder(&self, method: Method, url: impl IntoUrl) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    // --- Request send/recv --- //

    /// Send the built request and JSON-deserialize a 2xx response body to
    /// `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request_builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send_no_deserialize(request_builder).await?;
        response.json::<T>().await.map_err(ApiError::from)
    }

    /// Send the built request without touching a 2xx response body, so the
    /// caller can inspect response metadata before deserializing. A non-2xx
    /// response is read as an [`ErrorResponse`] and returned as the error.
    pub async fn send_no_deserialize(
        &self,
        request_builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let (from, to) = (&self.from, self.to);
        debug!("{from} => {to}: new client request");

        let response = request_builder.send().await.inspect_err(|error| {
            warn!("{from} => {to}: error sending request: {error}");
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("{from} => {to}: done ({status})");
            Ok(response)
        } else {
            let error = response
                .json::<ErrorResponse>()
                .await
                .map(ApiError::from)
                .unwrap_or_else(|error| {
                    ApiError::internal(format!("could not read error response: {error}"))
                });
            warn!("{from} => {to}: server returned error ({status}): {error}");
            Err(error)
        }
    }
}
