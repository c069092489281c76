//! The client side of the authentication handshake.
//!
//! An [`AuthClient`] owns one user identity's view of one server: the
//! cached bearer token and when it was last refreshed, the last time any
//! traffic crossed the connection, and the shutdown signal for the
//! keep-alive task. [`Connection`] binds an [`AuthClient`] to a
//! [`RestClient`] and a base URL and is what calling code actually uses.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use loam_api::{
    rest::{RestClient, GET},
    types::timestamp,
    wire::{self, AuthRequest},
    ApiError, Endpoint, UserName,
};
use loam_crypto::{sig, Factotum};
use loam_tokio::{LoamTask, NotifyOnce};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    keyserver::KeyLookup,
    server::PingResponse,
    session::{Token, REFRESH_SAFETY_MARGIN, TOKEN_LIFETIME},
    store::{self, TimeFn},
};

/// Default spacing between keep-alive pings.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Intervals under a minute hammer the server for no benefit; we warn but
/// obey.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on a keep-alive ping.
pub const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Client-side authentication options.
pub struct Options {
    /// The identity the server is expected to run as. Consulted only for
    /// the proxy handshake, to fetch the key that must have produced the
    /// server's counter-signature.
    pub server_user: UserName,
    /// When talking to a caching proxy: the endpoint of the real server
    /// the proxy should act for.
    pub proxy_for: Option<Endpoint>,
    pub keepalive_interval: Duration,
    /// Clock override for tests.
    pub time: TimeFn,
}

impl Options {
    pub fn new(server_user: UserName) -> Self {
        Self {
            server_user,
            proxy_for: None,
            keepalive_interval: KEEPALIVE_INTERVAL,
            time: store::system_clock(),
        }
    }
}

struct TokenState {
    token: Token,
    last_refresh: DateTime<Utc>,
}

/// What [`AuthClient::attach`] put on the wire; needed again when the
/// response comes back.
pub struct AttachedAuth {
    /// `Some` when this call carries an inline auth request (and must
    /// produce a fresh token, and, when proxying, a server proof).
    sent_request: Option<AuthRequest>,
}

impl AttachedAuth {
    pub fn authenticated_inline(&self) -> bool {
        self.sent_request.is_some()
    }
}

/// Maintains one user's authentication state against one server.
pub struct AuthClient {
    user: UserName,
    factotum: Arc<Factotum>,
    lookup: Arc<dyn KeyLookup>,
    options: Options,
    token: Mutex<Option<TokenState>>,
    last_activity: Mutex<Instant>,
    shutdown: NotifyOnce,
}

impl AuthClient {
    pub fn new(
        user: UserName,
        factotum: Arc<Factotum>,
        lookup: Arc<dyn KeyLookup>,
        options: Options,
    ) -> Self {
        if options.keepalive_interval < MIN_KEEPALIVE_INTERVAL {
            warn!(
                interval = ?options.keepalive_interval,
                "keep-alive interval is shorter than a minute"
            );
        }
        Self {
            user,
            factotum,
            lookup,
            options,
            token: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
            shutdown: NotifyOnce::new(),
        }
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.options.keepalive_interval
    }

    /// Attach credentials for one outbound call: the live token when we
    /// have one, otherwise an inline signed auth request (plus the proxy
    /// request when configured). Never both.
    pub fn attach(&self, headers: &mut HeaderMap) -> Result<AttachedAuth, ApiError> {
        let now = (self.options.time)();

        if let Some(state) = self.token.lock().unwrap().as_ref() {
            if !needs_refresh(now, state.last_refresh) {
                wire::append_auth_token(headers, state.token.as_str())?;
                return Ok(AttachedAuth { sent_request: None });
            }
        }

        // No token, or it is about to expire: re-authenticate inline on
        // this very call rather than spending a round trip.
        let stamp = timestamp::format_ansic(now);
        let hash = sig::auth_hash(self.user.as_str(), sig::CLIENT_AUTH_MAGIC, &stamp);
        let signature = self
            .factotum
            .sign(hash.as_slice())
            .map_err(|err| ApiError::internal(format!("signing auth request failed: {err}")))?;
        let request = AuthRequest {
            user: self.user.clone(),
            timestamp: stamp,
            sig: signature,
        };
        request.append_to(headers)?;
        if let Some(endpoint) = &self.options.proxy_for {
            wire::append_proxy_request(headers, endpoint)?;
        }
        debug!(user = %self.user, "attached inline auth request");
        Ok(AttachedAuth {
            sent_request: Some(request),
        })
    }

    /// Digest the response metadata of a call: cache the freshly minted
    /// token, and, when proxying, require and verify the server's
    /// counter-signature. A bad counter-signature is fatal to the
    /// connection.
    pub async fn absorb(
        &self,
        attached: &AttachedAuth,
        response: &HeaderMap,
    ) -> Result<(), ApiError> {
        self.note_activity();

        let sent = match &attached.sent_request {
            Some(sent) => sent,
            None => return Ok(()),
        };

        if self.options.proxy_for.is_some() {
            if let Err(err) = self.verify_server_proof(sent, response).await {
                self.close();
                return Err(err);
            }
        }

        if let Some(raw) = wire::auth_token(response)? {
            let token = Token::parse(&raw)?;
            let now = (self.options.time)();
            *self.token.lock().unwrap() = Some(TokenState {
                token,
                last_refresh: now,
            });
            debug!(user = %self.user, "cached fresh session token");
        }
        Ok(())
    }

    /// Verify the server-to-client half of the proxy handshake: the
    /// response must echo the tuple we signed, counter-signed by the
    /// expected server identity under the server-direction magic.
    async fn verify_server_proof(
        &self,
        sent: &AuthRequest,
        response: &HeaderMap,
    ) -> Result<(), ApiError> {
        let proof = AuthRequest::from_header_map(response)?
            .ok_or_else(|| ApiError::permission("proxy server did not authenticate itself"))?;

        if proof.user != sent.user || proof.timestamp != sent.timestamp {
            return Err(ApiError::permission(
                "proxy server echoed a different handshake",
            ));
        }

        let server_user = &self.options.server_user;
        let key = self
            .lookup
            .lookup(server_user)
            .await
            .map_err(|err| err.to_permission())?;

        let hash = sig::auth_hash(sent.user.as_str(), sig::SERVER_AUTH_MAGIC, &sent.timestamp);
        if !key.verify(hash.as_slice(), &proof.sig) {
            return Err(ApiError::permission(format!(
                "server {server_user} failed to prove its identity"
            )));
        }
        debug!(%server_user, "proxy server authenticated");
        Ok(())
    }

    /// The cached token, if any. Mostly for tests and diagnostics.
    pub fn cached_token(&self) -> Option<Token> {
        self.token
            .lock()
            .unwrap()
            .as_ref()
            .map(|state| state.token.clone())
    }

    /// Record that traffic crossed the connection just now.
    pub fn note_activity(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    /// Time since the last recorded traffic. A slightly stale answer is
    /// harmless; it only delays one keep-alive ping.
    pub fn idle_time(&self) -> Duration {
        self.last_activity.lock().unwrap().elapsed()
    }

    /// Signal the keep-alive task to exit. Safe to call repeatedly.
    pub fn close(&self) {
        self.shutdown.send();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.try_recv()
    }

    /// Spawn the cooperative keep-alive task. Pings `pinger` whenever the
    /// connection has been idle for a full interval; otherwise sleeps the
    /// remainder. Ping failures are logged, never propagated. The task
    /// exits when [`AuthClient::close`] is called.
    pub fn spawn_keepalive(self: &Arc<Self>, pinger: Arc<dyn Pinger>) -> LoamTask<()> {
        let client = self.clone();
        let mut shutdown = self.shutdown.clone();
        let interval = self.options.keepalive_interval;
        LoamTask::spawn("keepalive", async move {
            let mut wait = interval;
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.recv() => break,
                    () = tokio::time::sleep(wait) => {
                        let idle = client.idle_time();
                        if idle < interval {
                            // Traffic happened recently; come back when a
                            // full interval of silence could have passed.
                            wait = interval - idle;
                            continue;
                        }
                        match tokio::time::timeout(PING_TIMEOUT, pinger.ping()).await {
                            Ok(Ok(())) => client.note_activity(),
                            Ok(Err(err)) => warn!("keep-alive ping failed: {err}"),
                            Err(_) => warn!("keep-alive ping timed out"),
                        }
                        wait = interval;
                    }
                }
            }
            debug!("keep-alive task exiting");
        })
    }
}

/// Whether the cached token is too close to expiry to be trusted for
/// another call.
fn needs_refresh(now: DateTime<Utc>, last_refresh: DateTime<Utc>) -> bool {
    let usable = chrono::Duration::from_std(TOKEN_LIFETIME - REFRESH_SAFETY_MARGIN)
        .expect("token lifetime fits");
    now > last_refresh + usable
}

/// Something the keep-alive task can ping.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self) -> Result<(), ApiError>;
}

/// An authenticated connection to one server: REST transport + base URL +
/// auth state. Dropping it releases the transport.
pub struct Connection {
    rest: RestClient,
    base_url: String,
    auth: Arc<AuthClient>,
}

impl Connection {
    pub fn new(rest: RestClient, base_url: impl Into<String>, auth: Arc<AuthClient>) -> Self {
        Self {
            rest,
            base_url: base_url.into(),
            auth,
        }
    }

    /// Dial a network endpoint: TLS is always on, self-signed server certs
    /// only behind the explicit opt-in, TCP keep-alive probes at the
    /// keep-alive interval.
    pub fn dial(
        endpoint: &Endpoint,
        allow_self_signed: bool,
        auth: Arc<AuthClient>,
    ) -> anyhow::Result<Self> {
        let base_url = loam_tls::base_url(endpoint)?;
        let tls_config = loam_tls::client_config(allow_self_signed);
        let rest = RestClient::new(
            auth.user().to_string(),
            "remote",
            tls_config,
            auth.keepalive_interval(),
        );
        Ok(Self::new(rest, base_url, auth))
    }

    pub fn auth(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    /// GET `path` with credentials attached, digesting any credential
    /// metadata on the response before deserializing the body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let mut headers = HeaderMap::new();
        let attached = self.auth.attach(&mut headers)?;

        let url = format!("{}{}", self.base_url, path);
        let builder = self.rest.builder(GET, url).headers(headers);
        let response = self.rest.send_no_deserialize(builder).await?;

        self.auth.absorb(&attached, response.headers()).await?;
        response.json::<T>().await.map_err(ApiError::from)
    }

    pub async fn ping(&self) -> Result<(), ApiError> {
        let response: PingResponse = self.get_json("/ping").await?;
        if !response.pong {
            return Err(ApiError::internal("ping came back false"));
        }
        Ok(())
    }

    /// Cancel the keep-alive task. The underlying transport is released
    /// when the last clone of the inner client is dropped.
    pub fn close(&self) {
        self.auth.close();
    }
}

#[async_trait]
impl Pinger for Connection {
    async fn ping(&self) -> Result<(), ApiError> {
        Connection::ping(self).await
    }
}
