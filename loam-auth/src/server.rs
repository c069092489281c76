//! The server side of the authentication handshake.
//!
//! Every incoming RPC passes through [`AuthHandler::authenticate`] before
//! its business handler runs. Calls carrying a token are checked against
//! the session store; calls carrying a signed auth request are verified
//! against the user's registered public key, and a fresh session is minted
//! and returned in the response metadata. A proxy request layers a
//! server-to-client signature on top so a caching intermediary can be
//! trusted to act for a named user.

use std::{sync::Arc, time::Duration as StdDuration};

use anyhow::Context as _;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;
use loam_api::{
    types::timestamp,
    wire::{self, AuthRequest},
    ApiError,
};
use loam_crypto::{rng::SysRng, sig, Factotum};
use loam_tokio::{LoamTask, NotifyOnce};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    keyserver::KeyLookup,
    session::{Session, Token, TOKEN_LIFETIME},
    store::{self, BindingCache, Lookup, SessionStore, TimeFn},
};

/// Auth requests stamped more than this far in the past are considered
/// skewed.
const MAX_TIMESTAMP_AGE: StdDuration = StdDuration::from_secs(45);
/// Auth requests stamped more than this far in the future are considered
/// skewed.
const MAX_TIMESTAMP_LEAD: StdDuration = StdDuration::from_secs(30);

/// Grace period during which a shutting-down TLS server refuses new
/// connections and waits for in-flight requests.
pub const SHUTDOWN_GRACE_PERIOD: StdDuration = StdDuration::from_secs(3);

/// Server-side authentication configuration.
pub struct Config {
    /// The key-discovery seam; resolves a user name to its public key.
    pub lookup: Arc<dyn KeyLookup>,
    /// The server's own signer, used to counter-sign proxy handshakes.
    pub factotum: Arc<Factotum>,
    /// Admit callers whose handshake failed, handing the business handler
    /// an unauthenticated session carrying the failure instead of
    /// refusing the call. Handlers are obliged to check
    /// [`Session::is_authenticated`] when this is set.
    pub allow_unauthenticated_connections: bool,
    /// Hard-fail auth requests whose timestamp is outside the accepted
    /// skew window instead of just logging. Off by default.
    pub reject_stale_requests: bool,
    /// Clock override for tests.
    pub time: TimeFn,
}

impl Config {
    pub fn new(lookup: Arc<dyn KeyLookup>, factotum: Arc<Factotum>) -> Self {
        Self {
            lookup,
            factotum,
            allow_unauthenticated_connections: false,
            reject_stale_requests: false,
            time: store::system_clock(),
        }
    }
}

/// A successfully authenticated call: the session to run it under, plus
/// the metadata to merge into the response.
#[derive(Debug)]
pub struct AuthOutcome {
    pub session: Arc<Session>,
    pub response: HeaderMap,
}

/// The per-process authentication handler. Owns the session store.
pub struct AuthHandler {
    config: Config,
    store: SessionStore,
    bindings: BindingCache,
}

impl AuthHandler {
    pub fn new(config: Config) -> Self {
        let store =
            SessionStore::with_capacity_and_clock(store::DEFAULT_CAPACITY, config.time.clone());
        Self {
            config,
            store,
            bindings: BindingCache::new(store::DEFAULT_CAPACITY),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Authenticate one incoming call from its metadata.
    ///
    /// `channel_binding` is the TLS "unique" binding value when the
    /// transport can produce one (the raw HTTP+TLS variant); it lets a
    /// re-authenticating client on the same encrypted channel skip
    /// signature verification.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        channel_binding: Option<&[u8]>,
    ) -> Result<AuthOutcome, ApiError> {
        let now = (self.config.time)();

        // Token path.
        if let Some(raw) = wire::auth_token(headers)? {
            let token = Token::parse(&raw)?;
            return match self.store.lookup(&token) {
                Lookup::Absent => Err(ApiError::permission("unauthenticated")),
                Lookup::Expired => Err(ApiError::permission("expired session")),
                Lookup::Live(session) => Ok(AuthOutcome {
                    session,
                    response: HeaderMap::new(),
                }),
            };
        }

        // Auth-request path. Strict shapes: exactly four values for the
        // request, at most one proxy request.
        let request = AuthRequest::from_header_map(headers)?
            .ok_or_else(|| ApiError::invalid("no authentication metadata"))?;
        let proxy_target = wire::proxy_request(headers)?;

        // Channel-binding fast path: an existing session on this channel
        // for the same user short-circuits verification. Proxy handshakes
        // always run in full so the counter-signature is produced.
        if proxy_target.is_none() {
            if let Some(binding) = channel_binding {
                if let Some(cached) = self.bindings.get(binding) {
                    if cached.user() == &request.user
                        && now < cached.expires()
                        && cached.is_authenticated()
                    {
                        debug!(user = %request.user, "session reused via channel binding");
                        let mut response = HeaderMap::new();
                        wire::append_auth_token(&mut response, cached.token().as_str())?;
                        return Ok(AuthOutcome {
                            session: cached,
                            response,
                        });
                    }
                }
            }
        }

        let verify_failure = match self.verify_auth_request(&request, now).await {
            Ok(()) => None,
            Err(err) if self.config.allow_unauthenticated_connections => {
                warn!(user = %request.user, "admitting unauthenticated connection: {err}");
                Some(err)
            }
            Err(err) => return Err(err),
        };

        // Mint the session and its token.
        let mut rng = SysRng::new();
        let token = Token::mint(&mut rng);
        let expires = now + lifetime();
        let mut response = HeaderMap::new();

        let authenticated = verify_failure.is_none();
        let proxied_endpoint = match proxy_target {
            // Only an authenticated caller gets a proxy binding and the
            // server's counter-signature.
            Some(endpoint) if authenticated => {
                let hash = sig::auth_hash(
                    request.user.as_str(),
                    sig::SERVER_AUTH_MAGIC,
                    &request.timestamp,
                );
                let server_sig = self
                    .config
                    .factotum
                    .sign(hash.as_slice())
                    .map_err(|err| ApiError::internal(format!("counter-signing failed: {err}")))?;
                AuthRequest {
                    user: request.user.clone(),
                    timestamp: request.timestamp.clone(),
                    sig: server_sig,
                }
                .append_to(&mut response)?;
                info!(user = %request.user, %endpoint, "proxy handshake accepted");
                Some(endpoint)
            }
            _ => None,
        };

        let session = Arc::new(Session::new(
            request.user.clone(),
            expires,
            token.clone(),
            proxied_endpoint,
            verify_failure,
        ));
        self.store.add(session.clone());
        if authenticated {
            if let Some(binding) = channel_binding {
                self.bindings.put(binding.to_vec(), session.clone());
            }
        }

        wire::append_auth_token(&mut response, token.as_str())?;
        debug!(user = %request.user, authenticated, "session established");
        Ok(AuthOutcome { session, response })
    }

    /// Timestamp, key fetch, signature. The user name was already
    /// validated when the metadata was parsed. Key-service failures are
    /// collapsed to `Permission` so a caller cannot probe which users
    /// exist.
    async fn verify_auth_request(
        &self,
        request: &AuthRequest,
        now: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let stamped = timestamp::parse_ansic(&request.timestamp).ok_or_else(|| {
            ApiError::invalid(format!("bad timestamp in auth request: {:?}", request.timestamp))
        })?;

        let age = now.signed_duration_since(stamped);
        let too_old = age > Duration::from_std(MAX_TIMESTAMP_AGE).expect("window fits");
        let too_new = age < -Duration::from_std(MAX_TIMESTAMP_LEAD).expect("window fits");
        if too_old || too_new {
            if self.config.reject_stale_requests {
                return Err(ApiError::permission("auth request timestamp out of range"));
            }
            warn!(user = %request.user, %age, "skewed auth request timestamp, proceeding");
        }

        let key = self
            .config
            .lookup
            .lookup(&request.user)
            .await
            .map_err(|err| {
                warn!(user = %request.user, "key lookup failed: {err}");
                err.to_permission()
            })?;

        let hash = sig::auth_hash(request.user.as_str(), sig::CLIENT_AUTH_MAGIC, &request.timestamp);
        if !key.verify(hash.as_slice(), &request.sig) {
            return Err(ApiError::permission("invalid signature"));
        }
        Ok(())
    }
}

fn lifetime() -> Duration {
    Duration::from_std(TOKEN_LIFETIME).expect("token lifetime fits")
}

// --- axum integration --- //

/// The response body of the `/ping` keep-alive route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub pong: bool,
}

/// Build the auth-wrapped router: `/ping` plus whatever routes the caller
/// merges in. Every route sees an `Extension<Arc<Session>>`.
pub fn router(handler: Arc<AuthHandler>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .layer(middleware::from_fn_with_state(
            handler.clone(),
            authenticate_layer,
        ))
}

/// Tower middleware running [`AuthHandler::authenticate`] ahead of every
/// business handler. The HTTP stack here does not surface a TLS channel
/// binding, so the fast path is only taken by transports that call
/// [`AuthHandler::authenticate`] themselves.
pub async fn authenticate_layer(
    State(handler): State<Arc<AuthHandler>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = match handler.authenticate(request.headers(), None).await {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };
    request.extensions_mut().insert(outcome.session);
    let mut response = next.run(request).await;
    response.headers_mut().extend(outcome.response);
    response
}

/// Keep-alive target. Refuses unauthenticated sessions, which also serves
/// as the reference for how business handlers must treat the
/// allow-unauthenticated escape hatch.
async fn ping(Extension(session): Extension<Arc<Session>>) -> Result<Json<PingResponse>, ApiError> {
    if !session.is_authenticated() {
        return Err(ApiError::permission("unauthenticated"));
    }
    debug!(user = %session.user(), "ping");
    Ok(Json(PingResponse { pong: true }))
}

/// Serve a router over plain TCP until `shutdown` fires. For `inprocess`
/// style test servers; remote endpoints use [`serve_tls`].
pub async fn serve(
    listener: tokio::net::TcpListener,
    router: Router,
    mut shutdown: NotifyOnce,
) -> anyhow::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await
        .context("server error")
}

/// Serve a router over TLS until `shutdown` fires. In-flight requests get
/// [`SHUTDOWN_GRACE_PERIOD`] to finish.
pub async fn serve_tls(
    listener: std::net::TcpListener,
    router: Router,
    tls_config: Arc<rustls::ServerConfig>,
    mut shutdown: NotifyOnce,
) -> anyhow::Result<()> {
    let handle = axum_server::Handle::new();
    let watcher = {
        let handle = handle.clone();
        LoamTask::spawn("tls-server shutdown watcher", async move {
            shutdown.recv().await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        })
    };

    let result = axum_server::from_tcp_rustls(listener, RustlsConfig::from_config(tls_config))
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .context("TLS server error");

    watcher.abort();
    result
}
