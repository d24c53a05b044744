// Request dispatcher
//
// One `dispatch` per outbound call, sequencing credential injection,
// duplicate suppression, loading accounting, transport execution, and
// error normalization. Everything up to the transport await is
// synchronous, so an interleaving dispatch can never observe torn
// shared state. Endpoint modules (auth, users, health) are inherent
// methods in separate files; this module is transport mechanics only.

use std::sync::Arc;

use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{self, Error};
use crate::inflight::{InflightRegistry, RequestKey};
use crate::loading::LoadingTracker;
use crate::session::{SessionStore, SessionVault};
use crate::transport::TransportConfig;

/// Route the session invalidator sends the UI to.
const LOGIN_ROUTE: &str = "/login";

/// Navigation capability injected by the embedding UI. Keeps the session
/// invalidator free of any concrete routing framework.
pub trait Navigator: Send + Sync {
    /// The current location path (e.g. `"/users"`).
    fn location(&self) -> String;
    /// Send the UI to the login screen.
    fn go_to_login(&self);
}

/// Navigator for headless embedders (CLIs, jobs): nowhere to redirect.
#[derive(Debug, Default)]
pub struct HeadlessNavigator;

impl Navigator for HeadlessNavigator {
    fn location(&self) -> String {
        String::new()
    }

    fn go_to_login(&self) {}
}

/// Shared per-process client state: session, loading counter, in-flight
/// registry, and the navigation capability. Constructed once at startup
/// and passed by reference everywhere -- no module-level singletons.
pub struct ClientContext {
    session: SessionStore,
    loading: LoadingTracker,
    inflight: InflightRegistry,
    navigator: Arc<dyn Navigator>,
}

impl ClientContext {
    pub fn new(vault: Arc<dyn SessionVault>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            session: SessionStore::new(vault),
            loading: LoadingTracker::new(),
            inflight: InflightRegistry::default(),
            navigator,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn loading(&self) -> &LoadingTracker {
        &self.loading
    }

    pub fn inflight(&self) -> &InflightRegistry {
        &self.inflight
    }

    /// Tear down the session after an authentication failure.
    ///
    /// Idempotent under concurrent invocation: clearing an empty session
    /// is a no-op, and the location is checked at invocation time (never
    /// cached), so N simultaneous 401s produce one clear and at most one
    /// redirect.
    pub fn invalidate_session(&self) {
        debug!("authentication failure: tearing down session");
        self.session.clear();
        if !self.navigator.location().starts_with(LOGIN_ROUTE) {
            self.navigator.go_to_login();
        }
    }
}

/// HTTP client for the OpsDeck backend.
///
/// Wraps `reqwest::Client` with the request lifecycle: every outbound
/// call flows through [`Client::dispatch`]. Responses come back with
/// their envelope intact -- interpreting `data` is the caller's concern.
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    ctx: Arc<ClientContext>,
}

impl Client {
    /// Create a client from a `TransportConfig`. The `base_url` is the
    /// backend root (e.g. `http://localhost:3000`).
    pub fn new(
        base_url: Url,
        transport: &TransportConfig,
        ctx: Arc<ClientContext>,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            ctx,
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests, custom
    /// transport setups).
    pub fn with_client(http: reqwest::Client, base_url: Url, ctx: Arc<ClientContext>) -> Self {
        Self {
            http,
            base_url,
            ctx,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.ctx
    }

    /// Whether a credential is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.ctx.session.get().authenticated()
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Dispatch one outbound call.
    ///
    /// Sequence: attach the bearer token if a credential exists, register
    /// under the request key (cancelling any live same-key predecessor),
    /// account for loading, execute bound to the registered cancellation
    /// handle, then normalize any failure. A dispatch superseded by a
    /// newer duplicate returns [`Error::Cancelled`] without touching the
    /// loading counter -- its accounting transferred to the superseder,
    /// which skipped `begin()`. A 401 additionally tears down the session
    /// before the normalized error is returned.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
    ) -> Result<Response, Error> {
        let url = self.base_url.join(path).map_err(Error::InvalidUrl)?;
        debug!(%method, %url, "dispatch");

        let mut builder = self.http.request(method.clone(), url);
        if let Some(query) = query {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(token) = self.ctx.session.access_token() {
            builder = builder.bearer_auth(token);
        }

        let key = RequestKey::new(&method, path);
        let registration = self.ctx.inflight.register(&key);
        // A superseding dispatch inherits the loser's `begin()`; only a
        // genuinely new key starts loading.
        if !registration.superseded {
            self.ctx.loading.begin();
        }

        // The only suspension point. Dropping the send future on
        // cancellation discards any response the transport may still
        // deliver -- a superseded request never mutates shared state.
        let outcome = tokio::select! {
            () = registration.token.cancelled() => {
                trace!(%key, "dispatch superseded by a newer duplicate");
                return Err(Error::Cancelled);
            }
            outcome = builder.send() => outcome,
        };

        self.ctx.loading.end();
        self.ctx.inflight.settle(&key, registration.seq);

        match outcome {
            Ok(resp) if resp.status().is_success() => Ok(resp),
            Ok(resp) => {
                let api = error::normalize_response(resp).await;
                trace!(%key, status = ?api.status, "dispatch failed: {}", api.message);
                if api.status == Some(401) {
                    self.ctx.invalidate_session();
                }
                Err(Error::Api(api))
            }
            Err(err) => {
                warn!(%key, "transport failure: {err}");
                Err(Error::Api(error::normalize_transport(&err)))
            }
        }
    }

    // ── JSON helpers for the endpoint modules ────────────────────────

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&[(&str, String)]>,
    ) -> Result<T, Error> {
        let resp = self.dispatch(Method::GET, path, query, None).await?;
        Self::parse_body(resp).await
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, Error> {
        let resp = self.dispatch(Method::POST, path, None, Some(body)).await?;
        Self::parse_body(resp).await
    }

    /// Parse a successful response body, keeping the raw body around for
    /// shape mismatches (a listing endpoint omitting its payload is a
    /// caller-visible format error, not a dispatch failure).
    async fn parse_body<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Api(error::normalize_transport(&e)))?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}
