use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use {
    async_trait::async_trait,
    reqwest::{Method, Response, StatusCode},
    serde::de::DeserializeOwned,
    tracing::{debug, info, warn},
};

use crate::{
    clock::Clock,
    error::{Error, MAX_ERROR_BODY_CHARS, Result, truncate_body},
    flow::OAuthFlow,
    providers::ProviderConfig,
    storage::TokenStore,
    types::Token,
};

/// Exchanges a token's refresh credential for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, token: &Token) -> Result<Token>;
}

#[async_trait]
impl TokenRefresher for OAuthFlow {
    async fn refresh(&self, token: &Token) -> Result<Token> {
        self.refresh_access_token(&token.provider, token).await
    }
}

/// Hands out usable tokens, refreshing stale ones on demand.
///
/// Refreshes are serialized per provider: callers that race on the same stale
/// token wait for the first refresh and then reuse its result.
pub struct TokenAccess {
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenAccess {
    pub fn new(store: Arc<TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// A token usable right now, or `None`.
    ///
    /// Refresh failures, including failing to persist the refreshed token,
    /// are logged and read as absent.
    pub async fn get_valid_token(
        &self,
        provider: &str,
        refresher: Option<&dyn TokenRefresher>,
    ) -> Option<Token> {
        let token = self.store.load(provider).await?;
        if token.is_fresh_at(self.clock.now_ms()) {
            return Some(token);
        }
        let Some(refresher) = refresher else {
            debug!(provider, "stale token and no refresher");
            return None;
        };
        if !token.has_refresh_token() {
            debug!(provider, "stale token cannot be refreshed");
            return None;
        }

        let lock = self.lock_for(provider);
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        let token = self.store.load(provider).await?;
        if token.is_fresh_at(self.clock.now_ms()) {
            return Some(token);
        }
        if !token.has_refresh_token() {
            return None;
        }
        self.refresh_and_save(provider, &token, refresher).await
    }

    /// Refresh after the provider rejected `rejected`, unless a concurrent
    /// caller already replaced it with a fresh token.
    pub async fn force_refresh(
        &self,
        provider: &str,
        rejected: &Token,
        refresher: &dyn TokenRefresher,
    ) -> Option<Token> {
        let lock = self.lock_for(provider);
        let _guard = lock.lock().await;

        let current = self.store.load(provider).await?;
        if current.access_token() != rejected.access_token()
            && current.is_fresh_at(self.clock.now_ms())
        {
            return Some(current);
        }
        if !current.has_refresh_token() {
            debug!(provider, "rejected token cannot be refreshed");
            return None;
        }
        self.refresh_and_save(provider, &current, refresher).await
    }

    async fn refresh_and_save(
        &self,
        provider: &str,
        token: &Token,
        refresher: &dyn TokenRefresher,
    ) -> Option<Token> {
        match refresher.refresh(token).await {
            // An unsaved refresh may leave a rotated-out refresh token on disk.
            Ok(fresh) => match self.store.save(provider, &fresh).await {
                Ok(()) => Some(fresh),
                Err(e) => {
                    warn!(provider, error = %e, "failed to persist refreshed token");
                    None
                },
            },
            Err(e) => {
                warn!(provider, error = %e, "token refresh failed");
                None
            },
        }
    }

    fn lock_for(&self, provider: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(provider.to_string()).or_default())
    }
}

/// Per-request options for [`AuthenticatedClient::fetch`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl FetchOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// HTTP client that attaches a provider's bearer token and recovers from one
/// 401 per request by refreshing.
pub struct AuthenticatedClient {
    flow: Arc<OAuthFlow>,
    access: TokenAccess,
    http: reqwest::Client,
}

impl AuthenticatedClient {
    pub fn new(flow: Arc<OAuthFlow>) -> Self {
        let access = TokenAccess::new(Arc::clone(flow.store()), flow.clock());
        Self {
            flow,
            access,
            http: reqwest::Client::new(),
        }
    }

    pub fn access(&self) -> &TokenAccess {
        &self.access
    }

    /// A usable token for `provider_id`, or [`Error::NotConnected`].
    pub async fn valid_token(&self, provider_id: &str) -> Result<Token> {
        let provider = self.flow.registry().require(provider_id)?;
        self.access
            .get_valid_token(provider_id, Some(self.flow.as_ref()))
            .await
            .ok_or_else(|| not_connected(provider))
    }

    /// Issue a request against the provider's API. `path` is joined to the
    /// provider's API base unless it is already an absolute URL.
    ///
    /// Non-2xx responses become [`Error::Api`].
    pub async fn fetch(
        &self,
        provider_id: &str,
        path: &str,
        options: &FetchOptions,
    ) -> Result<Response> {
        let provider = self.flow.registry().require(provider_id)?;
        let url = resolve_url(&provider.api_base, path);
        let token = self.valid_token(provider_id).await?;

        let mut resp = self.send(&url, &token, options).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            info!(provider = provider_id, "access token rejected, refreshing");
            let fresh = self
                .access
                .force_refresh(provider_id, &token, self.flow.as_ref())
                .await
                .ok_or_else(|| not_connected(provider))?;
            resp = self.send(&url, &fresh, options).await?;
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                provider: provider_id.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body, MAX_ERROR_BODY_CHARS),
            });
        }
        Ok(resp)
    }

    /// [`fetch`](Self::fetch) and decode the JSON body. An empty body decodes
    /// as `null`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        provider_id: &str,
        path: &str,
        options: &FetchOptions,
    ) -> Result<T> {
        let body = self.fetch(provider_id, path, options).await?.text().await?;
        let body = if body.trim().is_empty() {
            "null"
        } else {
            body.as_str()
        };
        Ok(serde_json::from_str(body)?)
    }

    async fn send(&self, url: &str, token: &Token, options: &FetchOptions) -> Result<Response> {
        let mut req = self
            .http
            .request(options.method.clone(), url)
            .bearer_auth(token.access_token());
        if !options.query.is_empty() {
            req = req.query(&options.query);
        }
        for (name, value) in &options.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = options.body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }
}

fn not_connected(provider: &ProviderConfig) -> Error {
    Error::NotConnected {
        provider: provider.id.clone(),
        name: provider.name.clone(),
    }
}

fn resolve_url(api_base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        api_base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
