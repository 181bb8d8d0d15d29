use std::sync::Arc;

use {
    reqwest::{RequestBuilder, header::ACCEPT},
    tracing::{debug, info},
    url::Url,
};

use crate::{
    clock::{Clock, SystemClock},
    error::{Error, Result},
    providers::{ProviderConfig, ProviderRegistry, TokenAuthMethod, TokenContentType},
    state::{PendingStates, generate_state},
    storage::TokenStore,
    types::{AuthorizationRequest, NEVER_EXPIRES, PendingAuthorization, PkceChallenge, Token, TokenResponse},
};

/// Absolute expiry for a reported `expires_in`. Absent, zero, or past the
/// sentinel means the token never expires.
fn expiry_after(now_ms: u64, expires_in: Option<u64>) -> u64 {
    match expires_in {
        Some(secs) if secs > 0 => now_ms
            .saturating_add(secs.saturating_mul(1000))
            .min(NEVER_EXPIRES),
        _ => NEVER_EXPIRES,
    }
}

/// Authorization-code lifecycle: authorization URL, code exchange, refresh.
pub struct OAuthFlow {
    registry: Arc<ProviderRegistry>,
    store: Arc<TokenStore>,
    pending: PendingStates,
    clock: Arc<dyn Clock>,
    client: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<TokenStore>) -> Self {
        Self::with_clock(registry, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        registry: Arc<ProviderRegistry>,
        store: Arc<TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            pending: PendingStates::new(Arc::clone(&clock)),
            clock,
            client: reqwest::Client::new(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Build the provider's authorization URL and record the pending state.
    ///
    /// Stale pending states are swept first.
    pub fn build_authorization_url(
        &self,
        provider_id: &str,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest> {
        let provider = self.registry.require(provider_id)?;
        provider.ensure_configured()?;

        self.pending.sweep();
        let state = generate_state();
        let pkce = provider.use_pkce.then(PkceChallenge::generate);

        let mut url = Url::parse(&provider.auth_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &provider.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &provider.joined_scopes())
                .append_pair("state", &state);
            for (key, value) in &provider.extra_auth_params {
                query.append_pair(key, value);
            }
            if let Some(ref pkce) = pkce {
                query
                    .append_pair("code_challenge", &pkce.challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }

        self.pending.insert(state.clone(), PendingAuthorization {
            provider: provider.id.clone(),
            redirect_uri: redirect_uri.to_string(),
            created_at_ms: self.clock.now_ms(),
            code_verifier: pkce.map(|p| p.verifier),
        });
        debug!(provider = provider_id, "issued authorization url");

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }

    /// Single-use lookup of a pending authorization.
    pub fn consume_pending_state(&self, state: &str) -> Option<PendingAuthorization> {
        self.pending.consume(state)
    }

    /// Number of authorizations still awaiting a callback.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Consume `state` and exchange `code` for a token of the provider it names.
    pub async fn complete_authorization(&self, state: &str, code: &str) -> Result<Token> {
        let pending = self.consume_pending_state(state).ok_or(Error::InvalidState)?;
        self.exchange_code_for_token(
            &pending.provider,
            code,
            &pending.redirect_uri,
            pending.code_verifier.as_deref(),
        )
        .await
    }

    /// Authorization-code grant. The resulting token is persisted before returning.
    pub async fn exchange_code_for_token(
        &self,
        provider_id: &str,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<Token> {
        let provider = self.registry.require(provider_id)?;
        provider.ensure_configured()?;

        let mut params = vec![
            ("code", code.to_string()),
            ("grant_type", "authorization_code".to_string()),
            ("redirect_uri", redirect_uri.to_string()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier.to_string()));
        }

        let resp = self.token_request(provider, params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Exchange {
                status: status.as_u16(),
                body,
            });
        }
        let data: TokenResponse = serde_json::from_str(&body)?;
        if data.access_token.is_empty() {
            return Err(Error::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let expires_at = if provider.never_expires {
            NEVER_EXPIRES
        } else {
            expiry_after(self.clock.now_ms(), data.expires_in)
        };
        let scopes = match data.scope {
            Some(ref raw) => provider.split_scopes(raw),
            None => provider.scopes.clone(),
        };
        let token = Token::new(
            &provider.id,
            data.access_token,
            data.refresh_token.unwrap_or_default(),
            expires_at,
            scopes,
        );

        self.store.save(&provider.id, &token).await?;
        info!(provider = provider_id, "connected oauth provider");
        Ok(token)
    }

    /// Refresh-token grant. A response without a refresh token or scope keeps
    /// the previous values; access token and expiry are always replaced.
    ///
    /// The caller persists the result.
    pub async fn refresh_access_token(&self, provider_id: &str, token: &Token) -> Result<Token> {
        let provider = self.registry.require(provider_id)?;
        if provider.never_expires {
            return Ok(token.clone());
        }

        let params = vec![
            ("refresh_token", token.refresh_token().to_string()),
            ("grant_type", "refresh_token".to_string()),
        ];
        let resp = self.token_request(provider, params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Refresh {
                status: status.as_u16(),
                body,
            });
        }
        let data: TokenResponse = serde_json::from_str(&body)?;
        if data.access_token.is_empty() {
            return Err(Error::Refresh {
                status: status.as_u16(),
                body,
            });
        }

        let expires_at = expiry_after(self.clock.now_ms(), data.expires_in);
        let refresh_token = data
            .refresh_token
            .filter(|rt| !rt.is_empty())
            .unwrap_or_else(|| token.refresh_token().to_string());
        let scopes = match data.scope {
            Some(ref raw) => provider.split_scopes(raw),
            None => token.scopes.clone(),
        };

        info!(provider = provider_id, "refreshed oauth token");
        Ok(Token::new(
            &provider.id,
            data.access_token,
            refresh_token,
            expires_at,
            scopes,
        ))
    }

    fn token_request(
        &self,
        provider: &ProviderConfig,
        mut params: Vec<(&'static str, String)>,
    ) -> RequestBuilder {
        let mut req = self
            .client
            .post(&provider.token_url)
            .header(ACCEPT, "application/json");

        match provider.token_auth {
            TokenAuthMethod::Basic => {
                req = req.basic_auth(&provider.client_id, Some(provider.client_secret()));
            },
            TokenAuthMethod::Body => {
                params.push(("client_id", provider.client_id.clone()));
                params.push(("client_secret", provider.client_secret().to_string()));
            },
        }

        match provider.token_content {
            TokenContentType::Json => {
                let body: serde_json::Map<String, serde_json::Value> = params
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
                    .collect();
                req.json(&body)
            },
            TokenContentType::Form => req.form(&params),
        }
    }
}
