use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// Expiry sentinel for credentials that never expire (2^53 - 1, the largest
/// integer a JSON consumer can represent exactly).
pub const NEVER_EXPIRES: u64 = 9_007_199_254_740_991;

/// Safety margin subtracted from `expires_at` before a token is trusted.
pub const EXPIRY_MARGIN_MS: u64 = 60_000;

/// Whether `expires_at` is at or within the margin of the sentinel.
pub fn is_never_expiring(expires_at: u64) -> bool {
    expires_at >= NEVER_EXPIRES - EXPIRY_MARGIN_MS
}

/// A provider's delegated credential, persisted as one JSON file per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub provider: String,
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    /// Empty for credentials that cannot be renewed.
    #[serde(default = "empty_secret", serialize_with = "serialize_secret")]
    pub refresh_token: Secret<String>,
    /// Unix timestamp (ms) when the access token expires.
    pub expires_at: u64,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Token {
    pub fn new(
        provider: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: u64,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
            expires_at,
            scopes,
        }
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token().is_empty()
    }

    pub fn never_expires(&self) -> bool {
        is_never_expiring(self.expires_at)
    }

    /// Whether the token can be used at `now_ms` without refreshing.
    pub fn is_fresh_at(&self, now_ms: u64) -> bool {
        self.never_expires() || now_ms < self.expires_at.saturating_sub(EXPIRY_MARGIN_MS)
    }

    pub fn summary(&self) -> TokenSummary {
        TokenSummary {
            provider: self.provider.clone(),
            expires_at: self.expires_at,
            scopes: self.scopes.clone(),
        }
    }
}

/// Status view of a stored token, without the secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub provider: String,
    pub expires_at: u64,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// In-flight authorization attempt, keyed by its state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub provider: String,
    pub redirect_uri: String,
    pub created_at_ms: u64,
    pub code_verifier: Option<String>,
}

/// Authorization URL handed to the user, plus the state it embeds.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// PKCE challenge pair.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

/// Raw token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn empty_secret() -> Secret<String> {
    Secret::new(String::new())
}
