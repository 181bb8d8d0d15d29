/// Maximum number of characters of a resource API error body kept in [`Error::Api`].
pub const MAX_ERROR_BODY_CHARS: usize = 400;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error(
        "OAuth not configured for {name}. Set {client_id_env} and {client_secret_env} environment variables."
    )]
    NotConfigured {
        name: String,
        client_id_env: String,
        client_secret_env: String,
    },

    #[error(
        "{name} account not connected. Please connect your {name} account in Nanobots Setup → Services."
    )]
    NotConnected { provider: String, name: String },

    #[error("refusing to store a token with an empty access token for {0}")]
    EmptyAccessToken(String),

    #[error("token exchange failed: {status} {body}")]
    Exchange { status: u16, body: String },

    #[error("token refresh failed: {status} {body}")]
    Refresh { status: u16, body: String },

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("invalid or expired state")]
    InvalidState,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Whether the remediation is reconnecting the account.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::NotConnected { .. } | Self::Refresh { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Truncate a response body on a char boundary.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}
