use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
};

use crate::error::{Error, Result};

/// How client credentials are presented to the token endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenAuthMethod {
    /// `client_id` / `client_secret` form fields.
    #[default]
    Body,
    /// HTTP Basic authorization header.
    Basic,
}

/// Encoding of the token endpoint request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenContentType {
    #[default]
    Form,
    Json,
}

/// Environment variables an operator sets to configure a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvHint {
    pub client_id: String,
    pub client_secret: String,
}

/// Static, read-only OAuth configuration for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub auth_url: String,
    pub token_url: String,
    /// Base URL that relative paths in authenticated requests are joined to.
    pub api_base: String,
    pub scopes: Vec<String>,
    /// Empty means "not configured".
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub scope_separator: String,
    /// Extra query parameters appended to the authorization URL.
    pub extra_auth_params: Vec<(String, String)>,
    pub never_expires: bool,
    pub token_auth: TokenAuthMethod,
    pub token_content: TokenContentType,
    pub use_pkce: bool,
    pub env_hint: EnvHint,
}

impl ProviderConfig {
    /// A provider requesting offline access with forced consent, so that
    /// re-authorization always yields a refresh token.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let env_prefix = format!("NANOBOTS_{}", id.to_uppercase().replace('-', "_"));
        Self {
            env_hint: EnvHint {
                client_id: format!("{env_prefix}_CLIENT_ID"),
                client_secret: format!("{env_prefix}_CLIENT_SECRET"),
            },
            id,
            name: name.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            api_base: String::new(),
            scopes: Vec::new(),
            client_id: String::new(),
            client_secret: Secret::new(String::new()),
            scope_separator: " ".into(),
            extra_auth_params: vec![
                ("access_type".into(), "offline".into()),
                ("prompt".into(), "consent".into()),
            ],
            never_expires: false,
            token_auth: TokenAuthMethod::Body,
            token_content: TokenContentType::Form,
            use_pkce: false,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = Secret::new(client_secret.into());
        self
    }

    pub fn with_scope_separator(mut self, separator: &str) -> Self {
        self.scope_separator = separator.into();
        self
    }

    /// Replace the default extra authorization parameters.
    pub fn with_extra_auth_params(mut self, params: &[(&str, &str)]) -> Self {
        self.extra_auth_params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn never_expiring(mut self) -> Self {
        self.never_expires = true;
        self
    }

    pub fn with_basic_auth(mut self) -> Self {
        self.token_auth = TokenAuthMethod::Basic;
        self
    }

    pub fn with_json_token_requests(mut self) -> Self {
        self.token_content = TokenContentType::Json;
        self
    }

    pub fn with_pkce(mut self) -> Self {
        self.use_pkce = true;
        self
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret().is_empty()
    }

    pub fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            return Ok(());
        }
        Err(Error::NotConfigured {
            name: self.name.clone(),
            client_id_env: self.env_hint.client_id.clone(),
            client_secret_env: self.env_hint.client_secret.clone(),
        })
    }

    pub fn joined_scopes(&self) -> String {
        self.scopes.join(&self.scope_separator)
    }

    pub fn split_scopes(&self, raw: &str) -> Vec<String> {
        raw.split(self.scope_separator.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Resolve client credentials: the `NANOBOTS_` variable wins over the
    /// generic one, blank values count as unset.
    fn resolve_credentials(
        self,
        lookup: &dyn Fn(&str) -> Option<String>,
        generic_id: &str,
        generic_secret: &str,
    ) -> Self {
        let client_id = first_non_empty(lookup, &[self.env_hint.client_id.as_str(), generic_id]);
        let client_secret =
            first_non_empty(lookup, &[self.env_hint.client_secret.as_str(), generic_secret]);
        self.with_credentials(client_id, client_secret)
    }
}

fn first_non_empty(lookup: &dyn Fn(&str) -> Option<String>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

/// Per-provider configuration, keyed by provider id.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in providers with credentials from the process environment.
    pub fn from_env() -> Self {
        Self::builtin(&|key| std::env::var(key).ok())
    }

    /// Built-in providers with credentials resolved through `lookup`.
    pub fn builtin(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let mut reg = Self::empty();
        for provider in [
            google(lookup),
            todoist(lookup),
            notion(lookup),
            spotify(lookup),
            fitbit(lookup),
            dropbox(lookup),
            microsoft365(lookup),
            github(lookup),
            twitter(lookup),
        ] {
            reg.register(provider);
        }
        reg
    }

    /// Register a provider, replacing any existing one with the same id.
    pub fn register(&mut self, provider: ProviderConfig) {
        if let Some(existing) = self.providers.iter_mut().find(|p| p.id == provider.id) {
            *existing = provider;
        } else {
            self.providers.push(provider);
        }
    }

    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&ProviderConfig> {
        self.get(id).ok_or_else(|| Error::UnknownProvider(id.to_string()))
    }

    pub fn list(&self) -> &[ProviderConfig] {
        &self.providers
    }
}

fn google(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "google",
        "Google",
        "https://accounts.google.com/o/oauth2/v2/auth",
        "https://oauth2.googleapis.com/token",
    )
    .with_api_base("https://www.googleapis.com")
    .with_scopes(&[
        "https://www.googleapis.com/auth/calendar",
        "https://www.googleapis.com/auth/gmail.modify",
        "https://www.googleapis.com/auth/gmail.send",
        "https://www.googleapis.com/auth/drive",
    ])
    .resolve_credentials(lookup, "GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET")
}

fn todoist(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "todoist",
        "Todoist",
        "https://todoist.com/oauth/authorize",
        "https://todoist.com/oauth/access_token",
    )
    .with_api_base("https://api.todoist.com/rest/v2")
    .with_scopes(&["data:read_write", "data:delete"])
    .with_scope_separator(",")
    .with_extra_auth_params(&[])
    .never_expiring()
    .resolve_credentials(lookup, "TODOIST_CLIENT_ID", "TODOIST_CLIENT_SECRET")
}

fn notion(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "notion",
        "Notion",
        "https://api.notion.com/v1/oauth/authorize",
        "https://api.notion.com/v1/oauth/token",
    )
    .with_api_base("https://api.notion.com/v1")
    .with_extra_auth_params(&[("owner", "user")])
    .with_basic_auth()
    .with_json_token_requests()
    .resolve_credentials(lookup, "NOTION_CLIENT_ID", "NOTION_CLIENT_SECRET")
}

fn spotify(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "spotify",
        "Spotify",
        "https://accounts.spotify.com/authorize",
        "https://accounts.spotify.com/api/token",
    )
    .with_api_base("https://api.spotify.com/v1")
    .with_scopes(&[
        "user-read-playback-state",
        "user-modify-playback-state",
        "user-read-currently-playing",
        "playlist-read-private",
        "playlist-modify-public",
        "playlist-modify-private",
        "user-library-read",
        "user-library-modify",
    ])
    .with_extra_auth_params(&[("show_dialog", "true")])
    .with_basic_auth()
    .resolve_credentials(lookup, "SPOTIFY_CLIENT_ID", "SPOTIFY_CLIENT_SECRET")
}

fn fitbit(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "fitbit",
        "Fitbit",
        "https://www.fitbit.com/oauth2/authorize",
        "https://api.fitbit.com/oauth2/token",
    )
    .with_api_base("https://api.fitbit.com")
    .with_scopes(&["activity", "heartrate", "sleep", "profile"])
    .with_extra_auth_params(&[("prompt", "consent")])
    .with_basic_auth()
    .resolve_credentials(lookup, "FITBIT_CLIENT_ID", "FITBIT_CLIENT_SECRET")
}

fn dropbox(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "dropbox",
        "Dropbox",
        "https://www.dropbox.com/oauth2/authorize",
        "https://api.dropboxapi.com/oauth2/token",
    )
    .with_api_base("https://api.dropboxapi.com/2")
    .with_scopes(&[
        "files.metadata.read",
        "files.content.read",
        "account_info.read",
    ])
    .with_extra_auth_params(&[("token_access_type", "offline"), ("force_reapprove", "true")])
    .resolve_credentials(lookup, "DROPBOX_APP_KEY", "DROPBOX_APP_SECRET")
}

fn microsoft365(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "microsoft365",
        "Microsoft 365",
        "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
        "https://login.microsoftonline.com/common/oauth2/v2.0/token",
    )
    .with_api_base("https://graph.microsoft.com/v1.0")
    .with_scopes(&[
        "User.Read",
        "Mail.Read",
        "Mail.ReadWrite",
        "Mail.Send",
        "Calendars.Read",
        "Calendars.ReadWrite",
        "Contacts.Read",
        "offline_access",
    ])
    .with_extra_auth_params(&[("prompt", "consent")])
    .resolve_credentials(lookup, "AZURE_CLIENT_ID", "AZURE_CLIENT_SECRET")
}

fn github(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "github",
        "GitHub",
        "https://github.com/login/oauth/authorize",
        "https://github.com/login/oauth/access_token",
    )
    .with_api_base("https://api.github.com")
    .with_scopes(&["repo"])
    .with_extra_auth_params(&[])
    .never_expiring()
    .resolve_credentials(lookup, "GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET")
}

fn twitter(lookup: &dyn Fn(&str) -> Option<String>) -> ProviderConfig {
    ProviderConfig::new(
        "twitter",
        "X (Twitter)",
        "https://twitter.com/i/oauth2/authorize",
        "https://api.twitter.com/2/oauth2/token",
    )
    .with_api_base("https://api.twitter.com/2")
    .with_scopes(&["tweet.read", "tweet.write", "users.read", "offline.access"])
    .with_extra_auth_params(&[])
    .with_basic_auth()
    .with_pkce()
    .resolve_credentials(lookup, "TWITTER_CLIENT_ID", "TWITTER_CLIENT_SECRET")
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_builtin_providers_unconfigured_without_env() {
        let reg = ProviderRegistry::builtin(&|_| None);
        assert_eq!(reg.list().len(), 9);
        assert!(reg.list().iter().all(|p| !p.is_configured()));
        let err = reg.require("google").unwrap().ensure_configured().unwrap_err();
        assert!(matches!(err, Error::NotConfigured { .. }));
        assert!(err.to_string().contains("NANOBOTS_GOOGLE_CLIENT_ID"));
    }

    #[test]
    fn test_platform_prefix_wins_over_generic() {
        let lookup = lookup_from(&[
            ("NANOBOTS_GOOGLE_CLIENT_ID", "platform-id"),
            ("GOOGLE_CLIENT_ID", "generic-id"),
            ("GOOGLE_CLIENT_SECRET", "generic-secret"),
        ]);
        let reg = ProviderRegistry::builtin(&lookup);
        let google = reg.get("google").unwrap();
        assert_eq!(google.client_id, "platform-id");
        assert_eq!(google.client_secret(), "generic-secret");
        assert!(google.is_configured());
    }

    #[test]
    fn test_blank_env_values_count_as_unset() {
        let lookup = lookup_from(&[
            ("NANOBOTS_SPOTIFY_CLIENT_ID", "   "),
            ("SPOTIFY_CLIENT_ID", "generic"),
        ]);
        let reg = ProviderRegistry::builtin(&lookup);
        assert_eq!(reg.get("spotify").unwrap().client_id, "generic");
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut reg = ProviderRegistry::empty();
        reg.register(ProviderConfig::new("demo", "Demo", "https://a", "https://t"));
        reg.register(
            ProviderConfig::new("demo", "Demo", "https://a", "https://t")
                .with_credentials("id", "secret"),
        );
        assert_eq!(reg.list().len(), 1);
        assert!(reg.get("demo").unwrap().is_configured());
        assert!(matches!(
            reg.require("missing"),
            Err(Error::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_scope_separator_round_trip() {
        let todoist = ProviderRegistry::builtin(&|_| None)
            .get("todoist")
            .cloned()
            .unwrap();
        assert_eq!(todoist.joined_scopes(), "data:read_write,data:delete");
        assert_eq!(
            todoist.split_scopes("data:read_write,data:delete"),
            vec!["data:read_write", "data:delete"]
        );
        assert!(todoist.never_expires);
    }
}
