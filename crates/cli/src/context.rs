use std::{path::PathBuf, sync::Arc};

use {
    nanobots_config::NanobotsConfig,
    nanobots_oauth::{OAuthFlow, ProviderRegistry, TokenStore},
    nanobots_x_cookie::{CookieSources, XClient, XClientConfig},
};

/// Loaded configuration plus constructors for the services commands share.
pub struct Context {
    pub config: NanobotsConfig,
    pub state_dir: PathBuf,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl Context {
    pub fn new(config: NanobotsConfig) -> Self {
        let state_dir = config.state_dir();
        Self { config, state_dir }
    }

    /// Environment first, then the `[x]` table of the config file.
    fn lookup(&self, key: &str) -> Option<String> {
        self.config.lookup(&env_var, key)
    }

    pub fn oauth_flow(&self) -> Arc<OAuthFlow> {
        Arc::new(OAuthFlow::new(
            Arc::new(ProviderRegistry::from_env()),
            Arc::new(TokenStore::in_state_dir(&self.state_dir)),
        ))
    }

    pub fn cookie_sources(&self) -> CookieSources {
        CookieSources::from_lookup(&self.state_dir, &|key| self.lookup(key))
    }

    pub async fn x_client(&self) -> anyhow::Result<XClient> {
        let cookies = self.cookie_sources().require().await?;
        let config = XClientConfig::from_lookup(&|key| self.lookup(key));
        Ok(XClient::new(config, cookies)?)
    }
}
