//! Runtime configuration: an optional `nanobots.toml` plus environment overrides.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    directories::ProjectDirs,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

pub const CONFIG_FILE: &str = "nanobots.toml";

/// Overrides `state_dir` from the file.
pub const STATE_DIR_ENV: &str = "NANOBOTS_STATE_DIR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NanobotsConfig {
    /// Where tokens and cookies are kept.
    pub state_dir: Option<PathBuf>,
    pub server: ServerConfig,
    pub x: XConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Externally visible base URL, used for OAuth redirect URIs.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
            public_url: None,
        }
    }
}

/// Fallbacks for the `X_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XConfig {
    pub user_agent: Option<String>,
    pub bearer_token: Option<String>,
    pub cookie_path: Option<PathBuf>,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "nanobots", "nanobots")
}

impl NanobotsConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid nanobots config")
    }

    /// `<config dir>/nanobots.toml` for this platform.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load `path`, or the default location when `None`. A missing default
    /// file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(path = %path.display(), "loaded config");
                Self::from_toml(&raw).with_context(|| format!("in {}", path.display()))
            },
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            },
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// `NANOBOTS_STATE_DIR`, then the file's `state_dir`, then the platform
    /// data directory.
    pub fn resolve_state_dir(&self, env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(dir) = env(STATE_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            return PathBuf::from(dir.trim());
        }
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".nanobots"))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.resolve_state_dir(&|key| std::env::var(key).ok())
    }

    /// Environment value for `key`, falling back to the matching `[x]` setting.
    pub fn lookup(&self, env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
        env(key).filter(|v| !v.trim().is_empty()).or_else(|| match key {
            "X_USER_AGENT" => self.x.user_agent.clone(),
            "X_BEARER_TOKEN" => self.x.bearer_token.clone(),
            "X_COOKIE_PATH" => self
                .x
                .cookie_path
                .as_ref()
                .map(|p| p.display().to_string()),
            _ => None,
        })
    }
}
