use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use {
    chrono::{SecondsFormat, Utc},
    serde::Serialize,
    serde_json::{Value, json},
    tracing::{debug, warn},
};

use crate::{
    constants::{X_COOKIE_NAMES, X_REQUIRED_COOKIES},
    error::{Error, Result},
};

/// Cookie name to value. Ordered so the `cookie` header is deterministic.
pub type CookieMap = BTreeMap<String, String>;

/// Where X cookies come from: an optional explicit file, the state-dir file,
/// and environment values that override file values key by key.
#[derive(Debug, Clone)]
pub struct CookieSources {
    override_path: Option<PathBuf>,
    state_path: PathBuf,
    env: CookieMap,
}

impl CookieSources {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            override_path: None,
            state_path: state_dir.join("x-cookies").join("cookies.json"),
            env: CookieMap::new(),
        }
    }

    /// Read `X_COOKIE_PATH`, `X_AUTH_TOKEN` and `X_CT0` through `lookup`.
    pub fn from_lookup(state_dir: &Path, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut sources = Self::new(state_dir);
        sources.override_path = non_empty("X_COOKIE_PATH").map(PathBuf::from);
        if let Some(v) = non_empty("X_AUTH_TOKEN") {
            sources.env.insert("auth_token".into(), v);
        }
        if let Some(v) = non_empty("X_CT0") {
            sources.env.insert("ct0".into(), v);
        }
        sources
    }

    pub fn from_env(state_dir: &Path) -> Self {
        Self::from_lookup(state_dir, &|key| std::env::var(key).ok())
    }

    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_env_cookie(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    /// Files in search order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.override_path
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.state_path.as_path()))
    }

    /// The file `save` writes to.
    pub fn primary_path(&self) -> &Path {
        self.override_path.as_deref().unwrap_or(&self.state_path)
    }

    async fn load_file(&self) -> CookieMap {
        for path in self.paths() {
            let raw = match tokio::fs::read_to_string(path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(?path, error = %e, "failed to read cookie file");
                    continue;
                },
            };
            let map = filter_cookie_map(parse_cookie_file(&raw).unwrap_or_default());
            if !map.is_empty() {
                debug!(?path, "loaded x cookies");
                return map;
            }
        }
        CookieMap::new()
    }

    /// File cookies overlaid with environment cookies.
    pub async fn load(&self) -> CookieMap {
        let mut map = self.load_file().await;
        map.extend(self.env.clone());
        map
    }

    /// Like [`load`](Self::load) but rejects a set missing a required cookie.
    pub async fn require(&self) -> Result<CookieMap> {
        let map = self.load().await;
        if !has_required_cookies(&map) {
            return Err(Error::CookiesMissing);
        }
        Ok(map)
    }

    /// Persist `auth_token` and `ct0` to the primary cookie file.
    pub async fn save(&self, auth_token: &str, ct0: &str, source: &str) -> Result<PathBuf> {
        let mut cookies = CookieMap::new();
        cookies.insert("auth_token".into(), auth_token.to_string());
        cookies.insert("ct0".into(), ct0.to_string());
        let path = self.primary_path().to_path_buf();
        save_cookie_file(&path, &cookies, source).await?;
        Ok(path)
    }

    pub async fn status(&self) -> CookieStatus {
        let (origin, map) = if has_required_cookies(&self.env) {
            (Some(CookieOrigin::Env), self.env.clone())
        } else {
            let file = self.load_file().await;
            if has_required_cookies(&file) {
                (Some(CookieOrigin::File), file)
            } else {
                (None, CookieMap::new())
            }
        };
        CookieStatus {
            configured: origin.is_some(),
            source: origin,
            masked_auth_token: map.get("auth_token").map(String::as_str).map(mask),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieOrigin {
    Env,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieStatus {
    pub configured: bool,
    pub source: Option<CookieOrigin>,
    pub masked_auth_token: Option<String>,
}

fn mask(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}...")
}

/// Accepts `{cookieMap: {...}}`, `{cookies: {...}}` or a flat name/value object.
/// Non-string values are ignored.
pub fn parse_cookie_file(raw: &str) -> Option<CookieMap> {
    let data: Value = serde_json::from_str(raw).ok()?;
    let obj = data.as_object()?;
    let source = obj
        .get("cookieMap")
        .or_else(|| obj.get("cookies"))
        .and_then(Value::as_object)
        .unwrap_or(obj);
    let map: CookieMap = source
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
        .collect();
    (!map.is_empty()).then_some(map)
}

/// Keep only recognized, non-empty cookies.
pub fn filter_cookie_map(raw: CookieMap) -> CookieMap {
    raw.into_iter()
        .filter(|(k, v)| !v.is_empty() && X_COOKIE_NAMES.contains(&k.as_str()))
        .collect()
}

pub fn has_required_cookies(map: &CookieMap) -> bool {
    X_REQUIRED_COOKIES
        .iter()
        .all(|name| map.get(*name).is_some_and(|v| !v.is_empty()))
}

pub fn cookie_header(map: &CookieMap) -> Option<String> {
    let header = map
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ");
    (!header.is_empty()).then_some(header)
}

/// Write `{version, updatedAt, cookieMap, source}`, creating parent directories.
pub async fn save_cookie_file(path: &Path, cookies: &CookieMap, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = json!({
        "version": 1,
        "updatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "cookieMap": cookies,
        "source": source,
    });
    tokio::fs::write(path, serde_json::to_string_pretty(&payload)?).await?;
    debug!(?path, "saved x cookies");
    Ok(())
}
