use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    types::{Token, TokenSummary},
};

/// File-backed token store: one `<provider>.json` per provider.
///
/// Concurrent writers are last-writer-wins; each write goes through a
/// temporary file and a rename so readers never observe a torn record.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<state_dir>/oauth_tokens`.
    pub fn in_state_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join("oauth_tokens"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, provider: &str) -> PathBuf {
        let file: String = provider
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }

    /// Persist a token, overwriting any prior value.
    pub async fn save(&self, provider: &str, token: &Token) -> Result<()> {
        if token.access_token().is_empty() {
            return Err(Error::EmptyAccessToken(provider.to_string()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(provider);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(provider, "saved oauth token");
        Ok(())
    }

    /// Load a token. Missing, unreadable and corrupt records all read as absent.
    pub async fn load(&self, provider: &str) -> Option<Token> {
        let path = self.path_for(provider);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(provider, error = %e, "failed to read oauth token");
                return None;
            },
        };
        match serde_json::from_str::<Token>(&raw) {
            Ok(token) if !token.access_token().is_empty() => Some(token),
            Ok(_) => {
                warn!(provider, "stored oauth token has an empty access token");
                None
            },
            Err(e) => {
                warn!(provider, error = %e, "failed to parse oauth token");
                None
            },
        }
    }

    /// Remove a token. Succeeds when there is nothing to remove.
    pub async fn delete(&self, provider: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(provider)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Summaries of every parseable record, sorted by provider.
    pub async fn list(&self) -> Vec<TokenSummary> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut summaries = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(?path, %e, "failed to read oauth token file");
                    continue;
                },
            };
            match serde_json::from_str::<Token>(&raw) {
                Ok(token) => summaries.push(token.summary()),
                Err(e) => warn!(?path, %e, "skipping corrupt oauth token file"),
            }
        }
        summaries.sort_by(|a, b| a.provider.cmp(&b.provider));
        summaries
    }
}
