use crate::types::PostedTweet;

/// Maximum number of characters of an X error body kept in [`Error::Api`].
pub const MAX_ERROR_BODY_CHARS: usize = 400;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "X (Twitter) cookies not configured. Go to Nanobots Setup → Services → X Cookie to set up auth_token and ct0."
    )]
    CookiesMissing,

    #[error("X API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("User @{0} not found")]
    UserNotFound(String),

    #[error("Failed to create tweet: {0}")]
    CreateTweetFailed(String),

    #[error("thread stopped after {} posted tweets: {source}", .posted.len())]
    ThreadInterrupted {
        posted: Vec<PostedTweet>,
        source: Box<Error>,
    },

    #[error("Invalid tweet ID or URL: {0}")]
    InvalidTweetRef(String),

    #[error("Invalid article ID or URL: {0}")]
    InvalidArticleRef(String),

    #[error("This is an X Article URL, fetch it as an article instead: {0}")]
    ArticleUrl(String),

    #[error("Failed to fetch article {id}: {}", .reasons.join("; "))]
    ArticleUnavailable { id: String, reasons: Vec<String> },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why one discovery attempt produced nothing. Resolution turns every one of
/// these into the fallback descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("bundle fetch failed: {0}")]
    Fetch(String),

    #[error("no {0} reference in home page")]
    NoBundleReference(String),

    #[error("operation {0} absent from bundle")]
    OperationAbsent(String),

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_interrupted_keeps_prefix() {
        let err = Error::ThreadInterrupted {
            posted: vec![PostedTweet {
                tweet_id: "1".into(),
                text: "first".into(),
            }],
            source: Box::new(Error::Api {
                status: 403,
                body: "locked".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("after 1 posted"));
        assert!(msg.contains("X API error (403): locked"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body(&"a".repeat(500), 400).len(), 400);
        assert_eq!(truncate_body("ok", 400), "ok");
    }
}
