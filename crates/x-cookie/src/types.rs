use std::sync::LazyLock;

use {regex::Regex, serde::Serialize};

use crate::error::{Error, Result};

/// A tweet flattened out of whatever envelope the API returned it in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tweet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<String>,
    /// `Name (@handle)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub like_count: u64,
    pub quote_count: u64,
    pub bookmark_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<ArticleSummary>,
}

/// Article embedded in a tweet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

/// A focal tweet and the replies shown under it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TweetThread {
    #[serde(flatten)]
    pub tweet: Option<Tweet>,
    pub replies: Vec<Tweet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Article {
    pub article_id: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Failures of individual lookup strategies that did not sink the call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserTweets {
    pub user: String,
    pub tweets: Vec<Tweet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub tweets: Vec<Tweet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub tweets: Vec<Tweet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedTweet {
    pub tweet_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub thread: Vec<PostedTweet>,
    pub count: usize,
    /// Link to the first post.
    pub url: Option<String>,
}

impl Thread {
    pub fn new(thread: Vec<PostedTweet>) -> Self {
        let url = thread
            .first()
            .map(|t| format!("https://x.com/i/status/{}", t.tweet_id));
        Self {
            count: thread.len(),
            thread,
            url,
        }
    }
}

static STATUS_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:twitter\.com|x\.com)/\w+/status/(\d+)").ok());

static ARTICLE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:twitter\.com|x\.com)/i/article/(\d+)").ok());

fn captured_id(re: &LazyLock<Option<Regex>>, input: &str) -> Option<String> {
    let caps = re.as_ref()?.captures(input)?;
    Some(caps[1].to_string())
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Tweet id from a bare id or a status URL.
pub fn parse_tweet_ref(input: &str) -> Result<String> {
    if let Some(id) = captured_id(&STATUS_URL, input) {
        return Ok(id);
    }
    let trimmed = input.trim();
    if is_numeric_id(trimmed) {
        return Ok(trimmed.to_string());
    }
    if input.contains("x.com/i/article/") || input.contains("twitter.com/i/article/") {
        return Err(Error::ArticleUrl(input.to_string()));
    }
    Err(Error::InvalidTweetRef(input.to_string()))
}

/// Article id from a bare id or an article URL.
pub fn parse_article_ref(input: &str) -> Result<String> {
    if let Some(id) = captured_id(&ARTICLE_URL, input) {
        return Ok(id);
    }
    let trimmed = input.trim();
    if is_numeric_id(trimmed) {
        return Ok(trimmed.to_string());
    }
    Err(Error::InvalidArticleRef(input.to_string()))
}
