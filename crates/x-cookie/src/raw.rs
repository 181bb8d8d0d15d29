//! Wire shapes of GraphQL responses. Every field is optional and a field of
//! the wrong type reads as absent, so one odd entry never fails a whole page.

use std::sync::LazyLock;

use {
    regex::Regex,
    serde::{Deserialize, Deserializer, de::DeserializeOwned},
    serde_json::Value,
};

use crate::types::{ArticleSummary, Tweet};

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Like `lenient`, but per element: items of the wrong shape are dropped and
/// their siblings kept.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(seq_from_value(Some(&value)))
}

fn seq_from_value<T: DeserializeOwned>(value: Option<&Value>) -> Option<Vec<T>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
    )
}

/// Read `value` as `T`, treating any mismatch as absence.
pub(crate) fn from_value<T: DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, bound(deserialize = "T: DeserializeOwned + Default"))]
pub(crate) struct RawResult<T> {
    #[serde(deserialize_with = "lenient")]
    pub result: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawTweet {
    #[serde(rename = "__typename", deserialize_with = "lenient")]
    pub typename: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub rest_id: Option<String>,
    /// Set when the result is a visibility envelope.
    #[serde(deserialize_with = "lenient")]
    pub tweet: Option<Box<RawTweet>>,
    #[serde(deserialize_with = "lenient")]
    pub core: Option<RawCore>,
    #[serde(deserialize_with = "lenient")]
    pub legacy: Option<RawLegacy>,
    #[serde(deserialize_with = "lenient")]
    pub article: Option<RawArticleRef>,
    #[serde(deserialize_with = "lenient")]
    pub article_results: Option<RawResult<RawArticle>>,
    #[serde(deserialize_with = "lenient")]
    pub note_tweet: Option<RawNoteTweet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawCore {
    #[serde(deserialize_with = "lenient")]
    pub user_results: Option<RawResult<RawUser>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawUser {
    #[serde(deserialize_with = "lenient")]
    pub rest_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub legacy: Option<RawUserNames>,
    #[serde(deserialize_with = "lenient")]
    pub core: Option<RawUserNames>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawUserNames {
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub screen_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawLegacy {
    #[serde(deserialize_with = "lenient")]
    pub id_str: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub full_text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub reply_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub retweet_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub favorite_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub quote_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub bookmark_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub article: Option<RawArticleRef>,
    #[serde(deserialize_with = "lenient")]
    pub entities: Option<RawEntities>,
}

/// `{article_results: {result}}` or `{result}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawArticleRef {
    #[serde(deserialize_with = "lenient")]
    pub article_results: Option<RawResult<RawArticle>>,
    #[serde(deserialize_with = "lenient")]
    pub result: Option<RawArticle>,
}

impl RawArticleRef {
    fn entity(&self) -> Option<&RawArticle> {
        self.article_results
            .as_ref()
            .and_then(|r| r.result.as_ref())
            .or(self.result.as_ref())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct RawArticle {
    #[serde(deserialize_with = "lenient")]
    pub rest_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub plain_text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub preview_text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub content_state: Option<RawContentState>,
    #[serde(deserialize_with = "lenient")]
    pub cover_media: Option<RawCoverMedia>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct RawContentState {
    #[serde(deserialize_with = "lenient_seq")]
    pub blocks: Option<Vec<RawBlock>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct RawBlock {
    #[serde(deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: Option<String>,
}

impl RawBlock {
    fn render(&self) -> String {
        let text = self.text.as_deref().unwrap_or_default();
        match self.kind.as_deref() {
            Some("header-one") => format!("# {text}"),
            Some("header-two") => format!("## {text}"),
            Some("header-three") => format!("### {text}"),
            Some("blockquote") => format!("> {text}"),
            Some("unordered-list-item") => format!("- {text}"),
            Some("ordered-list-item") => format!("1. {text}"),
            _ => text.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct RawCoverMedia {
    #[serde(deserialize_with = "lenient")]
    pub media_info: Option<RawMediaInfo>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct RawMediaInfo {
    #[serde(deserialize_with = "lenient")]
    pub original_img_url: Option<String>,
}

impl RawArticle {
    /// Content blocks rendered one per paragraph.
    pub fn block_text(&self) -> Option<String> {
        let blocks = self.content_state.as_ref()?.blocks.as_ref()?;
        if blocks.is_empty() {
            return None;
        }
        Some(
            blocks
                .iter()
                .map(RawBlock::render)
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }

    /// Best available body: plain text, then rendered blocks, then preview.
    /// Empty when none is present.
    pub fn text(&self) -> String {
        let non_blank = |s: &Option<String>| s.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        non_blank(&self.plain_text)
            .or_else(|| self.block_text())
            .or_else(|| non_blank(&self.preview_text))
            .unwrap_or_default()
    }

    pub fn cover_image(&self) -> Option<String> {
        self.cover_media
            .as_ref()?
            .media_info
            .as_ref()?
            .original_img_url
            .clone()
    }

    pub fn summary(&self) -> ArticleSummary {
        ArticleSummary {
            url: self
                .rest_id
                .as_ref()
                .map(|id| format!("https://x.com/i/article/{id}")),
            article_id: self.rest_id.clone(),
            title: self.title.clone(),
            plain_text: self.plain_text.clone(),
            content_text: self.block_text(),
            preview_text: self.preview_text.clone(),
            cover_image: self.cover_image(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawEntities {
    #[serde(deserialize_with = "lenient_seq")]
    pub urls: Option<Vec<RawUrl>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawUrl {
    #[serde(deserialize_with = "lenient")]
    pub expanded_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawNoteTweet {
    #[serde(deserialize_with = "lenient")]
    pub note_tweet_results: Option<RawResult<RawNoteResult>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawNoteResult {
    #[serde(deserialize_with = "lenient")]
    pub entity_set: Option<RawEntities>,
}

static ARTICLE_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/(?:i/)?article/(\d+)").ok());

fn article_id_from_urls(entities: Option<&RawEntities>) -> Option<String> {
    let re = ARTICLE_PATH.as_ref()?;
    entities?.urls.as_ref()?.iter().find_map(|u| {
        let candidate = u.expanded_url.as_deref().or(u.url.as_deref())?;
        re.captures(candidate).map(|caps| caps[1].to_string())
    })
}

impl RawTweet {
    /// Strip a `TweetWithVisibilityResults` envelope.
    pub fn unwrap_visibility(mut self) -> RawTweet {
        if self.typename.as_deref() == Some("TweetWithVisibilityResults")
            && let Some(inner) = self.tweet.take()
        {
            return *inner;
        }
        self
    }

    pub fn id(&self) -> Option<String> {
        self.rest_id
            .clone()
            .or_else(|| self.legacy.as_ref().and_then(|l| l.id_str.clone()))
    }

    /// The embedded article, wherever this shape of tweet keeps it.
    pub fn article_entity(&self) -> Option<&RawArticle> {
        self.article
            .as_ref()
            .and_then(RawArticleRef::entity)
            .or_else(|| {
                self.legacy
                    .as_ref()
                    .and_then(|l| l.article.as_ref())
                    .and_then(RawArticleRef::entity)
            })
            .or_else(|| self.article_results.as_ref().and_then(|r| r.result.as_ref()))
    }

    /// Article id from the embedded entity or from linked article URLs.
    pub fn article_id(&self) -> Option<String> {
        if let Some(id) = self.article_entity().and_then(|a| a.rest_id.clone()) {
            return Some(id);
        }
        let note = self
            .note_tweet
            .as_ref()
            .and_then(|n| n.note_tweet_results.as_ref())
            .and_then(|r| r.result.as_ref())
            .and_then(|r| r.entity_set.as_ref());
        article_id_from_urls(note)
            .or_else(|| article_id_from_urls(self.legacy.as_ref().and_then(|l| l.entities.as_ref())))
    }

    fn user_names(&self) -> (Option<String>, Option<String>) {
        let user = self
            .core
            .as_ref()
            .and_then(|c| c.user_results.as_ref())
            .and_then(|r| r.result.as_ref());
        let pick = |f: fn(&RawUserNames) -> Option<&String>| {
            user.and_then(|u| {
                u.legacy
                    .as_ref()
                    .and_then(f)
                    .or_else(|| u.core.as_ref().and_then(f))
                    .cloned()
            })
        };
        (pick(|n| n.name.as_ref()), pick(|n| n.screen_name.as_ref()))
    }

    pub fn to_tweet(&self) -> Tweet {
        let legacy = self.legacy.as_ref();
        let count = |f: fn(&RawLegacy) -> Option<u64>| legacy.and_then(f).unwrap_or(0);
        let (name, screen_name) = self.user_names();
        Tweet {
            tweet_id: self.id(),
            author: name.map(|name| {
                format!("{name} (@{})", screen_name.as_deref().unwrap_or_default())
            }),
            username: screen_name,
            text: legacy
                .and_then(|l| l.full_text.clone())
                .unwrap_or_default(),
            created_at: legacy.and_then(|l| l.created_at.clone()),
            reply_count: count(|l| l.reply_count),
            retweet_count: count(|l| l.retweet_count),
            like_count: count(|l| l.favorite_count),
            quote_count: count(|l| l.quote_count),
            bookmark_count: count(|l| l.bookmark_count),
            url: self
                .rest_id
                .as_ref()
                .map(|id| format!("https://x.com/i/status/{id}")),
            article: self.article_entity().map(RawArticle::summary),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawInstruction {
    #[serde(deserialize_with = "lenient_seq")]
    pub entries: Option<Vec<RawEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawEntry {
    #[serde(deserialize_with = "lenient")]
    pub content: Option<RawEntryContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawEntryContent {
    #[serde(rename = "itemContent", deserialize_with = "lenient")]
    pub item_content: Option<RawItemContent>,
    #[serde(deserialize_with = "lenient_seq")]
    pub items: Option<Vec<RawModuleItem>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawItemContent {
    #[serde(deserialize_with = "lenient")]
    pub tweet_results: Option<RawResult<RawTweet>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawModuleItem {
    #[serde(deserialize_with = "lenient")]
    pub item: Option<RawModuleItemBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawModuleItemBody {
    #[serde(rename = "itemContent", deserialize_with = "lenient")]
    pub item_content: Option<RawItemContent>,
}

fn item_tweet(content: Option<RawItemContent>) -> Option<RawTweet> {
    content?
        .tweet_results?
        .result
        .map(RawTweet::unwrap_visibility)
}

impl RawEntry {
    /// The entry's own tweet.
    pub fn tweet(&mut self) -> Option<RawTweet> {
        item_tweet(self.content.as_mut()?.item_content.take())
    }

    /// Tweets inside a module entry, in order.
    pub fn module_tweets(&mut self) -> Vec<RawTweet> {
        self.content
            .as_mut()
            .and_then(|c| c.items.take())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| item_tweet(item.item?.item_content))
            .collect()
    }
}

/// Entries of all instructions in order.
pub(crate) fn entries(instructions: Option<&Value>) -> Vec<RawEntry> {
    seq_from_value::<RawInstruction>(instructions)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|i| i.entries.unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use {super::*, crate::test_support::tweet_json, serde_json::json};

    #[test]
    fn test_visibility_envelope_unwrapped() {
        let raw: RawTweet = serde_json::from_value(json!({
            "__typename": "TweetWithVisibilityResults",
            "tweet": tweet_json("42", "hidden", "alice"),
        }))
        .unwrap();
        let tweet = raw.unwrap_visibility().to_tweet();
        assert_eq!(tweet.tweet_id.as_deref(), Some("42"));
        assert_eq!(tweet.author.as_deref(), Some("alice name (@alice)"));
        assert_eq!(tweet.like_count, 3);
        assert_eq!(tweet.url.as_deref(), Some("https://x.com/i/status/42"));
    }

    #[test]
    fn test_wrong_types_read_as_absent() {
        let raw: RawTweet = serde_json::from_value(json!({
            "rest_id": 7,
            "legacy": { "id_str": "7", "full_text": ["not", "text"], "favorite_count": "many" },
            "core": "garbage",
        }))
        .unwrap();
        let tweet = raw.to_tweet();
        assert_eq!(tweet.tweet_id.as_deref(), Some("7"));
        assert_eq!(tweet.text, "");
        assert_eq!(tweet.like_count, 0);
        assert_eq!(tweet.author, None);
        assert_eq!(tweet.url, None);
    }

    #[test]
    fn test_user_names_from_newer_core_shape() {
        let raw: RawTweet = serde_json::from_value(json!({
            "rest_id": "1",
            "core": { "user_results": { "result": {
                "core": { "name": "Bob", "screen_name": "bob" }
            } } },
        }))
        .unwrap();
        assert_eq!(raw.to_tweet().author.as_deref(), Some("Bob (@bob)"));
    }

    #[test]
    fn test_article_text_precedence() {
        let blocks: RawArticle = serde_json::from_value(json!({
            "plain_text": "  ",
            "preview_text": "preview",
            "content_state": { "blocks": [
                { "type": "header-one", "text": "Title" },
                { "type": "unstyled", "text": "Body" },
                { "type": "ordered-list-item", "text": "first" },
                { "type": "blockquote" },
            ] },
        }))
        .unwrap();
        assert_eq!(blocks.text(), "# Title\n\nBody\n\n1. first\n\n> ");

        let plain: RawArticle =
            serde_json::from_value(json!({ "plain_text": "plain", "preview_text": "p" })).unwrap();
        assert_eq!(plain.text(), "plain");

        let preview: RawArticle =
            serde_json::from_value(json!({ "content_state": { "blocks": [] }, "preview_text": "p" }))
                .unwrap();
        assert_eq!(preview.text(), "p");
        assert_eq!(RawArticle::default().text(), "");
    }

    #[test]
    fn test_article_id_sources() {
        let embedded: RawTweet = serde_json::from_value(json!({
            "legacy": { "article": { "result": { "rest_id": "900", "title": "T" } } },
        }))
        .unwrap();
        assert_eq!(embedded.article_id().as_deref(), Some("900"));
        assert_eq!(
            embedded.to_tweet().article.unwrap().url.as_deref(),
            Some("https://x.com/i/article/900")
        );

        let linked: RawTweet = serde_json::from_value(json!({
            "note_tweet": { "note_tweet_results": { "result": { "entity_set": { "urls": [
                { "url": "https://t.co/x" },
                { "expanded_url": "https://x.com/i/article/123" },
            ] } } } },
        }))
        .unwrap();
        assert_eq!(linked.article_id().as_deref(), Some("123"));
    }

    #[test]
    fn test_entries_flatten_instructions() {
        let instructions = json!([
            { "type": "TimelineClearCache" },
            { "entries": [
                { "content": { "itemContent": { "tweet_results": { "result": tweet_json("1", "a", "u") } } } },
                { "content": { "items": [
                    { "item": { "itemContent": { "tweet_results": { "result": tweet_json("2", "b", "u") } } } },
                    { "item": {} },
                ] } },
            ] },
        ]);
        let mut entries = entries(Some(&instructions));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tweet().unwrap().id().as_deref(), Some("1"));
        assert!(entries[1].tweet().is_none());
        assert_eq!(entries[1].module_tweets().len(), 1);
        assert!(super::entries(None).is_empty());
    }

    #[test]
    fn test_junk_siblings_are_skipped() {
        let instructions = json!([
            "junk",
            null,
            { "entries": [
                "junk",
                { "content": { "itemContent": { "tweet_results": { "result": tweet_json("1", "a", "u") } } } },
                7,
                { "content": { "items": [
                    null,
                    { "item": { "itemContent": { "tweet_results": { "result": tweet_json("2", "b", "u") } } } },
                ] } },
            ] },
        ]);
        let mut entries = entries(Some(&instructions));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tweet().unwrap().id().as_deref(), Some("1"));
        assert_eq!(entries[1].module_tweets().len(), 1);

        let article: RawArticle = serde_json::from_value(json!({
            "content_state": { "blocks": ["junk", { "type": "unstyled", "text": "Body" }] },
        }))
        .unwrap();
        assert_eq!(article.text(), "Body");
    }
}
