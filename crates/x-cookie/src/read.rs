use {
    serde_json::{Map, Value, json},
    tracing::debug,
};

use crate::{
    constants::{MAX_COUNT, USER_BY_SCREEN_NAME_FEATURES},
    discovery::Operation,
    error::{Error, Result},
    http::XClient,
    raw::{self, RawArticle, RawResult, RawTweet, RawUser},
    types::{Article, Timeline, Tweet, TweetThread, UserTweets},
};

const TWEET_DETAIL_INSTRUCTIONS: &str = "/data/threaded_conversation_with_injections_v2/instructions";

/// Where each timeline-shaped response keeps its instructions.
const TIMELINE_INSTRUCTIONS: &[&str] = &[
    "/data/home/home_timeline_urt/instructions",
    "/data/user/result/timeline_v2/timeline/instructions",
    "/data/user/result/timeline/timeline/instructions",
    "/data/search_by_raw_query/search_timeline/timeline/instructions",
];

const ARTICLE_PLACEHOLDER: &str = "(Article content could not be extracted. Try fetching the tweet that links it instead.)";

fn tweet_detail_variables(focal_id: &str) -> Value {
    json!({
        "focalTweetId": focal_id,
        "with_rux_injections": false,
        "includePromotedContent": false,
        "withCommunity": true,
        "withQuickPromoteEligibilityTweetFields": true,
        "withBirdwatchNotes": true,
        "withVoice": true,
        "withV2Timeline": true,
    })
}

pub(crate) fn clamp_count(count: u32) -> u32 {
    count.clamp(1, MAX_COUNT)
}

/// Tweets of a timeline-shaped payload. Entries that are not tweets are skipped.
pub(crate) fn timeline_tweets(payload: &Value) -> Vec<Tweet> {
    let instructions = TIMELINE_INSTRUCTIONS
        .iter()
        .find_map(|pointer| payload.pointer(pointer));
    raw::entries(instructions)
        .into_iter()
        .filter_map(|mut entry| {
            entry
                .tweet()
                .or_else(|| entry.module_tweets().into_iter().next())
        })
        .map(|tweet| tweet.to_tweet())
        .collect()
}

impl XClient {
    /// A tweet and its visible replies. When the conversation lookup does not
    /// contain the tweet itself, it is fetched on its own.
    pub async fn get_tweet(&self, tweet_id: &str) -> Result<TweetThread> {
        let payload = self
            .call_get(&Operation::tweet_detail(), tweet_detail_variables(tweet_id))
            .await?;

        let mut focal = None;
        let mut replies = Vec::new();
        for mut entry in raw::entries(payload.pointer(TWEET_DETAIL_INSTRUCTIONS)) {
            let own = entry.tweet();
            for candidate in own.into_iter().chain(entry.module_tweets()) {
                let tweet = candidate.to_tweet();
                if tweet.tweet_id.as_deref() == Some(tweet_id) {
                    focal = Some(tweet);
                } else {
                    replies.push(tweet);
                }
            }
        }

        if focal.is_none() {
            debug!(tweet_id, "focal tweet missing from conversation, fetching directly");
            let payload = self
                .call_get(
                    &Operation::tweet_result(),
                    json!({
                        "tweetId": tweet_id,
                        "withCommunity": false,
                        "includePromotedContent": false,
                        "withVoice": true,
                    }),
                )
                .await?;
            focal = raw::from_value::<RawTweet>(payload.pointer("/data/tweetResult/result"))
                .map(|tweet| tweet.unwrap_visibility().to_tweet());
        }

        Ok(TweetThread {
            tweet: focal,
            replies,
        })
    }

    /// Probe the conversation lookup for a tweet embedding the article.
    async fn article_from_conversation(
        &self,
        article_id: &str,
    ) -> Result<Option<(RawArticle, Tweet)>> {
        let payload = self
            .call_get(&Operation::tweet_detail(), tweet_detail_variables(article_id))
            .await?;
        for mut entry in raw::entries(payload.pointer(TWEET_DETAIL_INSTRUCTIONS)) {
            let Some(tweet) = entry.tweet() else {
                continue;
            };
            if let Some(article) = tweet.article_entity()
                && (article.rest_id.as_deref() == Some(article_id) || article.title.is_some())
            {
                return Ok(Some((article.clone(), tweet.to_tweet())));
            }
        }
        Ok(None)
    }

    async fn article_by_id(&self, article_id: &str) -> Result<Option<RawArticle>> {
        let payload = self
            .call_get(
                &Operation::article_entity(),
                json!({ "articleEntityId": article_id }),
            )
            .await?;
        Ok(raw::from_value(
            payload
                .pointer("/data/article_result_by_rest_id/result")
                .or_else(|| payload.pointer("/data/article_result_by_rest_id"))
                .or_else(|| payload.pointer("/data/article_entity_result/result")),
        ))
    }

    /// A long-form article. Two lookups are tried; a failing lookup becomes a
    /// warning unless neither produced the article.
    pub async fn get_article(&self, article_id: &str) -> Result<Article> {
        let mut warnings = Vec::new();
        let mut entity = None;
        let mut tweet = None;

        match self.article_from_conversation(article_id).await {
            Ok(Some((article, source))) => {
                entity = Some(article);
                tweet = Some(source);
            },
            Ok(None) => {},
            Err(e) => warnings.push(format!("TweetDetail: {e}")),
        }

        let has_text = |a: &Option<RawArticle>| a.as_ref().is_some_and(|a| !a.text().is_empty());
        if !has_text(&entity) {
            match self.article_by_id(article_id).await {
                Ok(direct) if has_text(&direct) => entity = direct,
                Ok(direct) => {
                    if entity.is_none() {
                        entity = direct;
                    }
                },
                Err(e) => warnings.push(format!("ArticleEntityResultByRestId: {e}")),
            }
        }

        let Some(entity) = entity else {
            if !warnings.is_empty() {
                return Err(Error::ArticleUnavailable {
                    id: article_id.to_string(),
                    reasons: warnings,
                });
            }
            return Ok(article_record(article_id, None, None, warnings));
        };
        Ok(article_record(article_id, Some(&entity), tweet, warnings))
    }

    async fn resolve_user_id(&self, username: &str) -> Result<String> {
        let query_id = self
            .resolve_query_id(&Operation::user_by_screen_name())
            .await;
        let features: Map<String, Value> = USER_BY_SCREEN_NAME_FEATURES
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Bool(*v)))
            .collect();
        let mut toggles = Map::new();
        toggles.insert("withAuxiliaryUserLabels".into(), Value::Bool(false));
        let payload = self
            .graphql_get(
                &query_id,
                "UserByScreenName",
                &json!({ "screen_name": username, "withSafetyModeUserFields": true }),
                &features,
                &toggles,
            )
            .await?;
        raw::from_value::<RawResult<RawUser>>(payload.pointer("/data/user"))
            .and_then(|user| user.result)
            .and_then(|user| user.rest_id)
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    /// Recent tweets of `username` (with or without a leading `@`).
    pub async fn get_user_tweets(&self, username: &str, count: u32) -> Result<UserTweets> {
        let username = username.trim().trim_start_matches('@');
        let user_id = self.resolve_user_id(username).await?;
        let payload = self
            .call_get(
                &Operation::user_tweets(),
                json!({
                    "userId": user_id,
                    "count": clamp_count(count),
                    "includePromotedContent": false,
                    "withQuickPromoteEligibilityTweetFields": true,
                    "withVoice": true,
                    "withV2Timeline": true,
                }),
            )
            .await?;
        Ok(UserTweets {
            user: username.to_string(),
            tweets: timeline_tweets(&payload),
        })
    }

    /// The signed-in account's home timeline.
    pub async fn get_timeline(&self, count: u32) -> Result<Timeline> {
        let payload = self
            .call_get(
                &Operation::home_timeline(),
                json!({
                    "count": clamp_count(count),
                    "includePromotedContent": false,
                    "latestControlAvailable": true,
                    "requestContext": "launch",
                    "withCommunity": true,
                }),
            )
            .await?;
        Ok(Timeline {
            tweets: timeline_tweets(&payload),
        })
    }
}

fn article_record(
    article_id: &str,
    entity: Option<&RawArticle>,
    tweet: Option<Tweet>,
    warnings: Vec<String>,
) -> Article {
    let text = entity.map(RawArticle::text).unwrap_or_default();
    let (author, username, created_at) = match tweet {
        Some(t) => (t.author, t.username, t.created_at),
        None => (None, None, None),
    };
    Article {
        article_id: article_id.to_string(),
        title: entity.and_then(|e| e.title.clone()).unwrap_or_default(),
        text: if text.is_empty() {
            ARTICLE_PLACEHOLDER.to_string()
        } else {
            text
        },
        cover_image: entity.and_then(RawArticle::cover_image),
        url: format!("https://x.com/i/article/{article_id}"),
        author,
        username,
        created_at,
        warnings,
    }
}
