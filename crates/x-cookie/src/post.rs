use {
    serde_json::{Value, json},
    tracing::{info, warn},
};

use crate::{
    constants::{FALLBACK_TWEET_FEATURE_SWITCHES, FALLBACK_TWEET_FIELD_TOGGLES},
    discovery::Operation,
    error::{Error, MAX_ERROR_BODY_CHARS, Result, truncate_body},
    features::{build_feature_map, build_field_toggle_map, to_owned_list},
    http::XClient,
    types::{PostedTweet, Thread},
};

fn create_tweet_variables(text: &str, reply_to: Option<&str>) -> Value {
    let mut variables = json!({
        "tweet_text": text,
        "dark_request": false,
        "media": { "media_entities": [], "possibly_sensitive": false },
        "semantic_annotation_ids": [],
    });
    if let Some(id) = reply_to {
        variables["reply"] = json!({
            "in_reply_to_tweet_id": id,
            "exclude_reply_user_ids": [],
        });
    }
    variables
}

impl XClient {
    /// Post `text`, optionally as a reply. The mutation id is not mined.
    pub async fn post_tweet(&self, text: &str, reply_to: Option<&str>) -> Result<PostedTweet> {
        let op = Operation::create_tweet();
        let features = build_feature_map("", &to_owned_list(FALLBACK_TWEET_FEATURE_SWITCHES), &[]);
        let toggles = build_field_toggle_map(&to_owned_list(FALLBACK_TWEET_FIELD_TOGGLES));
        let response = self
            .graphql_post(
                op.fallback_query_id,
                op.name,
                &create_tweet_variables(text, reply_to),
                &features,
                &toggles,
            )
            .await?;

        let failed = || {
            let detail = response.get("errors").unwrap_or(&response).to_string();
            Error::CreateTweetFailed(truncate_body(&detail, MAX_ERROR_BODY_CHARS))
        };
        let result = response
            .pointer("/data/create_tweet/tweet_results/result")
            .ok_or_else(failed)?;
        let tweet_id = result
            .get("rest_id")
            .or_else(|| result.pointer("/legacy/id_str"))
            .and_then(Value::as_str)
            .ok_or_else(failed)?
            .to_string();
        let text = result
            .pointer("/legacy/full_text")
            .and_then(Value::as_str)
            .unwrap_or(text)
            .to_string();
        info!(tweet_id = %tweet_id, reply = reply_to.is_some(), "posted tweet");
        Ok(PostedTweet { tweet_id, text })
    }

    /// Post `texts` in order, each replying to the previous one. Posts already
    /// made stay up when a later one fails; they are carried in the error.
    pub async fn post_thread(&self, texts: &[String]) -> Result<Thread> {
        let mut posted: Vec<PostedTweet> = Vec::with_capacity(texts.len());
        for text in texts {
            let reply_to = posted.last().map(|t| t.tweet_id.clone());
            match self.post_tweet(text, reply_to.as_deref()).await {
                Ok(tweet) => posted.push(tweet),
                Err(e) => {
                    warn!(posted = posted.len(), error = %e, "thread interrupted");
                    return Err(Error::ThreadInterrupted {
                        posted,
                        source: Box::new(e),
                    });
                },
            }
        }
        Ok(Thread::new(posted))
    }
}
