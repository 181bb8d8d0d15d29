use serde_json::json;

use crate::{
    constants::{FALLBACK_TWEET_FEATURE_SWITCHES, FALLBACK_TWEET_FIELD_TOGGLES},
    discovery::Operation,
    error::Result,
    features::{build_feature_map, build_field_toggle_map, to_owned_list},
    http::XClient,
    read::{clamp_count, timeline_tweets},
    types::SearchResults,
};

impl XClient {
    /// Latest tweets matching `query`. Flags are the last-known lists with
    /// default values; only the query id is discovered.
    pub async fn search_tweets(&self, query: &str, count: u32) -> Result<SearchResults> {
        let op = Operation::search_timeline();
        let query_id = self.resolve_query_id(&op).await;
        let features = build_feature_map("", &to_owned_list(FALLBACK_TWEET_FEATURE_SWITCHES), &[]);
        let toggles = build_field_toggle_map(&to_owned_list(FALLBACK_TWEET_FIELD_TOGGLES));
        let payload = self
            .graphql_get(
                &query_id,
                op.name,
                &json!({
                    "rawQuery": query,
                    "count": clamp_count(count),
                    "querySource": "typed_query",
                    "product": "Latest",
                }),
                &features,
                &toggles,
            )
            .await?;
        Ok(SearchResults {
            query: query.to_string(),
            tweets: timeline_tweets(&payload),
        })
    }
}
