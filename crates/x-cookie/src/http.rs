use std::sync::Arc;

use {
    reqwest::header::{HeaderMap, HeaderName, HeaderValue},
    serde_json::{Map, Value, json},
    tracing::{debug, warn},
};

use crate::{
    constants::{
        DEFAULT_API_BASE, DEFAULT_BEARER_TOKEN, DEFAULT_BUNDLE_BASE, DEFAULT_HOME_URL,
        DEFAULT_USER_AGENT,
    },
    cookies::{CookieMap, cookie_header, has_required_cookies},
    discovery::{Discovery, Operation, QueryInfo},
    error::{Error, MAX_ERROR_BODY_CHARS, Result, truncate_body},
    features::{build_feature_map, build_field_toggle_map},
};

/// Hosts the client talks to.
#[derive(Debug, Clone)]
pub struct XEndpoints {
    /// Root of `/i/api/graphql/...`.
    pub api_base: String,
    /// Page the flag values and bundle references are mined from.
    pub home_url: String,
    /// Directory serving the web client's JS chunks.
    pub bundle_base: String,
}

impl Default for XEndpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            home_url: DEFAULT_HOME_URL.into(),
            bundle_base: DEFAULT_BUNDLE_BASE.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct XClientConfig {
    pub user_agent: String,
    pub bearer_token: String,
    pub endpoints: XEndpoints,
}

impl Default for XClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.into(),
            bearer_token: DEFAULT_BEARER_TOKEN.into(),
            endpoints: XEndpoints::default(),
        }
    }
}

impl XClientConfig {
    /// Defaults overridden by `X_USER_AGENT` and `X_BEARER_TOKEN`.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();
        if let Some(ua) = non_empty("X_USER_AGENT") {
            config.user_agent = ua;
        }
        if let Some(bearer) = non_empty("X_BEARER_TOKEN") {
            config.bearer_token = bearer;
        }
        config
    }

    pub fn from_env() -> Self {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn with_endpoints(mut self, endpoints: XEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

/// GraphQL transport authenticated by the browser session cookies.
pub struct XClient {
    http: reqwest::Client,
    config: XClientConfig,
    cookies: CookieMap,
    discovery: Arc<Discovery>,
}

impl XClient {
    pub fn new(config: XClientConfig, cookies: CookieMap) -> Result<Self> {
        if !has_required_cookies(&cookies) {
            return Err(Error::CookiesMissing);
        }
        let http = reqwest::Client::new();
        let discovery = Arc::new(Discovery::new(
            http.clone(),
            config.endpoints.home_url.clone(),
            config.endpoints.bundle_base.clone(),
        ));
        Ok(Self {
            http,
            config,
            cookies,
            discovery,
        })
    }

    /// Share a discovery cache across clients.
    pub fn with_discovery(mut self, discovery: Arc<Discovery>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn discovery(&self) -> &Arc<Discovery> {
        &self.discovery
    }

    pub fn config(&self) -> &XClientConfig {
        &self.config
    }

    fn request_headers(&self) -> HeaderMap {
        let mut pairs: Vec<(&'static str, String)> = vec![
            ("authorization", self.config.bearer_token.clone()),
            ("user-agent", self.config.user_agent.clone()),
            ("accept", "*/*".into()),
            ("accept-language", "en-US,en;q=0.9".into()),
            ("content-type", "application/json".into()),
            ("origin", "https://x.com".into()),
            ("referer", "https://x.com/".into()),
            (
                "sec-ch-ua",
                r#""Chromium";v="130", "Google Chrome";v="130", "Not?A_Brand";v="99""#.into(),
            ),
            ("sec-ch-ua-mobile", "?0".into()),
            ("sec-ch-ua-platform", r#""macOS""#.into()),
            ("sec-fetch-dest", "empty".into()),
            ("sec-fetch-mode", "cors".into()),
            ("sec-fetch-site", "same-origin".into()),
            ("x-twitter-active-user", "yes".into()),
            ("x-twitter-client-language", "en".into()),
        ];
        if self.cookies.contains_key("auth_token") {
            pairs.push(("x-twitter-auth-type", "OAuth2Session".into()));
        }
        if let Some(cookie) = cookie_header(&self.cookies) {
            pairs.push(("cookie", cookie));
        }
        if let Some(ct0) = self.cookies.get("ct0") {
            pairs.push(("x-csrf-token", ct0.clone()));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(name), value);
                },
                Err(_) => warn!(header = name, "skipping header with invalid value"),
            }
        }
        headers
    }

    fn graphql_url(&self, query_id: &str, operation: &str) -> String {
        format!(
            "{}/i/api/graphql/{query_id}/{operation}",
            self.config.endpoints.api_base.trim_end_matches('/')
        )
    }

    pub async fn resolve(&self, op: &Operation) -> Result<QueryInfo> {
        self.discovery
            .resolve_query_info(op, &self.config.user_agent)
            .await
    }

    pub async fn resolve_query_id(&self, op: &Operation) -> String {
        self.discovery
            .resolve_query_id(op, &self.config.user_agent)
            .await
    }

    /// Variables, features and toggles go out as JSON-encoded query parameters;
    /// empty feature or toggle maps are omitted.
    pub async fn graphql_get(
        &self,
        query_id: &str,
        operation: &str,
        variables: &Value,
        features: &Map<String, Value>,
        field_toggles: &Map<String, Value>,
    ) -> Result<Value> {
        let mut query = vec![("variables", serde_json::to_string(variables)?)];
        if !features.is_empty() {
            query.push(("features", serde_json::to_string(features)?));
        }
        if !field_toggles.is_empty() {
            query.push(("fieldToggles", serde_json::to_string(field_toggles)?));
        }
        debug!(operation, query_id, "graphql get");
        let resp = self
            .http
            .get(self.graphql_url(query_id, operation))
            .headers(self.request_headers())
            .query(&query)
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn graphql_post(
        &self,
        query_id: &str,
        operation: &str,
        variables: &Value,
        features: &Map<String, Value>,
        field_toggles: &Map<String, Value>,
    ) -> Result<Value> {
        let body = json!({
            "variables": variables,
            "features": features,
            "fieldToggles": field_toggles,
            "queryId": query_id,
        });
        debug!(operation, query_id, "graphql post");
        let resp = self
            .http
            .post(self.graphql_url(query_id, operation))
            .headers(self.request_headers())
            .body(serde_json::to_string(&body)?)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Resolve `op`, build its flag maps from the mined page and run it.
    pub(crate) async fn call_get(&self, op: &Operation, variables: Value) -> Result<Value> {
        let info = self.resolve(op).await?;
        let features = build_feature_map(&info.html, &info.feature_switches, op.feature_defaults);
        let toggles = build_field_toggle_map(&info.field_toggles);
        self.graphql_get(&info.query_id, op.name, &variables, &features, &toggles)
            .await
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            body: truncate_body(&text, MAX_ERROR_BODY_CHARS),
        });
    }
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            constants::FALLBACK_TWEET_QUERY_ID,
            test_support::{MockX, spawn, test_cookies},
        },
    };

    #[test]
    fn test_missing_cookie_rejected() {
        let mut cookies = test_cookies();
        cookies.remove("ct0");
        assert!(matches!(
            XClient::new(XClientConfig::default(), cookies),
            Err(Error::CookiesMissing)
        ));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = XClientConfig::from_lookup(&|key| match key {
            "X_USER_AGENT" => Some(" custom-ua ".into()),
            "X_BEARER_TOKEN" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.user_agent, "custom-ua");
        assert_eq!(config.bearer_token, DEFAULT_BEARER_TOKEN);
        assert_eq!(config.endpoints.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_request_headers() {
        let client = XClient::new(XClientConfig::default(), test_cookies()).unwrap();
        let headers = client.request_headers();
        assert_eq!(headers["authorization"], DEFAULT_BEARER_TOKEN);
        assert_eq!(headers["x-csrf-token"], "csrf-value");
        assert_eq!(headers["x-twitter-auth-type"], "OAuth2Session");
        assert_eq!(headers["cookie"], "auth_token=auth-value; ct0=csrf-value");
        assert_eq!(headers["user-agent"], DEFAULT_USER_AGENT);
    }

    #[tokio::test]
    async fn test_get_encodes_maps_as_query_params() {
        let mock = MockX::new("").with_reply("Probe", 200, json!({ "data": { "ok": true } }));
        let base = spawn(mock.router()).await;
        let client = mock.client(&base);

        let mut features = Map::new();
        features.insert("flag".into(), Value::Bool(false));
        let value = client
            .graphql_get("qid", "Probe", &json!({ "id": "1" }), &features, &Map::new())
            .await
            .unwrap();
        assert_eq!(value["data"]["ok"], true);

        let call = &mock.calls_to("Probe")[0];
        assert_eq!(call.method, reqwest::Method::GET);
        assert_eq!(call.query_id, "qid");
        assert_eq!(call.query_json("variables"), json!({ "id": "1" }));
        assert_eq!(call.query_json("features"), json!({ "flag": false }));
        assert!(!call.query.contains_key("fieldToggles"));
        assert_eq!(call.header("x-csrf-token"), Some("csrf-value"));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let mock = MockX::new("").with_reply("Mutate", 200, json!({ "data": {} }));
        let base = spawn(mock.router()).await;
        let client = mock.client(&base);

        client
            .graphql_post("qid-m", "Mutate", &json!({ "a": 1 }), &Map::new(), &Map::new())
            .await
            .unwrap();
        let call = &mock.calls_to("Mutate")[0];
        assert_eq!(call.method, reqwest::Method::POST);
        let body = call.body.clone().unwrap();
        assert_eq!(body["variables"]["a"], 1);
        assert_eq!(body["queryId"], "qid-m");
        assert_eq!(body["features"], json!({}));
    }

    #[tokio::test]
    async fn test_error_body_truncated() {
        let long = "e".repeat(1000);
        let mock = MockX::new("").with_reply("Probe", 429, json!({ "message": long }));
        let base = spawn(mock.router()).await;
        let client = mock.client(&base);

        let err = client
            .graphql_get("qid", "Probe", &json!({}), &Map::new(), &Map::new())
            .await
            .unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body.chars().count(), MAX_ERROR_BODY_CHARS);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_call_get_uses_fallback_descriptor_and_page_flags() {
        let html = r#"{"articles_preview_enabled":{"value":false}}"#;
        let mock = MockX::new(html).with_reply(
            "TweetResultByRestId",
            200,
            json!({ "data": {} }),
        );
        let base = spawn(mock.router()).await;
        let client = mock.client(&base);

        client
            .call_get(&Operation::tweet_result(), json!({ "tweetId": "5" }))
            .await
            .unwrap();
        let call = &mock.calls_to("TweetResultByRestId")[0];
        assert_eq!(call.query_id, FALLBACK_TWEET_QUERY_ID);
        let features = call.query_json("features");
        assert_eq!(features["articles_preview_enabled"], false);
        assert_eq!(features["view_counts_everywhere_api_enabled"], true);
        assert_eq!(call.query_json("fieldToggles")["withGrokAnalyze"], false);
    }
}
