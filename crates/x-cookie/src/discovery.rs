use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

use {
    regex::Regex,
    reqwest::header::USER_AGENT,
    tracing::{debug, info},
};

use crate::{
    constants::{
        FALLBACK_ARTICLE_FEATURE_SWITCHES, FALLBACK_ARTICLE_FIELD_TOGGLES,
        FALLBACK_ARTICLE_QUERY_ID, FALLBACK_CREATE_TWEET_QUERY_ID,
        FALLBACK_HOME_TIMELINE_QUERY_ID, FALLBACK_SEARCH_QUERY_ID,
        FALLBACK_TWEET_DETAIL_FEATURE_DEFAULTS, FALLBACK_TWEET_DETAIL_FEATURE_SWITCHES,
        FALLBACK_TWEET_DETAIL_FIELD_TOGGLES, FALLBACK_TWEET_DETAIL_QUERY_ID,
        FALLBACK_TWEET_FEATURE_SWITCHES, FALLBACK_TWEET_FIELD_TOGGLES, FALLBACK_TWEET_QUERY_ID,
        FALLBACK_USER_BY_SCREEN_NAME_QUERY_ID, FALLBACK_USER_TWEETS_QUERY_ID,
    },
    error::{DiscoveryError, Error, MAX_ERROR_BODY_CHARS, Result, truncate_body},
    features::to_owned_list,
};

/// Finds the URL of the JS chunk that defines GraphQL operations.
pub trait BundleLocator: Send + Sync {
    fn name(&self) -> &str;

    fn locate(&self, html: &str, bundle_base: &str) -> Result<String, DiscoveryError>;
}

static MAIN_BUNDLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"main\.([a-z0-9]+)\.js").ok());

/// `main.<hash>.js`, referenced directly from the home page.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainBundle;

impl BundleLocator for MainBundle {
    fn name(&self) -> &str {
        "main"
    }

    fn locate(&self, html: &str, bundle_base: &str) -> Result<String, DiscoveryError> {
        let caps = MAIN_BUNDLE
            .as_ref()
            .and_then(|re| re.captures(html))
            .ok_or_else(|| DiscoveryError::NoBundleReference(self.name().to_string()))?;
        Ok(format!(
            "{}/main.{}.js",
            bundle_base.trim_end_matches('/'),
            &caps[1]
        ))
    }
}

/// Lazily loaded chunk listed in the page's chunk map as `"bundle.<Name>":"<hash>"`.
#[derive(Debug, Clone)]
pub struct NamedBundle {
    name: String,
    pattern: Result<Regex, regex::Error>,
}

impl NamedBundle {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let pattern = Regex::new(&format!(
            r#""bundle\.{}":"([a-z0-9]+)""#,
            regex::escape(&name)
        ));
        Self { name, pattern }
    }
}

impl BundleLocator for NamedBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, html: &str, bundle_base: &str) -> Result<String, DiscoveryError> {
        let re = self.pattern.as_ref().map_err(|e| e.clone())?;
        let caps = re
            .captures(html)
            .ok_or_else(|| DiscoveryError::NoBundleReference(self.name.clone()))?;
        Ok(format!(
            "{}/bundle.{}.{}a.js",
            bundle_base.trim_end_matches('/'),
            self.name,
            &caps[1]
        ))
    }
}

/// Which path produced a [`QueryInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    Bundle { url: String },
    Fallback,
}

/// A GraphQL operation's current id and flag names.
#[derive(Debug, Clone)]
pub struct QueryInfo {
    pub query_id: String,
    pub feature_switches: Vec<String>,
    pub field_toggles: Vec<String>,
    /// Home page the flag values are read from.
    pub html: Arc<str>,
    pub source: DiscoverySource,
}

/// One GraphQL operation: its name, last-known descriptor and the ordered
/// ways of discovering the current one.
pub struct Operation {
    pub name: &'static str,
    pub fallback_query_id: &'static str,
    pub fallback_features: &'static [&'static str],
    pub fallback_toggles: &'static [&'static str],
    /// Values for flags the page does not mention.
    pub feature_defaults: &'static [(&'static str, bool)],
    pub locators: Vec<Box<dyn BundleLocator>>,
}

impl Operation {
    pub fn new(name: &'static str, fallback_query_id: &'static str) -> Self {
        Self {
            name,
            fallback_query_id,
            fallback_features: FALLBACK_TWEET_FEATURE_SWITCHES,
            fallback_toggles: FALLBACK_TWEET_FIELD_TOGGLES,
            feature_defaults: &[],
            locators: vec![Box::new(MainBundle)],
        }
    }

    pub fn with_fallback_flags(
        mut self,
        features: &'static [&'static str],
        toggles: &'static [&'static str],
    ) -> Self {
        self.fallback_features = features;
        self.fallback_toggles = toggles;
        self
    }

    pub fn with_feature_defaults(mut self, defaults: &'static [(&'static str, bool)]) -> Self {
        self.feature_defaults = defaults;
        self
    }

    pub fn with_locators(mut self, locators: Vec<Box<dyn BundleLocator>>) -> Self {
        self.locators = locators;
        self
    }

    pub fn tweet_detail() -> Self {
        Self::new("TweetDetail", FALLBACK_TWEET_DETAIL_QUERY_ID)
            .with_fallback_flags(
                FALLBACK_TWEET_DETAIL_FEATURE_SWITCHES,
                FALLBACK_TWEET_DETAIL_FIELD_TOGGLES,
            )
            .with_feature_defaults(FALLBACK_TWEET_DETAIL_FEATURE_DEFAULTS)
    }

    pub fn tweet_result() -> Self {
        Self::new("TweetResultByRestId", FALLBACK_TWEET_QUERY_ID)
    }

    pub fn article_entity() -> Self {
        Self::new("ArticleEntityResultByRestId", FALLBACK_ARTICLE_QUERY_ID)
            .with_fallback_flags(
                FALLBACK_ARTICLE_FEATURE_SWITCHES,
                FALLBACK_ARTICLE_FIELD_TOGGLES,
            )
            .with_locators(vec![
                Box::new(NamedBundle::new("TwitterArticles")),
                Box::new(MainBundle),
            ])
    }

    pub fn user_tweets() -> Self {
        Self::new("UserTweets", FALLBACK_USER_TWEETS_QUERY_ID)
    }

    pub fn home_timeline() -> Self {
        Self::new("HomeTimeline", FALLBACK_HOME_TIMELINE_QUERY_ID)
    }

    pub fn user_by_screen_name() -> Self {
        Self::new("UserByScreenName", FALLBACK_USER_BY_SCREEN_NAME_QUERY_ID)
    }

    pub fn search_timeline() -> Self {
        Self::new("SearchTimeline", FALLBACK_SEARCH_QUERY_ID)
    }

    pub fn create_tweet() -> Self {
        Self::new("CreateTweet", FALLBACK_CREATE_TWEET_QUERY_ID).with_locators(Vec::new())
    }

    /// The last-known descriptor, paired with `html`.
    pub fn fallback(&self, html: Arc<str>) -> QueryInfo {
        QueryInfo {
            query_id: self.fallback_query_id.to_string(),
            feature_switches: to_owned_list(self.fallback_features),
            field_toggles: to_owned_list(self.fallback_toggles),
            html,
            source: DiscoverySource::Fallback,
        }
    }
}

/// Mines operation descriptors from the web client. Home pages are cached per
/// user agent and chunks per URL, both for the life of the value.
pub struct Discovery {
    http: reqwest::Client,
    home_url: String,
    bundle_base: String,
    home_cache: Mutex<HashMap<String, Arc<str>>>,
    chunk_cache: Mutex<HashMap<String, Arc<str>>>,
}

impl Discovery {
    pub fn new(
        http: reqwest::Client,
        home_url: impl Into<String>,
        bundle_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            home_url: home_url.into(),
            bundle_base: bundle_base.into(),
            home_cache: Mutex::new(HashMap::new()),
            chunk_cache: Mutex::new(HashMap::new()),
        }
    }

    /// The home page as served to `user_agent`. Failure here is the one
    /// discovery failure that is surfaced.
    pub async fn home_html(&self, user_agent: &str) -> Result<Arc<str>> {
        if let Some(html) = cached(&self.home_cache, user_agent) {
            return Ok(html);
        }
        let resp = self
            .http
            .get(&self.home_url)
            .header(USER_AGENT, user_agent)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: truncate_body(&body, MAX_ERROR_BODY_CHARS),
            });
        }
        let html: Arc<str> = Arc::from(body);
        store(&self.home_cache, user_agent, Arc::clone(&html));
        Ok(html)
    }

    async fn chunk(&self, url: &str, user_agent: &str) -> Result<Arc<str>, DiscoveryError> {
        if let Some(js) = cached(&self.chunk_cache, url) {
            debug!(url, "bundle cache hit");
            return Ok(js);
        }
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| DiscoveryError::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DiscoveryError::Fetch(format!("{status} for {url}")));
        }
        let js: Arc<str> = Arc::from(
            resp.text()
                .await
                .map_err(|e| DiscoveryError::Fetch(e.to_string()))?,
        );
        store(&self.chunk_cache, url, Arc::clone(&js));
        Ok(js)
    }

    /// The operation's current descriptor, trying each locator in order and
    /// falling back to the last-known one.
    pub async fn resolve_query_info(&self, op: &Operation, user_agent: &str) -> Result<QueryInfo> {
        let html = self.home_html(user_agent).await?;
        for locator in &op.locators {
            match self.discover(op, locator.as_ref(), &html, user_agent).await {
                Ok(info) => return Ok(info),
                Err(e) => {
                    debug!(operation = op.name, locator = locator.name(), error = %e, "discovery missed");
                },
            }
        }
        info!(operation = op.name, "using fallback graphql descriptor");
        Ok(op.fallback(html))
    }

    async fn discover(
        &self,
        op: &Operation,
        locator: &dyn BundleLocator,
        html: &Arc<str>,
        user_agent: &str,
    ) -> Result<QueryInfo, DiscoveryError> {
        let url = locator.locate(html, &self.bundle_base)?;
        let js = self.chunk(&url, user_agent).await?;
        let found = extract_operation(&js, op.name)?;
        Ok(QueryInfo {
            query_id: found.query_id,
            feature_switches: if found.feature_switches.is_empty() {
                to_owned_list(op.fallback_features)
            } else {
                found.feature_switches
            },
            field_toggles: if found.field_toggles.is_empty() {
                to_owned_list(op.fallback_toggles)
            } else {
                found.field_toggles
            },
            html: Arc::clone(html),
            source: DiscoverySource::Bundle { url },
        })
    }

    /// Just the query id. Any failure, the home page included, yields the fallback.
    pub async fn resolve_query_id(&self, op: &Operation, user_agent: &str) -> String {
        match self.home_html(user_agent).await {
            Ok(html) => {
                for locator in &op.locators {
                    if let Ok(info) = self.discover(op, locator.as_ref(), &html, user_agent).await {
                        return info.query_id;
                    }
                }
            },
            Err(e) => debug!(operation = op.name, error = %e, "home page unavailable"),
        }
        op.fallback_query_id.to_string()
    }
}

fn cached(cache: &Mutex<HashMap<String, Arc<str>>>, key: &str) -> Option<Arc<str>> {
    cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

fn store(cache: &Mutex<HashMap<String, Arc<str>>>, key: &str, value: Arc<str>) {
    cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key.to_string(), value);
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ExtractedOperation {
    pub query_id: String,
    pub feature_switches: Vec<String>,
    pub field_toggles: Vec<String>,
}

/// Pull `queryId`, `featureSwitches` and `fieldToggles` for `operation` out of a chunk.
pub(crate) fn extract_operation(
    js: &str,
    operation: &str,
) -> Result<ExtractedOperation, DiscoveryError> {
    let name = regex::escape(operation);
    let query_id = Regex::new(&format!(r#"queryId:"([^"]+)",operationName:"{name}""#))?
        .captures(js)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| DiscoveryError::OperationAbsent(operation.to_string()))?;
    let list_after = |field: &str| -> Result<Vec<String>, DiscoveryError> {
        let re = Regex::new(&format!(
            r#"operationName:"{name}"(?s:.*?){field}:\[([^\]]*)\]"#
        ))?;
        Ok(re
            .captures(js)
            .map(|caps| parse_string_list(&caps[1]))
            .unwrap_or_default())
    };
    Ok(ExtractedOperation {
        query_id,
        feature_switches: list_after("featureSwitches")?,
        field_toggles: list_after("fieldToggles")?,
    })
}

fn parse_string_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches('"'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{MockX, spawn},
    };

    const CHUNK: &str = r#"e.exports={queryId:"qid-detail",operationName:"TweetDetail",operationType:"query",metadata:{featureSwitches:["flag_a","flag_b"],fieldToggles:["withArticlePlainText"]}};e.exports={queryId:"qid-user",operationName:"UserByScreenName",operationType:"query",metadata:{featureSwitches:[],fieldToggles:[]}}"#;

    #[test]
    fn test_extract_operation_reads_descriptor() {
        let found = extract_operation(CHUNK, "TweetDetail").unwrap();
        assert_eq!(found.query_id, "qid-detail");
        assert_eq!(found.feature_switches, vec!["flag_a", "flag_b"]);
        assert_eq!(found.field_toggles, vec!["withArticlePlainText"]);

        let user = extract_operation(CHUNK, "UserByScreenName").unwrap();
        assert_eq!(user.query_id, "qid-user");
        assert!(user.feature_switches.is_empty());

        assert!(matches!(
            extract_operation(CHUNK, "HomeTimeline"),
            Err(DiscoveryError::OperationAbsent(_))
        ));
    }

    #[test]
    fn test_locators() {
        let html = r#"<script src="https://abs.twimg.com/responsive-web/client-web/main.abc123.js"></script>
            <script>{"bundle.TwitterArticles":"f00d","bundle.Other":"beef"}</script>"#;
        assert_eq!(
            MainBundle.locate(html, "https://cdn/client-web/").unwrap(),
            "https://cdn/client-web/main.abc123.js"
        );
        assert_eq!(
            NamedBundle::new("TwitterArticles")
                .locate(html, "https://cdn/client-web")
                .unwrap(),
            "https://cdn/client-web/bundle.TwitterArticles.f00da.js"
        );
        assert!(matches!(
            NamedBundle::new("Missing").locate(html, "https://cdn"),
            Err(DiscoveryError::NoBundleReference(_))
        ));
    }

    #[tokio::test]
    async fn test_page_without_bundle_reference_uses_fallback() {
        let mock = MockX::new("<html>nothing to see</html>");
        let base = spawn(mock.router()).await;
        let discovery = mock.discovery(&base);
        let op = Operation::tweet_detail();

        let info = discovery.resolve_query_info(&op, "ua").await.unwrap();
        assert_eq!(info.source, DiscoverySource::Fallback);
        assert_eq!(info.query_id, FALLBACK_TWEET_DETAIL_QUERY_ID);
        assert_eq!(
            info.feature_switches,
            to_owned_list(FALLBACK_TWEET_DETAIL_FEATURE_SWITCHES)
        );
        assert_eq!(
            info.field_toggles,
            to_owned_list(FALLBACK_TWEET_DETAIL_FIELD_TOGGLES)
        );
    }

    #[tokio::test]
    async fn test_main_bundle_discovery_and_caching() {
        let mock = MockX::new(r#"<script src="/client-web/main.abc123.js"></script>"#)
            .with_bundle("main.abc123.js", CHUNK);
        let base = spawn(mock.router()).await;
        let discovery = mock.discovery(&base);
        let op = Operation::tweet_detail();

        let info = discovery.resolve_query_info(&op, "ua").await.unwrap();
        assert_eq!(info.query_id, "qid-detail");
        assert_eq!(info.feature_switches, vec!["flag_a", "flag_b"]);
        assert_eq!(
            info.source,
            DiscoverySource::Bundle {
                url: format!("{base}/client-web/main.abc123.js")
            }
        );

        // Empty lists in the bundle fall back per list.
        let user = discovery
            .resolve_query_info(&Operation::user_by_screen_name(), "ua")
            .await
            .unwrap();
        assert_eq!(user.query_id, "qid-user");
        assert_eq!(
            user.feature_switches,
            to_owned_list(FALLBACK_TWEET_FEATURE_SWITCHES)
        );

        assert_eq!(mock.home_hits(), 1);
        assert_eq!(mock.bundle_hits(), 1);

        discovery.resolve_query_info(&op, "other-ua").await.unwrap();
        assert_eq!(mock.home_hits(), 2);
    }

    #[tokio::test]
    async fn test_named_bundle_tried_before_main() {
        let articles = r#"{queryId:"qid-article",operationName:"ArticleEntityResultByRestId",metadata:{featureSwitches:["article_flag"],fieldToggles:[]}}"#;
        let mock = MockX::new(
            r#"<script src="/client-web/main.abc.js"></script>{"bundle.TwitterArticles":"cafe"}"#,
        )
        .with_bundle("main.abc.js", CHUNK)
        .with_bundle("bundle.TwitterArticles.cafea.js", articles);
        let base = spawn(mock.router()).await;
        let discovery = mock.discovery(&base);

        let info = discovery
            .resolve_query_info(&Operation::article_entity(), "ua")
            .await
            .unwrap();
        assert_eq!(info.query_id, "qid-article");
        assert_eq!(info.feature_switches, vec!["article_flag"]);
        assert_eq!(
            info.field_toggles,
            to_owned_list(FALLBACK_ARTICLE_FIELD_TOGGLES)
        );
    }

    #[tokio::test]
    async fn test_missing_chunk_falls_back() {
        let mock = MockX::new(r#"<script src="/client-web/main.gone.js"></script>"#);
        let base = spawn(mock.router()).await;
        let discovery = mock.discovery(&base);
        let info = discovery
            .resolve_query_info(&Operation::home_timeline(), "ua")
            .await
            .unwrap();
        assert_eq!(info.source, DiscoverySource::Fallback);
        assert_eq!(info.query_id, FALLBACK_HOME_TIMELINE_QUERY_ID);
    }

    #[tokio::test]
    async fn test_home_page_failure_is_surfaced_but_query_id_falls_back() {
        let mock = MockX::new("").with_home_status(503);
        let base = spawn(mock.router()).await;
        let discovery = mock.discovery(&base);
        let op = Operation::search_timeline();

        let err = discovery.resolve_query_info(&op, "ua").await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 503, .. }));
        assert_eq!(
            discovery.resolve_query_id(&op, "ua").await,
            FALLBACK_SEARCH_QUERY_ID
        );
    }

    #[test]
    fn test_parse_string_list() {
        assert_eq!(
            parse_string_list(r#" "a", "b" ,,"c""#),
            vec!["a", "b", "c"]
        );
        assert!(parse_string_list("").is_empty());
    }
}
