use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use {
    axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{HeaderMap, Method, StatusCode},
        response::{Html, IntoResponse, Response},
        routing::get,
    },
    serde_json::{Value, json},
};

use crate::{
    cookies::CookieMap,
    discovery::Discovery,
    http::{XClient, XClientConfig, XEndpoints},
};

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

pub fn test_cookies() -> CookieMap {
    [("auth_token", "auth-value"), ("ct0", "csrf-value")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub operation: String,
    pub query_id: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RecordedCall {
    /// A query parameter decoded as JSON.
    pub fn query_json(&self, key: &str) -> Value {
        self.query
            .get(key)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Stand-in for the web host, the bundle CDN and the GraphQL API.
#[derive(Clone)]
pub struct MockX {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    home_html: String,
    home_status: u16,
    home_hits: usize,
    bundles: HashMap<String, String>,
    bundle_hits: usize,
    replies: HashMap<String, Vec<(u16, Value)>>,
    calls: Vec<RecordedCall>,
}

impl MockX {
    pub fn new(home_html: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                home_html: home_html.to_string(),
                home_status: 200,
                home_hits: 0,
                bundles: HashMap::new(),
                bundle_hits: 0,
                replies: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn with_home_status(self, status: u16) -> Self {
        self.state().home_status = status;
        self
    }

    pub fn with_bundle(self, file: &str, js: &str) -> Self {
        self.state().bundles.insert(file.to_string(), js.to_string());
        self
    }

    /// Queue a reply for `operation`; the last queued reply repeats.
    pub fn with_reply(self, operation: &str, status: u16, body: Value) -> Self {
        self.state()
            .replies
            .entry(operation.to_string())
            .or_default()
            .push((status, body));
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(home))
            .route("/client-web/{file}", get(bundle))
            .route("/i/api/graphql/{query_id}/{operation}", get(graphql).post(graphql))
            .with_state(self.clone())
    }

    pub fn endpoints(&self, base: &str) -> XEndpoints {
        XEndpoints {
            api_base: base.to_string(),
            home_url: format!("{base}/"),
            bundle_base: format!("{base}/client-web"),
        }
    }

    pub fn discovery(&self, base: &str) -> Discovery {
        let endpoints = self.endpoints(base);
        Discovery::new(
            reqwest::Client::new(),
            endpoints.home_url,
            endpoints.bundle_base,
        )
    }

    pub fn client(&self, base: &str) -> XClient {
        let config = XClientConfig::default().with_endpoints(self.endpoints(base));
        XClient::new(config, test_cookies()).unwrap()
    }

    pub fn home_hits(&self) -> usize {
        self.state().home_hits
    }

    pub fn bundle_hits(&self) -> usize {
        self.state().bundle_hits
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn home(State(mock): State<MockX>) -> Response {
    let mut state = mock.state();
    state.home_hits += 1;
    let status = StatusCode::from_u16(state.home_status).unwrap_or(StatusCode::OK);
    (status, Html(state.home_html.clone())).into_response()
}

async fn bundle(State(mock): State<MockX>, Path(file): Path<String>) -> Response {
    let mut state = mock.state();
    match state.bundles.get(&file).cloned() {
        Some(js) => {
            state.bundle_hits += 1;
            js.into_response()
        },
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn graphql(
    State(mock): State<MockX>,
    Path((query_id, operation)): Path<(String, String)>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut state = mock.state();
    let idx = state.calls.iter().filter(|c| c.operation == operation).count();
    state.calls.push(RecordedCall {
        method,
        operation: operation.clone(),
        query_id,
        query,
        headers,
        body: serde_json::from_str(&body).ok(),
    });
    let reply = state.replies.get(&operation).and_then(|replies| {
        replies
            .get(idx.min(replies.len().saturating_sub(1)))
            .cloned()
    });
    match reply {
        Some((status, body)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "errors": [{ "message": "no scripted reply" }] })),
        )
            .into_response(),
    }
}

/// A GraphQL tweet result with the given id, text and author.
pub fn tweet_json(id: &str, text: &str, screen_name: &str) -> Value {
    json!({
        "__typename": "Tweet",
        "rest_id": id,
        "core": { "user_results": { "result": { "legacy": {
            "name": format!("{screen_name} name"),
            "screen_name": screen_name,
        } } } },
        "legacy": {
            "id_str": id,
            "full_text": text,
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "reply_count": 1,
            "retweet_count": 2,
            "favorite_count": 3,
            "quote_count": 4,
            "bookmark_count": 5,
        },
    })
}

/// A timeline entry wrapping a tweet result.
pub fn entry_json(tweet: Value) -> Value {
    json!({
        "entryId": "tweet",
        "content": { "itemContent": { "tweet_results": { "result": tweet } } },
    })
}
