use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use axum::{
    Router,
    extract::State,
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::post,
};

use crate::{
    clock::ManualClock,
    flow::OAuthFlow,
    providers::{ProviderConfig, ProviderRegistry},
    storage::TokenStore,
};

pub const DEMO_NOW_MS: u64 = 1_700_000_000_000;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

/// A configured provider whose endpoints all live under `base`.
pub fn demo_provider(base: &str) -> ProviderConfig {
    ProviderConfig::new(
        "demo",
        "Demo",
        format!("{base}/authorize"),
        format!("{base}/token"),
    )
    .with_api_base(format!("{base}/api"))
    .with_scopes(&["read", "write"])
    .with_credentials("id", "secret")
}

pub fn demo_flow(dir: &Path, provider: ProviderConfig) -> (Arc<OAuthFlow>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(DEMO_NOW_MS));
    let mut registry = ProviderRegistry::empty();
    registry.register(provider);
    let flow = OAuthFlow::with_clock(
        Arc::new(registry),
        Arc::new(TokenStore::new(dir)),
        clock.clone(),
    );
    (Arc::new(flow), clock)
}

/// Token endpoint replaying scripted responses; the last one repeats.
#[derive(Clone)]
pub struct TokenEndpoint {
    inner: Arc<Mutex<EndpointState>>,
}

struct EndpointState {
    responses: Vec<(u16, String)>,
    requests: Vec<HashMap<String, String>>,
    authorizations: Vec<Option<String>>,
}

impl TokenEndpoint {
    pub fn new(responses: &[(u16, &str)]) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EndpointState {
                responses: responses
                    .iter()
                    .map(|(status, body)| (*status, body.to_string()))
                    .collect(),
                requests: Vec::new(),
                authorizations: Vec::new(),
            })),
        }
    }

    /// Router serving `POST /token`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/token", post(token_handler))
            .with_state(self.clone())
    }

    pub fn calls(&self) -> usize {
        self.state().requests.len()
    }

    pub fn last_request(&self) -> HashMap<String, String> {
        self.state().requests.last().cloned().unwrap_or_default()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.state().authorizations.last().cloned().flatten()
    }

    fn state(&self) -> MutexGuard<'_, EndpointState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn token_handler(
    State(endpoint): State<TokenEndpoint>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("json"));
    let fields: HashMap<String, String> = if is_json {
        serde_json::from_str::<HashMap<String, serde_json::Value>>(&body)
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect()
    } else {
        url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect()
    };
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let mut state = endpoint.state();
    let idx = state.requests.len().min(state.responses.len().saturating_sub(1));
    let (status, reply) = state
        .responses
        .get(idx)
        .cloned()
        .unwrap_or((500, "no scripted response".into()));
    state.requests.push(fields);
    state.authorizations.push(authorization);
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        reply,
    )
}
