use std::{collections::HashMap, sync::Arc};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode, header::HOST},
        response::{Html, IntoResponse, Response},
        routing::{get, post},
    },
    serde::{Deserialize, Serialize},
    serde_json::json,
    tokio::sync::broadcast,
    tracing::{info, warn},
};

use crate::{flow::OAuthFlow, providers::EnvHint};

pub const CALLBACK_PATH: &str = "/api/oauth/callback";

/// HTTP surface for connecting, inspecting and disconnecting providers.
#[derive(Clone)]
pub struct OAuthRoutes {
    flow: Arc<OAuthFlow>,
    public_base_url: Option<String>,
    connected: broadcast::Sender<String>,
}

impl OAuthRoutes {
    pub fn new(flow: Arc<OAuthFlow>) -> Self {
        let (connected, _) = broadcast::channel(16);
        Self {
            flow,
            public_base_url: None,
            connected,
        }
    }

    /// Build redirect URIs from this base instead of the request's Host.
    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        self.public_base_url = base.filter(|b| !b.trim().is_empty());
        self
    }

    /// Receive the id of every provider connected through the callback.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.connected.subscribe()
    }

    pub fn flow(&self) -> &Arc<OAuthFlow> {
        &self.flow
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/oauth/providers", get(providers_handler))
            .route("/api/oauth/start", post(start_handler))
            .route(CALLBACK_PATH, get(callback_handler))
            .route("/api/oauth/status", get(status_handler))
            .route("/api/oauth/disconnect", post(disconnect_handler))
            .with_state(self.clone())
    }

    fn redirect_uri(&self, headers: &HeaderMap) -> String {
        if let Some(ref base) = self.public_base_url {
            return format!("{}{CALLBACK_PATH}", base.trim_end_matches('/'));
        }
        let host = header_str(headers, HOST.as_str()).unwrap_or("localhost:8080");
        let proto = header_str(headers, "x-forwarded-proto").unwrap_or("http");
        format!("{proto}://{host}{CALLBACK_PATH}")
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct ProviderRequest {
    #[serde(default)]
    provider: Option<String>,
}

impl ProviderRequest {
    fn parse(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<Self>(body)
            .unwrap_or_default()
            .provider
            .filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderView<'a> {
    id: &'a str,
    name: &'a str,
    configured: bool,
    connected: bool,
    scopes: &'a [String],
    env_hint: &'a EnvHint,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView<'a> {
    id: &'a str,
    name: &'a str,
    configured: bool,
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
    scopes: Vec<String>,
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn providers_handler(State(routes): State<OAuthRoutes>) -> Response {
    let tokens = routes.flow.store().list().await;
    let providers: Vec<ProviderView<'_>> = routes
        .flow
        .registry()
        .list()
        .iter()
        .map(|p| ProviderView {
            id: &p.id,
            name: &p.name,
            configured: p.is_configured(),
            connected: tokens.iter().any(|t| t.provider == p.id),
            scopes: &p.scopes,
            env_hint: &p.env_hint,
        })
        .collect();
    Json(json!({ "providers": providers })).into_response()
}

async fn start_handler(
    State(routes): State<OAuthRoutes>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(provider_id) = ProviderRequest::parse(&body) else {
        return error_json(StatusCode::BAD_REQUEST, "provider is required");
    };
    let redirect_uri = routes.redirect_uri(&headers);
    match routes
        .flow
        .build_authorization_url(&provider_id, &redirect_uri)
    {
        Ok(req) => Json(json!({ "ok": true, "url": req.url })).into_response(),
        Err(e) => error_json(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn callback_handler(
    State(routes): State<OAuthRoutes>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    if let Some(error) = params.get("error") {
        warn!(%error, "authorization denied");
        return (
            StatusCode::OK,
            callback_page(false, &format!("Authorization denied: {error}")),
        );
    }
    let (Some(code), Some(state)) = (params.get("code"), params.get("state")) else {
        return (
            StatusCode::BAD_REQUEST,
            callback_page(false, "Missing code or state parameter"),
        );
    };
    let Some(pending) = routes.flow.consume_pending_state(state) else {
        return (
            StatusCode::BAD_REQUEST,
            callback_page(false, "Invalid or expired state. Please try again."),
        );
    };
    let Some(name) = routes
        .flow
        .registry()
        .get(&pending.provider)
        .map(|p| p.name.clone())
    else {
        return (
            StatusCode::BAD_REQUEST,
            callback_page(false, &format!("Unknown provider: {}", pending.provider)),
        );
    };

    match routes
        .flow
        .exchange_code_for_token(
            &pending.provider,
            code,
            &pending.redirect_uri,
            pending.code_verifier.as_deref(),
        )
        .await
    {
        Ok(_) => {
            // No subscribers is fine.
            let _ = routes.connected.send(pending.provider.clone());
            (
                StatusCode::OK,
                callback_page(true, &format!("{name} connected successfully!")),
            )
        },
        Err(e) => {
            warn!(provider = %pending.provider, error = %e, "oauth callback exchange failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                callback_page(false, &format!("Failed to connect: {e}")),
            )
        },
    }
}

async fn status_handler(State(routes): State<OAuthRoutes>) -> Response {
    let tokens = routes.flow.store().list().await;
    let status: Vec<StatusView<'_>> = routes
        .flow
        .registry()
        .list()
        .iter()
        .map(|p| {
            let token = tokens.iter().find(|t| t.provider == p.id);
            StatusView {
                id: &p.id,
                name: &p.name,
                configured: p.is_configured(),
                connected: token.is_some(),
                expires_at: token.map(|t| t.expires_at),
                scopes: token.map(|t| t.scopes.clone()).unwrap_or_default(),
            }
        })
        .collect();
    Json(json!({ "status": status })).into_response()
}

async fn disconnect_handler(State(routes): State<OAuthRoutes>, body: Bytes) -> Response {
    let Some(provider_id) = ProviderRequest::parse(&body) else {
        return error_json(StatusCode::BAD_REQUEST, "provider is required");
    };
    match routes.flow.store().delete(&provider_id).await {
        Ok(()) => {
            info!(provider = %provider_id, "disconnected oauth provider");
            Json(json!({ "ok": true })).into_response()
        },
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn callback_page(success: bool, message: &str) -> Html<String> {
    let (icon, color, heading) = if success {
        ("&#x2705;", "#16a34a", "Connected!")
    } else {
        ("&#x274C;", "#dc2626", "Error")
    };
    let message = escape_html(message);
    Html(format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>OAuth - Nanobots</title>
  <style>
    body {{ font-family: -apple-system, sans-serif; display: flex; justify-content: center; align-items: center; min-height: 100vh; background: #f5f5f5; margin: 0; }}
    .card {{ background: #fff; border-radius: 12px; padding: 48px; text-align: center; box-shadow: 0 1px 3px rgba(0,0,0,0.1); max-width: 400px; }}
    .icon {{ font-size: 48px; margin-bottom: 16px; }}
    h2 {{ color: {color}; margin-bottom: 8px; }}
    p {{ color: #666; margin-bottom: 24px; }}
    a {{ color: #2563eb; text-decoration: none; }}
  </style>
</head>
<body>
  <div class="card">
    <div class="icon">{icon}</div>
    <h2>{heading}</h2>
    <p>{message}</p>
    <a href="javascript:void(0)" onclick="closeWin()">Close</a>
  </div>
  <script>
    function closeWin() {{
      if (window.opener && window.opener.onOAuthDone) window.opener.onOAuthDone();
      window.close();
    }}
    setTimeout(closeWin, 2000);
  </script>
</body>
</html>"##
    ))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
