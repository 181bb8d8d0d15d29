use std::sync::Arc;

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    serde::Deserialize,
    serde_json::json,
    tracing::{info, warn},
};

use crate::cookies::CookieSources;

/// Setup endpoints for pasting browser session cookies.
#[derive(Clone)]
pub struct XCookieRoutes {
    sources: Arc<CookieSources>,
}

impl XCookieRoutes {
    pub fn new(sources: Arc<CookieSources>) -> Self {
        Self { sources }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/x-cookies/status", get(status_handler))
            .route("/api/x-cookies/save", post(save_handler))
            .with_state(self.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SaveRequest {
    #[serde(default)]
    auth_token: Option<String>,
    #[serde(default)]
    ct0: Option<String>,
}

async fn status_handler(State(routes): State<XCookieRoutes>) -> Response {
    Json(routes.sources.status().await).into_response()
}

async fn save_handler(State(routes): State<XCookieRoutes>, body: Bytes) -> Response {
    let req: SaveRequest = serde_json::from_slice(&body).unwrap_or_default();
    let trimmed = |v: Option<String>| v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let (Some(auth_token), Some(ct0)) = (trimmed(req.auth_token), trimmed(req.ct0)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "auth_token and ct0 are both required" })),
        )
            .into_response();
    };
    match routes.sources.save(&auth_token, &ct0, "webui").await {
        Ok(path) => {
            info!(?path, "saved x cookies from setup page");
            Json(json!({ "ok": true })).into_response()
        },
        Err(e) => {
            warn!(error = %e, "failed to save x cookies");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::test_support::spawn, serde_json::Value};

    #[tokio::test]
    async fn test_save_then_status() {
        let tmp = tempfile::tempdir().unwrap();
        let sources = Arc::new(CookieSources::new(tmp.path()));
        let base = spawn(XCookieRoutes::new(sources.clone()).router()).await;
        let client = reqwest::Client::new();

        let status: Value = client
            .get(format!("{base}/api/x-cookies/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["configured"], false);
        assert_eq!(status["source"], Value::Null);

        let resp = client
            .post(format!("{base}/api/x-cookies/save"))
            .json(&json!({ "auth_token": "  abcdefghijk  ", "ct0": "csrf" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);

        let saved = sources.require().await.unwrap();
        assert_eq!(saved["auth_token"], "abcdefghijk");

        let status: Value = client
            .get(format!("{base}/api/x-cookies/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["configured"], true);
        assert_eq!(status["source"], "file");
        assert_eq!(status["maskedAuthToken"], "abcdef...");
    }

    #[tokio::test]
    async fn test_save_requires_both_cookies() {
        let tmp = tempfile::tempdir().unwrap();
        let base = spawn(XCookieRoutes::new(Arc::new(CookieSources::new(tmp.path()))).router()).await;
        let client = reqwest::Client::new();

        for body in [json!({ "auth_token": "a" }), json!({ "auth_token": "a", "ct0": " " })] {
            let resp = client
                .post(format!("{base}/api/x-cookies/save"))
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["ok"], false);
            assert_eq!(body["error"], "auth_token and ct0 are both required");
        }

        let resp = client
            .post(format!("{base}/api/x-cookies/save"))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!tmp.path().join("x-cookies").exists());
    }
}
