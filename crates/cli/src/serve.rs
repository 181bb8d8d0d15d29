use std::sync::Arc;

use {
    anyhow::{Context as _, Result},
    axum::Router,
    nanobots_oauth::{OAuthFlow, OAuthRoutes},
    nanobots_x_cookie::XCookieRoutes,
    tokio::net::TcpListener,
    tracing::info,
};

use crate::context::Context;

/// OAuth routes for `flow` and the X cookie setup routes, on one router.
pub fn app(ctx: &Context, flow: Arc<OAuthFlow>) -> (Router, OAuthRoutes) {
    let oauth = OAuthRoutes::new(flow).with_public_base_url(ctx.config.server.public_url.clone());
    let cookies = XCookieRoutes::new(Arc::new(ctx.cookie_sources()));
    let router = Router::new().merge(oauth.router()).merge(cookies.router());
    (router, oauth)
}

pub async fn bind(bind: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))
}

pub async fn run(ctx: &Context, bind_addr: &str, port: u16) -> Result<()> {
    let (router, _) = app(ctx, ctx.oauth_flow());
    let listener = bind(bind_addr, port).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await?;
    Ok(())
}
