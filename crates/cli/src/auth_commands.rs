use std::time::Duration;

use {
    anyhow::{Result, bail},
    clap::Subcommand,
    nanobots_oauth::{
        AuthenticatedClient, Clock, FetchOptions, SystemClock, is_never_expiring,
        routes::CALLBACK_PATH,
    },
    tracing::warn,
};

use crate::{context::Context, serve};

/// How long `login` waits for the browser round trip.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in to a provider via OAuth.
    Login {
        /// Provider id (e.g. "google").
        #[arg(long)]
        provider: String,
    },
    /// Show authentication status for all providers.
    Status,
    /// Log out from a provider.
    Logout {
        /// Provider id (e.g. "google").
        #[arg(long)]
        provider: String,
    },
    /// Call a provider API with the stored credential and print the JSON reply.
    Fetch {
        #[arg(long)]
        provider: String,
        /// Path under the provider's API base, or an absolute URL.
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
    },
}

pub async fn handle_auth(ctx: &Context, action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Login { provider } => login(ctx, &provider).await,
        AuthAction::Status => status(ctx).await,
        AuthAction::Logout { provider } => logout(ctx, &provider).await,
        AuthAction::Fetch {
            provider,
            path,
            method,
            body,
        } => fetch(ctx, &provider, &path, &method, body.as_deref()).await,
    }
}

fn callback_base(ctx: &Context) -> String {
    match ctx.config.server.public_url {
        Some(ref url) => url.trim_end_matches('/').to_string(),
        None => format!("http://localhost:{}", ctx.config.server.port),
    }
}

async fn login(ctx: &Context, provider: &str) -> Result<()> {
    let flow = ctx.oauth_flow();
    let redirect_uri = format!("{}{CALLBACK_PATH}", callback_base(ctx));
    let req = flow.build_authorization_url(provider, &redirect_uri)?;

    let (router, routes) = serve::app(ctx, flow);
    let mut connected = routes.subscribe();
    let listener = serve::bind(&ctx.config.server.bind, ctx.config.server.port).await?;
    let server = tokio::spawn(async move { axum::serve(listener, router).await });

    println!("Opening browser for authentication...");
    if open::that(&req.url).is_err() {
        println!("Could not open browser. Please visit:\n{}", req.url);
    }
    println!("Waiting for callback on {redirect_uri} ...");

    let waited = tokio::time::timeout(LOGIN_TIMEOUT, async {
        loop {
            match connected.recv().await {
                Ok(id) if id == provider => return true,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "connection notifications closed");
                    return false;
                },
            }
        }
    })
    .await;
    server.abort();

    match waited {
        Ok(true) => {
            println!("Successfully logged in to {provider}");
            Ok(())
        },
        Ok(false) => bail!("login for {provider} did not complete"),
        Err(_) => bail!("timed out waiting for the {provider} callback"),
    }
}

fn describe_expiry(expires_at: u64, now_ms: u64) -> String {
    if is_never_expiring(expires_at) {
        return "no expiry".to_string();
    }
    if expires_at <= now_ms {
        return "expired".to_string();
    }
    let remaining = (expires_at - now_ms) / 1000;
    let hours = remaining / 3600;
    let mins = (remaining % 3600) / 60;
    format!("valid ({hours}h {mins}m remaining)")
}

async fn status(ctx: &Context) -> Result<()> {
    let flow = ctx.oauth_flow();
    let tokens = flow.store().list().await;
    let now_ms = SystemClock.now_ms();
    for provider in flow.registry().list() {
        let configured = if provider.is_configured() {
            "configured"
        } else {
            "not configured"
        };
        match tokens.iter().find(|t| t.provider == provider.id) {
            Some(token) => println!(
                "{} [{configured}, connected, {}]",
                provider.id,
                describe_expiry(token.expires_at, now_ms)
            ),
            None => println!("{} [{configured}, not connected]", provider.id),
        }
    }
    Ok(())
}

async fn logout(ctx: &Context, provider: &str) -> Result<()> {
    let flow = ctx.oauth_flow();
    flow.registry().require(provider)?;
    flow.store().delete(provider).await?;
    println!("Logged out from {provider}");
    Ok(())
}

async fn fetch(
    ctx: &Context,
    provider: &str,
    path: &str,
    method: &str,
    body: Option<&str>,
) -> Result<()> {
    let method: reqwest::Method = method.to_ascii_uppercase().parse()?;
    let mut options = FetchOptions::get().with_method(method);
    if let Some(raw) = body {
        options.body = Some(serde_json::from_str(raw)?);
    }
    let client = AuthenticatedClient::new(ctx.oauth_flow());
    let value: serde_json::Value = client.fetch_json(provider, path, &options).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
