mod auth_commands;
mod context;
mod serve;
mod x_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    nanobots_config::NanobotsConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::context::Context;

#[derive(Parser)]
#[command(name = "nanobots", about = "Nanobots: OAuth credential broker and X client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory).
    #[arg(long, global = true, env = "NANOBOTS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the OAuth and X cookie setup routes.
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Authentication management for OAuth providers.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Read from and post to X with browser session cookies.
    X {
        #[command(subcommand)]
        action: x_commands::XAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let ctx = Context::new(NanobotsConfig::load(cli.config.as_deref())?);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        state_dir = %ctx.state_dir.display(),
        "nanobots starting"
    );

    match cli.command {
        Commands::Serve { bind, port } => {
            let bind = bind.unwrap_or_else(|| ctx.config.server.bind.clone());
            let port = port.unwrap_or(ctx.config.server.port);
            serve::run(&ctx, &bind, port).await
        },
        Commands::Auth { action } => auth_commands::handle_auth(&ctx, action).await,
        Commands::X { action } => x_commands::handle_x(&ctx, action).await,
    }
}
