use {
    anyhow::{Result, bail},
    clap::Subcommand,
    nanobots_x_cookie::{
        Error as XError,
        constants::DEFAULT_COUNT,
        types::{parse_article_ref, parse_tweet_ref},
    },
    serde::Serialize,
};

use crate::context::Context;

#[derive(Subcommand)]
pub enum XAction {
    /// Show where cookies come from and whether both are present.
    Status,
    /// Store `auth_token` and `ct0` in the state directory.
    SetCookies {
        #[arg(long)]
        auth_token: String,
        #[arg(long)]
        ct0: String,
    },
    /// Fetch a tweet and its replies.
    Tweet {
        /// Tweet id or status URL.
        reference: String,
    },
    /// Fetch article text.
    Article {
        /// Article id or article URL.
        reference: String,
    },
    /// Recent tweets from a user.
    User {
        username: String,
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: u32,
    },
    /// The home timeline.
    Timeline {
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: u32,
    },
    /// Latest search results.
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: u32,
    },
    /// Post a tweet.
    Post {
        text: String,
        /// Tweet id to reply to.
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Post a thread, each text replying to the previous one.
    Thread {
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn handle_x(ctx: &Context, action: XAction) -> Result<()> {
    match action {
        XAction::Status => print_json(&ctx.cookie_sources().status().await),
        XAction::SetCookies { auth_token, ct0 } => {
            let (auth_token, ct0) = (auth_token.trim(), ct0.trim());
            if auth_token.is_empty() || ct0.is_empty() {
                bail!("auth_token and ct0 are both required");
            }
            let path = ctx.cookie_sources().save(auth_token, ct0, "cli").await?;
            println!("Saved cookies to {}", path.display());
            Ok(())
        },
        XAction::Tweet { reference } => {
            let id = parse_tweet_ref(&reference)?;
            print_json(&ctx.x_client().await?.get_tweet(&id).await?)
        },
        XAction::Article { reference } => {
            let id = parse_article_ref(&reference)?;
            print_json(&ctx.x_client().await?.get_article(&id).await?)
        },
        XAction::User { username, count } => {
            print_json(&ctx.x_client().await?.get_user_tweets(&username, count).await?)
        },
        XAction::Timeline { count } => print_json(&ctx.x_client().await?.get_timeline(count).await?),
        XAction::Search { query, count } => {
            print_json(&ctx.x_client().await?.search_tweets(&query, count).await?)
        },
        XAction::Post { text, reply_to } => {
            let client = ctx.x_client().await?;
            print_json(&client.post_tweet(&text, reply_to.as_deref()).await?)
        },
        XAction::Thread { texts } => {
            let client = ctx.x_client().await?;
            match client.post_thread(&texts).await {
                Ok(thread) => print_json(&thread),
                Err(XError::ThreadInterrupted { posted, source }) => {
                    eprintln!("Posted {} of {} before failing:", posted.len(), texts.len());
                    for tweet in &posted {
                        eprintln!("  {} {}", tweet.tweet_id, tweet.text);
                    }
                    Err(XError::ThreadInterrupted { posted, source }.into())
                },
                Err(e) => Err(e.into()),
            }
        },
    }
}
