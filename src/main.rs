//! MathBot
//!
//! Connects to Twitch chat, joins a channel and runs arithmetic trivia
//! rounds until logged out or interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mathbot::{
    DEFAULT_NICKNAME, DEFAULT_SERVER_URL, LOGOUT_WAIT_MS, VERSION,
    game::state::SchedulerConfig,
    network::{BotConfig, MathBot, load_token},
};

#[derive(Parser, Debug)]
#[command(
    name = "mathbot",
    version,
    about = "Connect to Twitch chat and run arithmetic trivia rounds"
)]
struct Args {
    /// Path/name of file containing the OAuth token to use
    token: PathBuf,

    /// Name of the Twitch channel to join
    channel: String,

    /// Nickname (username) to use
    #[arg(default_value = DEFAULT_NICKNAME)]
    nick: String,

    /// JSON file with round timing (min_cooldown, max_cooldown, round_time)
    #[arg(long, env = "MATHBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Chat server WebSocket URL
    #[arg(long, env = "MATHBOT_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let args = Args::parse();
    info!("MathBot v{}", VERSION);

    let scheduler = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("unable to read config file '{}'", path.display()))?;
            SchedulerConfig::from_json(&text)
                .with_context(|| format!("invalid config file '{}'", path.display()))?
        }
        None => SchedulerConfig::default(),
    };
    info!(
        "Rounds: {}s, cooldown {}-{}s",
        scheduler.round_time, scheduler.min_cooldown, scheduler.max_cooldown
    );

    let token = load_token(&args.token)?;
    info!("Using token {}", token.fingerprint());

    let config = BotConfig {
        nickname: args.nick,
        channel: args.channel,
        server_url: args.server,
        scheduler,
        ..Default::default()
    };
    let mut bot = MathBot::new(config)?;
    bot.initiate_log_in(&token).await.context("unable to log in")?;

    let wait = Duration::from_millis(LOGOUT_WAIT_MS);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Unable to listen for interrupt: {}", e);
                }
                info!("Interrupted");
                break;
            }
            logged_out = bot.await_log_out(wait) => {
                if logged_out {
                    break;
                }
            }
        }
    }

    if !bot.is_logged_out() {
        if let Err(e) = bot.initiate_log_out() {
            warn!("Logout failed: {}", e);
        }
        bot.await_log_out(wait).await;
    }

    Ok(())
}
