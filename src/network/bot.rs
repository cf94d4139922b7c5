//! Chat Bot
//!
//! Wires the Twitch transport to a [`TriviaSession`]: logs in, forwards
//! every inbound chat event to the session, and exposes logout to the
//! process that owns the bot.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::core::clock::MonotonicClock;
use crate::game::state::{ConfigError, SchedulerConfig};
use crate::network::auth::{AuthError, Token};
use crate::network::session::{SessionConfig, TriviaSession};
use crate::network::transport::{ChatTransport, TransportError, TwitchTransport};
use crate::{DEFAULT_FAREWELL, DEFAULT_NICKNAME, DEFAULT_SERVER_URL, POLLING_PERIOD_MS};

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Login name.
    pub nickname: String,
    /// Channel to play in (with or without `#`).
    pub channel: String,
    /// Chat server WebSocket URL.
    pub server_url: String,
    /// Scheduler polling period.
    pub polling_period: Duration,
    /// Round timing.
    pub scheduler: SchedulerConfig,
    /// Said in the channel on the way out.
    pub farewell: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nickname: DEFAULT_NICKNAME.to_string(),
            channel: String::new(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            polling_period: Duration::from_millis(POLLING_PERIOD_MS),
            scheduler: SchedulerConfig::default(),
            farewell: DEFAULT_FAREWELL.to_string(),
        }
    }
}

impl BotConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), BotError> {
        if self.channel.trim_start_matches('#').is_empty() {
            return Err(BotError::MissingChannel);
        }
        if self.nickname.is_empty() {
            return Err(BotError::MissingNickname);
        }
        self.scheduler.validate()?;
        Ok(())
    }

    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            nickname: self.nickname.clone(),
            channel: self.channel.trim_start_matches('#').to_ascii_lowercase(),
            polling_period: self.polling_period,
            scheduler: self.scheduler,
        }
    }
}

/// Bot errors.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// No channel configured.
    #[error("no channel name given")]
    MissingChannel,

    /// No nickname configured.
    #[error("no nickname given")]
    MissingNickname,

    /// Invalid round timing.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Credential problem.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Chat connection problem.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operation needs a logged-in bot.
    #[error("not logged in")]
    NotLoggedIn,
}

/// Session type used against the real chat service.
pub type LiveSession = TriviaSession<TwitchTransport, MonotonicClock>;

/// The chat bot.
pub struct MathBot {
    /// Bot configuration.
    config: BotConfig,
    /// Outbound chat, once logged in.
    transport: Option<Arc<TwitchTransport>>,
    /// Trivia coordinator, once logged in.
    session: Option<Arc<LiveSession>>,
    /// Task forwarding chat events to the session.
    dispatch: Option<JoinHandle<()>>,
}

impl MathBot {
    /// Create a bot from a validated configuration.
    pub fn new(config: BotConfig) -> Result<Self, BotError> {
        config.validate()?;
        Ok(Self {
            config,
            transport: None,
            session: None,
            dispatch: None,
        })
    }

    /// Connect and authenticate. Login completes asynchronously; the
    /// session joins the channel once the server welcomes us.
    #[instrument(skip_all, fields(nickname = %self.config.nickname))]
    pub async fn initiate_log_in(&mut self, token: &Token) -> Result<(), BotError> {
        let (transport, mut events) =
            TwitchTransport::log_in(&self.config.server_url, &self.config.nickname, token).await?;
        let transport = Arc::new(transport);

        let session = Arc::new(TriviaSession::new(
            self.config.session_config(),
            transport.clone(),
            Arc::new(MonotonicClock::new()),
        ));

        let dispatch_session = session.clone();
        let dispatch = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                dispatch_session.handle_event(event).await;
            }
            dispatch_session.on_logout().await;
        });

        self.transport = Some(transport);
        self.session = Some(session);
        self.dispatch = Some(dispatch);
        Ok(())
    }

    /// Say goodbye and close the connection.
    pub fn initiate_log_out(&self) -> Result<(), BotError> {
        info!("Exiting...");
        let transport = self.transport.as_ref().ok_or(BotError::NotLoggedIn)?;
        transport.log_out(&self.config.farewell)?;
        Ok(())
    }

    /// Wait up to `timeout` for the chat session to end.
    ///
    /// A bot that never logged in has nothing to wait for.
    pub async fn await_log_out(&self, timeout: Duration) -> bool {
        match &self.session {
            Some(session) => session.await_log_out(timeout).await,
            None => true,
        }
    }

    /// Whether the chat session has ended.
    pub fn is_logged_out(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_logged_out())
    }

    /// Bot configuration.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Trivia session, once logged in.
    pub fn session(&self) -> Option<&Arc<LiveSession>> {
        self.session.as_ref()
    }
}

impl Drop for MathBot {
    fn drop(&mut self) {
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }
        if let Some(session) = &self.session {
            session.request_stop();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(channel: &str) -> BotConfig {
        BotConfig {
            channel: channel.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.nickname, "MathBot2001");
        assert_eq!(config.polling_period, Duration::from_millis(50));
        assert_eq!(config.farewell, "Bye! BibleThump");
    }

    #[test]
    fn test_missing_channel_rejected() {
        assert!(matches!(config_for("").validate(), Err(BotError::MissingChannel)));
        assert!(matches!(config_for("#").validate(), Err(BotError::MissingChannel)));
        assert!(matches!(MathBot::new(config_for("")), Err(BotError::MissingChannel)));
    }

    #[test]
    fn test_invalid_scheduler_rejected() {
        let config = BotConfig {
            scheduler: SchedulerConfig { round_time: -1.0, ..Default::default() },
            ..config_for("mathchannel")
        };
        assert!(matches!(config.validate(), Err(BotError::Config(_))));
    }

    #[test]
    fn test_session_config_normalizes_channel() {
        let session = config_for("#MathChannel").session_config();
        assert_eq!(session.channel, "mathchannel");
        assert_eq!(session.nickname, "MathBot2001");
    }

    #[tokio::test]
    async fn test_log_out_before_log_in() {
        let bot = MathBot::new(config_for("mathchannel")).unwrap();

        assert!(matches!(bot.initiate_log_out(), Err(BotError::NotLoggedIn)));
        assert!(bot.await_log_out(Duration::from_millis(1)).await);
        assert!(!bot.is_logged_out());
        assert!(bot.session().is_none());
    }
}
