//! # MathBot
//!
//! Arithmetic trivia for Twitch chat: posts a question, takes free-text
//! answers from everyone in the channel, and keeps score across timed
//! rounds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          MATHBOT                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Leaf primitives                           │
//! │  ├── clock.rs    - Monotonic and manual time sources         │
//! │  └── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │                                                              │
//! │  game/           - Trivia rules (synchronous, no I/O)        │
//! │  ├── question.rs - "What is A * B + C?" generation           │
//! │  ├── scoreboard.rs - Contestants, answers, results text      │
//! │  ├── state.rs    - Scheduler config and owned round state    │
//! │  ├── tick.rs     - Deadline checks and transitions           │
//! │  └── events.rs   - Events for logging and tests              │
//! │                                                              │
//! │  network/        - Concurrency and I/O                       │
//! │  ├── protocol.rs - Twitch IRC lines and chat events          │
//! │  ├── transport.rs- WebSocket chat transport                  │
//! │  ├── auth.rs     - OAuth token loading                       │
//! │  ├── session.rs  - Scheduler task + answer handling          │
//! │  └── bot.rs      - Bot wiring and lifecycle                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! One mutex guards all round and score state. The scheduler task and the
//! chat event handler both go through it, so a correct answer that lands
//! before the scoring deadline always wins, and a round is scored once.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::core::rng::DeterministicRng;
pub use game::state::{RoundPhase, SchedulerConfig, TriviaState};
pub use game::scoreboard::{AnswerOutcome, Contestant, ScoreBoard};
pub use network::{BotConfig, ChatEvent, ChatTransport, MathBot, TriviaSession};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Nickname the bot logs in with unless told otherwise.
pub const DEFAULT_NICKNAME: &str = "MathBot2001";

/// Twitch chat over secure WebSocket.
pub const DEFAULT_SERVER_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Said in the channel when the bot leaves.
pub const DEFAULT_FAREWELL: &str = "Bye! BibleThump";

/// Scheduler polling period (milliseconds).
pub const POLLING_PERIOD_MS: u64 = 50;

/// How long each logout wait lasts (milliseconds).
pub const LOGOUT_WAIT_MS: u64 = 250;
