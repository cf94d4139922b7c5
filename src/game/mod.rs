//! Game Logic Module
//!
//! Trivia rounds and scoring. Synchronous and free of I/O; all concurrency
//! lives in `network/session.rs`.
//!
//! ## Module Structure
//!
//! - `question`: Arithmetic question generation
//! - `scoreboard`: Contestants, answer evaluation, results text
//! - `state`: Scheduler config, rounds, the owned trivia state
//! - `tick`: Deadline checks and round transitions
//! - `events`: Events emitted by transitions and answers

pub mod question;
pub mod scoreboard;
pub mod state;
pub mod tick;
pub mod events;

// Re-export key types
pub use question::{Question, generate_question};
pub use scoreboard::{AnswerOutcome, Contestant, RoundResults, ScoreBoard};
pub use state::{ConfigError, Round, RoundPhase, SchedulerConfig, TriviaState};
pub use tick::{TickResult, Transition, tick};
pub use events::{GameEvent, GameEventData};
