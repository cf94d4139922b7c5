//! Trivia State
//!
//! The single owned state object for one channel: scheduler deadlines,
//! round lifecycle flags, the current round, the score board and the
//! generator. It is plain data; the session decides who may touch it.

use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::core::rng::DeterministicRng;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::question::generate_question;
use crate::game::scoreboard::{AnswerOutcome, RoundResults, ScoreBoard, is_answer_attempt};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Round timing, in seconds. Immutable once the bot is running.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Shortest gap between consecutive questions.
    pub min_cooldown: f64,
    /// Longest gap between consecutive questions.
    pub max_cooldown: f64,
    /// Time from posting a question until it is scored.
    pub round_time: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_cooldown: 45.0,
            max_cooldown: 180.0,
            round_time: 15.0,
        }
    }
}

impl SchedulerConfig {
    /// Check `0 < min_cooldown <= max_cooldown` and `round_time > 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_cooldown > 0.0) {
            return Err(ConfigError::NonPositiveCooldown(self.min_cooldown));
        }
        if !(self.min_cooldown <= self.max_cooldown) {
            return Err(ConfigError::CooldownRange {
                min: self.min_cooldown,
                max: self.max_cooldown,
            });
        }
        if !(self.round_time > 0.0) {
            return Err(ConfigError::NonPositiveRoundTime(self.round_time));
        }
        Ok(())
    }

    /// Parse from JSON, filling missing fields with defaults.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Minimum cooldown is zero, negative or NaN.
    #[error("minimum cooldown must be positive, got {0}")]
    NonPositiveCooldown(f64),

    /// Minimum cooldown exceeds the maximum.
    #[error("minimum cooldown {min} exceeds maximum cooldown {max}")]
    CooldownRange {
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },

    /// Round time is zero, negative or NaN.
    #[error("round time must be positive, got {0}")]
    NonPositiveRoundTime(f64),

    /// Malformed configuration document.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// ROUND
// =============================================================================

/// Where the current round is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Waiting for the next question to become due.
    AwaitingQuestion,
    /// Question posted, answers accepted.
    Open,
    /// Decided (correct answer or timeout), not yet scored.
    Closing,
    /// Deltas applied and results announced.
    Scored,
}

/// One question/answer cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round {
    /// Unique identifier, for log correlation.
    pub id: Uuid,
    /// Sequence number (1-based).
    pub number: u64,
    /// Question text.
    pub question: String,
    /// Expected answer, as posted arithmetic renders it.
    pub answer: String,
    /// Scheduled open time (clock seconds).
    pub opened_at: f64,
    /// Scheduled scoring time; always `opened_at + round_time`.
    pub scoring_at: f64,
}

// =============================================================================
// TRIVIA STATE
// =============================================================================

/// All mutable round, score and scheduler state.
#[derive(Clone, Debug)]
pub struct TriviaState {
    /// Timing parameters.
    config: SchedulerConfig,
    /// Generator for questions and cooldowns.
    rng: DeterministicRng,
    /// Contestants and this round's participation.
    scoreboard: ScoreBoard,
    /// Current round (if any has opened).
    round: Option<Round>,
    /// A correct answer was accepted or the round timed out.
    round_complete: bool,
    /// Deltas for the current round have been applied.
    round_scored: bool,
    /// Results are out and the scheduler is waiting for the next question.
    cooling_down: bool,
    /// When the next question is due.
    next_question_time: f64,
    /// Rounds opened so far.
    rounds_opened: u64,
}

impl TriviaState {
    /// Create idle state: no round, nothing scheduled.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            rng: DeterministicRng::default(),
            scoreboard: ScoreBoard::new(),
            round: None,
            round_complete: true,
            round_scored: true,
            cooling_down: false,
            next_question_time: f64::INFINITY,
            rounds_opened: 0,
        }
    }

    /// Arm the scheduler: reseed and make the next question due at `now`.
    pub fn start(&mut self, now: f64, seed: u64) {
        self.rng.reseed(seed);
        self.next_question_time = now;
    }

    /// Classify and record a chat message.
    ///
    /// Never touches point totals; those change only when the round is scored.
    pub fn submit_answer(&mut self, nickname: &str, text: &str) -> (AnswerOutcome, Option<GameEvent>) {
        if !is_answer_attempt(text) {
            return (AnswerOutcome::NotAnAnswer, None);
        }
        if self.round_complete {
            return (AnswerOutcome::RoundClosed, None);
        }
        let Some(round) = self.round.as_ref() else {
            return (AnswerOutcome::RoundClosed, None);
        };

        let outcome = self.scoreboard.record_attempt(nickname, text, &round.answer);
        let data = match outcome {
            AnswerOutcome::Correct => {
                self.round_complete = true;
                GameEventData::AnswerAccepted { nickname: nickname.to_string() }
            }
            _ => GameEventData::AnswerRejected { nickname: nickname.to_string() },
        };

        (outcome, Some(GameEvent::new(round.number, data)))
    }

    /// Open a new round at the scheduled time and schedule the next one.
    ///
    /// The cooldown is measured from this round's scheduled open time, not
    /// from when it is scored.
    pub(crate) fn open_round(&mut self) -> GameEvent {
        let previous_answer = self
            .round
            .as_ref()
            .map(|r| r.answer.clone())
            .unwrap_or_default();

        self.scoreboard.begin_round();
        let question = generate_question(&mut self.rng, &previous_answer);

        let opened_at = self.next_question_time;
        let scoring_at = opened_at + self.config.round_time;
        self.next_question_time = opened_at
            + self.rng.next_f64_range(self.config.min_cooldown, self.config.max_cooldown);

        self.round_complete = false;
        self.round_scored = false;
        self.cooling_down = false;
        self.rounds_opened += 1;

        let round = Round {
            id: Uuid::new_v4(),
            number: self.rounds_opened,
            question: question.text,
            answer: question.answer,
            opened_at,
            scoring_at,
        };

        let event = GameEvent::new(round.number, GameEventData::RoundOpened {
            round_id: round.id,
            question: round.question.clone(),
            answer: round.answer.clone(),
            scoring_at,
            next_question_at: self.next_question_time,
        });
        self.round = Some(round);
        event
    }

    /// Close the current round, apply deltas and compose the results.
    pub(crate) fn score_round(&mut self) -> (RoundResults, GameEvent) {
        self.round_complete = true;
        self.round_scored = true;

        let results = self.scoreboard.apply_scores();
        let (round_number, round_id) = self
            .round
            .as_ref()
            .map(|r| (r.number, r.id))
            .unwrap_or((0, Uuid::nil()));
        let event = GameEvent::new(round_number, GameEventData::RoundScored {
            round_id,
            winner: results.winner.as_ref().map(|w| w.nickname.clone()),
            participants: results.losers.len() + usize::from(results.winner.is_some()),
            announcement: results.announcement(),
        });
        (results, event)
    }

    /// Results have been announced; wait for the next question.
    pub(crate) fn enter_cooldown(&mut self) {
        if self.round.is_some() && self.round_scored {
            self.cooling_down = true;
        }
    }

    /// Current lifecycle phase.
    ///
    /// `Scored` holds from the scoring tick until the next idle tick, after
    /// which the state waits in `AwaitingQuestion` again.
    pub fn phase(&self) -> RoundPhase {
        if self.round.is_none() || self.cooling_down {
            RoundPhase::AwaitingQuestion
        } else if !self.round_complete {
            RoundPhase::Open
        } else if !self.round_scored {
            RoundPhase::Closing
        } else {
            RoundPhase::Scored
        }
    }

    /// Timing parameters.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current round, if one has opened.
    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Contestants and participation.
    pub fn scoreboard(&self) -> &ScoreBoard {
        &self.scoreboard
    }

    /// Whether the current round has been scored.
    pub fn is_round_scored(&self) -> bool {
        self.round_scored
    }

    /// When the next question is due (infinite until started).
    pub fn next_question_time(&self) -> f64 {
        self.next_question_time
    }

    /// When the current round is scored (infinite if none).
    pub fn scoring_time(&self) -> f64 {
        self.round.as_ref().map(|r| r.scoring_at).unwrap_or(f64::INFINITY)
    }

    /// Rounds opened so far.
    pub fn rounds_opened(&self) -> u64 {
        self.rounds_opened
    }
}

// =============================================================================
// TESTS
// =============================================================================
