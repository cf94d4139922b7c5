//! Game Events
//!
//! Emitted by round transitions and answer handling. The session logs them;
//! tests assert on them.

use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A new question was drawn and the round opened.
    RoundOpened {
        round_id: Uuid,
        question: String,
        answer: String,
        scoring_at: f64,
        next_question_at: f64,
    },

    /// A participant answered correctly and won the round.
    AnswerAccepted {
        nickname: String,
    },

    /// A participant answered incorrectly.
    AnswerRejected {
        nickname: String,
    },

    /// Deltas were applied and the results composed.
    RoundScored {
        round_id: Uuid,
        winner: Option<String>,
        participants: usize,
        announcement: String,
    },
}

/// A game event with the round it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Round number (1-based).
    pub round: u64,
    /// Event payload.
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(round: u64, data: GameEventData) -> Self {
        Self { round, data }
    }

    /// Text to post to the channel, if this event produces any.
    pub fn chat_text(&self) -> Option<&str> {
        match &self.data {
            GameEventData::RoundOpened { question, .. } => Some(question),
            GameEventData::RoundScored { announcement, .. } => Some(announcement),
            _ => None,
        }
    }
}
