//! Round Scheduler Tick
//!
//! Compares a clock reading against the two deadlines and performs at most
//! one transition. Called from the background loop with the state lock held.

use crate::game::events::GameEvent;
use crate::game::scoreboard::RoundResults;
use crate::game::state::TriviaState;

/// A scheduler transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Post a new question.
    OpenRound,
    /// Apply deltas and announce results.
    ScoreRound,
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick.
    pub events: Vec<GameEvent>,
    /// Transition performed, if any.
    pub transition: Option<Transition>,
    /// Scoring outcome, when the round was scored.
    pub results: Option<RoundResults>,
}

impl TickResult {
    /// Message to post to the channel, if any.
    pub fn chat_text(&self) -> Option<String> {
        self.events
            .iter()
            .find_map(|e| e.chat_text())
            .map(str::to_string)
    }
}

/// Decide which transition is due at `now`.
///
/// Scoring takes precedence: a round that is still unscored when the next
/// question becomes due is scored first, so no round is replaced unscored.
pub fn due_transition(state: &TriviaState, now: f64) -> Option<Transition> {
    let next_due = now >= state.next_question_time();

    if !state.is_round_scored() && (now >= state.scoring_time() || next_due) {
        Some(Transition::ScoreRound)
    } else if next_due {
        Some(Transition::OpenRound)
    } else {
        None
    }
}

/// Run one scheduler tick.
pub fn tick(state: &mut TriviaState, now: f64) -> TickResult {
    let mut result = TickResult::default();

    match due_transition(state, now) {
        Some(Transition::OpenRound) => {
            result.events.push(state.open_round());
            result.transition = Some(Transition::OpenRound);
        }
        Some(Transition::ScoreRound) => {
            let (results, event) = state.score_round();
            result.events.push(event);
            result.results = Some(results);
            result.transition = Some(Transition::ScoreRound);
        }
        None => state.enter_cooldown(),
    }

    result
}

// =============================================================================
// TESTS
// =============================================================================
