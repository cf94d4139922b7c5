//! Contestants and Scoring
//!
//! Durable point totals plus the current round's pending adjustments.
//! Totals only change in [`ScoreBoard::apply_scores`], once per round;
//! answer attempts only move `point_delta`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Deserialize};

/// A user who has attempted at least one answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contestant {
    /// Chat nickname (unique key).
    pub nickname: String,
    /// Cumulative score across rounds.
    pub points: i64,
    /// Pending adjustment for the current round.
    pub point_delta: i64,
}

impl Contestant {
    /// Create a contestant with no points.
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            ..Default::default()
        }
    }
}

/// How an inbound chat message was classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Text is not a base-10 integer; not an attempt.
    NotAnAnswer,
    /// Round already decided or expired; attempt ignored.
    RoundClosed,
    /// Attempt matched the answer; sender won the round.
    Correct,
    /// Attempt did not match; sender loses a point this round.
    Incorrect,
}

/// Whether chat text counts as an answer attempt.
///
/// Any base-10 integer qualifies, including signs and leading zeros.
pub fn is_answer_attempt(text: &str) -> bool {
    text.parse::<i64>().is_ok()
}

/// Per-user score state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScoreBoard {
    /// Every nickname ever seen answering, sorted.
    contestants: BTreeMap<String, Contestant>,
    /// Nicknames with at least one attempt this round.
    participants: BTreeSet<String>,
    /// First correct answerer this round.
    winner: Option<String>,
}

impl ScoreBoard {
    /// Create an empty score board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous round's participants and winner.
    pub fn begin_round(&mut self) {
        self.participants.clear();
        self.winner = None;
    }

    /// Record an attempt against `answer`.
    ///
    /// The caller has already established that `text` is an answer attempt
    /// and that the round is still accepting answers. Matching is literal:
    /// "007" does not match "7".
    pub fn record_attempt(&mut self, nickname: &str, text: &str, answer: &str) -> AnswerOutcome {
        let contestant = self
            .contestants
            .entry(nickname.to_string())
            .or_insert_with(|| Contestant::new(nickname));

        if self.participants.insert(nickname.to_string()) {
            contestant.point_delta = 0;
        }

        if text == answer {
            // A winner is never replaced; the caller closes the round now
            if self.winner.is_none() {
                self.winner = Some(nickname.to_string());
            }
            contestant.point_delta += 1;
            AnswerOutcome::Correct
        } else {
            contestant.point_delta -= 1;
            AnswerOutcome::Incorrect
        }
    }

    /// Apply every participant's pending delta and report the outcome.
    ///
    /// Must run exactly once per round.
    pub fn apply_scores(&mut self) -> RoundResults {
        let mut winner = None;
        let mut losers = Vec::new();

        for nickname in &self.participants {
            let Some(contestant) = self.contestants.get_mut(nickname) else {
                continue;
            };
            contestant.points += contestant.point_delta;

            if self.winner.as_deref() == Some(nickname.as_str()) {
                winner = Some(WinnerEntry {
                    nickname: nickname.clone(),
                    total: contestant.points,
                });
            } else {
                losers.push(LoserEntry {
                    nickname: nickname.clone(),
                    delta: contestant.point_delta,
                    total: contestant.points,
                });
            }
        }

        RoundResults { winner, losers }
    }

    /// Look up a contestant.
    pub fn contestant(&self, nickname: &str) -> Option<&Contestant> {
        self.contestants.get(nickname)
    }

    /// Number of contestants ever seen.
    pub fn contestant_count(&self) -> usize {
        self.contestants.len()
    }

    /// Whether `nickname` has attempted an answer this round.
    pub fn is_participant(&self, nickname: &str) -> bool {
        self.participants.contains(nickname)
    }

    /// Participants this round, in nickname order.
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(String::as_str)
    }

    /// This round's winner, if any.
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }
}

/// The winner's line in a results report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerEntry {
    /// Winner's nickname.
    pub nickname: String,
    /// Total after scoring.
    pub total: i64,
}

/// A participant who did not win.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoserEntry {
    /// Loser's nickname.
    pub nickname: String,
    /// Points gained or lost this round.
    pub delta: i64,
    /// Total after scoring.
    pub total: i64,
}

impl fmt::Display for LoserEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.nickname, self.delta, self.total)
    }
}

/// Outcome of scoring one round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResults {
    /// Winner, if someone answered correctly.
    pub winner: Option<WinnerEntry>,
    /// Other participants, sorted by nickname.
    pub losers: Vec<LoserEntry>,
}

impl RoundResults {
    /// Render the losers as `nick (delta -> total), ...`.
    pub fn loser_list(&self) -> String {
        self.losers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Results message posted to the channel.
    pub fn announcement(&self) -> String {
        let losers = self.loser_list();
        match &self.winner {
            None if losers.is_empty() => "No winners this round.".to_string(),
            None => format!("No winners this round, only losers {}.", losers),
            Some(winner) => {
                let unit = if winner.total == 1 { "point" } else { "points" };
                if losers.is_empty() {
                    format!(
                        "Congratulations, {}! (now at {} {}).",
                        winner.nickname, winner.total, unit
                    )
                } else {
                    format!(
                        "Congratulations, {}! (now at {} {}) {}.",
                        winner.nickname, winner.total, unit, losers
                    )
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
