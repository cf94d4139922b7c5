//! Question Generation
//!
//! Questions take the form "What is A * B + C?". The answer is kept as its
//! decimal string because answers are matched literally, not numerically.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;

/// Smallest multiplication factor.
pub const FACTOR_MIN: i32 = 2;
/// Largest multiplication factor.
pub const FACTOR_MAX: i32 = 10;
/// Smallest additive offset.
pub const OFFSET_MIN: i32 = 2;
/// Largest additive offset.
pub const OFFSET_MAX: i32 = 97;

/// A question and its expected answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Text posted to the channel.
    pub text: String,
    /// Decimal rendering of the correct answer.
    pub answer: String,
}

/// Generate a question whose answer differs from `previous_answer`.
///
/// Redraws on collision. Answers span 6..=197, so a retry is rare and the
/// loop terminates quickly.
pub fn generate_question(rng: &mut DeterministicRng, previous_answer: &str) -> Question {
    loop {
        let a = rng.next_int_range(FACTOR_MIN, FACTOR_MAX);
        let b = rng.next_int_range(FACTOR_MIN, FACTOR_MAX);
        let c = rng.next_int_range(OFFSET_MIN, OFFSET_MAX);

        let answer = (a * b + c).to_string();
        if answer != previous_answer {
            return Question {
                text: format!("What is {} * {} + {}?", a, b, c),
                answer,
            };
        }
    }
}
