//! Core primitives.
//!
//! Leaf components with no knowledge of rounds or chat:
//! time sources and the seeded random generator.

pub mod clock;
pub mod rng;

// Re-export core types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use rng::{DeterministicRng, derive_session_seed};
