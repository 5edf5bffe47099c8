//! Answer matching and point awards.

use std::time::Duration;

/// Points for any correct answer.
pub const BASE_POINTS: u64 = 100;

/// Answers faster than this earn one bonus point per whole second remaining.
pub const SPEED_BONUS_WINDOW: Duration = Duration::from_secs(10);

/// Case-insensitive comparison ignoring leading/trailing whitespace.
pub fn answers_match(submitted: &str, correct: &str) -> bool {
    submitted.trim().to_lowercase() == correct.trim().to_lowercase()
}

/// `floor(max(0, 10 - elapsed_seconds))`.
pub fn speed_bonus(elapsed: Duration) -> u64 {
    SPEED_BONUS_WINDOW.saturating_sub(elapsed).as_secs()
}

/// Points earned by one submission: zero on a mismatch.
pub fn points_for(submitted: &str, correct: &str, elapsed: Duration) -> u64 {
    if answers_match(submitted, correct) {
        BASE_POINTS + speed_bonus(elapsed)
    } else {
        0
    }
}
