use super::types::TARGET_WITHDRAWAL_RATE;

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 100.0;
const BASE_SCORE: f64 = 50.0;
const RETURN_WEIGHT: f64 = 10.0;

/// Withdrawals the game expected: 5% of the starting value for every year
/// actually played.
pub fn expected_withdrawals(starting: f64, years_played: u32) -> f64 {
    starting * TARGET_WITHDRAWAL_RATE * years_played as f64
}

/// Scores a finished game on a 1..=100 scale.
///
/// Meeting the expected withdrawals is worth 50 points, with extra
/// withdrawals adding and shortfalls scaling the base down. The return the
/// portfolio earned on top of that moves the score by ten points per unit of
/// return difference. Any failed game scores the minimum.
///
/// `expected_withdrawals` must be positive for a game that did not fail.
pub fn score(
    starting: f64,
    ending: f64,
    expected_withdrawals: f64,
    actual_withdrawals: f64,
    failed: bool,
) -> f64 {
    if failed || ending <= 0.0 {
        return MIN_SCORE;
    }

    let withdrawal_ratio = actual_withdrawals / expected_withdrawals;
    let mut score = if withdrawal_ratio > 1.0 {
        BASE_SCORE + BASE_SCORE * (withdrawal_ratio - 1.0)
    } else {
        BASE_SCORE * withdrawal_ratio
    };

    let actual_return = (ending - starting + actual_withdrawals) / starting;
    let expected_return = (expected_withdrawals + starting) / starting;
    if actual_return > expected_return {
        score += RETURN_WEIGHT * (actual_return - expected_return);
    } else {
        score -= RETURN_WEIGHT * (expected_return - actual_return);
    }

    score.clamp(MIN_SCORE, MAX_SCORE)
}
