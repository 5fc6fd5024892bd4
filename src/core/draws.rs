use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::error::ValidationError;

/// Keyword that asks for a randomly chosen base inflation rate.
pub const RANDOM_INFLATION: &str = "random";
pub const RANDOM_INFLATION_MIN: f64 = 0.01;
pub const RANDOM_INFLATION_MAX: f64 = 0.15;

/// Source of the stochastic inputs for a game.
///
/// The engine only ever talks to this trait, so tests can script exact
/// returns and inflation rates.
pub trait DrawSource {
    fn draw_return(&mut self, mean: f64, stddev: f64) -> f64;
    fn draw_inflation(&mut self, mean: f64, stddev: f64) -> f64;
    fn draw_uniform(&mut self, low: f64, high: f64) -> f64;
}

/// `StdRng`-backed draws; one instance per game or batch run.
#[derive(Debug, Clone)]
pub struct SeededDraws {
    rng: StdRng,
}

impl SeededDraws {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    fn normal(&mut self, mean: f64, stddev: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + stddev * z
    }
}

impl DrawSource for SeededDraws {
    fn draw_return(&mut self, mean: f64, stddev: f64) -> f64 {
        self.normal(mean, stddev)
    }

    fn draw_inflation(&mut self, mean: f64, stddev: f64) -> f64 {
        self.normal(mean, stddev)
    }

    fn draw_uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low..=high)
    }
}

/// Turns the player's inflation selection into a base rate.
///
/// `"random"` picks uniformly from [1%, 15%]; anything else is read as a
/// percentage, so `"3"` becomes `0.03`.
pub fn resolve_inflation_rate(
    choice: &str,
    draws: &mut impl DrawSource,
) -> Result<f64, ValidationError> {
    let choice = choice.trim();
    if choice.eq_ignore_ascii_case(RANDOM_INFLATION) {
        return Ok(draws.draw_uniform(RANDOM_INFLATION_MIN, RANDOM_INFLATION_MAX));
    }

    let percent = choice
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::InflationChoice(choice.to_string()))?;
    if !percent.is_finite() {
        return Err(ValidationError::InflationChoice(choice.to_string()));
    }
    Ok(percent / 100.0)
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    #[test]
    fn same_seed_reproduces_the_same_draws() {
        let mut a = SeededDraws::seeded(42);
        let mut b = SeededDraws::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.draw_return(0.07, 0.15), b.draw_return(0.07, 0.15));
            assert_eq!(a.draw_inflation(0.02, 0.005), b.draw_inflation(0.02, 0.005));
        }
    }

    #[test]
    fn zero_stddev_returns_the_mean_exactly() {
        let mut draws = SeededDraws::seeded(9);
        for _ in 0..8 {
            assert_eq!(draws.draw_return(0.07, 0.0), 0.07);
        }
    }

    #[test]
    fn resolve_inflation_rate_parses_percentages() {
        let mut draws = SeededDraws::seeded(1);
        assert!((resolve_inflation_rate("3", &mut draws).expect("valid") - 0.03).abs() < 1e-12);
        assert!((resolve_inflation_rate(" 2.5 ", &mut draws).expect("valid") - 0.025).abs() < 1e-12);
        assert!((resolve_inflation_rate("4%", &mut draws).expect("valid") - 0.04).abs() < 1e-12);
    }

    #[test]
    fn resolve_inflation_rate_rejects_garbage() {
        let mut draws = SeededDraws::seeded(1);
        let err = resolve_inflation_rate("lots", &mut draws).expect_err("must reject");
        assert_eq!(err, ValidationError::InflationChoice("lots".to_string()));
        assert!(resolve_inflation_rate("NaN", &mut draws).is_err());
        assert!(resolve_inflation_rate("", &mut draws).is_err());
    }

    #[test]
    fn resolve_inflation_rate_random_uses_uniform_draw() {
        let mut draws = scripted::ScriptedDraws::default();
        draws.uniforms.push_back(0.09);
        let rate = resolve_inflation_rate("random", &mut draws).expect("valid");
        assert_eq!(rate, 0.09);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_random_inflation_stays_within_range(seed in 0_u64..u64::MAX) {
            let mut draws = SeededDraws::seeded(seed);
            let rate = resolve_inflation_rate("random", &mut draws).expect("random is valid");
            prop_assert!((RANDOM_INFLATION_MIN..=RANDOM_INFLATION_MAX).contains(&rate));
        }
    }
}
