use tracing::info;

use super::draws::DrawSource;
use super::engine::advance_year;
use super::error::GameError;
use super::types::{BatchRun, Game, Outcome, SimulationParameters, SimulationState, YearInput};

/// Margin used by the automatic batch policy.
pub const BATCH_MARGIN_PERCENT: f64 = 0.20;

pub fn start_game(params: SimulationParameters) -> Result<Game, GameError> {
    params.validate()?;
    info!(
        starting_portfolio = params.starting_portfolio,
        time_horizon = params.time_horizon,
        "game started"
    );
    Ok(Game {
        params,
        state: SimulationState::new(params.starting_portfolio),
    })
}

/// Plays the next year of an interactive game with the caller's decisions.
pub fn step_game(
    game: &mut Game,
    input: YearInput,
    draws: &mut impl DrawSource,
) -> Result<Option<Outcome>, GameError> {
    if let Some(kind) = game.state.outcome {
        return Err(GameError::InvalidStateTransition(kind));
    }
    input.validate()?;

    let outcome = advance_year(&mut game.state, &game.params, &input, draws).map(|kind| {
        info!(
            outcome = %kind,
            years_played = game.state.year,
            portfolio_value = game.state.portfolio_value,
            "game ended"
        );
        Outcome {
            kind,
            state: game.state.clone(),
        }
    });
    Ok(outcome)
}

/// Runs a whole game, asking `policy` for each year's decisions.
pub fn run_full_simulation<P>(
    params: SimulationParameters,
    policy: P,
    draws: &mut impl DrawSource,
) -> Result<BatchRun, GameError>
where
    P: Fn(u32, &SimulationState) -> YearInput,
{
    let mut game = start_game(params)?;
    let outcome = loop {
        let input = policy(game.state.year, &game.state);
        if let Some(outcome) = step_game(&mut game, input, draws)? {
            break outcome;
        }
    };

    let adjusted_total_withdrawn = adjusted_total_withdrawn(&outcome.state.withdrawal_history);
    Ok(BatchRun {
        trajectory: outcome.state.portfolio_history.clone(),
        adjusted_total_withdrawn,
        outcome,
    })
}

/// Withdraws the inflation-adjusted target every year at a fixed margin.
pub fn target_withdrawal_policy(margin_percent: f64) -> impl Fn(u32, &SimulationState) -> YearInput {
    move |_year: u32, state: &SimulationState| YearInput {
        withdrawal: state.target_withdrawal,
        margin_percent,
    }
}

/// Sum of withdrawals without the last two, so a run's final and possibly
/// truncated years are not counted. Batch reports only.
pub fn adjusted_total_withdrawn(withdrawals: &[f64]) -> f64 {
    let kept = if withdrawals.len() >= 2 {
        &withdrawals[..withdrawals.len() - 2]
    } else {
        withdrawals
    };
    kept.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::draws::SeededDraws;
    use crate::core::draws::scripted::ScriptedDraws;
    use crate::core::error::ValidationError;
    use crate::core::types::OutcomeKind;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn deterministic_params() -> SimulationParameters {
        SimulationParameters {
            starting_portfolio: 100_000.0,
            avg_annual_return: 0.07,
            volatility: 0.0,
            base_inflation_rate: 0.02,
            time_horizon: 3,
        }
    }

    fn fixed_withdrawal(amount: f64) -> impl Fn(u32, &SimulationState) -> YearInput {
        move |_year: u32, _state: &SimulationState| YearInput {
            withdrawal: amount,
            margin_percent: 0.0,
        }
    }

    #[test]
    fn oracle_three_year_run_matches_hand_calculation() {
        let params = deterministic_params();
        let mut draws = SeededDraws::seeded(7);

        let run = run_full_simulation(params, fixed_withdrawal(5_000.0), &mut draws)
            .expect("valid parameters");

        assert_eq!(run.outcome.kind, OutcomeKind::HorizonReached);
        let expected = [100_000.0, 101_650.0, 103_415.5, 105_304.585];
        assert_eq!(run.trajectory.len(), expected.len());
        for (actual, expected) in run.trajectory.iter().zip(expected) {
            assert_approx(*actual, expected);
        }
        assert_eq!(run.outcome.state.year, 3);
        assert_approx(run.outcome.state.total_withdrawn, 15_000.0);
        assert_approx(run.adjusted_total_withdrawn, 5_000.0);
    }

    #[test]
    fn start_game_rejects_invalid_parameters() {
        let mut params = deterministic_params();
        params.starting_portfolio = -5.0;
        let err = start_game(params).expect_err("negative portfolio must be rejected");
        assert!(matches!(
            err,
            GameError::Validation(ValidationError::NotPositive { .. })
        ));

        let mut params = deterministic_params();
        params.time_horizon = 0;
        assert_eq!(
            start_game(params),
            Err(GameError::Validation(ValidationError::ZeroHorizon))
        );
    }

    #[test]
    fn step_after_game_end_is_rejected() {
        let mut game = start_game(deterministic_params()).expect("valid parameters");
        let mut draws = ScriptedDraws::default();
        let input = YearInput {
            withdrawal: 200_000.0,
            margin_percent: 0.0,
        };

        let outcome = step_game(&mut game, input, &mut draws)
            .expect("step should run")
            .expect("withdrawal must end the game");
        assert_eq!(outcome.kind, OutcomeKind::Depleted);
        assert_eq!(outcome.state, game.state);

        let err = step_game(&mut game, input, &mut draws).expect_err("game is over");
        assert_eq!(
            err,
            GameError::InvalidStateTransition(OutcomeKind::Depleted)
        );
        assert_eq!(game.state.withdrawal_history.len(), 1);
    }

    #[test]
    fn step_rejects_invalid_input_without_mutating_state() {
        let mut game = start_game(deterministic_params()).expect("valid parameters");
        let before = game.state.clone();
        let mut draws = ScriptedDraws::default();
        let input = YearInput {
            withdrawal: f64::NAN,
            margin_percent: 0.0,
        };

        let err = step_game(&mut game, input, &mut draws).expect_err("NaN withdrawal");
        assert!(matches!(err, GameError::Validation(_)));
        assert_eq!(game.state, before);
    }

    #[test]
    fn interactive_steps_run_to_horizon() {
        let mut game = start_game(deterministic_params()).expect("valid parameters");
        let mut draws = SeededDraws::seeded(3);
        let input = YearInput {
            withdrawal: 5_000.0,
            margin_percent: 0.0,
        };

        assert!(step_game(&mut game, input, &mut draws).expect("year 1").is_none());
        assert!(step_game(&mut game, input, &mut draws).expect("year 2").is_none());
        let outcome = step_game(&mut game, input, &mut draws)
            .expect("year 3")
            .expect("horizon reached");
        assert_eq!(outcome.kind, OutcomeKind::HorizonReached);
        assert_approx(outcome.state.portfolio_value, 105_304.585);
    }

    #[test]
    fn batch_stops_at_margin_call() {
        let mut params = deterministic_params();
        params.time_horizon = 10;
        let mut draws = ScriptedDraws::new(&[0.05, -0.9], &[0.02, 0.02]);

        let run = run_full_simulation(params, target_withdrawal_policy(0.2), &mut draws)
            .expect("valid parameters");

        assert_eq!(run.outcome.kind, OutcomeKind::MarginCalled);
        assert_eq!(run.outcome.state.year, 1);
        assert_eq!(run.trajectory.len(), 2);
        assert_eq!(run.outcome.state.withdrawal_history.len(), 2);
        assert_approx(run.adjusted_total_withdrawn, 0.0);
    }

    #[test]
    fn target_policy_follows_inflation_adjusted_target() {
        let mut params = deterministic_params();
        params.time_horizon = 2;
        let mut draws = ScriptedDraws::new(&[0.0, 0.0], &[0.10, 0.10]);

        let run = run_full_simulation(params, target_withdrawal_policy(0.0), &mut draws)
            .expect("valid parameters");

        let withdrawals = &run.outcome.state.withdrawal_history;
        assert_approx(withdrawals[0], 5_000.0);
        assert_approx(withdrawals[1], 5_500.0);
    }

    #[test]
    fn adjusted_total_drops_last_two_withdrawals() {
        assert_approx(adjusted_total_withdrawn(&[]), 0.0);
        assert_approx(adjusted_total_withdrawn(&[4_000.0]), 4_000.0);
        assert_approx(adjusted_total_withdrawn(&[4_000.0, 5_000.0]), 0.0);
        assert_approx(
            adjusted_total_withdrawn(&[1_000.0, 2_000.0, 3_000.0, 4_000.0]),
            3_000.0,
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_non_failing_policy_plays_exactly_the_horizon(
            horizon in 1_u32..40,
            avg_return in 0.0_f64..0.2,
            seed in 0_u64..u64::MAX,
        ) {
            let params = SimulationParameters {
                starting_portfolio: 250_000.0,
                avg_annual_return: avg_return,
                volatility: 0.0,
                base_inflation_rate: 0.03,
                time_horizon: horizon,
            };
            let mut draws = SeededDraws::seeded(seed);

            let run = run_full_simulation(params, fixed_withdrawal(0.0), &mut draws)
                .expect("valid parameters");

            prop_assert_eq!(run.outcome.kind, OutcomeKind::HorizonReached);
            prop_assert_eq!(run.outcome.state.year, horizon);
            prop_assert_eq!(run.trajectory.len(), horizon as usize + 1);
            prop_assert!(run.trajectory.windows(2).all(|w| w[1] >= w[0]));
        }
    }
}
