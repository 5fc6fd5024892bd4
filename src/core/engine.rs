use tracing::debug;

use super::draws::DrawSource;
use super::types::{
    INFLATION_CAP, INFLATION_FLOOR, INFLATION_VOLATILITY, MARGIN_CALL_THRESHOLD, OutcomeKind,
    SimulationParameters, SimulationState, YearInput,
};

/// Plays one year against `state`.
///
/// Returns `Some` when the year ends the game. On a margin call the state
/// keeps the withdrawal, inflation and target updates of the year but not the
/// year's investment result.
pub fn advance_year(
    state: &mut SimulationState,
    params: &SimulationParameters,
    input: &YearInput,
    draws: &mut impl DrawSource,
) -> Option<OutcomeKind> {
    state.portfolio_value -= input.withdrawal;
    state.withdrawal_history.push(input.withdrawal);
    state.total_withdrawn += input.withdrawal;

    if state.portfolio_value <= 0.0 {
        return finish(state, OutcomeKind::Depleted);
    }

    let annual_return = draws.draw_return(params.avg_annual_return, params.volatility);
    let inflation_rate = draws
        .draw_inflation(params.base_inflation_rate, INFLATION_VOLATILITY)
        .clamp(INFLATION_FLOOR, INFLATION_CAP);
    state.inflation_history.push(inflation_rate);
    state.target_withdrawal *= 1.0 + inflation_rate;

    let leverage = 1.0 + input.margin_percent;
    let effective_return = annual_return * leverage;
    let new_value = state.portfolio_value * (1.0 + effective_return);

    // Maintenance is measured against the pre-return margined base.
    let margined_value = state.portfolio_value * leverage;
    if new_value < margined_value * MARGIN_CALL_THRESHOLD {
        debug!(
            year = state.year + 1,
            new_value, margined_value, "margin maintenance breached"
        );
        return finish(state, OutcomeKind::MarginCalled);
    }

    state.portfolio_value = new_value;
    state.portfolio_history.push(new_value);
    state.year += 1;
    debug!(
        year = state.year,
        annual_return,
        inflation_rate,
        portfolio_value = new_value,
        "year committed"
    );

    if state.year >= params.time_horizon {
        return finish(state, OutcomeKind::HorizonReached);
    }
    None
}

fn finish(state: &mut SimulationState, kind: OutcomeKind) -> Option<OutcomeKind> {
    state.outcome = Some(kind);
    Some(kind)
}
