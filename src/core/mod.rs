mod draws;
mod driver;
mod engine;
mod error;
mod report;
mod scoring;
mod types;

pub use draws::{DrawSource, RANDOM_INFLATION, SeededDraws, resolve_inflation_rate};
pub use driver::{
    BATCH_MARGIN_PERCENT, adjusted_total_withdrawn, run_full_simulation, start_game, step_game,
    target_withdrawal_policy,
};
pub use engine::advance_year;
pub use error::{GameError, ValidationError};
pub use report::{
    BatchReport, GameReport, ReportLine, ValuePoint, YearSummary, batch_report, cagr,
    format_currency, format_percent, game_report, value_series, year_summary,
};
pub use scoring::{expected_withdrawals, score};
pub use types::{
    BatchRun, Game, Outcome, OutcomeKind, SimulationParameters, SimulationState, YearInput,
};
