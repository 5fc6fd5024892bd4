use serde::Serialize;

use super::scoring::{expected_withdrawals, score};
use super::types::{BatchRun, Outcome, OutcomeKind, REG_T_MARGIN_LIMIT, SimulationState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLine {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuePoint {
    pub year: u32,
    pub value: f64,
}

/// What the player sees before choosing the next year's moves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    /// One-based year about to be played.
    pub year: u32,
    pub portfolio_value: f64,
    pub target_withdrawal: f64,
    pub value_on_margin: f64,
    pub total_withdrawn: f64,
    pub lines: Vec<ReportLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameReport {
    pub outcome: OutcomeKind,
    pub message: &'static str,
    pub years_played: u32,
    pub score: f64,
    pub lines: Vec<ReportLine>,
    pub value_series: Vec<ValuePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub outcome: OutcomeKind,
    pub message: &'static str,
    pub years_played: u32,
    pub score: f64,
    pub cagr: Option<f64>,
    pub average_withdrawn_per_year: f64,
    pub lines: Vec<ReportLine>,
    pub value_series: Vec<ValuePoint>,
}

pub fn year_summary(state: &SimulationState) -> YearSummary {
    let value_on_margin = state.portfolio_value * REG_T_MARGIN_LIMIT;
    YearSummary {
        year: state.year + 1,
        portfolio_value: state.portfolio_value,
        target_withdrawal: state.target_withdrawal,
        value_on_margin,
        total_withdrawn: state.total_withdrawn,
        lines: vec![
            line("Year", (state.year + 1).to_string()),
            line("Portfolio Value", format_currency(state.portfolio_value)),
            line("Target Withdrawal", format_currency(state.target_withdrawal)),
            line("Value Available on Margin", format_currency(value_on_margin)),
            line("Total Withdrawn", format_currency(state.total_withdrawn)),
        ],
    }
}

pub fn game_report(outcome: &Outcome) -> GameReport {
    let state = &outcome.state;
    let years_played = state.year;
    let expected = expected_withdrawals(state.starting_portfolio, years_played);
    let actual = state.total_withdrawn;
    let final_score = score(
        state.starting_portfolio,
        state.portfolio_value,
        expected,
        actual,
        outcome.kind.is_failure(),
    );

    GameReport {
        outcome: outcome.kind,
        message: outcome.kind.message(),
        years_played,
        score: final_score,
        lines: vec![
            line(
                "Beginning Portfolio Value",
                format_currency(state.starting_portfolio),
            ),
            line("Ending Portfolio Value", format_currency(state.portfolio_value)),
            line("Total Actual Withdrawals", format_currency(actual)),
            line("Total Expected Withdrawals", format_currency(expected)),
            line("Final Score", format_score(final_score)),
        ],
        value_series: value_series(&state.portfolio_history),
    }
}

pub fn batch_report(run: &BatchRun) -> BatchReport {
    let state = &run.outcome.state;
    let starting = state.starting_portfolio;
    let ending = state.portfolio_value;
    let years_played = state.year;
    let adjusted = run.adjusted_total_withdrawn;

    let growth = cagr(starting, ending, years_played);
    let average_withdrawn_per_year = if years_played > 0 {
        adjusted / years_played as f64
    } else {
        0.0
    };
    let final_score = score(
        starting,
        ending,
        expected_withdrawals(starting, years_played),
        state.total_withdrawn,
        run.outcome.kind.is_failure(),
    );

    BatchReport {
        outcome: run.outcome.kind,
        message: run.outcome.kind.message(),
        years_played,
        score: final_score,
        cagr: growth,
        average_withdrawn_per_year,
        lines: vec![
            line("Beginning Portfolio Value", format_currency(starting)),
            line("Ending Portfolio Value", format_currency(ending)),
            line(
                "Total Returns (excluding withdrawals)",
                format_currency(ending - starting),
            ),
            line(
                "Total Returns (including withdrawals)",
                format_currency(ending + state.total_withdrawn - starting),
            ),
            line(
                "Adjusted Total Returns (excluding last two withdrawals)",
                format_currency(ending + adjusted - starting),
            ),
            line(
                "CAGR (including withdrawals)",
                growth.map(format_percent).unwrap_or_else(|| "n/a".to_string()),
            ),
            line(
                "Average Amount Withdrawn Per Year (excluding last two withdrawals)",
                format_currency(average_withdrawn_per_year),
            ),
            line("Final Score", format_score(final_score)),
        ],
        value_series: value_series(&run.trajectory),
    }
}

/// Compound annual growth rate; `-1` once the portfolio is gone and `None`
/// when no year was completed.
pub fn cagr(starting: f64, ending: f64, years: u32) -> Option<f64> {
    if ending <= 0.0 {
        return Some(-1.0);
    }
    if years == 0 {
        return None;
    }
    Some((ending / starting).powf(1.0 / years as f64) - 1.0)
}

pub fn value_series(history: &[f64]) -> Vec<ValuePoint> {
    history
        .iter()
        .zip(0_u32..)
        .map(|(&value, year)| ValuePoint { year, value })
        .collect()
}

/// `$1,234.56`; negative amounts render as `$-1,234.56`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return format!("${value}");
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("${sign}{grouped}.{cents}")
}

/// Fraction as a percentage with two decimals, `0.0712` -> `7.12%`.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn format_score(score: f64) -> String {
    format!("{score:.2}/100")
}

fn line(label: &'static str, value: String) -> ReportLine {
    ReportLine { label, value }
}
