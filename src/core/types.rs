use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Share of the starting portfolio the game expects to be withdrawn each year.
pub const TARGET_WITHDRAWAL_RATE: f64 = 0.05;
/// Standard deviation of the annual inflation draw around the base rate.
pub const INFLATION_VOLATILITY: f64 = 0.005;
pub const INFLATION_FLOOR: f64 = -0.01;
pub const INFLATION_CAP: f64 = 0.10;
/// A margin call fires when the leveraged year-end value drops below this
/// share of the margined base.
pub const MARGIN_CALL_THRESHOLD: f64 = 0.25;
/// Reg-T limit: at most half of the portfolio can be borrowed against.
pub const REG_T_MARGIN_LIMIT: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub starting_portfolio: f64,
    pub avg_annual_return: f64,
    pub volatility: f64,
    pub base_inflation_rate: f64,
    pub time_horizon: u32,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_finite("starting_portfolio", self.starting_portfolio)?;
        require_finite("avg_annual_return", self.avg_annual_return)?;
        require_finite("volatility", self.volatility)?;
        require_finite("base_inflation_rate", self.base_inflation_rate)?;

        if self.starting_portfolio <= 0.0 {
            return Err(ValidationError::NotPositive {
                field: "starting_portfolio",
                value: self.starting_portfolio,
            });
        }
        if self.volatility < 0.0 {
            return Err(ValidationError::Negative {
                field: "volatility",
                value: self.volatility,
            });
        }
        if self.time_horizon == 0 {
            return Err(ValidationError::ZeroHorizon);
        }
        Ok(())
    }
}

/// Caller decisions for a single year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearInput {
    pub withdrawal: f64,
    /// Fraction of the portfolio additionally leveraged, `0.2` for 20%.
    pub margin_percent: f64,
}

impl YearInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_finite("withdrawal", self.withdrawal)?;
        require_finite("margin_percent", self.margin_percent)?;
        if self.withdrawal < 0.0 {
            return Err(ValidationError::Negative {
                field: "withdrawal",
                value: self.withdrawal,
            });
        }
        if self.margin_percent < 0.0 {
            return Err(ValidationError::Negative {
                field: "margin_percent",
                value: self.margin_percent,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub starting_portfolio: f64,
    pub portfolio_value: f64,
    pub target_withdrawal: f64,
    pub year: u32,
    pub portfolio_history: Vec<f64>,
    pub withdrawal_history: Vec<f64>,
    pub inflation_history: Vec<f64>,
    pub total_withdrawn: f64,
    /// Set once the game has ended; no further years may be played.
    pub outcome: Option<OutcomeKind>,
}

impl SimulationState {
    pub fn new(starting_portfolio: f64) -> Self {
        Self {
            starting_portfolio,
            portfolio_value: starting_portfolio,
            target_withdrawal: TARGET_WITHDRAWAL_RATE * starting_portfolio,
            year: 0,
            portfolio_history: vec![starting_portfolio],
            withdrawal_history: Vec::new(),
            inflation_history: Vec::new(),
            total_withdrawn: 0.0,
            outcome: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    Depleted,
    MarginCalled,
    HorizonReached,
}

impl OutcomeKind {
    /// Depletion and margin calls end the game as a loss.
    pub fn is_failure(self) -> bool {
        matches!(self, OutcomeKind::Depleted | OutcomeKind::MarginCalled)
    }

    pub fn message(self) -> &'static str {
        match self {
            OutcomeKind::Depleted => "Your portfolio has been depleted. Game over!",
            OutcomeKind::MarginCalled => {
                "Margin call! Your portfolio has been liquidated. Game over!"
            }
            OutcomeKind::HorizonReached => "You reached the end of your time horizon.",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeKind::Depleted => "depleted",
            OutcomeKind::MarginCalled => "margin called",
            OutcomeKind::HorizonReached => "horizon reached",
        };
        f.write_str(label)
    }
}

/// Terminal result of a game together with the frozen final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub state: SimulationState,
}

/// One interactive game: fixed parameters plus the evolving state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub params: SimulationParameters,
    pub state: SimulationState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRun {
    pub outcome: Outcome,
    pub trajectory: Vec<f64>,
    /// Total withdrawn excluding the last two withdrawals, when there are at
    /// least two.
    pub adjusted_total_withdrawn: f64,
}

fn require_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite { field, value })
    }
}
