use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::{
    BATCH_MARGIN_PERCENT, BatchReport, DrawSource, Game, GameError, GameReport, Outcome,
    OutcomeKind, SeededDraws, SimulationParameters, SimulationState, YearInput, YearSummary,
    batch_report, game_report, resolve_inflation_rate, run_full_simulation, start_game,
    step_game, target_withdrawal_policy, year_summary,
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fire-game",
    about = "Retirement portfolio survival game (withdrawals, margin and inflation, year by year)"
)]
struct Cli {
    #[arg(long, help = "Starting portfolio value")]
    portfolio_amount: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        allow_negative_numbers = true,
        help = "Average annual return in percent, e.g. 7"
    )]
    avg_annual_return: f64,
    #[arg(long, default_value_t = 15.0, help = "Annual return volatility in percent")]
    volatility: f64,
    #[arg(
        long,
        default_value = "3",
        help = "Base inflation in percent, or \"random\" for a rate between 1 and 15"
    )]
    inflation: String,
    #[arg(long, default_value_t = 30, help = "Years to survive")]
    time_horizon: u32,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Margin in percent applied every year of a batch run"
    )]
    margin_percent: f64,
    #[arg(long, help = "Seed for reproducible draws; random when omitted")]
    seed: Option<u64>,
}

/// Inflation selection as sent by a form or JSON client.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum ApiInflation {
    Choice(String),
    Percent(f64),
}

impl ApiInflation {
    fn into_choice(self) -> String {
        match self {
            ApiInflation::Choice(choice) => choice,
            ApiInflation::Percent(percent) => percent.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GamePayload {
    portfolio_amount: Option<f64>,
    avg_annual_return: Option<f64>,
    volatility: Option<f64>,
    inflation: Option<ApiInflation>,
    time_horizon: Option<u32>,
    margin_percent: Option<f64>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YearPayload {
    withdrawal: f64,
    /// Percent, `20` for 20% margin.
    #[serde(default)]
    margin_percent: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
enum GameStatus {
    Active,
    Depleted,
    MarginCalled,
    HorizonReached,
}

impl From<Option<OutcomeKind>> for GameStatus {
    fn from(value: Option<OutcomeKind>) -> Self {
        match value {
            None => GameStatus::Active,
            Some(OutcomeKind::Depleted) => GameStatus::Depleted,
            Some(OutcomeKind::MarginCalled) => GameStatus::MarginCalled,
            Some(OutcomeKind::HorizonReached) => GameStatus::HorizonReached,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GameResponse {
    id: Uuid,
    status: GameStatus,
    message: Option<&'static str>,
    params: SimulationParameters,
    summary: YearSummary,
    state: SimulationState,
    report: Option<GameReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    params: SimulationParameters,
    margin_percent: f64,
    seed: Option<u64>,
    report: BatchReport,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("game {0} not found")]
    GameNotFound(Uuid),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("session store is unavailable")]
    LockPoisoned,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Game(GameError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::GameNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Game(GameError::InvalidStateTransition(_)) => StatusCode::CONFLICT,
            ApiError::LockPoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self, "request rejected");
        error_response(status, &self.to_string())
    }
}

/// One player's game plus the draws that drive it.
#[derive(Debug)]
struct GameSession {
    game: Game,
    draws: SeededDraws,
}

impl GameSession {
    fn response(&self, id: Uuid) -> GameResponse {
        let state = &self.game.state;
        let report = state.outcome.map(|kind| {
            game_report(&Outcome {
                kind,
                state: state.clone(),
            })
        });
        GameResponse {
            id,
            status: state.outcome.into(),
            message: state.outcome.map(OutcomeKind::message),
            params: self.game.params,
            summary: year_summary(state),
            state: state.clone(),
            report,
        }
    }
}

/// Keyed store of running games, one entry per player session.
#[derive(Clone, Default)]
pub struct AppState {
    games: Arc<Mutex<HashMap<Uuid, GameSession>>>,
}

impl AppState {
    fn create_game(&self, payload: GamePayload) -> Result<GameResponse, ApiError> {
        let cli = cli_from_payload(payload);
        let mut draws = draws_for(cli.seed);
        let params = build_parameters(&cli, &mut draws).map_err(ApiError::BadRequest)?;
        let game = start_game(params)?;

        let id = Uuid::new_v4();
        let session = GameSession { game, draws };
        let response = session.response(id);
        self.games
            .lock()
            .map_err(|_| ApiError::LockPoisoned)?
            .insert(id, session);
        info!(%id, "game session created");
        Ok(response)
    }

    fn game_status(&self, id: Uuid) -> Result<GameResponse, ApiError> {
        let games = self.games.lock().map_err(|_| ApiError::LockPoisoned)?;
        let session = games.get(&id).ok_or(ApiError::GameNotFound(id))?;
        Ok(session.response(id))
    }

    fn play_year(&self, id: Uuid, payload: YearPayload) -> Result<GameResponse, ApiError> {
        let mut games = self.games.lock().map_err(|_| ApiError::LockPoisoned)?;
        let session = games.get_mut(&id).ok_or(ApiError::GameNotFound(id))?;
        let input = YearInput {
            withdrawal: payload.withdrawal,
            margin_percent: payload.margin_percent / 100.0,
        };
        step_game(&mut session.game, input, &mut session.draws)?;
        Ok(session.response(id))
    }

    fn remove_game(&self, id: Uuid) -> Result<(), ApiError> {
        self.games
            .lock()
            .map_err(|_| ApiError::LockPoisoned)?
            .remove(&id)
            .map(|_| ())
            .ok_or(ApiError::GameNotFound(id))
    }
}

/// Parses command-line options, runs a batch game and returns the report as
/// pretty JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let response = simulate(&cli)?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to encode report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/games", post(create_game_handler))
        .route(
            "/api/games/:id",
            get(get_game_handler).delete(delete_game_handler),
        )
        .route("/api/games/:id/years", post(play_year_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(AppState::default());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "FIRE game HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/games");

    axum::serve(listener, app).await
}

async fn create_game_handler(
    State(state): State<AppState>,
    Json(payload): Json<GamePayload>,
) -> Result<Response, ApiError> {
    let response = state.create_game(payload)?;
    Ok(json_response(StatusCode::CREATED, response))
}

async fn get_game_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let response = state.game_status(id)?;
    Ok(json_response(StatusCode::OK, response))
}

async fn play_year_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<YearPayload>,
) -> Result<Response, ApiError> {
    let response = state.play_year(id, payload)?;
    Ok(json_response(StatusCode::OK, response))
}

async fn delete_game_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.remove_game(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<GamePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<GamePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: GamePayload) -> Response {
    let cli = cli_from_payload(payload);
    match simulate(&cli) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => ApiError::BadRequest(msg).into_response(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn draws_for(seed: Option<u64>) -> SeededDraws {
    match seed {
        Some(seed) => SeededDraws::seeded(seed),
        None => SeededDraws::from_os_rng(),
    }
}

fn simulate(cli: &Cli) -> Result<SimulateResponse, String> {
    let mut draws = draws_for(cli.seed);
    let params = build_parameters(cli, &mut draws)?;
    let margin_percent = cli.margin_percent / 100.0;
    let run = run_full_simulation(params, target_withdrawal_policy(margin_percent), &mut draws)
        .map_err(|e| e.to_string())?;

    Ok(SimulateResponse {
        params,
        margin_percent,
        seed: cli.seed,
        report: batch_report(&run),
    })
}

/// Converts percent-based options into game parameters.
fn build_parameters(
    cli: &Cli,
    draws: &mut impl DrawSource,
) -> Result<SimulationParameters, String> {
    if !cli.portfolio_amount.is_finite() || cli.portfolio_amount <= 0.0 {
        return Err("--portfolio-amount must be > 0".to_string());
    }

    if cli.time_horizon == 0 {
        return Err("--time-horizon must be > 0".to_string());
    }

    if !cli.avg_annual_return.is_finite() {
        return Err("--avg-annual-return must be a finite number".to_string());
    }

    if !cli.volatility.is_finite() || cli.volatility < 0.0 {
        return Err("--volatility must be >= 0".to_string());
    }

    if !cli.margin_percent.is_finite() || cli.margin_percent < 0.0 {
        return Err("--margin-percent must be >= 0".to_string());
    }

    let base_inflation_rate =
        resolve_inflation_rate(&cli.inflation, draws).map_err(|e| format!("--inflation: {e}"))?;

    let params = SimulationParameters {
        starting_portfolio: cli.portfolio_amount,
        avg_annual_return: cli.avg_annual_return / 100.0,
        volatility: cli.volatility / 100.0,
        base_inflation_rate,
        time_horizon: cli.time_horizon,
    };
    params.validate().map_err(|e| e.to_string())?;
    Ok(params)
}

#[cfg(test)]
fn game_payload_from_json(json: &str) -> Result<GamePayload, String> {
    serde_json::from_str::<GamePayload>(json).map_err(|e| format!("Invalid API JSON payload: {e}"))
}

fn cli_from_payload(payload: GamePayload) -> Cli {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.portfolio_amount {
        cli.portfolio_amount = v;
    }
    if let Some(v) = payload.avg_annual_return {
        cli.avg_annual_return = v;
    }
    if let Some(v) = payload.volatility {
        cli.volatility = v;
    }
    if let Some(v) = payload.inflation {
        cli.inflation = v.into_choice();
    }
    if let Some(v) = payload.time_horizon {
        cli.time_horizon = v;
    }
    if let Some(v) = payload.margin_percent {
        cli.margin_percent = v;
    }
    if payload.seed.is_some() {
        cli.seed = payload.seed;
    }

    cli
}

fn default_cli_for_api() -> Cli {
    Cli {
        portfolio_amount: 1_000_000.0,
        avg_annual_return: 7.0,
        volatility: 15.0,
        inflation: "3".to_string(),
        time_horizon: 30,
        margin_percent: BATCH_MARGIN_PERCENT * 100.0,
        seed: None,
    }
}
