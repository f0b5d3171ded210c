use crate::errors::{EngineError, EngineResult};
use crate::execution::ev::{compute_ev, EvResult};
use crate::models::black_scholes;
use crate::models::implied_vol::{implied_volatility, IvOutcome};
use crate::optimizer::ranking::{optimize as run_optimizer, OptimizationResponse};
use crate::risk::stress::{stress_test, StressResult};
use crate::server::requests::{
    GreeksRequest, ImpliedVolRequest, MonteCarloRequest, OptimizeBody, StressRequest,
};
use crate::server::ApiError;
use crate::simulation::{run_monte_carlo, SimulationResult};
use crate::state::{AppState, PerfCounters};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use portable_atomic::Ordering::Relaxed;
use std::sync::Arc;
use std::time::Duration;

fn parse<T>(state: &AppState, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        PerfCounters::bump(&state.counters.errors_returned, 1);
        ApiError(EngineError::InvalidInput(rejection.body_text()))
    })
}

/// Run a core computation on the blocking pool under the request deadline.
/// On timeout the task is abandoned, not cancelled.
async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> EngineResult<T> + Send + 'static,
{
    let secs = state.config.request_timeout_secs;
    let outcome = match tokio::time::timeout(Duration::from_secs(secs), tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(EngineError::Internal(format!("computation task failed: {join_err}"))),
        Err(_) => {
            PerfCounters::bump(&state.counters.timeouts, 1);
            tracing::warn!(timeout_secs = secs, "request deadline exceeded");
            Err(EngineError::Timeout(secs))
        }
    };
    outcome.map_err(|e| {
        PerfCounters::bump(&state.counters.errors_returned, 1);
        ApiError(e)
    })
}

/// POST /api/v1/optimize -- rank strategies over the posted chain
pub async fn optimize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OptimizeBody>, JsonRejection>,
) -> Result<Json<OptimizationResponse>, ApiError> {
    let body = parse(&state, payload)?;
    let config = state.config.engine;
    let margin = state.margin.clone();

    tracing::info!(
        symbol = %body.request.symbol,
        view = %body.request.market_view,
        capital = body.request.capital,
        strikes = body.snapshot.rows.len(),
        "optimize request"
    );

    let response = run_blocking(&state, move || {
        run_optimizer(&body.request, &body.snapshot, &config, margin.as_ref())
            .and_then(OptimizationResponse::require_feasible)
    })
    .await?;

    PerfCounters::bump(&state.counters.optimizations_run, 1);
    PerfCounters::bump(&state.counters.strategies_ranked, response.strategies.len() as u64);
    tracing::info!(
        request_id = %response.request_id,
        returned = response.strategies.len(),
        elapsed_ms = response.optimization_time_ms,
        "optimize complete"
    );
    Ok(Json(response))
}

/// POST /api/v1/greeks -- price, Greeks and +/-5 vol point shocks
pub async fn greeks(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GreeksRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = parse(&state, payload)?;
    let config = state.config.engine;

    let (inputs, report) = run_blocking(&state, move || {
        let inputs = req.pricing_inputs(&config)?;
        let report = black_scholes::greeks_report(&inputs, req.option_type)?;
        Ok((inputs, report))
    })
    .await?;

    PerfCounters::bump(&state.counters.greeks_computed, 1);
    Ok(Json(serde_json::json!({
        "price": report.price,
        "greeks": report.greeks,
        "iv_shocked": {
            "iv_plus_5pct": report.iv_plus_5pct,
            "iv_minus_5pct": report.iv_minus_5pct,
        },
        "parameters": {
            "spot": inputs.spot,
            "strike": inputs.strike,
            "ttl_years": inputs.ttl_years,
            "iv_pct": inputs.sigma * 100.0,
            "risk_free_rate": inputs.rate,
        },
    })))
}

/// POST /api/v1/implied-vol -- Newton-Raphson IV from a market price
pub async fn implied_vol(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImpliedVolRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = parse(&state, payload)?;
    let config = state.config.engine;

    let outcome = run_blocking(&state, move || {
        let (ttl_years, rate) = req.horizon(&config)?;
        let outcome = implied_volatility(req.market_price, req.spot, req.strike, ttl_years, rate, req.option_type)?;
        outcome.into_result()?;
        Ok(outcome)
    })
    .await?;

    PerfCounters::bump(&state.counters.iv_solves, 1);
    let iterations = match outcome {
        IvOutcome::Converged { iterations, .. } | IvOutcome::NotConverged { iterations, .. } => iterations,
    };
    Ok(Json(serde_json::json!({
        "status": "converged",
        "sigma": outcome.sigma(),
        "iv_pct": outcome.sigma() * 100.0,
        "iterations": iterations,
    })))
}

/// POST /api/v1/simulate -- Monte Carlo risk profile, with the integrated EV alongside
pub async fn simulate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MonteCarloRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = parse(&state, payload)?;
    let config = state.config.engine;

    let (result, integrated): (SimulationResult, EvResult) = run_blocking(&state, move || {
        let (legs, params) = req.into_parts(&config)?;
        let result = run_monte_carlo(&legs, &params, &config)?;
        let integrated = compute_ev(&legs, params.spot, params.sigma, params.ttl_years, &config)?;
        Ok((result, integrated))
    })
    .await?;

    PerfCounters::bump(&state.counters.simulations_run, 1);
    PerfCounters::bump(&state.counters.paths_simulated, result.n_simulations as u64);

    let mut body = serde_json::to_value(&result).map_err(|e| ApiError(EngineError::Internal(e.to_string())))?;
    body["integrated_ev"] = serde_json::json!(integrated.ev);
    body["integrated_pop"] = serde_json::json!(integrated.pop);
    Ok(Json(body))
}

/// POST /api/v1/stress -- scenario re-pricing
pub async fn stress(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StressRequest>, JsonRejection>,
) -> Result<Json<StressResult>, ApiError> {
    let req = parse(&state, payload)?;
    let config = state.config.engine;

    let result = run_blocking(&state, move || {
        let inputs = req.into_parts(&config)?;
        stress_test(&inputs.legs, inputs.spot, inputs.sigma, inputs.ttl_years, &inputs.scenario, &config)
    })
    .await?;

    PerfCounters::bump(&state.counters.stress_tests_run, 1);
    Ok(Json(result))
}

/// GET /api/v1/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.config.engine,
    }))
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let c = &state.counters;
    Json(serde_json::json!({
        "optimizations_run": c.optimizations_run.load(Relaxed),
        "strategies_ranked": c.strategies_ranked.load(Relaxed),
        "greeks_computed": c.greeks_computed.load(Relaxed),
        "iv_solves": c.iv_solves.load(Relaxed),
        "simulations_run": c.simulations_run.load(Relaxed),
        "paths_simulated": c.paths_simulated.load(Relaxed),
        "stress_tests_run": c.stress_tests_run.load(Relaxed),
        "errors_returned": c.errors_returned.load(Relaxed),
        "timeouts": c.timeouts.load(Relaxed),
    }))
}
