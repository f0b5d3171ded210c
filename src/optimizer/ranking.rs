//! Candidate generation, risk-constrained scoring and ranking.
//!
//! Objective: max EV / |max loss| subject to
//!   |max loss| <= capital * risk threshold
//!   margin     <= capital
use crate::config::EngineConfig;
use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::execution::ev::compute_ev;
use crate::execution::payoff::{net_premium, payoff_curve, PayoffCurve};
use crate::models::black_scholes::{self, Greeks};
use crate::models::PricingInputs;
use crate::optimizer::chain::MarketSnapshot;
use crate::optimizer::templates::catalogue;
use crate::optimizer::{Legs, MarketView, OptimizationRequest, RiskProfile, Strategy, StrategyCategory};
use crate::risk::limits::{check_candidate, RiskCheck, MIN_CAPITAL};
use crate::risk::margin::{MarginEstimate, MarginEstimator};
use rayon::prelude::*;

/// Payoff curve attached to each ranked strategy
const CURVE_RANGE_PCT: f64 = 0.08;
const CURVE_POINTS: usize = 100;

/// Market state and account limits every candidate is scored against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    pub spot: f64,
    /// Adjusted ATM IV, decimal
    pub sigma: f64,
    pub ttl_years: f64,
    pub capital: f64,
    pub risk_profile: RiskProfile,
    pub top_n: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedStrategy {
    pub rank: usize,
    pub name: String,
    pub category: StrategyCategory,
    pub legs: Legs,
    pub ev: f64,
    pub max_loss: f64,
    pub max_profit: f64,
    pub pop: f64,
    pub sharpe: f64,
    pub ev_per_max_loss: f64,
    pub std_dev: f64,
    pub downside_deviation: f64,
    pub breakevens: Vec<f64>,
    /// Net premium for one lot, positive = credit
    pub net_premium: f64,
    pub margin: MarginEstimate,
    pub capital_efficiency: f64,
    /// First-leg Greeks, a proxy for the position
    pub greeks: Greeks,
    pub payoff_curve: PayoffCurve,
    /// EV / margin in percent
    pub roi: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OptimizationResponse {
    pub request_id: uuid::Uuid,
    pub symbol: String,
    pub spot: f64,
    /// Adjusted ATM IV in percent
    pub iv: f64,
    pub expiry: String,
    pub strategies: Vec<RankedStrategy>,
    pub n_candidates_evaluated: usize,
    pub optimization_time_ms: f64,
    pub is_synthetic_data: bool,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

impl OptimizationResponse {
    /// Treat an empty ranking as a failure.
    pub fn require_feasible(self) -> EngineResult<Self> {
        if self.strategies.is_empty() {
            return Err(EngineError::NoFeasibleStrategy { candidates: self.n_candidates_evaluated });
        }
        Ok(self)
    }
}

/// Run the view's catalogue over the ATM window of `snapshot`.
///
/// Templates that fall off the chain are skipped; templates whose quotes
/// produce invalid legs are logged and skipped. Zero survivors is NoCandidates.
pub fn generate_candidates(
    snapshot: &MarketSnapshot,
    view: MarketView,
    config: &EngineConfig,
) -> EngineResult<Vec<Strategy>> {
    let atm = snapshot.atm_index()?;
    let (window, local_atm) = snapshot.scan_window(atm, config.atm_scan_half_width);

    let mut candidates = Vec::new();
    for template in catalogue(view) {
        match template.build(window, local_atm, config.max_legs) {
            Ok(Some(strategy)) => candidates.push(strategy),
            Ok(None) => {
                tracing::debug!(template = ?template, "template does not fit chain");
            }
            Err(e) => {
                tracing::warn!(template = ?template, error = %e, "strategy builder failed");
            }
        }
    }

    tracing::info!(view = %view, candidates = candidates.len(), "generated candidate strategies");
    if candidates.is_empty() {
        return Err(EngineError::NoCandidates { view: view.to_string(), strikes: window.len() });
    }
    Ok(candidates)
}

/// Score one candidate. `Ok(None)` when it fails the account's limits.
fn score_candidate(
    strategy: &Strategy,
    params: &ScoringParams,
    config: &EngineConfig,
    margin: &dyn MarginEstimator,
) -> EngineResult<Option<RankedStrategy>> {
    let legs = strategy.legs.as_slice();
    let ev = compute_ev(legs, params.spot, params.sigma, params.ttl_years, config)?;
    let margin = margin.estimate(legs, config.lot_size)?;

    if let RiskCheck::Blocked(reason) =
        check_candidate(ev.max_loss, margin.total, params.capital, params.risk_profile)
    {
        tracing::debug!(
            strategy = %strategy.name,
            max_loss = ev.max_loss,
            margin = margin.total,
            reason,
            "candidate filtered"
        );
        return Ok(None);
    }

    let curve = payoff_curve(legs, params.spot, CURVE_RANGE_PCT, CURVE_POINTS, config.lot_size);
    let greeks = match legs.first() {
        Some(first) => black_scholes::greeks(
            &PricingInputs::new(params.spot, first.strike, params.ttl_years, config.risk_free_rate, first.volatility),
            first.kind,
        )?,
        None => Greeks::default(),
    };
    let (capital_efficiency, roi) = if margin.total > 0.0 {
        (ev.ev / margin.total, ev.ev / margin.total * 100.0)
    } else {
        (0.0, 0.0)
    };

    Ok(Some(RankedStrategy {
        rank: 0,
        name: strategy.name.clone(),
        category: strategy.category,
        legs: strategy.legs.clone(),
        ev: ev.ev,
        max_loss: ev.max_loss,
        max_profit: ev.max_profit,
        pop: ev.pop,
        sharpe: ev.sharpe,
        ev_per_max_loss: ev.ev_per_max_loss,
        std_dev: ev.std_dev,
        downside_deviation: ev.downside_deviation,
        breakevens: curve.breakevens.clone(),
        net_premium: net_premium(legs) * config.lot_size,
        margin,
        capital_efficiency,
        greeks,
        payoff_curve: curve,
        roi,
    }))
}

/// Score every candidate in parallel, drop the infeasible ones and return the
/// best `top_n` by EV / |max loss|. Equal scores keep generation order.
pub fn rank_strategies(
    candidates: &[Strategy],
    params: &ScoringParams,
    config: &EngineConfig,
    margin: &dyn MarginEstimator,
) -> Vec<RankedStrategy> {
    if params.capital < MIN_CAPITAL {
        tracing::info!(capital = params.capital, "capital below minimum, nothing to rank");
        return Vec::new();
    }

    let scored: Vec<EngineResult<Option<RankedStrategy>>> = candidates
        .par_iter()
        .map(|s| score_candidate(s, params, config, margin))
        .collect();

    let mut ranked: Vec<RankedStrategy> = scored
        .into_iter()
        .zip(candidates)
        .filter_map(|(result, strategy)| match result {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(strategy = %strategy.name, error = %e, "scoring failed, candidate dropped");
                None
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.ev_per_max_loss.total_cmp(&a.ev_per_max_loss));
    let feasible = ranked.len();
    ranked.truncate(params.top_n);
    for (i, s) in ranked.iter_mut().enumerate() {
        s.rank = i + 1;
    }

    tracing::info!(feasible, returned = ranked.len(), "ranked strategies");
    ranked
}

/// Full optimizer pass: validate, derive ATM IV, generate, rank.
pub fn optimize(
    request: &OptimizationRequest,
    snapshot: &MarketSnapshot,
    config: &EngineConfig,
    margin: &dyn MarginEstimator,
) -> EngineResult<OptimizationResponse> {
    let started = std::time::Instant::now();
    request.validate()?;
    snapshot.validate()?;

    let candidates = generate_candidates(snapshot, request.market_view, config)?;

    let atm = snapshot.atm_index()?;
    let sigma = request.volatility_outlook.adjust(snapshot.atm_iv(atm)?);
    ensure_positive("ATM implied volatility", sigma)?;

    let params = ScoringParams {
        spot: snapshot.spot,
        sigma,
        ttl_years: request.time_horizon.ttl_years(),
        capital: request.capital,
        risk_profile: request.risk_appetite,
        top_n: request.top_n,
    };
    let strategies = rank_strategies(&candidates, &params, config, margin);

    Ok(OptimizationResponse {
        request_id: uuid::Uuid::new_v4(),
        symbol: request.symbol.clone(),
        spot: snapshot.spot,
        iv: sigma * 100.0,
        expiry: snapshot.expiry_label(),
        strategies,
        n_candidates_evaluated: candidates.len(),
        optimization_time_ms: started.elapsed().as_secs_f64() * 1_000.0,
        is_synthetic_data: snapshot.synthetic,
        generated_at: chrono::Utc::now(),
    })
}
