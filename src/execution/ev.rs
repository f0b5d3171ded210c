//! Expected value by numerical integration against the lognormal density.
//!
//! EV = integral Payoff(S_T) f(S_T) dS_T
//!
//! where f is the risk-neutral lognormal density of the terminal price:
//!   ln S_T ~ N(ln S0 + (r - sigma^2/2) T, sigma^2 T)
//!
//! The integral runs over [0.40 S0, 1.60 S0] on a uniform grid and is
//! evaluated as a Riemann sum. Pure function, deterministic from inputs.
use crate::config::EngineConfig;
use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::execution::payoff::{linspace, strategy_payoff};
use crate::models::OptionLeg;
use statrs::distribution::{Continuous, ContinuousCDF, LogNormal, Normal};

/// Integration domain as multiples of spot
const DOMAIN_LOW: f64 = 0.40;
const DOMAIN_HIGH: f64 = 1.60;

/// Every Nth grid point is kept in the returned curve
const CURVE_STRIDE: usize = 10;

/// Terminal-price distribution under GBM with drift `rate`.
#[derive(Debug, Clone)]
pub struct TerminalDistribution {
    pub mu_log: f64,
    pub sigma_log: f64,
    dist: LogNormal,
}

impl TerminalDistribution {
    pub fn new(spot: f64, rate: f64, sigma: f64, ttl_years: f64) -> EngineResult<Self> {
        ensure_positive("spot", spot)?;
        ensure_positive("sigma", sigma)?;
        ensure_positive("time to expiry", ttl_years)?;
        let mu_log = spot.ln() + (rate - 0.5 * sigma * sigma) * ttl_years;
        let sigma_log = sigma * ttl_years.sqrt();
        let dist = LogNormal::new(mu_log, sigma_log)
            .map_err(|e| EngineError::InvalidInput(format!("lognormal: {e}")))?;
        Ok(Self { mu_log, sigma_log, dist })
    }

    #[inline]
    pub fn pdf(&self, terminal: f64) -> f64 {
        if terminal <= 0.0 {
            return 0.0;
        }
        self.dist.pdf(terminal)
    }

    #[inline]
    pub fn cdf(&self, terminal: f64) -> f64 {
        if terminal <= 0.0 {
            return 0.0;
        }
        self.dist.cdf(terminal)
    }
}

/// Downsampled view of the integration grid.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SampledCurve {
    pub prices: Vec<f64>,
    pub payoffs: Vec<f64>,
    pub pdf: Vec<f64>,
}

/// Result of EV computation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EvResult {
    pub ev: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub downside_deviation: f64,
    pub max_loss: f64,
    pub max_profit: f64,
    /// EV / |max loss|, +inf when the strategy cannot lose
    pub ev_per_max_loss: f64,
    /// Probability of profit in [0, 1]
    pub pop: f64,
    pub sharpe: f64,
    pub payoff_curve: SampledCurve,
}

/// Integrate the premium-inclusive strategy payoff against the terminal density.
pub fn compute_ev(
    legs: &[OptionLeg],
    spot: f64,
    sigma: f64,
    ttl_years: f64,
    config: &EngineConfig,
) -> EngineResult<EvResult> {
    if legs.is_empty() {
        return Err(EngineError::InvalidInput("strategy has no legs".into()));
    }
    if config.ev_grid_points < 2 {
        return Err(EngineError::InvalidInput("EV grid needs at least 2 points".into()));
    }
    let density = TerminalDistribution::new(spot, config.risk_free_rate, sigma, ttl_years)?;

    let grid = linspace(spot * DOMAIN_LOW, spot * DOMAIN_HIGH, config.ev_grid_points);
    let ds = grid[1] - grid[0];
    let pdf: Vec<f64> = grid.iter().map(|&st| density.pdf(st)).collect();
    let payoffs: Vec<f64> = grid
        .iter()
        .map(|&st| strategy_payoff(legs, st, true, config.lot_size))
        .collect();

    let mut ev = 0.0;
    let mut ev_sq = 0.0;
    let mut downside_sq = 0.0;
    let mut pop = 0.0;
    for (&p, &f) in payoffs.iter().zip(&pdf) {
        let w = f * ds;
        ev += p * w;
        ev_sq += p * p * w;
        if p <= 0.0 {
            downside_sq += p * p * w;
        }
        if p > 0.0 {
            pop += w;
        }
    }

    let variance = (ev_sq - ev * ev).max(0.0);
    let std_dev = variance.sqrt();
    let max_loss = payoffs.iter().copied().fold(f64::INFINITY, f64::min);
    let max_profit = payoffs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let ev_per_max_loss = if max_loss < 0.0 { ev / max_loss.abs() } else { f64::INFINITY };
    let sharpe = if std_dev > 0.0 { ev / std_dev } else { 0.0 };

    let payoff_curve = SampledCurve {
        prices: grid.iter().step_by(CURVE_STRIDE).copied().collect(),
        payoffs: payoffs.iter().step_by(CURVE_STRIDE).copied().collect(),
        pdf: pdf.iter().step_by(CURVE_STRIDE).copied().collect(),
    };

    Ok(EvResult {
        ev,
        std_dev,
        variance,
        downside_deviation: downside_sq.max(0.0).sqrt(),
        max_loss,
        max_profit,
        ev_per_max_loss,
        pop: pop.min(1.0),
        sharpe,
        payoff_curve,
    })
}

/// Probability that the price touches `barrier` at any time before expiry
/// (continuous monitoring, reflection principle).
///
/// With h = ln(H / S0), mu = r - sigma^2 / 2 and s = sigma sqrt T:
///   up (H >= S0):   N((-h + mu T) / s) + exp(2 mu h / sigma^2) N((-h - mu T) / s)
///   down (H < S0):  N((h - mu T) / s)  + exp(2 mu h / sigma^2) N((h + mu T) / s)
pub fn probability_of_touch(
    spot: f64,
    barrier: f64,
    sigma: f64,
    ttl_years: f64,
    rate: f64,
) -> EngineResult<f64> {
    ensure_positive("spot", spot)?;
    ensure_positive("barrier", barrier)?;
    ensure_positive("sigma", sigma)?;
    ensure_positive("time to expiry", ttl_years)?;

    let n = Normal::standard();
    let mu = rate - 0.5 * sigma * sigma;
    let sig_sqrt_t = sigma * ttl_years.sqrt();
    let h = (barrier / spot).ln();

    // orient h so the barrier always sits "above" in the reflected walk
    let (h, drift) = if barrier >= spot { (h, mu) } else { (-h, -mu) };
    let d_plus = (-h + drift * ttl_years) / sig_sqrt_t;
    let d_minus = (-h - drift * ttl_years) / sig_sqrt_t;
    let p = n.cdf(d_plus) + (2.0 * drift * h / (sigma * sigma)).exp() * n.cdf(d_minus);
    Ok(p.clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

/// Exact P(S_T > threshold) or P(S_T < threshold) from the lognormal CDF.
/// A single-breakeven substitute for the grid-based POP.
pub fn probability_beyond(
    spot: f64,
    threshold: f64,
    sigma: f64,
    ttl_years: f64,
    rate: f64,
    direction: Direction,
) -> EngineResult<f64> {
    ensure_positive("threshold", threshold)?;
    let below = TerminalDistribution::new(spot, rate, sigma, ttl_years)?.cdf(threshold);
    Ok(match direction {
        Direction::Above => 1.0 - below,
        Direction::Below => below,
    })
}
