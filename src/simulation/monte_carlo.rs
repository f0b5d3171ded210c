use crate::config::EngineConfig;
use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::execution::payoff::strategy_payoff;
use crate::models::OptionLeg;
use crate::simulation::gbm::GbmSimulator;
use crate::simulation::metrics::{self, HistogramBin};
use rayon::prelude::*;

const HISTOGRAM_BINS: usize = 50;
const MAX_VIZ_PATHS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub spot: f64,
    /// Annualized volatility, decimal
    pub sigma: f64,
    pub ttl_years: f64,
    pub n_simulations: usize,
    pub n_steps: usize,
    pub seed: u64,
}

/// A handful of full paths for charting, plus the paths whose terminal price
/// sits at the 10/25/50/75/90th rank.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SamplePaths {
    pub prices: Vec<Vec<f64>>,
    pub p10: Vec<f64>,
    pub p25: Vec<f64>,
    pub p50: Vec<f64>,
    pub p75: Vec<f64>,
    pub p90: Vec<f64>,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct TerminalPercentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationResult {
    pub n_simulations: usize,
    pub ev: f64,
    pub std_dev: f64,
    pub win_rate: f64,
    pub max_profit: f64,
    pub max_loss: f64,
    /// 5th percentile payoff
    pub var_95: f64,
    /// 1st percentile payoff
    pub var_99: f64,
    /// Mean payoff at or below VaR95
    pub cvar_95: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub downside_deviation: f64,
    pub histogram: Vec<HistogramBin>,
    pub sample_paths: SamplePaths,
    pub terminal_prices: TerminalPercentiles,
}

/// Simulate `n_simulations` risk-neutral terminal prices and evaluate the
/// premium-inclusive strategy payoff on each.
///
/// Drift is the configured risk-free rate; payoffs are per lot. The result is
/// a pure function of (legs, params, config).
pub fn run_monte_carlo(
    legs: &[OptionLeg],
    params: &SimulationParams,
    config: &EngineConfig,
) -> EngineResult<SimulationResult> {
    if legs.is_empty() {
        return Err(EngineError::InvalidInput("strategy has no legs".into()));
    }
    if params.n_simulations == 0 {
        return Err(EngineError::InvalidInput("n_simulations must be >= 1".into()));
    }
    ensure_positive("spot", params.spot)?;

    let n = params.n_simulations;
    let sim = GbmSimulator::new(
        params.spot,
        config.risk_free_rate,
        params.sigma,
        params.ttl_years,
        params.n_steps,
        params.seed,
        true,
    )?;

    let terminal = sim.terminal_prices(n);
    let payoffs: Vec<f64> = terminal
        .par_iter()
        .map(|&st| strategy_payoff(legs, st, true, config.lot_size))
        .collect();

    let ev = metrics::mean(&payoffs);
    let std_dev = metrics::std_dev(&payoffs);
    let win_rate = payoffs.iter().filter(|&&p| p > 0.0).count() as f64 / n as f64;

    let mut sorted = payoffs.clone();
    sorted.sort_by(f64::total_cmp);
    let var_95 = metrics::percentile(&sorted, 5.0);
    let var_99 = metrics::percentile(&sorted, 1.0);
    let tail: Vec<f64> = sorted.iter().copied().take_while(|&p| p <= var_95).collect();
    let cvar_95 = metrics::mean(&tail);

    let losses: Vec<f64> = payoffs.iter().copied().filter(|&p| p < 0.0).collect();
    let downside_deviation = metrics::std_dev(&losses);

    let sharpe = if std_dev > 0.0 { ev / std_dev } else { 0.0 };
    let sortino = if downside_deviation > 0.0 { ev / downside_deviation } else { 0.0 };

    let mut sorted_terminal = terminal.clone();
    sorted_terminal.sort_by(f64::total_cmp);
    let terminal_prices = TerminalPercentiles {
        p5: metrics::percentile(&sorted_terminal, 5.0),
        p25: metrics::percentile(&sorted_terminal, 25.0),
        p50: metrics::percentile(&sorted_terminal, 50.0),
        p75: metrics::percentile(&sorted_terminal, 75.0),
        p95: metrics::percentile(&sorted_terminal, 95.0),
    };

    let sample_paths = sample_paths(&sim, &terminal);

    tracing::debug!(n, ev, std_dev, win_rate, "monte carlo run complete");

    Ok(SimulationResult {
        n_simulations: n,
        ev,
        std_dev,
        win_rate,
        max_profit: sorted[n - 1],
        max_loss: sorted[0],
        var_95,
        var_99,
        cvar_95,
        sharpe,
        sortino,
        downside_deviation,
        histogram: metrics::histogram(&payoffs, HISTOGRAM_BINS),
        sample_paths,
        terminal_prices,
    })
}

/// Regenerates only the paths that are displayed; the full matrix is never held.
fn sample_paths(sim: &GbmSimulator, terminal: &[f64]) -> SamplePaths {
    let n = terminal.len();
    let n_viz = MAX_VIZ_PATHS.min(n);
    let step = (n / n_viz).max(1);
    let prices = (0..n)
        .step_by(step)
        .take(n_viz)
        .map(|i| sim.path(i, n))
        .collect();

    // stable: equal terminal prices keep path order
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| terminal[a].total_cmp(&terminal[b]));
    let band = |q: f64| {
        let rank = ((q * n as f64) as usize).min(n - 1);
        sim.path(order[rank], n)
    };

    SamplePaths {
        prices,
        p10: band(0.10),
        p25: band(0.25),
        p50: band(0.50),
        p75: band(0.75),
        p90: band(0.90),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ev::compute_ev;
    use crate::models::{OptionKind, Side};
    use approx::assert_abs_diff_eq;

    fn unit_lot() -> EngineConfig {
        EngineConfig { lot_size: 1.0, ..EngineConfig::default() }
    }

    fn bull_call_spread() -> Vec<OptionLeg> {
        vec![
            OptionLeg::new(51_000.0, OptionKind::Call, Side::Long, 1, 254.0, 0.14).unwrap(),
            OptionLeg::new(51_200.0, OptionKind::Call, Side::Short, 1, 124.0, 0.14).unwrap(),
        ]
    }

    fn params(n_simulations: usize, n_steps: usize) -> SimulationParams {
        SimulationParams {
            spot: 51_204.0,
            sigma: 0.1432,
            ttl_years: 29.0 / 365.0,
            n_simulations,
            n_steps,
            seed: 42,
        }
    }

    #[test]
    fn test_histogram_frequencies_sum_to_one() {
        let r = run_monte_carlo(&bull_call_spread(), &params(10_000, 1), &unit_lot()).unwrap();
        assert_eq!(r.histogram.len(), 50);
        let total: f64 = r.histogram.iter().map(|b| b.frequency).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 0.02);
    }

    #[test]
    fn test_same_seed_identical_result() {
        let a = run_monte_carlo(&bull_call_spread(), &params(5_001, 4), &unit_lot()).unwrap();
        let b = run_monte_carlo(&bull_call_spread(), &params(5_001, 4), &unit_lot()).unwrap();
        assert_eq!(a.ev, b.ev);
        assert_eq!(a.var_95, b.var_95);
        assert_eq!(a.sample_paths.prices, b.sample_paths.prices);
        assert_eq!(a.sample_paths.p50, b.sample_paths.p50);
    }

    #[test]
    fn test_matches_integrated_ev() {
        let cfg = unit_lot();
        let p = params(100_000, 1);
        let mc = run_monte_carlo(&bull_call_spread(), &p, &cfg).unwrap();
        let grid = compute_ev(&bull_call_spread(), p.spot, p.sigma, p.ttl_years, &cfg).unwrap();
        assert_abs_diff_eq!(mc.ev, grid.ev, epsilon = 3.0);
        assert_abs_diff_eq!(mc.win_rate, grid.pop, epsilon = 0.02);
        assert_abs_diff_eq!(mc.max_loss, -130.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mc.max_profit, 70.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tail_metrics_ordered() {
        let legs = vec![
            OptionLeg::new(51_200.0, OptionKind::Call, Side::Short, 1, 400.0, 0.14).unwrap(),
            OptionLeg::new(51_200.0, OptionKind::Put, Side::Short, 1, 400.0, 0.14).unwrap(),
        ];
        let r = run_monte_carlo(&legs, &params(20_000, 1), &unit_lot()).unwrap();
        assert!(r.var_99 <= r.var_95, "var99={} var95={}", r.var_99, r.var_95);
        assert!(r.cvar_95 <= r.var_95, "cvar={} var={}", r.cvar_95, r.var_95);
        assert!(r.max_loss <= r.var_99);
        assert!(r.downside_deviation > 0.0);
        assert!((0.0..=1.0).contains(&r.win_rate));
    }

    #[test]
    fn test_bands_and_samples() {
        let r = run_monte_carlo(&bull_call_spread(), &params(2_000, 10), &unit_lot()).unwrap();
        let sp = &r.sample_paths;
        assert_eq!(sp.prices.len(), 50);
        assert!(sp.prices.iter().all(|p| p.len() == 11 && p[0] == 51_204.0));
        let last = |p: &Vec<f64>| p[p.len() - 1];
        assert!(last(&sp.p10) <= last(&sp.p25));
        assert!(last(&sp.p25) <= last(&sp.p50));
        assert!(last(&sp.p50) <= last(&sp.p75));
        assert!(last(&sp.p75) <= last(&sp.p90));
        let tp = r.terminal_prices;
        assert!(tp.p5 < tp.p25 && tp.p25 < tp.p50 && tp.p50 < tp.p75 && tp.p75 < tp.p95);
    }

    #[test]
    fn test_small_run_fewer_samples_than_viz_cap() {
        let r = run_monte_carlo(&bull_call_spread(), &params(7, 2), &unit_lot()).unwrap();
        assert_eq!(r.sample_paths.prices.len(), 7);
    }

    #[test]
    fn test_rejects_empty_strategy() {
        assert!(run_monte_carlo(&[], &params(100, 1), &unit_lot()).is_err());
        assert!(run_monte_carlo(&bull_call_spread(), &params(0, 1), &unit_lot()).is_err());
    }
}
