use crate::config::AppConfig;
use crate::risk::margin::{HeuristicMargin, MarginEstimator};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free request counters, exposed at /api/counters.
pub struct PerfCounters {
    pub optimizations_run: AtomicU64,
    pub strategies_ranked: AtomicU64,
    pub greeks_computed: AtomicU64,
    pub iv_solves: AtomicU64,
    pub simulations_run: AtomicU64,
    pub paths_simulated: AtomicU64,
    pub stress_tests_run: AtomicU64,
    pub errors_returned: AtomicU64,
    pub timeouts: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            optimizations_run: AtomicU64::new(0),
            strategies_ranked: AtomicU64::new(0),
            greeks_computed: AtomicU64::new(0),
            iv_solves: AtomicU64::new(0),
            simulations_run: AtomicU64::new(0),
            paths_simulated: AtomicU64::new(0),
            stress_tests_run: AtomicU64::new(0),
            errors_returned: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

// ── Application shared state (read-only config, no locks) ──

pub struct AppState {
    pub config: AppConfig,
    /// Pluggable margin source used by the optimizer
    pub margin: Arc<dyn MarginEstimator>,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        Self::with_margin(config, Arc::new(HeuristicMargin))
    }

    pub fn with_margin(config: AppConfig, margin: Arc<dyn MarginEstimator>) -> Arc<Self> {
        Arc::new(Self {
            config,
            margin,
            counters: PerfCounters::new(),
        })
    }
}
