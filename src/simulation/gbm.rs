use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::simulation::gaussian::box_muller;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rayon::prelude::*;

/// Golden-ratio increment used to spread pair indices across the seed space
const STREAM_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Discretized geometric Brownian motion:
///
///   S_{i+1} = S_i exp((mu - sigma^2/2) dt + sigma sqrt(dt) Z)
///
/// Every antithetic pair owns a PCG stream derived from (seed, pair index), so
/// any path can be regenerated on demand and bulk generation gives the same
/// bits on any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct GbmSimulator {
    spot: f64,
    drift_dt: f64,
    vol_sqrt_dt: f64,
    n_steps: usize,
    seed: u64,
    antithetic: bool,
}

impl GbmSimulator {
    pub fn new(
        spot: f64,
        drift: f64,
        sigma: f64,
        ttl_years: f64,
        n_steps: usize,
        seed: u64,
        antithetic: bool,
    ) -> EngineResult<Self> {
        ensure_positive("spot", spot)?;
        ensure_positive("sigma", sigma)?;
        ensure_positive("time horizon", ttl_years)?;
        if n_steps == 0 {
            return Err(EngineError::InvalidInput("n_steps must be >= 1".into()));
        }
        let dt = ttl_years / n_steps as f64;
        Ok(Self {
            spot,
            drift_dt: (drift - 0.5 * sigma * sigma) * dt,
            vol_sqrt_dt: sigma * dt.sqrt(),
            n_steps,
            seed,
            antithetic,
        })
    }

    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Which normal stream drives path `index` out of `n_paths`, and its sign.
    ///
    /// With antithetic sampling the first half of the paths use +Z, the second
    /// half mirror them with -Z, and an odd final path takes a fresh stream.
    #[inline]
    fn stream_for(&self, index: usize, n_paths: usize) -> (u64, f64) {
        if !self.antithetic {
            return (index as u64, 1.0);
        }
        let half = n_paths / 2;
        if index < half {
            (index as u64, 1.0)
        } else if index < 2 * half {
            ((index - half) as u64, -1.0)
        } else {
            (half as u64, 1.0)
        }
    }

    fn shocks(&self, stream: u64) -> Vec<f64> {
        let mut rng =
            Pcg64::seed_from_u64(self.seed.wrapping_add(stream.wrapping_mul(STREAM_STRIDE)));
        box_muller(self.n_steps, &mut rng)
    }

    /// Cumulative log-returns of one path, one entry per step.
    fn log_path(&self, index: usize, n_paths: usize) -> impl Iterator<Item = f64> + '_ {
        let (stream, sign) = self.stream_for(index, n_paths);
        let (drift_dt, vol_sqrt_dt) = (self.drift_dt, self.vol_sqrt_dt);
        self.shocks(stream).into_iter().scan(0.0, move |acc, z| {
            *acc += drift_dt + vol_sqrt_dt * sign * z;
            Some(*acc)
        })
    }

    /// Full price path, `n_steps + 1` values starting at the spot.
    pub fn path(&self, index: usize, n_paths: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_steps + 1);
        out.push(self.spot);
        out.extend(self.log_path(index, n_paths).map(|log| self.spot * log.exp()));
        out
    }

    /// Terminal price of one path. Bit-identical to the last value of `path`.
    pub fn terminal(&self, index: usize, n_paths: usize) -> f64 {
        let last = self.log_path(index, n_paths).last().unwrap_or(0.0);
        self.spot * last.exp()
    }

    /// Terminal prices for `n_paths` paths, computed in parallel, in path order.
    pub fn terminal_prices(&self, n_paths: usize) -> Vec<f64> {
        (0..n_paths)
            .into_par_iter()
            .map(|i| self.terminal(i, n_paths))
            .collect()
    }

    /// Every path in full. Memory is `n_paths * (n_steps + 1)`; prefer
    /// `terminal_prices` plus `path` for the few paths that are needed.
    pub fn simulate_paths(&self, n_paths: usize) -> Vec<Vec<f64>> {
        (0..n_paths)
            .into_par_iter()
            .map(|i| self.path(i, n_paths))
            .collect()
    }
}
