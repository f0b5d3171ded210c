use crate::errors::{EngineError, EngineResult};
use std::str::FromStr;

/// Accepted Monte Carlo sample counts, for the default and per request
pub const MIN_SIMULATIONS: usize = 1_000;
pub const MAX_SIMULATIONS: usize = 100_000;

/// Quant engine parameters. Passed explicitly into every core call so the
/// engines stay pure and can be tested without touching the environment.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EngineConfig {
    /// Annualized risk-free rate (decimal)
    pub risk_free_rate: f64,
    /// Default Monte Carlo sample count
    pub mc_simulations: usize,
    /// Grid points for the EV integration
    pub ev_grid_points: usize,
    /// Maximum legs per strategy
    pub max_legs: usize,
    /// Strikes kept either side of ATM before templates run
    pub atm_scan_half_width: usize,
    /// Units per contract
    pub lot_size: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.065,
            mc_simulations: 10_000,
            ev_grid_points: 1_000,
            max_legs: 4,
            atm_scan_half_width: 5,
            lot_size: 15.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if !self.risk_free_rate.is_finite() || self.risk_free_rate.abs() > 1.0 {
            return Err(EngineError::Config(format!(
                "RISK_FREE_RATE out of range: {}",
                self.risk_free_rate
            )));
        }
        if self.ev_grid_points < 2 {
            return Err(EngineError::Config("EV_GRID_POINTS must be >= 2".into()));
        }
        if !(MIN_SIMULATIONS..=MAX_SIMULATIONS).contains(&self.mc_simulations) {
            return Err(EngineError::Config(format!(
                "MC_SIMULATIONS must be within [{MIN_SIMULATIONS}, {MAX_SIMULATIONS}], got {}",
                self.mc_simulations
            )));
        }
        if self.max_legs == 0 {
            return Err(EngineError::Config("MAX_LEGS must be >= 1".into()));
        }
        if !(self.lot_size.is_finite() && self.lot_size > 0.0) {
            return Err(EngineError::Config("LOT_SIZE must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub server_port: u16,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            risk_free_rate: parse_env("RISK_FREE_RATE", defaults.risk_free_rate)?,
            mc_simulations: parse_env("MC_SIMULATIONS", defaults.mc_simulations)?,
            ev_grid_points: parse_env("EV_GRID_POINTS", defaults.ev_grid_points)?,
            max_legs: parse_env("MAX_LEGS", defaults.max_legs)?,
            atm_scan_half_width: parse_env("ATM_SCAN_HALF_WIDTH", defaults.atm_scan_half_width)?,
            lot_size: parse_env("LOT_SIZE", defaults.lot_size)?,
        };
        engine.validate()?;

        Ok(Self {
            engine,
            server_port: parse_env("SERVER_PORT", 8000u16)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30u64)?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| EngineError::Config(format!("{key}: {e}"))),
        Err(_) => Ok(default),
    }
}
