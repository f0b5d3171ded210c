//! Scenario re-pricing of a multi-leg position.
//!
//! A scenario moves spot (percent), implied vol (vol points) and the clock
//! (calendar days). Every leg is revalued with Black-Scholes before and after
//! the shock; P&L is measured against the entry premium.
use crate::config::EngineConfig;
use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::models::black_scholes::{self, Greeks};
use crate::models::{OptionLeg, PricingInputs};

const DAYS_PER_YEAR: f64 = 365.0;
const MIN_SIGMA: f64 = 0.01;
const MIN_TTL_YEARS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StressScenario {
    /// Relative spot move in percent, [-20, 20]
    pub spot_move_pct: f64,
    /// Absolute IV move in vol points, [-50, 100]
    pub iv_move_pct: f64,
    /// Calendar days to roll forward, [0, 30]
    pub days_forward: u32,
}

impl StressScenario {
    pub fn validate(&self) -> EngineResult<()> {
        if !(-20.0..=20.0).contains(&self.spot_move_pct) {
            return Err(EngineError::InvalidInput(format!(
                "spot_move_pct must be within [-20, 20], got {}",
                self.spot_move_pct
            )));
        }
        if !(-50.0..=100.0).contains(&self.iv_move_pct) {
            return Err(EngineError::InvalidInput(format!(
                "iv_move_pct must be within [-50, 100], got {}",
                self.iv_move_pct
            )));
        }
        if self.days_forward > 30 {
            return Err(EngineError::InvalidInput(format!(
                "days_forward must be within [0, 30], got {}",
                self.days_forward
            )));
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        let sign = |x: f64| if x >= 0.0 { "+" } else { "" };
        format!(
            "Spot {}{:.1}%, IV {}{:.1}%, {}d forward",
            sign(self.spot_move_pct),
            self.spot_move_pct,
            sign(self.iv_move_pct),
            self.iv_move_pct,
            self.days_forward
        )
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StressResult {
    pub current_pnl: f64,
    pub new_pnl: f64,
    pub pnl_change: f64,
    pub new_spot: f64,
    /// Shocked IV in percent
    pub new_iv: f64,
    /// Greeks of the first leg in the shocked state
    pub new_greeks: Greeks,
    /// Theta bleed over `days_forward` at the current state
    pub time_decay: f64,
    pub scenario_description: String,
}

/// Revalue `legs` under `scenario`.
///
/// `sigma` is the position-level IV (decimal) that the vol shock is applied
/// to; the current valuation uses each leg's own volatility.
pub fn stress_test(
    legs: &[OptionLeg],
    spot: f64,
    sigma: f64,
    ttl_years: f64,
    scenario: &StressScenario,
    config: &EngineConfig,
) -> EngineResult<StressResult> {
    let first = legs
        .first()
        .ok_or_else(|| EngineError::InvalidInput("stress test needs at least one leg".into()))?;
    ensure_positive("spot", spot)?;
    ensure_positive("sigma", sigma)?;
    if !(ttl_years >= 0.0) {
        return Err(EngineError::InvalidInput(format!("time to expiry must be >= 0, got {ttl_years}")));
    }
    scenario.validate()?;

    let rate = config.risk_free_rate;
    let lot = config.lot_size;
    let days = scenario.days_forward as f64;
    let new_spot = spot * (1.0 + scenario.spot_move_pct / 100.0);
    let new_sigma = (sigma + scenario.iv_move_pct / 100.0).max(MIN_SIGMA);
    let new_ttl = (ttl_years - days / DAYS_PER_YEAR).max(MIN_TTL_YEARS);

    let mut current_pnl = 0.0;
    let mut new_pnl = 0.0;
    let mut time_decay = 0.0;
    for leg in legs {
        let now = PricingInputs::new(spot, leg.strike, ttl_years, rate, leg.volatility);
        let shocked = PricingInputs::new(new_spot, leg.strike, new_ttl, rate, new_sigma);
        let units = leg.signed_quantity() * lot;

        current_pnl += units * (black_scholes::price(&now, leg.kind)? - leg.premium);
        new_pnl += units * (black_scholes::price(&shocked, leg.kind)? - leg.premium);
        time_decay += units * black_scholes::greeks(&now, leg.kind)?.theta * days;
    }

    let new_greeks = black_scholes::greeks(
        &PricingInputs::new(new_spot, first.strike, new_ttl, rate, new_sigma),
        first.kind,
    )?;

    Ok(StressResult {
        current_pnl,
        new_pnl,
        pnl_change: new_pnl - current_pnl,
        new_spot,
        new_iv: new_sigma * 100.0,
        new_greeks,
        time_decay,
        scenario_description: scenario.describe(),
    })
}

/// P&L of repricing every leg at its own IV plus `shift_pct` vol points,
/// everything else held fixed.
pub fn iv_shock_pnl(
    legs: &[OptionLeg],
    spot: f64,
    ttl_years: f64,
    rate: f64,
    shift_pct: f64,
    lot_size: f64,
) -> EngineResult<f64> {
    let shift = shift_pct / 100.0;
    legs.iter().try_fold(0.0, |acc, leg| {
        let before = PricingInputs::new(spot, leg.strike, ttl_years, rate, leg.volatility);
        let after = before.with_sigma(leg.volatility + shift);
        let delta = black_scholes::price(&after, leg.kind)? - black_scholes::price(&before, leg.kind)?;
        Ok(acc + leg.signed_quantity() * lot_size * delta)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionKind, Side};
    use approx::assert_abs_diff_eq;

    fn long_call(premium: f64) -> OptionLeg {
        OptionLeg::new(100.0, OptionKind::Call, Side::Long, 1, premium, 0.2).unwrap()
    }

    fn cfg() -> EngineConfig {
        EngineConfig { risk_free_rate: 0.05, lot_size: 1.0, ..EngineConfig::default() }
    }

    #[test]
    fn test_flat_scenario_changes_nothing() {
        let r = stress_test(&[long_call(4.0)], 100.0, 0.2, 0.25, &StressScenario::default(), &cfg())
            .unwrap();
        assert_abs_diff_eq!(r.pnl_change, 0.0, epsilon = 1e-9);
        assert_eq!(r.new_spot, 100.0);
        assert_abs_diff_eq!(r.new_iv, 20.0, epsilon = 1e-9);
        assert_eq!(r.time_decay, 0.0);
        assert_eq!(r.scenario_description, "Spot +0.0%, IV +0.0%, 0d forward");
    }

    #[test]
    fn test_rally_helps_long_call_and_hurts_short() {
        let up = StressScenario { spot_move_pct: 5.0, ..Default::default() };
        let long = stress_test(&[long_call(4.0)], 100.0, 0.2, 0.25, &up, &cfg()).unwrap();
        assert!(long.pnl_change > 0.0);
        assert!(long.new_greeks.delta > 0.5);

        let short = OptionLeg::new(100.0, OptionKind::Call, Side::Short, 1, 4.0, 0.2).unwrap();
        let s = stress_test(&[short], 100.0, 0.2, 0.25, &up, &cfg()).unwrap();
        assert_abs_diff_eq!(s.pnl_change, -long.pnl_change, epsilon = 1e-9);
    }

    #[test]
    fn test_time_decay_negative_for_long_premium() {
        let sc = StressScenario { days_forward: 7, ..Default::default() };
        let r = stress_test(&[long_call(4.0)], 100.0, 0.2, 0.25, &sc, &cfg()).unwrap();
        assert!(r.time_decay < 0.0, "time_decay={}", r.time_decay);
        assert!(r.pnl_change < 0.0);
        assert_eq!(r.scenario_description, "Spot +0.0%, IV +0.0%, 7d forward");
    }

    #[test]
    fn test_vol_crush_floors_sigma() {
        let sc = StressScenario { iv_move_pct: -50.0, ..Default::default() };
        let r = stress_test(&[long_call(4.0)], 100.0, 0.2, 0.25, &sc, &cfg()).unwrap();
        assert_abs_diff_eq!(r.new_iv, 1.0, epsilon = 1e-9);
        assert_eq!(sc.describe(), "Spot +0.0%, IV -50.0%, 0d forward");
    }

    #[test]
    fn test_out_of_range_scenario_rejected() {
        let sc = StressScenario { spot_move_pct: 25.0, ..Default::default() };
        assert!(stress_test(&[long_call(4.0)], 100.0, 0.2, 0.25, &sc, &cfg()).is_err());
        assert!(stress_test(&[], 100.0, 0.2, 0.25, &StressScenario::default(), &cfg()).is_err());
    }

    #[test]
    fn test_iv_shock_sign_follows_vega() {
        let legs = [long_call(0.0)];
        let up = iv_shock_pnl(&legs, 100.0, 0.25, 0.05, 5.0, 15.0).unwrap();
        let down = iv_shock_pnl(&legs, 100.0, 0.25, 0.05, -5.0, 15.0).unwrap();
        assert!(up > 0.0 && down < 0.0);
        let straddle = [
            OptionLeg::new(100.0, OptionKind::Call, Side::Short, 1, 0.0, 0.2).unwrap(),
            OptionLeg::new(100.0, OptionKind::Put, Side::Short, 1, 0.0, 0.2).unwrap(),
        ];
        assert!(iv_shock_pnl(&straddle, 100.0, 0.25, 0.05, 5.0, 15.0).unwrap() < 0.0);
    }
}
