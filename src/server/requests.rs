//! Request bodies for the JSON API. Percent IVs and day counts are converted
//! to decimals and years here, before anything reaches the core.
use crate::config::{EngineConfig, MAX_SIMULATIONS, MIN_SIMULATIONS};
use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::models::{OptionKind, OptionLeg, PricingInputs, Side};
use crate::optimizer::chain::MarketSnapshot;
use crate::optimizer::OptimizationRequest;
use crate::risk::stress::StressScenario;
use crate::simulation::SimulationParams;

const DAYS_PER_YEAR: f64 = 365.0;
const MAX_IV_PCT: f64 = 500.0;
const MAX_STEPS: usize = 252;

fn one() -> u32 {
    1
}

fn one_step() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

#[inline]
fn years(days: u32) -> f64 {
    days as f64 / DAYS_PER_YEAR
}

fn iv_decimal(iv_pct: f64) -> EngineResult<f64> {
    if !(iv_pct.is_finite() && iv_pct > 0.0 && iv_pct <= MAX_IV_PCT) {
        return Err(EngineError::InvalidInput(format!("iv must be within (0, 500] percent, got {iv_pct}")));
    }
    Ok(iv_pct / 100.0)
}

/// One leg as posted by a client. Volatility is decimal and falls back to the
/// request-level IV when omitted.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LegInput {
    #[serde(alias = "K")]
    pub strike: f64,
    #[serde(alias = "option_type")]
    pub kind: OptionKind,
    #[serde(alias = "position")]
    pub side: Side,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub premium: f64,
    #[serde(default, alias = "sigma")]
    pub volatility: Option<f64>,
}

impl LegInput {
    pub fn into_leg(&self, default_sigma: f64) -> EngineResult<OptionLeg> {
        OptionLeg::new(
            self.strike,
            self.kind,
            self.side,
            self.quantity,
            self.premium,
            self.volatility.unwrap_or(default_sigma),
        )
    }
}

fn build_legs(inputs: &[LegInput], default_sigma: f64, max_legs: usize) -> EngineResult<Vec<OptionLeg>> {
    if inputs.is_empty() || inputs.len() > max_legs {
        return Err(EngineError::InvalidInput(format!(
            "expected 1..={max_legs} legs, got {}",
            inputs.len()
        )));
    }
    inputs.iter().map(|l| l.into_leg(default_sigma)).collect()
}

/// POST /api/v1/optimize: request fields plus the option chain to optimize over.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OptimizeBody {
    #[serde(flatten)]
    pub request: OptimizationRequest,
    pub snapshot: MarketSnapshot,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GreeksRequest {
    pub spot: f64,
    pub strike: f64,
    pub expiry_days: u32,
    /// IV in percent
    pub iv: f64,
    pub option_type: OptionKind,
    #[serde(default)]
    pub risk_free_rate: Option<f64>,
}

impl GreeksRequest {
    pub fn pricing_inputs(&self, config: &EngineConfig) -> EngineResult<PricingInputs> {
        ensure_positive("spot", self.spot)?;
        ensure_positive("strike", self.strike)?;
        let sigma = iv_decimal(self.iv)?;
        let rate = self.risk_free_rate.unwrap_or(config.risk_free_rate);
        Ok(PricingInputs::new(self.spot, self.strike, years(self.expiry_days), rate, sigma))
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ImpliedVolRequest {
    pub market_price: f64,
    pub spot: f64,
    pub strike: f64,
    pub expiry_days: u32,
    pub option_type: OptionKind,
    #[serde(default)]
    pub risk_free_rate: Option<f64>,
}

impl ImpliedVolRequest {
    /// (ttl_years, rate); the solver validates the prices itself.
    pub fn horizon(&self, config: &EngineConfig) -> EngineResult<(f64, f64)> {
        if self.expiry_days == 0 {
            return Err(EngineError::InvalidInput("expiry_days must be >= 1 for an IV solve".into()));
        }
        Ok((years(self.expiry_days), self.risk_free_rate.unwrap_or(config.risk_free_rate)))
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonteCarloRequest {
    pub legs: Vec<LegInput>,
    pub spot: f64,
    /// IV in percent
    pub iv: f64,
    pub expiry_days: u32,
    #[serde(default)]
    pub n_simulations: Option<usize>,
    #[serde(default = "one_step")]
    pub n_steps: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl MonteCarloRequest {
    pub fn into_parts(&self, config: &EngineConfig) -> EngineResult<(Vec<OptionLeg>, SimulationParams)> {
        ensure_positive("spot", self.spot)?;
        let sigma = iv_decimal(self.iv)?;
        let n_simulations = self.n_simulations.unwrap_or(config.mc_simulations);
        if !(MIN_SIMULATIONS..=MAX_SIMULATIONS).contains(&n_simulations) {
            return Err(EngineError::InvalidInput(format!(
                "n_simulations must be within [{MIN_SIMULATIONS}, {MAX_SIMULATIONS}], got {n_simulations}"
            )));
        }
        if !(1..=MAX_STEPS).contains(&self.n_steps) {
            return Err(EngineError::InvalidInput(format!(
                "n_steps must be within [1, {MAX_STEPS}], got {}",
                self.n_steps
            )));
        }
        let legs = build_legs(&self.legs, sigma, config.max_legs)?;
        // same-day expiry still simulates one day of movement
        let ttl_years = years(self.expiry_days).max(1.0 / DAYS_PER_YEAR);
        Ok((
            legs,
            SimulationParams {
                spot: self.spot,
                sigma,
                ttl_years,
                n_simulations,
                n_steps: self.n_steps,
                seed: self.seed,
            },
        ))
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct StressRequest {
    pub legs: Vec<LegInput>,
    pub spot: f64,
    /// IV in percent
    pub iv: f64,
    pub expiry_days: u32,
    #[serde(default)]
    pub spot_move_pct: f64,
    #[serde(default)]
    pub iv_move_pct: f64,
    #[serde(default)]
    pub days_forward: u32,
}

pub struct StressInputs {
    pub legs: Vec<OptionLeg>,
    pub spot: f64,
    pub sigma: f64,
    pub ttl_years: f64,
    pub scenario: StressScenario,
}

impl StressRequest {
    pub fn into_parts(&self, config: &EngineConfig) -> EngineResult<StressInputs> {
        let sigma = iv_decimal(self.iv)?;
        let scenario = StressScenario {
            spot_move_pct: self.spot_move_pct,
            iv_move_pct: self.iv_move_pct,
            days_forward: self.days_forward,
        };
        scenario.validate()?;
        Ok(StressInputs {
            legs: build_legs(&self.legs, sigma, config.max_legs)?,
            spot: self.spot,
            sigma,
            ttl_years: years(self.expiry_days),
            scenario,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leg_aliases_and_defaults() {
        let leg: LegInput =
            serde_json::from_str(r#"{"K": 51000, "option_type": "call", "position": "long"}"#).unwrap();
        assert_eq!(leg.quantity, 1);
        assert_eq!(leg.premium, 0.0);
        let built = leg.into_leg(0.15).unwrap();
        assert_eq!(built.volatility, 0.15);
        assert_eq!(built.side, Side::Long);
    }

    #[test]
    fn test_greeks_request_conversion() {
        let req: GreeksRequest = serde_json::from_str(
            r#"{"spot": 51204, "strike": 51200, "expiry_days": 7, "iv": 14.5, "option_type": "put"}"#,
        )
        .unwrap();
        let inputs = req.pricing_inputs(&EngineConfig::default()).unwrap();
        assert!((inputs.sigma - 0.145).abs() < 1e-12);
        assert!((inputs.ttl_years - 7.0 / 365.0).abs() < 1e-12);
        assert_eq!(inputs.rate, 0.065);

        let bad = GreeksRequest { iv: 600.0, ..req };
        assert!(bad.pricing_inputs(&EngineConfig::default()).is_err());
    }

    #[test]
    fn test_monte_carlo_bounds_and_floor() {
        let mut req: MonteCarloRequest = serde_json::from_str(
            r#"{"legs": [{"strike": 100, "kind": "call", "side": "long", "premium": 2}],
                "spot": 100, "iv": 20, "expiry_days": 0}"#,
        )
        .unwrap();
        let cfg = EngineConfig::default();
        let (legs, params) = req.into_parts(&cfg).unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(params.n_simulations, cfg.mc_simulations);
        assert_eq!(params.seed, 42);
        assert!((params.ttl_years - 1.0 / 365.0).abs() < 1e-12);

        req.n_simulations = Some(500);
        assert!(req.into_parts(&cfg).is_err());
        req.n_simulations = Some(1_000);
        req.n_steps = 253;
        assert!(req.into_parts(&cfg).is_err());
    }

    #[test]
    fn test_stress_scenario_bounds() {
        let req: StressRequest = serde_json::from_str(
            r#"{"legs": [{"strike": 100, "kind": "put", "side": "short", "premium": 3}],
                "spot": 100, "iv": 20, "expiry_days": 10, "days_forward": 31}"#,
        )
        .unwrap();
        assert!(req.into_parts(&EngineConfig::default()).is_err());
    }

    #[test]
    fn test_legs_are_validated_on_the_way_in() {
        let leg: LegInput =
            serde_json::from_str(r#"{"strike": 100, "kind": "call", "side": "long", "sigma": 0}"#).unwrap();
        assert!(matches!(leg.into_leg(0.2), Err(EngineError::InvalidInput(_))));
        let leg: LegInput = serde_json::from_str(r#"{"strike": -5, "kind": "put", "side": "short"}"#).unwrap();
        assert!(leg.into_leg(0.2).is_err());
    }

    #[test]
    fn test_too_many_legs_rejected() {
        let leg = LegInput {
            strike: 100.0,
            kind: OptionKind::Call,
            side: Side::Long,
            quantity: 1,
            premium: 1.0,
            volatility: None,
        };
        let legs = vec![leg; 5];
        assert!(build_legs(&legs, 0.2, 4).is_err());
        assert!(build_legs(&[], 0.2, 4).is_err());
    }
}
