use crate::errors::{ensure_positive, EngineError, EngineResult};
use crate::models::black_scholes;
use crate::models::{OptionKind, PricingInputs};
use statrs::distribution::{Continuous, Normal};

/// Newton-Raphson iteration budget
const MAX_ITERATIONS: usize = 200;
/// Absolute price error accepted as converged
const PRICE_TOLERANCE: f64 = 1e-6;
/// Below this vega the solver bisects instead of taking a Newton step
const MIN_VEGA: f64 = 1e-10;
/// Initial bracket
const SIGMA_FLOOR: f64 = 0.001;
const SIGMA_CAP: f64 = 5.0;

/// Solver outcome. Non-convergence is explicit and still carries the last
/// iterate for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IvOutcome {
    Converged { sigma: f64, iterations: usize },
    NotConverged { last_sigma: f64, iterations: usize },
}

impl IvOutcome {
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    /// Best-effort sigma regardless of convergence.
    #[inline]
    pub fn sigma(&self) -> f64 {
        match *self {
            Self::Converged { sigma, .. } => sigma,
            Self::NotConverged { last_sigma, .. } => last_sigma,
        }
    }

    pub fn into_result(self) -> EngineResult<f64> {
        match self {
            Self::Converged { sigma, .. } => Ok(sigma),
            Self::NotConverged { last_sigma, iterations } => {
                Err(EngineError::NumericNonConvergence { iterations, last_sigma })
            }
        }
    }
}

/// Implied volatility by bracketed Newton-Raphson.
///
/// Starts from the Brenner-Subrahmanyam guess sigma0 = sqrt(2 pi / T) * price / S.
/// Price is increasing in sigma, so every iterate narrows a [lo, hi] bracket
/// that starts at [0.001, 5.0]. A Newton step that leaves the bracket, or a
/// vanishing vega, falls back to bisection.
pub fn implied_volatility(
    market_price: f64,
    spot: f64,
    strike: f64,
    ttl_years: f64,
    rate: f64,
    kind: OptionKind,
) -> EngineResult<IvOutcome> {
    ensure_positive("market price", market_price)?;
    ensure_positive("time to expiry", ttl_years)?;
    ensure_positive("spot", spot)?;
    ensure_positive("strike", strike)?;

    let normal = Normal::standard();
    let base = PricingInputs::new(spot, strike, ttl_years, rate, SIGMA_FLOOR);
    let (mut lo, mut hi) = (SIGMA_FLOOR, SIGMA_CAP);
    let mut sigma = ((2.0 * std::f64::consts::PI / ttl_years).sqrt() * market_price / spot)
        .clamp(SIGMA_FLOOR, SIGMA_CAP);

    for iteration in 1..=MAX_ITERATIONS {
        let inputs = base.with_sigma(sigma);
        let diff = black_scholes::price(&inputs, kind)? - market_price;
        if diff.abs() < PRICE_TOLERANCE {
            return Ok(IvOutcome::Converged { sigma, iterations: iteration });
        }

        if diff > 0.0 {
            hi = sigma;
        } else {
            lo = sigma;
        }
        if hi - lo <= f64::EPSILON * hi {
            // bracket collapsed onto a bound: the price is outside the reachable range
            tracing::debug!(market_price, strike, sigma, iteration, "iv bracket collapsed");
            return Ok(IvOutcome::NotConverged { last_sigma: sigma, iterations: iteration });
        }

        let d = inputs.d1_d2()?;
        let vega = spot * normal.pdf(d.d1) * d.sqrt_t;
        sigma = match sigma - diff / vega {
            next if vega.abs() >= MIN_VEGA && next > lo && next < hi => next,
            _ => 0.5 * (lo + hi),
        };
    }

    tracing::warn!(market_price, strike, sigma, "iv solver exhausted iteration budget");
    Ok(IvOutcome::NotConverged { last_sigma: sigma, iterations: MAX_ITERATIONS })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_round_trip_across_vol_range() {
        let (s, k, t, r) = (100.0, 100.0, 0.5, 0.0);
        for sigma in [0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 1.5, 2.0] {
            for kind in [OptionKind::Call, OptionKind::Put] {
                let p = black_scholes::price(&PricingInputs::new(s, k, t, r, sigma), kind).unwrap();
                let out = implied_volatility(p, s, k, t, r, kind).unwrap();
                assert!(out.is_converged(), "sigma={sigma} {kind}: {out:?}");
                assert_abs_diff_eq!(out.sigma(), sigma, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_round_trip_away_from_the_money() {
        let cases = [
            (100.0, 110.0, 0.5, 0.0),
            (51_204.0, 52_000.0, 7.0 / 365.0, 0.065),
            (100.0, 130.0, 1.0, 0.05),
            (100.0, 80.0, 0.25, 0.05),
            (51_204.0, 50_400.0, 29.0 / 365.0, 0.065),
        ];
        let normal = Normal::standard();
        let mut checked = 0;
        for (s, k, t, r) in cases {
            for sigma in [0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 1.5, 2.0] {
                for kind in [OptionKind::Call, OptionKind::Put] {
                    let inputs = PricingInputs::new(s, k, t, r, sigma);
                    let d = inputs.d1_d2().unwrap();
                    // price barely moves with sigma here, so sigma is not identifiable
                    if s * normal.pdf(d.d1) * d.sqrt_t < 1e-2 {
                        continue;
                    }
                    let p = black_scholes::price(&inputs, kind).unwrap();
                    let out = implied_volatility(p, s, k, t, r, kind).unwrap();
                    assert!(out.is_converged(), "S={s} K={k} T={t} sigma={sigma} {kind}: {out:?}");
                    assert_abs_diff_eq!(out.sigma(), sigma, epsilon = 1e-3);
                    checked += 1;
                }
            }
        }
        assert!(checked >= 50, "only {checked} identifiable cases");
    }

    #[test]
    fn test_otm_quotes_that_overshoot_the_cap() {
        let p = black_scholes::price(&PricingInputs::new(100.0, 110.0, 0.5, 0.0, 0.1), OptionKind::Call).unwrap();
        let iv = implied_volatility(p, 100.0, 110.0, 0.5, 0.0, OptionKind::Call)
            .unwrap()
            .into_result()
            .unwrap();
        assert_abs_diff_eq!(iv, 0.1, epsilon = 1e-3);

        let t = 7.0 / 365.0;
        let p = black_scholes::price(&PricingInputs::new(51_204.0, 52_000.0, t, 0.065, 0.1), OptionKind::Call)
            .unwrap();
        let iv = implied_volatility(p, 51_204.0, 52_000.0, t, 0.065, OptionKind::Call)
            .unwrap()
            .into_result()
            .unwrap();
        assert_abs_diff_eq!(iv, 0.1, epsilon = 1e-3);
    }

    #[test]
    fn test_bank_nifty_atm_recovery() {
        let (s, k, t, r) = (51_200.0, 51_200.0, 1.0 / 365.0, 0.065);
        let true_iv = 0.1432;
        let p = black_scholes::price(&PricingInputs::new(s, k, t, r, true_iv), OptionKind::Call)
            .unwrap();
        let iv = implied_volatility(p, s, k, t, r, OptionKind::Call)
            .unwrap()
            .into_result()
            .unwrap();
        assert_abs_diff_eq!(iv, true_iv, epsilon = 1e-3);
    }

    #[test]
    fn test_unreachable_price_does_not_converge() {
        // a call can never be worth more than the spot
        let out = implied_volatility(150.0, 100.0, 100.0, 0.5, 0.0, OptionKind::Call).unwrap();
        assert!(!out.is_converged());
        assert!(out.sigma() > 0.0);
        assert!(matches!(
            out.into_result(),
            Err(EngineError::NumericNonConvergence { .. })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(implied_volatility(0.0, 100.0, 100.0, 0.5, 0.0, OptionKind::Call).is_err());
        assert!(implied_volatility(5.0, 100.0, 100.0, 0.0, 0.0, OptionKind::Call).is_err());
    }
}
