use crate::errors::EngineResult;
use crate::models::{OptionKind, PricingInputs};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Calendar days per year for theta/charm scaling.
const DAYS_PER_YEAR: f64 = 365.0;

/// Vol shock applied by the Greeks report (5 vol points).
const REPORT_IV_SHOCK: f64 = 0.05;

/// Floor for the downward IV shock.
const REPORT_MIN_SIGMA: f64 = 0.01;

#[inline]
fn std_normal() -> Normal {
    Normal::standard()
}

/// Black-Scholes European option price.
///
/// Call: S N(d1) - K e^{-rT} N(d2)
/// Put:  K e^{-rT} N(-d2) - S N(-d1)
///
/// At or past expiry (T <= 0) the price is the intrinsic value and sigma is
/// never read. For T > 0 a non-positive sigma is rejected.
pub fn price(inputs: &PricingInputs, kind: OptionKind) -> EngineResult<f64> {
    if inputs.is_expired() {
        return Ok(kind.intrinsic(inputs.spot, inputs.strike));
    }

    let d = inputs.d1_d2()?;
    let n = std_normal();
    let s = inputs.spot;
    let k_disc = inputs.strike * d.discount;

    let value = match kind {
        OptionKind::Call => s * n.cdf(d.d1) - k_disc * n.cdf(d.d2),
        OptionKind::Put => k_disc * n.cdf(-d.d2) - s * n.cdf(-d.d1),
    };
    Ok(value)
}

/// First, second and third order sensitivities.
///
/// Units follow desk conventions: vega per 1 vol point, theta and charm per
/// calendar day, rho per 1% rate move.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
    pub vanna: f64,
    pub charm: f64,
    pub speed: f64,
    pub zomma: f64,
}

pub fn greeks(inputs: &PricingInputs, kind: OptionKind) -> EngineResult<Greeks> {
    if inputs.is_expired() {
        let itm_call = kind == OptionKind::Call && inputs.spot > inputs.strike;
        return Ok(Greeks {
            delta: if itm_call { 1.0 } else { 0.0 },
            ..Greeks::default()
        });
    }

    let d = inputs.d1_d2()?;
    let n = std_normal();
    let (s, k, t, r, sigma) = (
        inputs.spot,
        inputs.strike,
        inputs.ttl_years,
        inputs.rate,
        inputs.sigma,
    );
    let phi_d1 = n.pdf(d.d1);
    let decay = -(s * phi_d1 * sigma) / (2.0 * d.sqrt_t);

    let (delta, theta, rho) = match kind {
        OptionKind::Call => {
            let nd2 = n.cdf(d.d2);
            (
                n.cdf(d.d1),
                (decay - r * k * d.discount * nd2) / DAYS_PER_YEAR,
                k * t * d.discount * nd2 / 100.0,
            )
        }
        OptionKind::Put => {
            let nnd2 = n.cdf(-d.d2);
            (
                n.cdf(d.d1) - 1.0,
                (decay + r * k * d.discount * nnd2) / DAYS_PER_YEAR,
                -k * t * d.discount * nnd2 / 100.0,
            )
        }
    };

    let gamma = phi_d1 / (s * d.sigma_sqrt_t);
    let vega = s * phi_d1 * d.sqrt_t / 100.0;
    let vanna = -phi_d1 * d.d2 / sigma;
    let charm = -phi_d1 * (2.0 * r * t - d.d2 * d.sigma_sqrt_t)
        / (2.0 * t * d.sigma_sqrt_t)
        / DAYS_PER_YEAR;
    let speed = -gamma / s * (d.d1 / d.sigma_sqrt_t + 1.0);
    let zomma = gamma * (d.d1 * d.d2 - 1.0) / sigma;

    Ok(Greeks { delta, gamma, vega, theta, rho, vanna, charm, speed, zomma })
}

/// Price and headline Greeks after an IV shock.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ShockedQuote {
    /// Shocked IV in percent
    pub iv: f64,
    pub price: f64,
    pub delta: f64,
    pub vega: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GreeksReport {
    pub price: f64,
    pub greeks: Greeks,
    pub iv_plus_5pct: ShockedQuote,
    pub iv_minus_5pct: ShockedQuote,
}

/// Full single-option report: price, Greeks, and the same at +/-5 vol points.
pub fn greeks_report(inputs: &PricingInputs, kind: OptionKind) -> EngineResult<GreeksReport> {
    let shocked = |sigma: f64| -> EngineResult<ShockedQuote> {
        let bumped = inputs.with_sigma(sigma);
        let g = greeks(&bumped, kind)?;
        Ok(ShockedQuote {
            iv: sigma * 100.0,
            price: price(&bumped, kind)?,
            delta: g.delta,
            vega: g.vega,
        })
    };

    Ok(GreeksReport {
        price: price(inputs, kind)?,
        greeks: greeks(inputs, kind)?,
        iv_plus_5pct: shocked(inputs.sigma + REPORT_IV_SHOCK)?,
        iv_minus_5pct: shocked((inputs.sigma - REPORT_IV_SHOCK).max(REPORT_MIN_SIGMA))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn inputs(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> PricingInputs {
        PricingInputs::new(s, k, t, r, sigma)
    }

    #[test]
    fn test_put_call_parity() {
        let cases = [
            (100.0, 100.0, 0.25, 0.06, 0.20),
            (51_204.0, 51_000.0, 29.0 / 365.0, 0.065, 0.1432),
            (80.0, 120.0, 2.0, 0.01, 0.65),
            (150.0, 90.0, 0.05, 0.0, 1.5),
        ];
        for (s, k, t, r, sigma) in cases {
            let p = inputs(s, k, t, r, sigma);
            let call = price(&p, OptionKind::Call).unwrap();
            let put = price(&p, OptionKind::Put).unwrap();
            let parity = s - k * (-r * t).exp();
            assert!(
                ((call - put) - parity).abs() < 1e-2,
                "parity violated for S={s} K={k}: {} vs {parity}",
                call - put
            );
        }
    }

    #[test]
    fn test_atm_call_near_brenner_approximation() {
        let (s, t, sigma) = (51_200.0, 1.0 / 365.0, 0.143);
        let call = price(&inputs(s, s, t, 0.065, sigma), OptionKind::Call).unwrap();
        let approx = 0.4 * sigma * s * t.sqrt();
        assert!(call > 0.5 * approx && call < 2.0 * approx, "ATM call {call} vs {approx}");
    }

    #[test]
    fn test_expiry_is_intrinsic() {
        let itm = inputs(110.0, 100.0, 0.0, 0.06, 0.2);
        assert_eq!(price(&itm, OptionKind::Call).unwrap(), 10.0);
        let put = inputs(90.0, 100.0, 0.0, 0.06, 0.2);
        assert_eq!(price(&put, OptionKind::Put).unwrap(), 10.0);
        assert_eq!(price(&put, OptionKind::Call).unwrap(), 0.0);
        // sigma is irrelevant at expiry
        let no_vol = inputs(110.0, 100.0, 0.0, 0.06, 0.0);
        assert_eq!(price(&no_vol, OptionKind::Call).unwrap(), 10.0);
    }

    #[test]
    fn test_zero_vol_before_expiry_fails() {
        let p = inputs(100.0, 100.0, 0.5, 0.05, 0.0);
        assert!(price(&p, OptionKind::Call).is_err());
        assert!(greeks(&p, OptionKind::Put).is_err());
    }

    #[test]
    fn test_non_positive_spot_fails() {
        let p = inputs(-1.0, 100.0, 0.5, 0.05, 0.2);
        assert!(price(&p, OptionKind::Call).is_err());
    }

    #[test]
    fn test_deep_itm_and_otm_delta() {
        let itm = greeks(&inputs(200.0, 100.0, 1.0, 0.06, 0.2), OptionKind::Call).unwrap();
        assert!(itm.delta > 0.99, "deep ITM delta={}", itm.delta);
        let otm = greeks(&inputs(100.0, 200.0, 1.0, 0.06, 0.2), OptionKind::Call).unwrap();
        assert!(otm.delta < 0.01, "deep OTM delta={}", otm.delta);
    }

    #[test]
    fn test_gamma_vega_positive_theta_negative() {
        for kind in [OptionKind::Call, OptionKind::Put] {
            // deep ITM European puts can carry positive theta, so stay ATM/OTM-put side
            for (s, k) in [(100.0, 100.0), (110.0, 100.0)] {
                let g = greeks(&inputs(s, k, 0.25, 0.06, 0.2), kind).unwrap();
                assert!(g.gamma > 0.0, "{kind} gamma={}", g.gamma);
                assert!(g.vega > 0.0, "{kind} vega={}", g.vega);
                assert!(g.theta < 0.0, "{kind} S={s} theta={}", g.theta);
            }
        }
    }

    #[test]
    fn test_put_delta_is_call_delta_minus_one() {
        let p = inputs(100.0, 105.0, 0.5, 0.03, 0.25);
        let c = greeks(&p, OptionKind::Call).unwrap();
        let q = greeks(&p, OptionKind::Put).unwrap();
        assert_abs_diff_eq!(c.delta - 1.0, q.delta, epsilon = 1e-12);
        assert_abs_diff_eq!(c.gamma, q.gamma, epsilon = 1e-12);
        assert_abs_diff_eq!(c.vega, q.vega, epsilon = 1e-12);
    }

    #[test]
    fn test_vega_matches_finite_difference() {
        let p = inputs(100.0, 100.0, 0.5, 0.05, 0.2);
        let g = greeks(&p, OptionKind::Call).unwrap();
        let up = price(&p.with_sigma(0.2 + 1e-4), OptionKind::Call).unwrap();
        let dn = price(&p.with_sigma(0.2 - 1e-4), OptionKind::Call).unwrap();
        let fd_per_point = (up - dn) / 2e-4 / 100.0;
        assert_abs_diff_eq!(g.vega, fd_per_point, epsilon = 1e-6);
    }

    #[test]
    fn test_expired_greeks_degenerate() {
        let g = greeks(&inputs(110.0, 100.0, 0.0, 0.05, 0.2), OptionKind::Call).unwrap();
        assert_eq!(g.delta, 1.0);
        assert_eq!(g.gamma, 0.0);
        assert_eq!(g.vega, 0.0);
        let otm = greeks(&inputs(90.0, 100.0, 0.0, 0.05, 0.2), OptionKind::Call).unwrap();
        assert_eq!(otm.delta, 0.0);
    }

    #[test]
    fn test_report_shocks() {
        let p = inputs(51_204.0, 51_200.0, 7.0 / 365.0, 0.065, 0.03);
        let report = greeks_report(&p, OptionKind::Call).unwrap();
        assert!(report.iv_plus_5pct.price > report.price);
        // downward shock floors at 1%
        assert_abs_diff_eq!(report.iv_minus_5pct.iv, 1.0, epsilon = 1e-9);
        assert!(report.iv_minus_5pct.price < report.price);
    }
}
