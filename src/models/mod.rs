pub mod black_scholes;
pub mod implied_vol;

use crate::errors::{ensure_positive, EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    /// Exercise value at price `spot`.
    #[inline]
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        match self {
            Self::Call => (spot - strike).max(0.0),
            Self::Put => (strike - spot).max(0.0),
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// One option position inside a strategy. Immutable once built; the only
/// constructor validates every field.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OptionLeg {
    pub strike: f64,
    pub kind: OptionKind,
    pub side: Side,
    pub quantity: u32,
    /// Premium per unit (ask for longs, bid for shorts)
    pub premium: f64,
    /// Annualized volatility, decimal
    pub volatility: f64,
}

impl OptionLeg {
    pub fn new(
        strike: f64,
        kind: OptionKind,
        side: Side,
        quantity: u32,
        premium: f64,
        volatility: f64,
    ) -> EngineResult<Self> {
        ensure_positive("strike", strike)?;
        ensure_positive("volatility", volatility)?;
        if quantity == 0 {
            return Err(EngineError::InvalidInput("quantity must be >= 1".into()));
        }
        if !premium.is_finite() || premium < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "premium must be non-negative, got {premium}"
            )));
        }
        Ok(Self { strike, kind, side, quantity, premium, volatility })
    }

    /// Signed quantity: +qty long, -qty short.
    #[inline]
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity as f64
    }
}

/// Black-Scholes inputs for a single evaluation. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct PricingInputs {
    pub spot: f64,
    pub strike: f64,
    pub ttl_years: f64,
    pub rate: f64,
    pub sigma: f64,
}

/// Quantities shared by the price and every Greek.
#[derive(Debug, Clone, Copy)]
pub struct D1D2 {
    pub d1: f64,
    pub d2: f64,
    pub sqrt_t: f64,
    pub sigma_sqrt_t: f64,
    pub discount: f64,
}

impl PricingInputs {
    #[inline]
    pub fn new(spot: f64, strike: f64, ttl_years: f64, rate: f64, sigma: f64) -> Self {
        Self { spot, strike, ttl_years, rate, sigma }
    }

    #[inline]
    pub fn with_sigma(self, sigma: f64) -> Self {
        Self { sigma, ..self }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.ttl_years <= 0.0
    }

    /// d1 = [ln(S/K) + (r + sigma^2/2) T] / (sigma sqrt(T)), d2 = d1 - sigma sqrt(T).
    /// Only defined for T > 0 and sigma > 0.
    pub fn d1_d2(&self) -> EngineResult<D1D2> {
        ensure_positive("spot", self.spot)?;
        ensure_positive("strike", self.strike)?;
        if !(self.ttl_years > 0.0 && self.sigma > 0.0) || !self.sigma.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "T={} and sigma={} must both be positive",
                self.ttl_years, self.sigma
            )));
        }
        let sqrt_t = self.ttl_years.sqrt();
        let sigma_sqrt_t = self.sigma * sqrt_t;
        let d1 = ((self.spot / self.strike).ln()
            + (self.rate + 0.5 * self.sigma * self.sigma) * self.ttl_years)
            / sigma_sqrt_t;
        Ok(D1D2 {
            d1,
            d2: d1 - sigma_sqrt_t,
            sqrt_t,
            sigma_sqrt_t,
            discount: (-self.rate * self.ttl_years).exp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leg_validation() {
        assert!(OptionLeg::new(100.0, OptionKind::Call, Side::Long, 1, 2.5, 0.2).is_ok());
        assert!(OptionLeg::new(0.0, OptionKind::Call, Side::Long, 1, 2.5, 0.2).is_err());
        assert!(OptionLeg::new(100.0, OptionKind::Put, Side::Short, 0, 2.5, 0.2).is_err());
        assert!(OptionLeg::new(100.0, OptionKind::Put, Side::Short, 1, -1.0, 0.2).is_err());
        assert!(OptionLeg::new(100.0, OptionKind::Put, Side::Short, 1, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_d1_d2_rejects_zero_vol() {
        let inputs = PricingInputs::new(100.0, 100.0, 0.5, 0.05, 0.0);
        assert!(inputs.d1_d2().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&OptionKind::Put).unwrap();
        assert_eq!(json, "\"put\"");
        let side: Side = serde_json::from_str("\"short\"").unwrap();
        assert_eq!(side, Side::Short);
    }
}
