pub mod chain;
pub mod ranking;
pub mod templates;

use crate::errors::{EngineError, EngineResult};
use crate::models::OptionLeg;
use smallvec::SmallVec;

pub use crate::risk::limits::RiskProfile;

/// Inline capacity for strategy legs; the catalogue never exceeds four
pub type Legs = SmallVec<[OptionLeg; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketView {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for MarketView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityOutlook {
    Rising,
    Falling,
    Stable,
}

impl VolatilityOutlook {
    /// Scale the ATM IV by the caller's vol view.
    #[inline]
    pub fn adjust(self, iv: f64) -> f64 {
        match self {
            Self::Rising => iv * 1.05,
            Self::Falling => iv * 0.95,
            Self::Stable => iv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeHorizon {
    Weekly,
    Monthly,
}

impl TimeHorizon {
    #[inline]
    pub fn ttl_years(self) -> f64 {
        match self {
            Self::Weekly => 1.0 / 365.0,
            Self::Monthly => 29.0 / 365.0,
        }
    }
}

fn default_symbol() -> String {
    "BANKNIFTY".to_string()
}

fn default_top_n() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptimizationRequest {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    pub capital: f64,
    pub market_view: MarketView,
    pub volatility_outlook: VolatilityOutlook,
    pub risk_appetite: RiskProfile,
    pub time_horizon: TimeHorizon,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl OptimizationRequest {
    pub fn validate(&self) -> EngineResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(EngineError::InvalidInput("symbol must not be empty".into()));
        }
        if !(self.capital.is_finite() && self.capital > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "capital must be positive, got {}",
                self.capital
            )));
        }
        if !(1..=10).contains(&self.top_n) {
            return Err(EngineError::InvalidInput(format!(
                "top_n must be within [1, 10], got {}",
                self.top_n
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCategory {
    BullCallSpread,
    BearPutSpread,
    ShortPut,
    ShortCallSpread,
    LongCall,
    LongPut,
    IronCondor,
    ShortStraddle,
    Butterfly,
}

/// A candidate strategy: named, categorized, 1..=max_legs ordered legs.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Strategy {
    pub name: String,
    pub category: StrategyCategory,
    pub legs: Legs,
}

impl Strategy {
    pub fn new(
        name: impl Into<String>,
        category: StrategyCategory,
        legs: Legs,
        max_legs: usize,
    ) -> EngineResult<Self> {
        let name = name.into();
        if legs.is_empty() || legs.len() > max_legs {
            return Err(EngineError::InvalidInput(format!(
                "{name}: {} legs, expected 1..={max_legs}",
                legs.len()
            )));
        }
        Ok(Self { name, category, legs })
    }
}
