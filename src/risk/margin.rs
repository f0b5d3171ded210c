use crate::errors::{EngineError, EngineResult};
use crate::execution::payoff::{linspace, strategy_payoff};
use crate::models::OptionLeg;

const SCAN_LOW: f64 = 0.8;
const SCAN_HIGH: f64 = 1.2;
const SCAN_POINTS: usize = 100;
const SPAN_SHARE: f64 = 0.70;
const EXPOSURE_SHARE: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct MarginEstimate {
    pub span: f64,
    pub exposure: f64,
    pub total: f64,
}

/// Source of margin requirements. Broker APIs plug in here; the optimizer only
/// sees this trait.
pub trait MarginEstimator: Send + Sync {
    fn estimate(&self, legs: &[OptionLeg], lot_size: f64) -> EngineResult<MarginEstimate>;
}

/// Rough SPAN approximation from the strategy's worst loss near the first
/// strike: 70% span, 30% exposure, each rounded to whole currency units.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMargin;

impl MarginEstimator for HeuristicMargin {
    fn estimate(&self, legs: &[OptionLeg], lot_size: f64) -> EngineResult<MarginEstimate> {
        let anchor = legs
            .first()
            .ok_or_else(|| EngineError::InvalidInput("margin estimate needs at least one leg".into()))?
            .strike;

        let worst = linspace(SCAN_LOW * anchor, SCAN_HIGH * anchor, SCAN_POINTS)
            .into_iter()
            .map(|st| strategy_payoff(legs, st, true, lot_size))
            .fold(f64::INFINITY, f64::min);
        let max_loss = (-worst).max(0.0);

        let span = (max_loss * SPAN_SHARE).round();
        let exposure = (max_loss * EXPOSURE_SHARE).round();
        Ok(MarginEstimate { span, exposure, total: span + exposure })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionKind, Side};

    #[test]
    fn test_debit_spread_margin_is_max_loss() {
        let legs = [
            OptionLeg::new(51_000.0, OptionKind::Call, Side::Long, 1, 254.0, 0.14).unwrap(),
            OptionLeg::new(51_200.0, OptionKind::Call, Side::Short, 1, 124.0, 0.14).unwrap(),
        ];
        let m = HeuristicMargin.estimate(&legs, 15.0).unwrap();
        // max loss 130 * 15 = 1950
        assert_eq!(m.span, 1_365.0);
        assert_eq!(m.exposure, 585.0);
        assert_eq!(m.total, 1_950.0);
    }

    #[test]
    fn test_naked_short_scales_with_range() {
        let legs = [OptionLeg::new(100.0, OptionKind::Call, Side::Short, 1, 2.0, 0.2).unwrap()];
        let m = HeuristicMargin.estimate(&legs, 1.0).unwrap();
        // worst point is 120: loss 20 - 2 = 18
        assert_eq!(m.total, 18.0);
    }

    #[test]
    fn test_empty_legs_rejected() {
        assert!(HeuristicMargin.estimate(&[], 15.0).is_err());
    }
}
