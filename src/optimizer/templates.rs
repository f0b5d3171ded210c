use crate::errors::EngineResult;
use crate::models::{OptionKind, OptionLeg, Side};
use crate::optimizer::chain::ChainRow;
use crate::optimizer::{Legs, MarketView, Strategy, StrategyCategory};
use smallvec::{smallvec, SmallVec};

/// (offset from ATM, kind, side, quantity) per leg
type Layout = SmallVec<[(isize, OptionKind, Side, u32); 4]>;

/// Parametrized strategy builders. Offsets are counted in strikes from ATM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum StrategyTemplate {
    /// Long ATM call, short call `width` strikes up
    BullCallSpread { width: usize },
    /// Long ATM put, short put `width` strikes down
    BearPutSpread { width: usize },
    ShortPut { otm_offset: usize },
    /// Short call one strike up, long call `width` strikes beyond it
    ShortCallSpread { width: usize },
    LongCall { otm_offset: usize },
    LongPut { otm_offset: usize },
    /// Short strangle one strike either side, long wings `wing` strikes out
    IronCondor { wing: usize },
    ShortStraddle,
    /// Long wings `wing` strikes either side of two short ATM calls
    LongButterfly { wing: usize },
}

const BULLISH: &[StrategyTemplate] = &[
    StrategyTemplate::BullCallSpread { width: 1 },
    StrategyTemplate::BullCallSpread { width: 2 },
    StrategyTemplate::BullCallSpread { width: 3 },
    StrategyTemplate::ShortPut { otm_offset: 1 },
    StrategyTemplate::ShortPut { otm_offset: 2 },
    StrategyTemplate::LongCall { otm_offset: 0 },
    StrategyTemplate::LongCall { otm_offset: 1 },
];

const BEARISH: &[StrategyTemplate] = &[
    StrategyTemplate::BearPutSpread { width: 1 },
    StrategyTemplate::BearPutSpread { width: 2 },
    StrategyTemplate::ShortCallSpread { width: 1 },
    StrategyTemplate::ShortCallSpread { width: 2 },
    StrategyTemplate::LongPut { otm_offset: 0 },
    StrategyTemplate::LongPut { otm_offset: 1 },
];

const NEUTRAL: &[StrategyTemplate] = &[
    StrategyTemplate::IronCondor { wing: 2 },
    StrategyTemplate::IronCondor { wing: 3 },
    StrategyTemplate::ShortStraddle,
    StrategyTemplate::LongButterfly { wing: 1 },
    StrategyTemplate::LongButterfly { wing: 2 },
];

/// Templates for a view, in generation order.
pub fn catalogue(view: MarketView) -> &'static [StrategyTemplate] {
    match view {
        MarketView::Bullish => BULLISH,
        MarketView::Bearish => BEARISH,
        MarketView::Neutral => NEUTRAL,
    }
}

#[inline]
fn row_at(chain: &[ChainRow], atm: usize, offset: isize) -> Option<&ChainRow> {
    atm.checked_add_signed(offset).and_then(|i| chain.get(i))
}

/// Long legs pay the ask, short legs receive the bid. Leg vol is the quoted IV.
fn leg(row: &ChainRow, kind: OptionKind, side: Side, quantity: u32) -> EngineResult<OptionLeg> {
    let quote = row.quote(kind);
    let premium = match side {
        Side::Long => quote.ask,
        Side::Short => quote.bid,
    };
    OptionLeg::new(row.strike, kind, side, quantity, premium, quote.iv_pct / 100.0)
}

impl StrategyTemplate {
    pub fn category(self) -> StrategyCategory {
        match self {
            Self::BullCallSpread { .. } => StrategyCategory::BullCallSpread,
            Self::BearPutSpread { .. } => StrategyCategory::BearPutSpread,
            Self::ShortPut { .. } => StrategyCategory::ShortPut,
            Self::ShortCallSpread { .. } => StrategyCategory::ShortCallSpread,
            Self::LongCall { .. } => StrategyCategory::LongCall,
            Self::LongPut { .. } => StrategyCategory::LongPut,
            Self::IronCondor { .. } => StrategyCategory::IronCondor,
            Self::ShortStraddle => StrategyCategory::ShortStraddle,
            Self::LongButterfly { .. } => StrategyCategory::Butterfly,
        }
    }

    pub fn name(self) -> String {
        match self {
            Self::BullCallSpread { width } => format!("Bull Call Spread +{width}"),
            Self::BearPutSpread { width } => format!("Bear Put Spread -{width}"),
            Self::ShortPut { otm_offset } => format!("Short Put (OTM-{otm_offset})"),
            Self::ShortCallSpread { width } => format!("Short Call Spread +{width}"),
            Self::LongCall { otm_offset: 0 } => "Long Call ATM".to_string(),
            Self::LongCall { otm_offset } => format!("Long Call OTM+{otm_offset}"),
            Self::LongPut { otm_offset: 0 } => "Long Put ATM".to_string(),
            Self::LongPut { otm_offset } => format!("Long Put OTM-{otm_offset}"),
            Self::IronCondor { wing } => format!("Iron Condor (±{wing})"),
            Self::ShortStraddle => "Short Straddle (ATM)".to_string(),
            Self::LongButterfly { wing } => format!("Long Butterfly (±{wing})"),
        }
    }

    fn layout(self) -> Layout {
        use OptionKind::{Call, Put};
        use Side::{Long, Short};
        let o = |n: usize| n as isize;
        match self {
            Self::BullCallSpread { width } => smallvec![(0, Call, Long, 1), (o(width), Call, Short, 1)],
            Self::BearPutSpread { width } => smallvec![(0, Put, Long, 1), (-o(width), Put, Short, 1)],
            Self::ShortPut { otm_offset } => smallvec![(-o(otm_offset), Put, Short, 1)],
            Self::ShortCallSpread { width } => {
                smallvec![(1, Call, Short, 1), (o(width) + 1, Call, Long, 1)]
            }
            Self::LongCall { otm_offset } => smallvec![(o(otm_offset), Call, Long, 1)],
            Self::LongPut { otm_offset } => smallvec![(-o(otm_offset), Put, Long, 1)],
            Self::IronCondor { wing } => smallvec![
                (-o(wing), Put, Long, 1),
                (-1, Put, Short, 1),
                (1, Call, Short, 1),
                (o(wing), Call, Long, 1),
            ],
            Self::ShortStraddle => smallvec![(0, Call, Short, 1), (0, Put, Short, 1)],
            Self::LongButterfly { wing } => smallvec![
                (-o(wing), Call, Long, 1),
                (0, Call, Short, 2),
                (o(wing), Call, Long, 1),
            ],
        }
    }

    /// Build against `chain` around `atm`. `Ok(None)` when a leg would fall
    /// outside the chain; `Err` when a quote yields an invalid leg.
    pub fn build(self, chain: &[ChainRow], atm: usize, max_legs: usize) -> EngineResult<Option<Strategy>> {
        let mut legs = Legs::new();
        for (offset, kind, side, quantity) in self.layout() {
            let Some(row) = row_at(chain, atm, offset) else {
                return Ok(None);
            };
            legs.push(leg(row, kind, side, quantity)?);
        }
        Strategy::new(self.name(), self.category(), legs, max_legs).map(Some)
    }
}
