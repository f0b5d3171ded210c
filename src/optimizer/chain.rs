use crate::errors::{EngineError, EngineResult};
use crate::models::OptionKind;

/// Exchange-reported Greeks for one contract, when the feed carries them.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct QuotedGreeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

/// One side (call or put) of a chain row.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OptionQuote {
    pub ltp: f64,
    pub bid: f64,
    pub ask: f64,
    pub open_interest: f64,
    /// Implied volatility in percent
    pub iv_pct: f64,
    pub greeks: Option<QuotedGreeks>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChainRow {
    pub strike: f64,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub call: OptionQuote,
    #[serde(default)]
    pub put: OptionQuote,
}

impl ChainRow {
    #[inline]
    pub fn quote(&self, kind: OptionKind) -> &OptionQuote {
        match kind {
            OptionKind::Call => &self.call,
            OptionKind::Put => &self.put,
        }
    }
}

/// Option chain for one underlying at one instant. Produced by an external
/// market-data client; read-only here.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub spot: f64,
    pub rows: Vec<ChainRow>,
    #[serde(default)]
    pub expiries: Vec<String>,
    /// True when the chain is generated rather than live
    #[serde(default)]
    pub synthetic: bool,
}

impl MarketSnapshot {
    /// Spot must be positive and strikes positive, strictly increasing.
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.spot.is_finite() && self.spot > 0.0) {
            return Err(EngineError::InvalidInput(format!("spot must be positive, got {}", self.spot)));
        }
        if self.rows.is_empty() {
            return Err(EngineError::ExternalData(format!("option chain for {} is empty", self.symbol)));
        }
        if let Some(row) = self.rows.iter().find(|r| !(r.strike.is_finite() && r.strike > 0.0)) {
            return Err(EngineError::InvalidInput(format!("invalid strike {}", row.strike)));
        }
        if let Some(pair) = self.rows.windows(2).find(|w| w[1].strike <= w[0].strike) {
            return Err(EngineError::InvalidInput(format!(
                "strikes must be strictly increasing: {} then {}",
                pair[0].strike, pair[1].strike
            )));
        }
        Ok(())
    }

    /// Index of the strike nearest to spot. On a tie the lower strike wins.
    pub fn atm_index(&self) -> EngineResult<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, row) in self.rows.iter().enumerate() {
            let dist = (row.strike - self.spot).abs();
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((i, dist));
            }
        }
        best.map(|(i, _)| i)
            .ok_or_else(|| EngineError::ExternalData(format!("option chain for {} is empty", self.symbol)))
    }

    /// Mean of call and put IV at `atm`, as a decimal.
    pub fn atm_iv(&self, atm: usize) -> EngineResult<f64> {
        let row = self
            .rows
            .get(atm)
            .ok_or_else(|| EngineError::InvalidInput(format!("ATM index {atm} out of range")))?;
        Ok((row.call.iv_pct + row.put.iv_pct) / 2.0 / 100.0)
    }

    /// Rows within `half_width` strikes of `atm`, and the ATM position inside
    /// that window.
    pub fn scan_window(&self, atm: usize, half_width: usize) -> (&[ChainRow], usize) {
        let atm = atm.min(self.rows.len().saturating_sub(1));
        let lo = atm.saturating_sub(half_width);
        let hi = atm.saturating_add(half_width).saturating_add(1).min(self.rows.len());
        (&self.rows[lo..hi], atm - lo)
    }

    pub fn expiry_label(&self) -> String {
        self.expiries.first().cloned().unwrap_or_else(|| "N/A".to_string())
    }
}
