//! Multi-leg payoff at expiry.
//!
//! Per-unit leg payoff is intrinsic value times side sign times quantity;
//! premium is netted at the strategy level (long pays, short receives) and the
//! total scaled by lot size. Pure functions, no allocation except the curve.
use crate::models::{OptionKind, OptionLeg, Side};

/// Payoff of one leg at terminal price `terminal`, before premium.
#[inline]
pub fn leg_payoff(terminal: f64, strike: f64, kind: OptionKind, side: Side, quantity: u32) -> f64 {
    side.sign() * kind.intrinsic(terminal, strike) * quantity as f64
}

/// Net premium per unit across legs. Positive = credit received.
#[inline]
pub fn net_premium(legs: &[OptionLeg]) -> f64 {
    legs.iter().map(|l| -l.signed_quantity() * l.premium).sum()
}

/// Strategy P&L at `terminal`, in currency for one lot.
#[inline]
pub fn strategy_payoff(legs: &[OptionLeg], terminal: f64, include_premium: bool, lot_size: f64) -> f64 {
    let intrinsic: f64 = legs
        .iter()
        .map(|l| leg_payoff(terminal, l.strike, l.kind, l.side, l.quantity))
        .sum();
    let premium = if include_premium { net_premium(legs) } else { 0.0 };
    (intrinsic + premium) * lot_size
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PayoffCurve {
    pub prices: Vec<f64>,
    pub payoffs: Vec<f64>,
    pub breakevens: Vec<f64>,
    pub max_profit: f64,
    pub max_loss: f64,
    /// Index of the sample closest to the current spot
    pub current_price_idx: usize,
}

/// `n` evenly spaced points over [start, end], endpoints included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Premium-inclusive payoff over `spot * (1 +/- range_pct)` at `n_points` prices.
pub fn payoff_curve(
    legs: &[OptionLeg],
    spot: f64,
    range_pct: f64,
    n_points: usize,
    lot_size: f64,
) -> PayoffCurve {
    let prices = linspace(spot * (1.0 - range_pct), spot * (1.0 + range_pct), n_points);
    let payoffs: Vec<f64> = prices
        .iter()
        .map(|&st| strategy_payoff(legs, st, true, lot_size))
        .collect();

    let breakevens = find_breakevens(&prices, &payoffs);
    let max_profit = payoffs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let max_loss = payoffs.iter().copied().fold(f64::INFINITY, f64::min);

    PayoffCurve {
        current_price_idx: prices.len() / 2,
        prices,
        payoffs,
        breakevens,
        max_profit,
        max_loss,
    }
}

/// Breakeven prices from a sampled curve.
///
/// A sign change strictly between two samples is located by linear
/// interpolation. A sample that is exactly zero is reported as-is; a run of
/// exact zeros reports its first and last price only. No price is emitted twice.
pub fn find_breakevens(prices: &[f64], payoffs: &[f64]) -> Vec<f64> {
    let n = prices.len().min(payoffs.len());
    let mut out: Vec<f64> = Vec::new();
    let push = |x: f64, out: &mut Vec<f64>| {
        if out.last().map_or(true, |&last| last != x) {
            out.push(x);
        }
    };

    let mut i = 0;
    while i < n {
        if payoffs[i] == 0.0 {
            let run_start = i;
            while i + 1 < n && payoffs[i + 1] == 0.0 {
                i += 1;
            }
            push(prices[run_start], &mut out);
            push(prices[i], &mut out);
        } else if i + 1 < n && payoffs[i + 1] != 0.0 && payoffs[i] * payoffs[i + 1] < 0.0 {
            let (p0, p1) = (payoffs[i], payoffs[i + 1]);
            let x = prices[i] - p0 * (prices[i + 1] - prices[i]) / (p1 - p0);
            push(x, &mut out);
        }
        i += 1;
    }
    out
}
