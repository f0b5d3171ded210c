/// Capital below this produces an empty ranking
pub const MIN_CAPITAL: f64 = 10_000.0;

/// How much of the account a single strategy may lose at expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskProfile {
    /// Maximum loss as a fraction of capital.
    #[inline]
    pub fn max_loss_fraction(self) -> f64 {
        match self {
            Self::Conservative => 0.05,
            Self::Moderate => 0.10,
            Self::Aggressive => 0.20,
        }
    }

    #[inline]
    pub fn max_loss_allowed(self, capital: f64) -> f64 {
        capital * self.max_loss_fraction()
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Moderate => write!(f, "moderate"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Risk limit check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskCheck {
    Allowed,
    /// Blocked with reason
    Blocked(&'static str),
}

impl RiskCheck {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskCheck::Allowed)
    }
}

/// Check a scored candidate against the account's limits.
/// `max_loss` is the worst payoff (negative for a loss). Pure function.
#[inline]
pub fn check_candidate(
    max_loss: f64,
    margin_total: f64,
    capital: f64,
    profile: RiskProfile,
) -> RiskCheck {
    // 1. Account too small to trade
    if !(capital >= MIN_CAPITAL) {
        return RiskCheck::Blocked("capital below minimum");
    }

    // 2. Sanity: scored values must be finite
    if !max_loss.is_finite() || !margin_total.is_finite() {
        return RiskCheck::Blocked("non-finite risk metrics");
    }

    // 3. Loss budget
    let loss = (-max_loss).max(0.0);
    if loss > profile.max_loss_allowed(capital) {
        return RiskCheck::Blocked("max loss exceeds risk budget");
    }

    // 4. Margin
    if margin_total > capital {
        return RiskCheck::Blocked("margin exceeds capital");
    }

    RiskCheck::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(RiskProfile::Conservative.max_loss_allowed(100_000.0), 5_000.0);
        assert_eq!(RiskProfile::Moderate.max_loss_allowed(100_000.0), 10_000.0);
        assert_eq!(RiskProfile::Aggressive.max_loss_allowed(100_000.0), 20_000.0);
    }

    #[test]
    fn test_normal_conditions_allowed() {
        let check = check_candidate(-1_950.0, 1_950.0, 100_000.0, RiskProfile::Moderate);
        assert!(check.is_allowed());
    }

    #[test]
    fn test_loss_budget_blocks() {
        let check = check_candidate(-6_000.0, 6_000.0, 100_000.0, RiskProfile::Conservative);
        assert_eq!(check, RiskCheck::Blocked("max loss exceeds risk budget"));
        assert!(check_candidate(-6_000.0, 6_000.0, 100_000.0, RiskProfile::Moderate).is_allowed());
    }

    #[test]
    fn test_margin_blocks() {
        let check = check_candidate(-100.0, 150_000.0, 100_000.0, RiskProfile::Aggressive);
        assert_eq!(check, RiskCheck::Blocked("margin exceeds capital"));
    }

    #[test]
    fn test_small_account_blocked() {
        let check = check_candidate(-10.0, 10.0, 9_999.0, RiskProfile::Aggressive);
        assert_eq!(check, RiskCheck::Blocked("capital below minimum"));
    }

    #[test]
    fn test_cannot_lose_is_within_budget() {
        assert!(check_candidate(25.0, 0.0, 50_000.0, RiskProfile::Conservative).is_allowed());
    }
}
