/// Domain-specific error types for the strategy engine.
/// Every failure the core can produce maps to exactly one kind so callers can
/// tell bad input apart from an empty chain or an over-tight risk budget:
/// - InvalidInput is surfaced, never retried
/// - NoCandidates means widen the chain / change the view
/// - NoFeasibleStrategy means relax capital or risk appetite
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no candidate strategies generated for {view} view over {strikes} strikes")]
    NoCandidates { view: String, strikes: usize },

    #[error("no strategy passed risk constraints ({candidates} candidates evaluated)")]
    NoFeasibleStrategy { candidates: usize },

    #[error("implied volatility did not converge after {iterations} iterations (last iterate {last_sigma:.6})")]
    NumericNonConvergence { iterations: usize, last_sigma: f64 },

    #[error("external data failure: {0}")]
    ExternalData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("computation timed out after {0} seconds")]
    Timeout(u64),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable tag, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NoCandidates { .. } => "no_candidates",
            Self::NoFeasibleStrategy { .. } => "no_feasible_strategy",
            Self::NumericNonConvergence { .. } => "numeric_non_convergence",
            Self::ExternalData(_) => "external_data_failure",
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::InvalidInput(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject non-finite or non-positive values with a named InvalidInput.
#[inline]
pub fn ensure_positive(name: &str, value: f64) -> EngineResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::InvalidInput(format!("{name} must be positive, got {value}")))
    }
}
