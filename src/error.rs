use thiserror::Error;

/// Validation failures at the engine boundary.
///
/// Business rejections (no edge, gate blocks) are never errors; they come
/// back as a populated decision with a tagged recommendation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid price {0}: expected cents in (1, 100) or a decimal in (0, 1)")]
    InvalidPrice(f64),
    #[error("invalid probability {0}: must be within [0, 1]")]
    InvalidProbability(f64),
    #[error("invalid bankroll {0}: must be a positive amount")]
    InvalidBankroll(f64),
    #[error("invalid {name} threshold {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}
