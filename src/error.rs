use thiserror::Error;

/// Ошибки хост-слоя: разбор лога событий и фоновое планирование.
/// Сам планировщик ошибок не возвращает, а деградирует до idle-плана.
#[derive(Debug, Error)]
pub enum AutoZoomError {
    #[error("failed to parse events log: {0}")]
    ParseEvents(#[from] serde_json::Error),
    #[error("unsupported events schemaVersion: expected {expected}, got {actual}")]
    UnsupportedSchema { expected: u32, actual: u32 },
    #[error("planning request was superseded by a newer one")]
    Superseded,
    #[error("planning worker failed: {0}")]
    Worker(String),
}

/// Нарушение инварианта `ZoomConstraints` (ошибка программиста, не пользователя).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    #[error("{field} must be finite")]
    NonFinite { field: &'static str },
    #[error("maxZoom must be >= 1, got {0}")]
    MaxZoomBelowOne(f64),
    #[error("idleZoom must lie in [1, zoom ceiling], got {idle} with ceiling {max}")]
    IdleZoomOutOfRange { idle: f64, max: f64 },
    #[error("minVisibleAreaFraction must lie in [1/maxZoom^2, 1], got {0}")]
    VisibleFractionOutOfRange(f64),
    #[error("{field} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must be > 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}
