//! Error types for the truthlens host.

use truthlens_knowledge::KnowledgeError;

/// Top-level error type for the host application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration file could not be parsed or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the knowledge engine.
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knowledge_errors_display_unchanged() {
        let err = AppError::from(KnowledgeError::NoProviders);
        assert_eq!(err.to_string(), "no knowledge providers are enabled");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io.into();
        assert!(err.to_string().starts_with("I/O error"));
    }
}
