use reco_types::ErrorKind;
use thiserror::Error;

/// The closed error taxonomy for the orchestration core. Every variant maps
/// to exactly one `ErrorKind` wire tag so internal errors and stream-facing
/// errors never drift apart.
#[derive(Error, Debug, Clone)]
pub enum RecoError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no such session: {0}")]
    NoSuchSession(String),

    #[error("runner timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("analyzer error: {0}")]
    AnalyzerError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("subscriber dropped: buffer overflow")]
    Overflow,
}

impl RecoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecoError::Validation(_) => ErrorKind::Validation,
            RecoError::NoSuchSession(_) => ErrorKind::NoSuchSession,
            RecoError::Timeout(_) => ErrorKind::Timeout,
            RecoError::Cancelled => ErrorKind::Cancelled,
            RecoError::AnalyzerError(_) => ErrorKind::AnalyzerError,
            RecoError::InternalError(_) => ErrorKind::InternalError,
            RecoError::Overflow => ErrorKind::Overflow,
        }
    }
}

impl serde::Serialize for RecoError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mapping_covers_every_variant() {
        assert_eq!(RecoError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(RecoError::NoSuchSession("x".into()).kind(), ErrorKind::NoSuchSession);
        assert_eq!(
            RecoError::Timeout(std::time::Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(RecoError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(RecoError::AnalyzerError("x".into()).kind(), ErrorKind::AnalyzerError);
        assert_eq!(RecoError::InternalError("x".into()).kind(), ErrorKind::InternalError);
        assert_eq!(RecoError::Overflow.kind(), ErrorKind::Overflow);
    }
}
