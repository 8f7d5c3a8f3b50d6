use sdsim_common::{Diagnostic, ErrorCode, Span};
use thiserror::Error;

/// Typed construction-time failure, layered over the C-compatible
/// [`ErrorCode`] space external callers switch on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("model `{0}` not found")]
    UnknownModel(String),
    #[error("unresolved name `{0}`")]
    UnresolvedName(String),
    #[error("variable `{0}` not found")]
    UnknownVariable(String),
    #[error("dependency cycle detected")]
    Circular,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::UnknownModel(_) => ErrorCode::BadFile,
            EngineError::UnresolvedName(_) => ErrorCode::Unspecified,
            EngineError::UnknownVariable(_) => ErrorCode::Unspecified,
            EngineError::Circular => ErrorCode::Circular,
        }
    }
}

impl From<EngineError> for Diagnostic {
    fn from(err: EngineError) -> Diagnostic {
        Diagnostic::new(err.code(), err.to_string(), Span::empty())
    }
}
