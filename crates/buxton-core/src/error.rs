//! `Resolver` error taxonomy — maps directly onto spec.md §7's STATUS codes.

use buxton_wire::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("access denied")]
    Denied,

    #[error("not found")]
    NotFound,

    #[error("type mismatch")]
    TypeMismatch,

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("backend error: {0}")]
    Backend(#[from] buxton_backend::BackendError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// The STATUS code this error surfaces to the wire (spec.md §7). Backend
    /// errors are logged by the caller before this conversion — the detail
    /// never reaches the client (spec §4.2: "failure is opaque to the caller").
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Denied => StatusCode::Denied,
            CoreError::NotFound => StatusCode::NotFound,
            CoreError::TypeMismatch => StatusCode::TypeMismatch,
            CoreError::Invalid(_) => StatusCode::Invalid,
            CoreError::Backend(_) => StatusCode::Backend,
        }
    }
}
