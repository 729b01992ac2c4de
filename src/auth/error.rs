use thiserror::Error;

/// Authentication errors returned during bearer token verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}
