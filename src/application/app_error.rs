use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    /// Transient failure reaching the durable store or the payment provider.
    #[error("Upstream lookup failed: {0}")]
    Upstream(String),

    #[error("Too many requests. Please slow down.")]
    RateLimited,

    /// Unknown email and wrong password are deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Email address is not verified")]
    EmailUnverified,

    /// Covers verification tokens, reset codes and reset tokens alike.
    #[error("Invalid or expired token")]
    TokenInvalidOrExpired,

    #[error("Verification token has expired")]
    VerificationExpired,

    #[error("Unable to send a reset code to this number")]
    ResetRequestFailed,

    #[error("Service not configured: {0}")]
    Configuration(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a webhook that failed with this error should be redelivered
    /// by the provider (5xx) rather than acknowledged (2xx).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Upstream(_)
                | AppError::Internal(_)
                | AppError::RateLimited
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Upstream(_) => ErrorCode::UpstreamUnavailable,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::AccountInactive => ErrorCode::AccountInactive,
            AppError::EmailUnverified => ErrorCode::EmailUnverified,
            AppError::TokenInvalidOrExpired => ErrorCode::TokenInvalidOrExpired,
            AppError::VerificationExpired => ErrorCode::VerificationExpired,
            AppError::ResetRequestFailed => ErrorCode::ResetRequestFailed,
            AppError::Configuration(_) => ErrorCode::ConfigurationError,
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::Forbidden => ErrorCode::Forbidden,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    DatabaseError,
    UpstreamUnavailable,
    RateLimited,
    InvalidCredentials,
    AccountInactive,
    EmailUnverified,
    TokenInvalidOrExpired,
    VerificationExpired,
    ResetRequestFailed,
    ConfigurationError,
    Unauthorized,
    Forbidden,
    InvalidInput,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::AccountInactive => "ACCOUNT_INACTIVE",
            ErrorCode::EmailUnverified => "EMAIL_UNVERIFIED",
            ErrorCode::TokenInvalidOrExpired => "TOKEN_INVALID_OR_EXPIRED",
            ErrorCode::VerificationExpired => "VERIFICATION_EXPIRED",
            ErrorCode::ResetRequestFailed => "RESET_REQUEST_FAILED",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
