use crate::app_error::AppResult;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> AppResult<String>;
    /// Constant-time comparison. Malformed digests compare as `false`.
    fn compare(&self, plain: &str, digest: &str) -> bool;
}
