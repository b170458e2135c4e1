//! `Result` extension traits for attaching context ergonomically.

use crate::context::ErrorContext;
use crate::error::RelayError;

pub type Result<T> = std::result::Result<T, RelayError>;

pub trait ResultExt<T> {
    fn context(self, description: impl Into<String>) -> Result<T>;

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, description: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(ErrorContext::new(description)))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
