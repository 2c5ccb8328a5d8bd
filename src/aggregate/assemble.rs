//! Partial-result merging.
//!
//! Secondary sub-results are absorbed into a default value so one failing
//! upstream never fails the whole payload. Fatal errors (rate limiting,
//! missing configuration, bad identifiers) still fail the request.

use crate::errors::AppError;

/// Absorb a secondary failure into `T::default()`.
pub fn absorb<T: Default>(section: &'static str, result: Result<T, AppError>) -> Result<T, AppError> {
    absorb_or(section, result, T::default)
}

/// Absorb a secondary failure into `fallback()`.
pub fn absorb_or<T>(
    section: &'static str,
    result: Result<T, AppError>,
    fallback: impl FnOnce() -> T,
) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!(section, error_kind = e.kind(), "sub-result defaulted: {}", e);
            Ok(fallback())
        }
    }
}
