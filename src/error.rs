//! Error codes shared by every error enum in the crate.
//!
//! DESIGN
//! ======
//! Each module owns its own `thiserror` enum. They all implement
//! [`ErrorCode`] so log lines carry a stable, grepable code next to the
//! human-readable message, and so hosts can decide whether a retry makes
//! sense without matching on concrete variants.

/// Grepable error code and retryable flag for structured log fields.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
