//! Domain error types.

use thiserror::Error;

/// Errors from money conversion and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MoneyError {
    #[error("Amount {0} is not a finite number")]
    NotFinite(f64),

    #[error("Amount {0} is outside the representable range")]
    OutOfRange(f64),

    #[error("Amount overflowed while computing line or order totals")]
    Overflow,
}
