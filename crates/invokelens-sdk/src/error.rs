//! The only two wrapper-raised error surfaces, plus the pass-through for
//! user function errors.

use invokelens_core::error::GuardrailError;
use std::fmt;

/// Error returned by `ObserveBuilder::call`/`call_with_trace`.
///
/// `Guardrail` is the sole SDK-originated variant, raised only before the
/// user function runs (Phases 1-2). `User` carries the user function's own
/// error through unchanged, exactly as it was returned.
#[derive(Debug)]
pub enum InvokeError<E> {
    /// Raised by the kill switch or a BLOCK-enforced policy.
    Guardrail(GuardrailError),
    /// The user function's own error, untouched.
    User(E),
}

impl<E: fmt::Display> fmt::Display for InvokeError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guardrail(err) => write!(f, "{err}"),
            Self::User(err) => write!(f, "{err}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for InvokeError<E> {}

impl<E> From<GuardrailError> for InvokeError<E> {
    fn from(err: GuardrailError) -> Self {
        Self::Guardrail(err)
    }
}

impl<E> InvokeError<E> {
    /// The user function's error, if that's what this is.
    #[must_use]
    pub fn into_user_error(self) -> Option<E> {
        match self {
            Self::User(err) => Some(err),
            Self::Guardrail(_) => None,
        }
    }
}
