//! Engine error taxonomy.
//!
//! Construction-time errors ([`Error::InvalidArgument`],
//! [`Error::TypeMismatch`]) surface from node constructors; everything
//! else aborts an in-flight evaluation, and partial blocks are never
//! observable.

use crate::value::ValueType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A user-supplied parameter is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Incompatible value types where inference is required.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: ValueType,
    },

    /// Runtime shape drift in vector- or matrix-valued inputs.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A failure surfaced from inside a combiner during evaluation.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The engine observed a state that its own invariants rule out.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl Error {
    pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
        Err(Error::InvalidArgument(msg.into()))
    }

    /// True for the error kinds raised at node-construction time.
    pub fn is_construction(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::TypeMismatch { .. })
    }
}
