use thiserror::Error;

use crate::ast::ApertureId;
use crate::rvmc::LayerId;

/// Errors raised by the packed coordinate codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("packed coordinate '{0}' contains no digits")]
    TooShort(String),
    #[error("coordinate '{raw}' does not fit into the {max_digits} digits allowed by the format")]
    TooLong { raw: String, max_digits: usize },
    #[error("packed coordinate '{0}' contains characters other than an optional sign and digits")]
    Invalid(String),
}

/// Errors raised while evaluating macro arithmetic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionEvaluationError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid variable number: ${0}, variables are numbered from $1")]
    InvalidVariable(u32),
    #[error("unable to parse expression '{expression}': {reason}")]
    Syntax { expression: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("coordinate encountered before the format specification (FS) command")]
    CoordinateFormatNotSet,
    #[error("format specification changed after coordinates were unpacked with the previous one")]
    CoordinateFormatRedefined,
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    #[error("operation requires an aperture but none has been selected")]
    ApertureNotSelected,
    #[error("aperture {0} is not defined")]
    ApertureNotFound(ApertureId),
    #[error("aperture {0} has no geometric interpretation and cannot be flashed")]
    DirectApertureDispatchNotSupported(ApertureId),
    #[error("aperture macro '{0}' is not defined")]
    MacroNotDefined(String),
    #[error("region contour operation outside of a region (G36/G37) context")]
    ContourBufferNotSet,
    #[error("layer {0} depends on itself, directly or via nested apertures")]
    CyclicBufferDependency(LayerId),
    #[error("layer {0} is referenced but was never built")]
    BufferNotFound(LayerId),
    #[error(transparent)]
    Expression(#[from] ExpressionEvaluationError),
}

impl CompileError {
    /// Errors which abort the pass regardless of the configured error handling.
    pub fn is_always_fatal(&self) -> bool {
        matches!(
            self,
            CompileError::CyclicBufferDependency(_) | CompileError::DirectApertureDispatchNotSupported(_)
        )
    }
}
