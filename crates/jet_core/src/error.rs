use thiserror::Error;

/// Errors raised by the jet engine.
///
/// Every variant signals a caller error or a hard resource limit; none of them
/// is retried internally.
#[derive(Debug, Error)]
pub enum JetError {
    #[error("{operation}: incompatible dimensions (expected {expected}, found {found})")]
    DimensionMismatch {
        operation: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("requested degree {requested} exceeds maximal degree {max}")]
    DegreeExceeded { requested: usize, max: usize },

    #[error("{0} overflows 64-bit unsigned integer")]
    Overflow(String),

    #[error("factorial({0}) exceeds double capacity of the factorial table")]
    FactorialCapacity(usize),

    #[error("indices are not ordered: {0:?}")]
    UnorderedIndices(Vec<usize>),

    #[error("{what} index {index} out of range (length {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("container shape is fixed to (image {image}, dimension {dimension}, degree {degree})")]
    ResizeForbidden {
        image: usize,
        dimension: usize,
        degree: usize,
    },

    #[error("malformed jet stream: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("linear part of the series is not the identity matrix")]
    NotCloseToIdentity,

    #[error("linear part of the series is singular")]
    SingularLinearPart,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, JetError>;

pub(crate) fn ensure_dimension(operation: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(JetError::DimensionMismatch {
            operation,
            expected,
            found,
        });
    }
    Ok(())
}

pub(crate) fn ensure_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(JetError::IndexOutOfRange { what, index, len });
    }
    Ok(())
}
