//! Compile-time error taxonomy.
//!
//! Every failure the compiler can produce is a variant of [`Error`]. Errors
//! are raised synchronously at the point of violation and abort the compile;
//! the optimizer passes never raise, they only decline to rewrite.

/// Errors produced while building, resolving, or emitting a circuit.
#[derive(Debug)]
pub enum Error {
    /// A wire of one signal type was attached where another was required,
    /// or a node of the wrong shape was used (e.g. placing a non-input wire
    /// as a microcontroller input).
    TypeMismatch { expected: String, found: String },
    /// A reachable input marker was never placed on the microcontroller
    /// surface.
    UnplacedInput { name: String },
    /// A placeholder survived into resolution without being replaced by a
    /// concrete producer.
    UnresolvedPlaceholder,
    /// A node position falls outside the 6x6 placement grid.
    OutOfBounds { x: i32, z: i32 },
    /// Two nodes share a grid position.
    DuplicatePlacement { x: i32, z: i32 },
    /// An input marker was placed twice, or two microcontrollers in a batch
    /// share a name.
    DuplicateName { name: String },
    /// An embedded script failed verification.
    Script {
        message: String,
        line: usize,
        column: usize,
    },
    /// A vehicle or artifact file could not be interpreted as a document.
    MalformedDocument(String),
    /// Filesystem failure while writing or reading artifacts.
    Io(std::io::Error),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, got {}", expected, found)
            }
            Error::UnplacedInput { name } => {
                write!(f, "input \"{}\" not placed on the microcontroller", name)
            }
            Error::UnresolvedPlaceholder => {
                write!(f, "placeholder must be replaced before compiling")
            }
            Error::OutOfBounds { x, z } => {
                write!(f, "node position ({}, {}) out of bounds", x, z)
            }
            Error::DuplicatePlacement { x, z } => {
                write!(f, "a node already exists at position ({}, {})", x, z)
            }
            Error::DuplicateName { name } => write!(f, "duplicate name \"{}\"", name),
            Error::Script {
                message,
                line,
                column,
            } => write!(f, "script error at {}:{}: {}", line, column, message),
            Error::MalformedDocument(msg) => write!(f, "malformed document: {}", msg),
            Error::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_covers_placement_errors() {
        let err = Error::DuplicatePlacement { x: 2, z: 3 };
        assert_eq!(err.to_string(), "a node already exists at position (2, 3)");

        let err = Error::OutOfBounds { x: 7, z: 0 };
        assert_eq!(err.to_string(), "node position (7, 0) out of bounds");
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let err = Error::TypeMismatch {
            expected: "number".to_string(),
            found: "boolean".to_string(),
        };
        assert_eq!(err.to_string(), "type mismatch: expected number, got boolean");
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error as _;
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(err.source().is_some());
    }
}
