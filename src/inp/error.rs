//! Error types for loading and serializing INP documents
//!
//!     Every failure surfaces as a typed `InpError`; the engine never downgrades
//!     a problem to a warning or returns a partially loaded document. Unrecognized
//!     section labels are deliberately *not* errors — they are retained on the
//!     document for introspection (forward compatibility with newer dialects).

use std::fmt;

/// Error raised while loading or serializing an INP document.
#[derive(Debug, Clone, PartialEq)]
pub enum InpError {
    /// IO error when reading or writing a file
    Io(String),
    /// A line's token shape or count doesn't match any accepted variant for
    /// its section, or a token failed to parse as its declared type.
    Format {
        section: &'static str,
        line: Option<usize>,
        reason: String,
    },
    /// A required subclass join, or a composite-merge field conflict, could
    /// not be resolved.
    UnresolvedJoin {
        section: &'static str,
        reason: String,
    },
    /// A referenced support file is unresolvable under either resolution path.
    MissingSupportFile {
        section: &'static str,
        field: &'static str,
        path: String,
    },
    /// The caller named an element class this library does not define.
    UnknownElementClass(String),
}

impl InpError {
    pub(crate) fn format(section: &'static str, line: Option<usize>, reason: impl Into<String>) -> Self {
        InpError::Format {
            section,
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn join(section: &'static str, reason: impl Into<String>) -> Self {
        InpError::UnresolvedJoin {
            section,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InpError::Io(msg) => write!(f, "IO error: {}", msg),
            InpError::Format {
                section,
                line: Some(line),
                reason,
            } => write!(f, "format error in {} (line {}): {}", section, line, reason),
            InpError::Format {
                section,
                line: None,
                reason,
            } => write!(f, "format error in {}: {}", section, reason),
            InpError::UnresolvedJoin { section, reason } => {
                write!(f, "unresolved join for {}: {}", section, reason)
            }
            InpError::MissingSupportFile {
                section,
                field,
                path,
            } => write!(
                f,
                "can't find support file '{}' referenced by {} in {}",
                path, field, section
            ),
            InpError::UnknownElementClass(name) => {
                write!(f, "unknown element class '{}'", name)
            }
        }
    }
}

impl std::error::Error for InpError {}

impl From<std::io::Error> for InpError {
    fn from(err: std::io::Error) -> Self {
        InpError::Io(err.to_string())
    }
}
