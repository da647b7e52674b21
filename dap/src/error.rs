use std::error;
use std::fmt;

/// Result type of fallible replication operations.
pub type DapResult<T> = Result<T, DapError>;

/// Error returned by replication primitives and table workers.
///
/// Every error carries an [`ErrorKind`], which is what callers branch on, and a
/// human-readable description with an optional dynamic detail, which is what
/// gets logged.
#[derive(Debug, Clone)]
pub struct DapError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
}

/// Categories of replication errors.
///
/// [`ErrorKind::TableNotFound`] and [`ErrorKind::TableNotInitialized`] are the
/// conditions the table worker reacts to, everything else is an operational
/// failure of the table.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Replication conditions
    TableNotFound,
    TableNotInitialized,

    // Replication client errors
    CommandSpawnFailed,
    CommandFailed,
    InvalidData,

    // Table worker errors
    TableWorkerPanic,
    TableWorkerCancelled,

    // IO errors
    IoError,

    // Unknown / Uncategorized
    Unknown,
}

impl DapError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &'static str {
        match self.repr {
            ErrorRepr::WithDescription(_, desc) | ErrorRepr::WithDescriptionAndDetail(_, desc, _) => {
                desc
            }
        }
    }

    /// Returns the dynamic detail of this error, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::WithDescription(_, _) => None,
        }
    }
}

impl PartialEq for DapError {
    fn eq(&self, other: &DapError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for DapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)
            }
        }
    }
}

impl error::Error for DapError {}

impl From<(ErrorKind, &'static str)> for DapError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> DapError {
        DapError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for DapError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> DapError {
        DapError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl From<std::io::Error> for DapError {
    fn from(err: std::io::Error) -> DapError {
        DapError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

impl From<tokio::task::JoinError> for DapError {
    fn from(err: tokio::task::JoinError) -> DapError {
        let (kind, description) = if err.is_panic() {
            (ErrorKind::TableWorkerPanic, "Table worker panicked")
        } else {
            (ErrorKind::TableWorkerCancelled, "Table worker was aborted")
        };

        DapError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dap_error;

    #[test]
    fn display_includes_kind_description_and_detail() {
        let err = dap_error!(
            ErrorKind::CommandFailed,
            "Replication client failed",
            "exit status: 1"
        );

        assert_eq!(
            err.to_string(),
            "CommandFailed: Replication client failed -> exit status: 1"
        );
        assert_eq!(err.detail(), Some("exit status: 1"));
    }

    #[test]
    fn errors_compare_by_kind() {
        let a = dap_error!(ErrorKind::TableNotFound, "Table not found", "users");
        let b = dap_error!(ErrorKind::TableNotFound, "Table does not exist");

        assert_eq!(a, b);
        assert_eq!(b.detail(), None);
        assert_ne!(a, dap_error!(ErrorKind::Unknown, "Unknown"));
    }

    #[test]
    fn io_errors_map_to_io_kind() {
        let err: DapError = std::io::Error::other("broken pipe").into();

        assert_eq!(err.kind(), ErrorKind::IoError);
        assert_eq!(err.detail(), Some("broken pipe"));
    }
}
