//! Typed error taxonomy for the library boundary (spec section 7).
//!
//! Internally, plumbing code uses `anyhow::Result` the way the rest of this
//! crate does; `DiskJoinError` exists so callers can match on `.kind()`
//! instead of string-sniffing an `anyhow::Error`.

use std::fmt;

#[derive(Debug)]
pub enum DiskJoinError {
    InvalidManifest { path: String, reason: String },
    ShardCountMismatch { expected: usize, found: usize, frame: String },
    SortViolation { shard: String, frame: String },
    SelectAmbiguous { name: String, candidates: Vec<String> },
    SelectUnknown { name: String },
    SelectDuplicateAlias { alias: String },
    FramingError { path: String, reason: String },
    Io { context: String, source: std::io::Error },
}

impl fmt::Display for DiskJoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskJoinError::InvalidManifest { path, reason } => {
                write!(f, "invalid manifest at {path}: {reason}")
            }
            DiskJoinError::ShardCountMismatch { expected, found, frame } => {
                write!(f, "shard count mismatch: expected {expected}, frame {frame} has {found}")
            }
            DiskJoinError::SortViolation { shard, frame } => {
                write!(f, "sort violation in shard {shard} of frame {frame}")
            }
            DiskJoinError::SelectAmbiguous { name, candidates } => write!(
                f,
                "field {name:?} is ambiguous; qualify with one of {candidates:?}"
            ),
            DiskJoinError::SelectUnknown { name } => write!(f, "unknown field {name:?}"),
            DiskJoinError::SelectDuplicateAlias { alias } => {
                write!(f, "duplicate output alias {alias:?}")
            }
            DiskJoinError::FramingError { path, reason } => {
                write!(f, "corrupt shard framing in {path}: {reason}")
            }
            DiskJoinError::Io { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for DiskJoinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiskJoinError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl DiskJoinError {
    /// Wrap a raw I/O failure at a module boundary (manifest/shard file
    /// open-create, not every `write!` deep in a body) so it surfaces as a
    /// typed `IoError` instead of a bare `anyhow::Error`.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DiskJoinError::Io { context: context.into(), source }
    }

    /// Short, stable kind string for the CLI's one-line error summary.
    pub fn kind(&self) -> &'static str {
        match self {
            DiskJoinError::InvalidManifest { .. } => "InvalidManifest",
            DiskJoinError::ShardCountMismatch { .. } => "ShardCountMismatch",
            DiskJoinError::SortViolation { .. } => "SortViolation",
            DiskJoinError::SelectAmbiguous { .. } => "SelectAmbiguous",
            DiskJoinError::SelectUnknown { .. } => "SelectUnknown",
            DiskJoinError::SelectDuplicateAlias { .. } => "SelectDuplicateAlias",
            DiskJoinError::FramingError { .. } => "FramingError",
            DiskJoinError::Io { .. } => "IoError",
        }
    }
}
