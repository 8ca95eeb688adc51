//! Typed failures surfaced by the request service.
//!
//! Everything else travels as `anyhow::Error` with context; the CLI
//! downcasts to [`LimsError`] to choose an exit code.

use crate::core::result_entry::EntryError;

#[derive(Debug, thiserror::Error)]
pub enum LimsError {
    #[error("request '{0}' not found")]
    NotFound(String),
    #[error("input rejected:\n- {}", .0.join("\n- "))]
    Rejected(Vec<String>),
    #[error(
        "request '{id}' was modified concurrently (expected version {expected}, found {found})"
    )]
    Conflict {
        id: String,
        expected: u64,
        found: u64,
    },
    #[error(transparent)]
    Entry(#[from] EntryError),
}

impl LimsError {
    /// True for failures caused by the caller's input rather than by state or I/O.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LimsError::Rejected(_) | LimsError::Entry(_))
    }
}
