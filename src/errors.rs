//! Structured, caller-visible error types (spec.md §7; SPEC_FULL.md §7).
//!
//! Most of spec.md §7's conditions are "warn and keep going" — those are
//! logged via `log::warn!` at their call site and never surface here. This
//! enum is reserved for the conditions a caller of this library actually
//! needs to branch on.

use thiserror::Error;

/// Enumerates the recoverable, reportable error conditions this crate's
/// passes can raise.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum SdError {
    #[error("thunk {thunk:?} does not resolve to a known _Z-mangled symbol")]
    UnresolvableThunk { thunk: String },

    #[error("virtual function {name:?} has no CHA id and is not a thunk")]
    VirtualWithoutId { name: String },

    #[error(transparent)]
    Metadata(#[from] crate::metadata::MetadataParseError),

    #[error("CSV report path {path:?} could not be created after {attempts} suffix attempts")]
    ReportPathExhausted { path: String, attempts: u32 },

    #[error("I/O error writing report: {0}")]
    Io(#[from] std::io::Error),
}
