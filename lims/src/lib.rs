//! Laboratory request tracking: analysis status resolution and billing.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic rules (status resolution, result entry,
//!   lifecycle overrides, billing arithmetic, input validation). No I/O.
//! - **[`io`]**: Side-effecting pieces (`.lims/` layout, JSON request store,
//!   JSONL audit log, config, text rendering).
//!
//! [`service::LabService`] coordinates the two through the
//! [`repository::RequestRepository`] and [`audit::AuditSink`] seams, and the
//! `lims` binary exposes it as a CLI.

pub mod audit;
pub mod clock;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod repository;
pub mod service;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
