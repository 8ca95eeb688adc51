//! Deterministic, pure logic for request lifecycle and billing.
//!
//! Core modules must be free of I/O side effects. They take immutable
//! snapshots and return new values, so they are safe to call from any
//! thread without locking. Persisting results and recording audit entries
//! is the caller's job (see [`crate::service`]).

pub mod billing;
pub mod lifecycle;
pub mod money;
pub mod result_entry;
pub mod status;
pub mod types;
pub mod validation;
