//! Stable exit codes for `lims` commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed on I/O, a corrupt store, an unknown request, or a stale write.
pub const INVALID: i32 = 1;
/// Input was rejected by validation or the lifecycle rules.
pub const REJECTED: i32 = 2;
