//! Last-write-wins conflict resolution.

use crate::models::{TaskVersion, Winner};

/// Name recorded in the conflict log for this policy
pub const STRATEGY: &str = "lww";

/// Pick the version to keep for a task held on both sides.
///
/// The newer `updated_at` wins; an exact tie keeps the local version. A
/// missing timestamp is older than any present one.
pub fn resolve(local: &TaskVersion, remote: &TaskVersion) -> Winner {
    // `None < Some(_)` gives the missing-is-oldest ordering for free
    if local.updated_at >= remote.updated_at {
        Winner::Local
    } else {
        Winner::Remote
    }
}
