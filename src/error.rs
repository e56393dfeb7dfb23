//! Construction-time errors for the IP gate.
//!
//! Nothing on the per-request path returns an error: a missing or malformed
//! client address is simply "no match".

use std::path::PathBuf;

/// Error raised while building a [`MatcherSet`](crate::MatcherSet) or a
/// [`Gate`](crate::Gate).
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Neither an allowlist nor a denylist was configured.
    #[error("one of `allowlist` or `denylist` is required")]
    MissingList,

    /// Both an allowlist and a denylist were configured.
    #[error("cannot define both an allowlist and a denylist; choose one")]
    ConflictingLists,

    /// The configured list has no entries.
    #[error("address list is empty")]
    EmptyList,

    /// An entry is neither an IP address nor a CIDR block.
    #[error("bad IP provided: {0}")]
    InvalidAddress(String),

    /// A list file could not be decoded.
    #[error("invalid address list {}: {reason}", .path.display())]
    Source { path: PathBuf, reason: String },

    /// A list file could not be read.
    #[error("failed to read address list {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
