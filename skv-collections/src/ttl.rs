//! Remaining key lifetime as reported by `PTTL`.

use std::fmt;
use std::time::Duration;

/// Remaining lifetime of a stored key, mirroring the store's `TTL` semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

impl Ttl {
    /// Interprets a `PTTL` reply. `-2` (missing key) yields `None`.
    ///
    /// Rounds to whole seconds like `TTL`, so a key given one second reads
    /// back as exactly one second.
    pub fn from_pttl(millis: i64) -> Option<Ttl> {
        match millis {
            -1 => Some(Ttl::NoExpiry),
            ms if ms >= 0 => Some(Ttl::ExpiresIn(Duration::from_secs((ms.saturating_add(500) / 1000) as u64))),
            _ => None,
        }
    }

    /// The remaining duration, or `None` for keys that never expire.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Ttl::NoExpiry => None,
            Ttl::ExpiresIn(duration) => Some(*duration),
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::NoExpiry => write!(f, "no expiry"),
            Ttl::ExpiresIn(duration) => write!(f, "{duration:?}"),
        }
    }
}
