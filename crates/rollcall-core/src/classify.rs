//! Outcome classifier: transport result -> [`Outcome`].
//!
//! Fixed policy, deterministic, no side effects.

use crate::domain::Outcome;
use crate::ports::{ProbeResult, TransportError};

/// Markers the Bot API uses for accounts that no longer exist. They arrive
/// under several status codes, so they are checked before the variant.
const DELETED_MARKERS: &[&str] = &["deactivated", "user not found", "chat not found"];

pub fn classify(result: &ProbeResult) -> Outcome {
    let err = match result {
        Ok(_) => return Outcome::Alive,
        Err(err) => err,
    };

    match err {
        TransportError::RateLimited { retry_after } => Outcome::RateLimited {
            retry_after: *retry_after,
        },
        TransportError::NotFound(_) => Outcome::Deleted,
        TransportError::Forbidden(description) => {
            if mentions_deleted(description) {
                Outcome::Deleted
            } else {
                Outcome::Blocked
            }
        }
        TransportError::Other(description) if mentions_deleted(description) => Outcome::Deleted,
        TransportError::Other(_) | TransportError::Unavailable(_) => Outcome::OtherError,
    }
}

fn mentions_deleted(description: &str) -> bool {
    let lower = description.to_ascii_lowercase();
    DELETED_MARKERS.iter().any(|marker| lower.contains(marker))
}
