//! Outstanding capture requests keyed by request token.
//!
//! A token leaves the table exactly once: either a reply resolves it or the
//! sweeper evicts it. Both paths remove under the same mutex, so whichever
//! runs first wins and the other observes an absent token.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;

use crate::caller::CallerHandle;

/// One capture awaiting its reply.
pub struct PendingRequest {
    /// Correlation token sent to the agent.
    pub token: String,
    /// Where the result goes.
    pub caller: Arc<dyn CallerHandle>,
    /// Agent expected to answer.
    pub target_agent_id: String,
    /// Dispatch time.
    pub created_at: OffsetDateTime,
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingRequest")
            .field("token", &self.token)
            .field("target_agent_id", &self.target_agent_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Errors raised by the pending table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PendingError {
    /// The token is already outstanding.
    #[error("request token {token} is already pending")]
    DuplicateToken {
        /// Conflicting token.
        token: String,
    },
}

struct PendingEntry {
    caller: Arc<dyn CallerHandle>,
    target_agent_id: String,
    created_at: OffsetDateTime,
}

impl PendingEntry {
    fn into_request(self, token: String) -> PendingRequest {
        PendingRequest {
            token,
            caller: self.caller,
            target_agent_id: self.target_agent_id,
            created_at: self.created_at,
        }
    }
}

/// Mutex-guarded token table.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl fmt::Debug for PendingRequests {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingRequests")
            .field("len", &self.len())
            .finish()
    }
}

impl PendingRequests {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Records a dispatched request.
    ///
    /// # Errors
    ///
    /// Returns [`PendingError::DuplicateToken`] when the token is already
    /// outstanding; the existing entry is left untouched.
    pub fn insert(
        &self,
        token: &str,
        caller: Arc<dyn CallerHandle>,
        target_agent_id: &str,
        created_at: OffsetDateTime,
    ) -> Result<(), PendingError> {
        let mut entries = self.lock();
        if entries.contains_key(token) {
            return Err(PendingError::DuplicateToken {
                token: token.to_owned(),
            });
        }
        entries.insert(
            token.to_owned(),
            PendingEntry {
                caller,
                target_agent_id: target_agent_id.to_owned(),
                created_at,
            },
        );
        Ok(())
    }

    /// Removes and returns the request for `token`, if still outstanding.
    pub fn resolve(&self, token: &str) -> Option<PendingRequest> {
        self.lock()
            .remove_entry(token)
            .map(|(token, entry)| entry.into_request(token))
    }

    /// Removes and returns every request older than `max_age` at `now`.
    pub fn sweep_expired(&self, now: OffsetDateTime, max_age: Duration) -> Vec<PendingRequest> {
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now - entry.created_at > max_age)
            .map(|(token, _)| token.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|token| {
                entries
                    .remove(&token)
                    .map(|entry| entry.into_request(token))
            })
            .collect()
    }

    /// Whether `token` is outstanding.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests;
