//! Coalesced `last_used_at` writer: buffers touches in memory and flushes
//! at most once per interval, so a hot token doesn't generate a write per
//! request.

use chrono::{DateTime, Utc};
use scope_config_error::ScopeConfigError;
use scope_config_storage::TokenRepo;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

/// In-memory buffer of pending `last_used_at` updates, flushed by a
/// background task spawned via [`LastUsedCoalescer::spawn_flush_loop`].
#[derive(Clone, Default)]
pub struct LastUsedCoalescer {
    pending: Arc<Mutex<HashMap<Uuid, DateTime<Utc>>>>,
}

impl LastUsedCoalescer {
    /// An empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `token_id` was used at `at`. Repeated calls within the
    /// same flush window collapse to a single write of the latest timestamp.
    pub fn record(&self, token_id: Uuid, at: DateTime<Utc>) {
        let mut pending = self.pending.lock().expect("coalescer mutex poisoned");
        pending
            .entry(token_id)
            .and_modify(|existing| {
                if at > *existing {
                    *existing = at;
                }
            })
            .or_insert(at);
    }

    /// Drain the pending buffer and write every entry to storage.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScopeConfigError`] encountered; already-flushed
    /// entries for other tokens are not retried by this call.
    #[instrument(skip(self, repo), name = "flush_last_used")]
    pub async fn flush(&self, repo: &TokenRepo) -> Result<usize, ScopeConfigError> {
        let batch: Vec<(Uuid, DateTime<Utc>)> = {
            let mut pending = self.pending.lock().expect("coalescer mutex poisoned");
            pending.drain().collect()
        };
        let count = batch.len();
        for (token_id, at) in batch {
            if let Err(e) = repo.touch_last_used(token_id, at).await {
                warn!(error = %e, %token_id, "failed to flush last_used_at");
                return Err(e);
            }
        }
        Ok(count)
    }

    /// Spawn a background task that calls [`LastUsedCoalescer::flush`] every
    /// `interval`, for the lifetime of the returned handle's owner (abort it
    /// on shutdown to stop the loop cleanly).
    #[must_use]
    pub fn spawn_flush_loop(self: Arc<Self>, repo: TokenRepo, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.flush(&repo).await {
                    warn!(error = %e, "last_used_at flush loop iteration failed");
                }
            }
        })
    }
}
