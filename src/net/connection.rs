//! Session lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Count live sessions for the connection limit
//! - Let shutdown wait for sessions to drain

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// Global atomic counter for session IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tunnel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Tracks live sessions against a fixed limit.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
    max_connections: u64,
}

impl ConnectionTracker {
    pub fn new(max_connections: usize) -> Self {
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            max_connections: max_connections as u64,
        }
    }

    /// Reserve a slot. Returns `None` when the limit is reached.
    pub fn try_track(&self) -> Option<ConnectionGuard> {
        let reserved = self
            .active_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < self.max_connections).then_some(count + 1)
            });

        match reserved {
            Ok(previous) => {
                metrics::set_active_sessions(previous + 1);
                Some(ConnectionGuard {
                    active_count: Arc::clone(&self.active_count),
                    id: ConnectionId::new(),
                })
            }
            Err(_) => None,
        }
    }

    /// Get current live session count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all sessions are closed or `deadline` passes.
    /// Returns the number of sessions still alive.
    pub async fn wait_idle(&self, deadline: Duration) -> u64 {
        let drained = tokio::time::timeout(deadline, async {
            while self.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(remaining = self.active_count(), "Sessions still open after drain deadline");
        }
        self.active_count()
    }
}

/// Guard that tracks a session's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this session's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_sessions(remaining);
        tracing::trace!(session = %self.id, "Session released");
    }
}
