// In-flight request deduplication
//
// At most one live request per key; a same-key arrival cancels the older
// request (last-write-wins) and takes over the entry. Entries linger
// briefly after completion to absorb duplicates that race the
// registration check itself; removal is always compare-and-remove on the
// registration sequence number, so a stale cleanup can never evict a
// newer request's entry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// How long a completed entry lingers before removal. Tunable, not a
/// correctness requirement.
const LINGER: Duration = Duration::from_millis(100);

/// Logical identity of an outbound call: method + path only.
///
/// Body and query parameters are deliberately excluded, so two different
/// writes to the same endpoint in quick succession share a key and the
/// older one is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(method: &Method, path: &str) -> Self {
        Self(format!("{}_{path}", method.as_str()))
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Inflight {
    token: CancellationToken,
    seq: u64,
    /// Set once the owning dispatch has settled and run its loading
    /// accounting. A completed entry still occupies the key during the
    /// linger window, but it is no longer a live predecessor: a duplicate
    /// that displaces it must do its own `begin()`/`end()`.
    completed: bool,
}

/// Outcome of installing a dispatch under its key.
pub(crate) struct Registration {
    /// Cancellation handle bound to this dispatch's transport call.
    pub token: CancellationToken,
    /// Identity of this registration, for compare-and-remove.
    pub seq: u64,
    /// True when a live same-key entry was displaced (and cancelled).
    /// The displacer inherits the loser's loading accounting.
    pub superseded: bool,
}

/// Registry of in-flight requests keyed by [`RequestKey`].
#[derive(Default)]
pub struct InflightRegistry {
    entries: Arc<DashMap<RequestKey, Inflight>>,
    next_seq: AtomicU64,
}

impl InflightRegistry {
    /// Install a fresh entry under `key`, cancelling any live predecessor.
    ///
    /// A predecessor that already settled (and merely lingers to absorb
    /// duplicate registrations) is displaced without being reported as
    /// superseded: its loading accounting is closed, so the new dispatch
    /// runs its own.
    pub(crate) fn register(&self, key: &RequestKey) -> Registration {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.entries.insert(
            key.clone(),
            Inflight {
                token: token.clone(),
                seq,
                completed: false,
            },
        );
        let superseded = match previous {
            Some(prev) if !prev.completed => {
                trace!(%key, "cancelling superseded in-flight request");
                prev.token.cancel();
                true
            }
            _ => false,
        };
        Registration {
            token,
            seq,
            superseded,
        }
    }

    /// Mark the entry as settled (its owner has finished its loading
    /// accounting), then schedule the linger removal. Compare-and-set on
    /// `seq`: a newer registration under the same key is left alone.
    pub(crate) fn settle(&self, key: &RequestKey, seq: u64) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.seq == seq {
                entry.completed = true;
            }
        }
        self.release_after_linger(key, seq);
    }

    /// Remove the entry under `key` only if it is still the one installed
    /// as `seq`. A newer registration under the same key is left alone.
    pub fn release_now(&self, key: &RequestKey, seq: u64) {
        self.entries.remove_if(key, |_, entry| entry.seq == seq);
    }

    /// Schedule a compare-and-remove after the linger window. The
    /// scheduled callback is a no-op if a newer request replaced the
    /// entry first.
    pub(crate) fn release_after_linger(&self, key: &RequestKey, seq: u64) {
        let entries = Arc::clone(&self.entries);
        let key = key.clone();
        tokio::spawn(async move {
            tokio::time::sleep(LINGER).await;
            entries.remove_if(&key, |_, entry| entry.seq == seq);
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key() -> RequestKey {
        RequestKey::new(&Method::GET, "/api/admin/users")
    }

    #[test]
    fn key_ignores_query_but_not_method() {
        assert_eq!(
            RequestKey::new(&Method::GET, "/api/admin/users"),
            RequestKey::new(&Method::GET, "/api/admin/users"),
        );
        assert_ne!(
            RequestKey::new(&Method::GET, "/api/admin/users"),
            RequestKey::new(&Method::POST, "/api/admin/users"),
        );
    }

    #[test]
    fn first_registration_is_not_superseding() {
        let registry = InflightRegistry::default();
        let reg = registry.register(&key());
        assert!(!reg.superseded);
        assert!(!reg.token.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_registration_cancels_the_first() {
        let registry = InflightRegistry::default();
        let first = registry.register(&key());
        let second = registry.register(&key());

        assert!(second.superseded);
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        // Still exactly one live entry for the key.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_with_stale_seq_leaves_newer_entry() {
        let registry = InflightRegistry::default();
        let first = registry.register(&key());
        let _second = registry.register(&key());

        registry.release_now(&key(), first.seq);
        assert_eq!(registry.len(), 1, "newer entry must survive stale release");
    }

    #[test]
    fn release_with_matching_seq_removes_entry() {
        let registry = InflightRegistry::default();
        let reg = registry.register(&key());
        registry.release_now(&key(), reg.seq);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn registration_after_settle_is_not_superseding() {
        let registry = InflightRegistry::default();
        let first = registry.register(&key());
        registry.settle(&key(), first.seq);

        // Inside the linger window the settled entry still holds the key,
        // but it is no longer a live predecessor.
        assert_eq!(registry.len(), 1);
        let second = registry.register(&key());
        assert!(!second.superseded, "a settled predecessor is not live");
        assert!(!first.token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_with_stale_seq_leaves_newer_entry_live() {
        let registry = InflightRegistry::default();
        let first = registry.register(&key());
        let second = registry.register(&key());

        // The superseded loser must not mark the winner's entry settled.
        registry.settle(&key(), first.seq);
        let third = registry.register(&key());
        assert!(third.superseded, "winner was still live");
        assert!(second.token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn linger_release_removes_after_delay() {
        let registry = InflightRegistry::default();
        let reg = registry.register(&key());

        registry.release_after_linger(&key(), reg.seq);
        assert_eq!(registry.len(), 1, "entry lingers until the delay elapses");

        tokio::time::sleep(LINGER * 2).await;
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn linger_release_is_a_noop_after_supersession() {
        let registry = InflightRegistry::default();
        let first = registry.register(&key());
        registry.release_after_linger(&key(), first.seq);

        // A duplicate replaces the entry inside the linger window.
        let _second = registry.register(&key());

        tokio::time::sleep(LINGER * 2).await;
        assert_eq!(registry.len(), 1, "superseding entry must not be evicted");
    }
}
