use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tinylink_core::error::Result;
use tinylink_core::{Claim, MappingBackend, ShortCode, SuffixChain};
use tracing::{debug, trace};

/// Forward index entry for a code.
#[derive(Debug, Clone)]
struct Entry {
    long_url: String,
    expire_at: Option<Timestamp>,
}

impl Entry {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expire_at.is_none_or(|expire_at| now < expire_at)
    }
}

#[derive(Debug, Default)]
struct Indexes {
    forward: HashMap<ShortCode, Entry>,
    reverse: HashMap<String, ShortCode>,
    last_purge: Option<Timestamp>,
}

impl Indexes {
    fn live_url(&self, code: &ShortCode, now: Timestamp) -> Option<&str> {
        self.forward
            .get(code)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.long_url.as_str())
    }

    /// The reverse entry only counts while the forward entry it points at is
    /// live and still maps back to the same URL.
    fn live_code(&self, long_url: &str, now: Timestamp) -> Option<&ShortCode> {
        let code = self.reverse.get(long_url)?;
        (self.live_url(code, now) == Some(long_url)).then_some(code)
    }

    fn insert(&mut self, code: &ShortCode, long_url: &str, expire_at: Option<Timestamp>) {
        let entry = Entry {
            long_url: long_url.to_owned(),
            expire_at,
        };

        // Overwriting a code orphans the reverse entry of its previous URL.
        if let Some(old) = self.forward.insert(code.clone(), entry) {
            if old.long_url != long_url && self.reverse.get(&old.long_url) == Some(code) {
                self.reverse.remove(&old.long_url);
            }
        }

        // One code per URL: drop the forward entry the URL pointed at before.
        if let Some(previous) = self.reverse.insert(long_url.to_owned(), code.clone()) {
            if &previous != code
                && self
                    .forward
                    .get(&previous)
                    .is_some_and(|entry| entry.long_url == long_url)
            {
                self.forward.remove(&previous);
            }
        }
    }

    fn purge_due(&self, now: Timestamp, interval: SignedDuration) -> bool {
        self.last_purge
            .is_none_or(|last| last.checked_add(interval).is_ok_and(|due| now >= due))
    }

    fn purge_expired(&mut self, now: Timestamp) -> usize {
        self.last_purge = Some(now);
        let before = self.forward.len();
        self.forward.retain(|_, entry| entry.is_live(now));
        let forward = &self.forward;
        self.reverse
            .retain(|long_url, code| forward.get(code).is_some_and(|e| &e.long_url == long_url));
        before - self.forward.len()
    }
}

/// Expiry instant for a mapping written at `now`. TTLs reaching past the
/// largest representable timestamp are clamped to it.
fn expire_at(now: Timestamp, ttl: Option<Duration>) -> Option<Timestamp> {
    ttl.map(|ttl| {
        SignedDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl).ok())
            .unwrap_or(Timestamp::MAX)
    })
}

/// How often [`MappingBackend::claim`] sweeps expired mappings by default.
const DEFAULT_PURGE_INTERVAL: SignedDuration = SignedDuration::from_secs(60);

/// In-memory implementation of [`MappingBackend`].
///
/// Both indexes sit behind one reader/writer lock, so a write is never seen
/// half-applied. [`MappingBackend::claim`] takes the write lock once for the
/// whole check, resolve and write sequence, which keeps concurrent first-time
/// shortening of the same URL down to a single code.
///
/// Mappings never expire unless the backend is built with [`with_ttl`](Self::with_ttl).
/// Expired entries read as absent. `claim` also sweeps them out of both
/// indexes, at most once per purge interval.
#[derive(Debug)]
pub struct InMemoryBackend {
    indexes: RwLock<Indexes>,
    ttl: Option<Duration>,
    purge_interval: SignedDuration,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            indexes: RwLock::default(),
            ttl: None,
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

impl InMemoryBackend {
    /// Creates a new in-memory backend whose mappings live for the process lifetime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend whose mappings expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Sets the minimum time between two sweeps of expired mappings.
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = SignedDuration::try_from(interval).unwrap_or(SignedDuration::MAX);
        self
    }

    /// Number of entries in the forward index, expired ones included.
    pub fn len(&self) -> usize {
        self.indexes.read().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired mappings from both indexes and returns how many codes were dropped.
    pub fn purge_expired(&self) -> usize {
        let purged = self.indexes.write().purge_expired(Timestamp::now());
        if purged > 0 {
            debug!(purged, "Purged expired mappings");
        }
        purged
    }
}

#[async_trait]
impl MappingBackend for InMemoryBackend {
    async fn get_by_code(&self, code: &ShortCode) -> Result<Option<String>> {
        let indexes = self.indexes.read();
        Ok(indexes.live_url(code, Timestamp::now()).map(str::to_owned))
    }

    async fn get_by_url(&self, long_url: &str) -> Result<Option<ShortCode>> {
        let indexes = self.indexes.read();
        Ok(indexes.live_code(long_url, Timestamp::now()).cloned())
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let indexes = self.indexes.read();
        Ok(indexes.live_url(code, Timestamp::now()).is_some())
    }

    async fn put(&self, code: &ShortCode, long_url: &str, ttl: Option<Duration>) -> Result<()> {
        let now = Timestamp::now();
        self.indexes
            .write()
            .insert(code, long_url, expire_at(now, ttl));
        trace!(code = %code, "Stored mapping in memory");
        Ok(())
    }

    fn mapping_ttl(&self) -> Option<Duration> {
        self.ttl
    }

    async fn claim(
        &self,
        long_url: &str,
        chain: SuffixChain,
        ttl: Option<Duration>,
    ) -> Result<Claim> {
        let now = Timestamp::now();
        let expire_at = expire_at(now, ttl);
        let candidate = chain.peek().map(ToString::to_string).unwrap_or_default();
        let max_suffix = chain.max_suffix();

        let mut indexes = self.indexes.write();
        if indexes.purge_due(now, self.purge_interval) {
            let purged = indexes.purge_expired(now);
            if purged > 0 {
                debug!(purged, "Purged expired mappings");
            }
        }

        if let Some(code) = indexes.live_code(long_url, now) {
            return Ok(Claim::Reused(code.clone()));
        }

        let Some(code) = chain.first_free(|code| indexes.live_url(code, now).is_some()) else {
            return Ok(Claim::Exhausted {
                candidate,
                max_suffix,
            });
        };

        indexes.insert(&code, long_url, expire_at);
        drop(indexes);

        if code.as_str() != candidate {
            debug!(code = %code, candidate = %candidate, "Resolved code collision");
        }
        Ok(Claim::Created(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tinylink_core::CollisionResolver;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn chain(candidate: &str) -> SuffixChain {
        CollisionResolver::default().chain(code(candidate))
    }

    #[tokio::test]
    async fn put_and_get_both_directions() {
        let backend = InMemoryBackend::new();

        backend
            .put(&code("abc123"), "https://example.com", None)
            .await
            .unwrap();

        assert_eq!(
            backend.get_by_code(&code("abc123")).await.unwrap(),
            Some("https://example.com".to_string())
        );
        assert_eq!(
            backend.get_by_url("https://example.com").await.unwrap(),
            Some(code("abc123"))
        );
        assert!(backend.exists(&code("abc123")).await.unwrap());
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let backend = InMemoryBackend::new();

        assert!(backend.get_by_code(&code("nope")).await.unwrap().is_none());
        assert!(backend.get_by_url("https://nope.example").await.unwrap().is_none());
        assert!(!backend.exists(&code("nope")).await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn expired_entry_is_absent_in_both_directions() {
        let backend = InMemoryBackend::new();

        backend
            .put(&code("abc"), "https://example.com", Some(Duration::ZERO))
            .await
            .unwrap();

        assert!(backend.get_by_code(&code("abc")).await.unwrap().is_none());
        assert!(backend.get_by_url("https://example.com").await.unwrap().is_none());
        assert!(!backend.exists(&code("abc")).await.unwrap());
    }

    #[tokio::test]
    async fn not_expired_entry() {
        let backend = InMemoryBackend::new();

        backend
            .put(&code("abc"), "https://example.com", Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        assert_eq!(
            backend.get_by_code(&code("abc")).await.unwrap(),
            Some("https://example.com".to_string())
        );
    }

    #[tokio::test]
    async fn overwriting_a_code_drops_stale_reverse_entry() {
        let backend = InMemoryBackend::new();

        backend
            .put(&code("abc"), "https://old.example", Some(Duration::ZERO))
            .await
            .unwrap();
        backend
            .put(&code("abc"), "https://new.example", None)
            .await
            .unwrap();

        assert!(backend.get_by_url("https://old.example").await.unwrap().is_none());
        assert_eq!(
            backend.get_by_url("https://new.example").await.unwrap(),
            Some(code("abc"))
        );
    }

    #[tokio::test]
    async fn remapping_a_url_drops_its_previous_code() {
        let backend = InMemoryBackend::new();

        backend
            .put(&code("abc"), "https://example.com", None)
            .await
            .unwrap();
        backend
            .put(&code("def"), "https://example.com", None)
            .await
            .unwrap();

        assert!(!backend.exists(&code("abc")).await.unwrap());
        assert_eq!(
            backend.get_by_url("https://example.com").await.unwrap(),
            Some(code("def"))
        );
    }

    #[tokio::test]
    async fn claim_creates_then_reuses() {
        let backend = InMemoryBackend::new();

        let first = backend
            .claim("https://example.com", chain("abc"), None)
            .await
            .unwrap();
        let second = backend
            .claim("https://example.com", chain("abc"), None)
            .await
            .unwrap();

        assert_eq!(first, Claim::Created(code("abc")));
        assert_eq!(second, Claim::Reused(code("abc")));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn claim_appends_suffix_on_collision() {
        let backend = InMemoryBackend::new();

        backend
            .claim("https://one.example", chain("abc"), None)
            .await
            .unwrap();
        let second = backend
            .claim("https://two.example", chain("abc"), None)
            .await
            .unwrap();
        let third = backend
            .claim("https://three.example", chain("abc"), None)
            .await
            .unwrap();

        assert_eq!(second, Claim::Created(code("abcx")));
        assert_eq!(third, Claim::Created(code("abcxx")));
        assert_eq!(
            backend.get_by_code(&code("abcx")).await.unwrap(),
            Some("https://two.example".to_string())
        );
    }

    #[tokio::test]
    async fn claim_reuses_expired_code() {
        let backend = InMemoryBackend::new();

        backend
            .claim("https://one.example", chain("abc"), Some(Duration::ZERO))
            .await
            .unwrap();
        let claim = backend
            .claim("https://two.example", chain("abc"), None)
            .await
            .unwrap();

        assert_eq!(claim, Claim::Created(code("abc")));
        assert!(backend.get_by_url("https://one.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_reports_exhaustion() {
        let backend = InMemoryBackend::new();
        let resolver = CollisionResolver::builder().max_suffix(1).build();

        for url in ["https://one.example", "https://two.example"] {
            backend
                .claim(url, resolver.chain(code("abc")), None)
                .await
                .unwrap();
        }
        let claim = backend
            .claim("https://three.example", resolver.chain(code("abc")), None)
            .await
            .unwrap();

        assert_eq!(
            claim,
            Claim::Exhausted {
                candidate: "abc".to_string(),
                max_suffix: 1
            }
        );
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn purge_expired_cleans_both_indexes() {
        let backend = InMemoryBackend::new();

        backend
            .put(&code("old"), "https://old.example", Some(Duration::ZERO))
            .await
            .unwrap();
        backend
            .put(&code("new"), "https://new.example", None)
            .await
            .unwrap();

        assert_eq!(backend.purge_expired(), 1);
        assert_eq!(backend.len(), 1);
        assert_eq!(
            backend.get_by_url("https://new.example").await.unwrap(),
            Some(code("new"))
        );
    }

    #[tokio::test]
    async fn claim_sweeps_expired_mappings() {
        let backend = InMemoryBackend::with_ttl(Duration::from_millis(1))
            .with_purge_interval(Duration::ZERO);

        backend
            .claim("https://one.example", chain("one"), backend.mapping_ttl())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        backend
            .claim("https://two.example", chain("two"), backend.mapping_ttl())
            .await
            .unwrap();

        assert_eq!(backend.len(), 1);
        assert!(backend.get_by_url("https://one.example").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_does_not_sweep_before_interval() {
        let backend = InMemoryBackend::new();

        backend
            .put(&code("old"), "https://old.example", Some(Duration::ZERO))
            .await
            .unwrap();
        backend
            .claim("https://one.example", chain("one"), None)
            .await
            .unwrap();
        assert_eq!(backend.len(), 1);

        backend
            .put(&code("stale"), "https://stale.example", Some(Duration::ZERO))
            .await
            .unwrap();
        backend
            .claim("https://two.example", chain("two"), None)
            .await
            .unwrap();
        assert_eq!(backend.len(), 3);
    }

    #[tokio::test]
    async fn unrepresentable_ttl_never_expires() {
        let backend = InMemoryBackend::with_ttl(Duration::from_secs(u64::MAX));

        let claim = backend
            .claim("https://example.com", chain("abc"), backend.mapping_ttl())
            .await
            .unwrap();
        assert_eq!(claim, Claim::Created(code("abc")));

        backend
            .put(&code("def"), "https://other.example", Some(Duration::MAX))
            .await
            .unwrap();
        assert_eq!(
            backend.get_by_url("https://example.com").await.unwrap(),
            Some(code("abc"))
        );
        assert!(backend.exists(&code("def")).await.unwrap());
    }

    #[test]
    fn expire_at_clamps_to_max_timestamp() {
        let now = Timestamp::now();
        assert_eq!(expire_at(now, None), None);
        assert_eq!(
            expire_at(now, Some(Duration::from_secs(u64::MAX))),
            Some(Timestamp::MAX)
        );
        assert_eq!(
            expire_at(now, Some(Duration::from_secs(60))),
            now.checked_add(SignedDuration::from_secs(60)).ok()
        );
    }

    #[tokio::test]
    async fn mapping_ttl_reflects_construction() {
        assert_eq!(InMemoryBackend::new().mapping_ttl(), None);
        assert_eq!(
            InMemoryBackend::with_ttl(Duration::from_secs(60)).mapping_ttl(),
            Some(Duration::from_secs(60))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_for_same_url_agree() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut handles = vec![];

        for _ in 0..32 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                backend
                    .claim("https://example.com/race", chain("race"), None)
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            let claim = handle.await.unwrap();
            assert_eq!(claim.code(), Some(&code("race")));
            if matches!(claim, Claim::Created(_)) {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(backend.len(), 1);
    }
}
