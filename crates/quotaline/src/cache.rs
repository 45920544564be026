//! Decides whether the persisted usage snapshot can be trusted, and refreshes
//! it from the API when it cannot.

use crate::activity::ActivitySignal;
use crate::config::CacheConfig;
use crate::credentials::TokenSource;
use crate::error::{QuotalineError, Result};
use crate::fetcher::{UsageFetcher, UsageTransport};
use crate::store::{SnapshotStore, UsageSnapshot};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Three-signal freshness policy.
///
/// Checked in order: malformed snapshots are stale; anything younger than
/// `min_refetch` is valid; anything at least `max_age` old is stale; in
/// between, the snapshot is stale only if the activity signal is newer than
/// the capture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreshnessPolicy {
    pub min_refetch: Duration,
    pub max_age: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            min_refetch: Duration::seconds(30),
            max_age: Duration::minutes(2),
        }
    }
}

impl From<&CacheConfig> for FreshnessPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            min_refetch: seconds(config.min_refetch_secs),
            max_age: seconds(config.max_age_secs),
        }
    }
}

fn seconds(secs: u64) -> Duration {
    // Duration::seconds panics past i64::MAX milliseconds.
    Duration::seconds(secs.min(i64::MAX as u64 / 1000) as i64)
}

impl FreshnessPolicy {
    pub fn is_valid(
        &self,
        snapshot: &UsageSnapshot,
        now: DateTime<Utc>,
        activity: &dyn ActivitySignal,
    ) -> bool {
        if !snapshot.is_well_formed() {
            return false;
        }
        let Some(captured_at) = snapshot.captured_at() else {
            return false;
        };

        // Negative when the clock went backwards; that counts as fresh.
        let age = now - captured_at;
        if age < self.min_refetch {
            return true;
        }
        if age >= self.max_age {
            return false;
        }

        match activity.last_activity() {
            Some(last) if last > captured_at => {
                debug!("activity at {} is newer than snapshot from {}", last, captured_at);
                false
            }
            _ => true,
        }
    }
}

/// Get-cached-or-fetch over a single snapshot file.
pub struct UsageCache<T, S> {
    store: SnapshotStore,
    fetcher: UsageFetcher<T, S>,
    activity: Box<dyn ActivitySignal>,
    policy: FreshnessPolicy,
}

impl<T: UsageTransport, S: TokenSource> UsageCache<T, S> {
    pub fn new(
        store: SnapshotStore,
        fetcher: UsageFetcher<T, S>,
        activity: Box<dyn ActivitySignal>,
        policy: FreshnessPolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            activity,
            policy,
        }
    }

    #[cfg(test)]
    pub(crate) fn fetcher(&self) -> &UsageFetcher<T, S> {
        &self.fetcher
    }

    /// Return the cached snapshot when it is still valid, otherwise fetch and
    /// persist a new one. Persistence failures are logged, not returned.
    pub async fn resolve(&self, now: DateTime<Utc>) -> Result<UsageSnapshot> {
        match self.store.load() {
            Ok(snapshot) if self.policy.is_valid(&snapshot, now, self.activity.as_ref()) => {
                debug!("using cached usage from {}", self.store.path().display());
                return Ok(snapshot);
            }
            Ok(_) => debug!("cached usage is stale"),
            Err(e) => debug!("no usable cache at {}: {}", self.store.path().display(), e),
        }

        let snapshot = self
            .fetcher
            .fetch(now)
            .await
            .map_err(|e| QuotalineError::Fetch(Box::new(e)))?;

        if let Err(e) = self.store.save(&snapshot) {
            warn!("failed to save cache: {}", e);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::NoActivity;
    use crate::fetcher::tests::{FakeTransport, StaticToken, FULL_RESPONSE};
    use std::cell::Cell;
    use std::fs;

    const NOW: i64 = 1_767_600_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    fn snapshot_aged(age_secs: i64) -> UsageSnapshot {
        UsageSnapshot {
            resets_at: "2026-01-05T15:00:00Z".to_string(),
            utilization: 45.0,
            weekly_utilization: 10.0,
            weekly_resets_at: "2026-01-10T00:00:00Z".to_string(),
            cached_at: NOW - age_secs,
        }
    }

    /// Activity signal that remembers how often it was consulted.
    struct ActivityAt {
        at: Option<DateTime<Utc>>,
        lookups: Cell<usize>,
    }

    impl ActivityAt {
        fn new(at: Option<DateTime<Utc>>) -> Self {
            Self {
                at,
                lookups: Cell::new(0),
            }
        }

        fn secs_ago(secs: i64) -> Self {
            Self::new(Some(now() - Duration::seconds(secs)))
        }
    }

    impl ActivitySignal for ActivityAt {
        fn last_activity(&self) -> Option<DateTime<Utc>> {
            self.lookups.set(self.lookups.get() + 1);
            self.at
        }
    }

    fn is_valid(snapshot: &UsageSnapshot, activity: &dyn ActivitySignal) -> bool {
        FreshnessPolicy::default().is_valid(snapshot, now(), activity)
    }

    #[test]
    fn test_never_populated_snapshot_is_stale() {
        assert!(!is_valid(&UsageSnapshot::default(), &NoActivity));
        let unset = UsageSnapshot {
            cached_at: 0,
            ..snapshot_aged(0)
        };
        assert!(!is_valid(&unset, &NoActivity));
    }

    #[test]
    fn test_empty_reset_is_stale_at_any_age() {
        for age in [0, 10, 60, 500] {
            let snapshot = UsageSnapshot {
                resets_at: String::new(),
                ..snapshot_aged(age)
            };
            assert!(!is_valid(&snapshot, &NoActivity), "age {}", age);
        }
    }

    #[test]
    fn test_young_snapshot_ignores_activity() {
        for age in [0, 1, 15, 29] {
            let activity = ActivityAt::new(Some(now()));
            assert!(is_valid(&snapshot_aged(age), &activity), "age {}", age);
            assert_eq!(activity.lookups.get(), 0);
        }
    }

    #[test]
    fn test_old_snapshot_is_stale_without_activity() {
        for age in [120, 121, 3600] {
            assert!(!is_valid(&snapshot_aged(age), &NoActivity), "age {}", age);
            let activity = ActivityAt::new(None);
            assert!(!is_valid(&snapshot_aged(age), &activity));
            assert_eq!(activity.lookups.get(), 0);
        }
    }

    #[test]
    fn test_gray_zone_follows_activity() {
        for age in [30, 60, 119] {
            // Unavailable signal: time alone decides.
            assert!(is_valid(&snapshot_aged(age), &ActivityAt::new(None)));

            // Activity after capture.
            let newer = ActivityAt::secs_ago(age - 1);
            assert!(!is_valid(&snapshot_aged(age), &newer), "age {}", age);
            assert_eq!(newer.lookups.get(), 1);

            // Activity before capture, or exactly at it.
            assert!(is_valid(&snapshot_aged(age), &ActivityAt::secs_ago(age + 5)));
            assert!(is_valid(&snapshot_aged(age), &ActivityAt::secs_ago(age)));
        }
    }

    #[test]
    fn test_sub_second_activity_after_capture_is_newer() {
        let activity = ActivityAt::new(Some(
            now() - Duration::seconds(60) + Duration::milliseconds(250),
        ));
        assert!(!is_valid(&snapshot_aged(60), &activity));
    }

    #[test]
    fn test_future_capture_time_is_fresh() {
        let activity = ActivityAt::new(Some(now()));
        assert!(is_valid(&snapshot_aged(-600), &activity));
        assert_eq!(activity.lookups.get(), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = FreshnessPolicy::from(&CacheConfig::default());
        assert_eq!(policy, FreshnessPolicy::default());

        let custom = FreshnessPolicy::from(&CacheConfig {
            min_refetch_secs: 5,
            max_age_secs: u64::MAX,
        });
        assert_eq!(custom.min_refetch, Duration::seconds(5));
        assert!(custom.max_age > Duration::days(365));
    }

    fn usage_cache(
        dir: &tempfile::TempDir,
        transport: FakeTransport,
        token: Option<&'static str>,
    ) -> UsageCache<FakeTransport, StaticToken> {
        UsageCache::new(
            SnapshotStore::new(dir.path().join("cache.json")),
            UsageFetcher::new(transport, StaticToken(token), "http://usage.test/api"),
            Box::new(NoActivity),
            FreshnessPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_resolve_uses_valid_cache_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = usage_cache(&dir, FakeTransport::ok(FULL_RESPONSE), Some("tok"));
        SnapshotStore::new(dir.path().join("cache.json"))
            .save(&snapshot_aged(10))
            .unwrap();

        let snapshot = cache.resolve(now()).await.unwrap();
        assert_eq!(snapshot, snapshot_aged(10));
        assert_eq!(cache.fetcher().transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_fetches_and_persists_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = usage_cache(&dir, FakeTransport::ok(FULL_RESPONSE), Some("tok"));

        let snapshot = cache.resolve(now()).await.unwrap();
        assert_eq!(snapshot.utilization, 45.0);
        assert_eq!(snapshot.cached_at, NOW);
        assert_eq!(cache.fetcher().transport().calls(), 1);

        let saved = SnapshotStore::new(dir.path().join("cache.json")).load().unwrap();
        assert_eq!(saved, snapshot);

        // Second call within the refetch floor is served from disk.
        cache.resolve(now() + Duration::seconds(5)).await.unwrap();
        assert_eq!(cache.fetcher().transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_refetches_stale_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = usage_cache(&dir, FakeTransport::ok(FULL_RESPONSE), Some("tok"));
        SnapshotStore::new(dir.path().join("cache.json"))
            .save(&snapshot_aged(600))
            .unwrap();

        let snapshot = cache.resolve(now()).await.unwrap();
        assert_eq!(snapshot.cached_at, NOW);
        assert_eq!(cache.fetcher().transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_refetches_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cache.json"), "garbage").unwrap();
        let cache = usage_cache(&dir, FakeTransport::ok(FULL_RESPONSE), Some("tok"));

        assert!(cache.resolve(now()).await.is_ok());
        assert_eq!(cache.fetcher().transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_wraps_fetch_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = usage_cache(&dir, FakeTransport::replying(500, ""), Some("tok"));

        let err = cache.resolve(now()).await.unwrap_err();
        match err {
            QuotalineError::Fetch(inner) => assert!(matches!(*inner, QuotalineError::Status(500))),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("cache.json").exists());
    }

    #[tokio::test]
    async fn test_resolve_does_not_retry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = usage_cache(&dir, FakeTransport::failing(), Some("tok"));

        assert!(cache.resolve(now()).await.is_err());
        assert_eq!(cache.fetcher().transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_survives_save_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let cache = UsageCache::new(
            SnapshotStore::new(blocker.join("cache.json")),
            UsageFetcher::new(
                FakeTransport::ok(FULL_RESPONSE),
                StaticToken(Some("tok")),
                "http://usage.test/api",
            ),
            Box::new(NoActivity),
            FreshnessPolicy::default(),
        );

        let snapshot = cache.resolve(now()).await.unwrap();
        assert_eq!(snapshot.utilization, 45.0);
    }
}
