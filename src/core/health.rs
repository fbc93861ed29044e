//! C2 — Health Cache.
//!
//! The snapshot is installed atomically by the poller and read by every
//! worker before every dispatch. `arc_swap::ArcSwap` gives single-writer
//! replace with lock-free, always-complete reads — no reader ever observes
//! a half-updated pair of routes.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Default,
    Fallback,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Default => "default",
            Route::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSource {
    Ok,
    Error,
}

#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub failing: bool,
    /// `None` represents +∞ (unknown / errored route).
    pub min_response_time_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
    pub source: HealthSource,
}

impl HealthRecord {
    pub fn optimistic(now: DateTime<Utc>) -> Self {
        HealthRecord {
            failing: false,
            min_response_time_ms: Some(0),
            checked_at: now,
            source: HealthSource::Ok,
        }
    }

    /// Error record policy: biases routing against unknown state without
    /// flapping `checked_at` — it carries forward the previous observation
    /// time rather than restarting the clock on every failed poll.
    pub fn error(previous: Option<&HealthRecord>, now: DateTime<Utc>) -> Self {
        HealthRecord {
            failing: true,
            min_response_time_ms: None,
            checked_at: previous.map(|p| p.checked_at).unwrap_or(now),
            source: HealthSource::Error,
        }
    }

    /// Pure over the current record: healthy iff not failing and faster
    /// than the configured slow threshold.
    pub fn is_healthy(&self, slow_threshold_ms: u64) -> bool {
        !self.failing
            && self
                .min_response_time_ms
                .is_some_and(|ms| ms < slow_threshold_ms)
    }
}

#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub default: HealthRecord,
    pub fallback: HealthRecord,
}

impl HealthSnapshot {
    pub fn optimistic(now: DateTime<Utc>) -> Self {
        HealthSnapshot {
            default: HealthRecord::optimistic(now),
            fallback: HealthRecord::optimistic(now),
        }
    }

    pub fn record(&self, route: Route) -> &HealthRecord {
        match route {
            Route::Default => &self.default,
            Route::Fallback => &self.fallback,
        }
    }
}

pub struct HealthCache {
    snapshot: ArcSwap<HealthSnapshot>,
}

impl HealthCache {
    pub fn new() -> Self {
        HealthCache {
            snapshot: ArcSwap::from_pointee(HealthSnapshot::optimistic(Utc::now())),
        }
    }

    /// Lock-free read of the whole, internally-consistent snapshot.
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.snapshot.load_full()
    }

    /// Atomic whole-snapshot replace.
    pub fn replace(&self, snapshot: HealthSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Convenience setter: replace one route, keep the other as-is.
    pub fn update_route(&self, route: Route, record: HealthRecord) {
        let current = self.snapshot.load();
        let next = match route {
            Route::Default => HealthSnapshot {
                default: record,
                fallback: current.fallback.clone(),
            },
            Route::Fallback => HealthSnapshot {
                default: current.default.clone(),
                fallback: record,
            },
        };
        self.snapshot.store(Arc::new(next));
    }
}

impl Default for HealthCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_optimistic_and_healthy() {
        let cache = HealthCache::new();
        let snap = cache.snapshot();
        assert!(snap.default.is_healthy(30));
        assert!(snap.fallback.is_healthy(30));
    }

    #[test]
    fn is_healthy_is_pure_over_the_fixed_snapshot() {
        let healthy = HealthRecord {
            failing: false,
            min_response_time_ms: Some(10),
            checked_at: Utc::now(),
            source: HealthSource::Ok,
        };
        assert!(healthy.is_healthy(30));
        assert!(!healthy.is_healthy(5));

        let failing = HealthRecord {
            failing: true,
            min_response_time_ms: Some(1),
            checked_at: Utc::now(),
            source: HealthSource::Ok,
        };
        assert!(!failing.is_healthy(30));

        let unknown = HealthRecord {
            failing: false,
            min_response_time_ms: None,
            checked_at: Utc::now(),
            source: HealthSource::Error,
        };
        assert!(!unknown.is_healthy(30));
    }

    #[test]
    fn error_record_preserves_previous_checked_at() {
        let now = Utc::now();
        let previous = HealthRecord::optimistic(now);
        let later = now + chrono::Duration::seconds(10);
        let err = HealthRecord::error(Some(&previous), later);
        assert_eq!(err.checked_at, now);
        assert!(err.failing);
        assert_eq!(err.min_response_time_ms, None);
    }

    #[test]
    fn error_record_without_previous_uses_now() {
        let now = Utc::now();
        let err = HealthRecord::error(None, now);
        assert_eq!(err.checked_at, now);
    }

    #[test]
    fn update_route_leaves_other_route_untouched() {
        let cache = HealthCache::new();
        let fallback_before = cache.snapshot().fallback.clone();
        cache.update_route(
            Route::Default,
            HealthRecord::error(None, Utc::now()),
        );
        let snap = cache.snapshot();
        assert!(snap.default.failing);
        assert_eq!(
            snap.fallback.checked_at,
            fallback_before.checked_at
        );
    }
}
