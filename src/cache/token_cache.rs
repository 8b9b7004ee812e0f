use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::token::Token;
use crate::error::{Error, Result};
use crate::helpers::time::{Clock, SystemClock};
use crate::observability::metrics::get_metrics;
use crate::sources::fetch::FetchToken;
use crate::sources::oauth2::OAuth2Source;

/// Single cached bearer token with single-flight refresh.
///
/// Readers take the `RwLock` and never observe a half-written token. A caller
/// that finds the token invalid takes `refresh_lock`, checks again, and only
/// then hits the token source, so concurrent callers share one refresh.
/// Callers that queued behind a failed attempt get that attempt's error
/// instead of starting their own.
pub struct TokenCache<S = OAuth2Source, C = SystemClock> {
    source: S,
    clock: C,
    safety_margin_seconds: u64,
    current: RwLock<Option<Token>>,
    /// bumped after every finished refresh attempt, read without the lock
    attempts: AtomicU64,
    refresh_lock: Mutex<LastAttempt>,
}

/// Outcome of the most recent refresh attempt, guarded by `refresh_lock`.
#[derive(Default)]
struct LastAttempt {
    generation: u64,
    error: Option<Error>,
}

impl<S: FetchToken, C: Clock> TokenCache<S, C> {
    pub fn new(source: S, clock: C, safety_margin_seconds: u64) -> Self {
        Self {
            source,
            clock,
            safety_margin_seconds,
            current: RwLock::new(None),
            attempts: AtomicU64::new(0),
            refresh_lock: Mutex::new(LastAttempt::default()),
        }
    }

    pub fn shared(source: S, clock: C, safety_margin_seconds: u64) -> Arc<Self> {
        Arc::new(Self::new(source, clock, safety_margin_seconds))
    }

    /// Cached token if still valid, otherwise a freshly acquired one.
    pub async fn get_valid_token(&self) -> Result<Token> {
        if let Some(token) = self.valid_token().await {
            debug!("token cache hit");
            get_metrics().await.token_cache_hits.inc();
            return Ok(token);
        }

        let observed = self.attempts.load(Ordering::SeqCst);
        let mut last = self.refresh_lock.lock().await;
        // another caller may have refreshed while we waited for the lock
        if let Some(token) = self.valid_token().await {
            debug!("token refreshed by concurrent caller");
            return Ok(token);
        }
        if last.generation != observed {
            if let Some(err) = &last.error {
                debug!("sharing failure of concurrent token refresh");
                return Err(err.clone());
            }
        }

        let result = self.refresh().await;
        last.generation += 1;
        last.error = result.as_ref().err().cloned();
        self.attempts.store(last.generation, Ordering::SeqCst);
        result
    }

    /// Snapshot of the held token, valid or not.
    pub async fn current(&self) -> Option<Token> {
        self.current.read().await.clone()
    }

    async fn valid_token(&self) -> Option<Token> {
        let now = self.clock.now();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_valid_at(now))
            .cloned()
    }

    /// Callers must hold `refresh_lock`.
    async fn refresh(&self) -> Result<Token> {
        let metrics = get_metrics().await;
        metrics.token_refresh.inc();
        let issued_at = self.clock.now();

        let issued = match self.source.fetch_token().await {
            Ok(issued) => issued,
            Err(err) => {
                warn!("token refresh failed: {}", err);
                metrics.token_refresh_failures.with_label_values(&[err.reason()]).inc();
                return Err(err);
            }
        };

        let expires_in = issued.expires_in;
        let token = Token::from_issued(issued, issued_at, self.safety_margin_seconds);
        if !token.is_valid_at(issued_at) {
            warn!(
                "token lifetime {}s does not exceed safety margin {}s, it will be refreshed on next use",
                expires_in, self.safety_margin_seconds
            );
        }
        info!("token refreshed, usable until {}", token.expires_at.to_rfc3339());
        metrics.token_expiry_unix.set(token.expires_at.timestamp());

        *self.current.write().await = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::token::IssuedToken;
    use crate::error::Error;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Clone)]
    struct FakeClock(Arc<StdMutex<DateTime<Utc>>>);

    impl FakeClock {
        fn at(now: DateTime<Utc>) -> Self {
            Self(Arc::new(StdMutex::new(now)))
        }

        fn advance(&self, secs: i64) {
            *self.0.lock().unwrap() += Duration::seconds(secs);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Replays scripted responses and counts calls.
    #[derive(Clone, Default)]
    struct FakeSource {
        responses: Arc<StdMutex<VecDeque<Result<IssuedToken>>>>,
        calls: Arc<AtomicUsize>,
        delay_ms: u64,
    }

    impl FakeSource {
        fn push_ok(&self, value: &str, expires_in: i64) {
            self.responses.lock().unwrap().push_back(Ok(IssuedToken {
                access_token: value.to_owned(),
                expires_in,
            }));
        }

        fn push_err(&self, err: Error) {
            self.responses.lock().unwrap().push_back(Err(err));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FetchToken for FakeSource {
        async fn fetch_token(&self) -> Result<IssuedToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::TokenAcquisition("no scripted response".into())))
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn cache_hit_within_margin_adjusted_window() {
        let source = FakeSource::default();
        source.push_ok("first", 3600);
        let clock = FakeClock::at(t0());
        let cache = TokenCache::new(source.clone(), clock.clone(), 60);

        assert_eq!(cache.get_valid_token().await.unwrap().value, "first");
        clock.advance(3500);
        assert_eq!(cache.get_valid_token().await.unwrap().value, "first");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn cache_miss_after_expiry_refreshes_once() {
        let source = FakeSource::default();
        source.push_ok("first", 3600);
        source.push_ok("second", 3600);
        let clock = FakeClock::at(t0());
        let cache = TokenCache::new(source.clone(), clock.clone(), 60);

        cache.get_valid_token().await.unwrap();
        clock.advance(3600);
        assert_eq!(cache.get_valid_token().await.unwrap().value, "second");
        assert_eq!(cache.get_valid_token().await.unwrap().value, "second");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn margin_bounds_validity() {
        let source = FakeSource::default();
        source.push_ok("short", 120);
        source.push_ok("next", 120);
        let clock = FakeClock::at(t0());
        let cache = TokenCache::new(source.clone(), clock.clone(), 60);

        cache.get_valid_token().await.unwrap();
        clock.advance(59);
        assert_eq!(cache.get_valid_token().await.unwrap().value, "short");
        assert_eq!(source.calls(), 1);

        clock.advance(2);
        assert_eq!(cache.get_valid_token().await.unwrap().value, "next");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn failure_is_not_cached_and_keeps_previous_state() {
        let source = FakeSource::default();
        source.push_err(Error::TokenAcquisition("malformed token response".into()));
        source.push_ok("recovered", 3600);
        let cache = TokenCache::new(source.clone(), FakeClock::at(t0()), 60);

        let err = cache.get_valid_token().await.unwrap_err();
        assert!(matches!(err, Error::TokenAcquisition(_)));
        assert!(cache.current().await.is_none());

        assert_eq!(cache.get_valid_token().await.unwrap().value, "recovered");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_leaves_expired_token_untouched() {
        let source = FakeSource::default();
        source.push_ok("old", 120);
        source.push_err(Error::UpstreamTimeout("slow".into()));
        let clock = FakeClock::at(t0());
        let cache = TokenCache::new(source.clone(), clock.clone(), 60);

        let old = cache.get_valid_token().await.unwrap();
        clock.advance(120);
        assert!(cache.get_valid_token().await.is_err());
        assert_eq!(cache.current().await, Some(old));
    }

    #[tokio::test]
    async fn zero_lifetime_token_is_refreshed_on_next_call() {
        let source = FakeSource::default();
        source.push_ok("zero", 0);
        source.push_ok("negative", -30);
        source.push_ok("good", 3600);
        let cache = TokenCache::new(source.clone(), FakeClock::at(t0()), 60);

        assert_eq!(cache.get_valid_token().await.unwrap().value, "zero");
        assert_eq!(cache.get_valid_token().await.unwrap().value, "negative");
        assert_eq!(cache.get_valid_token().await.unwrap().value, "good");
        assert_eq!(cache.get_valid_token().await.unwrap().value, "good");
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_failed_refresh() {
        let source = FakeSource { delay_ms: 200, ..FakeSource::default() };
        source.push_err(Error::TokenAcquisition("token endpoint responded 503".into()));
        source.push_ok("after-outage", 3600);
        let cache = TokenCache::shared(source.clone(), FakeClock::at(t0()), 60);

        let started = std::time::Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_valid_token().await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::TokenAcquisition(_)), "{:?}", err);
        }
        assert_eq!(source.calls(), 1);
        assert!(started.elapsed() < std::time::Duration::from_secs(1), "{:?}", started.elapsed());

        // a later caller starts a new attempt
        assert_eq!(cache.get_valid_token().await.unwrap().value, "after-outage");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let source = FakeSource { delay_ms: 50, ..FakeSource::default() };
        source.push_ok("shared", 3600);
        source.push_ok("unexpected", 3600);
        let cache = TokenCache::shared(source.clone(), FakeClock::at(t0()), 60);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_valid_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().value, "shared");
        }
        assert_eq!(source.calls(), 1);
    }
}
