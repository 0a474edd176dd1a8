//! Per-domain rate limiting
//!
//! This module handles:
//! - Per-domain concurrency limiting via semaphores
//! - A minimum spacing between dispatches to the same domain (fixed delay plus
//!   random jitter)
//! - Per-domain request counting
//! - Evicting domains that have gone idle
//! - Wrapping any `PageFetcher` so every fetch goes through the limiter
//!
//! Every wait in here races the run's `CancellationToken`; a cancelled wait
//! never turns into a dispatch.

use crate::config::RateLimitConfig;
use crate::crawler::fetcher::{FetchError, PageFetcher, RetryPolicy};
use crate::url::extract_domain;
use crate::UrlError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Throttling state for one domain
#[derive(Debug)]
struct DomainSlot {
    /// In-flight request permits
    permits: Arc<Semaphore>,

    /// Earliest instant the next request may be dispatched
    next_dispatch: Mutex<Instant>,

    /// Number of requests dispatched so far
    request_count: AtomicU64,
}

impl DomainSlot {
    fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            next_dispatch: Mutex::new(Instant::now()),
            request_count: AtomicU64::new(0),
        }
    }

    /// No request in flight, nobody waiting, and the spacing has run out
    fn is_idle(&self, concurrency: usize, now: Instant) -> bool {
        self.permits.available_permits() == concurrency
            && *self
                .next_dispatch
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                <= now
    }
}

/// Proof that a request may be in flight; dropping it frees the slot
#[derive(Debug)]
pub struct DispatchPermit {
    _permit: OwnedSemaphorePermit,
}

/// Per-domain concurrency cap and dispatch spacing
///
/// Each domain gets `concurrency` permits. Acquiring a permit additionally
/// waits until the domain's next dispatch instant, then pushes that instant
/// forward by `delay + uniform(0..=jitter)`, so consecutive requests to one
/// domain are always at least `delay` apart.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitConfig,
    slots: Mutex<HashMap<String, Arc<DomainSlot>>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `policy` on every domain
    pub fn new(policy: RateLimitConfig) -> Self {
        Self {
            policy,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The policy this limiter enforces
    pub fn policy(&self) -> RateLimitConfig {
        self.policy
    }

    fn concurrency(&self) -> usize {
        self.policy.concurrency.max(1) as usize
    }

    /// Looks up (or creates) the slot for `domain`
    ///
    /// Creating a slot first drops every other slot that has gone idle, so
    /// the map only holds domains that still constrain a future dispatch.
    fn slot(&self, domain: &str) -> Arc<DomainSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(domain) {
            return slot.clone();
        }

        let concurrency = self.concurrency();
        let now = Instant::now();
        let before = slots.len();
        // A held Arc means some task is between lookup and dispatch
        slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1 || !slot.is_idle(concurrency, now)
        });
        if slots.len() < before {
            tracing::trace!("Evicted {} idle domain(s)", before - slots.len());
        }

        let slot = Arc::new(DomainSlot::new(concurrency));
        slots.insert(domain.to_string(), slot.clone());
        slot
    }

    /// Picks the gap that follows one dispatch
    fn spacing(&self) -> Duration {
        let jitter = if self.policy.jitter_ms > 0 {
            fastrand::u64(0..=self.policy.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.policy.delay_ms + jitter)
    }

    /// Waits until a request to `domain` may be dispatched
    ///
    /// # Returns
    ///
    /// * `Some(DispatchPermit)` - Hold it for the duration of the request
    /// * `None` - `cancel` tripped while waiting; nothing may be dispatched
    pub async fn acquire(
        &self,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Option<DispatchPermit> {
        let slot = self.slot(domain);
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            permit = slot.permits.clone().acquire_owned() => permit.ok()?,
        };

        let wait = {
            let mut next = slot
                .next_dispatch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let start = (*next).max(now);
            *next = start + self.spacing();
            start - now
        };

        if !wait.is_zero() {
            tracing::trace!("Throttling {} for {:?}", domain, wait);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        if cancel.is_cancelled() {
            return None;
        }

        slot.request_count.fetch_add(1, Ordering::Relaxed);

        Some(DispatchPermit { _permit: permit })
    }

    /// Number of requests dispatched to `domain` since its slot was created
    pub fn request_count(&self, domain: &str) -> u64 {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(domain)
            .map(|slot| slot.request_count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Number of domains currently tracked
    pub fn domain_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A `PageFetcher` that routes every request through a `RateLimiter`
///
/// Retries re-enter the limiter, so a retried request still honours the
/// domain's concurrency cap and spacing. Once `cancel` trips, fetches end
/// with `FetchError::Cancelled` instead of reaching the inner fetcher.
pub struct RateLimitedFetcher {
    inner: Arc<dyn PageFetcher>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl RateLimitedFetcher {
    pub fn new(
        inner: Arc<dyn PageFetcher>,
        policy: RateLimitConfig,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            limiter: RateLimiter::new(policy),
            retry,
            cancel,
        }
    }

    /// The limiter guarding this fetcher
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[async_trait]
impl PageFetcher for RateLimitedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            source: UrlError::Parse(e.to_string()),
        })?;
        let domain = extract_domain(&parsed).ok_or_else(|| FetchError::InvalidUrl {
            url: url.to_string(),
            source: UrlError::MissingDomain,
        })?;
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };

        let mut attempt = 1;
        loop {
            let result = {
                let _permit = self
                    .limiter
                    .acquire(&domain, &self.cancel)
                    .await
                    .ok_or_else(cancelled)?;
                self.inner.fetch(url).await
            };

            match result {
                Err(error) if self.retry.should_retry(attempt, &error) => {
                    let backoff = self.retry.backoff(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        error,
                        backoff
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(cancelled()),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
