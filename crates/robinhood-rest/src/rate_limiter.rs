//! Thread-safe rate limiter shared by every request of a client
//!
//! Wraps a single [`TokenBucket`] in a mutex. Critical sections are pure
//! arithmetic; the lock is never held while sleeping or doing I/O.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use robinhood_types::{RateLimitResult, TokenBucket, TokenBucketConfig};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace, warn};

use crate::error::{RestError, RestResult};

/// Current time on the Tokio clock, so paused-time tests stay consistent
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Shared token-bucket admission control
///
/// Cloning yields a handle to the same bucket. Construct separate limiters
/// for independent clients.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::robinhood_defaults()
    }
}

impl RateLimiter {
    /// Create a full limiter from a bucket configuration
    pub fn new(config: TokenBucketConfig) -> Self {
        Self {
            bucket: Arc::new(Mutex::new(config.create_bucket_at(now()))),
        }
    }

    /// Limiter admitting `refill_amount` requests per `refill_interval`, bursting to `capacity`
    pub fn per_interval(capacity: u32, refill_amount: u32, refill_interval: Duration) -> Self {
        Self::new(TokenBucketConfig::per_interval(
            capacity,
            refill_amount,
            refill_interval,
        ))
    }

    /// Create a rate limiter with Robinhood's default limits
    pub fn robinhood_defaults() -> Self {
        Self::new(TokenBucketConfig::robinhood_defaults())
    }

    /// Create a permissive rate limiter (for testing)
    pub fn permissive() -> Self {
        Self::new(TokenBucketConfig::permissive())
    }

    /// Take a token if one is available, never blocking
    pub fn allow(&self) -> bool {
        self.try_acquire().is_allowed()
    }

    fn try_acquire(&self) -> RateLimitResult {
        self.bucket.lock().try_acquire_at(1, now())
    }

    /// Wait until a token is available, then take it
    ///
    /// Returns immediately when a token is already available. Sleeps exactly
    /// until the next token is due rather than polling. Fails with
    /// [`RestError::Cancelled`] as soon as `cancel` fires; a cancelled wait
    /// never consumes a token. Fails at once with
    /// [`RestError::RateLimitUnavailable`] when no token can ever arrive
    /// (zero burst, or an empty bucket with no refill).
    #[instrument(skip_all, level = "debug")]
    pub async fn wait(&self, cancel: &CancellationToken) -> RestResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(RestError::Cancelled);
            }

            match self.try_acquire() {
                RateLimitResult::Allowed => return Ok(()),
                RateLimitResult::Limited { wait } => {
                    trace!(?wait, "Rate limited, sleeping until next token");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RestError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                RateLimitResult::Unavailable => {
                    warn!("Rate limiter cannot refill, refusing request");
                    return Err(RestError::RateLimitUnavailable);
                }
            }
        }
    }

    /// Provisionally claim a token without blocking
    ///
    /// The returned [`Reservation`] says how long to wait before acting and
    /// can hand the token back with [`Reservation::cancel`].
    pub fn reserve(&self) -> Reservation {
        let act_at = self.bucket.lock().reserve_at(now());
        Reservation {
            bucket: Arc::clone(&self.bucket),
            act_at,
        }
    }

    /// Current token estimate, including refill owed since the last update
    ///
    /// May be negative while reservations are outstanding.
    pub fn tokens(&self) -> f64 {
        self.bucket.lock().tokens_at(now())
    }

    /// Change the burst size; accumulated tokens are clamped to it
    ///
    /// A burst of zero makes every later `wait` fail with
    /// [`RestError::RateLimitUnavailable`].
    pub fn set_burst(&self, capacity: u32) {
        self.bucket.lock().set_capacity_at(capacity, now());
    }

    /// Change the refill rate (tokens per second)
    ///
    /// Negative or non-finite rates are treated as zero. At zero only the
    /// tokens already in the bucket are admitted; after that `wait` fails
    /// with [`RestError::RateLimitUnavailable`].
    pub fn set_rate(&self, refill_rate: f64) {
        let refill_rate = if refill_rate.is_finite() && refill_rate >= 0.0 {
            refill_rate
        } else {
            warn!(refill_rate, "Invalid refill rate, using zero");
            0.0
        };
        self.bucket.lock().set_refill_rate_at(refill_rate, now());
    }

    /// Get the burst size
    pub fn capacity(&self) -> u32 {
        self.bucket.lock().capacity()
    }

    /// Get the refill rate (tokens per second)
    pub fn refill_rate(&self) -> f64 {
        self.bucket.lock().refill_rate()
    }

    /// Get rate limit utilization as a fraction (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        let bucket = self.bucket.lock();
        let capacity = bucket.capacity();
        if capacity == 0 {
            return 1.0;
        }
        let tokens = bucket.tokens_at(now()).max(0.0);
        1.0 - tokens / capacity as f64
    }

    /// Refill the bucket to capacity
    pub fn reset(&self) {
        self.bucket.lock().reset_at(now());
    }

    /// Check whether two handles share a bucket
    pub fn shares_bucket_with(&self, other: &RateLimiter) -> bool {
        Arc::ptr_eq(&self.bucket, &other.bucket)
    }
}

/// A provisional claim on a token
#[derive(Debug)]
#[must_use = "a reservation holds a token until it is used or cancelled"]
pub struct Reservation {
    bucket: Arc<Mutex<TokenBucket>>,
    act_at: Option<Instant>,
}

impl Reservation {
    /// Whether a token was promised at all
    ///
    /// False when the bucket has no capacity, or is empty and not refilling.
    pub fn is_ok(&self) -> bool {
        self.act_at.is_some()
    }

    /// How long to wait before acting; `None` if the reservation is not ok
    pub fn delay(&self) -> Option<Duration> {
        self.act_at
            .map(|act_at| act_at.saturating_duration_since(now()))
    }

    /// Return the token to the bucket
    ///
    /// Has no effect once the delay has elapsed.
    pub fn cancel(self) {
        if let Some(act_at) = self.act_at {
            self.bucket.lock().cancel_reservation_at(act_at, now());
        }
    }

    /// Sleep until the reservation may act
    ///
    /// On cancellation the token is returned to the bucket. A reservation
    /// that is not ok fails with [`RestError::RateLimitUnavailable`].
    pub async fn wait(self, cancel: &CancellationToken) -> RestResult<()> {
        let Some(delay) = self.delay() else {
            return Err(RestError::RateLimitUnavailable);
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.cancel();
                Err(RestError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
