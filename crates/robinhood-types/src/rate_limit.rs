//! Client-side rate limiting for the Robinhood Crypto API
//!
//! This module provides the token bucket arithmetic behind the REST client's
//! admission control. The bucket is plain data: every time-dependent method
//! takes the current [`Instant`] so the caller owns the clock. Locking and
//! async waiting live in `robinhood-rest`.

use std::time::{Duration, Instant};

/// Token bucket rate limiter
///
/// Implements the token bucket algorithm for rate limiting.
/// Tokens are consumed when making requests and refill at a constant rate,
/// capped at the bucket capacity. Reservations may drive the count below
/// zero, representing tokens promised to callers in the future.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum number of tokens (bucket capacity)
    capacity: u32,
    /// Current number of available tokens
    tokens: f64,
    /// Tokens added per second (refill rate)
    refill_rate: f64,
    /// Last time tokens were refilled
    last_refill: Instant,
    /// Latest act-time handed out to a reservation
    last_event: Instant,
}

impl TokenBucket {
    /// Create a new, full token bucket whose clock starts at `now`
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of tokens the bucket can hold
    /// * `refill_rate` - Number of tokens added per second
    /// * `now` - Starting point of the bucket's clock
    pub fn new_at(capacity: u32, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_refill: now,
            last_event: now,
        }
    }

    /// Try to acquire tokens from the bucket at `now`
    ///
    /// On failure the bucket is left untouched apart from the refill owed
    /// since the last check.
    pub fn try_acquire_at(&mut self, tokens: u32, now: Instant) -> RateLimitResult {
        self.refill(now);

        let needed = tokens as f64;
        if self.tokens >= needed {
            self.tokens -= needed;
            return RateLimitResult::Allowed;
        }

        match self.duration_until(needed) {
            Some(wait) => RateLimitResult::Limited { wait },
            None => RateLimitResult::Unavailable,
        }
    }

    /// Provisionally take one token, possibly from the future
    ///
    /// Returns the instant at which the caller may act, or `None` when no
    /// token can ever be promised (zero capacity, or an empty bucket that
    /// does not refill, or a rate so slow the wait overflows the clock).
    pub fn reserve_at(&mut self, now: Instant) -> Option<Instant> {
        if self.capacity == 0 {
            return None;
        }

        self.refill(now);

        if self.refill_rate <= 0.0 {
            if self.tokens < 1.0 {
                return None;
            }
            self.tokens -= 1.0;
            return Some(now);
        }

        let remaining = self.tokens - 1.0;
        let wait = if remaining < 0.0 {
            self.duration_from_tokens(-remaining)?
        } else {
            Duration::ZERO
        };
        let act_at = now.checked_add(wait)?;

        self.tokens = remaining;
        if act_at > self.last_event {
            self.last_event = act_at;
        }
        Some(act_at)
    }

    /// Give back the token held by a reservation that acts at `act_at`
    ///
    /// Does nothing once `act_at` has passed. Reservations granted after
    /// this one already counted on its token, so the amount returned shrinks
    /// by the tokens that accrue between `act_at` and the latest act-time.
    pub fn cancel_reservation_at(&mut self, act_at: Instant, now: Instant) {
        if act_at < now {
            return;
        }

        let later = self.last_event.saturating_duration_since(act_at);
        let restore = 1.0 - self.tokens_from_duration(later);
        if restore <= 0.0 {
            return;
        }

        self.refill(now);
        self.tokens = (self.tokens + restore).min(self.capacity as f64);

        if act_at == self.last_event {
            let previous = self
                .duration_from_tokens(1.0)
                .and_then(|step| act_at.checked_sub(step));
            if let Some(previous) = previous {
                if previous >= now {
                    self.last_event = previous;
                }
            }
        }
    }

    /// Tokens available at `now`, without mutating state
    ///
    /// May be negative while reservations are outstanding.
    pub fn tokens_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill);
        (self.tokens + self.tokens_from_duration(elapsed)).min(self.capacity as f64)
    }

    /// Change the capacity, clamping accumulated tokens to it
    pub fn set_capacity_at(&mut self, capacity: u32, now: Instant) {
        self.refill(now);
        self.capacity = capacity;
        self.tokens = self.tokens.min(capacity as f64);
    }

    /// Change the refill rate; tokens owed under the old rate are kept
    pub fn set_refill_rate_at(&mut self, refill_rate: f64, now: Instant) {
        self.refill(now);
        self.refill_rate = refill_rate;
    }

    /// Get the capacity of this bucket
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Get the refill rate (tokens per second)
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Reset the bucket to full capacity
    pub fn reset_at(&mut self, now: Instant) {
        self.tokens = self.capacity as f64;
        self.last_refill = now;
        self.last_event = now;
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self, now: Instant) {
        self.tokens = self.tokens_at(now);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    fn tokens_from_duration(&self, elapsed: Duration) -> f64 {
        if self.refill_rate <= 0.0 {
            return 0.0;
        }
        elapsed.as_secs_f64() * self.refill_rate
    }

    /// `None` when the wait does not fit in a `Duration`
    fn duration_from_tokens(&self, tokens: f64) -> Option<Duration> {
        if self.refill_rate <= 0.0 || tokens <= 0.0 {
            return Some(Duration::ZERO);
        }
        Duration::try_from_secs_f64(tokens / self.refill_rate).ok()
    }

    /// Time until `needed` tokens are present, if that ever happens
    fn duration_until(&self, needed: f64) -> Option<Duration> {
        if self.refill_rate <= 0.0 || needed > self.capacity as f64 {
            return None;
        }
        self.duration_from_tokens(needed - self.tokens)
    }
}

/// Configuration for a single token bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketConfig {
    /// Maximum tokens (burst size)
    pub capacity: u32,
    /// Tokens per second refill rate
    pub refill_rate: f64,
}

impl TokenBucketConfig {
    /// Create a new token bucket configuration
    pub const fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }

    /// Configuration that refills `refill_amount` tokens every `refill_interval`
    pub fn per_interval(capacity: u32, refill_amount: u32, refill_interval: Duration) -> Self {
        let secs = refill_interval.as_secs_f64();
        let refill_rate = if secs > 0.0 {
            refill_amount as f64 / secs
        } else {
            0.0
        };
        Self::new(capacity, refill_rate)
    }

    /// Robinhood's documented limits: 100 requests per minute, bursts of 300
    pub fn robinhood_defaults() -> Self {
        Self::per_interval(300, 100, Duration::from_secs(60))
    }

    /// Create a very permissive configuration (for testing)
    pub const fn permissive() -> Self {
        Self::new(100_000, 100_000.0)
    }

    /// Create a token bucket from this configuration, starting at `now`
    pub fn create_bucket_at(&self, now: Instant) -> TokenBucket {
        TokenBucket::new_at(self.capacity, self.refill_rate, now)
    }
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self::robinhood_defaults()
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed,
    /// Request is rate limited, a token is expected after `wait`
    Limited { wait: Duration },
    /// No token will become available without reconfiguring the bucket
    Unavailable,
}

impl RateLimitResult {
    /// Check if the request is allowed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Get the wait duration if rate limited
    pub fn wait_duration(&self) -> Option<Duration> {
        match self {
            Self::Limited { wait } => Some(*wait),
            Self::Allowed | Self::Unavailable => None,
        }
    }
}
