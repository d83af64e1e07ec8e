//! Expiration calculator.
//!
//! Each tier carries an [`ExpirationPolicy`]. Right before every write the
//! engine evaluates it against the current time and hands the resulting
//! [`Expiry`] to the backend. The policy is never cached because `now` moves.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// How a written value ages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationMode {
    /// Expire at a fixed instant computed at write time.
    #[default]
    Absolute,
    /// Every read pushes the deadline out by the TTL.
    Sliding,
}

/// Per-tier expiration settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpirationPolicy {
    pub ttl: Option<Duration>,
    pub absolute: Option<SystemTime>,
    pub mode: ExpirationMode,
}

impl ExpirationPolicy {
    /// A policy that never expires anything.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Effective expiration for a write happening at `now`.
    ///
    /// The absolute instant wins when it comes before the TTL-derived
    /// instant (or when there is no TTL).
    pub fn effective_expiration(&self, now: SystemTime) -> Option<SystemTime> {
        let ttl_expiry = self.ttl.and_then(|ttl| now.checked_add(ttl));

        match (self.absolute, ttl_expiry) {
            (Some(absolute), None) => Some(absolute),
            (Some(absolute), Some(ttl_at)) if ttl_at > absolute => Some(absolute),
            (_, ttl_at) => ttl_at,
        }
    }

    /// Package the effective expiration for a backend.
    pub fn expiry_at(&self, now: SystemTime) -> Expiry {
        let sliding = match self.mode {
            ExpirationMode::Sliding => self.ttl,
            ExpirationMode::Absolute => None,
        };

        Expiry {
            deadline: self.effective_expiration(now),
            sliding,
            cap: self.absolute,
        }
    }
}

/// The expiration a backend must apply to one write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiry {
    /// Instant after which the value is gone (`None` = never).
    pub deadline: Option<SystemTime>,

    /// Window re-applied on every access in sliding mode.
    pub sliding: Option<Duration>,

    /// Absolute instant a sliding deadline may never pass.
    pub cap: Option<SystemTime>,
}

impl Expiry {
    /// No expiration at all.
    pub const NEVER: Expiry = Expiry {
        deadline: None,
        sliding: None,
        cap: None,
    };

    pub fn at(deadline: SystemTime) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::NEVER
        }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    /// Expiry after an access at `now`. Only sliding entries change.
    pub fn touched(&self, now: SystemTime) -> Expiry {
        let Some(window) = self.sliding else {
            return *self;
        };

        let policy = ExpirationPolicy {
            ttl: Some(window),
            absolute: self.cap,
            mode: ExpirationMode::Sliding,
        };
        Expiry {
            deadline: policy.effective_expiration(now),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_absolute_wins_when_earlier() {
        let now = SystemTime::now();
        let policy = ExpirationPolicy {
            ttl: Some(10 * MINUTE),
            absolute: Some(now + 5 * MINUTE),
            mode: ExpirationMode::Absolute,
        };
        assert_eq!(policy.effective_expiration(now), Some(now + 5 * MINUTE));
    }

    #[test]
    fn test_ttl_wins_when_earlier() {
        let now = SystemTime::now();
        let policy = ExpirationPolicy {
            ttl: Some(5 * MINUTE),
            absolute: Some(now + 10 * MINUTE),
            mode: ExpirationMode::Absolute,
        };
        assert_eq!(policy.effective_expiration(now), Some(now + 5 * MINUTE));
    }

    #[test]
    fn test_single_source_and_none() {
        let now = SystemTime::now();
        assert_eq!(ExpirationPolicy::none().effective_expiration(now), None);
        assert_eq!(
            ExpirationPolicy::with_ttl(MINUTE).effective_expiration(now),
            Some(now + MINUTE)
        );

        let absolute_only = ExpirationPolicy {
            absolute: Some(now + MINUTE),
            ..Default::default()
        };
        assert_eq!(absolute_only.effective_expiration(now), Some(now + MINUTE));
    }

    #[test]
    fn test_evaluated_against_given_now() {
        let policy = ExpirationPolicy::with_ttl(MINUTE);
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + 3 * MINUTE;
        assert_ne!(policy.expiry_at(t0), policy.expiry_at(t1));
    }

    #[test]
    fn test_sliding_touch_extends_up_to_cap() {
        let t0 = SystemTime::UNIX_EPOCH + 100 * MINUTE;
        let policy = ExpirationPolicy {
            ttl: Some(2 * MINUTE),
            absolute: Some(t0 + 3 * MINUTE),
            mode: ExpirationMode::Sliding,
        };
        let expiry = policy.expiry_at(t0);
        assert_eq!(expiry.deadline, Some(t0 + 2 * MINUTE));

        let touched = expiry.touched(t0 + MINUTE);
        assert_eq!(touched.deadline, Some(t0 + 3 * MINUTE));

        // Past the cap the deadline stays pinned to it.
        let touched = touched.touched(t0 + 2 * MINUTE);
        assert_eq!(touched.deadline, Some(t0 + 3 * MINUTE));
    }

    #[test]
    fn test_absolute_mode_touch_is_noop() {
        let t0 = SystemTime::UNIX_EPOCH;
        let expiry = ExpirationPolicy::with_ttl(MINUTE).expiry_at(t0);
        assert_eq!(expiry.touched(t0 + MINUTE / 2), expiry);
        assert!(expiry.is_expired(t0 + MINUTE));
        assert!(!Expiry::NEVER.is_expired(t0));
    }
}
