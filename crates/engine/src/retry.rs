//! Retry/backoff policy for failed delivery attempts.
//!
//! The schedule is flat rather than exponential: the provider's outages are
//! typically short, so a tight first retry catches blips while the longer
//! second delay avoids hammering a degraded gateway.

use chrono::Duration;

/// Maximum total delivery attempts for one message.
pub const MAX_ATTEMPTS: i32 = 3;

/// Normalized failure classification, produced once at the delivery-client
/// boundary and consumed everywhere else as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Gateway rate limit (HTTP 429).
    RateLimited,
    /// Gateway 5xx, network error or timeout.
    UpstreamUnavailable,
    /// Malformed request rejected by the gateway.
    InvalidRequest,
    /// The destination number was rejected.
    InvalidDestination,
    /// The provider account has no sendable credit. Never retried
    /// automatically; surfaced for bulk re-queue after a top-up.
    BalanceExhausted,
}

impl FailureClass {
    /// Whether this class is a transport-level transient condition.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            FailureClass::RateLimited | FailureClass::UpstreamUnavailable
        )
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::RateLimited => write!(f, "rate_limited"),
            FailureClass::UpstreamUnavailable => write!(f, "upstream_unavailable"),
            FailureClass::InvalidRequest => write!(f, "invalid_request"),
            FailureClass::InvalidDestination => write!(f, "invalid_destination"),
            FailureClass::BalanceExhausted => write!(f, "balance_exhausted"),
        }
    }
}

/// What the dispatcher should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Decide retry vs. give-up after a failed attempt.
///
/// `prior_attempts` counts the attempts made before the one that just
/// failed, so the first failure passes 0. Non-retriable classes give up
/// regardless of remaining attempts; retriable ones wait 5 minutes before
/// the first retry and 30 minutes before every subsequent one.
pub fn decide(prior_attempts: i32, class: FailureClass) -> RetryDecision {
    if !class.is_retriable() {
        return RetryDecision::GiveUp;
    }

    // prior_attempts + 1 attempts have now been used
    if prior_attempts + 1 >= MAX_ATTEMPTS {
        return RetryDecision::GiveUp;
    }

    let delay = if prior_attempts == 0 {
        Duration::minutes(5)
    } else {
        Duration::minutes(30)
    };
    RetryDecision::Retry { delay }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_retries_after_five_minutes() {
        assert_eq!(
            decide(0, FailureClass::RateLimited),
            RetryDecision::Retry {
                delay: Duration::minutes(5)
            }
        );
    }

    #[test]
    fn test_second_failure_retries_after_thirty_minutes() {
        assert_eq!(
            decide(1, FailureClass::UpstreamUnavailable),
            RetryDecision::Retry {
                delay: Duration::minutes(30)
            }
        );
    }

    #[test]
    fn test_attempts_exhausted() {
        assert_eq!(decide(2, FailureClass::RateLimited), RetryDecision::GiveUp);
    }

    #[test]
    fn test_permanent_failure_never_retries() {
        assert_eq!(
            decide(0, FailureClass::InvalidDestination),
            RetryDecision::GiveUp
        );
        assert_eq!(
            decide(0, FailureClass::InvalidRequest),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_balance_exhausted_never_retries() {
        assert_eq!(
            decide(0, FailureClass::BalanceExhausted),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_retriable_classes() {
        assert!(FailureClass::RateLimited.is_retriable());
        assert!(FailureClass::UpstreamUnavailable.is_retriable());
        assert!(!FailureClass::InvalidRequest.is_retriable());
        assert!(!FailureClass::InvalidDestination.is_retriable());
        assert!(!FailureClass::BalanceExhausted.is_retriable());
    }
}
