//! Service-health alert de-duplication.
//!
//! When the SMS gateway degrades, every message in a tick fails the same
//! way; operators need one alert, not one per message. State is an explicit
//! store keyed by service name and owned by the caller, so each dispatcher
//! (and each test) constructs a fresh instance.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Explicit alert-timestamp store keyed by service name.
#[derive(Debug, Default)]
pub struct AlertState {
    last_alerted: HashMap<String, DateTime<Utc>>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// De-duplicated health alerting: at most one alert per service per interval.
pub struct ServiceAlerts {
    interval: Duration,
    state: AlertState,
}

impl ServiceAlerts {
    pub fn new(interval: Duration, state: AlertState) -> Self {
        Self { interval, state }
    }

    /// Record a failure for `service` and decide whether to alert now.
    ///
    /// Returns `true` when no alert has fired for this service within the
    /// configured interval; the caller then emits the alert.
    pub fn should_alert(&mut self, service: &str, now: DateTime<Utc>) -> bool {
        match self.state.last_alerted.get(service) {
            Some(last) if now - *last < self.interval => {
                tracing::debug!(service, "Health alert suppressed — within interval");
                false
            }
            _ => {
                self.state.last_alerted.insert(service.to_string(), now);
                true
            }
        }
    }

    /// Clear the alert state for a recovered service so the next failure
    /// alerts immediately.
    pub fn clear(&mut self, service: &str) {
        self.state.last_alerted.remove(service);
    }

    /// Number of services with a recorded alert (for monitoring).
    pub fn tracked_count(&self) -> usize {
        self.state.last_alerted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alerts() -> ServiceAlerts {
        ServiceAlerts::new(Duration::minutes(10), AlertState::new())
    }

    #[test]
    fn test_first_failure_alerts() {
        let mut alerts = alerts();
        let now = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        assert!(alerts.should_alert("sms-gateway", now));
    }

    #[test]
    fn test_repeat_failure_suppressed_within_interval() {
        let mut alerts = alerts();
        let now = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        assert!(alerts.should_alert("sms-gateway", now));
        assert!(!alerts.should_alert("sms-gateway", now + Duration::minutes(5)));
    }

    #[test]
    fn test_alerts_again_after_interval() {
        let mut alerts = alerts();
        let now = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        assert!(alerts.should_alert("sms-gateway", now));
        assert!(alerts.should_alert("sms-gateway", now + Duration::minutes(10)));
    }

    #[test]
    fn test_clear_resets_service() {
        let mut alerts = alerts();
        let now = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        assert!(alerts.should_alert("sms-gateway", now));
        alerts.clear("sms-gateway");
        assert_eq!(alerts.tracked_count(), 0);
        assert!(alerts.should_alert("sms-gateway", now + Duration::minutes(1)));
    }

    #[test]
    fn test_independent_services() {
        let mut alerts = alerts();
        let now = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        assert!(alerts.should_alert("sms-gateway", now));
        assert!(alerts.should_alert("confirmations", now));
        assert_eq!(alerts.tracked_count(), 2);
    }
}
