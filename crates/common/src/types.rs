use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageIntent {
    PickupReminder,
    PickupUpdated,
    PickupCancelled,
}

impl std::fmt::Display for MessageIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageIntent::PickupReminder => write!(f, "pickup_reminder"),
            MessageIntent::PickupUpdated => write!(f, "pickup_updated"),
            MessageIntent::PickupCancelled => write!(f, "pickup_cancelled"),
        }
    }
}

/// Delivery lifecycle state of an outbound message.
///
/// `queued → sending → {sent | retrying | failed}` with `retrying → sending`
/// looping, and any non-terminal state `→ cancelled`. `sent`, `failed` and
/// `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Queued,
    Sending,
    Retrying,
    Sent,
    Failed,
    Cancelled,
}

impl MessageStatus {
    /// Whether the state machine allows no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Sent | MessageStatus::Failed | MessageStatus::Cancelled
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Queued => write!(f, "queued"),
            MessageStatus::Sending => write!(f, "sending"),
            MessageStatus::Retrying => write!(f, "retrying"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Delivery-confirmation status reported asynchronously by the SMS gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Delivered,
    Failed,
    NotDelivered,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Delivered => write!(f, "delivered"),
            ProviderStatus::Failed => write!(f, "failed"),
            ProviderStatus::NotDelivered => write!(f, "not_delivered"),
        }
    }
}

/// One outbound notification attempt-series.
///
/// `destination`, `body` and `household_id` are nullable because recipient
/// anonymization blanks them while the row itself is kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutgoingMessage {
    pub id: Uuid,
    pub intent: MessageIntent,
    pub appointment_id: Option<Uuid>,
    pub household_id: Option<Uuid>,
    pub destination: Option<String>,
    pub body: Option<String>,
    pub status: MessageStatus,
    pub attempt_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub idempotency_key: String,
    pub provider_message_id: Option<String>,
    pub provider_status: Option<ProviderStatus>,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub dismissed_by: Option<String>,
    pub balance_failure: bool,
}

/// The earliest/latest instants of a pickup appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupWindow {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

/// Read model of a pickup appointment (owned by the scheduling domain).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub household_id: Uuid,
    pub location_id: Uuid,
    pub earliest_pickup: DateTime<Utc>,
    pub latest_pickup: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn window(&self) -> PickupWindow {
        PickupWindow {
            earliest: self.earliest_pickup,
            latest: self.latest_pickup,
        }
    }
}

/// A distribution location.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
}

/// One date-ranged version of a location's published weekly schedule.
///
/// `weekly_hours` is the raw JSONB column; parse it with [`WeeklyHours`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduleVersion {
    pub id: Uuid,
    pub location_id: Uuid,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub weekly_hours: serde_json::Value,
}

impl ScheduleVersion {
    /// Whether this version's date range contains `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_until.is_none_or(|until| date <= until)
    }
}

/// Open/close window for a single weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Typed representation of a schedule version's `weekly_hours` JSON.
///
/// Absent or null days mean "closed".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyHours {
    pub mon: Option<DayHours>,
    pub tue: Option<DayHours>,
    pub wed: Option<DayHours>,
    pub thu: Option<DayHours>,
    pub fri: Option<DayHours>,
    pub sat: Option<DayHours>,
    pub sun: Option<DayHours>,
}

impl WeeklyHours {
    pub fn for_weekday(&self, weekday: Weekday) -> Option<DayHours> {
        match weekday {
            Weekday::Mon => self.mon,
            Weekday::Tue => self.tue,
            Weekday::Wed => self.wed,
            Weekday::Thu => self.thu,
            Weekday::Fri => self.fri,
            Weekday::Sat => self.sat,
            Weekday::Sun => self.sun,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
        assert!(MessageStatus::Cancelled.is_terminal());
        assert!(!MessageStatus::Queued.is_terminal());
        assert!(!MessageStatus::Sending.is_terminal());
        assert!(!MessageStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_schedule_version_covers() {
        let version = ScheduleVersion {
            id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            valid_until: Some(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()),
            weekly_hours: serde_json::json!({}),
        };
        assert!(version.covers(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()));
        assert!(version.covers(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(!version.covers(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert!(!version.covers(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
    }

    #[test]
    fn test_schedule_version_open_ended() {
        let version = ScheduleVersion {
            id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            valid_until: None,
            weekly_hours: serde_json::json!({}),
        };
        assert!(version.covers(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }

    #[test]
    fn test_weekly_hours_parse() {
        let weekly: WeeklyHours = serde_json::from_value(serde_json::json!({
            "mon": {"open": "09:00:00", "close": "17:00:00"},
            "tue": null
        }))
        .unwrap();
        let mon = weekly.for_weekday(Weekday::Mon).unwrap();
        assert_eq!(mon.open, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(mon.close, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert!(weekly.for_weekday(Weekday::Tue).is_none());
        assert!(weekly.for_weekday(Weekday::Sun).is_none());
    }
}
