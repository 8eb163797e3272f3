//! Opening-hours eligibility gate.
//!
//! Decides whether a pickup window falls inside the recipient location's
//! published operating hours. The decision is a pure function over the
//! window and the location's schedule versions; the fail-open default is a
//! visible branch in the result type, not an exception path. Both the
//! dispatcher (skip sending) and the issues report (flag mis-scheduled
//! appointments) call this same function.

use chrono::{DateTime, Datelike, Utc};

use pantry_common::types::{PickupWindow, ScheduleVersion, WeeklyHours};

/// Why a pickup window was or wasn't considered inside operating hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    /// Both window edges fall inside the day's open interval.
    WithinHours,
    /// An edge falls before opening or after closing.
    OutsideHours,
    /// The location is marked closed on the window's day.
    DayClosed,
    /// No schedule version covers the window's date — fail open.
    NoSchedule,
    /// The schedule's weekly hours could not be parsed — fail open.
    InvalidSchedule,
}

/// Outcome of the opening-hours check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: EligibilityReason,
}

impl Eligibility {
    fn inside(reason: EligibilityReason) -> Self {
        Self {
            eligible: true,
            reason,
        }
    }

    fn outside(reason: EligibilityReason) -> Self {
        Self {
            eligible: false,
            reason,
        }
    }
}

/// Check a pickup window against a location's schedule versions.
///
/// Resolves the version whose date range contains the window's date (latest
/// `valid_from` wins when versions overlap), looks up that weekday's
/// open/close interval, and requires both the earliest and latest instant of
/// the window to fall inside it. Each edge is evaluated against its own
/// weekday, so a window crossing midnight checks both days.
///
/// Missing or unparseable schedule data yields an *eligible* result: a
/// wrongly sent reminder is far cheaper than a silently dropped one. Times
/// are compared as wall-clock values in the store's timezone.
pub fn check_pickup_window(window: &PickupWindow, schedules: &[ScheduleVersion]) -> Eligibility {
    if schedules.is_empty() {
        return Eligibility::inside(EligibilityReason::NoSchedule);
    }

    let date = window.earliest.date_naive();
    let Some(version) = schedules
        .iter()
        .filter(|v| v.covers(date))
        .max_by_key(|v| v.valid_from)
    else {
        return Eligibility::inside(EligibilityReason::NoSchedule);
    };

    let weekly: WeeklyHours = match serde_json::from_value(version.weekly_hours.clone()) {
        Ok(weekly) => weekly,
        Err(_) => return Eligibility::inside(EligibilityReason::InvalidSchedule),
    };

    for edge in [window.earliest, window.latest] {
        if let Some(reason) = edge_outside(edge, &weekly) {
            return Eligibility::outside(reason);
        }
    }

    Eligibility::inside(EligibilityReason::WithinHours)
}

/// Check one instant against the weekly hours. `None` means inside.
fn edge_outside(at: DateTime<Utc>, weekly: &WeeklyHours) -> Option<EligibilityReason> {
    let Some(hours) = weekly.for_weekday(at.date_naive().weekday()) else {
        return Some(EligibilityReason::DayClosed);
    };

    let time = at.time();
    if time < hours.open || time > hours.close {
        return Some(EligibilityReason::OutsideHours);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn version(
        valid_from: (i32, u32, u32),
        valid_until: Option<(i32, u32, u32)>,
        weekly: serde_json::Value,
    ) -> ScheduleVersion {
        ScheduleVersion {
            id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            valid_from: NaiveDate::from_ymd_opt(valid_from.0, valid_from.1, valid_from.2).unwrap(),
            valid_until: valid_until
                .map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            weekly_hours: weekly,
        }
    }

    fn nine_to_five() -> serde_json::Value {
        let day = serde_json::json!({"open": "09:00:00", "close": "17:00:00"});
        serde_json::json!({
            "mon": day.clone(),
            "tue": day.clone(),
            "wed": day.clone(),
            "thu": day.clone(),
            "fri": day
        })
    }

    /// 2025-06-11 is a Wednesday.
    fn window(start: (u32, u32), end: (u32, u32)) -> PickupWindow {
        PickupWindow {
            earliest: Utc
                .with_ymd_and_hms(2025, 6, 11, start.0, start.1, 0)
                .unwrap(),
            latest: Utc.with_ymd_and_hms(2025, 6, 11, end.0, end.1, 0).unwrap(),
        }
    }

    #[test]
    fn test_window_inside_hours() {
        let schedules = vec![version((2025, 1, 1), None, nine_to_five())];
        let result = check_pickup_window(&window((9, 0), (9, 15)), &schedules);
        assert!(result.eligible);
        assert_eq!(result.reason, EligibilityReason::WithinHours);
    }

    #[test]
    fn test_window_outside_hours() {
        let schedules = vec![version((2025, 1, 1), None, nine_to_five())];
        let result = check_pickup_window(&window((22, 0), (22, 15)), &schedules);
        assert!(!result.eligible);
        assert_eq!(result.reason, EligibilityReason::OutsideHours);
    }

    #[test]
    fn test_latest_edge_past_closing() {
        let schedules = vec![version((2025, 1, 1), None, nine_to_five())];
        let result = check_pickup_window(&window((16, 45), (17, 15)), &schedules);
        assert!(!result.eligible);
        assert_eq!(result.reason, EligibilityReason::OutsideHours);
    }

    #[test]
    fn test_window_touching_boundaries_is_inside() {
        let schedules = vec![version((2025, 1, 1), None, nine_to_five())];
        let result = check_pickup_window(&window((9, 0), (17, 0)), &schedules);
        assert!(result.eligible);
    }

    #[test]
    fn test_closed_day() {
        // 2025-06-14 is a Saturday, absent from the nine-to-five schedule
        let schedules = vec![version((2025, 1, 1), None, nine_to_five())];
        let window = PickupWindow {
            earliest: Utc.with_ymd_and_hms(2025, 6, 14, 10, 0, 0).unwrap(),
            latest: Utc.with_ymd_and_hms(2025, 6, 14, 10, 15, 0).unwrap(),
        };
        let result = check_pickup_window(&window, &schedules);
        assert!(!result.eligible);
        assert_eq!(result.reason, EligibilityReason::DayClosed);
    }

    #[test]
    fn test_empty_schedule_list_fails_open() {
        let result = check_pickup_window(&window((22, 0), (22, 15)), &[]);
        assert!(result.eligible);
        assert_eq!(result.reason, EligibilityReason::NoSchedule);
    }

    #[test]
    fn test_no_covering_version_fails_open() {
        let schedules = vec![version((2025, 7, 1), None, nine_to_five())];
        let result = check_pickup_window(&window((22, 0), (22, 15)), &schedules);
        assert!(result.eligible);
        assert_eq!(result.reason, EligibilityReason::NoSchedule);
    }

    #[test]
    fn test_unparseable_schedule_fails_open() {
        let schedules = vec![version(
            (2025, 1, 1),
            None,
            serde_json::json!({"mon": {"open": "not a time"}}),
        )];
        let result = check_pickup_window(&window((22, 0), (22, 15)), &schedules);
        assert!(result.eligible);
        assert_eq!(result.reason, EligibilityReason::InvalidSchedule);
    }

    #[test]
    fn test_latest_version_wins_on_overlap() {
        // Older version is nine-to-five; newer one closes Wednesdays
        let newer = serde_json::json!({
            "mon": {"open": "09:00:00", "close": "17:00:00"}
        });
        let schedules = vec![
            version((2025, 1, 1), None, nine_to_five()),
            version((2025, 6, 1), None, newer),
        ];
        let result = check_pickup_window(&window((10, 0), (10, 15)), &schedules);
        assert!(!result.eligible);
        assert_eq!(result.reason, EligibilityReason::DayClosed);
    }

    #[test]
    fn test_expired_version_not_used() {
        let schedules = vec![version((2025, 1, 1), Some((2025, 5, 31)), nine_to_five())];
        let result = check_pickup_window(&window((10, 0), (10, 15)), &schedules);
        assert!(result.eligible);
        assert_eq!(result.reason, EligibilityReason::NoSchedule);
    }
}
