//! Validation of a single start/end pair against the scheduling rules.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::config::SchedulingRules;
use crate::error::{ScheduleError, ScheduleResult};

/// Outcome of validating a time slot. `valid` is false iff `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_minutes: i64,
}

impl TimeSlotReport {
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.valid = false;
    }

    /// Converts the report into the session duration or a validation error.
    pub fn into_result(self) -> ScheduleResult<i64> {
        if self.valid {
            Ok(self.duration_minutes)
        } else {
            Err(ScheduleError::Validation(self.errors.join("; ")))
        }
    }
}

pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    end.signed_duration_since(start).num_minutes()
}

pub fn format_range(start: NaiveTime, end: NaiveTime) -> String {
    format!("{} - {}", start.format("%H:%M"), end.format("%H:%M"))
}

pub fn validate(
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    rules: &SchedulingRules,
) -> TimeSlotReport {
    let mut report = TimeSlotReport {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
        duration_minutes: 0,
    };

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (start, end) => {
            if start.is_none() {
                report.push_error("Start time is required");
            }
            if end.is_none() {
                report.push_error("End time is required");
            }
            return report;
        }
    };

    report.duration_minutes = minutes_between(start, end);

    if start >= end {
        report.push_error("Invalid time slot: start time must be before end time");
        return report;
    }

    if report.duration_minutes < rules.min_session_minutes {
        report.push_error(format!(
            "Session duration is too short (minimum {} minutes)",
            rules.min_session_minutes
        ));
    }

    if report.duration_minutes > rules.max_session_minutes {
        report.warnings.push(format!(
            "Session duration is very long (maximum recommended {} minutes)",
            rules.max_session_minutes
        ));
    }

    if start < rules.school_day_start || end > rules.school_day_end {
        report
            .warnings
            .push("Schedule is outside normal school hours".to_string());
    }

    report
}

/// Same checks as [`validate`] for a dated activity; warnings are dropped.
pub fn validate_activity_slot(
    start: NaiveTime,
    end: NaiveTime,
    rules: &SchedulingRules,
) -> ScheduleResult<i64> {
    let mut report = validate(Some(start), Some(end), rules);
    report.warnings.clear();
    report.into_result()
}
