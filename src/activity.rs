//! Dated teaching activities generated from weekly bookings.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::booking::{BookingId, DayOfWeek};
use crate::directory::{Classroom, ClassroomId, Subject, SubjectId, Teacher, TeacherId};
use crate::query::default_page_size;
use crate::time_slot;

pub type ActivityId = i64;

/// One concrete occurrence of a booking on a calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub booking_id: BookingId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    pub subject_id: SubjectId,
    pub classroom_id: ClassroomId,
    pub teacher_id: TeacherId,
}

impl Activity {
    pub fn day_of_week(&self) -> DayOfWeek {
        DayOfWeek::of(self.date)
    }

    pub fn duration_minutes(&self) -> i64 {
        time_slot::minutes_between(self.start_time, self.end_time)
    }

    pub fn time_range(&self) -> String {
        time_slot::format_range(self.start_time, self.end_time)
    }
}

/// Explicit activity creation. Absent times and references come from the booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub booking_id: BookingId,
    pub date: NaiveDate,
    pub topic: String,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub classroom_id: Option<ClassroomId>,
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
}

impl ActivityRequest {
    pub fn new(booking_id: BookingId, date: NaiveDate, topic: impl Into<String>) -> Self {
        Self {
            booking_id,
            date,
            topic: topic.into(),
            start_time: None,
            end_time: None,
            description: None,
            notes: None,
            is_completed: false,
            subject_id: None,
            classroom_id: None,
            teacher_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityPatch {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub is_completed: Option<bool>,
    pub subject_id: Option<SubjectId>,
    pub classroom_id: Option<ClassroomId>,
    pub teacher_id: Option<TeacherId>,
}

impl ActivityPatch {
    pub fn apply_to(&self, activity: &Activity) -> Activity {
        Activity {
            id: activity.id,
            booking_id: activity.booking_id,
            date: self.date.unwrap_or(activity.date),
            start_time: self.start_time.unwrap_or(activity.start_time),
            end_time: self.end_time.unwrap_or(activity.end_time),
            topic: self.topic.clone().unwrap_or_else(|| activity.topic.clone()),
            description: self
                .description
                .clone()
                .or_else(|| activity.description.clone()),
            notes: self.notes.clone().or_else(|| activity.notes.clone()),
            is_completed: self.is_completed.unwrap_or(activity.is_completed),
            subject_id: self.subject_id.unwrap_or(activity.subject_id),
            classroom_id: self.classroom_id.unwrap_or(activity.classroom_id),
            teacher_id: self.teacher_id.unwrap_or(activity.teacher_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySearch {
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub classroom_id: Option<ClassroomId>,
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    /// Case-insensitive substring of the topic.
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

impl Default for ActivitySearch {
    fn default() -> Self {
        Self {
            booking_id: None,
            subject_id: None,
            classroom_id: None,
            teacher_id: None,
            date: None,
            start_date: None,
            end_date: None,
            is_completed: None,
            topic: None,
            page: 0,
            size: default_page_size(),
        }
    }
}

impl ActivitySearch {
    pub fn matches(&self, activity: &Activity) -> bool {
        let topic_matches = self.topic.as_deref().is_none_or(|needle| {
            activity
                .topic
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        self.booking_id.is_none_or(|id| id == activity.booking_id)
            && self.subject_id.is_none_or(|id| id == activity.subject_id)
            && self.classroom_id.is_none_or(|id| id == activity.classroom_id)
            && self.teacher_id.is_none_or(|id| id == activity.teacher_id)
            && self.date.is_none_or(|date| date == activity.date)
            && self.start_date.is_none_or(|start| activity.date >= start)
            && self.end_date.is_none_or(|end| activity.date <= end)
            && self.is_completed.is_none_or(|done| done == activity.is_completed)
            && topic_matches
    }
}

/// An activity with its resolved booking context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    pub day_of_week: DayOfWeek,
    pub duration_minutes: i64,
    pub time_range: String,
    pub classroom: Classroom,
    pub subject: Subject,
    pub teacher: Teacher,
}

impl ActivityView {
    pub fn new(activity: Activity, classroom: Classroom, subject: Subject, teacher: Teacher) -> Self {
        Self {
            day_of_week: activity.day_of_week(),
            duration_minutes: activity.duration_minutes(),
            time_range: activity.time_range(),
            activity,
            classroom,
            subject,
            teacher,
        }
    }

    pub fn id(&self) -> ActivityId {
        self.activity.id
    }
}

/// A date the range generator passed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDate {
    pub booking_id: BookingId,
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generated: Vec<ActivityView>,
    pub skipped: Vec<SkippedDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Activity {
        Activity {
            id: 1,
            booking_id: 9,
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            topic: "Quadratic Equations".to_string(),
            description: None,
            notes: None,
            is_completed: false,
            subject_id: 2,
            classroom_id: 1,
            teacher_id: 3,
        }
    }

    #[test]
    fn search_matches_topic_case_insensitively() {
        let activity = sample();
        let search = ActivitySearch {
            topic: Some("quadratic".to_string()),
            ..ActivitySearch::default()
        };
        assert!(search.matches(&activity));
        let miss = ActivitySearch {
            topic: Some("linear".to_string()),
            ..ActivitySearch::default()
        };
        assert!(!miss.matches(&activity));
    }

    #[test]
    fn search_honours_date_window() {
        let activity = sample();
        let window = ActivitySearch {
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 2),
            ..ActivitySearch::default()
        };
        assert!(!window.matches(&activity));
    }

    #[test]
    fn patch_keeps_booking_link() {
        let activity = sample();
        let patch = ActivityPatch {
            topic: Some("Review".to_string()),
            is_completed: Some(true),
            ..ActivityPatch::default()
        };
        let merged = patch.apply_to(&activity);
        assert_eq!(merged.booking_id, activity.booking_id);
        assert_eq!(merged.topic, "Review");
        assert!(merged.is_completed);
        assert_eq!(merged.day_of_week(), DayOfWeek::Monday);
    }
}
