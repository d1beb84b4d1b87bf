//! Weekly recurring bookings and the requests that create or change them.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::directory::{Classroom, ClassroomId, Subject, SubjectId, Teacher, TeacherId};
use crate::period::AcademicPeriod;
use crate::query::default_page_size;
use crate::time_slot;

pub type BookingId = i64;

pub(crate) fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
        }
    }

    /// ISO day number, Monday = 1.
    pub fn number(&self) -> u8 {
        self.weekday().number_from_monday() as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::from(date.weekday())
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        Self::ALL[weekday.num_days_from_monday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == normalized || day.as_str()[..3] == normalized)
            .ok_or_else(|| format!("unknown day of week '{s}'"))
    }
}

/// A weekly commitment of one classroom, subject and teacher to a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub academic_year: String,
    pub semester: u8,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Booking {
    pub fn period(&self) -> AcademicPeriod {
        AcademicPeriod::new(self.academic_year.clone(), self.semester)
    }

    pub fn in_period(&self, period: &AcademicPeriod) -> bool {
        self.academic_year == period.academic_year && self.semester == period.semester
    }

    pub fn duration_minutes(&self) -> i64 {
        time_slot::minutes_between(self.start_time, self.end_time)
    }

    pub fn time_range(&self) -> String {
        time_slot::format_range(self.start_time, self.end_time)
    }
}

/// Input for creating one booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub academic_year: String,
    pub semester: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Persist without looking for conflicts at all.
    #[serde(default)]
    pub skip_conflict_check: bool,
    /// Persist even when conflicts are found.
    #[serde(default)]
    pub allow_overlap: bool,
}

impl BookingRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classroom_id: ClassroomId,
        subject_id: SubjectId,
        teacher_id: TeacherId,
        day_of_week: DayOfWeek,
        start_time: NaiveTime,
        end_time: NaiveTime,
        period: &AcademicPeriod,
    ) -> Self {
        Self {
            classroom_id,
            subject_id,
            teacher_id,
            day_of_week,
            start_time,
            end_time,
            academic_year: period.academic_year.clone(),
            semester: period.semester,
            notes: None,
            is_active: true,
            skip_conflict_check: false,
            allow_overlap: false,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn allowing_overlap(mut self) -> Self {
        self.allow_overlap = true;
        self
    }

    pub fn skipping_conflict_check(mut self) -> Self {
        self.skip_conflict_check = true;
        self
    }

    pub fn period(&self) -> AcademicPeriod {
        AcademicPeriod::new(self.academic_year.clone(), self.semester)
    }

    /// The booking this request would persist; the id is assigned by the store.
    pub fn to_booking(&self) -> Booking {
        Booking {
            id: 0,
            classroom_id: self.classroom_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            academic_year: self.academic_year.clone(),
            semester: self.semester,
            is_active: self.is_active,
            notes: self.notes.clone(),
        }
    }
}

/// Partial update; only the fields that are present change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingPatch {
    pub classroom_id: Option<ClassroomId>,
    pub subject_id: Option<SubjectId>,
    pub teacher_id: Option<TeacherId>,
    pub day_of_week: Option<DayOfWeek>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub academic_year: Option<String>,
    pub semester: Option<u8>,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
    pub skip_conflict_check: bool,
    pub allow_overlap: bool,
}

impl BookingPatch {
    pub fn apply_to(&self, booking: &Booking) -> Booking {
        Booking {
            id: booking.id,
            classroom_id: self.classroom_id.unwrap_or(booking.classroom_id),
            subject_id: self.subject_id.unwrap_or(booking.subject_id),
            teacher_id: self.teacher_id.unwrap_or(booking.teacher_id),
            day_of_week: self.day_of_week.unwrap_or(booking.day_of_week),
            start_time: self.start_time.unwrap_or(booking.start_time),
            end_time: self.end_time.unwrap_or(booking.end_time),
            academic_year: self
                .academic_year
                .clone()
                .unwrap_or_else(|| booking.academic_year.clone()),
            semester: self.semester.unwrap_or(booking.semester),
            is_active: self.is_active.unwrap_or(booking.is_active),
            notes: self.notes.clone().or_else(|| booking.notes.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classroom_id.is_none()
            && self.subject_id.is_none()
            && self.teacher_id.is_none()
            && self.day_of_week.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.academic_year.is_none()
            && self.semester.is_none()
            && self.is_active.is_none()
            && self.notes.is_none()
    }
}

/// Filters for listing bookings. Absent filters match everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingSearch {
    #[serde(default)]
    pub classroom_id: Option<ClassroomId>,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub semester: Option<u8>,
    #[serde(default)]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

impl Default for BookingSearch {
    fn default() -> Self {
        Self {
            classroom_id: None,
            subject_id: None,
            teacher_id: None,
            academic_year: None,
            semester: None,
            day_of_week: None,
            is_active: None,
            page: 0,
            size: default_page_size(),
        }
    }
}

impl BookingSearch {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.classroom_id.is_none_or(|id| id == booking.classroom_id)
            && self.subject_id.is_none_or(|id| id == booking.subject_id)
            && self.teacher_id.is_none_or(|id| id == booking.teacher_id)
            && self
                .academic_year
                .as_deref()
                .is_none_or(|year| year == booking.academic_year)
            && self.semester.is_none_or(|semester| semester == booking.semester)
            && self.day_of_week.is_none_or(|day| day == booking.day_of_week)
            && self.is_active.is_none_or(|active| active == booking.is_active)
    }
}

/// A booking with its classroom, subject and teacher resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub classroom: Classroom,
    pub subject: Subject,
    pub teacher: Teacher,
}

impl BookingView {
    pub fn id(&self) -> BookingId {
        self.booking.id
    }

    pub fn duration_minutes(&self) -> i64 {
        self.booking.duration_minutes()
    }

    pub fn time_range(&self) -> String {
        self.booking.time_range()
    }
}
