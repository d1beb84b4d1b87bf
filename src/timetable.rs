//! Weekly timetables derived from bookings.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::booking::{BookingId, BookingView, DayOfWeek};
use crate::directory::{ClassroomId, SubjectId, TeacherId};
use crate::error::ScheduleResult;
use crate::period::AcademicPeriod;
use crate::query::ResourceRef;
use crate::schedule::ScheduleManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimetableKind {
    Class,
    Teacher,
    Subject,
}

impl TimetableKind {
    pub fn title(&self) -> &'static str {
        match self {
            TimetableKind::Class => "Class Timetable",
            TimetableKind::Teacher => "Teacher Timetable",
            TimetableKind::Subject => "Subject Timetable",
        }
    }
}

/// Identifies the entity a timetable is built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableHeader {
    pub kind: TimetableKind,
    pub period: AcademicPeriod,
    pub entity_id: i64,
    pub entity_name: String,
    pub entity_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub booking_id: BookingId,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub time_range: String,
    pub duration_minutes: i64,
    pub subject_name: String,
    pub subject_code: String,
    pub teacher_name: String,
    /// The teacher's username.
    pub teacher_code: String,
    pub classroom_name: String,
    pub classroom_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub is_active: bool,
}

impl From<&BookingView> for TimeSlot {
    fn from(view: &BookingView) -> Self {
        Self {
            booking_id: view.id(),
            start_time: view.booking.start_time,
            end_time: view.booking.end_time,
            time_range: view.time_range(),
            duration_minutes: view.duration_minutes(),
            subject_name: view.subject.name.clone(),
            subject_code: view.subject.code.clone(),
            teacher_name: view.teacher.full_name(),
            teacher_code: view.teacher.username.clone(),
            classroom_name: view.classroom.name.clone(),
            classroom_code: view.classroom.code.clone(),
            notes: view.booking.notes.clone(),
            is_active: view.booking.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableStatistics {
    pub total_sessions: usize,
    pub total_minutes: i64,
    pub total_hours: i64,
    pub sessions_by_day: BTreeMap<DayOfWeek, usize>,
    pub minutes_by_day: BTreeMap<DayOfWeek, i64>,
    pub hours_by_day: BTreeMap<DayOfWeek, i64>,
    pub subject_minutes: BTreeMap<String, i64>,
    pub subject_hours: BTreeMap<String, i64>,
    pub average_sessions_per_day: f64,
    pub busiest_day: Option<DayOfWeek>,
    pub lightest_day: Option<DayOfWeek>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub title: String,
    pub kind: TimetableKind,
    pub academic_year: String,
    pub semester: u8,
    pub entity_id: i64,
    pub entity_name: String,
    pub entity_code: String,
    pub weekly_schedule: BTreeMap<DayOfWeek, Vec<TimeSlot>>,
    pub statistics: TimetableStatistics,
    pub total_sessions: usize,
    pub total_hours: i64,
    pub generated_at: DateTime<Utc>,
}

pub struct TimetableBuilder {
    school_days_per_week: u32,
}

impl TimetableBuilder {
    pub fn new(school_days_per_week: u32) -> Self {
        Self {
            school_days_per_week,
        }
    }

    pub fn build(&self, header: TimetableHeader, bookings: &[BookingView]) -> Timetable {
        let statistics = self.statistics(bookings);
        Timetable {
            title: header.kind.title().to_string(),
            kind: header.kind,
            academic_year: header.period.academic_year,
            semester: header.period.semester,
            entity_id: header.entity_id,
            entity_name: header.entity_name,
            entity_code: header.entity_code,
            weekly_schedule: self.weekly_schedule(bookings),
            total_sessions: statistics.total_sessions,
            total_hours: statistics.total_hours,
            statistics,
            generated_at: Utc::now(),
        }
    }

    /// Slots grouped by day, each day sorted by start time.
    pub fn weekly_schedule(&self, bookings: &[BookingView]) -> BTreeMap<DayOfWeek, Vec<TimeSlot>> {
        let mut week: BTreeMap<DayOfWeek, Vec<TimeSlot>> = BTreeMap::new();
        for view in bookings {
            week.entry(view.booking.day_of_week)
                .or_default()
                .push(TimeSlot::from(view));
        }
        for slots in week.values_mut() {
            slots.sort_by_key(|slot| (slot.start_time, slot.booking_id));
        }
        week
    }

    pub fn statistics(&self, bookings: &[BookingView]) -> TimetableStatistics {
        let mut sessions_by_day: BTreeMap<DayOfWeek, usize> = BTreeMap::new();
        let mut minutes_by_day: BTreeMap<DayOfWeek, i64> = BTreeMap::new();
        let mut subject_minutes: BTreeMap<String, i64> = BTreeMap::new();
        let mut total_minutes = 0;

        for view in bookings {
            let minutes = view.duration_minutes();
            total_minutes += minutes;
            *sessions_by_day.entry(view.booking.day_of_week).or_default() += 1;
            *minutes_by_day.entry(view.booking.day_of_week).or_default() += minutes;
            *subject_minutes.entry(view.subject.name.clone()).or_default() += minutes;
        }

        let hours_by_day = minutes_by_day.iter().map(|(day, minutes)| (*day, minutes / 60)).collect();
        let subject_hours = subject_minutes
            .iter()
            .map(|(subject, minutes)| (subject.clone(), minutes / 60))
            .collect();

        let total_sessions = bookings.len();
        let average_sessions_per_day = if self.school_days_per_week == 0 {
            0.0
        } else {
            total_sessions as f64 / f64::from(self.school_days_per_week)
        };

        // Ties resolve to the earliest day of the week.
        let busiest_day = sessions_by_day
            .iter()
            .fold(None::<(DayOfWeek, usize)>, |best, (day, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((*day, *count)),
            })
            .map(|(day, _)| day);
        let lightest_day = sessions_by_day
            .iter()
            .fold(None::<(DayOfWeek, usize)>, |best, (day, count)| match best {
                Some((_, best_count)) if best_count <= *count => best,
                _ => Some((*day, *count)),
            })
            .map(|(day, _)| day);

        TimetableStatistics {
            total_sessions,
            total_minutes,
            total_hours: total_minutes / 60,
            sessions_by_day,
            minutes_by_day,
            hours_by_day,
            subject_minutes,
            subject_hours,
            average_sessions_per_day,
            busiest_day,
            lightest_day,
        }
    }
}

impl ScheduleManager {
    pub fn generate_class_timetable(&self, classroom_id: ClassroomId, period: &AcademicPeriod) -> ScheduleResult<Timetable> {
        let classroom = self.resolver().classroom(classroom_id)?;
        let header = TimetableHeader {
            kind: TimetableKind::Class,
            period: period.clone(),
            entity_id: classroom.id,
            entity_name: classroom.name,
            entity_code: classroom.code,
        };
        self.timetable(header, ResourceRef::Classroom(classroom_id))
    }

    pub fn generate_teacher_timetable(&self, teacher_id: TeacherId, period: &AcademicPeriod) -> ScheduleResult<Timetable> {
        let teacher = self.resolver().teacher(teacher_id)?;
        let header = TimetableHeader {
            kind: TimetableKind::Teacher,
            period: period.clone(),
            entity_id: teacher.id,
            entity_name: teacher.full_name(),
            entity_code: teacher.username,
        };
        self.timetable(header, ResourceRef::Teacher(teacher_id))
    }

    pub fn generate_subject_timetable(&self, subject_id: SubjectId, period: &AcademicPeriod) -> ScheduleResult<Timetable> {
        let subject = self.resolver().subject(subject_id)?;
        let header = TimetableHeader {
            kind: TimetableKind::Subject,
            period: period.clone(),
            entity_id: subject.id,
            entity_name: subject.name,
            entity_code: subject.code,
        };
        self.timetable(header, ResourceRef::Subject(subject_id))
    }

    fn timetable(&self, header: TimetableHeader, resource: ResourceRef) -> ScheduleResult<Timetable> {
        info!(
            kind = ?header.kind,
            entity_id = header.entity_id,
            period = %header.period,
            "generating timetable"
        );
        let bookings = self.bookings_for(resource, &header.period)?;
        Ok(TimetableBuilder::new(self.rules.school_days_per_week).build(header, &bookings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::Booking;
    use crate::directory::{Classroom, Subject, Teacher};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn view(id: BookingId, day: DayOfWeek, start: NaiveTime, end: NaiveTime, subject: &str) -> BookingView {
        BookingView {
            booking: Booking {
                id,
                classroom_id: 1,
                subject_id: 1,
                teacher_id: 1,
                day_of_week: day,
                start_time: start,
                end_time: end,
                academic_year: "2024/2025".to_string(),
                semester: 1,
                is_active: true,
                notes: None,
            },
            classroom: Classroom::new(1, "Class 7A", "7A"),
            subject: Subject::new(1, subject, subject.to_uppercase()),
            teacher: Teacher::new(1, "Ann", "Lee", "alee"),
        }
    }

    #[test]
    fn statistics_for_three_sessions() {
        let bookings = vec![
            view(1, DayOfWeek::Monday, t(8, 0), t(9, 30), "Math"),
            view(2, DayOfWeek::Monday, t(10, 0), t(11, 0), "Physics"),
            view(3, DayOfWeek::Wednesday, t(8, 0), t(9, 0), "Math"),
        ];
        let stats = TimetableBuilder::new(5).statistics(&bookings);
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.total_minutes, 210);
        assert_eq!(stats.total_hours, 3);
        assert_eq!(stats.sessions_by_day[&DayOfWeek::Monday], 2);
        assert_eq!(stats.sessions_by_day[&DayOfWeek::Wednesday], 1);
        assert_eq!(stats.subject_hours["Math"], 2);
        assert_eq!(stats.subject_hours["Physics"], 1);
        assert!((stats.average_sessions_per_day - 0.6).abs() < f64::EPSILON);
        assert_eq!(stats.busiest_day, Some(DayOfWeek::Monday));
        assert_eq!(stats.lightest_day, Some(DayOfWeek::Wednesday));
    }

    #[test]
    fn weekly_schedule_sorts_each_day() {
        let bookings = vec![
            view(1, DayOfWeek::Tuesday, t(13, 0), t(14, 0), "Math"),
            view(2, DayOfWeek::Tuesday, t(8, 0), t(9, 0), "Math"),
            view(3, DayOfWeek::Friday, t(9, 0), t(10, 0), "Math"),
        ];
        let week = TimetableBuilder::new(5).weekly_schedule(&bookings);
        let tuesday: Vec<_> = week[&DayOfWeek::Tuesday].iter().map(|s| s.booking_id).collect();
        assert_eq!(tuesday, vec![2, 1]);
        assert_eq!(week[&DayOfWeek::Tuesday][0].time_range, "08:00 - 09:00");
        assert!(!week.contains_key(&DayOfWeek::Monday));
    }

    #[test]
    fn empty_timetable_has_no_busiest_day() {
        let stats = TimetableBuilder::new(5).statistics(&[]);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.busiest_day, None);
        assert_eq!(stats.average_sessions_per_day, 0.0);
    }
}
