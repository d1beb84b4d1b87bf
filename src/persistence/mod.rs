use std::collections::HashSet;
use std::io;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::activity::{Activity, ActivityId};
use crate::booking::{Booking, BookingId, DayOfWeek};
use crate::directory::{Classroom, ClassroomId, DirectorySnapshot, Subject, SubjectId, Teacher, TeacherId};
use crate::period::AcademicPeriod;
use crate::query::{DateRange, ResourceRef};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Read access to the school directory, plus local replication of its records.
pub trait Directory {
    fn classroom(&self, id: ClassroomId) -> PersistenceResult<Option<Classroom>>;
    fn subject(&self, id: SubjectId) -> PersistenceResult<Option<Subject>>;
    fn teacher(&self, id: TeacherId) -> PersistenceResult<Option<Teacher>>;
    fn directory_snapshot(&self) -> PersistenceResult<DirectorySnapshot>;
    /// Inserts or replaces every record of `snapshot`.
    fn load_directory(&mut self, snapshot: &DirectorySnapshot) -> PersistenceResult<()>;
}

pub trait BookingStore {
    /// Stores `booking` under a fresh id and returns the stored copy.
    fn insert_booking(&mut self, booking: Booking) -> PersistenceResult<Booking>;
    /// Returns false when no booking has `booking.id`.
    fn update_booking(&mut self, booking: &Booking) -> PersistenceResult<bool>;
    /// Removes the booking and its activities. Returns false when absent.
    fn delete_booking(&mut self, id: BookingId) -> PersistenceResult<bool>;
    fn booking(&self, id: BookingId) -> PersistenceResult<Option<Booking>>;
    fn bookings_for_teacher_on(
        &self,
        teacher_id: TeacherId,
        day: DayOfWeek,
        period: &AcademicPeriod,
    ) -> PersistenceResult<Vec<Booking>>;
    fn bookings_for_classroom_on(
        &self,
        classroom_id: ClassroomId,
        day: DayOfWeek,
        period: &AcademicPeriod,
    ) -> PersistenceResult<Vec<Booking>>;
    fn bookings_in_period(&self, period: &AcademicPeriod) -> PersistenceResult<Vec<Booking>>;
    /// Bookings of one resource ordered by day, then start time.
    fn bookings_for(&self, resource: ResourceRef, period: &AcademicPeriod) -> PersistenceResult<Vec<Booking>>;
    fn all_bookings(&self) -> PersistenceResult<Vec<Booking>>;
}

pub trait ActivityStore {
    fn insert_activity(&mut self, activity: Activity) -> PersistenceResult<Activity>;
    fn update_activity(&mut self, activity: &Activity) -> PersistenceResult<bool>;
    fn delete_activity(&mut self, id: ActivityId) -> PersistenceResult<bool>;
    fn activity(&self, id: ActivityId) -> PersistenceResult<Option<Activity>>;
    fn activity_for_booking_on(&self, booking_id: BookingId, date: NaiveDate) -> PersistenceResult<Option<Activity>>;
    /// Activities of one resource within `range`, ordered by date, then start time.
    fn activities_for(&self, resource: ResourceRef, range: &DateRange) -> PersistenceResult<Vec<Activity>>;
    fn activities_on(&self, date: NaiveDate) -> PersistenceResult<Vec<Activity>>;
    fn all_activities(&self) -> PersistenceResult<Vec<Activity>>;
}

/// Everything the schedule manager needs from storage.
pub trait SchoolStore: Directory + BookingStore + ActivityStore + Send + Sync {}

impl<T> SchoolStore for T where T: Directory + BookingStore + ActivityStore + Send + Sync {}

/// Full copy of a store: directory records, bookings and activities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub directory: DirectorySnapshot,
    pub bookings: Vec<Booking>,
    pub activities: Vec<Activity>,
}

impl StoreSnapshot {
    pub fn capture(store: &dyn SchoolStore) -> PersistenceResult<Self> {
        let snapshot = Self {
            directory: store.directory_snapshot()?,
            bookings: store.all_bookings()?,
            activities: store.all_activities()?,
        };
        validate_snapshot(&snapshot)?;
        Ok(snapshot)
    }
}

/// Referential checks applied before a snapshot is written or restored.
pub fn validate_snapshot(snapshot: &StoreSnapshot) -> PersistenceResult<()> {
    let classrooms = unique_ids("classroom", snapshot.directory.classrooms.iter().map(|c| c.id))?;
    let subjects = unique_ids("subject", snapshot.directory.subjects.iter().map(|s| s.id))?;
    let teachers = unique_ids("teacher", snapshot.directory.teachers.iter().map(|t| t.id))?;
    let bookings = unique_ids("booking", snapshot.bookings.iter().map(|b| b.id))?;
    unique_ids("activity", snapshot.activities.iter().map(|a| a.id))?;

    for booking in &snapshot.bookings {
        if booking.start_time >= booking.end_time {
            return Err(PersistenceError::InvalidData(format!(
                "booking {} ends before it starts",
                booking.id
            )));
        }
        check_reference("booking", booking.id, "classroom", booking.classroom_id, &classrooms)?;
        check_reference("booking", booking.id, "subject", booking.subject_id, &subjects)?;
        check_reference("booking", booking.id, "teacher", booking.teacher_id, &teachers)?;
    }

    let mut occurrences = HashSet::new();
    for activity in &snapshot.activities {
        check_reference("activity", activity.id, "booking", activity.booking_id, &bookings)?;
        check_reference("activity", activity.id, "classroom", activity.classroom_id, &classrooms)?;
        check_reference("activity", activity.id, "subject", activity.subject_id, &subjects)?;
        check_reference("activity", activity.id, "teacher", activity.teacher_id, &teachers)?;
        if !occurrences.insert((activity.booking_id, activity.date)) {
            return Err(PersistenceError::InvalidData(format!(
                "booking {} has more than one activity on {}",
                activity.booking_id, activity.date
            )));
        }
    }
    Ok(())
}

fn unique_ids(kind: &str, ids: impl Iterator<Item = i64>) -> PersistenceResult<HashSet<i64>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(PersistenceError::InvalidData(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(seen)
}

fn check_reference(
    owner: &str,
    owner_id: i64,
    kind: &str,
    id: i64,
    known: &HashSet<i64>,
) -> PersistenceResult<()> {
    if known.contains(&id) {
        Ok(())
    } else {
        Err(PersistenceError::InvalidData(format!(
            "{owner} {owner_id} references unknown {kind} {id}"
        )))
    }
}

pub(crate) fn sort_weekly(bookings: &mut [Booking]) {
    bookings.sort_by_key(|booking| (booking.day_of_week, booking.start_time, booking.id));
}

pub(crate) fn sort_dated(activities: &mut [Activity]) {
    activities.sort_by_key(|activity| (activity.date, activity.start_time, activity.id));
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_booking_requests_from_csv, load_directory_from_json, load_snapshot_from_json,
    save_snapshot_to_json,
};
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
