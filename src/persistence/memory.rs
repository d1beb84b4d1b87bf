use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{
    ActivityStore, BookingStore, Directory, PersistenceResult, StoreSnapshot, sort_dated,
    sort_weekly, validate_snapshot,
};
use crate::activity::{Activity, ActivityId};
use crate::booking::{Booking, BookingId, DayOfWeek};
use crate::directory::{Classroom, ClassroomId, DirectorySnapshot, Subject, SubjectId, Teacher, TeacherId};
use crate::period::AcademicPeriod;
use crate::query::{DateRange, ResourceRef};

/// In-process store backed by ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    classrooms: BTreeMap<ClassroomId, Classroom>,
    subjects: BTreeMap<SubjectId, Subject>,
    teachers: BTreeMap<TeacherId, Teacher>,
    bookings: BTreeMap<BookingId, Booking>,
    activities: BTreeMap<ActivityId, Activity>,
    last_booking_id: BookingId,
    last_activity_id: ActivityId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory(directory: DirectorySnapshot) -> Self {
        let mut store = Self::new();
        store.replicate(&directory);
        store
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> PersistenceResult<Self> {
        validate_snapshot(&snapshot)?;
        let mut store = Self::with_directory(snapshot.directory);
        for booking in snapshot.bookings {
            store.last_booking_id = store.last_booking_id.max(booking.id);
            store.bookings.insert(booking.id, booking);
        }
        for activity in snapshot.activities {
            store.last_activity_id = store.last_activity_id.max(activity.id);
            store.activities.insert(activity.id, activity);
        }
        Ok(store)
    }

    pub fn add_classroom(&mut self, classroom: Classroom) {
        self.classrooms.insert(classroom.id, classroom);
    }

    pub fn add_subject(&mut self, subject: Subject) {
        self.subjects.insert(subject.id, subject);
    }

    pub fn add_teacher(&mut self, teacher: Teacher) {
        self.teachers.insert(teacher.id, teacher);
    }

    fn replicate(&mut self, directory: &DirectorySnapshot) {
        for classroom in &directory.classrooms {
            self.add_classroom(classroom.clone());
        }
        for subject in &directory.subjects {
            self.add_subject(subject.clone());
        }
        for teacher in &directory.teachers {
            self.add_teacher(teacher.clone());
        }
    }

    fn bookings_where(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut found: Vec<Booking> = self.bookings.values().filter(|b| keep(b)).cloned().collect();
        sort_weekly(&mut found);
        found
    }

    fn activities_where(&self, keep: impl Fn(&Activity) -> bool) -> Vec<Activity> {
        let mut found: Vec<Activity> = self.activities.values().filter(|a| keep(a)).cloned().collect();
        sort_dated(&mut found);
        found
    }
}

impl Directory for MemoryStore {
    fn classroom(&self, id: ClassroomId) -> PersistenceResult<Option<Classroom>> {
        Ok(self.classrooms.get(&id).cloned())
    }

    fn subject(&self, id: SubjectId) -> PersistenceResult<Option<Subject>> {
        Ok(self.subjects.get(&id).cloned())
    }

    fn teacher(&self, id: TeacherId) -> PersistenceResult<Option<Teacher>> {
        Ok(self.teachers.get(&id).cloned())
    }

    fn directory_snapshot(&self) -> PersistenceResult<DirectorySnapshot> {
        Ok(DirectorySnapshot {
            classrooms: self.classrooms.values().cloned().collect(),
            subjects: self.subjects.values().cloned().collect(),
            teachers: self.teachers.values().cloned().collect(),
        })
    }

    fn load_directory(&mut self, snapshot: &DirectorySnapshot) -> PersistenceResult<()> {
        self.replicate(snapshot);
        Ok(())
    }
}

impl BookingStore for MemoryStore {
    fn insert_booking(&mut self, mut booking: Booking) -> PersistenceResult<Booking> {
        self.last_booking_id += 1;
        booking.id = self.last_booking_id;
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    fn update_booking(&mut self, booking: &Booking) -> PersistenceResult<bool> {
        match self.bookings.get_mut(&booking.id) {
            Some(stored) => {
                *stored = booking.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_booking(&mut self, id: BookingId) -> PersistenceResult<bool> {
        let removed = self.bookings.remove(&id).is_some();
        if removed {
            self.activities.retain(|_, activity| activity.booking_id != id);
        }
        Ok(removed)
    }

    fn booking(&self, id: BookingId) -> PersistenceResult<Option<Booking>> {
        Ok(self.bookings.get(&id).cloned())
    }

    fn bookings_for_teacher_on(
        &self,
        teacher_id: TeacherId,
        day: DayOfWeek,
        period: &AcademicPeriod,
    ) -> PersistenceResult<Vec<Booking>> {
        Ok(self.bookings_where(|b| b.teacher_id == teacher_id && b.day_of_week == day && b.in_period(period)))
    }

    fn bookings_for_classroom_on(
        &self,
        classroom_id: ClassroomId,
        day: DayOfWeek,
        period: &AcademicPeriod,
    ) -> PersistenceResult<Vec<Booking>> {
        Ok(self.bookings_where(|b| {
            b.classroom_id == classroom_id && b.day_of_week == day && b.in_period(period)
        }))
    }

    fn bookings_in_period(&self, period: &AcademicPeriod) -> PersistenceResult<Vec<Booking>> {
        Ok(self.bookings_where(|b| b.in_period(period)))
    }

    fn bookings_for(&self, resource: ResourceRef, period: &AcademicPeriod) -> PersistenceResult<Vec<Booking>> {
        Ok(self.bookings_where(|b| {
            b.in_period(period) && resource.matches(b.classroom_id, b.subject_id, b.teacher_id)
        }))
    }

    fn all_bookings(&self) -> PersistenceResult<Vec<Booking>> {
        Ok(self.bookings.values().cloned().collect())
    }
}

impl ActivityStore for MemoryStore {
    fn insert_activity(&mut self, mut activity: Activity) -> PersistenceResult<Activity> {
        self.last_activity_id += 1;
        activity.id = self.last_activity_id;
        self.activities.insert(activity.id, activity.clone());
        Ok(activity)
    }

    fn update_activity(&mut self, activity: &Activity) -> PersistenceResult<bool> {
        match self.activities.get_mut(&activity.id) {
            Some(stored) => {
                *stored = activity.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_activity(&mut self, id: ActivityId) -> PersistenceResult<bool> {
        Ok(self.activities.remove(&id).is_some())
    }

    fn activity(&self, id: ActivityId) -> PersistenceResult<Option<Activity>> {
        Ok(self.activities.get(&id).cloned())
    }

    fn activity_for_booking_on(&self, booking_id: BookingId, date: NaiveDate) -> PersistenceResult<Option<Activity>> {
        Ok(self
            .activities
            .values()
            .find(|a| a.booking_id == booking_id && a.date == date)
            .cloned())
    }

    fn activities_for(&self, resource: ResourceRef, range: &DateRange) -> PersistenceResult<Vec<Activity>> {
        Ok(self.activities_where(|a| {
            range.contains(a.date) && resource.matches(a.classroom_id, a.subject_id, a.teacher_id)
        }))
    }

    fn activities_on(&self, date: NaiveDate) -> PersistenceResult<Vec<Activity>> {
        Ok(self.activities_where(|a| a.date == date))
    }

    fn all_activities(&self) -> PersistenceResult<Vec<Activity>> {
        Ok(self.activities.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_classroom(Classroom::new(1, "Class 7A", "7A"));
        store.add_subject(Subject::new(1, "Mathematics", "MATH"));
        store.add_teacher(Teacher::new(1, "Ann", "Lee", "alee"));
        store
    }

    fn booking(day: DayOfWeek, start: u32) -> Booking {
        Booking {
            id: 0,
            classroom_id: 1,
            subject_id: 1,
            teacher_id: 1,
            day_of_week: day,
            start_time: t(start),
            end_time: t(start + 1),
            academic_year: "2024/2025".to_string(),
            semester: 1,
            is_active: true,
            notes: None,
        }
    }

    #[test]
    fn assigns_increasing_ids_and_orders_weekly() {
        let mut store = seeded();
        let late = store.insert_booking(booking(DayOfWeek::Monday, 10)).unwrap();
        let early = store.insert_booking(booking(DayOfWeek::Monday, 8)).unwrap();
        let tuesday = store.insert_booking(booking(DayOfWeek::Tuesday, 7)).unwrap();
        assert_eq!((late.id, early.id, tuesday.id), (1, 2, 3));

        let ordered = store
            .bookings_for(ResourceRef::Teacher(1), &AcademicPeriod::new("2024/2025", 1))
            .unwrap();
        let ids: Vec<_> = ordered.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn snapshot_restore_continues_id_sequence() {
        let mut store = seeded();
        store.insert_booking(booking(DayOfWeek::Monday, 8)).unwrap();
        store.insert_booking(booking(DayOfWeek::Monday, 9)).unwrap();
        store.delete_booking(1).unwrap();

        let snapshot = StoreSnapshot::capture(&store).unwrap();
        let mut restored = MemoryStore::from_snapshot(snapshot).unwrap();
        let next = restored.insert_booking(booking(DayOfWeek::Friday, 8)).unwrap();
        assert_eq!(next.id, 3);
    }

    #[test]
    fn deleting_booking_drops_its_activities() {
        let mut store = seeded();
        let stored = store.insert_booking(booking(DayOfWeek::Monday, 8)).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        store
            .insert_activity(Activity {
                id: 0,
                booking_id: stored.id,
                date,
                start_time: t(8),
                end_time: t(9),
                topic: "Fractions".to_string(),
                description: None,
                notes: None,
                is_completed: false,
                subject_id: 1,
                classroom_id: 1,
                teacher_id: 1,
            })
            .unwrap();
        assert!(store.activity_for_booking_on(stored.id, date).unwrap().is_some());
        assert!(store.delete_booking(stored.id).unwrap());
        assert!(store.all_activities().unwrap().is_empty());
        assert!(!store.delete_booking(stored.id).unwrap());
    }
}
