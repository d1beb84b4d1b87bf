#![cfg(feature = "sqlite")]

use chrono::{NaiveDate, NaiveTime};
use school_timetable::{
    AcademicPeriod, ActivityStore, BookingRequest, BookingStore, Classroom, DateRange, DayOfWeek,
    Directory, DirectorySnapshot, ResourceRef, ScheduleManager, SqliteStore, Subject, Teacher,
};
use tempfile::NamedTempFile;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn directory() -> DirectorySnapshot {
    let mut lab = Classroom::new(2, "Science Lab", "LAB");
    lab.capacity = Some(24);
    lab.location = Some("Building B".into());
    let mut teacher = Teacher::new(1, "Ana", "Lima", "alima");
    teacher.email = Some("ana@example.org".into());
    DirectorySnapshot {
        classrooms: vec![Classroom::new(1, "Class 9A", "9A"), lab],
        subjects: vec![Subject::new(1, "Chemistry", "CHEM")],
        teachers: vec![teacher, Teacher::new(2, "Ben", "Okafor", "bokafor")],
    }
}

fn open_store(file: &NamedTempFile) -> SqliteStore {
    SqliteStore::new(file.path()).expect("open sqlite store")
}

#[test]
fn sqlite_store_persists_bookings_and_activities_across_reopen() {
    let file = NamedTempFile::new().unwrap();
    let period = AcademicPeriod::new("2024/2025", 2);

    {
        let mut store = open_store(&file);
        store.load_directory(&directory()).unwrap();
        let mut manager = ScheduleManager::new(store);
        let booking = manager
            .create_booking(
                BookingRequest::new(2, 1, 1, DayOfWeek::Wednesday, t(13, 0), t(14, 30), &period)
                    .with_notes("Bring goggles"),
            )
            .unwrap();
        manager
            .create_booking(BookingRequest::new(1, 1, 2, DayOfWeek::Monday, t(8, 0), t(9, 0), &period))
            .unwrap();
        manager
            .generate_activity(booking.id(), d(2025, 2, 5), "Titration")
            .unwrap();
    }

    let store = open_store(&file);
    assert_eq!(store.directory_snapshot().unwrap(), directory());

    let bookings = store.bookings_in_period(&period).unwrap();
    let days: Vec<_> = bookings.iter().map(|b| b.day_of_week).collect();
    assert_eq!(days, vec![DayOfWeek::Monday, DayOfWeek::Wednesday]);
    let lab = &bookings[1];
    assert_eq!(lab.start_time, t(13, 0));
    assert_eq!(lab.end_time, t(14, 30));
    assert_eq!(lab.notes.as_deref(), Some("Bring goggles"));
    assert!(lab.is_active);

    let activity = store.activity_for_booking_on(lab.id, d(2025, 2, 5)).unwrap().unwrap();
    assert_eq!(activity.topic, "Titration");
    assert_eq!(activity.classroom_id, 2);

    let range = DateRange::new(d(2025, 2, 1), d(2025, 2, 28)).unwrap();
    assert_eq!(store.activities_for(ResourceRef::Teacher(1), &range).unwrap().len(), 1);
    assert!(store.activities_for(ResourceRef::Teacher(2), &range).unwrap().is_empty());
}

#[test]
fn sqlite_conflict_queries_match_the_memory_store() {
    let mut store = SqliteStore::in_memory().unwrap();
    store.load_directory(&directory()).unwrap();
    let mut manager = ScheduleManager::new(store);
    let period = AcademicPeriod::new("2024/2025", 1);

    manager
        .create_booking(BookingRequest::new(1, 1, 1, DayOfWeek::Monday, t(8, 0), t(9, 0), &period))
        .unwrap();
    let err = manager
        .create_booking(BookingRequest::new(1, 1, 2, DayOfWeek::Monday, t(8, 30), t(9, 30), &period))
        .unwrap_err();
    assert_eq!(err.conflicts().len(), 1);
    assert_eq!(err.conflicts()[0].conflicting_entity, "Class 9A");

    let teacher_day = manager
        .store()
        .bookings_for_teacher_on(1, DayOfWeek::Monday, &period)
        .unwrap();
    assert_eq!(teacher_day.len(), 1);
    let room_day = manager
        .store()
        .bookings_for_classroom_on(1, DayOfWeek::Tuesday, &period)
        .unwrap();
    assert!(room_day.is_empty());
}

#[test]
fn sqlite_delete_cascades_to_activities() {
    let mut store = SqliteStore::in_memory().unwrap();
    store.load_directory(&directory()).unwrap();
    let mut manager = ScheduleManager::new(store);
    let period = AcademicPeriod::new("2024/2025", 1);
    let booking = manager
        .create_booking(BookingRequest::new(1, 1, 1, DayOfWeek::Monday, t(8, 0), t(9, 0), &period))
        .unwrap();
    let activity = manager.generate_activity(booking.id(), d(2024, 9, 2), "Atoms").unwrap();

    manager.delete_booking(booking.id()).unwrap();
    assert!(manager.store().activity(activity.id()).unwrap().is_none());
    assert!(manager.store().all_activities().unwrap().is_empty());
}

#[test]
fn sqlite_directory_load_replaces_records() {
    let mut store = SqliteStore::in_memory().unwrap();
    store.load_directory(&directory()).unwrap();

    let renamed = DirectorySnapshot {
        classrooms: vec![Classroom::new(1, "Class 9A (annex)", "9A")],
        ..DirectorySnapshot::default()
    };
    store.load_directory(&renamed).unwrap();

    assert_eq!(store.classroom(1).unwrap().unwrap().name, "Class 9A (annex)");
    assert_eq!(store.classroom(2).unwrap().unwrap().capacity, Some(24));
    assert_eq!(
        store.teacher(1).unwrap().unwrap().email.as_deref(),
        Some("ana@example.org")
    );
    assert!(store.subject(5).unwrap().is_none());
}

#[test]
fn sqlite_update_reports_missing_rows() {
    let mut store = SqliteStore::in_memory().unwrap();
    store.load_directory(&directory()).unwrap();
    let period = AcademicPeriod::new("2024/2025", 1);
    let mut booking = store
        .insert_booking(
            BookingRequest::new(1, 1, 1, DayOfWeek::Friday, t(10, 0), t(11, 0), &period).to_booking(),
        )
        .unwrap();
    assert!(booking.id > 0);

    booking.is_active = false;
    assert!(store.update_booking(&booking).unwrap());
    assert!(!store.booking(booking.id).unwrap().unwrap().is_active);

    booking.id = 999;
    assert!(!store.update_booking(&booking).unwrap());
    assert!(!store.delete_booking(999).unwrap());
}
