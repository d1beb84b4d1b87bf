use chrono::{NaiveDate, NaiveTime};
use school_timetable::{
    AcademicPeriod, BookingRequest, BulkBookingRequest, Classroom, DayOfWeek, DirectorySnapshot,
    MemoryStore, PersistenceError, ScheduleManager, StoreSnapshot, Subject, Teacher,
    load_booking_requests_from_csv, load_directory_from_json, load_snapshot_from_json,
    save_snapshot_to_json,
};
use tempfile::NamedTempFile;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn directory() -> DirectorySnapshot {
    DirectorySnapshot {
        classrooms: vec![Classroom::new(1, "Class 9A", "9A"), Classroom::new(2, "Class 9B", "9B")],
        subjects: vec![Subject::new(1, "Physics", "PHY")],
        teachers: vec![
            Teacher::new(1, "Ana", "Lima", "alima"),
            Teacher::new(2, "Ben", "Okafor", "bokafor"),
        ],
    }
}

fn build_sample_manager() -> ScheduleManager {
    let mut manager = ScheduleManager::new(MemoryStore::with_directory(directory()));
    let period = AcademicPeriod::new("2024/2025", 1);
    let booking = manager
        .create_booking(
            BookingRequest::new(1, 1, 1, DayOfWeek::Monday, t(8, 0), t(9, 30), &period)
                .with_notes("Lab week"),
        )
        .unwrap();
    manager
        .create_booking(BookingRequest::new(2, 1, 2, DayOfWeek::Tuesday, t(10, 0), t(11, 0), &period))
        .unwrap();
    manager
        .generate_activity(booking.id(), NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(), "Optics")
        .unwrap();
    manager
}

fn write_temp(contents: &str) -> NamedTempFile {
    let tmp = NamedTempFile::new().expect("create temp file");
    std::fs::write(tmp.path(), contents).expect("write temp file");
    tmp
}

#[test]
fn json_snapshot_round_trip_restores_state_and_ids() {
    let manager = build_sample_manager();
    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.bookings.len(), 2);
    assert_eq!(snapshot.activities.len(), 1);

    let tmp = NamedTempFile::new().unwrap();
    save_snapshot_to_json(&snapshot, tmp.path()).unwrap();
    let loaded = load_snapshot_from_json(tmp.path()).unwrap();
    assert_eq!(loaded, snapshot);

    let mut restored = ScheduleManager::new(MemoryStore::from_snapshot(loaded).unwrap());
    let view = restored.get_booking(1).unwrap();
    assert_eq!(view.booking.notes.as_deref(), Some("Lab week"));
    assert_eq!(restored.get_activity(1).unwrap().activity.topic, "Optics");

    let next = restored
        .create_booking(BookingRequest::new(
            1,
            1,
            1,
            DayOfWeek::Friday,
            t(8, 0),
            t(9, 0),
            &AcademicPeriod::new("2024/2025", 1),
        ))
        .unwrap();
    assert_eq!(next.id(), 3);
}

#[test]
fn snapshot_with_dangling_reference_is_rejected() {
    let mut snapshot: StoreSnapshot = build_sample_manager().snapshot().unwrap();
    snapshot.directory.teachers.retain(|teacher| teacher.id != 2);

    let tmp = NamedTempFile::new().unwrap();
    let err = save_snapshot_to_json(&snapshot, tmp.path()).unwrap_err();
    match err {
        PersistenceError::InvalidData(message) => {
            assert_eq!(message, "booking 2 references unknown teacher 2")
        }
        other => panic!("unexpected error: {other}"),
    }

    std::fs::write(tmp.path(), serde_json::to_vec(&snapshot).unwrap()).unwrap();
    assert!(matches!(
        load_snapshot_from_json(tmp.path()),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[test]
fn directory_loads_from_json() {
    let tmp = write_temp(
        r#"{
            "classrooms": [{ "id": 4, "name": "Lab", "code": "LAB", "capacity": 24 }],
            "teachers": [{ "id": 7, "first_name": "Ana", "last_name": "Lima", "username": "alima" }]
        }"#,
    );
    let directory = load_directory_from_json(tmp.path()).unwrap();
    assert_eq!(directory.classrooms[0].capacity, Some(24));
    assert!(directory.subjects.is_empty());
    assert_eq!(directory.teachers[0].full_name(), "Ana Lima");
}

#[test]
fn csv_rows_become_booking_requests() {
    let tmp = write_temp(
        "classroom_id,subject_id,teacher_id,day_of_week,start_time,end_time,academic_year,semester,notes,is_active\n\
         1,1,1,Mon,08:00,09:00,2024/2025,1,Lab,\n\
         2,1,2,tuesday,10:00:00,11:30:00,2024/2025,1,,false\n",
    );
    let requests = load_booking_requests_from_csv(tmp.path()).unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].day_of_week, DayOfWeek::Monday);
    assert_eq!(requests[0].notes.as_deref(), Some("Lab"));
    assert!(requests[0].is_active);
    assert_eq!(requests[1].day_of_week, DayOfWeek::Tuesday);
    assert_eq!(requests[1].end_time, t(11, 30));
    assert_eq!(requests[1].notes, None);
    assert!(!requests[1].is_active);

    let mut manager = ScheduleManager::new(MemoryStore::with_directory(directory()));
    let outcome = manager.create_bulk(BulkBookingRequest::new(requests)).unwrap();
    assert_eq!(outcome.created.len(), 2);
    assert!(outcome.errors.is_empty());
}

#[test]
fn csv_errors_name_the_line() {
    let tmp = write_temp(
        "classroom_id,subject_id,teacher_id,day_of_week,start_time,end_time,academic_year,semester,notes,is_active\n\
         1,1,1,MONDAY,08:00,09:00,2024/2025,1,,\n\
         1,1,1,Funday,08:00,09:00,2024/2025,1,,\n",
    );
    let err = load_booking_requests_from_csv(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("line 3"), "got: {err}");

    let tmp = write_temp(
        "classroom_id,subject_id,teacher_id,day_of_week,start_time,end_time,academic_year,semester,notes,is_active\n\
         1,1,1,MONDAY,8 o'clock,09:00,2024/2025,1,,\n",
    );
    let err = load_booking_requests_from_csv(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("line 2: invalid time"), "got: {err}");

    let tmp = write_temp(
        "classroom_id,subject_id,teacher_id,day_of_week,start_time,end_time,academic_year,semester,notes,is_active\n",
    );
    let err = load_booking_requests_from_csv(tmp.path()).unwrap_err();
    assert_eq!(err.to_string(), "invalid data: CSV file contained no bookings");
}
