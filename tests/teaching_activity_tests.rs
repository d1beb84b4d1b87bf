use chrono::{NaiveDate, NaiveTime};
use school_timetable::{
    AcademicPeriod, ActivityPatch, ActivityRequest, ActivitySearch, BookingRequest, Classroom,
    ConflictKind, ConflictTarget, DateRange, DayOfWeek, MemoryStore, ResourceRef, ScheduleError,
    ScheduleManager, SchoolCalendar, Subject, Teacher,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Two Monday bookings for the same teacher, the second saved with an override.
fn manager_with_bookings() -> ScheduleManager {
    let mut store = MemoryStore::new();
    store.add_classroom(Classroom::new(1, "Class 7A", "7A"));
    store.add_classroom(Classroom::new(2, "Class 7B", "7B"));
    store.add_subject(Subject::new(1, "Mathematics", "MATH"));
    store.add_subject(Subject::new(2, "Biology", "BIO"));
    store.add_teacher(Teacher::new(1, "Ana", "Lima", "alima"));
    store.add_teacher(Teacher::new(2, "Ben", "Okafor", "bokafor"));
    let mut manager = ScheduleManager::new(store);

    let period = AcademicPeriod::new("2024/2025", 2);
    manager
        .create_booking(BookingRequest::new(1, 1, 1, DayOfWeek::Monday, t(8, 0), t(9, 0), &period))
        .unwrap();
    manager
        .create_booking(
            BookingRequest::new(2, 2, 1, DayOfWeek::Monday, t(8, 30), t(9, 30), &period)
                .allowing_overlap(),
        )
        .unwrap();
    manager
}

#[test]
fn generated_activity_copies_booking_slot() {
    let mut manager = manager_with_bookings();
    // 2025-01-06 is a Monday
    let view = manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();

    assert_eq!(view.activity.booking_id, 1);
    assert_eq!(view.activity.start_time, t(8, 0));
    assert_eq!(view.activity.end_time, t(9, 0));
    assert_eq!(view.activity.teacher_id, 1);
    assert_eq!(view.activity.classroom_id, 1);
    assert!(!view.activity.is_completed);
    assert_eq!(view.day_of_week, DayOfWeek::Monday);
    assert_eq!(view.duration_minutes, 60);
    assert_eq!(view.time_range, "08:00 - 09:00");
    assert_eq!(view.subject.code, "MATH");
}

#[test]
fn second_activity_for_same_booking_and_date_is_rejected() {
    let mut manager = manager_with_bookings();
    manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();
    let err = manager.generate_activity(1, d(2025, 1, 6), "Decimals").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Teaching activity already exists for schedule 1 on 2025-01-06"
    );
}

#[test]
fn overlapping_activities_of_one_teacher_conflict() {
    let mut manager = manager_with_bookings();
    let first = manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();
    let err = manager.generate_activity(2, d(2025, 1, 6), "Cells").unwrap_err();

    let conflicts = err.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::TeacherConflict);
    assert_eq!(conflicts[0].target, ConflictTarget::Activity);
    assert_eq!(conflicts[0].conflicting_id, first.id());
    assert_eq!(conflicts[0].date, Some(d(2025, 1, 6)));
    assert_eq!(conflicts[0].overlap_start, t(8, 30));
    assert_eq!(conflicts[0].overlap_end, t(9, 0));

    // Another week has no activity for booking 1 yet.
    manager.generate_activity(2, d(2025, 1, 13), "Cells").unwrap();
}

#[test]
fn explicit_request_can_shift_the_slot() {
    let mut manager = manager_with_bookings();
    manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();

    let mut request = ActivityRequest::new(2, d(2025, 1, 6), "Cells");
    request.start_time = Some(t(9, 0));
    request.end_time = Some(t(10, 0));
    request.description = Some("Microscope lab".into());
    let view = manager.create_activity(request).unwrap();
    assert_eq!(view.time_range, "09:00 - 10:00");
    assert_eq!(view.activity.description.as_deref(), Some("Microscope lab"));
}

#[test]
fn text_fields_are_validated() {
    let mut manager = manager_with_bookings();
    let err = manager.generate_activity(1, d(2025, 1, 6), "   ").unwrap_err();
    assert_eq!(err.to_string(), "Topic is required");

    let err = manager
        .generate_activity(1, d(2025, 1, 6), "x".repeat(201))
        .unwrap_err();
    assert_eq!(err.to_string(), "Topic cannot exceed 200 characters");

    let mut request = ActivityRequest::new(1, d(2025, 1, 6), "Fractions");
    request.notes = Some("n".repeat(501));
    let err = manager.create_activity(request).unwrap_err();
    assert_eq!(err.to_string(), "Notes cannot exceed 500 characters");

    let err = manager.generate_activity(99, d(2025, 1, 6), "Fractions").unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound { entity: "Schedule", id: 99 }));
}

#[test]
fn completion_round_trip() {
    let mut manager = manager_with_bookings();
    let view = manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();

    let done = manager
        .mark_activity_completed(view.id(), Some("Covered chapter 3".into()))
        .unwrap();
    assert!(done.activity.is_completed);
    assert_eq!(done.activity.notes.as_deref(), Some("Covered chapter 3"));

    let undone = manager.mark_activity_incomplete(view.id()).unwrap();
    assert!(!undone.activity.is_completed);
    assert_eq!(undone.activity.notes.as_deref(), Some("Covered chapter 3"));

    let err = manager.mark_activity_completed(view.id(), Some("n".repeat(501))).unwrap_err();
    assert!(matches!(err, ScheduleError::Validation(_)));
    assert!(!manager.get_activity(view.id()).unwrap().activity.is_completed);
}

#[test]
fn reschedule_moves_date_and_checks_conflicts() {
    let mut manager = manager_with_bookings();
    let maths = manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();
    let biology = manager.generate_activity(2, d(2025, 1, 13), "Cells").unwrap();

    let moved = manager
        .reschedule_activity(maths.id(), d(2025, 1, 7), t(10, 0), t(11, 0))
        .unwrap();
    assert_eq!(moved.day_of_week, DayOfWeek::Tuesday);
    assert_eq!(moved.time_range, "10:00 - 11:00");

    let err = manager
        .reschedule_activity(biology.id(), d(2025, 1, 7), t(10, 30), t(11, 30))
        .unwrap_err();
    assert_eq!(err.conflicts().len(), 1);

    let err = manager
        .reschedule_activity(biology.id(), d(2025, 1, 7), t(12, 0), t(11, 0))
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid time slot: start time must be before end time");

    let patch = ActivityPatch {
        topic: Some("Cell membranes".into()),
        ..ActivityPatch::default()
    };
    let updated = manager.update_activity(biology.id(), patch).unwrap();
    assert_eq!(updated.activity.topic, "Cell membranes");
    assert_eq!(updated.activity.date, d(2025, 1, 13));
}

#[test]
fn range_generation_skips_holidays_existing_and_conflicting_dates() {
    let mut manager = manager_with_bookings();
    manager.generate_activity(1, d(2025, 1, 6), "Intro").unwrap();

    let mut calendar = SchoolCalendar::default();
    calendar.add_holiday(d(2025, 1, 13));
    let range = DateRange::new(d(2025, 1, 6), d(2025, 1, 26)).unwrap();

    let report = manager
        .generate_activities_for_range(&[1, 2], &range, "Weekly lesson", &calendar)
        .unwrap();

    let generated: Vec<_> = report
        .generated
        .iter()
        .map(|view| (view.activity.booking_id, view.activity.date))
        .collect();
    assert_eq!(generated, vec![(1, d(2025, 1, 20))]);

    let skipped: Vec<_> = report
        .skipped
        .iter()
        .map(|s| (s.booking_id, s.date, s.reason.as_str()))
        .collect();
    assert_eq!(
        skipped,
        vec![
            (1, d(2025, 1, 6), "activity already exists"),
            (1, d(2025, 1, 13), "not a school day"),
            (2, d(2025, 1, 6), "conflicts with 1 other activities"),
            (2, d(2025, 1, 13), "not a school day"),
            (2, d(2025, 1, 20), "conflicts with 1 other activities"),
        ]
    );

    let err = manager
        .generate_activities_for_range(&[1, 404], &range, "Weekly lesson", &calendar)
        .unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound { id: 404, .. }));
}

#[test]
fn queries_by_resource_date_and_search() {
    let mut manager = manager_with_bookings();
    let a = manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();
    let b = manager.generate_activity(2, d(2025, 1, 13), "Plant cells").unwrap();
    manager.generate_activity(1, d(2025, 1, 20), "Decimals").unwrap();
    manager.mark_activity_completed(a.id(), None).unwrap();

    let range = DateRange::new(d(2025, 1, 1), d(2025, 1, 14)).unwrap();
    let in_room = manager.activities_for(ResourceRef::Classroom(2), &range).unwrap();
    assert_eq!(in_room.len(), 1);
    assert_eq!(in_room[0].id(), b.id());

    let upcoming = manager.upcoming_activities_for_teacher(1, d(2025, 1, 6), 7).unwrap();
    let dates: Vec<_> = upcoming.iter().map(|v| v.activity.date).collect();
    assert_eq!(dates, vec![d(2025, 1, 6), d(2025, 1, 13)]);

    assert_eq!(manager.activities_on(d(2025, 1, 20)).unwrap().len(), 1);

    let search = ActivitySearch {
        topic: Some("CELL".into()),
        ..ActivitySearch::default()
    };
    let page = manager.search_activities(&search).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id(), b.id());

    let open = ActivitySearch {
        is_completed: Some(false),
        teacher_id: Some(1),
        ..ActivitySearch::default()
    };
    assert_eq!(manager.search_activities(&open).unwrap().total, 2);
}

#[test]
fn upcoming_window_includes_its_last_day() {
    let mut manager = manager_with_bookings();
    manager.generate_activity(1, d(2025, 1, 13), "Fractions").unwrap();
    manager.generate_activity(1, d(2025, 1, 20), "Decimals").unwrap();

    let week = manager.upcoming_activities_for_teacher(1, d(2025, 1, 6), 7).unwrap();
    let dates: Vec<_> = week.iter().map(|v| v.activity.date).collect();
    assert_eq!(dates, vec![d(2025, 1, 13)]);

    let same_day = manager.upcoming_activities_for_teacher(1, d(2025, 1, 13), 0).unwrap();
    assert_eq!(same_day.len(), 1);
    assert!(manager
        .upcoming_activities_for_teacher(1, d(2025, 1, 14), 5)
        .unwrap()
        .is_empty());
    assert_eq!(
        manager.upcoming_activities_for_teacher(1, d(2025, 1, 14), 6).unwrap().len(),
        1
    );
}

#[test]
fn deleting_booking_removes_its_activities() {
    let mut manager = manager_with_bookings();
    let activity = manager.generate_activity(1, d(2025, 1, 6), "Fractions").unwrap();
    let kept = manager.generate_activity(2, d(2025, 1, 13), "Cells").unwrap();

    manager.delete_booking(1).unwrap();
    let err = manager.get_activity(activity.id()).unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound { entity: "TeachingActivity", .. }));
    assert!(manager.get_activity(kept.id()).is_ok());

    manager.delete_activity(kept.id()).unwrap();
    assert!(manager.delete_activity(kept.id()).is_err());
}
