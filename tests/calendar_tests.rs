use chrono::{Datelike, NaiveDate, Weekday};
use school_timetable::calendar::{SchoolCalendar, SchoolCalendarConfig};
use school_timetable::ConfigError;
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn default_calendar_has_no_lessons_on_weekends() {
    let cal = SchoolCalendar::default();
    // 2025-01-04 is a Saturday, 2025-01-05 is a Sunday
    assert!(!cal.is_school_day(d(2025, 1, 4)));
    assert!(!cal.is_school_day(d(2025, 1, 5)));
    assert!(cal.is_school_day(d(2025, 1, 2)));
}

#[test]
fn next_school_day_skips_weekend_and_holidays() {
    let mut cal = SchoolCalendar::default();
    cal.add_holiday(d(2025, 1, 6));
    // Friday 2025-01-03 -> Monday is a holiday -> Tuesday
    let next = cal.next_school_day(d(2025, 1, 3));
    assert_eq!(next.weekday(), Weekday::Tue);
    assert_eq!(next, d(2025, 1, 7));
}

#[test]
fn school_days_in_range_and_count_match() {
    let cal = SchoolCalendar::default();
    let start = d(2025, 1, 6); // Mon
    let end = d(2025, 1, 19); // Sun, two weeks later
    let days = cal.school_days_in_range(start, end);
    assert_eq!(days.len(), 10);
    assert_eq!(cal.count_school_days(start, end), 10);
    assert_eq!(days.first().copied(), Some(start));
    assert_eq!(days.last().copied(), Some(d(2025, 1, 17)));
}

#[test]
fn breaks_block_every_day_in_between() {
    let mut cal = SchoolCalendar::default();
    cal.add_break(d(2025, 3, 31), d(2025, 4, 4));
    assert_eq!(cal.count_school_days(d(2025, 3, 31), d(2025, 4, 4)), 0);
    assert!(cal.is_holiday(d(2025, 4, 2)));
    assert!(cal.is_school_day(d(2025, 4, 7)));
}

#[test]
fn six_day_week_includes_saturday() {
    let mut cal = SchoolCalendar::default();
    cal.set_school_days(&[
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ])
    .unwrap();
    assert!(cal.is_school_day(d(2025, 1, 4)));
    assert!(!cal.is_school_day(d(2025, 1, 5)));
    assert!(cal.set_school_days(&[]).is_err());
}

#[test]
fn recurring_holidays_block_each_year() {
    let mut cal = SchoolCalendar::default();
    cal.add_recurring_holiday(8, 17, 2025, 2027);
    assert!(!cal.is_school_day(d(2026, 8, 17)));
    assert!(cal.is_holiday(d(2027, 8, 17)));
    assert!(!cal.is_holiday(d(2028, 8, 17)));
}

#[test]
fn custom_calendar_round_trips_through_config() {
    let mut school_days = vec![Weekday::Sat, Weekday::Mon, Weekday::Tue, Weekday::Mon];
    let holidays = vec![d(2025, 6, 19), d(2025, 7, 3)];
    let cal = SchoolCalendar::custom(school_days.clone(), holidays.clone()).unwrap();

    assert!(!cal.is_school_day(d(2025, 6, 20))); // Friday
    assert!(cal.is_school_day(d(2025, 6, 21))); // Saturday
    for holiday in &holidays {
        assert!(!cal.is_school_day(*holiday));
    }

    let config = cal.to_config();
    school_days.sort_by_key(|wd| wd.num_days_from_monday());
    school_days.dedup();
    assert_eq!(config.school_days(), school_days.as_slice());
    assert_eq!(config.holidays(), holidays.as_slice());
    assert_eq!(SchoolCalendar::from_config(&config).unwrap().to_config(), config);
}

#[test]
fn empty_school_week_is_rejected() {
    let err = SchoolCalendar::custom(Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidCalendar(_)));
    assert!(SchoolCalendarConfig::new(Vec::new(), Vec::new()).is_err());
}

#[test]
fn calendar_loads_from_json_file() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(
        tmp.path(),
        r#"{ "school_days": ["Mon", "Wed", "Fri"], "holidays": ["2025-01-08"] }"#,
    )
    .unwrap();
    let cal = SchoolCalendar::from_json_file(tmp.path()).unwrap();
    assert_eq!(cal.count_school_days(d(2025, 1, 6), d(2025, 1, 12)), 2);
    assert_eq!(cal.to_config(), SchoolCalendarConfig::new(
        [Weekday::Mon, Weekday::Wed, Weekday::Fri],
        [d(2025, 1, 8)],
    )
    .unwrap());
}
