use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::config::{ConfigError, read_json};

/// School days and holidays used when expanding bookings into dated activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolCalendar {
    holidays: HashSet<NaiveDate>,
    non_school_days: HashSet<Weekday>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolCalendarConfig {
    school_days: Vec<Weekday>,
    #[serde(default)]
    holidays: Vec<NaiveDate>,
}

impl Default for SchoolCalendar {
    fn default() -> Self {
        Self {
            holidays: HashSet::new(),
            non_school_days: HashSet::from([Weekday::Sat, Weekday::Sun]),
        }
    }
}

impl SchoolCalendar {
    const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    pub fn custom<I, J>(school_days: I, holidays: J) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let config = SchoolCalendarConfig::new(school_days, holidays)?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &SchoolCalendarConfig) -> Result<Self, ConfigError> {
        let school_set: HashSet<Weekday> = config.school_days.iter().copied().collect();
        if school_set.is_empty() {
            return Err(ConfigError::InvalidCalendar(
                "at least one school day is required".into(),
            ));
        }
        let non_school_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !school_set.contains(day))
            .collect();

        Ok(Self {
            holidays: config.holidays.iter().copied().collect(),
            non_school_days,
        })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: SchoolCalendarConfig = read_json(path.as_ref())?;
        Self::from_config(&config)
    }

    pub fn to_config(&self) -> SchoolCalendarConfig {
        SchoolCalendarConfig::from(self)
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        self.holidays.extend(dates);
    }

    /// Marks every date from `start` through `end` as a holiday.
    pub fn add_break(&mut self, start: NaiveDate, end: NaiveDate) {
        let mut current = start;
        while current <= end {
            self.holidays.insert(current);
            current = current + Duration::days(1);
        }
    }

    /// Add the same holiday for multiple years
    /// Example: Independence Day on Aug 17 for 2024-2030
    pub fn add_recurring_holiday(&mut self, month: u32, day: u32, start_year: i32, end_year: i32) {
        for year in start_year..=end_year {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                self.holidays.insert(date);
            }
        }
    }

    /// Set custom school days (e.g., Mon-Sat for 6-day weeks)
    pub fn set_school_days(&mut self, days: &[Weekday]) -> Result<(), ConfigError> {
        if days.is_empty() {
            return Err(ConfigError::InvalidCalendar(
                "at least one school day is required".into(),
            ));
        }
        self.non_school_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !days.contains(day))
            .collect();
        Ok(())
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Check if lessons take place on a date
    pub fn is_school_day(&self, date: NaiveDate) -> bool {
        !self.holidays.contains(&date) && !self.non_school_days.contains(&date.weekday())
    }

    /// Find the next school day after a given date
    pub fn next_school_day(&self, from: NaiveDate) -> NaiveDate {
        let mut current = from + Duration::days(1);
        while !self.is_school_day(current) {
            current = current + Duration::days(1);
        }
        current
    }

    /// Get all school days in a date range
    pub fn school_days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut current = start;

        while current <= end {
            if self.is_school_day(current) {
                days.push(current);
            }
            current = current + Duration::days(1);
        }
        days
    }

    pub fn count_school_days(&self, start: NaiveDate, end: NaiveDate) -> usize {
        self.school_days_in_range(start, end).len()
    }
}

impl SchoolCalendarConfig {
    pub fn new<I, J>(school_days: I, holidays: J) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let mut school: Vec<Weekday> = school_days.into_iter().collect();
        if school.is_empty() {
            return Err(ConfigError::InvalidCalendar(
                "at least one school day is required".into(),
            ));
        }
        school.sort_by_key(|wd| wd.num_days_from_monday());
        school.dedup();

        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort();
        holidays.dedup();

        Ok(Self {
            school_days: school,
            holidays,
        })
    }

    pub fn school_days(&self) -> &[Weekday] {
        &self.school_days
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }
}

impl Default for SchoolCalendarConfig {
    fn default() -> Self {
        SchoolCalendarConfig::from(&SchoolCalendar::default())
    }
}

impl From<&SchoolCalendar> for SchoolCalendarConfig {
    fn from(calendar: &SchoolCalendar) -> Self {
        let school_days = SchoolCalendar::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !calendar.non_school_days.contains(day))
            .collect();

        let mut holidays: Vec<NaiveDate> = calendar.holidays.iter().copied().collect();
        holidays.sort();

        Self {
            school_days,
            holidays,
        }
    }
}
