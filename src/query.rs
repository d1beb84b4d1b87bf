//! Selectors and paging shared by booking and activity queries.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::directory::{ClassroomId, SubjectId, TeacherId};
use crate::error::{ScheduleError, ScheduleResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;

pub(crate) fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// The entity a timetable or listing is built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Classroom(ClassroomId),
    Teacher(TeacherId),
    Subject(SubjectId),
}

impl ResourceRef {
    pub fn id(&self) -> i64 {
        match *self {
            ResourceRef::Classroom(id) | ResourceRef::Teacher(id) | ResourceRef::Subject(id) => id,
        }
    }

    pub fn matches(&self, classroom_id: ClassroomId, subject_id: SubjectId, teacher_id: TeacherId) -> bool {
        match *self {
            ResourceRef::Classroom(id) => id == classroom_id,
            ResourceRef::Teacher(id) => id == teacher_id,
            ResourceRef::Subject(id) => id == subject_id,
        }
    }
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ScheduleResult<Self> {
        if start > end {
            return Err(ScheduleError::validation(format!(
                "Date range start {start} must not be after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every date in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start
            .iter_days()
            .take_while(move |date| *date <= self.end)
    }

    /// Range from `from` through `from + days`, both ends included.
    pub fn starting_at(from: NaiveDate, days: u64) -> ScheduleResult<Self> {
        let end = from
            .checked_add_days(Days::new(days))
            .ok_or_else(|| ScheduleError::validation("Date range exceeds the supported calendar"))?;
        Self::new(from, end)
    }
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

impl<T> Page<T> {
    /// Slices `items` to the requested zero-based page. A size of 0 falls back to the default.
    pub fn slice(items: Vec<T>, page: usize, size: usize) -> Self {
        let size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };
        let total = items.len();
        let items = items
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .collect();
        Self {
            items,
            total,
            page,
            size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_range_iterates_inclusive() {
        let range = DateRange::new(d(2025, 1, 30), d(2025, 2, 2)).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(days, vec![d(2025, 1, 30), d(2025, 1, 31), d(2025, 2, 1), d(2025, 2, 2)]);
        assert!(DateRange::new(d(2025, 2, 2), d(2025, 1, 1)).is_err());
    }

    #[test]
    fn starting_at_includes_the_last_day() {
        let range = DateRange::starting_at(d(2025, 3, 3), 7).unwrap();
        assert_eq!(range.end, d(2025, 3, 10));
        assert_eq!(range.days().count(), 8);
        let single = DateRange::starting_at(d(2025, 3, 3), 0).unwrap();
        assert_eq!(single.start, single.end);
    }

    #[test]
    fn page_slices_and_reports_total() {
        let page = Page::slice((1..=45).collect::<Vec<_>>(), 2, 20);
        assert_eq!(page.total, 45);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        let past_end = Page::slice(vec![1, 2, 3], 5, 2);
        assert!(past_end.items.is_empty());
    }

    #[test]
    fn resource_ref_matches_its_dimension() {
        assert!(ResourceRef::Teacher(7).matches(1, 2, 7));
        assert!(!ResourceRef::Classroom(7).matches(1, 2, 7));
        assert!(ResourceRef::Subject(2).matches(1, 2, 7));
    }
}
