use crate::error::{ScheduleError, ScheduleResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static ACADEMIC_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}/\d{4}$").expect("academic year pattern is valid"));

/// An academic year plus semester, the key every booking is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AcademicPeriod {
    pub academic_year: String,
    pub semester: u8,
}

impl AcademicPeriod {
    pub fn new(academic_year: impl Into<String>, semester: u8) -> Self {
        Self {
            academic_year: academic_year.into(),
            semester,
        }
    }

    /// Every problem with the period, empty when it is well formed.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !is_valid_academic_year(&self.academic_year) {
            problems.push("Academic year must be in format YYYY/YYYY".to_string());
        }
        if !is_valid_semester(self.semester) {
            problems.push("Semester must be 1 or 2".to_string());
        }
        problems
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ScheduleError::Validation(problems.join("; ")))
        }
    }
}

impl fmt::Display for AcademicPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} semester {}", self.academic_year, self.semester)
    }
}

pub fn is_valid_academic_year(value: &str) -> bool {
    ACADEMIC_YEAR.is_match(value)
}

pub fn is_valid_semester(semester: u8) -> bool {
    matches!(semester, 1 | 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_period() {
        assert!(AcademicPeriod::new("2024/2025", 1).validate().is_ok());
        assert!(AcademicPeriod::new("2024/2025", 2).validate().is_ok());
    }

    #[test]
    fn rejects_malformed_year() {
        for year in ["2024-2025", "24/25", "2024/2025 ", "abcd/efgh", ""] {
            assert!(!is_valid_academic_year(year), "{year:?} should be rejected");
        }
    }

    #[test]
    fn reports_both_problems() {
        let period = AcademicPeriod::new("2024", 3);
        let problems = period.problems();
        assert_eq!(problems.len(), 2);
        let err = period.validate().unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(msg) if msg.contains("Semester must be 1 or 2")));
    }
}
