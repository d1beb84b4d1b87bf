//! Overlap detection for teacher and classroom claims.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveTime};
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activity::Activity;
use crate::booking::{Booking, BookingId, BookingRequest, DayOfWeek};
use crate::directory::{ClassroomId, TeacherId};
use crate::error::ScheduleResult;
use crate::period::AcademicPeriod;
use crate::persistence::SchoolStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    TeacherConflict,
    ClassroomConflict,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::TeacherConflict => "TEACHER_CONFLICT",
            ConflictKind::ClassroomConflict => "CLASSROOM_CONFLICT",
        }
    }

    fn candidate_description(&self) -> &'static str {
        match self {
            ConflictKind::TeacherConflict => "Teacher has another class at this time",
            ConflictKind::ClassroomConflict => "Classroom is already occupied at this time",
        }
    }

    fn audit_description(&self) -> &'static str {
        match self {
            ConflictKind::TeacherConflict => "Teacher has conflicting schedules",
            ConflictKind::ClassroomConflict => "Classroom has conflicting schedules",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictTarget {
    Booking,
    Activity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
}

/// One overlapping claim on a teacher or classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub target: ConflictTarget,
    /// Booking or activity being checked; absent for an unsaved candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_id: Option<i64>,
    pub conflicting_id: i64,
    /// Teacher full name or classroom name.
    pub conflicting_entity: String,
    pub description: String,
    pub day_of_week: DayOfWeek,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub overlap_start: NaiveTime,
    pub overlap_end: NaiveTime,
    pub severity: Severity,
}

/// Half-open overlap: back-to-back ranges do not collide.
pub fn overlaps(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}

pub fn overlap_range(
    s1: NaiveTime,
    e1: NaiveTime,
    s2: NaiveTime,
    e2: NaiveTime,
) -> Option<(NaiveTime, NaiveTime)> {
    overlaps(s1, e1, s2, e2).then(|| (s1.max(s2), e1.min(e2)))
}

/// The resource claims of a booking that may not be saved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub teacher_id: TeacherId,
    pub classroom_id: ClassroomId,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub period: AcademicPeriod,
}

impl From<&Booking> for Candidate {
    fn from(booking: &Booking) -> Self {
        Self {
            teacher_id: booking.teacher_id,
            classroom_id: booking.classroom_id,
            day_of_week: booking.day_of_week,
            start_time: booking.start_time,
            end_time: booking.end_time,
            period: booking.period(),
        }
    }
}

impl From<&BookingRequest> for Candidate {
    fn from(request: &BookingRequest) -> Self {
        Self {
            teacher_id: request.teacher_id,
            classroom_id: request.classroom_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            period: request.period(),
        }
    }
}

pub struct ConflictDetector<'a> {
    store: &'a dyn SchoolStore,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(store: &'a dyn SchoolStore) -> Self {
        Self { store }
    }

    /// Conflicts between `candidate` and the active bookings sharing its
    /// teacher or classroom. `exclude` drops the candidate's own row on update.
    pub fn detect(&self, candidate: &Candidate, exclude: Option<BookingId>) -> ScheduleResult<Vec<Conflict>> {
        let mut conflicts = Vec::new();

        let teacher_clashes = self.teacher_clashes(
            candidate.teacher_id,
            candidate.day_of_week,
            candidate.start_time,
            candidate.end_time,
            &candidate.period,
            exclude,
        )?;
        if !teacher_clashes.is_empty() {
            let name = self.teacher_name(candidate.teacher_id)?;
            conflicts.extend(teacher_clashes.iter().map(|existing| {
                booking_conflict(ConflictKind::TeacherConflict, candidate, exclude, existing, &name)
            }));
        }

        let classroom_clashes = self.classroom_clashes(
            candidate.classroom_id,
            candidate.day_of_week,
            candidate.start_time,
            candidate.end_time,
            &candidate.period,
            exclude,
        )?;
        if !classroom_clashes.is_empty() {
            let name = self.classroom_name(candidate.classroom_id)?;
            conflicts.extend(classroom_clashes.iter().map(|existing| {
                booking_conflict(ConflictKind::ClassroomConflict, candidate, exclude, existing, &name)
            }));
        }

        debug!(
            teacher_id = candidate.teacher_id,
            classroom_id = candidate.classroom_id,
            day = %candidate.day_of_week,
            conflicts = conflicts.len(),
            "conflict detection finished"
        );
        Ok(conflicts)
    }

    /// Active bookings of `teacher_id` on `day` overlapping `[start, end)`.
    pub fn teacher_clashes(
        &self,
        teacher_id: TeacherId,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        period: &AcademicPeriod,
        exclude: Option<BookingId>,
    ) -> ScheduleResult<Vec<Booking>> {
        let existing = self.store.bookings_for_teacher_on(teacher_id, day, period)?;
        Ok(clashing(existing, start, end, exclude))
    }

    /// Active bookings of `classroom_id` on `day` overlapping `[start, end)`.
    pub fn classroom_clashes(
        &self,
        classroom_id: ClassroomId,
        day: DayOfWeek,
        start: NaiveTime,
        end: NaiveTime,
        period: &AcademicPeriod,
        exclude: Option<BookingId>,
    ) -> ScheduleResult<Vec<Booking>> {
        let existing = self.store.bookings_for_classroom_on(classroom_id, day, period)?;
        Ok(clashing(existing, start, end, exclude))
    }

    /// Other activities on the same date that share a teacher or classroom
    /// with `activity` and overlap it. Bookings are not consulted.
    pub fn detect_for_activity(&self, activity: &Activity) -> ScheduleResult<Vec<Conflict>> {
        let same_day = self.store.activities_on(activity.date)?;
        let mut conflicts = Vec::new();
        for other in same_day.iter().filter(|other| other.id != activity.id) {
            let Some((overlap_start, overlap_end)) =
                overlap_range(activity.start_time, activity.end_time, other.start_time, other.end_time)
            else {
                continue;
            };
            if other.teacher_id == activity.teacher_id {
                conflicts.push(activity_conflict(
                    ConflictKind::TeacherConflict,
                    activity,
                    other,
                    self.teacher_name(activity.teacher_id)?,
                    (overlap_start, overlap_end),
                ));
            }
            if other.classroom_id == activity.classroom_id {
                conflicts.push(activity_conflict(
                    ConflictKind::ClassroomConflict,
                    activity,
                    other,
                    self.classroom_name(activity.classroom_id)?,
                    (overlap_start, overlap_end),
                ));
            }
        }
        Ok(conflicts)
    }

    /// Every colliding pair among the bookings of `period`, active or not.
    pub fn audit(&self, period: &AcademicPeriod) -> ScheduleResult<Vec<Conflict>> {
        let bookings = self.store.bookings_in_period(period)?;

        let mut teacher_names = HashMap::new();
        let mut classroom_names = HashMap::new();
        for booking in &bookings {
            if !teacher_names.contains_key(&booking.teacher_id) {
                teacher_names.insert(booking.teacher_id, self.teacher_name(booking.teacher_id)?);
            }
            if !classroom_names.contains_key(&booking.classroom_id) {
                classroom_names.insert(booking.classroom_id, self.classroom_name(booking.classroom_id)?);
            }
        }

        let conflicts = pairwise_conflicts(&bookings, &teacher_names, &classroom_names);
        debug!(
            period = %period,
            bookings = bookings.len(),
            conflicts = conflicts.len(),
            "conflict audit finished"
        );
        Ok(conflicts)
    }

    fn teacher_name(&self, id: TeacherId) -> ScheduleResult<String> {
        Ok(self
            .store
            .teacher(id)?
            .map(|teacher| teacher.full_name())
            .unwrap_or_else(|| format!("teacher #{id}")))
    }

    fn classroom_name(&self, id: ClassroomId) -> ScheduleResult<String> {
        Ok(self
            .store
            .classroom(id)?
            .map(|classroom| classroom.name)
            .unwrap_or_else(|| format!("classroom #{id}")))
    }
}

fn clashing(
    existing: Vec<Booking>,
    start: NaiveTime,
    end: NaiveTime,
    exclude: Option<BookingId>,
) -> Vec<Booking> {
    existing
        .into_iter()
        .filter(|booking| booking.is_active)
        .filter(|booking| exclude != Some(booking.id))
        .filter(|booking| overlaps(start, end, booking.start_time, booking.end_time))
        .collect()
}

fn booking_conflict(
    kind: ConflictKind,
    candidate: &Candidate,
    checked_id: Option<BookingId>,
    existing: &Booking,
    entity: &str,
) -> Conflict {
    Conflict {
        kind,
        target: ConflictTarget::Booking,
        checked_id,
        conflicting_id: existing.id,
        conflicting_entity: entity.to_string(),
        description: kind.candidate_description().to_string(),
        day_of_week: existing.day_of_week,
        date: None,
        start_time: existing.start_time,
        end_time: existing.end_time,
        overlap_start: candidate.start_time.max(existing.start_time),
        overlap_end: candidate.end_time.min(existing.end_time),
        severity: Severity::High,
    }
}

fn activity_conflict(
    kind: ConflictKind,
    activity: &Activity,
    other: &Activity,
    entity: String,
    (overlap_start, overlap_end): (NaiveTime, NaiveTime),
) -> Conflict {
    Conflict {
        kind,
        target: ConflictTarget::Activity,
        checked_id: (activity.id != 0).then_some(activity.id),
        conflicting_id: other.id,
        conflicting_entity: entity,
        description: kind.candidate_description().to_string(),
        day_of_week: other.day_of_week(),
        date: Some(other.date),
        start_time: other.start_time,
        end_time: other.end_time,
        overlap_start,
        overlap_end,
        severity: Severity::High,
    }
}

/// Pairwise scan of `bookings`; each colliding pair is reported once per
/// shared dimension, ordered by the ids involved.
pub fn pairwise_conflicts(
    bookings: &[Booking],
    teacher_names: &HashMap<TeacherId, String>,
    classroom_names: &HashMap<ClassroomId, String>,
) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = (0..bookings.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let first = &bookings[i];
            bookings[i + 1..]
                .iter()
                .flat_map(move |second| pair_conflicts(first, second, teacher_names, classroom_names))
        })
        .collect();
    conflicts.sort_by_key(|conflict| (conflict.checked_id, conflict.conflicting_id, conflict.kind));
    conflicts
}

fn pair_conflicts(
    first: &Booking,
    second: &Booking,
    teacher_names: &HashMap<TeacherId, String>,
    classroom_names: &HashMap<ClassroomId, String>,
) -> Vec<Conflict> {
    if first.day_of_week != second.day_of_week || !first.in_period(&second.period()) {
        return Vec::new();
    }
    let Some((overlap_start, overlap_end)) =
        overlap_range(first.start_time, first.end_time, second.start_time, second.end_time)
    else {
        return Vec::new();
    };

    let audit_conflict = |kind: ConflictKind, entity: String| Conflict {
        kind,
        target: ConflictTarget::Booking,
        checked_id: Some(first.id),
        conflicting_id: second.id,
        conflicting_entity: entity,
        description: kind.audit_description().to_string(),
        day_of_week: second.day_of_week,
        date: None,
        start_time: second.start_time,
        end_time: second.end_time,
        overlap_start,
        overlap_end,
        severity: Severity::High,
    };

    let mut found = Vec::new();
    if first.teacher_id == second.teacher_id {
        let name = teacher_names
            .get(&first.teacher_id)
            .cloned()
            .unwrap_or_else(|| format!("teacher #{}", first.teacher_id));
        found.push(audit_conflict(ConflictKind::TeacherConflict, name));
    }
    if first.classroom_id == second.classroom_id {
        let name = classroom_names
            .get(&first.classroom_id)
            .cloned()
            .unwrap_or_else(|| format!("classroom #{}", first.classroom_id));
        found.push(audit_conflict(ConflictKind::ClassroomConflict, name));
    }
    found
}

/// Counts and clusters for the conflicts of one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub academic_year: String,
    pub semester: u8,
    pub total_conflicts: usize,
    pub teacher_conflicts: usize,
    pub classroom_conflicts: usize,
    pub affected_bookings: usize,
    /// Groups of bookings linked by any chain of conflicts, each sorted by id.
    pub clusters: Vec<Vec<BookingId>>,
}

pub fn summarize(period: &AcademicPeriod, conflicts: &[Conflict]) -> ConflictSummary {
    let edges: Vec<(BookingId, BookingId)> = conflicts
        .iter()
        .filter_map(|conflict| conflict.checked_id.map(|id| (id, conflict.conflicting_id)))
        .collect();
    let ids: Vec<BookingId> = edges
        .iter()
        .flat_map(|&(a, b)| [a, b])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<BookingId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let mut components = UnionFind::<usize>::new(ids.len());
    for (a, b) in &edges {
        components.union(index[a], index[b]);
    }

    let mut grouped: BTreeMap<usize, Vec<BookingId>> = BTreeMap::new();
    for (i, label) in components.into_labeling().into_iter().enumerate() {
        grouped.entry(label).or_default().push(ids[i]);
    }
    let mut clusters: Vec<Vec<BookingId>> = grouped.into_values().collect();
    clusters.sort();

    let teacher_conflicts = conflicts
        .iter()
        .filter(|conflict| conflict.kind == ConflictKind::TeacherConflict)
        .count();

    ConflictSummary {
        academic_year: period.academic_year.clone(),
        semester: period.semester,
        total_conflicts: conflicts.len(),
        teacher_conflicts,
        classroom_conflicts: conflicts.len() - teacher_conflicts,
        affected_bookings: ids.len(),
        clusters,
    }
}
