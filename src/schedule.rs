//! The schedule manager: booking lifecycle, conflict policy and read projections.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::booking::{
    Booking, BookingId, BookingPatch, BookingRequest, BookingSearch, BookingView, DayOfWeek,
    default_true,
};
use crate::config::SchedulingRules;
use crate::conflict::{self, Candidate, Conflict, ConflictDetector, ConflictSummary};
use crate::directory::{Classroom, ClassroomId, Subject, SubjectId, Teacher, TeacherId};
use crate::error::{ScheduleError, ScheduleResult};
use crate::period::AcademicPeriod;
use crate::persistence::{SchoolStore, StoreSnapshot};
use crate::query::{Page, ResourceRef};
use crate::time_slot::{self, TimeSlotReport};

/// A batch of booking requests created in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkBookingRequest {
    pub bookings: Vec<BookingRequest>,
    #[serde(default)]
    pub skip_conflict_check: bool,
    #[serde(default)]
    pub allow_overlap: bool,
    #[serde(default = "default_true")]
    pub stop_on_first_error: bool,
}

impl BulkBookingRequest {
    pub fn new(bookings: Vec<BookingRequest>) -> Self {
        Self {
            bookings,
            skip_conflict_check: false,
            allow_overlap: false,
            stop_on_first_error: true,
        }
    }

    pub fn continue_on_error(mut self) -> Self {
        self.stop_on_first_error = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub created: Vec<BookingView>,
    pub errors: Vec<String>,
}

impl BulkOutcome {
    pub fn is_partial_failure(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A slot to probe for a teacher or classroom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub academic_year: String,
    pub semester: u8,
}

impl SlotQuery {
    pub fn period(&self) -> AcademicPeriod {
        AcademicPeriod::new(self.academic_year.clone(), self.semester)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    pub resource_id: i64,
    pub resource_name: String,
    pub day_of_week: DayOfWeek,
    pub requested_start_time: NaiveTime,
    pub requested_end_time: NaiveTime,
    pub is_available: bool,
    pub conflicting_bookings: Vec<BookingView>,
}

pub struct ScheduleManager {
    pub(crate) store: Box<dyn SchoolStore>,
    pub(crate) rules: SchedulingRules,
}

impl ScheduleManager {
    pub fn new<S: SchoolStore + 'static>(store: S) -> Self {
        Self::with_rules(store, SchedulingRules::default())
    }

    pub fn with_rules<S: SchoolStore + 'static>(store: S, rules: SchedulingRules) -> Self {
        Self::from_boxed(Box::new(store), rules)
    }

    pub fn from_boxed(store: Box<dyn SchoolStore>, rules: SchedulingRules) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    pub fn store(&self) -> &dyn SchoolStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn SchoolStore {
        self.store.as_mut()
    }

    pub fn snapshot(&self) -> ScheduleResult<StoreSnapshot> {
        Ok(StoreSnapshot::capture(self.store())?)
    }

    fn detector(&self) -> ConflictDetector<'_> {
        ConflictDetector::new(self.store())
    }

    pub(crate) fn resolver(&self) -> ViewResolver<'_> {
        ViewResolver::new(self.store())
    }

    pub(crate) fn require_booking(&self, id: BookingId) -> ScheduleResult<Booking> {
        self.store
            .booking(id)?
            .ok_or_else(|| ScheduleError::not_found("Schedule", id))
    }

    pub fn create_booking(&mut self, request: BookingRequest) -> ScheduleResult<BookingView> {
        info!(
            classroom_id = request.classroom_id,
            subject_id = request.subject_id,
            teacher_id = request.teacher_id,
            day = %request.day_of_week,
            period = %request.period(),
            "creating booking"
        );
        let mut view = self.resolver().view(request.to_booking())?;
        self.check_booking_fields(&view.booking)?;

        // Inactive bookings claim no resources.
        if view.booking.is_active && !request.skip_conflict_check {
            let conflicts = self.detector().detect(&Candidate::from(&view.booking), None)?;
            self.apply_conflict_policy(conflicts, request.allow_overlap)?;
        }

        view.booking = self.store.insert_booking(view.booking.clone())?;
        info!(booking_id = view.id(), "booking created");
        Ok(view)
    }

    pub fn update_booking(&mut self, id: BookingId, patch: BookingPatch) -> ScheduleResult<BookingView> {
        info!(booking_id = id, "updating booking");
        let existing = self.require_booking(id)?;
        let view = self.resolver().view(patch.apply_to(&existing))?;
        self.check_booking_fields(&view.booking)?;

        if view.booking.is_active && !patch.skip_conflict_check {
            let conflicts = self.detector().detect(&Candidate::from(&view.booking), Some(id))?;
            self.apply_conflict_policy(conflicts, patch.allow_overlap)?;
        }

        if !self.store.update_booking(&view.booking)? {
            return Err(ScheduleError::not_found("Schedule", id));
        }
        info!(booking_id = id, "booking updated");
        Ok(view)
    }

    pub fn delete_booking(&mut self, id: BookingId) -> ScheduleResult<()> {
        if !self.store.delete_booking(id)? {
            return Err(ScheduleError::not_found("Schedule", id));
        }
        info!(booking_id = id, "booking deleted");
        Ok(())
    }

    pub fn get_booking(&self, id: BookingId) -> ScheduleResult<BookingView> {
        let booking = self.require_booking(id)?;
        self.resolver().view(booking)
    }

    pub fn search_bookings(&self, search: &BookingSearch) -> ScheduleResult<Page<BookingView>> {
        let mut matching: Vec<Booking> = self
            .store
            .all_bookings()?
            .into_iter()
            .filter(|booking| search.matches(booking))
            .collect();
        matching.sort_by(|a, b| {
            (&a.academic_year, a.semester, a.day_of_week, a.start_time, a.id)
                .cmp(&(&b.academic_year, b.semester, b.day_of_week, b.start_time, b.id))
        });
        debug!(matches = matching.len(), "booking search");
        let page = Page::slice(matching, search.page, search.size);
        let mut resolver = self.resolver();
        let items = page
            .items
            .into_iter()
            .map(|booking| resolver.view(booking))
            .collect::<ScheduleResult<Vec<_>>>()?;
        Ok(Page {
            items,
            total: page.total,
            page: page.page,
            size: page.size,
        })
    }

    /// Bookings of one classroom, teacher or subject, ordered by day then start time.
    pub fn bookings_for(&self, resource: ResourceRef, period: &AcademicPeriod) -> ScheduleResult<Vec<BookingView>> {
        let mut resolver = self.resolver();
        resolver.require_resource(resource)?;
        let bookings = self.store.bookings_for(resource, period)?;
        resolver.views(bookings)
    }

    pub fn weekly_bookings(
        &self,
        resource: ResourceRef,
        period: &AcademicPeriod,
    ) -> ScheduleResult<BTreeMap<DayOfWeek, Vec<BookingView>>> {
        let mut week: BTreeMap<DayOfWeek, Vec<BookingView>> = BTreeMap::new();
        for view in self.bookings_for(resource, period)? {
            week.entry(view.booking.day_of_week).or_default().push(view);
        }
        Ok(week)
    }

    pub fn create_bulk(&mut self, request: BulkBookingRequest) -> ScheduleResult<BulkOutcome> {
        if request.bookings.is_empty() {
            return Err(ScheduleError::validation("Schedule list cannot be empty"));
        }
        info!(
            bookings = request.bookings.len(),
            stop_on_first_error = request.stop_on_first_error,
            "bulk booking creation"
        );

        let mut outcome = BulkOutcome::default();
        for (index, mut item) in request.bookings.into_iter().enumerate() {
            item.skip_conflict_check |= request.skip_conflict_check;
            item.allow_overlap |= request.allow_overlap;
            match self.create_booking(item) {
                Ok(view) => outcome.created.push(view),
                Err(err) => {
                    let message = format!("booking #{}: {err}", index + 1);
                    warn!("{message}");
                    if request.stop_on_first_error {
                        for created in &outcome.created {
                            self.store.delete_booking(created.id())?;
                        }
                        return Err(ScheduleError::BulkAborted {
                            index: index + 1,
                            message: err.to_string(),
                        });
                    }
                    outcome.errors.push(message);
                }
            }
        }
        info!(
            created = outcome.created.len(),
            failed = outcome.errors.len(),
            "bulk booking creation finished"
        );
        Ok(outcome)
    }

    pub fn check_conflicts(&self, request: &BookingRequest) -> ScheduleResult<Vec<Conflict>> {
        self.detector().detect(&Candidate::from(request), None)
    }

    pub fn check_update_conflicts(&self, id: BookingId, patch: &BookingPatch) -> ScheduleResult<Vec<Conflict>> {
        let existing = self.require_booking(id)?;
        let updated = patch.apply_to(&existing);
        self.detector().detect(&Candidate::from(&updated), Some(id))
    }

    /// Time-slot and period validation for `request`, without touching storage.
    pub fn validate_constraints(&self, request: &BookingRequest) -> TimeSlotReport {
        let mut report = time_slot::validate(Some(request.start_time), Some(request.end_time), &self.rules);
        for problem in request.period().problems() {
            report.push_error(problem);
        }
        if let Some(problem) = self.notes_problem(request.notes.as_deref()) {
            report.push_error(problem);
        }
        report
    }

    pub fn detect_existing_conflicts(&self, period: &AcademicPeriod) -> ScheduleResult<Vec<Conflict>> {
        period.validate()?;
        self.detector().audit(period)
    }

    pub fn conflict_summary(&self, period: &AcademicPeriod) -> ScheduleResult<ConflictSummary> {
        let conflicts = self.detect_existing_conflicts(period)?;
        Ok(conflict::summarize(period, &conflicts))
    }

    pub fn check_teacher_availability(&self, teacher_id: TeacherId, slot: &SlotQuery) -> ScheduleResult<Availability> {
        let mut resolver = self.resolver();
        let teacher = resolver.teacher(teacher_id)?;
        let clashes = self.detector().teacher_clashes(
            teacher_id,
            slot.day_of_week,
            slot.start_time,
            slot.end_time,
            &slot.period(),
            None,
        )?;
        Ok(Availability {
            resource_id: teacher_id,
            resource_name: teacher.full_name(),
            day_of_week: slot.day_of_week,
            requested_start_time: slot.start_time,
            requested_end_time: slot.end_time,
            is_available: clashes.is_empty(),
            conflicting_bookings: resolver.views(clashes)?,
        })
    }

    pub fn check_classroom_availability(
        &self,
        classroom_id: ClassroomId,
        slot: &SlotQuery,
    ) -> ScheduleResult<Availability> {
        let mut resolver = self.resolver();
        let classroom = resolver.classroom(classroom_id)?;
        let clashes = self.detector().classroom_clashes(
            classroom_id,
            slot.day_of_week,
            slot.start_time,
            slot.end_time,
            &slot.period(),
            None,
        )?;
        Ok(Availability {
            resource_id: classroom_id,
            resource_name: classroom.name,
            day_of_week: slot.day_of_week,
            requested_start_time: slot.start_time,
            requested_end_time: slot.end_time,
            is_available: clashes.is_empty(),
            conflicting_bookings: resolver.views(clashes)?,
        })
    }

    fn check_booking_fields(&self, booking: &Booking) -> ScheduleResult<()> {
        let mut report = time_slot::validate(Some(booking.start_time), Some(booking.end_time), &self.rules);
        for problem in booking.period().problems() {
            report.push_error(problem);
        }
        if let Some(problem) = self.notes_problem(booking.notes.as_deref()) {
            report.push_error(problem);
        }
        for warning in &report.warnings {
            warn!(booking_id = booking.id, "{warning}");
        }
        report.into_result().map(|_| ())
    }

    pub(crate) fn notes_problem(&self, notes: Option<&str>) -> Option<String> {
        notes
            .filter(|notes| notes.chars().count() > self.rules.max_notes_len)
            .map(|_| format!("Notes cannot exceed {} characters", self.rules.max_notes_len))
    }

    fn apply_conflict_policy(&self, conflicts: Vec<Conflict>, allow_overlap: bool) -> ScheduleResult<()> {
        if conflicts.is_empty() {
            return Ok(());
        }
        if allow_overlap {
            warn!(conflicts = conflicts.len(), "persisting despite conflicts");
            return Ok(());
        }
        Err(ScheduleError::Conflict(conflicts))
    }
}

/// Resolves directory records once per read and reuses them across rows.
pub(crate) struct ViewResolver<'a> {
    store: &'a dyn SchoolStore,
    classrooms: HashMap<ClassroomId, Classroom>,
    subjects: HashMap<SubjectId, Subject>,
    teachers: HashMap<TeacherId, Teacher>,
}

impl<'a> ViewResolver<'a> {
    pub(crate) fn new(store: &'a dyn SchoolStore) -> Self {
        Self {
            store,
            classrooms: HashMap::new(),
            subjects: HashMap::new(),
            teachers: HashMap::new(),
        }
    }

    pub(crate) fn classroom(&mut self, id: ClassroomId) -> ScheduleResult<Classroom> {
        if let Some(classroom) = self.classrooms.get(&id) {
            return Ok(classroom.clone());
        }
        let classroom = self
            .store
            .classroom(id)?
            .ok_or_else(|| ScheduleError::not_found("ClassRoom", id))?;
        self.classrooms.insert(id, classroom.clone());
        Ok(classroom)
    }

    pub(crate) fn subject(&mut self, id: SubjectId) -> ScheduleResult<Subject> {
        if let Some(subject) = self.subjects.get(&id) {
            return Ok(subject.clone());
        }
        let subject = self
            .store
            .subject(id)?
            .ok_or_else(|| ScheduleError::not_found("Subject", id))?;
        self.subjects.insert(id, subject.clone());
        Ok(subject)
    }

    pub(crate) fn teacher(&mut self, id: TeacherId) -> ScheduleResult<Teacher> {
        if let Some(teacher) = self.teachers.get(&id) {
            return Ok(teacher.clone());
        }
        let teacher = self
            .store
            .teacher(id)?
            .ok_or_else(|| ScheduleError::not_found("Teacher", id))?;
        self.teachers.insert(id, teacher.clone());
        Ok(teacher)
    }

    pub(crate) fn require_resource(&mut self, resource: ResourceRef) -> ScheduleResult<()> {
        match resource {
            ResourceRef::Classroom(id) => self.classroom(id).map(|_| ()),
            ResourceRef::Teacher(id) => self.teacher(id).map(|_| ()),
            ResourceRef::Subject(id) => self.subject(id).map(|_| ()),
        }
    }

    pub(crate) fn view(&mut self, booking: Booking) -> ScheduleResult<BookingView> {
        Ok(BookingView {
            classroom: self.classroom(booking.classroom_id)?,
            subject: self.subject(booking.subject_id)?,
            teacher: self.teacher(booking.teacher_id)?,
            booking,
        })
    }

    pub(crate) fn views(&mut self, bookings: Vec<Booking>) -> ScheduleResult<Vec<BookingView>> {
        bookings.into_iter().map(|booking| self.view(booking)).collect()
    }
}
