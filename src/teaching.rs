//! Teaching activities: dated occurrences of weekly bookings.

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

use crate::activity::{
    Activity, ActivityId, ActivityPatch, ActivityRequest, ActivitySearch, ActivityView,
    GenerationReport, SkippedDate,
};
use crate::booking::{Booking, BookingId, DayOfWeek};
use crate::calendar::SchoolCalendar;
use crate::conflict::ConflictDetector;
use crate::directory::TeacherId;
use crate::error::{ScheduleError, ScheduleResult};
use crate::query::{DateRange, Page, ResourceRef};
use crate::schedule::ScheduleManager;
use crate::time_slot;

impl ScheduleManager {
    /// Creates the activity of `booking_id` on `date`, copying its times and references.
    pub fn generate_activity(
        &mut self,
        booking_id: BookingId,
        date: NaiveDate,
        topic: impl Into<String>,
    ) -> ScheduleResult<ActivityView> {
        self.create_activity(ActivityRequest::new(booking_id, date, topic))
    }

    pub fn create_activity(&mut self, request: ActivityRequest) -> ScheduleResult<ActivityView> {
        info!(booking_id = request.booking_id, date = %request.date, "creating activity");
        let booking = self.require_booking(request.booking_id)?;
        self.ensure_no_activity_on(booking.id, request.date, None)?;

        let activity = Activity {
            id: 0,
            booking_id: booking.id,
            date: request.date,
            start_time: request.start_time.unwrap_or(booking.start_time),
            end_time: request.end_time.unwrap_or(booking.end_time),
            topic: request.topic,
            description: request.description,
            notes: request.notes,
            is_completed: request.is_completed,
            subject_id: request.subject_id.unwrap_or(booking.subject_id),
            classroom_id: request.classroom_id.unwrap_or(booking.classroom_id),
            teacher_id: request.teacher_id.unwrap_or(booking.teacher_id),
        };
        let mut view = self.activity_view(activity)?;
        self.check_activity(&view.activity)?;

        view.activity = self.store.insert_activity(view.activity.clone())?;
        info!(activity_id = view.id(), booking_id = booking.id, "activity created");
        Ok(view)
    }

    pub fn update_activity(&mut self, id: ActivityId, patch: ActivityPatch) -> ScheduleResult<ActivityView> {
        info!(activity_id = id, "updating activity");
        let existing = self.require_activity(id)?;
        let updated = patch.apply_to(&existing);
        self.save_activity_change(&existing, updated)
    }

    pub fn reschedule_activity(
        &mut self,
        id: ActivityId,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> ScheduleResult<ActivityView> {
        info!(activity_id = id, date = %date, "rescheduling activity");
        let existing = self.require_activity(id)?;
        let moved = Activity {
            date,
            start_time,
            end_time,
            ..existing.clone()
        };
        self.save_activity_change(&existing, moved)
    }

    pub fn mark_activity_completed(&mut self, id: ActivityId, notes: Option<String>) -> ScheduleResult<ActivityView> {
        let mut activity = self.require_activity(id)?;
        activity.is_completed = true;
        if let Some(notes) = notes {
            if let Some(problem) = self.notes_problem(Some(&notes)) {
                return Err(ScheduleError::Validation(problem));
            }
            activity.notes = Some(notes);
        }
        self.store.update_activity(&activity)?;
        info!(activity_id = id, "activity marked completed");
        self.activity_view(activity)
    }

    pub fn mark_activity_incomplete(&mut self, id: ActivityId) -> ScheduleResult<ActivityView> {
        let mut activity = self.require_activity(id)?;
        activity.is_completed = false;
        self.store.update_activity(&activity)?;
        info!(activity_id = id, "activity marked incomplete");
        self.activity_view(activity)
    }

    pub fn delete_activity(&mut self, id: ActivityId) -> ScheduleResult<()> {
        if !self.store.delete_activity(id)? {
            return Err(ScheduleError::not_found("TeachingActivity", id));
        }
        info!(activity_id = id, "activity deleted");
        Ok(())
    }

    pub fn get_activity(&self, id: ActivityId) -> ScheduleResult<ActivityView> {
        let activity = self.require_activity(id)?;
        self.activity_view(activity)
    }

    pub fn search_activities(&self, search: &ActivitySearch) -> ScheduleResult<Page<ActivityView>> {
        let mut matching: Vec<Activity> = self
            .store
            .all_activities()?
            .into_iter()
            .filter(|activity| search.matches(activity))
            .collect();
        matching.sort_by_key(|activity| (activity.date, activity.start_time, activity.id));
        debug!(matches = matching.len(), "activity search");
        let page = Page::slice(matching, search.page, search.size);
        let items = self.activity_views(page.items)?;
        Ok(Page {
            items,
            total: page.total,
            page: page.page,
            size: page.size,
        })
    }

    pub fn activities_for(&self, resource: ResourceRef, range: &DateRange) -> ScheduleResult<Vec<ActivityView>> {
        self.resolver().require_resource(resource)?;
        let activities = self.store.activities_for(resource, range)?;
        self.activity_views(activities)
    }

    pub fn activities_on(&self, date: NaiveDate) -> ScheduleResult<Vec<ActivityView>> {
        let activities = self.store.activities_on(date)?;
        self.activity_views(activities)
    }

    /// Activities of a teacher from `from` through the following `days` days.
    pub fn upcoming_activities_for_teacher(
        &self,
        teacher_id: TeacherId,
        from: NaiveDate,
        days: u64,
    ) -> ScheduleResult<Vec<ActivityView>> {
        let range = DateRange::starting_at(from, days)?;
        self.activities_for(ResourceRef::Teacher(teacher_id), &range)
    }

    /// Generates one activity per school day in `range` that falls on each
    /// booking's weekday. Holidays, dates that already have an activity and
    /// dates whose activity would conflict are reported as skipped.
    pub fn generate_activities_for_range(
        &mut self,
        booking_ids: &[BookingId],
        range: &DateRange,
        topic: &str,
        calendar: &SchoolCalendar,
    ) -> ScheduleResult<GenerationReport> {
        info!(
            bookings = booking_ids.len(),
            start = %range.start,
            end = %range.end,
            "generating activities for range"
        );
        let bookings = booking_ids
            .iter()
            .map(|id| self.require_booking(*id))
            .collect::<ScheduleResult<Vec<Booking>>>()?;

        let mut report = GenerationReport::default();
        for booking in &bookings {
            for date in range.days().filter(|date| DayOfWeek::of(*date) == booking.day_of_week) {
                if !calendar.is_school_day(date) {
                    report.skipped.push(SkippedDate {
                        booking_id: booking.id,
                        date,
                        reason: "not a school day".to_string(),
                    });
                    continue;
                }
                if self.store.activity_for_booking_on(booking.id, date)?.is_some() {
                    report.skipped.push(SkippedDate {
                        booking_id: booking.id,
                        date,
                        reason: "activity already exists".to_string(),
                    });
                    continue;
                }
                match self.generate_activity(booking.id, date, topic) {
                    Ok(view) => report.generated.push(view),
                    Err(ScheduleError::Conflict(conflicts)) => report.skipped.push(SkippedDate {
                        booking_id: booking.id,
                        date,
                        reason: format!("conflicts with {} other activities", conflicts.len()),
                    }),
                    Err(err) => return Err(err),
                }
            }
        }
        info!(
            generated = report.generated.len(),
            skipped = report.skipped.len(),
            "activity generation finished"
        );
        Ok(report)
    }

    fn require_activity(&self, id: ActivityId) -> ScheduleResult<Activity> {
        self.store
            .activity(id)?
            .ok_or_else(|| ScheduleError::not_found("TeachingActivity", id))
    }

    fn ensure_no_activity_on(
        &self,
        booking_id: BookingId,
        date: NaiveDate,
        except: Option<ActivityId>,
    ) -> ScheduleResult<()> {
        match self.store.activity_for_booking_on(booking_id, date)? {
            Some(existing) if Some(existing.id) != except => Err(ScheduleError::validation(format!(
                "Teaching activity already exists for schedule {booking_id} on {date}"
            ))),
            _ => Ok(()),
        }
    }

    fn save_activity_change(&mut self, existing: &Activity, updated: Activity) -> ScheduleResult<ActivityView> {
        if updated.date != existing.date {
            self.ensure_no_activity_on(updated.booking_id, updated.date, Some(existing.id))?;
        }
        let view = self.activity_view(updated)?;
        self.check_activity(&view.activity)?;
        self.store.update_activity(&view.activity)?;
        info!(activity_id = view.id(), "activity updated");
        Ok(view)
    }

    /// Slot, text and conflict checks shared by every activity write.
    fn check_activity(&self, activity: &Activity) -> ScheduleResult<()> {
        time_slot::validate_activity_slot(activity.start_time, activity.end_time, &self.rules)?;

        let mut problems = Vec::new();
        let topic_len = activity.topic.trim().chars().count();
        if topic_len == 0 {
            problems.push("Topic is required".to_string());
        } else if activity.topic.chars().count() > self.rules.max_topic_len {
            problems.push(format!("Topic cannot exceed {} characters", self.rules.max_topic_len));
        }
        if activity
            .description
            .as_deref()
            .is_some_and(|text| text.chars().count() > self.rules.max_description_len)
        {
            problems.push(format!(
                "Description cannot exceed {} characters",
                self.rules.max_description_len
            ));
        }
        problems.extend(self.notes_problem(activity.notes.as_deref()));
        if !problems.is_empty() {
            return Err(ScheduleError::Validation(problems.join("; ")));
        }

        let conflicts = ConflictDetector::new(self.store()).detect_for_activity(activity)?;
        if !conflicts.is_empty() {
            return Err(ScheduleError::Conflict(conflicts));
        }
        Ok(())
    }

    fn activity_view(&self, activity: Activity) -> ScheduleResult<ActivityView> {
        let mut resolver = self.resolver();
        let classroom = resolver.classroom(activity.classroom_id)?;
        let subject = resolver.subject(activity.subject_id)?;
        let teacher = resolver.teacher(activity.teacher_id)?;
        Ok(ActivityView::new(activity, classroom, subject, teacher))
    }

    fn activity_views(&self, activities: Vec<Activity>) -> ScheduleResult<Vec<ActivityView>> {
        let mut resolver = self.resolver();
        activities
            .into_iter()
            .map(|activity| {
                let classroom = resolver.classroom(activity.classroom_id)?;
                let subject = resolver.subject(activity.subject_id)?;
                let teacher = resolver.teacher(activity.teacher_id)?;
                Ok(ActivityView::new(activity, classroom, subject, teacher))
            })
            .collect()
    }
}
