pub mod activity;
pub mod auth;
pub mod booking;
pub mod calendar;
pub mod config;
pub mod conflict;
pub mod directory;
pub mod error;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod period;
pub mod persistence;
pub mod query;
pub mod schedule;
pub mod teaching;
pub mod time_slot;
pub mod timetable;

pub use activity::{
    Activity, ActivityId, ActivityPatch, ActivityRequest, ActivitySearch, ActivityView,
    GenerationReport, SkippedDate,
};
pub use auth::{AuthError, Capability, Role, authorize};
pub use booking::{
    Booking, BookingId, BookingPatch, BookingRequest, BookingSearch, BookingView, DayOfWeek,
};
pub use calendar::{SchoolCalendar, SchoolCalendarConfig};
pub use config::{ConfigError, SchedulingRules, ServerConfig};
pub use conflict::{
    Candidate, Conflict, ConflictDetector, ConflictKind, ConflictSummary, ConflictTarget,
    Severity, overlaps,
};
pub use directory::{
    Classroom, ClassroomId, DirectorySnapshot, Subject, SubjectId, Teacher, TeacherId,
};
pub use error::{ScheduleError, ScheduleResult};
pub use period::AcademicPeriod;
#[cfg(feature = "sqlite")]
pub use persistence::SqliteStore;
pub use persistence::{
    ActivityStore, BookingStore, Directory, MemoryStore, PersistenceError, PersistenceResult,
    SchoolStore, StoreSnapshot, load_booking_requests_from_csv, load_directory_from_json,
    load_snapshot_from_json, save_snapshot_to_json,
};
pub use query::{DateRange, Page, ResourceRef};
pub use schedule::{Availability, BulkBookingRequest, BulkOutcome, ScheduleManager, SlotQuery};
pub use time_slot::TimeSlotReport;
pub use timetable::{TimeSlot, Timetable, TimetableBuilder, TimetableKind, TimetableStatistics};
