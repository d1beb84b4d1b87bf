use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{MethodRouter, delete, get, post, put},
};
use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::auth::{self, AuthError, Capability};
use crate::{
    ActivityId, ActivityPatch, ActivityRequest, ActivitySearch, ActivityView, AcademicPeriod,
    Availability, BookingId, BookingPatch, BookingRequest, BookingSearch, BookingView,
    BulkBookingRequest, BulkOutcome, ClassroomId, Conflict, ConflictSummary, DateRange,
    GenerationReport, Page, ScheduleError, ScheduleManager, SchoolCalendar, SlotQuery, SubjectId,
    TeacherId, TimeSlotReport, Timetable,
};

/// Header carrying the caller's comma separated roles.
pub const ROLES_HEADER: &str = "x-user-roles";

#[derive(Clone)]
pub struct AppState {
    manager: Arc<RwLock<ScheduleManager>>,
    calendar: Arc<SchoolCalendar>,
}

impl AppState {
    pub fn new(manager: ScheduleManager) -> Self {
        Self::with_shared(Arc::new(RwLock::new(manager)), SchoolCalendar::default())
    }

    pub fn with_shared(manager: Arc<RwLock<ScheduleManager>>, calendar: SchoolCalendar) -> Self {
        Self {
            manager,
            calendar: Arc::new(calendar),
        }
    }

    pub fn with_calendar(self, calendar: SchoolCalendar) -> Self {
        Self {
            manager: self.manager,
            calendar: Arc::new(calendar),
        }
    }

    fn manager(&self) -> Arc<RwLock<ScheduleManager>> {
        self.manager.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conflicts: Vec<Conflict>,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String, Vec<Conflict>),
    Invalid(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        let message = err.to_string();
        match err {
            ScheduleError::NotFound { .. } => ApiError::NotFound(message),
            ScheduleError::Validation(_) | ScheduleError::BulkAborted { .. } => {
                ApiError::Invalid(message)
            }
            ScheduleError::Conflict(conflicts) => ApiError::Conflict(message, conflicts),
            ScheduleError::Storage(_) => ApiError::Internal(message),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            AuthError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, conflicts) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message, Vec::new()),
            ApiError::Conflict(message, conflicts) => {
                (StatusCode::CONFLICT, "conflict", message, conflicts)
            }
            ApiError::Invalid(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message, Vec::new())
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message, Vec::new())
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "forbidden", message, Vec::new()),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message,
                Vec::new(),
            ),
        };
        let body = Json(ErrorBody {
            error,
            message,
            conflicts,
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    academic_year: String,
    semester: u8,
}

impl PeriodQuery {
    fn period(&self) -> Result<AcademicPeriod, ApiError> {
        let period = AcademicPeriod::new(self.academic_year.clone(), self.semester);
        period.validate()?;
        Ok(period)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateActivityPayload {
    date: NaiveDate,
    topic: String,
}

#[derive(Debug, Deserialize)]
struct GenerateRangePayload {
    booking_ids: Vec<BookingId>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    topic: String,
}

#[derive(Debug, Deserialize)]
struct ReschedulePayload {
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

#[derive(Debug, Default, Deserialize)]
struct CompletePayload {
    #[serde(default)]
    notes: Option<String>,
}

async fn require_capability(
    State(capability): State<Capability>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let roles = request
        .headers()
        .get(ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(auth::parse_roles)
        .unwrap_or_default();
    auth::authorize(&roles, capability)?;
    Ok(next.run(request).await)
}

fn guarded(capability: Capability, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(capability, require_capability))
}

pub fn router(state: AppState) -> Router {
    use Capability::*;

    Router::new()
        .route("/health", get(health))
        .route(
            "/schedules",
            guarded(ScheduleList, get(search_schedules))
                .merge(guarded(ScheduleCreate, post(create_schedule))),
        )
        .route("/schedules/bulk", guarded(ScheduleCreate, post(create_bulk)))
        .route("/schedules/validate", guarded(ScheduleCreate, post(validate_schedule)))
        .route("/schedules/conflicts", guarded(ScheduleCreate, post(check_conflicts)))
        .route("/schedules/conflicts/audit", guarded(ScheduleRead, get(conflict_audit)))
        .route("/schedules/conflicts/summary", guarded(ScheduleRead, get(conflict_summary)))
        .route(
            "/schedules/:id",
            guarded(ScheduleRead, get(get_schedule))
                .merge(guarded(ScheduleUpdate, put(update_schedule)))
                .merge(guarded(ScheduleDelete, delete(delete_schedule))),
        )
        .route(
            "/schedules/:id/conflicts",
            guarded(ScheduleUpdate, post(check_update_conflicts)),
        )
        .route(
            "/schedules/:id/activities",
            guarded(ScheduleCreate, post(generate_activity)),
        )
        .route(
            "/availability/teachers/:id",
            guarded(ScheduleRead, get(teacher_availability)),
        )
        .route(
            "/availability/classrooms/:id",
            guarded(ScheduleRead, get(classroom_availability)),
        )
        .route(
            "/timetables/classrooms/:id",
            guarded(ScheduleRead, get(class_timetable)),
        )
        .route(
            "/timetables/teachers/:id",
            guarded(ScheduleRead, get(teacher_timetable)),
        )
        .route(
            "/timetables/subjects/:id",
            guarded(ScheduleRead, get(subject_timetable)),
        )
        .route(
            "/activities",
            guarded(ScheduleList, get(search_activities))
                .merge(guarded(ScheduleCreate, post(create_activity))),
        )
        .route(
            "/activities/generate",
            guarded(ScheduleCreate, post(generate_activities_for_range)),
        )
        .route(
            "/activities/:id",
            guarded(ScheduleRead, get(get_activity))
                .merge(guarded(ScheduleUpdate, put(update_activity)))
                .merge(guarded(ScheduleDelete, delete(delete_activity))),
        )
        .route(
            "/activities/:id/complete",
            guarded(ScheduleUpdate, post(complete_activity)),
        )
        .route(
            "/activities/:id/incomplete",
            guarded(ScheduleUpdate, post(incomplete_activity)),
        )
        .route(
            "/activities/:id/reschedule",
            guarded(ScheduleUpdate, post(reschedule_activity)),
        )
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http api listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn search_schedules(
    State(state): State<AppState>,
    Query(search): Query<BookingSearch>,
) -> Result<Json<Page<BookingView>>, ApiError> {
    let manager = state.manager();
    let page = {
        let guard = manager.read();
        guard.search_bookings(&search)?
    };
    Ok(Json(page))
}

async fn create_schedule(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingView>), ApiError> {
    let manager = state.manager();
    let created = {
        let mut guard = manager.write();
        guard.create_booking(request)?
    };
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingView>, ApiError> {
    let manager = state.manager();
    let view = {
        let guard = manager.read();
        guard.get_booking(id)?
    };
    Ok(Json(view))
}

async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    Json(patch): Json<BookingPatch>,
) -> Result<Json<BookingView>, ApiError> {
    let manager = state.manager();
    let updated = {
        let mut guard = manager.write();
        guard.update_booking(id, patch)?
    };
    Ok(Json(updated))
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<StatusCode, ApiError> {
    let manager = state.manager();
    {
        let mut guard = manager.write();
        guard.delete_booking(id)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn create_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkBookingRequest>,
) -> Result<(StatusCode, Json<BulkOutcome>), ApiError> {
    let manager = state.manager();
    let outcome = {
        let mut guard = manager.write();
        guard.create_bulk(request)?
    };
    let status = if outcome.is_partial_failure() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

async fn validate_schedule(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Json<TimeSlotReport> {
    let manager = state.manager();
    let report = {
        let guard = manager.read();
        guard.validate_constraints(&request)
    };
    Json(report)
}

async fn check_conflicts(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    let manager = state.manager();
    let conflicts = {
        let guard = manager.read();
        guard.check_conflicts(&request)?
    };
    Ok(Json(conflicts))
}

async fn check_update_conflicts(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    Json(patch): Json<BookingPatch>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    let manager = state.manager();
    let conflicts = {
        let guard = manager.read();
        guard.check_update_conflicts(id, &patch)?
    };
    Ok(Json(conflicts))
}

async fn conflict_audit(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<Conflict>>, ApiError> {
    let period = query.period()?;
    let manager = state.manager();
    let conflicts = {
        let guard = manager.read();
        guard.detect_existing_conflicts(&period)?
    };
    Ok(Json(conflicts))
}

async fn conflict_summary(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ConflictSummary>, ApiError> {
    let period = query.period()?;
    let manager = state.manager();
    let summary = {
        let guard = manager.read();
        guard.conflict_summary(&period)?
    };
    Ok(Json(summary))
}

async fn teacher_availability(
    State(state): State<AppState>,
    Path(id): Path<TeacherId>,
    Query(slot): Query<SlotQuery>,
) -> Result<Json<Availability>, ApiError> {
    let manager = state.manager();
    let availability = {
        let guard = manager.read();
        guard.check_teacher_availability(id, &slot)?
    };
    Ok(Json(availability))
}

async fn classroom_availability(
    State(state): State<AppState>,
    Path(id): Path<ClassroomId>,
    Query(slot): Query<SlotQuery>,
) -> Result<Json<Availability>, ApiError> {
    let manager = state.manager();
    let availability = {
        let guard = manager.read();
        guard.check_classroom_availability(id, &slot)?
    };
    Ok(Json(availability))
}

async fn class_timetable(
    State(state): State<AppState>,
    Path(id): Path<ClassroomId>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Timetable>, ApiError> {
    let period = query.period()?;
    let manager = state.manager();
    let timetable = {
        let guard = manager.read();
        guard.generate_class_timetable(id, &period)?
    };
    Ok(Json(timetable))
}

async fn teacher_timetable(
    State(state): State<AppState>,
    Path(id): Path<TeacherId>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Timetable>, ApiError> {
    let period = query.period()?;
    let manager = state.manager();
    let timetable = {
        let guard = manager.read();
        guard.generate_teacher_timetable(id, &period)?
    };
    Ok(Json(timetable))
}

async fn subject_timetable(
    State(state): State<AppState>,
    Path(id): Path<SubjectId>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Timetable>, ApiError> {
    let period = query.period()?;
    let manager = state.manager();
    let timetable = {
        let guard = manager.read();
        guard.generate_subject_timetable(id, &period)?
    };
    Ok(Json(timetable))
}

async fn search_activities(
    State(state): State<AppState>,
    Query(search): Query<ActivitySearch>,
) -> Result<Json<Page<ActivityView>>, ApiError> {
    let manager = state.manager();
    let page = {
        let guard = manager.read();
        guard.search_activities(&search)?
    };
    Ok(Json(page))
}

async fn create_activity(
    State(state): State<AppState>,
    Json(request): Json<ActivityRequest>,
) -> Result<(StatusCode, Json<ActivityView>), ApiError> {
    let manager = state.manager();
    let created = {
        let mut guard = manager.write();
        guard.create_activity(request)?
    };
    Ok((StatusCode::CREATED, Json(created)))
}

async fn generate_activity(
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    Json(payload): Json<GenerateActivityPayload>,
) -> Result<(StatusCode, Json<ActivityView>), ApiError> {
    let manager = state.manager();
    let created = {
        let mut guard = manager.write();
        guard.generate_activity(booking_id, payload.date, payload.topic)?
    };
    Ok((StatusCode::CREATED, Json(created)))
}

async fn generate_activities_for_range(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRangePayload>,
) -> Result<Json<GenerationReport>, ApiError> {
    let range = DateRange::new(payload.start_date, payload.end_date)?;
    let manager = state.manager();
    let report = {
        let mut guard = manager.write();
        guard.generate_activities_for_range(
            &payload.booking_ids,
            &range,
            &payload.topic,
            &state.calendar,
        )?
    };
    Ok(Json(report))
}

async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
) -> Result<Json<ActivityView>, ApiError> {
    let manager = state.manager();
    let view = {
        let guard = manager.read();
        guard.get_activity(id)?
    };
    Ok(Json(view))
}

async fn update_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    Json(patch): Json<ActivityPatch>,
) -> Result<Json<ActivityView>, ApiError> {
    let manager = state.manager();
    let updated = {
        let mut guard = manager.write();
        guard.update_activity(id, patch)?
    };
    Ok(Json(updated))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
) -> Result<StatusCode, ApiError> {
    let manager = state.manager();
    {
        let mut guard = manager.write();
        guard.delete_activity(id)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    Json(payload): Json<CompletePayload>,
) -> Result<Json<ActivityView>, ApiError> {
    let manager = state.manager();
    let updated = {
        let mut guard = manager.write();
        guard.mark_activity_completed(id, payload.notes)?
    };
    Ok(Json(updated))
}

async fn incomplete_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
) -> Result<Json<ActivityView>, ApiError> {
    let manager = state.manager();
    let updated = {
        let mut guard = manager.write();
        guard.mark_activity_incomplete(id)?
    };
    Ok(Json(updated))
}

async fn reschedule_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    Json(payload): Json<ReschedulePayload>,
) -> Result<Json<ActivityView>, ApiError> {
    let manager = state.manager();
    let updated = {
        let mut guard = manager.write();
        guard.reschedule_activity(id, payload.date, payload.start_time, payload.end_time)?
    };
    Ok(Json(updated))
}
