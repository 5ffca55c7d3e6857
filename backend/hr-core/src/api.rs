// src/api.rs

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::HrError;
use crate::models::{
    AttendanceRecord, AttendanceStatus, AttendanceUpdate, Department, DepartmentUpdate, Employee,
    EmployeeUpdate, MarkAttendance, NewAttendanceRecord, NewDepartment, NewEmployee,
    NewTimeOffRequest, RecordId, StatusDecision, TimeOffRequest, TimeOffStatus, TimeOffUpdate,
};
use crate::query::{AttendanceFilter, DateRange, EmployeeFilter, TimeOffFilter};
use crate::service::HrService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<HrService>,
}

impl AppState {
    pub fn new(service: HrService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

// --- Error Mapping ---

#[derive(Debug)]
pub struct AppError(pub HrError);

impl From<HrError> for AppError {
    fn from(err: HrError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_client_error() {
            warn!("Request rejected: {}", self.0);
        } else {
            error!("Error occurred: {:?}", self.0);
        }

        let (status_code, error_message) = match self.0 {
            HrError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string()),
            HrError::InvalidTime(_)
            | HrError::InvalidDateRange { .. }
            | HrError::DateOutOfRange(_) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            HrError::ValidationMissing { .. }
            | HrError::InvalidReference { .. }
            | HrError::PartialBatchFailure { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string())
            }
            HrError::Duplicate { .. } | HrError::TransitionNotAllowed { .. } => {
                (StatusCode::CONFLICT, self.0.to_string())
            }
            HrError::RemoteFailure { .. } | HrError::Request(_) => (
                StatusCode::BAD_GATEWAY,
                "Records backend request failed. Details logged.".to_string(),
            ),
            HrError::Json(_)
            | HrError::Io { .. }
            | HrError::Csv(_)
            | HrError::UrlParse(_)
            | HrError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error. Check logs.".to_string(),
            ),
        };

        (status_code, Json(json!({ "error": error_message }))).into_response()
    }
}

type ApiResult<T> = Result<T, AppError>;

// --- Query Parameters ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOffQuery {
    pub status: Option<TimeOffStatus>,
    pub employee_id: Option<RecordId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TimeOffQuery {
    /// An open end of the range extends to the calendar limit.
    fn into_filter(self) -> Result<TimeOffFilter, HrError> {
        let range = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => Some(DateRange::new(
                from.unwrap_or(NaiveDate::MIN),
                to.unwrap_or(NaiveDate::MAX),
            )?),
        };
        Ok(TimeOffFilter {
            status: self.status,
            employee_id: self.employee_id,
            range,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub date: Option<NaiveDate>,
    pub employee_id: Option<RecordId>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
}

// --- Router ---

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/api/dashboard", get(dashboard))
        .route("/api/employees", get(list_employees).post(create_employee))
        .route(
            "/api/employees/{id}",
            get(get_employee).patch(update_employee).delete(delete_employee),
        )
        .route("/api/departments", get(list_departments).post(create_department))
        .route("/api/departments/stats", get(department_stats))
        .route(
            "/api/departments/{id}",
            get(get_department)
                .patch(update_department)
                .delete(delete_department),
        )
        .route("/api/departments/{id}/employees", get(department_roster))
        .route("/api/time-off", get(list_time_off).post(create_time_off))
        .route(
            "/api/time-off/{id}",
            get(get_time_off).patch(update_time_off).delete(delete_time_off),
        )
        .route("/api/time-off/{id}/status", put(update_time_off_status))
        .route("/api/attendance", get(list_attendance).post(create_attendance))
        .route("/api/attendance/mark", post(mark_attendance))
        .route("/api/attendance/stats", get(attendance_stats))
        .route("/api/attendance/week", get(weekly_attendance))
        .route("/api/attendance/export", get(export_attendance))
        .route(
            "/api/attendance/{id}",
            get(get_attendance)
                .patch(update_attendance)
                .delete(delete_attendance),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "backend": state.service.backend().to_string(),
        "date": state.service.today(),
    }))
}

async fn dashboard(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.dashboard().await?))
}

// --- Employees ---

async fn list_employees(
    State(state): State<AppState>,
    Query(filter): Query<EmployeeFilter>,
) -> ApiResult<Json<Vec<Employee>>> {
    Ok(Json(state.service.filter_employees(&filter).await?))
}

async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Employee>> {
    Ok(Json(state.service.get_employee(id).await?))
}

async fn create_employee(
    State(state): State<AppState>,
    Json(draft): Json<NewEmployee>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let created = state.service.create_employee(draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(patch): Json<EmployeeUpdate>,
) -> ApiResult<Json<Employee>> {
    Ok(Json(state.service.update_employee(id, patch).await?))
}

async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Employee>> {
    Ok(Json(state.service.delete_employee(id).await?))
}

// --- Departments ---

async fn list_departments(State(state): State<AppState>) -> ApiResult<Json<Vec<Department>>> {
    Ok(Json(state.service.list_departments().await?))
}

async fn get_department(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Department>> {
    Ok(Json(state.service.get_department(id).await?))
}

async fn create_department(
    State(state): State<AppState>,
    Json(draft): Json<NewDepartment>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    let created = state.service.create_department(draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_department(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(patch): Json<DepartmentUpdate>,
) -> ApiResult<Json<Department>> {
    Ok(Json(state.service.update_department(id, patch).await?))
}

async fn delete_department(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Department>> {
    Ok(Json(state.service.delete_department(id).await?))
}

async fn department_roster(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Vec<Employee>>> {
    Ok(Json(state.service.department_roster(id).await?))
}

async fn department_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.department_stats().await?))
}

// --- Time Off ---

async fn list_time_off(
    State(state): State<AppState>,
    Query(query): Query<TimeOffQuery>,
) -> ApiResult<Json<Vec<TimeOffRequest>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.service.filter_time_off(&filter).await?))
}

async fn get_time_off(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<TimeOffRequest>> {
    Ok(Json(state.service.get_time_off(id).await?))
}

async fn create_time_off(
    State(state): State<AppState>,
    Json(draft): Json<NewTimeOffRequest>,
) -> ApiResult<(StatusCode, Json<TimeOffRequest>)> {
    let created = state.service.create_time_off(draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_time_off(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(patch): Json<TimeOffUpdate>,
) -> ApiResult<Json<TimeOffRequest>> {
    Ok(Json(state.service.update_time_off(id, patch).await?))
}

async fn update_time_off_status(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(decision): Json<StatusDecision>,
) -> ApiResult<Json<TimeOffRequest>> {
    let updated = state
        .service
        .update_time_off_status(id, decision.status, decision.approved_by)
        .await?;
    Ok(Json(updated))
}

async fn delete_time_off(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<TimeOffRequest>> {
    Ok(Json(state.service.delete_time_off(id).await?))
}

// --- Attendance ---

async fn list_attendance(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> ApiResult<Json<Vec<AttendanceRecord>>> {
    let filter = AttendanceFilter {
        date: query.date,
        employee_id: query.employee_id,
        status: query.status,
    };
    Ok(Json(state.service.filter_attendance(&filter).await?))
}

async fn get_attendance(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<AttendanceRecord>> {
    Ok(Json(state.service.get_attendance(id).await?))
}

async fn create_attendance(
    State(state): State<AppState>,
    Json(draft): Json<NewAttendanceRecord>,
) -> ApiResult<(StatusCode, Json<AttendanceRecord>)> {
    let created = state.service.create_attendance(draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_attendance(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(patch): Json<AttendanceUpdate>,
) -> ApiResult<Json<AttendanceRecord>> {
    Ok(Json(state.service.update_attendance(id, patch).await?))
}

async fn delete_attendance(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<AttendanceRecord>> {
    Ok(Json(state.service.delete_attendance(id).await?))
}

async fn mark_attendance(
    State(state): State<AppState>,
    Json(mark): Json<MarkAttendance>,
) -> ApiResult<Json<AttendanceRecord>> {
    Ok(Json(state.service.mark_attendance(mark).await?))
}

async fn attendance_stats(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> ApiResult<impl IntoResponse> {
    let date = query.date.unwrap_or_else(|| state.service.today());
    Ok(Json(state.service.attendance_stats(date).await?))
}

async fn weekly_attendance(
    State(state): State<AppState>,
    Query(query): Query<DayQuery>,
) -> ApiResult<impl IntoResponse> {
    let date = query.date.unwrap_or_else(|| state.service.today());
    Ok(Json(state.service.weekly_attendance(date).await?))
}

async fn export_attendance(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let mut buffer = Vec::new();
    state.service.export_attendance_csv(&mut buffer).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        buffer,
    ))
}
