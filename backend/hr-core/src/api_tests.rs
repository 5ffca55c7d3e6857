// src/api_tests.rs

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::api::{router, AppState};
    use crate::clock::{FixedClock, Latency};
    use crate::fixtures::Fixtures;
    use crate::memory_store::MemoryBackend;
    use crate::service::{HrService, TransitionPolicy};

    fn app_with(policy: TransitionPolicy) -> Router {
        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()));
        let backend = MemoryBackend::seeded(
            Fixtures::builtin().unwrap(),
            clock.clone(),
            Latency::default(),
        );
        router(AppState::new(HrService::new(backend.stores(), clock, policy)))
    }

    fn app() -> Router {
        app_with(TransitionPolicy::default())
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Method::GET, uri, None).await
    }

    fn ids(value: &Value) -> Vec<i64> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn status_reports_backend_and_date() {
        let (status, body) = get(&app(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "memory");
        assert_eq!(body["date"], "2024-06-10");
    }

    #[tokio::test]
    async fn employee_list_applies_query_filters() {
        let app = app();
        let (status, body) = get(&app, "/api/employees").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 8);

        let (_, engineering) = get(&app, "/api/employees?department=Engineering&status=Active").await;
        assert_eq!(ids(&engineering), vec![1, 2, 8]);

        let (_, search) = get(&app, "/api/employees?search=CHEN").await;
        assert_eq!(ids(&search), vec![2]);

        let (_, on_leave) = get(&app, "/api/employees?status=On%20Leave").await;
        assert_eq!(ids(&on_leave), vec![4]);
    }

    #[tokio::test]
    async fn unknown_employee_is_404_with_error_body() {
        let (status, body) = get(&app(), "/api/employees/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("99"));
    }

    #[tokio::test]
    async fn employee_create_update_delete() {
        let app = app();
        let (status, created) = send(
            &app,
            Method::POST,
            "/api/employees",
            Some(json!({
                "firstName": "Nina",
                "lastName": "Berg",
                "email": "nina.berg@company.com",
                "role": "Designer",
                "department": "Marketing",
                "startDate": "2024-06-03"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], 9);
        assert_eq!(created["status"], "Active");

        let (status, updated) = send(
            &app,
            Method::PATCH,
            "/api/employees/9",
            Some(json!({ "role": "Senior Designer" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["role"], "Senior Designer");
        assert_eq!(updated["firstName"], "Nina");

        let (status, removed) = send(&app, Method::DELETE, "/api/employees/9", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["email"], "nina.berg@company.com");

        let (status, _) = get(&app, "/api/employees/9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_employee_payloads_are_unprocessable() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/employees",
            Some(json!({ "firstName": "Nina", "lastName": "Berg" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("email"));

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/employees",
            Some(json!({
                "firstName": "Nina",
                "lastName": "Berg",
                "email": "nina@company.com",
                "department": "Legal"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn department_views() {
        let app = app();
        let (_, roster) = get(&app, "/api/departments/1/employees").await;
        assert_eq!(ids(&roster), vec![1, 2, 8]);

        let (status, stats) = get(&app, "/api/departments/stats").await;
        assert_eq!(status, StatusCode::OK);
        let stats = stats.as_array().unwrap();
        assert_eq!(stats.len(), 5);
        let engineering = stats.iter().find(|s| s["name"] == "Engineering").unwrap();
        assert_eq!(engineering["employeeCount"], 3);
        assert_eq!(engineering["manager"]["firstName"], "Sarah");
    }

    #[tokio::test]
    async fn null_in_patch_clears_optional_fields() {
        let app = app();
        let (status, department) = send(
            &app,
            Method::PATCH,
            "/api/departments/1",
            Some(json!({ "managerId": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(department["managerId"], Value::Null);
        assert_eq!(department["name"], "Engineering");

        let (_, stored) = get(&app, "/api/departments/1").await;
        assert_eq!(stored["managerId"], Value::Null);

        let (status, employee) = send(
            &app,
            Method::PATCH,
            "/api/employees/1",
            Some(json!({ "phone": null, "role": "Director" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(employee["phone"], Value::Null);
        assert_eq!(employee["role"], "Director");

        // Absent fields are left alone.
        let (_, employee) = send(
            &app,
            Method::PATCH,
            "/api/employees/2",
            Some(json!({ "role": "Staff Engineer" })),
        )
        .await;
        assert_eq!(employee["phone"], "+1 (555) 234-5678");
    }

    #[tokio::test]
    async fn duplicate_department_conflicts() {
        let (status, _) = send(
            &app(),
            Method::POST,
            "/api/departments",
            Some(json!({ "name": "Engineering", "description": "Again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn time_off_is_submitted_pending_and_reviewed() {
        let app = app();
        let (status, created) = send(
            &app,
            Method::POST,
            "/api/time-off",
            Some(json!({
                "employeeId": 3,
                "type": "Personal",
                "startDate": "2024-07-01",
                "endDate": "2024-07-02"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], 7);
        assert_eq!(created["status"], "Pending");
        assert_eq!(created["submittedDate"], "2024-06-10");
        assert_eq!(created["employeeName"], "Emily Rodriguez");

        let (status, approved) = send(
            &app,
            Method::PUT,
            "/api/time-off/7/status",
            Some(json!({ "status": "Approved", "approvedBy": "Sarah Johnson" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "Approved");
        assert_eq!(approved["approvedBy"], "Sarah Johnson");

        let (_, reopened) = send(
            &app,
            Method::PUT,
            "/api/time-off/7/status",
            Some(json!({ "status": "Pending", "approvedBy": "Sarah Johnson" })),
        )
        .await;
        assert_eq!(reopened["status"], "Pending");
        assert!(reopened["approvedBy"].is_null());
    }

    #[tokio::test]
    async fn reopening_conflicts_when_policy_forbids_it() {
        let app = app_with(TransitionPolicy { allow_reopen: false });
        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/time-off/2/status",
            Some(json!({ "status": "Rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn time_off_list_filters_by_status_employee_and_range() {
        let app = app();
        let (_, pending) = get(&app, "/api/time-off?status=Pending").await;
        assert_eq!(ids(&pending), vec![1, 6]);

        let (_, for_employee) = get(&app, "/api/time-off?employeeId=4").await;
        assert_eq!(ids(&for_employee), vec![2]);

        let (_, in_range) = get(&app, "/api/time-off?from=2024-06-20&to=2024-06-30").await;
        assert_eq!(ids(&in_range), vec![1, 2, 6]);

        let (_, open_ended) = get(&app, "/api/time-off?from=2024-07-10").await;
        assert_eq!(ids(&open_ended), vec![2, 5]);

        let (status, _) = get(&app, "/api/time-off?from=2024-06-30&to=2024-06-20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn marking_attendance_creates_then_updates() {
        let app = app();
        let (status, created) = send(
            &app,
            Method::POST,
            "/api/attendance/mark",
            Some(json!({ "employeeId": 5, "checkIn": "09:20" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], 10);
        assert_eq!(created["status"], "Late");
        assert_eq!(created["employeeName"], "Jessica Patel");

        let (_, updated) = send(
            &app,
            Method::POST,
            "/api/attendance/mark",
            Some(json!({ "employeeId": 5, "checkIn": "08:00", "checkOut": "17:00" })),
        )
        .await;
        assert_eq!(updated["id"], 10);
        assert_eq!(updated["checkIn"], "09:20");
        assert_eq!(updated["checkOut"], "17:00");
        assert_eq!(updated["status"], "Late");

        let (_, today) = get(&app, "/api/attendance?date=2024-06-10&status=Late").await;
        assert_eq!(ids(&today), vec![2, 10]);
    }

    #[tokio::test]
    async fn malformed_check_in_is_bad_request() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/attendance/mark",
            Some(json!({ "employeeId": 5, "checkIn": "9am" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("9am"));
    }

    #[tokio::test]
    async fn attendance_stats_and_week_default_to_today() {
        let app = app();
        let (_, stats) = get(&app, "/api/attendance/stats").await;
        assert_eq!(stats["date"], "2024-06-10");
        assert_eq!(stats["present"], 3);
        assert_eq!(stats["late"], 1);
        assert_eq!(stats["absent"], 5);
        assert_eq!(stats["total"], 8);

        let (_, week) = get(&app, "/api/attendance/week?date=2024-06-07").await;
        let week = week.as_array().unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0]["date"], "2024-06-02");
        assert_eq!(week[5]["day"], "Fri");
        assert_eq!(week[5]["records"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn week_at_the_calendar_edge_is_bad_request() {
        let app = app();
        let (status, body) = get(&app, "/api/attendance/week?date=%2B262142-12-31").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("262142-12-31"));

        // The server keeps answering afterwards.
        let (status, _) = get(&app, "/status").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn dashboard_summarizes_today() {
        let (status, body) = get(&app(), "/api/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalEmployees"], 8);
        assert_eq!(body["activeEmployees"], 6);
        assert_eq!(body["pendingRequests"], 2);
        assert_eq!(body["todayAttendance"], 5);
        assert_eq!(body["upcomingTimeOff"][0]["id"], 5);
        assert_eq!(body["recentActivity"][0]["kind"], "time-off");
    }

    #[tokio::test]
    async fn attendance_export_is_csv() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/attendance/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("id,employee_id,employee_name,date,check_in,check_out,status,hours"));
        assert_eq!(text.lines().count(), 10);
    }
}
