// src/main.rs

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    backend: String,
    date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Employee {
    id: i64,
    first_name: String,
    last_name: String,
    department: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeOffRequest {
    id: i64,
    employee_name: String,
    status: String,
    approved_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceRecord {
    id: i64,
    employee_name: String,
    check_in: Option<String>,
    check_out: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardSummary {
    total_employees: usize,
    active_employees: usize,
    pending_requests: usize,
    today_attendance: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HR_BASE_URL").ok())
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Status
    println!("\n🔍 Testing status endpoint...");
    let status = client
        .get(format!("{}/status", base_url))
        .send()
        .await?
        .json::<StatusResponse>()
        .await?;
    println!(
        "Status: {} (backend: {}, date: {})",
        status.status, status.backend, status.date
    );

    // Test 2: Employee directory
    println!("\n🔍 Listing employees...");
    let employees = client
        .get(format!("{}/api/employees", base_url))
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<Employee>>()
        .await?;
    for employee in &employees {
        println!(
            "  #{} {} {} ({})",
            employee.id, employee.first_name, employee.last_name, employee.department
        );
    }
    let Some(first) = employees.first() else {
        println!("❌ No employees returned, stopping here.");
        return Ok(());
    };

    // Test 3: Time-off request lifecycle
    println!("\n🔍 Submitting a time-off request for employee #{}...", first.id);
    let created = client
        .post(format!("{}/api/time-off", base_url))
        .json(&json!({
            "employeeId": first.id,
            "type": "Personal",
            "startDate": status.date,
            "endDate": status.date,
            "reason": "Smoke test"
        }))
        .send()
        .await?;
    if created.status() != StatusCode::CREATED {
        println!("❌ Create failed: {} {}", created.status(), created.text().await?);
        return Ok(());
    }
    let request = created.json::<TimeOffRequest>().await?;
    println!("Created request #{} for {} ({})", request.id, request.employee_name, request.status);

    let approved = client
        .put(format!("{}/api/time-off/{}/status", base_url, request.id))
        .json(&json!({ "status": "Approved", "approvedBy": "hr-test-client" }))
        .send()
        .await?
        .error_for_status()?
        .json::<TimeOffRequest>()
        .await?;
    println!(
        "Approved request #{}: status={}, approvedBy={:?}",
        approved.id, approved.status, approved.approved_by
    );

    let removed = client
        .delete(format!("{}/api/time-off/{}", base_url, request.id))
        .send()
        .await?;
    println!("Cleanup delete status: {}", removed.status());

    // Test 4: Attendance
    println!("\n🔍 Marking attendance for employee #{}...", first.id);
    let marked = client
        .post(format!("{}/api/attendance/mark", base_url))
        .json(&json!({ "employeeId": first.id, "checkIn": "08:55", "checkOut": "17:05" }))
        .send()
        .await?
        .error_for_status()?
        .json::<AttendanceRecord>()
        .await?;
    println!(
        "Attendance #{} for {}: {:?} - {:?} ({})",
        marked.id, marked.employee_name, marked.check_in, marked.check_out, marked.status
    );

    let stats = client
        .get(format!("{}/api/attendance/stats", base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    println!("Today's attendance stats: {}", stats);

    // Test 5: Dashboard
    println!("\n🔍 Fetching dashboard...");
    let dashboard = client
        .get(format!("{}/api/dashboard", base_url))
        .send()
        .await?
        .error_for_status()?
        .json::<DashboardSummary>()
        .await?;
    println!(
        "Dashboard: {} employees ({} active), {} pending requests, {} checked in today",
        dashboard.total_employees,
        dashboard.active_employees,
        dashboard.pending_requests,
        dashboard.today_attendance
    );

    // Test 6: Error mapping
    println!("\n🔍 Requesting a missing employee...");
    let missing = client
        .get(format!("{}/api/employees/999999", base_url))
        .send()
        .await?;
    println!("Missing employee status: {}", missing.status());
    println!("Body: {}", missing.text().await?);

    println!("\n✅ Smoke test finished.");
    Ok(())
}
