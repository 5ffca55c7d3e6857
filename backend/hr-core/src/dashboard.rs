// src/dashboard.rs
//
// Derived views over store snapshots. Nothing here is stored; every value is recomputed
// from the lists passed in.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::{HrError, Result};
use crate::models::{
    AttendanceRecord, AttendanceStatus, Department, Employee, EmployeeStatus, TimeOffRequest,
    TimeOffStatus,
};
use crate::query::department_roster;

pub const UPCOMING_LIMIT: usize = 5;
pub const RECENT_REQUESTS: usize = 3;
pub const RECENT_CHECK_INS: usize = 2;
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub total_employees: usize,
    pub active_employees: usize,
    pub pending_requests: usize,
    /// Attendance records dated today.
    pub today_attendance: usize,
    pub upcoming_time_off: Vec<TimeOffRequest>,
    pub recent_activity: Vec<RecentActivity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    TimeOff,
    Attendance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub kind: ActivityKind,
    pub message: String,
    pub status: String,
    pub time: Option<String>,
}

pub fn summarize(
    today: NaiveDate,
    employees: &[Employee],
    requests: &[TimeOffRequest],
    attendance: &[AttendanceRecord],
) -> DashboardSummary {
    let todays: Vec<&AttendanceRecord> = attendance.iter().filter(|a| a.date == today).collect();

    let mut upcoming: Vec<TimeOffRequest> = requests
        .iter()
        .filter(|r| r.status == TimeOffStatus::Approved && r.start_date > today)
        .cloned()
        .collect();
    upcoming.sort_by_key(|r| r.start_date);
    upcoming.truncate(UPCOMING_LIMIT);

    let mut recent_activity: Vec<RecentActivity> = requests
        .iter()
        .take(RECENT_REQUESTS)
        .map(|r| RecentActivity {
            kind: ActivityKind::TimeOff,
            message: format!("{} requested time off", r.employee_name),
            status: r.status.to_string(),
            time: Some(r.submitted_date.to_string()),
        })
        .collect();
    recent_activity.extend(todays.iter().take(RECENT_CHECK_INS).map(|a| RecentActivity {
        kind: ActivityKind::Attendance,
        message: format!("{} checked in", a.employee_name),
        status: a.status.to_string(),
        time: a.check_in.clone(),
    }));
    recent_activity.truncate(RECENT_LIMIT);

    DashboardSummary {
        date: today,
        total_employees: employees.len(),
        active_employees: employees
            .iter()
            .filter(|e| e.status == EmployeeStatus::Active)
            .count(),
        pending_requests: requests
            .iter()
            .filter(|r| r.status == TimeOffStatus::Pending)
            .count(),
        today_attendance: todays.len(),
        upcoming_time_off: upcoming,
        recent_activity,
    }
}

// --- Attendance ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub date: NaiveDate,
    pub present: usize,
    pub late: usize,
    /// Every employee without a `Present` record that day, late arrivals included.
    pub absent: usize,
    /// Headcount, not record count.
    pub total: usize,
}

pub fn attendance_stats(
    day: NaiveDate,
    employee_count: usize,
    attendance: &[AttendanceRecord],
) -> AttendanceStats {
    let count = |status: AttendanceStatus| {
        attendance
            .iter()
            .filter(|a| a.date == day && a.status == status)
            .count()
    };
    let present = count(AttendanceStatus::Present);
    AttendanceStats {
        date: day,
        present,
        late: count(AttendanceStatus::Late),
        absent: employee_count.saturating_sub(present),
        total: employee_count,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDay {
    pub date: NaiveDate,
    /// Short weekday name, e.g. "Mon".
    pub day: String,
    pub records: Vec<AttendanceRecord>,
}

/// Sunday of the week containing `day`.
pub fn week_start(day: NaiveDate) -> Result<NaiveDate> {
    day.checked_sub_signed(Duration::days(i64::from(
        day.weekday().num_days_from_sunday(),
    )))
    .ok_or(HrError::DateOutOfRange(day))
}

/// The Sunday-to-Saturday week containing `any_day`, one entry per day.
/// Weeks running past either end of the calendar are rejected.
pub fn weekly_attendance(
    attendance: &[AttendanceRecord],
    any_day: NaiveDate,
) -> Result<Vec<AttendanceDay>> {
    let start = week_start(any_day)?;
    (0..7)
        .map(|offset| {
            let date = start
                .checked_add_signed(Duration::days(offset))
                .ok_or(HrError::DateOutOfRange(any_day))?;
            Ok(AttendanceDay {
                date,
                day: date.format("%a").to_string(),
                records: attendance
                    .iter()
                    .filter(|a| a.date == date)
                    .cloned()
                    .collect(),
            })
        })
        .collect()
}

// --- Departments & Time Off ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentStats {
    #[serde(flatten)]
    pub department: Department,
    pub employee_count: usize,
    pub active_employees: usize,
    pub manager: Option<Employee>,
}

pub fn department_stats(departments: &[Department], employees: &[Employee]) -> Vec<DepartmentStats> {
    departments
        .iter()
        .map(|department| {
            let roster = department_roster(employees, &department.name);
            DepartmentStats {
                employee_count: roster.len(),
                active_employees: roster
                    .iter()
                    .filter(|e| e.status == EmployeeStatus::Active)
                    .count(),
                manager: department
                    .manager_id
                    .and_then(|id| employees.iter().find(|e| e.id == id).cloned()),
                department: department.clone(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeOffCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

pub fn time_off_counts(requests: &[TimeOffRequest]) -> TimeOffCounts {
    requests
        .iter()
        .fold(TimeOffCounts::default(), |mut counts, r| {
            match r.status {
                TimeOffStatus::Pending => counts.pending += 1,
                TimeOffStatus::Approved => counts.approved += 1,
                TimeOffStatus::Rejected => counts.rejected += 1,
            }
            counts
        })
}

/// Approved requests covering `day`, for the calendar view.
pub fn approved_requests_on(requests: &[TimeOffRequest], day: NaiveDate) -> Vec<TimeOffRequest> {
    requests
        .iter()
        .filter(|r| r.status == TimeOffStatus::Approved && r.start_date <= day && day <= r.end_date)
        .cloned()
        .collect()
}
