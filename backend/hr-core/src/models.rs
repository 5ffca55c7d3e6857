// src/models.rs

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type RecordId = i64;

/// Patch fields that can be cleared: absent is `None`, an explicit `null` is `Some(None)`.
pub type Nullable<T> = Option<Option<T>>;

fn nullable<'de, D, T>(deserializer: D) -> Result<Nullable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// --- Status Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
    #[serde(rename = "On Leave")]
    OnLeave,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "Active",
            EmployeeStatus::Inactive => "Inactive",
            EmployeeStatus::OnLeave => "On Leave",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeOffStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl TimeOffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOffStatus::Pending => "Pending",
            TimeOffStatus::Approved => "Approved",
            TimeOffStatus::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Absent => "Absent",
        }
    }
}

impl fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TimeOffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Employee ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: String,
    // Department *name*; employees are grouped by name, not by department Id.
    #[serde(default)]
    pub department: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub status: EmployeeStatus,
    #[serde(default)]
    pub photo: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub department: String,
    /// Defaults to the current date.
    pub start_date: Option<NaiveDate>,
    /// Defaults to `Active`.
    pub status: Option<EmployeeStatus>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub phone: Nullable<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub status: Option<EmployeeStatus>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub photo: Nullable<String>,
}

// --- Department ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manager_id: Option<RecordId>,
    /// Name of the parent department. No cycle detection is performed.
    #[serde(default)]
    pub parent_department: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDepartment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub manager_id: Option<RecordId>,
    pub parent_department: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub manager_id: Nullable<RecordId>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub parent_department: Nullable<String>,
}

// --- Time Off ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOffRequest {
    pub id: RecordId,
    #[serde(default)]
    pub employee_id: Option<RecordId>,
    #[serde(default)]
    pub employee_name: String,
    #[serde(rename = "type")]
    pub request_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: TimeOffStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    pub submitted_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeOffRequest {
    pub employee_id: Option<RecordId>,
    /// Filled from the referenced employee when empty.
    #[serde(default)]
    pub employee_name: String,
    #[serde(rename = "type", default)]
    pub request_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

/// Field edits for a request. Status changes go through `HrService::update_time_off_status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOffUpdate {
    #[serde(rename = "type")]
    pub request_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub reason: Nullable<String>,
    /// Never read from request bodies.
    #[serde(skip)]
    pub decision: Option<StatusDecision>,
}

/// A reviewer's status change. Moving back to `Pending` drops the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDecision {
    pub status: TimeOffStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
}

// --- Attendance ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub employee_id: RecordId,
    #[serde(default)]
    pub employee_name: String,
    pub date: NaiveDate,
    /// "HH:MM"
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendanceRecord {
    pub employee_id: RecordId,
    #[serde(default)]
    pub employee_name: String,
    /// Defaults to the current date.
    pub date: Option<NaiveDate>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
}

/// Attendance status is never set directly; it is re-derived from `check_in`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub check_in: Nullable<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub check_out: Nullable<String>,
}

/// Input of the "mark attendance" upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendance {
    pub employee_id: RecordId,
    #[serde(default)]
    pub employee_name: String,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
}
