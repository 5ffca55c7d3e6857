// src/fixtures.rs

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{io_context, Result};
use crate::models::{AttendanceRecord, Department, Employee, TimeOffRequest};

pub const EMPLOYEES_FILE: &str = "employees.json";
pub const DEPARTMENTS_FILE: &str = "departments.json";
pub const TIME_OFF_FILE: &str = "time_off_requests.json";
pub const ATTENDANCE_FILE: &str = "attendance.json";

const BUILTIN_EMPLOYEES: &str = include_str!("../fixtures/employees.json");
const BUILTIN_DEPARTMENTS: &str = include_str!("../fixtures/departments.json");
const BUILTIN_TIME_OFF: &str = include_str!("../fixtures/time_off_requests.json");
const BUILTIN_ATTENDANCE: &str = include_str!("../fixtures/attendance.json");

/// Seed data for the in-memory backend, one JSON array per entity type.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    pub employees: Vec<Employee>,
    pub departments: Vec<Department>,
    pub time_off_requests: Vec<TimeOffRequest>,
    pub attendance: Vec<AttendanceRecord>,
}

impl Fixtures {
    /// The fixture set compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            employees: serde_json::from_str(BUILTIN_EMPLOYEES)?,
            departments: serde_json::from_str(BUILTIN_DEPARTMENTS)?,
            time_off_requests: serde_json::from_str(BUILTIN_TIME_OFF)?,
            attendance: serde_json::from_str(BUILTIN_ATTENDANCE)?,
        })
    }

    /// Reads the four fixture files from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        info!("Loading fixtures from {}", dir.display());
        let fixtures = Self {
            employees: read_json(&dir.join(EMPLOYEES_FILE))?,
            departments: read_json(&dir.join(DEPARTMENTS_FILE))?,
            time_off_requests: read_json(&dir.join(TIME_OFF_FILE))?,
            attendance: read_json(&dir.join(ATTENDANCE_FILE))?,
        };
        info!(
            "Loaded {} employees, {} departments, {} time-off requests, {} attendance records",
            fixtures.employees.len(),
            fixtures.departments.len(),
            fixtures.time_off_requests.len(),
            fixtures.attendance.len()
        );
        Ok(fixtures)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .map_err(|e| io_context(e, format!("Failed to read fixture {}", path.display())))?;
    Ok(serde_json::from_str(&content)?)
}
