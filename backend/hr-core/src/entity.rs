// src/entity.rs
//
// The `Entity` trait is the seam between the record types and the storage backends.
// Each record knows how to build itself from a draft, merge a partial update, and how its
// fields are named on the remote records API.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::attendance::{calculate_status, validate_clock_time};
use crate::error::{HrError, Result};
use crate::models::{
    AttendanceRecord, AttendanceUpdate, Department, DepartmentUpdate, Employee, EmployeeStatus,
    EmployeeUpdate, NewAttendanceRecord, NewDepartment, NewEmployee, NewTimeOffRequest, RecordId,
    TimeOffRequest, TimeOffStatus, TimeOffUpdate,
};

pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Draft: Clone + Debug + Send + Sync + 'static;
    type Patch: Clone + Debug + Send + Sync + 'static;

    /// Human readable entity name used in errors and logs.
    const NAME: &'static str;
    /// Table name on the remote records API.
    const TABLE: &'static str;
    /// (domain field, remote field) pairs. Domain fields are the camelCase JSON names.
    const FIELDS: &'static [(&'static str, &'static str)];
    /// Remote fields holding a record reference, which may arrive as `n` or `{"Id": n}`.
    const REFERENCE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> RecordId;

    fn from_draft(id: RecordId, draft: Self::Draft, today: NaiveDate) -> Result<Self>;

    fn apply(&mut self, patch: Self::Patch) -> Result<()>;

    /// Value written to the remote `Name` column.
    fn label(&self) -> String;

    /// Stores reject a second record with the same key.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

fn require(entity: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(HrError::ValidationMissing { entity, field });
    }
    Ok(())
}

pub(crate) fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(HrError::InvalidDateRange { start, end });
    }
    Ok(())
}

// --- Employee ---

impl Entity for Employee {
    type Draft = NewEmployee;
    type Patch = EmployeeUpdate;

    const NAME: &'static str = "Employee";
    const TABLE: &'static str = "employee_c";
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("id", "Id"),
        ("firstName", "first_name_c"),
        ("lastName", "last_name_c"),
        ("email", "email_c"),
        ("phone", "phone_c"),
        ("role", "role_c"),
        ("department", "department_c"),
        ("startDate", "start_date_c"),
        ("status", "status_c"),
        ("photo", "photo_c"),
    ];

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: NewEmployee, today: NaiveDate) -> Result<Self> {
        require(Self::NAME, "firstName", &draft.first_name)?;
        require(Self::NAME, "lastName", &draft.last_name)?;
        require(Self::NAME, "email", &draft.email)?;
        Ok(Employee {
            id,
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            email: draft.email.trim().to_string(),
            phone: draft.phone,
            role: draft.role,
            department: draft.department,
            start_date: draft.start_date.unwrap_or(today),
            status: draft.status.unwrap_or(EmployeeStatus::Active),
            photo: draft.photo,
        })
    }

    fn apply(&mut self, patch: EmployeeUpdate) -> Result<()> {
        if let Some(first_name) = patch.first_name {
            require(Self::NAME, "firstName", &first_name)?;
            self.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = patch.last_name {
            require(Self::NAME, "lastName", &last_name)?;
            self.last_name = last_name.trim().to_string();
        }
        if let Some(email) = patch.email {
            require(Self::NAME, "email", &email)?;
            self.email = email.trim().to_string();
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(department) = patch.department {
            self.department = department;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(photo) = patch.photo {
            self.photo = photo;
        }
        Ok(())
    }

    fn label(&self) -> String {
        self.full_name()
    }
}

// --- Department ---

impl Entity for Department {
    type Draft = NewDepartment;
    type Patch = DepartmentUpdate;

    const NAME: &'static str = "Department";
    const TABLE: &'static str = "department_c";
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("id", "Id"),
        ("name", "Name"),
        ("description", "description_c"),
        ("managerId", "manager_id_c"),
        ("parentDepartment", "parent_department_c"),
    ];
    const REFERENCE_FIELDS: &'static [&'static str] = &["manager_id_c"];

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: NewDepartment, _today: NaiveDate) -> Result<Self> {
        require(Self::NAME, "name", &draft.name)?;
        require(Self::NAME, "description", &draft.description)?;
        Ok(Department {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description,
            manager_id: draft.manager_id,
            parent_department: draft.parent_department.filter(|p| !p.trim().is_empty()),
        })
    }

    fn apply(&mut self, patch: DepartmentUpdate) -> Result<()> {
        if let Some(name) = patch.name {
            require(Self::NAME, "name", &name)?;
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            require(Self::NAME, "description", &description)?;
            self.description = description;
        }
        if let Some(manager_id) = patch.manager_id {
            self.manager_id = manager_id;
        }
        if let Some(parent) = patch.parent_department {
            self.parent_department = parent.filter(|p| !p.trim().is_empty());
        }
        Ok(())
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("name '{}'", self.name))
    }
}

// --- Time Off ---

impl Entity for TimeOffRequest {
    type Draft = NewTimeOffRequest;
    type Patch = TimeOffUpdate;

    const NAME: &'static str = "TimeOffRequest";
    const TABLE: &'static str = "time_off_request_c";
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("id", "Id"),
        ("employeeId", "employee_id_c"),
        ("employeeName", "employee_name_c"),
        ("type", "type_c"),
        ("startDate", "start_date_c"),
        ("endDate", "end_date_c"),
        ("reason", "reason_c"),
        ("status", "status_c"),
        ("approvedBy", "approved_by_c"),
        ("submittedDate", "submitted_date_c"),
    ];
    const REFERENCE_FIELDS: &'static [&'static str] = &["employee_id_c"];

    fn id(&self) -> RecordId {
        self.id
    }

    /// New requests always start `Pending`, unapproved, stamped with today's date.
    fn from_draft(id: RecordId, draft: NewTimeOffRequest, today: NaiveDate) -> Result<Self> {
        require(Self::NAME, "type", &draft.request_type)?;
        check_range(draft.start_date, draft.end_date)?;
        Ok(TimeOffRequest {
            id,
            employee_id: draft.employee_id,
            employee_name: draft.employee_name,
            request_type: draft.request_type,
            start_date: draft.start_date,
            end_date: draft.end_date,
            reason: draft.reason,
            status: TimeOffStatus::Pending,
            approved_by: None,
            submitted_date: today,
        })
    }

    fn apply(&mut self, patch: TimeOffUpdate) -> Result<()> {
        let start = patch.start_date.unwrap_or(self.start_date);
        let end = patch.end_date.unwrap_or(self.end_date);
        check_range(start, end)?;
        if let Some(request_type) = patch.request_type {
            require(Self::NAME, "type", &request_type)?;
            self.request_type = request_type;
        }
        self.start_date = start;
        self.end_date = end;
        if let Some(reason) = patch.reason {
            self.reason = reason;
        }
        if let Some(decision) = patch.decision {
            self.status = decision.status;
            self.approved_by = match decision.status {
                TimeOffStatus::Pending => None,
                _ => decision
                    .approved_by
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty()),
            };
        }
        Ok(())
    }

    fn label(&self) -> String {
        format!("{} - {}", self.employee_name, self.request_type)
    }
}

// --- Attendance ---

impl Entity for AttendanceRecord {
    type Draft = NewAttendanceRecord;
    type Patch = AttendanceUpdate;

    const NAME: &'static str = "AttendanceRecord";
    const TABLE: &'static str = "attendance_c";
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("id", "Id"),
        ("employeeId", "employee_id_c"),
        ("employeeName", "employee_name_c"),
        ("date", "date_c"),
        ("checkIn", "check_in_c"),
        ("checkOut", "check_out_c"),
        ("status", "status_c"),
    ];
    const REFERENCE_FIELDS: &'static [&'static str] = &["employee_id_c"];

    fn id(&self) -> RecordId {
        self.id
    }

    fn from_draft(id: RecordId, draft: NewAttendanceRecord, today: NaiveDate) -> Result<Self> {
        let check_in = validate_clock_time(draft.check_in.as_deref())?;
        let check_out = validate_clock_time(draft.check_out.as_deref())?;
        let status = calculate_status(check_in.as_deref())?;
        Ok(AttendanceRecord {
            id,
            employee_id: draft.employee_id,
            employee_name: draft.employee_name,
            date: draft.date.unwrap_or(today),
            check_in,
            check_out,
            status,
        })
    }

    fn apply(&mut self, patch: AttendanceUpdate) -> Result<()> {
        if let Some(date) = patch.date {
            self.date = date;
        }
        // Validate both before touching the record.
        let check_in = patch
            .check_in
            .map(|c| validate_clock_time(c.as_deref()))
            .transpose()?;
        let check_out = patch
            .check_out
            .map(|c| validate_clock_time(c.as_deref()))
            .transpose()?;
        if let Some(check_in) = check_in {
            self.status = calculate_status(check_in.as_deref())?;
            self.check_in = check_in;
        }
        if let Some(check_out) = check_out {
            self.check_out = check_out;
        }
        Ok(())
    }

    fn label(&self) -> String {
        format!("{} {}", self.employee_name, self.date)
    }

    fn unique_key(&self) -> Option<String> {
        Some(format!("employee {} on {}", self.employee_id, self.date))
    }
}
