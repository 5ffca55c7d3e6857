// src/service.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use crate::attendance::worked_hours;
use crate::clock::Clock;
use crate::dashboard::{
    self, AttendanceDay, AttendanceStats, DashboardSummary, DepartmentStats, TimeOffCounts,
};
use crate::error::{io_context, HrError, Result};
use crate::models::*;
use crate::query::{
    department_roster, employees_by_status, requests_by_status, AttendanceFilter, DateRange,
    EmployeeFilter, TimeOffFilter,
};
use crate::store::{Backend, BatchFailure, BatchOutcome, Stores};

/// Which time-off status changes are accepted once a request has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPolicy {
    /// Allow Approved/Rejected requests to move again (back to Pending or to the other
    /// decision).
    pub allow_reopen: bool,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self { allow_reopen: true }
    }
}

impl TransitionPolicy {
    pub fn check(&self, id: RecordId, from: TimeOffStatus, to: TimeOffStatus) -> Result<()> {
        if from == to || from == TimeOffStatus::Pending || self.allow_reopen {
            return Ok(());
        }
        Err(HrError::TransitionNotAllowed { id, from, to })
    }
}

/// One CSV row of the attendance export.
#[derive(Debug, Clone, Serialize)]
struct AttendanceExportRow<'a> {
    id: RecordId,
    employee_id: RecordId,
    employee_name: &'a str,
    date: NaiveDate,
    check_in: Option<&'a str>,
    check_out: Option<&'a str>,
    status: AttendanceStatus,
    hours: Option<Decimal>,
}

/// Business operations over the entity stores. Every write validates references against the
/// current store contents.
#[derive(Clone)]
pub struct HrService {
    stores: Stores,
    clock: Arc<dyn Clock>,
    policy: TransitionPolicy,
}

impl HrService {
    pub fn new(stores: Stores, clock: Arc<dyn Clock>, policy: TransitionPolicy) -> Self {
        info!(
            "HR service using {} backend (status reopen allowed: {})",
            stores.backend, policy.allow_reopen
        );
        Self {
            stores,
            clock,
            policy,
        }
    }

    pub fn backend(&self) -> Backend {
        self.stores.backend
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // --- Reference Checks ---

    async fn require_employee(
        &self,
        entity: &'static str,
        field: &'static str,
        id: RecordId,
    ) -> Result<Employee> {
        match self.stores.employees.get(id).await {
            Err(HrError::NotFound { .. }) => Err(HrError::InvalidReference {
                entity,
                field,
                reference: id.to_string(),
            }),
            other => other,
        }
    }

    async fn require_department_name(
        &self,
        entity: &'static str,
        field: &'static str,
        name: &str,
    ) -> Result<()> {
        let departments = self.stores.departments.snapshot().await?;
        if departments.iter().any(|d| d.name == name) {
            return Ok(());
        }
        Err(HrError::InvalidReference {
            entity,
            field,
            reference: name.to_string(),
        })
    }

    // --- Employees ---

    pub async fn list_employees(&self) -> Result<Vec<Employee>> {
        self.stores.employees.list().await
    }

    pub async fn get_employee(&self, id: RecordId) -> Result<Employee> {
        self.stores.employees.get(id).await
    }

    pub async fn create_employee(&self, draft: NewEmployee) -> Result<Employee> {
        info!("Creating employee {} {}", draft.first_name, draft.last_name);
        if !draft.department.trim().is_empty() {
            self.require_department_name("Employee", "department", &draft.department)
                .await?;
        }
        self.stores.employees.create(draft).await
    }

    pub async fn create_employees(&self, drafts: Vec<NewEmployee>) -> Result<BatchOutcome<Employee>> {
        info!("Creating {} employees", drafts.len());
        let departments = self.stores.departments.snapshot().await?;
        let (valid, rejected): (Vec<_>, Vec<_>) = drafts
            .into_iter()
            .enumerate()
            .partition(|(_, d)| {
                d.department.trim().is_empty()
                    || departments.iter().any(|dep| dep.name == d.department)
            });
        let indices: Vec<usize> = valid.iter().map(|(i, _)| *i).collect();
        let mut outcome = self
            .stores
            .employees
            .create_many(valid.into_iter().map(|(_, d)| d).collect())
            .await?;
        // Batch positions reported by the store refer to the filtered list.
        for failure in &mut outcome.failed {
            failure.index = indices.get(failure.index).copied().unwrap_or(failure.index);
        }
        outcome
            .failed
            .extend(rejected.into_iter().map(|(index, d)| BatchFailure {
                index,
                message: HrError::InvalidReference {
                    entity: "Employee",
                    field: "department",
                    reference: d.department,
                }
                .to_string(),
            }));
        outcome.failed.sort_by_key(|f| f.index);
        outcome.log_failures("Employee batch create");
        Ok(outcome)
    }

    pub async fn update_employee(&self, id: RecordId, patch: EmployeeUpdate) -> Result<Employee> {
        info!("Updating employee {}", id);
        if let Some(department) = patch.department.as_deref().filter(|d| !d.trim().is_empty()) {
            self.require_department_name("Employee", "department", department)
                .await?;
        }
        self.stores.employees.update(id, patch).await
    }

    /// Leaves time-off and attendance records pointing at the removed employee.
    pub async fn delete_employee(&self, id: RecordId) -> Result<Employee> {
        info!("Deleting employee {}", id);
        self.stores.employees.delete(id).await
    }

    pub async fn employees_by_status(&self, status: EmployeeStatus) -> Result<Vec<Employee>> {
        Ok(employees_by_status(&self.list_employees().await?, status))
    }

    pub async fn filter_employees(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>> {
        Ok(filter.apply(&self.list_employees().await?))
    }

    // --- Departments ---

    pub async fn list_departments(&self) -> Result<Vec<Department>> {
        self.stores.departments.list().await
    }

    pub async fn get_department(&self, id: RecordId) -> Result<Department> {
        self.stores.departments.get(id).await
    }

    pub async fn create_department(&self, draft: NewDepartment) -> Result<Department> {
        info!("Creating department '{}'", draft.name);
        if draft.name.trim().is_empty() {
            return Err(HrError::ValidationMissing {
                entity: "Department",
                field: "name",
            });
        }
        if draft.description.trim().is_empty() {
            return Err(HrError::ValidationMissing {
                entity: "Department",
                field: "description",
            });
        }
        if let Some(manager_id) = draft.manager_id {
            self.require_employee("Department", "managerId", manager_id)
                .await?;
        }
        if let Some(parent) = draft.parent_department.as_deref().filter(|p| !p.trim().is_empty()) {
            self.require_department_name("Department", "parentDepartment", parent)
                .await?;
        }
        self.stores.departments.create(draft).await
    }

    /// A rename is carried over to employees and child departments that used the old name.
    pub async fn update_department(&self, id: RecordId, patch: DepartmentUpdate) -> Result<Department> {
        info!("Updating department {}", id);
        let current = self.stores.departments.get(id).await?;
        if let Some(Some(manager_id)) = patch.manager_id {
            self.require_employee("Department", "managerId", manager_id)
                .await?;
        }
        if let Some(parent) = patch
            .parent_department
            .as_ref()
            .and_then(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
        {
            self.require_department_name("Department", "parentDepartment", parent)
                .await?;
        }
        let updated = self.stores.departments.update(id, patch).await?;
        if updated.name != current.name {
            self.propagate_rename(&current.name, &updated.name).await?;
        }
        Ok(updated)
    }

    async fn propagate_rename(&self, old: &str, new: &str) -> Result<()> {
        let mut moved = 0;
        for employee in department_roster(&self.stores.employees.snapshot().await?, old) {
            let patch = EmployeeUpdate {
                department: Some(new.to_string()),
                ..Default::default()
            };
            self.stores.employees.update(employee.id, patch).await?;
            moved += 1;
        }
        let children: Vec<Department> = self
            .stores
            .departments
            .snapshot()
            .await?
            .into_iter()
            .filter(|d| d.parent_department.as_deref() == Some(old))
            .collect();
        for child in &children {
            let patch = DepartmentUpdate {
                parent_department: Some(Some(new.to_string())),
                ..Default::default()
            };
            self.stores.departments.update(child.id, patch).await?;
        }
        info!(
            "Department '{}' renamed to '{}': moved {} employee(s), {} child department(s)",
            old,
            new,
            moved,
            children.len()
        );
        Ok(())
    }

    pub async fn delete_department(&self, id: RecordId) -> Result<Department> {
        info!("Deleting department {}", id);
        self.stores.departments.delete(id).await
    }

    pub async fn department_roster(&self, id: RecordId) -> Result<Vec<Employee>> {
        let department = self.get_department(id).await?;
        Ok(department_roster(&self.list_employees().await?, &department.name))
    }

    pub async fn department_stats(&self) -> Result<Vec<DepartmentStats>> {
        let (departments, employees) =
            tokio::try_join!(self.list_departments(), self.list_employees())?;
        Ok(dashboard::department_stats(&departments, &employees))
    }

    // --- Time Off ---

    pub async fn list_time_off(&self) -> Result<Vec<TimeOffRequest>> {
        self.stores.time_off.list().await
    }

    pub async fn get_time_off(&self, id: RecordId) -> Result<TimeOffRequest> {
        self.stores.time_off.get(id).await
    }

    /// New requests start `Pending`, unreviewed, submitted today.
    pub async fn create_time_off(&self, mut draft: NewTimeOffRequest) -> Result<TimeOffRequest> {
        info!(
            "Creating {} request for employee {:?}",
            draft.request_type, draft.employee_id
        );
        match draft.employee_id {
            Some(employee_id) => {
                let employee = self
                    .require_employee("TimeOffRequest", "employeeId", employee_id)
                    .await?;
                if draft.employee_name.trim().is_empty() {
                    draft.employee_name = employee.full_name();
                }
            }
            None if draft.employee_name.trim().is_empty() => {
                return Err(HrError::ValidationMissing {
                    entity: "TimeOffRequest",
                    field: "employeeId",
                });
            }
            None => {}
        }
        self.stores.time_off.create(draft).await
    }

    /// Field edits only; any status decision on the patch is ignored.
    pub async fn update_time_off(&self, id: RecordId, mut patch: TimeOffUpdate) -> Result<TimeOffRequest> {
        info!("Updating time-off request {}", id);
        if patch.decision.take().is_some() {
            warn!("Ignoring status change on field update of request {}", id);
        }
        self.stores.time_off.update(id, patch).await
    }

    /// Records a reviewer decision. `Pending` always clears the reviewer, whatever was passed.
    pub async fn update_time_off_status(
        &self,
        id: RecordId,
        status: TimeOffStatus,
        approved_by: Option<String>,
    ) -> Result<TimeOffRequest> {
        info!("Setting time-off request {} to {}", id, status);
        let current = self.stores.time_off.get(id).await?;
        self.policy.check(id, current.status, status)?;
        let patch = TimeOffUpdate {
            decision: Some(StatusDecision {
                status,
                approved_by,
            }),
            ..Default::default()
        };
        self.stores.time_off.update(id, patch).await
    }

    pub async fn delete_time_off(&self, id: RecordId) -> Result<TimeOffRequest> {
        info!("Deleting time-off request {}", id);
        self.stores.time_off.delete(id).await
    }

    pub async fn time_off_by_status(&self, status: TimeOffStatus) -> Result<Vec<TimeOffRequest>> {
        Ok(requests_by_status(&self.list_time_off().await?, status))
    }

    pub async fn time_off_by_employee(&self, employee_id: RecordId) -> Result<Vec<TimeOffRequest>> {
        self.filter_time_off(&TimeOffFilter {
            employee_id: Some(employee_id),
            ..Default::default()
        })
        .await
    }

    /// Requests whose dates overlap `[start, end]`, both ends inclusive.
    pub async fn time_off_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TimeOffRequest>> {
        let range = DateRange::new(start, end)?;
        self.filter_time_off(&TimeOffFilter {
            range: Some(range),
            ..Default::default()
        })
        .await
    }

    pub async fn filter_time_off(&self, filter: &TimeOffFilter) -> Result<Vec<TimeOffRequest>> {
        Ok(filter.apply(&self.list_time_off().await?))
    }

    pub async fn time_off_counts(&self) -> Result<TimeOffCounts> {
        Ok(dashboard::time_off_counts(&self.list_time_off().await?))
    }

    pub async fn approved_time_off_on(&self, day: NaiveDate) -> Result<Vec<TimeOffRequest>> {
        Ok(dashboard::approved_requests_on(
            &self.list_time_off().await?,
            day,
        ))
    }

    // --- Attendance ---

    pub async fn list_attendance(&self) -> Result<Vec<AttendanceRecord>> {
        self.stores.attendance.list().await
    }

    pub async fn get_attendance(&self, id: RecordId) -> Result<AttendanceRecord> {
        self.stores.attendance.get(id).await
    }

    /// Status is derived from the check-in. A second record for the same employee and day
    /// is rejected by the store.
    pub async fn create_attendance(&self, mut draft: NewAttendanceRecord) -> Result<AttendanceRecord> {
        info!("Recording attendance for employee {}", draft.employee_id);
        let employee = self
            .require_employee("AttendanceRecord", "employeeId", draft.employee_id)
            .await?;
        if draft.employee_name.trim().is_empty() {
            draft.employee_name = employee.full_name();
        }
        self.stores.attendance.create(draft).await
    }

    pub async fn update_attendance(&self, id: RecordId, patch: AttendanceUpdate) -> Result<AttendanceRecord> {
        info!("Updating attendance record {}", id);
        self.stores.attendance.update(id, patch).await
    }

    pub async fn delete_attendance(&self, id: RecordId) -> Result<AttendanceRecord> {
        info!("Deleting attendance record {}", id);
        self.stores.attendance.delete(id).await
    }

    /// Upserts today's record for the employee.
    ///
    /// An existing record gets the new check-out, and keeps its check-in unless it had none,
    /// with the status re-derived from the resulting check-in. Otherwise a new record is
    /// created from the given times.
    pub async fn mark_attendance(&self, mark: MarkAttendance) -> Result<AttendanceRecord> {
        let today = self.today();
        info!("Marking attendance for employee {} on {}", mark.employee_id, today);
        let employee = self
            .require_employee("AttendanceRecord", "employeeId", mark.employee_id)
            .await?;
        let existing = self
            .stores
            .attendance
            .snapshot()
            .await?
            .into_iter()
            .find(|r| r.employee_id == mark.employee_id && r.date == today);

        match existing {
            Some(record) => {
                let check_in = match record.check_in {
                    Some(_) => None,
                    None => mark.check_in.map(Some),
                };
                let patch = AttendanceUpdate {
                    date: None,
                    check_in,
                    check_out: Some(mark.check_out),
                };
                self.stores.attendance.update(record.id, patch).await
            }
            None => {
                let employee_name = if mark.employee_name.trim().is_empty() {
                    employee.full_name()
                } else {
                    mark.employee_name
                };
                let draft = NewAttendanceRecord {
                    employee_id: mark.employee_id,
                    employee_name,
                    date: Some(today),
                    check_in: mark.check_in,
                    check_out: mark.check_out,
                };
                self.stores.attendance.create(draft).await
            }
        }
    }

    /// Newest first.
    pub async fn attendance_by_employee(&self, employee_id: RecordId) -> Result<Vec<AttendanceRecord>> {
        let mut records = self
            .filter_attendance(&AttendanceFilter {
                employee_id: Some(employee_id),
                ..Default::default()
            })
            .await?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    pub async fn attendance_for_day(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        self.filter_attendance(&AttendanceFilter {
            date: Some(date),
            ..Default::default()
        })
        .await
    }

    pub async fn filter_attendance(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>> {
        Ok(filter.apply(&self.list_attendance().await?))
    }

    pub async fn attendance_stats(&self, date: NaiveDate) -> Result<AttendanceStats> {
        let (employees, attendance) =
            tokio::try_join!(self.list_employees(), self.list_attendance())?;
        Ok(dashboard::attendance_stats(date, employees.len(), &attendance))
    }

    pub async fn weekly_attendance(&self, date: NaiveDate) -> Result<Vec<AttendanceDay>> {
        dashboard::weekly_attendance(&self.list_attendance().await?, date)
    }

    // --- Dashboard & Export ---

    pub async fn dashboard(&self) -> Result<DashboardSummary> {
        let (employees, requests, attendance) = tokio::try_join!(
            self.list_employees(),
            self.list_time_off(),
            self.list_attendance()
        )?;
        Ok(dashboard::summarize(
            self.today(),
            &employees,
            &requests,
            &attendance,
        ))
    }

    /// Writes every attendance record as CSV, with worked hours where both times are known.
    /// Returns the number of rows written.
    pub async fn export_attendance_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut records = self.list_attendance().await?;
        records.sort_by(|a, b| a.date.cmp(&b.date).then(a.employee_id.cmp(&b.employee_id)));
        let mut csv_writer = csv::Writer::from_writer(writer);
        for record in &records {
            let hours = worked_hours(record.check_in.as_deref(), record.check_out.as_deref())
                .unwrap_or_else(|e| {
                    warn!("Attendance record {} has unusable times: {}", record.id, e);
                    None
                });
            csv_writer.serialize(AttendanceExportRow {
                id: record.id,
                employee_id: record.employee_id,
                employee_name: &record.employee_name,
                date: record.date,
                check_in: record.check_in.as_deref(),
                check_out: record.check_out.as_deref(),
                status: record.status,
                hours,
            })?;
        }
        csv_writer
            .flush()
            .map_err(|e| io_context(e, "Failed to flush attendance export"))?;
        info!("Exported {} attendance record(s)", records.len());
        Ok(records.len())
    }
}
