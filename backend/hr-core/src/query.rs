// src/query.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::check_range;
use crate::error::Result;
use crate::models::{
    AttendanceRecord, AttendanceStatus, Employee, EmployeeStatus, RecordId, TimeOffRequest,
    TimeOffStatus,
};

/// Inclusive on both ends: ranges touching on a single day overlap.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        check_range(start, end)?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        ranges_overlap(self.start, self.end, start, end)
    }
}

// --- Employees ---

/// Employee list view filter. Unset predicates match everything; set ones combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeFilter {
    /// Case-insensitive substring over full name, email and role.
    pub search: Option<String>,
    /// Exact department name.
    pub department: Option<String>,
    pub status: Option<EmployeeStatus>,
}

impl EmployeeFilter {
    pub fn matches(&self, employee: &Employee) -> bool {
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        if let Some(term) = search {
            let hit = employee.full_name().to_lowercase().contains(&term)
                || employee.email.to_lowercase().contains(&term)
                || employee.role.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        if let Some(department) = self.department.as_deref().filter(|d| !d.is_empty()) {
            if employee.department != department {
                return false;
            }
        }
        if let Some(status) = self.status {
            if employee.status != status {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, employees: &[Employee]) -> Vec<Employee> {
        employees
            .iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect()
    }
}

/// Employees whose department field equals `department` (case-sensitive).
pub fn department_roster(employees: &[Employee], department: &str) -> Vec<Employee> {
    employees
        .iter()
        .filter(|e| e.department == department)
        .cloned()
        .collect()
}

pub fn employees_by_status(employees: &[Employee], status: EmployeeStatus) -> Vec<Employee> {
    employees
        .iter()
        .filter(|e| e.status == status)
        .cloned()
        .collect()
}

// --- Time Off ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeOffFilter {
    pub status: Option<TimeOffStatus>,
    pub employee_id: Option<RecordId>,
    pub range: Option<DateRange>,
}

impl TimeOffFilter {
    pub fn matches(&self, request: &TimeOffRequest) -> bool {
        self.status.map_or(true, |s| request.status == s)
            && self
                .employee_id
                .map_or(true, |id| request.employee_id == Some(id))
            && self
                .range
                .map_or(true, |r| r.overlaps(request.start_date, request.end_date))
    }

    pub fn apply(&self, requests: &[TimeOffRequest]) -> Vec<TimeOffRequest> {
        requests
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}

pub fn requests_by_status(requests: &[TimeOffRequest], status: TimeOffStatus) -> Vec<TimeOffRequest> {
    TimeOffFilter {
        status: Some(status),
        ..Default::default()
    }
    .apply(requests)
}

// --- Attendance ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttendanceFilter {
    pub date: Option<NaiveDate>,
    pub employee_id: Option<RecordId>,
    pub status: Option<AttendanceStatus>,
}

impl AttendanceFilter {
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.date.map_or(true, |d| record.date == d)
            && self.employee_id.map_or(true, |id| record.employee_id == id)
            && self.status.map_or(true, |s| record.status == s)
    }

    pub fn apply(&self, records: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
        records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HrError;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn employee(id: RecordId, first: &str, role: &str, department: &str, status: EmployeeStatus) -> Employee {
        Employee {
            id,
            first_name: first.into(),
            last_name: "Smith".into(),
            email: format!("{}@corp.example", first.to_lowercase()),
            phone: None,
            role: role.into(),
            department: department.into(),
            start_date: d("2020-01-01"),
            status,
            photo: None,
        }
    }

    fn request(id: RecordId, employee_id: RecordId, start: &str, end: &str, status: TimeOffStatus) -> TimeOffRequest {
        TimeOffRequest {
            id,
            employee_id: Some(employee_id),
            employee_name: format!("Employee {}", employee_id),
            request_type: "Vacation".into(),
            start_date: d(start),
            end_date: d(end),
            reason: None,
            status,
            approved_by: None,
            submitted_date: d("2024-06-01"),
        }
    }

    fn staff() -> Vec<Employee> {
        vec![
            employee(1, "Alice", "Engineer", "Engineering", EmployeeStatus::Active),
            employee(2, "Bob", "Recruiter", "Human Resources", EmployeeStatus::Inactive),
            employee(3, "Carol", "Engineering Manager", "Engineering", EmployeeStatus::OnLeave),
            employee(4, "Dan", "Account Executive", "engineering", EmployeeStatus::Active),
        ]
    }

    #[test]
    fn ranges_overlap_is_inclusive() {
        assert!(ranges_overlap(d("2024-06-10"), d("2024-06-10"), d("2024-06-10"), d("2024-06-15")));
        assert!(ranges_overlap(d("2024-06-01"), d("2024-06-10"), d("2024-06-10"), d("2024-06-15")));
        assert!(ranges_overlap(d("2024-06-15"), d("2024-06-20"), d("2024-06-10"), d("2024-06-15")));
        assert!(!ranges_overlap(d("2024-06-16"), d("2024-06-20"), d("2024-06-10"), d("2024-06-15")));
        assert!(!ranges_overlap(d("2024-06-01"), d("2024-06-09"), d("2024-06-10"), d("2024-06-15")));
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        assert!(matches!(
            DateRange::new(d("2024-06-15"), d("2024-06-10")),
            Err(HrError::InvalidDateRange { .. })
        ));
        let range = DateRange::new(d("2024-06-10"), d("2024-06-15")).unwrap();
        assert!(range.contains(d("2024-06-10")));
        assert!(range.contains(d("2024-06-15")));
        assert!(!range.contains(d("2024-06-16")));
    }

    #[test]
    fn single_day_request_matches_range_starting_that_day() {
        let requests = vec![
            request(1, 1, "2024-06-10", "2024-06-10", TimeOffStatus::Pending),
            request(2, 2, "2024-06-20", "2024-06-21", TimeOffStatus::Pending),
        ];
        let filter = TimeOffFilter {
            range: Some(DateRange::new(d("2024-06-10"), d("2024-06-15")).unwrap()),
            ..Default::default()
        };
        let matched = filter.apply(&requests);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);
    }

    #[test]
    fn employee_search_is_case_insensitive_over_name_email_and_role() {
        let employees = staff();
        let by_name = EmployeeFilter {
            search: Some("ALICE smith".into()),
            ..Default::default()
        };
        assert_eq!(by_name.apply(&employees).len(), 1);

        let by_role = EmployeeFilter {
            search: Some("engineer".into()),
            ..Default::default()
        };
        let ids: Vec<RecordId> = by_role.apply(&employees).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let by_email = EmployeeFilter {
            search: Some("@corp.example".into()),
            ..Default::default()
        };
        assert_eq!(by_email.apply(&employees).len(), 4);
    }

    #[test]
    fn employee_filters_compose_conjunctively() {
        let employees = staff();
        let filter = EmployeeFilter {
            search: Some("engineer".into()),
            department: Some("Engineering".into()),
            status: Some(EmployeeStatus::Active),
        };
        let matched = filter.apply(&employees);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);

        assert_eq!(EmployeeFilter::default().apply(&employees).len(), 4);
        let blank = EmployeeFilter {
            search: Some("   ".into()),
            department: Some(String::new()),
            status: None,
        };
        assert_eq!(blank.apply(&employees).len(), 4);
    }

    #[test]
    fn roster_uses_exact_department_name() {
        let roster = department_roster(&staff(), "Engineering");
        let ids: Vec<RecordId> = roster.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(department_roster(&staff(), "Sales").is_empty());
    }

    #[test]
    fn by_status_returns_exact_matches() {
        let seed = vec![
            employee(1, "Alice", "Engineer", "Engineering", EmployeeStatus::Active),
            employee(2, "Bob", "Engineer", "Engineering", EmployeeStatus::Inactive),
        ];
        let active = employees_by_status(&seed, EmployeeStatus::Active);
        assert_eq!(active, vec![seed[0].clone()]);

        let requests = vec![
            request(1, 1, "2024-06-10", "2024-06-11", TimeOffStatus::Approved),
            request(2, 1, "2024-06-12", "2024-06-13", TimeOffStatus::Pending),
        ];
        let pending = requests_by_status(&requests, TimeOffStatus::Pending);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 2);
    }

    #[test]
    fn attendance_filter_matches_date_employee_and_status() {
        let record = |id, employee_id, date: &str, status| AttendanceRecord {
            id,
            employee_id,
            employee_name: String::new(),
            date: d(date),
            check_in: None,
            check_out: None,
            status,
        };
        let records = vec![
            record(1, 1, "2024-06-10", AttendanceStatus::Present),
            record(2, 2, "2024-06-10", AttendanceStatus::Late),
            record(3, 1, "2024-06-11", AttendanceStatus::Late),
        ];
        let today = AttendanceFilter {
            date: Some(d("2024-06-10")),
            ..Default::default()
        };
        assert_eq!(today.apply(&records).len(), 2);

        let late_for_one = AttendanceFilter {
            employee_id: Some(1),
            status: Some(AttendanceStatus::Late),
            ..Default::default()
        };
        let matched = late_for_one.apply(&records);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 3);
    }
}
