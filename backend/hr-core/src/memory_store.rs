// src/memory_store.rs

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, Latency};
use crate::entity::Entity;
use crate::error::{HrError, Result};
use crate::fixtures::Fixtures;
use crate::models::{AttendanceRecord, Department, Employee, RecordId, TimeOffRequest};
use crate::store::{Backend, BatchFailure, BatchOutcome, EntityStore, Stores};

struct Table<T> {
    records: Vec<T>,
    // Highest id ever handed out, so ids of deleted records are not reused.
    high_water: RecordId,
}

impl<T: Entity> Table<T> {
    fn seeded(records: Vec<T>) -> Self {
        let high_water = records.iter().map(Entity::id).max().unwrap_or(0);
        Self {
            records,
            high_water,
        }
    }

    fn next_id(&self) -> RecordId {
        let max_existing = self.records.iter().map(Entity::id).max().unwrap_or(0);
        self.high_water.max(max_existing) + 1
    }

    fn position(&self, id: RecordId) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id() == id)
            .ok_or(HrError::NotFound {
                entity: T::NAME,
                id,
            })
    }

    fn check_unique(&self, candidate: &T) -> Result<()> {
        let Some(key) = candidate.unique_key() else {
            return Ok(());
        };
        let clash = self
            .records
            .iter()
            .any(|r| r.id() != candidate.id() && r.unique_key().as_deref() == Some(key.as_str()));
        if clash {
            return Err(HrError::Duplicate {
                entity: T::NAME,
                key,
            });
        }
        Ok(())
    }

    fn insert(&mut self, draft: T::Draft, today: chrono::NaiveDate) -> Result<T> {
        let id = self.next_id();
        let record = T::from_draft(id, draft, today)?;
        self.check_unique(&record)?;
        self.high_water = id;
        self.records.push(record.clone());
        Ok(record)
    }
}

/// Fixture-backed store: an explicit object owning its collection, seeded once and
/// resettable for tests.
pub struct MemoryStore<T: Entity> {
    table: Mutex<Table<T>>,
    clock: Arc<dyn Clock>,
    latency: Latency,
}

impl<T: Entity> MemoryStore<T> {
    pub fn new(seed: Vec<T>, clock: Arc<dyn Clock>, latency: Latency) -> Self {
        info!("Seeding {} store with {} record(s)", T::NAME, seed.len());
        Self {
            table: Mutex::new(Table::seeded(seed)),
            clock,
            latency,
        }
    }

    pub fn empty(clock: Arc<dyn Clock>) -> Self {
        Self::new(Vec::new(), clock, Latency::NONE)
    }

    /// Replaces the whole collection, resetting id assignment to the new seed.
    pub async fn reset(&self, seed: Vec<T>) {
        info!("Resetting {} store to {} record(s)", T::NAME, seed.len());
        *self.table.lock().await = Table::seeded(seed);
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<T: Entity> EntityStore<T> for MemoryStore<T> {
    async fn list(&self) -> Result<Vec<T>> {
        self.latency.wait().await;
        Ok(self.table.lock().await.records.clone())
    }

    async fn get(&self, id: RecordId) -> Result<T> {
        self.latency.wait().await;
        let table = self.table.lock().await;
        let index = table.position(id)?;
        Ok(table.records[index].clone())
    }

    async fn create(&self, draft: T::Draft) -> Result<T> {
        self.latency.wait().await;
        let today = self.clock.today();
        let record = self.table.lock().await.insert(draft, today)?;
        debug!("Created {} {}", T::NAME, record.id());
        Ok(record)
    }

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<BatchOutcome<T>> {
        self.latency.wait().await;
        let today = self.clock.today();
        let mut table = self.table.lock().await;
        let mut outcome = BatchOutcome::new();
        for (index, draft) in drafts.into_iter().enumerate() {
            match table.insert(draft, today) {
                Ok(record) => outcome.succeeded.push(record),
                Err(e) => outcome.failed.push(BatchFailure {
                    index,
                    message: e.to_string(),
                }),
            }
        }
        outcome.log_failures(&format!("Batch create of {}", T::NAME));
        Ok(outcome)
    }

    async fn update(&self, id: RecordId, patch: T::Patch) -> Result<T> {
        self.latency.wait().await;
        let mut table = self.table.lock().await;
        let index = table.position(id)?;
        // Apply to a copy so a failed patch leaves the stored record untouched.
        let mut updated = table.records[index].clone();
        updated.apply(patch)?;
        table.check_unique(&updated)?;
        table.records[index] = updated.clone();
        debug!("Updated {} {}", T::NAME, id);
        Ok(updated)
    }

    async fn delete(&self, id: RecordId) -> Result<T> {
        self.latency.wait().await;
        let mut table = self.table.lock().await;
        let index = match table.position(id) {
            Ok(index) => index,
            Err(e) => {
                warn!("Delete of {} {} failed: not found", T::NAME, id);
                return Err(e);
            }
        };
        let removed = table.records.remove(index);
        debug!("Deleted {} {}", T::NAME, id);
        Ok(removed)
    }
}

// --- Backend Bundle ---

/// The four fixture-seeded stores, kept as concrete types so they can be reset.
#[derive(Clone)]
pub struct MemoryBackend {
    pub employees: Arc<MemoryStore<Employee>>,
    pub departments: Arc<MemoryStore<Department>>,
    pub time_off: Arc<MemoryStore<TimeOffRequest>>,
    pub attendance: Arc<MemoryStore<AttendanceRecord>>,
}

impl MemoryBackend {
    pub fn seeded(fixtures: Fixtures, clock: Arc<dyn Clock>, latency: Latency) -> Self {
        Self {
            employees: Arc::new(MemoryStore::new(fixtures.employees, clock.clone(), latency)),
            departments: Arc::new(MemoryStore::new(fixtures.departments, clock.clone(), latency)),
            time_off: Arc::new(MemoryStore::new(
                fixtures.time_off_requests,
                clock.clone(),
                latency,
            )),
            attendance: Arc::new(MemoryStore::new(fixtures.attendance, clock, latency)),
        }
    }

    pub async fn reset(&self, fixtures: Fixtures) {
        self.employees.reset(fixtures.employees).await;
        self.departments.reset(fixtures.departments).await;
        self.time_off.reset(fixtures.time_off_requests).await;
        self.attendance.reset(fixtures.attendance).await;
    }

    pub fn stores(&self) -> Stores {
        Stores {
            backend: Backend::Memory,
            employees: self.employees.clone(),
            departments: self.departments.clone(),
            time_off: self.time_off.clone(),
            attendance: self.attendance.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{
        AttendanceRecord, AttendanceStatus, Department, DepartmentUpdate, Employee,
        EmployeeStatus, EmployeeUpdate, NewAttendanceRecord, NewDepartment, NewEmployee,
    };
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::on(d("2024-06-10")))
    }

    fn employee(id: RecordId, status: EmployeeStatus) -> Employee {
        Employee {
            id,
            first_name: format!("First{}", id),
            last_name: format!("Last{}", id),
            email: format!("e{}@example.com", id),
            phone: None,
            role: "Engineer".into(),
            department: "Engineering".into(),
            start_date: d("2020-01-01"),
            status,
            photo: None,
        }
    }

    fn new_employee(first: &str) -> NewEmployee {
        NewEmployee {
            first_name: first.into(),
            last_name: "Tester".into(),
            email: format!("{}@example.com", first.to_lowercase()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_id_above_every_existing_id() {
        let store = MemoryStore::new(
            vec![
                employee(3, EmployeeStatus::Active),
                employee(11, EmployeeStatus::Inactive),
                employee(5, EmployeeStatus::Active),
            ],
            clock(),
            Latency::NONE,
        );
        let created = store.create(new_employee("Nina")).await.unwrap();
        assert_eq!(created.id, 12);
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new(
            vec![employee(1, EmployeeStatus::Active), employee(2, EmployeeStatus::Active)],
            clock(),
            Latency::NONE,
        );
        let removed = store.delete(2).await.unwrap();
        assert_eq!(removed.id, 2);
        let created = store.create(new_employee("Omar")).await.unwrap();
        assert_eq!(created.id, 3);
    }

    #[tokio::test]
    async fn delete_missing_id_leaves_store_unchanged() {
        let store = MemoryStore::new(
            vec![employee(1, EmployeeStatus::Active)],
            clock(),
            Latency::NONE,
        );
        let before = store.len().await;
        let result = store.delete(99).await;
        assert!(matches!(
            result,
            Err(HrError::NotFound {
                entity: "Employee",
                id: 99
            })
        ));
        assert_eq!(store.len().await, before);
    }

    #[tokio::test]
    async fn get_and_update_missing_id_fail_with_not_found() {
        let store: MemoryStore<Employee> = MemoryStore::empty(clock());
        assert!(matches!(store.get(1).await, Err(HrError::NotFound { .. })));
        assert!(matches!(
            store.update(1, EmployeeUpdate::default()).await,
            Err(HrError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_returns_copies() {
        let store = MemoryStore::new(
            vec![employee(1, EmployeeStatus::Active)],
            clock(),
            Latency::NONE,
        );
        let mut snapshot = store.list().await.unwrap();
        snapshot[0].first_name = "Mutated".into();
        snapshot.clear();
        let fresh = store.list().await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].first_name, "First1");
    }

    #[tokio::test]
    async fn partial_update_merges_fields() {
        let store = MemoryStore::new(
            vec![employee(1, EmployeeStatus::Active)],
            clock(),
            Latency::NONE,
        );
        let updated = store
            .update(
                1,
                EmployeeUpdate {
                    role: Some("Manager".into()),
                    status: Some(EmployeeStatus::OnLeave),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, "Manager");
        assert_eq!(updated.status, EmployeeStatus::OnLeave);
        assert_eq!(updated.first_name, "First1");
        assert_eq!(store.get(1).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn failed_patch_leaves_record_untouched() {
        let store = MemoryStore::new(
            vec![employee(1, EmployeeStatus::Active)],
            clock(),
            Latency::NONE,
        );
        let result = store
            .update(
                1,
                EmployeeUpdate {
                    role: Some("Director".into()),
                    email: Some("  ".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(HrError::ValidationMissing { .. })));
        assert_eq!(store.get(1).await.unwrap().role, "Engineer");
    }

    #[tokio::test]
    async fn attendance_is_unique_per_employee_and_day() {
        let store: MemoryStore<AttendanceRecord> = MemoryStore::empty(clock());
        let draft = NewAttendanceRecord {
            employee_id: 1,
            employee_name: "First1 Last1".into(),
            date: Some(d("2024-06-10")),
            check_in: Some("08:30".into()),
            check_out: None,
        };
        let first = store.create(draft.clone()).await.unwrap();
        assert_eq!(first.status, AttendanceStatus::Present);

        let second = store.create(draft.clone()).await;
        assert!(matches!(second, Err(HrError::Duplicate { .. })));

        let other_day = NewAttendanceRecord {
            date: Some(d("2024-06-11")),
            ..draft
        };
        assert!(store.create(other_day).await.is_ok());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn batch_create_returns_successful_subset() {
        let store: MemoryStore<Department> = MemoryStore::empty(clock());
        let outcome = store
            .create_many(vec![
                NewDepartment {
                    name: "Engineering".into(),
                    description: "Builds".into(),
                    ..Default::default()
                },
                NewDepartment {
                    name: "Sales".into(),
                    description: String::new(),
                    ..Default::default()
                },
                NewDepartment {
                    name: "Support".into(),
                    description: "Helps".into(),
                    ..Default::default()
                },
            ])
            .await
            .unwrap();
        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].index, 1);
        assert_eq!(outcome.succeeded[0].id, 1);
        assert_eq!(outcome.succeeded[1].id, 2);
    }

    #[tokio::test]
    async fn department_rename_cannot_collide() {
        let store: MemoryStore<Department> = MemoryStore::empty(clock());
        for name in ["Engineering", "Sales"] {
            store
                .create(NewDepartment {
                    name: name.into(),
                    description: "x".into(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let result = store
            .update(
                2,
                DepartmentUpdate {
                    name: Some("Engineering".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(HrError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn reset_restores_seed() {
        let store = MemoryStore::new(
            vec![employee(1, EmployeeStatus::Active)],
            clock(),
            Latency::NONE,
        );
        store.create(new_employee("Pia")).await.unwrap();
        store.reset(vec![employee(1, EmployeeStatus::Active)]).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.create(new_employee("Quinn")).await.unwrap().id, 2);
    }
}
