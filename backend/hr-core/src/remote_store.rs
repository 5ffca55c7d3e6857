// src/remote_store.rs

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::api_client::{ApiClient, WriteResponse, WriteResult};
use crate::clock::Clock;
use crate::entity::Entity;
use crate::error::{HrError, Result};
use crate::models::RecordId;
use crate::store::{BatchFailure, BatchOutcome, EntityStore};

const NAME_FIELD: &str = "Name";
const ID_FIELD: &str = "Id";

/// Store backed by the hosted records API. Holds no state of its own.
pub struct RemoteStore<T: Entity> {
    client: Arc<ApiClient>,
    clock: Arc<dyn Clock>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> RemoteStore<T> {
    pub fn new(client: Arc<ApiClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            _entity: PhantomData,
        }
    }

    /// Every remote column the record type depends on. Omitted columns come back empty.
    pub fn remote_fields() -> Vec<&'static str> {
        let mut fields = vec![NAME_FIELD];
        for &(_, remote) in T::FIELDS {
            if remote != ID_FIELD && !fields.contains(&remote) {
                fields.push(remote);
            }
        }
        fields
    }

    async fn check_unique(&self, candidates: &[&T]) -> Result<Vec<Option<HrError>>> {
        if candidates.iter().all(|c| c.unique_key().is_none()) {
            return Ok(candidates.iter().map(|_| None).collect());
        }
        let existing: Vec<(RecordId, String)> = self
            .snapshot()
            .await?
            .iter()
            .filter_map(|r| r.unique_key().map(|k| (r.id(), k)))
            .collect();
        let mut seen: Vec<String> = Vec::new();
        Ok(candidates
            .iter()
            .map(|candidate| {
                let key = candidate.unique_key()?;
                let clash = existing
                    .iter()
                    .any(|(id, k)| *id != candidate.id() && *k == key)
                    || seen.contains(&key);
                seen.push(key.clone());
                clash.then(|| HrError::Duplicate {
                    entity: T::NAME,
                    key,
                })
            })
            .collect())
    }

    /// Validates drafts locally; only the valid ones are sent.
    async fn prepare(&self, drafts: Vec<T::Draft>) -> Result<(Vec<(usize, T)>, Vec<BatchFailure>)> {
        let today = self.clock.today();
        let mut valid = Vec::new();
        let mut failed = Vec::new();
        for (index, draft) in drafts.into_iter().enumerate() {
            match T::from_draft(0, draft, today) {
                Ok(record) => valid.push((index, record)),
                Err(e) => failed.push(BatchFailure {
                    index,
                    message: e.to_string(),
                }),
            }
        }
        let records: Vec<&T> = valid.iter().map(|(_, r)| r).collect();
        let clashes = self.check_unique(&records).await?;
        let mut accepted = Vec::new();
        for ((index, record), clash) in valid.into_iter().zip(clashes) {
            match clash {
                Some(e) => failed.push(BatchFailure {
                    index,
                    message: e.to_string(),
                }),
                None => accepted.push((index, record)),
            }
        }
        Ok((accepted, failed))
    }

    async fn send_create(
        &self,
        prepared: Vec<(usize, T)>,
        mut failed: Vec<BatchFailure>,
    ) -> Result<BatchOutcome<T>> {
        let mut outcome = BatchOutcome::new();
        if !prepared.is_empty() {
            let payload = prepared
                .iter()
                .map(|(_, r)| to_remote(r, false))
                .collect::<Result<Vec<_>>>()?;
            let response = self.client.create_records(T::TABLE, payload).await?;
            let indices: Vec<usize> = prepared.iter().map(|(i, _)| *i).collect();
            collect_results::<T>(response, &indices, None, &mut outcome, &mut failed);
        }
        failed.sort_by_key(|f| f.index);
        outcome.failed = failed;
        outcome.log_failures(&format!("Remote create of {}", T::NAME));
        Ok(outcome)
    }
}

/// Malformed rows are skipped with a warning.
fn records_from_remote<T: Entity>(records: Vec<Value>) -> Vec<T> {
    debug!("Fetched {} remote {} record(s)", records.len(), T::NAME);
    records
        .into_iter()
        .filter_map(|value| match from_remote::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed remote {} record: {}", T::NAME, e);
                None
            }
        })
        .collect()
}

fn first_failure_message(failed: &[BatchFailure]) -> String {
    failed
        .first()
        .map(|f| f.message.clone())
        .unwrap_or_else(|| "no record returned".to_string())
}

#[async_trait]
impl<T: Entity> EntityStore<T> for RemoteStore<T> {
    async fn list(&self) -> Result<Vec<T>> {
        let fields = Self::remote_fields();
        let records = self.client.fetch_records(T::TABLE, &fields).await;
        Ok(records_from_remote(records))
    }

    async fn snapshot(&self) -> Result<Vec<T>> {
        let fields = Self::remote_fields();
        let records = self.client.try_fetch_records(T::TABLE, &fields).await?;
        Ok(records_from_remote(records))
    }

    async fn get(&self, id: RecordId) -> Result<T> {
        let fields = Self::remote_fields();
        match self.client.get_record_by_id(T::TABLE, id, &fields).await? {
            Some(value) => from_remote(value),
            None => Err(HrError::NotFound {
                entity: T::NAME,
                id,
            }),
        }
    }

    async fn create(&self, draft: T::Draft) -> Result<T> {
        let record = T::from_draft(0, draft, self.clock.today())?;
        if let Some(Some(clash)) = self.check_unique(&[&record]).await?.pop() {
            return Err(clash);
        }
        let outcome = self.send_create(vec![(0, record)], Vec::new()).await?;
        let message = first_failure_message(&outcome.failed);
        outcome
            .succeeded
            .into_iter()
            .next()
            .ok_or(HrError::RemoteFailure {
                status: None,
                message,
            })
    }

    async fn create_many(&self, drafts: Vec<T::Draft>) -> Result<BatchOutcome<T>> {
        let (prepared, failed) = self.prepare(drafts).await?;
        self.send_create(prepared, failed).await
    }

    async fn update(&self, id: RecordId, patch: T::Patch) -> Result<T> {
        let mut record = self.get(id).await?;
        record.apply(patch)?;
        if let Some(Some(clash)) = self.check_unique(&[&record]).await?.pop() {
            return Err(clash);
        }
        let payload = to_remote(&record, true)?;
        let response = self.client.update_records(T::TABLE, vec![payload]).await?;
        let mut outcome = BatchOutcome::new();
        let mut failed = Vec::new();
        collect_results(response, &[0], Some(&record), &mut outcome, &mut failed);
        outcome.failed = failed;
        outcome.log_failures(&format!("Remote update of {} {}", T::NAME, id));
        let message = first_failure_message(&outcome.failed);
        outcome
            .succeeded
            .into_iter()
            .next()
            .ok_or(HrError::RemoteFailure {
                status: None,
                message,
            })
    }

    async fn delete(&self, id: RecordId) -> Result<T> {
        let record = self.get(id).await?;
        let response = self.client.delete_records(T::TABLE, &[id]).await?;
        if let Some(result) = response.results.into_iter().find(|r| !r.success) {
            let message = result
                .message
                .unwrap_or_else(|| format!("delete of {} {} rejected", T::NAME, id));
            error!("Remote delete failed: {}", message);
            return Err(HrError::RemoteFailure {
                status: None,
                message,
            });
        }
        Ok(record)
    }
}

/// Pairs per-record write results with the batch positions that were sent.
fn collect_results<T: Entity>(
    response: WriteResponse,
    indices: &[usize],
    fallback: Option<&T>,
    outcome: &mut BatchOutcome<T>,
    failed: &mut Vec<BatchFailure>,
) {
    let mut results = response.results.into_iter();
    for &index in indices {
        match results.next().map(|r| result_record(r, fallback)) {
            Some(Ok(record)) => outcome.succeeded.push(record),
            Some(Err(message)) => failed.push(BatchFailure { index, message }),
            None => failed.push(BatchFailure {
                index,
                message: "no result returned for record".to_string(),
            }),
        }
    }
}

fn result_record<T: Entity>(
    result: WriteResult,
    fallback: Option<&T>,
) -> std::result::Result<T, String> {
    if !result.success {
        return Err(result
            .message
            .unwrap_or_else(|| "record rejected".to_string()));
    }
    match (result.data, fallback) {
        (Some(data), _) => from_remote(data).map_err(|e| e.to_string()),
        (None, Some(record)) => Ok(record.clone()),
        (None, None) => Err("no record data returned".to_string()),
    }
}

// --- Field Mapping ---

/// Domain record to remote columns. The `Name` column carries the record's label.
pub fn to_remote<T: Entity>(record: &T, include_id: bool) -> Result<Value> {
    let Value::Object(domain) = serde_json::to_value(record)? else {
        return Err(HrError::RemoteFailure {
            status: None,
            message: format!("{} did not serialize to an object", T::NAME),
        });
    };
    let mut remote = Map::new();
    remote.insert(NAME_FIELD.to_string(), Value::String(record.label()));
    for (field, remote_field) in T::FIELDS {
        if *remote_field == ID_FIELD {
            if include_id {
                remote.insert(ID_FIELD.to_string(), Value::from(record.id()));
            }
            continue;
        }
        if let Some(value) = domain.get(*field) {
            remote.insert(remote_field.to_string(), value.clone());
        }
    }
    Ok(Value::Object(remote))
}

/// Remote columns to a domain record. Null columns fall back to the record's defaults.
pub fn from_remote<T: Entity>(value: Value) -> Result<T> {
    let Value::Object(mut remote) = value else {
        return Err(HrError::RemoteFailure {
            status: None,
            message: format!("remote {} record is not an object", T::NAME),
        });
    };
    let mut domain = Map::new();
    for (field, remote_field) in T::FIELDS {
        let Some(value) = remote.remove(*remote_field) else {
            continue;
        };
        let value = if T::REFERENCE_FIELDS.contains(remote_field) {
            normalize_reference(value)
        } else {
            value
        };
        if !value.is_null() {
            domain.insert(field.to_string(), value);
        }
    }
    Ok(serde_json::from_value(Value::Object(domain))?)
}

/// Lookup columns arrive as `n`, `"n"`, `{"Id": n, "Name": ..}` or a list of those.
pub fn normalize_reference(value: Value) -> Value {
    match value {
        Value::Number(_) | Value::Null => value,
        Value::String(s) => s
            .trim()
            .parse::<RecordId>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        Value::Object(mut map) => map
            .remove(ID_FIELD)
            .map(normalize_reference)
            .unwrap_or(Value::Null),
        Value::Array(items) => items
            .into_iter()
            .next()
            .map(normalize_reference)
            .unwrap_or(Value::Null),
        Value::Bool(_) => Value::Null,
    }
}
