//! In-memory implementation of ResourceApi for tests and the demo CLI.

use super::api::{MultipartForm, Payload, RecordId, ResourceApi};
use super::error::RemoteError;
use super::registry::Verb;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory backend for one resource.
///
/// Records are JSON objects behind an async `RwLock`. The server assigns
/// integer ids on create and rejects duplicate `name`s with a 409, the way
/// the admin backend does. Failures can be queued with [`fail_next`](Self::fail_next).
///
/// With a latency set, every call waits that long before answering; `list`
/// answers with the records as they were when the request arrived.
pub struct InMemoryResourceApi {
    records: RwLock<Vec<Value>>,
    next_id: AtomicI64,
    failures: Mutex<VecDeque<RemoteError>>,
    calls: AtomicUsize,
    read_only: bool,
    latency: Option<Duration>,
}

impl InMemoryResourceApi {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Create a backend seeded with `records`.
    ///
    /// New ids continue after the largest integer id present.
    pub fn with_records(records: Vec<Value>) -> Self {
        let max_id = records
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Self {
            records: RwLock::new(records),
            next_id: AtomicI64::new(max_id + 1),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            read_only: false,
            latency: None,
        }
    }

    /// Only support `Verb::Get`
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next call reject with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().push_back(error);
    }

    /// Number of calls that reached this backend
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn records(&self) -> Vec<Value> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn enter(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn ensure_unique_name(
        &self,
        fields: &Map<String, Value>,
        except: Option<&RecordId>,
    ) -> Result<(), RemoteError> {
        let Some(name) = fields.get("name").and_then(Value::as_str) else {
            return Ok(());
        };
        let taken = self.records.read().await.iter().any(|r| {
            r.get("name").and_then(Value::as_str) == Some(name)
                && except.map_or(true, |id| !has_id(r, id))
        });
        if taken {
            return Err(RemoteError::error("Duplicate name").with_status(409));
        }
        Ok(())
    }
}

impl Default for InMemoryResourceApi {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn has_id(record: &Value, id: &RecordId) -> bool {
    record.get("id").and_then(RecordId::from_json).as_ref() == Some(id)
}

/// Flatten a payload into record fields. Files are stored by file name.
fn payload_fields(payload: Payload) -> Result<Map<String, Value>, RemoteError> {
    match payload {
        Payload::Json(Value::Object(map)) => Ok(map),
        Payload::Json(_) => Err(RemoteError::error("Payload must be an object").with_status(400)),
        Payload::Multipart(MultipartForm { fields, files }) => {
            let mut map = Map::new();
            for (name, value) in fields {
                map.insert(name, Value::String(value));
            }
            for file in files {
                map.insert(file.field, Value::String(file.file_name));
            }
            Ok(map)
        }
    }
}

fn not_found(id: &RecordId) -> RemoteError {
    RemoteError::message(format!("Record {id} not found")).with_status(404)
}

#[async_trait]
impl ResourceApi for InMemoryResourceApi {
    async fn list(&self) -> Result<Vec<Value>, RemoteError> {
        let snapshot = self.records.read().await.clone();
        self.enter().await?;
        Ok(snapshot)
    }

    async fn create(&self, payload: Payload) -> Result<Value, RemoteError> {
        self.enter().await?;
        let mut fields = payload_fields(payload)?;
        self.ensure_unique_name(&fields, None).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        fields.insert("id".into(), Value::from(id));
        let record = Value::Object(fields);
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RecordId, payload: Payload) -> Result<Value, RemoteError> {
        self.enter().await?;
        let mut fields = payload_fields(payload)?;
        fields.remove("id");
        self.ensure_unique_name(&fields, Some(id)).await?;

        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| has_id(r, id))
            .ok_or_else(|| not_found(id))?;
        if let Some(existing) = record.as_object_mut() {
            existing.extend(fields);
        }
        Ok(record.clone())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.enter().await?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !has_id(r, id));
        if records.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn supports(&self, verb: Verb) -> bool {
        !self.read_only || verb == Verb::Get
    }
}
