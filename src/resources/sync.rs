//! Generic per-resource list cache kept in step with CRUD calls.
//!
//! The local list changes only after the remote call resolves. Operations are
//! not queued against each other: when several are in flight, whichever
//! settles last decides the final list. A `load()` racing a `create()` can
//! therefore drop the created record if the load response was produced
//! before the create landed on the server. This is a known property of the
//! cache, not something callers should work around with retries.

use super::api::{MultipartForm, Payload, Record, RecordId, ResourceApi};
use super::error::ResourceError;
use super::registry::{ResourceRegistry, Verb};
use super::wrapper::{CallWrapper, WrapOptions};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Notification texts for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrudMessages {
    pub created: String,
    pub updated: String,
    pub deleted: String,
    pub create_failed: String,
    pub update_failed: String,
    pub delete_failed: String,
    pub load_failed: String,
}

impl CrudMessages {
    /// Default texts derived from the resource name, e.g. "products" gives
    /// "Product created" and "Failed to load products".
    pub fn for_resource(resource: &str) -> Self {
        let singular = singularize(resource);
        let mut label = singular.clone();
        if let Some(first) = label.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Self {
            created: format!("{label} created"),
            updated: format!("{label} updated"),
            deleted: format!("{label} deleted"),
            create_failed: format!("Failed to create {singular}"),
            update_failed: format!("Failed to update {singular}"),
            delete_failed: format!("Failed to delete {singular}"),
            load_failed: format!("Failed to load {resource}"),
        }
    }
}

fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = name.strip_suffix('s') {
        stem.to_string()
    } else {
        name.to_string()
    }
}

struct SyncState<T> {
    data: Vec<T>,
    in_flight: usize,
    error: Option<ResourceError>,
}

/// Decrements the in-flight count even if the operation future is dropped
struct InFlight<'a, T> {
    state: &'a Mutex<SyncState<T>>,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

/// `{data, loading, error, load, create, update, remove}` over one named resource
pub struct CrudSync<T> {
    resource: String,
    registry: Arc<ResourceRegistry>,
    wrapper: CallWrapper,
    messages: CrudMessages,
    state: Mutex<SyncState<T>>,
}

impl<T> CrudSync<T>
where
    T: Record + DeserializeOwned + Clone,
{
    /// Create an empty cache for `resource`.
    ///
    /// The name is only resolved when an operation runs; an unknown name
    /// fails that operation before anything is sent.
    pub fn new(
        resource: impl Into<String>,
        registry: Arc<ResourceRegistry>,
        wrapper: CallWrapper,
    ) -> Self {
        let resource = resource.into();
        Self {
            messages: CrudMessages::for_resource(&resource),
            resource,
            registry,
            wrapper,
            state: Mutex::new(SyncState {
                data: Vec::new(),
                in_flight: 0,
                error: None,
            }),
        }
    }

    pub fn with_messages(mut self, messages: CrudMessages) -> Self {
        self.messages = messages;
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Snapshot of the cached records
    pub fn data(&self) -> Vec<T> {
        self.state.lock().data.clone()
    }

    /// Whether any operation of this cache is in flight
    pub fn loading(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    /// The most recent failure, cleared by the next successful operation
    pub fn error(&self) -> Option<ResourceError> {
        self.state.lock().error.clone()
    }

    /// Replace the whole list with the server's.
    ///
    /// Publishes nothing on success. On failure the previous list is kept,
    /// the error is recorded, and an error notification is published only if
    /// `toast_on_load_error` is enabled.
    pub async fn load(&self) -> Result<usize, ResourceError> {
        let api = self.resolve(Verb::Get)?;
        let _in_flight = self.begin();

        let mut options = WrapOptions::new(self.messages.load_failed.clone());
        if !self.wrapper.settings().toast_on_load_error {
            options = options.quiet_errors();
        }
        let result = self
            .wrapper
            .wrap_with(move || async move { api.list().await }, options)
            .await
            .map_err(ResourceError::from)
            .and_then(|values| {
                values
                    .into_iter()
                    .map(|v| self.decode(v))
                    .collect::<Result<Vec<T>, _>>()
            });

        match result {
            Ok(records) => {
                let count = records.len();
                let mut state = self.state.lock();
                state.data = records;
                state.error = None;
                debug!(resource = %self.resource, count, "Resource list loaded");
                Ok(count)
            }
            Err(e) => Err(self.fail(Verb::Get, e)),
        }
    }

    /// Create a record and append the server's version of it
    pub async fn create<P: Serialize + ?Sized>(&self, item: &P) -> Result<T, ResourceError> {
        let api = self.resolve(Verb::Create)?;
        let payload = self.encode(item)?;
        self.create_payload(api, payload).await
    }

    /// Multipart variant of [`create`](Self::create) for media uploads
    pub async fn create_multipart(&self, form: MultipartForm) -> Result<T, ResourceError> {
        let api = self.resolve(Verb::Create)?;
        self.create_payload(api, Payload::Multipart(form)).await
    }

    async fn create_payload(
        &self,
        api: Arc<dyn ResourceApi>,
        payload: Payload,
    ) -> Result<T, ResourceError> {
        let _in_flight = self.begin();
        let result = self
            .wrapper
            .wrap(
                move || async move { api.create(payload).await },
                Some(self.messages.created.as_str()),
                &self.messages.create_failed,
            )
            .await
            .map_err(ResourceError::from)
            .and_then(|value| self.decode(value));

        match result {
            Ok(record) => {
                let mut state = self.state.lock();
                state.data.push(record.clone());
                state.error = None;
                debug!(resource = %self.resource, id = ?record.record_id(), "Record created");
                Ok(record)
            }
            Err(e) => Err(self.fail(Verb::Create, e)),
        }
    }

    /// Update a record and swap in the server's version of it
    pub async fn update<P: Serialize + ?Sized>(
        &self,
        id: impl Into<RecordId>,
        item: &P,
    ) -> Result<T, ResourceError> {
        let api = self.resolve(Verb::Update)?;
        let payload = self.encode(item)?;
        self.update_payload(api, id.into(), payload).await
    }

    /// Multipart variant of [`update`](Self::update) for media uploads
    pub async fn update_multipart(
        &self,
        id: impl Into<RecordId>,
        form: MultipartForm,
    ) -> Result<T, ResourceError> {
        let api = self.resolve(Verb::Update)?;
        self.update_payload(api, id.into(), Payload::Multipart(form))
            .await
    }

    async fn update_payload(
        &self,
        api: Arc<dyn ResourceApi>,
        id: RecordId,
        payload: Payload,
    ) -> Result<T, ResourceError> {
        let _in_flight = self.begin();
        let target = id.clone();
        let result = self
            .wrapper
            .wrap(
                move || async move { api.update(&target, payload).await },
                Some(self.messages.updated.as_str()),
                &self.messages.update_failed,
            )
            .await
            .map_err(ResourceError::from)
            .and_then(|value| self.decode(value));

        match result {
            Ok(record) => {
                let mut state = self.state.lock();
                match state
                    .data
                    .iter_mut()
                    .find(|r| r.record_id().as_ref() == Some(&id))
                {
                    Some(slot) => *slot = record.clone(),
                    None => {
                        debug!(resource = %self.resource, %id, "Updated record not cached, appending");
                        state.data.push(record.clone());
                    }
                }
                state.error = None;
                Ok(record)
            }
            Err(e) => Err(self.fail(Verb::Update, e)),
        }
    }

    /// Delete a record and drop it from the list
    pub async fn remove(&self, id: impl Into<RecordId>) -> Result<(), ResourceError> {
        let api = self.resolve(Verb::Delete)?;
        let id = id.into();
        let _in_flight = self.begin();
        let target = id.clone();
        let result = self
            .wrapper
            .wrap(
                move || async move { api.delete(&target).await },
                Some(self.messages.deleted.as_str()),
                &self.messages.delete_failed,
            )
            .await;

        match result {
            Ok(()) => {
                let mut state = self.state.lock();
                state.data.retain(|r| r.record_id().as_ref() != Some(&id));
                state.error = None;
                debug!(resource = %self.resource, %id, "Record deleted");
                Ok(())
            }
            Err(e) => Err(self.fail(Verb::Delete, e.into())),
        }
    }

    fn resolve(&self, verb: Verb) -> Result<Arc<dyn ResourceApi>, ResourceError> {
        self.registry.resolve(&self.resource, verb)
    }

    fn begin(&self) -> InFlight<'_, T> {
        self.state.lock().in_flight += 1;
        InFlight { state: &self.state }
    }

    fn encode<P: Serialize + ?Sized>(&self, item: &P) -> Result<Payload, ResourceError> {
        Payload::json(item).map_err(|e| ResourceError::Encode {
            resource: self.resource.clone(),
            reason: e.to_string(),
        })
    }

    fn decode(&self, value: Value) -> Result<T, ResourceError> {
        serde_json::from_value(value).map_err(|e| ResourceError::Decode {
            resource: self.resource.clone(),
            reason: e.to_string(),
        })
    }

    fn fail(&self, verb: Verb, error: ResourceError) -> ResourceError {
        warn!(resource = %self.resource, %verb, error = %error, "Resource operation failed");
        self.state.lock().error = Some(error.clone());
        error
    }
}
