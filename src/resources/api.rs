//! Remote call contract for admin resources

use super::error::RemoteError;
use super::registry::Verb;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable record identifier. Backends use integer or string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Read an id out of a JSON value. Only integers and strings qualify.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A cached record with a stable id
pub trait Record {
    fn record_id(&self) -> Option<RecordId>;
}

impl Record for Value {
    fn record_id(&self) -> Option<RecordId> {
        self.get("id").and_then(RecordId::from_json)
    }
}

/// One file of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Multipart body for media-bearing resources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.files.push(FilePart {
            field: field.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        });
        self
    }
}

/// Request body of a create or update call
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Multipart(MultipartForm),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(item: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(item).map(Self::Json)
    }
}

/// Backend operations for one named resource.
///
/// Implementations wrap the HTTP transport (auth headers, base URL, body
/// encoding); this crate only cares about the resolve/reject contract.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Fetch the full list
    async fn list(&self) -> Result<Vec<Value>, RemoteError>;

    /// Create a record; resolves with the record as stored by the server
    async fn create(&self, payload: Payload) -> Result<Value, RemoteError>;

    /// Update a record; resolves with the record as stored by the server
    async fn update(&self, id: &RecordId, payload: Payload) -> Result<Value, RemoteError>;

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError>;

    /// Whether this resource exposes `verb` at all
    fn supports(&self, _verb: Verb) -> bool {
        true
    }
}
