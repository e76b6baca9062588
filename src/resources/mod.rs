//! Resource layer: remote call contract, notification wrapper, CRUD cache
//!
//! - `ResourceApi`: backend operations for one named resource
//! - `ResourceRegistry`: explicit name → backend mapping, fails fast on unknown names
//! - `CallWrapper`: runs a call and publishes its success/error notification
//! - `CrudSync`: per-screen list cache updated after each call settles

pub mod api;
pub mod error;
pub mod mock;
pub mod registry;
pub mod sync;
pub mod wrapper;

pub use api::{FilePart, MultipartForm, Payload, Record, RecordId, ResourceApi};
pub use error::{RemoteError, ResourceError};
pub use registry::{ResourceRegistry, Verb};
pub use sync::{CrudMessages, CrudSync};
pub use wrapper::{CallWrapper, ErrorMessage, WrapOptions};
