//! Client-side PDX type and enum registry.
//!
//! Maps PDX type ids to schemas, reconciles remote and local schemas into
//! merged schemas, interns enum descriptors to compact codes, and keeps the
//! bytes of fields a local type does not know about so they survive a
//! read/modify/write round-trip.

pub mod config;
pub mod error;
pub mod expiry;
pub mod negotiator;
pub mod registry;
pub mod types;

pub use config::RegistryConfig;
pub use error::{NegotiationError, RegistryError, Result};
pub use expiry::{ExpiryScheduler, ExpiryTaskManager, ManualScheduler, TaskId};
pub use negotiator::{InMemoryNegotiator, TypeNegotiator};
pub use registry::{OwnerId, PdxOwner, PdxTypeRegistry, PreservedData, UnreadField, WritePlan};
pub use types::{EnumInfo, FieldType, PdxField, PdxType, SchemaError, SchemaOrigin};
