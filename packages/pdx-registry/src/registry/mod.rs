//! PDX type registry: schema tables, enum cache and preserved fields under
//! one attach/detach lifecycle.

mod enum_cache;
mod preserved;
mod type_tables;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::expiry::ExpiryScheduler;
use crate::negotiator::TypeNegotiator;
use crate::types::{EnumInfo, PdxType, SchemaError, SchemaOrigin};

use enum_cache::EnumCache;
use preserved::PreservedDataStore;
use type_tables::TypeTables;

pub use preserved::{OwnerId, PdxOwner, PreservedData, UnreadField};

/// Tables allocated by `initialize()` and released by `teardown()`.
///
/// Schema tables, enum maps and preserved data each sit behind their own
/// lock.
struct RegistryState {
    types: TypeTables,
    enums: EnumCache,
    preserved: PreservedDataStore,
}

impl RegistryState {
    fn new(scheduler: Arc<dyn ExpiryScheduler>, config: &RegistryConfig) -> Self {
        Self {
            types: TypeTables::new(),
            enums: EnumCache::new(),
            preserved: PreservedDataStore::new(scheduler, config.preserved_data_ttl()),
        }
    }

    fn clear(&self) {
        self.types.clear();
        self.enums.clear();
        let dropped = self.preserved.clear();
        tracing::info!("PDX registry cleared ({} preserved entries dropped)", dropped);
    }
}

/// Schema chosen for serializing one object.
#[derive(Debug, Clone)]
pub struct WritePlan {
    /// Schema to encode with, always carrying a non-zero type id
    pub schema: Arc<PdxType>,
    /// Fields to write back verbatim after the object's own fields
    pub preserved: Option<Arc<PreservedData>>,
}

impl WritePlan {
    pub fn type_id(&self) -> i32 {
        self.schema.type_id()
    }

    /// Preserved fields to reattach, empty if none.
    pub fn unread_fields(&self) -> &[UnreadField] {
        self.preserved
            .as_deref()
            .map(PreservedData::unread_fields)
            .unwrap_or(&[])
    }
}

/// Client-wide registry of PDX types, enum codes and preserved fields.
///
/// One instance is owned by the distributed-system handle and shared by
/// `Arc` with every serializer and deserializer. Tables only exist between
/// [`initialize`](Self::initialize) and [`teardown`](Self::teardown); using
/// any table operation outside that bracket is a programming error and
/// panics.
pub struct PdxTypeRegistry {
    config: RegistryConfig,
    negotiator: Arc<dyn TypeNegotiator>,
    scheduler: Arc<dyn ExpiryScheduler>,
    state: ArcSwapOption<RegistryState>,
    read_serialized: AtomicBool,
    ignore_unread_fields: AtomicBool,
}

impl PdxTypeRegistry {
    /// Creates a registry. Call [`initialize`](Self::initialize) before use.
    ///
    /// # Returns
    /// `Err(RegistryError::InvalidConfig)` if the configuration fails validation.
    pub fn new(
        config: RegistryConfig,
        negotiator: Arc<dyn TypeNegotiator>,
        scheduler: Arc<dyn ExpiryScheduler>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            read_serialized: AtomicBool::new(config.read_serialized),
            ignore_unread_fields: AtomicBool::new(config.ignore_unread_fields),
            config,
            negotiator,
            scheduler,
            state: ArcSwapOption::empty(),
        })
    }

    /// Allocates all tables. Paired with the client's attach.
    pub fn initialize(&self) {
        if self.state.load().is_some() {
            tracing::warn!("PDX registry already initialized, keeping existing tables");
            return;
        }
        self.state
            .store(Some(Arc::new(RegistryState::new(self.scheduler.clone(), &self.config))));
        tracing::info!(
            "PDX registry initialized (pool '{}', preserved data TTL {:?})",
            self.config.pool_name,
            self.config.preserved_data_ttl()
        );
    }

    /// Clears and releases all tables. Paired with the client's detach.
    pub fn teardown(&self) {
        if let Some(state) = self.state.swap(None) {
            state.clear();
            tracing::info!("PDX registry torn down");
        }
    }

    /// Returns `true` between `initialize()` and `teardown()`.
    pub fn is_initialized(&self) -> bool {
        self.state.load().is_some()
    }

    fn state(&self) -> Arc<RegistryState> {
        match self.state.load_full() {
            Some(state) => state,
            None => panic!("PDX type registry used outside initialize()/teardown()"),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Deserializers should produce generic PDX instances.
    pub fn read_serialized(&self) -> bool {
        self.read_serialized.load(Ordering::Acquire)
    }

    pub fn set_read_serialized(&self, enabled: bool) {
        self.read_serialized.store(enabled, Ordering::Release);
    }

    /// Unknown fields are dropped instead of preserved.
    pub fn ignore_unread_fields(&self) -> bool {
        self.ignore_unread_fields.load(Ordering::Acquire)
    }

    pub fn set_ignore_unread_fields(&self, enabled: bool) {
        self.ignore_unread_fields.store(enabled, Ordering::Release);
    }

    // ---------------------------------------------------------------------
    // Schema tables
    // ---------------------------------------------------------------------

    /// Returns the cluster-wide id for `schema`, negotiating it on first use.
    ///
    /// Equal schemas (same class name and ordered fields) share one id. On a
    /// negotiation failure the error is returned and nothing is recorded.
    pub fn get_or_assign_local_type_id(&self, schema: &PdxType) -> Result<i32> {
        self.state()
            .types
            .get_or_assign_id(schema, &self.config.pool_name, self.negotiator.as_ref())
    }

    /// Registers a locally compiled type and returns its assigned descriptor.
    ///
    /// A local descriptor of the same class and shape that already carries an
    /// id is reused without contacting the servers.
    pub fn register_local_type(&self, schema: PdxType) -> Result<Arc<PdxType>> {
        let state = self.state();
        if let Some(existing) = state.types.get_local_type(schema.class_name()) {
            if existing.type_id() != 0 && *existing == schema {
                return Ok(existing);
            }
        }

        let type_id = state.types.get_or_assign_id(
            &schema,
            &self.config.pool_name,
            self.negotiator.as_ref(),
        )?;
        let assigned = match state.types.get_type(type_id) {
            Some(stored) if *stored == schema => stored,
            _ => Arc::new(schema.with_type_id(type_id)?),
        };
        state
            .types
            .add_local_type(assigned.class_name(), Arc::clone(&assigned));
        Ok(assigned)
    }

    /// Publishes a schema under a known type id, replacing any previous one.
    pub fn add_type(&self, type_id: i32, schema: Arc<PdxType>) {
        self.state().types.add_type(type_id, schema);
    }

    pub fn get_type(&self, type_id: i32) -> Option<Arc<PdxType>> {
        self.state().types.get_type(type_id)
    }

    pub fn add_local_type(&self, class_name: &str, schema: Arc<PdxType>) {
        self.state().types.add_local_type(class_name, schema);
    }

    pub fn get_local_type(&self, class_name: &str) -> Option<Arc<PdxType>> {
        self.state().types.get_local_type(class_name)
    }

    /// Publishes the merged schema derived from remote type `remote_type_id`.
    pub fn set_merged_type(&self, remote_type_id: i32, merged: Arc<PdxType>) {
        tracing::debug!(
            "Merged type for remote id {} set ({} fields)",
            remote_type_id,
            merged.field_count()
        );
        self.state().types.set_merged_type(remote_type_id, merged);
    }

    pub fn get_merged_type(&self, remote_type_id: i32) -> Option<Arc<PdxType>> {
        self.state().types.get_merged_type(remote_type_id)
    }

    /// Publishes a schema received from a server and reconciles it with the
    /// local schema of the same class.
    ///
    /// An id already bound in the type table keeps its schema, so
    /// `get_type` stays consistent with ids handed out by
    /// `get_or_assign_local_type_id`.
    ///
    /// # Returns
    /// The merged schema when the remote and local layouts differ, `None`
    /// when they match or no local schema is registered for the class.
    pub fn reconcile_remote_type(&self, remote: PdxType) -> Result<Option<Arc<PdxType>>> {
        let remote_type_id = remote.type_id();
        if remote_type_id == 0 {
            return Err(SchemaError::UnassignedTypeId {
                class_name: remote.class_name().to_string(),
            }
            .into());
        }

        let state = self.state();
        let remote = Arc::new(remote.with_origin(SchemaOrigin::Remote));
        let bound = state
            .types
            .add_type_if_absent(remote_type_id, Arc::clone(&remote));
        if !Arc::ptr_eq(&bound, &remote) && *bound != *remote {
            tracing::warn!(
                "Type id {} already bound to a different '{}' layout, keeping it",
                remote_type_id,
                bound.class_name()
            );
        }

        if let Some(merged) = state.types.get_merged_type(remote_type_id) {
            let covers_remote = remote
                .fields()
                .iter()
                .all(|f| merged.field(&f.name).is_some_and(|m| m.same_shape(f)));
            if covers_remote {
                return Ok(Some(merged));
            }
        }

        let Some(local) = state.types.get_local_type(remote.class_name()) else {
            return Ok(None);
        };

        match PdxType::merge(&local, &remote)? {
            Some(merged) => {
                let merged = Arc::new(merged);
                self.set_merged_type(remote_type_id, Arc::clone(&merged));
                Ok(Some(merged))
            }
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Enum cache
    // ---------------------------------------------------------------------

    /// Returns the code of `descriptor`, negotiating it on first use.
    pub fn get_or_assign_enum_code(&self, descriptor: &EnumInfo) -> Result<i32> {
        self.state()
            .enums
            .get_or_assign_code(descriptor, self.negotiator.as_ref())
    }

    /// Returns the descriptor of `code`, resolving it on first use.
    pub fn get_or_resolve_enum(&self, code: i32) -> Result<EnumInfo> {
        self.state()
            .enums
            .get_or_resolve_descriptor(code, self.negotiator.as_ref())
    }

    // ---------------------------------------------------------------------
    // Preserved fields
    // ---------------------------------------------------------------------

    /// Stores the unread fields of `owner`, resetting its expiry.
    pub fn set_preserve_data<O: PdxOwner + ?Sized>(&self, owner: &O, data: PreservedData) {
        self.state().preserved.set(owner.owner_id(), data);
    }

    pub fn get_preserve_data<O: PdxOwner + ?Sized>(&self, owner: &O) -> Option<Arc<PreservedData>> {
        self.state().preserved.get(owner.owner_id())
    }

    /// When the preserved entry of `owner` was last set.
    pub fn preserve_data_refreshed_at<O: PdxOwner + ?Sized>(&self, owner: &O) -> Option<Instant> {
        self.state().preserved.refreshed_at(owner.owner_id())
    }

    /// Records fields read from remote type `remote_type_id` that the local
    /// class does not declare.
    ///
    /// # Returns
    /// `false` if nothing was stored, either because `fields` is empty or
    /// unread fields are being ignored.
    pub fn preserve_unread_fields<O: PdxOwner + ?Sized>(
        &self,
        owner: &O,
        remote_type_id: i32,
        fields: Vec<UnreadField>,
    ) -> bool {
        if fields.is_empty() || self.ignore_unread_fields() {
            return false;
        }
        let merged_type_id = self
            .get_merged_type(remote_type_id)
            .map_or(0, |merged| merged.type_id());
        self.set_preserve_data(
            owner,
            PreservedData::new(remote_type_id, merged_type_id, fields),
        );
        true
    }

    /// Chooses the schema to serialize `owner` with.
    ///
    /// If the object still has preserved fields and a merged schema exists for
    /// the remote type they came from, the merged schema is used (negotiating
    /// its id if it has none yet) and the preserved fields are returned for
    /// reattachment. Otherwise the local schema is registered and used.
    pub fn prepare_write<O: PdxOwner + ?Sized>(&self, owner: &O, local: &PdxType) -> Result<WritePlan> {
        if let Some(preserved) = self.get_preserve_data(owner) {
            if let Some(merged) = self.get_merged_type(preserved.type_id()) {
                if merged.class_name() == local.class_name() {
                    let schema = self.assign_merged_id(preserved.type_id(), merged)?;
                    return Ok(WritePlan {
                        schema,
                        preserved: Some(preserved),
                    });
                }
            }
        }

        let schema = self.register_local_type(local.clone())?;
        Ok(WritePlan {
            schema,
            preserved: None,
        })
    }

    fn assign_merged_id(&self, remote_type_id: i32, merged: Arc<PdxType>) -> Result<Arc<PdxType>> {
        if merged.type_id() != 0 {
            return Ok(merged);
        }
        let type_id = self.get_or_assign_local_type_id(&merged)?;
        let assigned = Arc::new(merged.with_type_id(type_id)?);
        self.set_merged_type(remote_type_id, Arc::clone(&assigned));
        Ok(assigned)
    }

    // ---------------------------------------------------------------------
    // Lifecycle and introspection
    // ---------------------------------------------------------------------

    /// Empties every table and cancels pending expiries. Tables stay allocated.
    pub fn clear(&self) {
        self.state().clear();
    }

    /// Entries in the type id table.
    pub fn type_count(&self) -> usize {
        self.state().types.type_count()
    }

    pub fn merged_count(&self) -> usize {
        self.state().types.merged_count()
    }

    pub fn enum_count(&self) -> usize {
        self.state().enums.len()
    }

    /// Live preserved-field entries.
    pub fn preserved_count(&self) -> usize {
        self.state().preserved.len()
    }
}

impl std::fmt::Debug for PdxTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdxTypeRegistry")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("read_serialized", &self.read_serialized())
            .field("ignore_unread_fields", &self.ignore_unread_fields())
            .finish_non_exhaustive()
    }
}

impl Drop for PdxTypeRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}
