//! Schema tables guarded by a single reader-writer lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::negotiator::TypeNegotiator;
use crate::types::PdxType;

#[derive(Debug, Default)]
struct SchemaTables {
    /// Every known schema, local and remote
    by_id: HashMap<i32, Arc<PdxType>>,
    /// Local schemas by class name
    local_by_name: HashMap<String, Arc<PdxType>>,
    /// Merged schemas by the remote type id they were derived from
    merged_by_remote_id: HashMap<i32, Arc<PdxType>>,
    /// Reverse index so equal schemas are negotiated once
    id_by_schema: HashMap<PdxType, i32>,
}

/// The four schema tables plus per-schema negotiation guards.
#[derive(Debug, Default)]
pub(crate) struct TypeTables {
    tables: RwLock<SchemaTables>,
    /// One guard per schema currently being negotiated. Threads registering
    /// the same schema queue on its guard instead of each calling the servers.
    in_flight: Mutex<HashMap<PdxType, Arc<Mutex<()>>>>,
}

/// Removes a negotiation guard from the in-flight map when dropped.
struct InFlightSlot<'a> {
    tables: &'a TypeTables,
    schema: &'a PdxType,
    guard: Arc<Mutex<()>>,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.tables.in_flight.lock();
        if in_flight
            .get(self.schema)
            .is_some_and(|current| Arc::ptr_eq(current, &self.guard))
        {
            in_flight.remove(self.schema);
        }
    }
}

impl TypeTables {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lookup_id(&self, schema: &PdxType) -> Option<i32> {
        let tables = self.tables.read();
        tables.id_by_schema.get(schema).copied().filter(|&id| id != 0)
    }

    fn begin_negotiation<'a>(&'a self, schema: &'a PdxType) -> InFlightSlot<'a> {
        let guard = {
            let mut in_flight = self.in_flight.lock();
            Arc::clone(in_flight.entry(schema.clone()).or_default())
        };
        InFlightSlot {
            tables: self,
            schema,
            guard,
        }
    }

    /// Returns the id of `schema`, negotiating one on first use.
    ///
    /// Optimistic read first; on a miss the caller takes the schema's
    /// negotiation guard and must look again before negotiating, because
    /// another thread may have published the id while this one waited.
    pub(crate) fn get_or_assign_id(
        &self,
        schema: &PdxType,
        pool_name: &str,
        negotiator: &dyn TypeNegotiator,
    ) -> Result<i32> {
        if let Some(id) = self.lookup_id(schema) {
            return Ok(id);
        }

        let slot = self.begin_negotiation(schema);
        let _negotiating = slot.guard.lock();

        if let Some(id) = self.lookup_id(schema) {
            return Ok(id);
        }

        let negotiated = match negotiator.negotiate_type_id(pool_name, schema) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    "Type id negotiation for '{}' on pool '{}' failed: {}",
                    schema.class_name(),
                    pool_name,
                    e
                );
                return Err(e.into());
            }
        };
        let assigned = Arc::new(schema.with_type_id(negotiated)?);

        let mut tables = self.tables.write();
        let id = *tables
            .id_by_schema
            .entry(schema.clone())
            .or_insert(negotiated);
        if id == negotiated {
            tables.by_id.insert(id, assigned);
        }
        tracing::debug!(
            "Negotiated type id {} for '{}' on pool '{}'",
            id,
            schema.class_name(),
            pool_name
        );
        Ok(id)
    }

    pub(crate) fn add_type(&self, type_id: i32, schema: Arc<PdxType>) {
        let mut tables = self.tables.write();
        tables.by_id.insert(type_id, schema);
    }

    /// Publishes `schema` under `type_id` unless the id is already bound.
    ///
    /// # Returns
    /// The schema bound to `type_id` after the call.
    pub(crate) fn add_type_if_absent(&self, type_id: i32, schema: Arc<PdxType>) -> Arc<PdxType> {
        let mut tables = self.tables.write();
        Arc::clone(tables.by_id.entry(type_id).or_insert(schema))
    }

    pub(crate) fn get_type(&self, type_id: i32) -> Option<Arc<PdxType>> {
        let tables = self.tables.read();
        tables.by_id.get(&type_id).cloned()
    }

    pub(crate) fn add_local_type(&self, class_name: &str, schema: Arc<PdxType>) {
        let mut tables = self.tables.write();
        tables.local_by_name.insert(class_name.to_string(), schema);
    }

    pub(crate) fn get_local_type(&self, class_name: &str) -> Option<Arc<PdxType>> {
        let tables = self.tables.read();
        tables.local_by_name.get(class_name).cloned()
    }

    pub(crate) fn set_merged_type(&self, remote_type_id: i32, merged: Arc<PdxType>) {
        let mut tables = self.tables.write();
        tables.merged_by_remote_id.insert(remote_type_id, merged);
    }

    pub(crate) fn get_merged_type(&self, remote_type_id: i32) -> Option<Arc<PdxType>> {
        let tables = self.tables.read();
        tables.merged_by_remote_id.get(&remote_type_id).cloned()
    }

    pub(crate) fn type_count(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub(crate) fn merged_count(&self) -> usize {
        self.tables.read().merged_by_remote_id.len()
    }

    pub(crate) fn clear(&self) {
        let mut tables = self.tables.write();
        tables.by_id.clear();
        tables.local_by_name.clear();
        tables.merged_by_remote_id.clear();
        tables.id_by_schema.clear();
    }
}
