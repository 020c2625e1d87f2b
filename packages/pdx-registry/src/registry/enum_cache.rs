//! Bidirectional enum descriptor <-> code interning.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{RegistryError, Result};
use crate::negotiator::TypeNegotiator;
use crate::types::EnumInfo;

#[derive(Debug, Default)]
struct EnumTables {
    code_by_enum: HashMap<EnumInfo, i32>,
    enum_by_code: HashMap<i32, EnumInfo>,
}

impl EnumTables {
    /// Inserts both directions, refusing to break the bijection.
    fn publish(&mut self, descriptor: EnumInfo, code: i32) -> Result<()> {
        if let Some(existing) = self.enum_by_code.get(&code) {
            if *existing != descriptor {
                return Err(RegistryError::EnumCodeConflict {
                    code,
                    existing: existing.to_string(),
                    requested: descriptor.to_string(),
                });
            }
        }
        if let Some(&existing_code) = self.code_by_enum.get(&descriptor) {
            if existing_code != code {
                return Err(RegistryError::EnumCodeConflict {
                    code,
                    existing: format!("{} (code {})", descriptor, existing_code),
                    requested: descriptor.to_string(),
                });
            }
        }
        self.enum_by_code.insert(code, descriptor.clone());
        self.code_by_enum.insert(descriptor, code);
        Ok(())
    }
}

/// Enum code cache with its own lock.
#[derive(Debug, Default)]
pub(crate) struct EnumCache {
    tables: RwLock<EnumTables>,
}

impl EnumCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the code for `descriptor`, asking the servers on first use.
    pub(crate) fn get_or_assign_code(
        &self,
        descriptor: &EnumInfo,
        negotiator: &dyn TypeNegotiator,
    ) -> Result<i32> {
        {
            let tables = self.tables.read();
            if let Some(&code) = tables.code_by_enum.get(descriptor) {
                return Ok(code);
            }
        }

        let mut tables = self.tables.write();
        // Re-check: a writer may have published between the two locks.
        if let Some(&code) = tables.code_by_enum.get(descriptor) {
            return Ok(code);
        }

        let code = negotiator.negotiate_enum_code(descriptor).map_err(|e| {
            tracing::warn!("Enum code negotiation for {} failed: {}", descriptor, e);
            RegistryError::from(e)
        })?;
        tables.publish(descriptor.clone(), code)?;
        tracing::debug!("Enum {} interned as code {}", descriptor, code);
        Ok(code)
    }

    /// Returns the descriptor for `code`, asking the servers on first use.
    pub(crate) fn get_or_resolve_descriptor(
        &self,
        code: i32,
        negotiator: &dyn TypeNegotiator,
    ) -> Result<EnumInfo> {
        {
            let tables = self.tables.read();
            if let Some(descriptor) = tables.enum_by_code.get(&code) {
                return Ok(descriptor.clone());
            }
        }

        let mut tables = self.tables.write();
        // Re-check: a writer may have published between the two locks.
        if let Some(descriptor) = tables.enum_by_code.get(&code) {
            return Ok(descriptor.clone());
        }

        let descriptor = negotiator.resolve_enum(code).map_err(|e| {
            tracing::warn!("Resolving enum code {} failed: {}", code, e);
            RegistryError::from(e)
        })?;
        tables.publish(descriptor.clone(), code)?;
        tracing::debug!("Enum code {} resolved to {}", code, descriptor);
        Ok(descriptor)
    }

    pub(crate) fn len(&self) -> usize {
        self.tables.read().code_by_enum.len()
    }

    pub(crate) fn clear(&self) {
        let mut tables = self.tables.write();
        tables.code_by_enum.clear();
        tables.enum_by_code.clear();
    }
}
