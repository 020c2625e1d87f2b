//! Type id and enum code negotiation with the server cluster.
//!
//! The registry never talks to the network directly: it asks a
//! [`TypeNegotiator`] for authoritative ids. The production implementation
//! lives in the connection layer; [`InMemoryNegotiator`] plays the server
//! side in-process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::NegotiationError;
use crate::types::{EnumInfo, PdxType};

/// Obtains cluster-wide ids for schemas and enum constants.
///
/// Implementations must be idempotent: negotiating an equal schema (or enum
/// descriptor) twice yields the same id. The registry does not retry failed
/// calls.
pub trait TypeNegotiator: Send + Sync {
    /// Returns the type id the cluster assigned to `schema`.
    fn negotiate_type_id(&self, pool_name: &str, schema: &PdxType) -> Result<i32, NegotiationError>;

    /// Returns the code the cluster assigned to `descriptor`.
    fn negotiate_enum_code(&self, descriptor: &EnumInfo) -> Result<i32, NegotiationError>;

    /// Resolves a code received on the wire back to its enum descriptor.
    fn resolve_enum(&self, code: i32) -> Result<EnumInfo, NegotiationError>;
}

#[derive(Debug, Default)]
struct ServerTables {
    type_ids: HashMap<PdxType, i32>,
    next_type_id: i32,
    enum_codes: HashMap<EnumInfo, i32>,
    enums_by_code: HashMap<i32, EnumInfo>,
    next_enum_code: i32,
}

/// In-process stand-in for the servers' type registry.
///
/// Assigns ids sequentially starting at 1, counts calls, and can be switched
/// into a failing mode to simulate an unreachable pool.
#[derive(Debug, Default)]
pub struct InMemoryNegotiator {
    tables: Mutex<ServerTables>,
    unreachable: AtomicBool,
    type_calls: AtomicUsize,
    enum_calls: AtomicUsize,
}

impl InMemoryNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next ids handed out start at `type_id` / `enum_code`.
    pub fn starting_at(type_id: i32, enum_code: i32) -> Self {
        let negotiator = Self::default();
        {
            let mut tables = negotiator.tables.lock();
            tables.next_type_id = type_id - 1;
            tables.next_enum_code = enum_code - 1;
        }
        negotiator
    }

    /// Makes every call fail with [`NegotiationError::Unreachable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Release);
    }

    /// Number of `negotiate_type_id` calls received.
    pub fn type_id_calls(&self) -> usize {
        self.type_calls.load(Ordering::Acquire)
    }

    /// Number of enum calls (both directions) received.
    pub fn enum_calls(&self) -> usize {
        self.enum_calls.load(Ordering::Acquire)
    }

    fn check_reachable(&self, pool_name: &str) -> Result<(), NegotiationError> {
        if self.unreachable.load(Ordering::Acquire) {
            return Err(NegotiationError::Unreachable {
                pool: pool_name.to_string(),
            });
        }
        Ok(())
    }
}

impl TypeNegotiator for InMemoryNegotiator {
    fn negotiate_type_id(&self, pool_name: &str, schema: &PdxType) -> Result<i32, NegotiationError> {
        self.type_calls.fetch_add(1, Ordering::AcqRel);
        self.check_reachable(pool_name)?;

        let mut tables = self.tables.lock();
        if let Some(&id) = tables.type_ids.get(schema) {
            return Ok(id);
        }
        tables.next_type_id += 1;
        let id = tables.next_type_id;
        tables.type_ids.insert(schema.clone(), id);
        Ok(id)
    }

    fn negotiate_enum_code(&self, descriptor: &EnumInfo) -> Result<i32, NegotiationError> {
        self.enum_calls.fetch_add(1, Ordering::AcqRel);
        self.check_reachable("enum")?;

        let mut tables = self.tables.lock();
        if let Some(&code) = tables.enum_codes.get(descriptor) {
            return Ok(code);
        }
        tables.next_enum_code += 1;
        let code = tables.next_enum_code;
        tables.enum_codes.insert(descriptor.clone(), code);
        tables.enums_by_code.insert(code, descriptor.clone());
        Ok(code)
    }

    fn resolve_enum(&self, code: i32) -> Result<EnumInfo, NegotiationError> {
        self.enum_calls.fetch_add(1, Ordering::AcqRel);
        self.check_reachable("enum")?;

        let tables = self.tables.lock();
        tables
            .enums_by_code
            .get(&code)
            .cloned()
            .ok_or(NegotiationError::UnknownEnumCode { code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn test_negotiation_is_idempotent() {
        let negotiator = InMemoryNegotiator::starting_at(7, 100);
        let schema = PdxType::builder("Portfolio")
            .field("ID", FieldType::Int)
            .build()
            .unwrap();

        assert_eq!(negotiator.negotiate_type_id("default", &schema).unwrap(), 7);
        assert_eq!(negotiator.negotiate_type_id("default", &schema).unwrap(), 7);
        assert_eq!(negotiator.type_id_calls(), 2);

        let red = EnumInfo::new("Color", "RED", 0);
        let code = negotiator.negotiate_enum_code(&red).unwrap();
        assert_eq!(code, 100);
        assert_eq!(negotiator.resolve_enum(code).unwrap(), red);
        assert_eq!(
            negotiator.resolve_enum(5),
            Err(NegotiationError::UnknownEnumCode { code: 5 })
        );
    }

    #[test]
    fn test_unreachable_pool() {
        let negotiator = InMemoryNegotiator::new();
        negotiator.set_unreachable(true);
        let schema = PdxType::builder("X").build().unwrap();
        assert_eq!(
            negotiator.negotiate_type_id("edge", &schema),
            Err(NegotiationError::Unreachable {
                pool: "edge".to_string()
            })
        );
    }
}
