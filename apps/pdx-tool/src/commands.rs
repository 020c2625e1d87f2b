//! Implementations of the `pdx-tool` subcommands.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pdx_registry::{
    ExpiryTaskManager, InMemoryNegotiator, PdxType, PdxTypeRegistry, RegistryConfig, SchemaOrigin,
};
use serde_json::json;

fn read_json(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_schema(path: &Path) -> Result<PdxType> {
    let raw = read_json(path)?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid schema in {}", path.display()))
}

/// Merges `remote` into `local` and returns the resulting schema as JSON.
///
/// When both files describe the same fields the remote schema is returned
/// unchanged.
pub fn merge(local: &Path, remote: &Path) -> Result<String> {
    let local = load_schema(local)?;
    let remote = load_schema(remote)?.with_origin(SchemaOrigin::Remote);

    let result = match PdxType::merge(&local, &remote)? {
        Some(merged) => {
            tracing::info!(
                "Merged '{}' into {} fields (type id {})",
                merged.class_name(),
                merged.field_count(),
                merged.type_id()
            );
            merged
        }
        None => {
            tracing::info!("'{}' matches the remote schema, nothing to merge", local.class_name());
            remote
        }
    };
    Ok(serde_json::to_string_pretty(&result)?)
}

/// Registers every schema in `schemas` and returns `[{class_name, type_id}]`
/// as JSON, in input order.
pub fn register(schemas: &Path, config: Option<&Path>) -> Result<String> {
    let config = match config {
        Some(path) => RegistryConfig::from_json_str(&read_json(path)?)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?,
        None => RegistryConfig::default(),
    };
    let list: Vec<PdxType> = serde_json::from_str(&read_json(schemas)?)
        .with_context(|| format!("Invalid schema list in {}", schemas.display()))?;

    let scheduler = Arc::new(ExpiryTaskManager::new().context("Failed to start expiry worker")?);
    let registry = PdxTypeRegistry::new(config, Arc::new(InMemoryNegotiator::new()), scheduler)?;
    registry.initialize();

    let mut assigned = Vec::with_capacity(list.len());
    for schema in list {
        let class_name = schema.class_name().to_string();
        let registered = registry
            .register_local_type(schema)
            .with_context(|| format!("Failed to register '{}'", class_name))?;
        tracing::debug!("Registered '{}' as type id {}", class_name, registered.type_id());
        assigned.push(json!({
            "class_name": class_name,
            "type_id": registered.type_id(),
        }));
    }
    tracing::info!(
        "Registered {} schemas on pool '{}'",
        registry.type_count(),
        registry.config().pool_name
    );
    registry.teardown();

    Ok(serde_json::to_string_pretty(&assigned)?)
}
