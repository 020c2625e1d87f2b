//! Shared fixtures for the integration tests.

use std::sync::Arc;

use pdx_registry::{
    ExpiryScheduler, FieldType, InMemoryNegotiator, ManualScheduler, PdxType, PdxTypeRegistry,
    RegistryConfig, SchemaOrigin,
};

/// Builds and initializes a registry on top of `scheduler`.
pub fn registry_with(
    config: RegistryConfig,
    negotiator: Arc<InMemoryNegotiator>,
    scheduler: Arc<dyn ExpiryScheduler>,
) -> PdxTypeRegistry {
    let registry = PdxTypeRegistry::new(config, negotiator, scheduler).unwrap();
    registry.initialize();
    registry
}

/// Registry driven by a virtual clock, with type ids starting at `first_type_id`.
pub fn manual_registry(
    first_type_id: i32,
) -> (PdxTypeRegistry, Arc<InMemoryNegotiator>, Arc<ManualScheduler>) {
    let negotiator = Arc::new(InMemoryNegotiator::starting_at(first_type_id, 1));
    let scheduler = Arc::new(ManualScheduler::new());
    let registry = registry_with(RegistryConfig::default(), negotiator.clone(), scheduler.clone());
    (registry, negotiator, scheduler)
}

/// `Portfolio { ID: int, status: string }` as compiled into this client.
pub fn local_portfolio() -> PdxType {
    PdxType::builder("Portfolio")
        .field("ID", FieldType::Int)
        .field("status", FieldType::String)
        .build()
        .unwrap()
}

/// A newer `Portfolio` as another client registered it.
pub fn remote_portfolio(type_id: i32) -> PdxType {
    PdxType::builder("Portfolio")
        .field("ID", FieldType::Int)
        .field("status", FieldType::String)
        .field("extra", FieldType::String)
        .origin(SchemaOrigin::Remote)
        .build()
        .unwrap()
        .with_type_id(type_id)
        .unwrap()
}
