//! Read/modify/write round-trips of objects whose remote schema has fields
//! the local class does not declare.

use std::time::Duration;

use pdx_registry::{
    EnumInfo, FieldType, OwnerId, PdxOwner, PdxType, RegistryError, SchemaError, SchemaOrigin,
    UnreadField,
};

use super::helpers::{local_portfolio, manual_registry, remote_portfolio};

/// Domain object carrying its own stable identity.
struct Portfolio {
    identity: OwnerId,
    status: String,
}

impl PdxOwner for Portfolio {
    fn owner_id(&self) -> OwnerId {
        self.identity
    }
}

#[test]
fn test_extra_remote_field_survives_rewrite() {
    let (registry, negotiator, _) = manual_registry(7);

    let local = registry.register_local_type(local_portfolio()).unwrap();
    assert_eq!(local.type_id(), 7);

    // Another client widened the class and reused id 7 for its wire format.
    let remote = remote_portfolio(7);
    let unread: Vec<UnreadField> = remote
        .fields_missing_from(&local)
        .into_iter()
        .map(|field| UnreadField::new(field.clone(), b"\x00\x03abc".to_vec()))
        .collect();
    assert_eq!(unread.len(), 1);

    let merged = registry.reconcile_remote_type(remote).unwrap().unwrap();
    assert_eq!(merged.type_id(), 7);
    let names: Vec<&str> = merged.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["ID", "status", "extra"]);

    let mut object = Portfolio {
        identity: OwnerId::next(),
        status: "open".to_string(),
    };
    assert!(registry.preserve_unread_fields(&object, 7, unread));

    object.status = "closed".to_string();
    let plan = registry.prepare_write(&object, &local_portfolio()).unwrap();
    assert_eq!(object.status, "closed");
    assert_eq!(plan.type_id(), 7);
    assert_eq!(plan.schema.field_count(), 3);
    assert_eq!(plan.unread_fields().len(), 1);
    assert_eq!(plan.unread_fields()[0].field.name, "extra");
    assert_eq!(plan.unread_fields()[0].bytes, b"\x00\x03abc");
    assert_eq!(negotiator.type_id_calls(), 1);
}

#[test]
fn test_expired_preserved_fields_fall_back_to_local_schema() {
    let (registry, _, scheduler) = manual_registry(7);
    registry.register_local_type(local_portfolio()).unwrap();
    registry.reconcile_remote_type(remote_portfolio(7)).unwrap();

    let object = OwnerId::next();
    registry.preserve_unread_fields(
        &object,
        7,
        vec![UnreadField::new(
            pdx_registry::PdxField::new("extra", FieldType::String),
            b"x".to_vec(),
        )],
    );

    scheduler.advance(Duration::from_millis(5000));
    assert!(registry.get_preserve_data(&object).is_none());

    let plan = registry.prepare_write(&object, &local_portfolio()).unwrap();
    assert_eq!(plan.schema.field_count(), 2);
    assert!(plan.preserved.is_none());
}

#[test]
fn test_conflicting_field_type_is_rejected() {
    let (registry, _, _) = manual_registry(1);
    registry.register_local_type(local_portfolio()).unwrap();

    let remote = PdxType::builder("Portfolio")
        .field("ID", FieldType::Long)
        .field("status", FieldType::String)
        .origin(SchemaOrigin::Remote)
        .build()
        .unwrap()
        .with_type_id(30)
        .unwrap();

    let err = registry.reconcile_remote_type(remote).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Schema(SchemaError::FieldTypeConflict { ref field, .. }) if field == "ID"
    ));
    assert!(registry.get_merged_type(30).is_none());
}

#[test]
fn test_enum_codes_survive_remote_resolution() {
    let (registry, _, _) = manual_registry(1);
    let shipped = EnumInfo::new("com.example.OrderState", "SHIPPED", 2);

    let code = registry.get_or_assign_enum_code(&shipped).unwrap();
    registry.clear();

    // After a clear the code is resolved back from the servers.
    assert_eq!(registry.get_or_resolve_enum(code).unwrap(), shipped);
    assert_eq!(registry.get_or_assign_enum_code(&shipped).unwrap(), code);
}
