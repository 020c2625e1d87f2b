//! Many threads registering and reading schemas at once.

use std::sync::{Arc, Barrier};
use std::thread;

use ntest::timeout;
use pdx_registry::{EnumInfo, FieldType, OwnerId, PdxType};

use super::helpers::{local_portfolio, manual_registry, remote_portfolio};

fn schema(class_name: &str) -> PdxType {
    PdxType::builder(class_name)
        .field("id", FieldType::Long)
        .field("payload", FieldType::ByteArray)
        .build()
        .unwrap()
}

#[timeout(10000)]
#[test]
fn test_one_negotiation_per_distinct_schema() {
    const THREADS: usize = 8;
    const CLASSES: usize = 20;

    let (registry, negotiator, _) = manual_registry(1);
    let registry = Arc::new(registry);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..CLASSES)
                    .map(|i| {
                        registry
                            .get_or_assign_local_type_id(&schema(&format!("Class{}", i)))
                            .unwrap()
                    })
                    .collect::<Vec<i32>>()
            })
        })
        .collect();

    let results: Vec<Vec<i32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for ids in &results[1..] {
        assert_eq!(ids, &results[0]);
    }
    assert_eq!(negotiator.type_id_calls(), CLASSES);
    assert_eq!(registry.type_count(), CLASSES);
}

#[timeout(10000)]
#[test]
fn test_enum_interning_under_contention() {
    const THREADS: usize = 8;

    let (registry, _, _) = manual_registry(1);
    let registry = Arc::new(registry);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let names = ["RED", "GREEN", "BLUE"];
                let mut codes = Vec::new();
                for round in 0..names.len() {
                    let ordinal = (round + t) % names.len();
                    let descriptor = EnumInfo::new("Color", names[ordinal], ordinal as i32);
                    let code = registry.get_or_assign_enum_code(&descriptor).unwrap();
                    codes.push((descriptor, code));
                }
                codes
            })
        })
        .collect();

    for handle in handles {
        for (descriptor, code) in handle.join().unwrap() {
            assert_eq!(registry.get_or_resolve_enum(code).unwrap(), descriptor);
        }
    }
    assert_eq!(registry.enum_count(), 3);
}

#[timeout(10000)]
#[test]
fn test_preserved_writes_from_many_owners() {
    const THREADS: usize = 8;

    let (registry, _, _) = manual_registry(7);
    registry.register_local_type(local_portfolio()).unwrap();
    registry.reconcile_remote_type(remote_portfolio(7)).unwrap();
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let owner = OwnerId::next();
                let field = registry
                    .get_merged_type(7)
                    .and_then(|merged| merged.field("extra").cloned())
                    .unwrap();
                let bytes = vec![t as u8; 4];
                registry.preserve_unread_fields(
                    &owner,
                    7,
                    vec![pdx_registry::UnreadField::new(field, bytes.clone())],
                );
                let plan = registry.prepare_write(&owner, &local_portfolio()).unwrap();
                assert_eq!(plan.type_id(), 7);
                assert_eq!(plan.unread_fields()[0].bytes, bytes);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(registry.preserved_count(), THREADS);
}
