//! Preserved-field expiry against the background `ExpiryTaskManager`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ntest::timeout;
use pdx_registry::{
    ExpiryScheduler, ExpiryTaskManager, FieldType, InMemoryNegotiator, OwnerId, PdxField,
    PdxTypeRegistry, PreservedData, RegistryConfig, TaskId, UnreadField,
};

use super::helpers::registry_with;

const TTL_MS: u64 = 200;

/// `ExpiryTaskManager` that counts the callbacks it runs.
struct CountingScheduler {
    inner: ExpiryTaskManager,
    fired: Arc<AtomicUsize>,
}

impl CountingScheduler {
    fn new() -> Self {
        Self {
            inner: ExpiryTaskManager::new().unwrap(),
            fired: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl ExpiryScheduler for CountingScheduler {
    fn schedule_once(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce(TaskId) + Send + 'static>,
    ) -> TaskId {
        let fired = Arc::clone(&self.fired);
        self.inner.schedule_once(
            delay,
            Box::new(move |task| {
                fired.fetch_add(1, Ordering::SeqCst);
                callback(task);
            }),
        )
    }

    fn cancel(&self, task: TaskId) -> bool {
        self.inner.cancel(task)
    }

    fn reschedule(&self, task: TaskId, delay: Duration) -> bool {
        self.inner.reschedule(task, delay)
    }
}

fn registry_with_ttl(ttl_ms: u64) -> (PdxTypeRegistry, Arc<CountingScheduler>) {
    let scheduler = Arc::new(CountingScheduler::new());
    let config = RegistryConfig {
        preserved_data_ttl_ms: ttl_ms,
        ..Default::default()
    };
    let registry = registry_with(config, Arc::new(InMemoryNegotiator::new()), scheduler.clone());
    (registry, scheduler)
}

fn data(bytes: &[u8]) -> PreservedData {
    PreservedData::new(
        3,
        0,
        vec![UnreadField::new(PdxField::new("extra", FieldType::String), bytes.to_vec())],
    )
}

/// Polls until `owner` has no preserved data or `limit` passes.
fn wait_for_expiry(registry: &PdxTypeRegistry, owner: &OwnerId, limit: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if registry.get_preserve_data(owner).is_none() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[timeout(5000)]
#[test]
fn test_entry_removed_after_ttl() {
    let (registry, scheduler) = registry_with_ttl(TTL_MS);
    let owner = OwnerId::next();

    registry.set_preserve_data(&owner, data(b"x"));
    assert!(registry.get_preserve_data(&owner).is_some());
    assert_eq!(scheduler.inner.pending_count(), 1);

    assert!(wait_for_expiry(&registry, &owner, Duration::from_secs(2)));
    assert_eq!(registry.preserved_count(), 0);
    assert_eq!(scheduler.fired(), 1);
}

#[timeout(8000)]
#[test]
fn test_refresh_near_deadline_extends_lifetime() {
    const LONG_TTL_MS: u64 = 1000;
    let (registry, scheduler) = registry_with_ttl(LONG_TTL_MS);
    let owner = OwnerId::next();

    registry.set_preserve_data(&owner, data(b"b1"));
    thread::sleep(Duration::from_millis(LONG_TTL_MS * 9 / 10));
    registry.set_preserve_data(&owner, data(b"b2"));

    // Past the first deadline, well inside the second.
    thread::sleep(Duration::from_millis(LONG_TTL_MS * 3 / 10));
    let current = registry.get_preserve_data(&owner).unwrap();
    assert_eq!(current.field_bytes("extra"), Some(&b"b2"[..]));
    assert_eq!(scheduler.fired(), 0);

    assert!(wait_for_expiry(&registry, &owner, Duration::from_secs(3)));
    assert_eq!(scheduler.fired(), 1);
}

#[timeout(5000)]
#[test]
fn test_teardown_cancels_pending_expiries() {
    let (registry, scheduler) = registry_with_ttl(TTL_MS);
    for _ in 0..10 {
        registry.set_preserve_data(&OwnerId::next(), data(b"x"));
    }
    assert_eq!(scheduler.inner.pending_count(), 10);

    registry.teardown();
    assert_eq!(scheduler.inner.pending_count(), 0);

    thread::sleep(Duration::from_millis(TTL_MS * 2));
    assert_eq!(scheduler.fired(), 0);
    assert_eq!(scheduler.inner.pending_count(), 0);
}
