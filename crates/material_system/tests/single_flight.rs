//! Concurrent loading of one name

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::{illum, Fixture, RecordingListener};
use material_system::{
    AssetSource, AssetStatus, DocumentNode, DocumentSource, HeadlessShaderService, LoadOptions,
    MaterialConfig, MaterialManager, MemoryDocumentStore, Services,
};

/// Memory store that parses slowly and counts parses per call
struct SlowStore {
    inner: MemoryDocumentStore,
    parses: AtomicUsize,
}

impl DocumentSource for SlowStore {
    fn parse(&self, path: &str) -> Option<DocumentNode> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        self.inner.parse(path)
    }
}

impl AssetSource for SlowStore {
    fn exists(&self, path: &str) -> bool {
        self.inner.exists(path)
    }

    fn asset_status(&self, path: &str) -> AssetStatus {
        self.inner.asset_status(path)
    }
}

fn slow_manager() -> (Arc<SlowStore>, Arc<RecordingListener>, Arc<MaterialManager>) {
    material_system::logging::init_for_tests();
    let store = Arc::new(SlowStore {
        inner: MemoryDocumentStore::new(),
        parses: AtomicUsize::new(0),
    });
    let listener = Arc::new(RecordingListener::default());
    let services = Services::from_store(Arc::clone(&store), Arc::new(HeadlessShaderService::new()))
        .with_listener(Arc::clone(&listener) as _);
    let manager = Arc::new(MaterialManager::new(services, MaterialConfig::default()));
    (store, listener, manager)
}

#[test]
fn test_concurrent_requests_share_one_build() {
    let (store, listener, manager) = slow_manager();
    store.inner.insert("materials/shared.mtl", illum("textures/shared.tif"));
    manager.init_defaults();
    let parses_before = store.parses.load(Ordering::SeqCst);

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.load_or_create("Materials/Shared", LoadOptions::default())
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("every caller sees the material"))
        .collect();

    for material in &results[1..] {
        assert!(Arc::ptr_eq(material, &results[0]));
    }
    assert_eq!(store.parses.load(Ordering::SeqCst) - parses_before, 1);
    assert_eq!(listener.created_count("materials/shared"), 1);
    assert!(manager.registry().pending_gate("materials/shared").unwrap().is_set());
}

#[test]
fn test_doubled_extension_shares_one_key() {
    let (store, _, manager) = slow_manager();
    store.inner.insert("materials/twice.mtl", illum("textures/twice.tif"));
    manager.init_defaults();

    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.load_or_create("./Materials/Twice.mtl.mtl", LoadOptions::default())
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("every caller sees the material"))
        .collect();

    for material in &results[1..] {
        assert!(Arc::ptr_eq(material, &results[0]));
    }
    assert_eq!(results[0].name(), "materials/twice");
    assert!(Arc::ptr_eq(&manager.find("materials/twice.mtl.mtl").unwrap(), &results[0]));
}

#[test]
fn test_concurrent_failure_seen_by_all() {
    let (store, _, manager) = slow_manager();
    manager.init_defaults();
    // Exists but is not a material descriptor: terminal parse failure
    store.inner.insert("materials/broken.mtl", DocumentNode::new("Garbage"));

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.load_or_create("materials/broken", LoadOptions::default())
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_none());
    }
    assert!(manager.find("materials/broken").is_none());
    assert!(manager.registry().pending_gate("materials/broken").is_none());
}

#[test]
fn test_concurrent_fallback_is_default() {
    let (_, _, manager) = slow_manager();
    let default = manager.default_material().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.load_or_create("materials/absent", LoadOptions::create_if_missing()))
        })
        .collect();

    for handle in handles {
        assert!(Arc::ptr_eq(&handle.join().unwrap().unwrap(), &default));
    }
    assert!(manager.find("materials/absent").is_none());
}

#[test]
fn test_self_reference_falls_back_to_default() {
    let fixture = Fixture::new();
    fixture.store.insert(
        "materials/loop.mtl",
        illum("textures/loop.tif").with_child(
            DocumentNode::new("SubMaterials")
                .with_child(DocumentNode::new("MaterialRef").with_attr("Name", "Materials/Loop")),
        ),
    );

    let material = fixture
        .manager
        .load_or_create("materials/loop", LoadOptions::default())
        .unwrap();
    let default = fixture.manager.default_material().unwrap();

    assert_eq!(material.sub_material_count(), 1);
    assert!(Arc::ptr_eq(&material.sub_material(0).unwrap(), &default));
    assert!(fixture.manager.registry().pending_gate("materials/loop").unwrap().is_set());
}

#[test]
fn test_mutual_reference_resolves() {
    let fixture = Fixture::new();
    let referencing = |target: &str| {
        illum("textures/a.tif").with_child(
            DocumentNode::new("SubMaterials")
                .with_child(DocumentNode::new("MaterialRef").with_attr("Name", target)),
        )
    };
    fixture.store.insert("materials/a.mtl", referencing("materials/b"));
    fixture.store.insert("materials/b.mtl", referencing("materials/a"));

    let a = fixture
        .manager
        .load_or_create("materials/a", LoadOptions::default())
        .unwrap();
    let b = fixture.manager.find("materials/b").unwrap();
    let default = fixture.manager.default_material().unwrap();

    assert!(Arc::ptr_eq(&a.sub_material(0).unwrap(), &b));
    assert!(Arc::ptr_eq(&b.sub_material(0).unwrap(), &default));
}
