//! Shared fixture for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use material_system::{
    DocumentNode, GeometryRefresher, HeadlessShaderService, MaterialConfig, MaterialListener,
    MaterialManager, MaterialRef, MemoryDocumentStore, Services, SurfaceTypeTable,
};

/// Counts lifecycle notifications
#[derive(Default)]
pub struct RecordingListener {
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn created_count(&self, name: &str) -> usize {
        self.created.lock().iter().filter(|n| n.as_str() == name).count()
    }
}

impl MaterialListener for RecordingListener {
    fn on_create_material(&self, material: &MaterialRef) {
        self.created.lock().push(material.name());
    }

    fn on_delete_material(&self, material: &MaterialRef) {
        self.deleted.lock().push(material.name());
    }
}

/// Records geometry refresh requests
#[derive(Default)]
pub struct RecordingGeometry {
    pub refreshed: Mutex<Vec<String>>,
    pub detached: Mutex<Vec<String>>,
    pub default_refreshes: AtomicUsize,
}

impl RecordingGeometry {
    pub fn default_refresh_count(&self) -> usize {
        self.default_refreshes.load(Ordering::SeqCst)
    }
}

impl GeometryRefresher for RecordingGeometry {
    fn refresh_users_of(&self, material: &MaterialRef) {
        self.refreshed.lock().push(material.name());
    }

    fn detach_users_of(&self, material: &MaterialRef) {
        self.detached.lock().push(material.name());
    }

    fn refresh_default_users(&self) {
        self.default_refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Fixture {
    pub store: Arc<MemoryDocumentStore>,
    pub shaders: Arc<HeadlessShaderService>,
    pub listener: Arc<RecordingListener>,
    pub geometry: Arc<RecordingGeometry>,
    pub manager: MaterialManager,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(MaterialConfig::default())
    }

    pub fn with_config(config: MaterialConfig) -> Self {
        material_system::logging::init_for_tests();

        let store = Arc::new(MemoryDocumentStore::new());
        let shaders = Arc::new(HeadlessShaderService::new());
        shaders.register(
            "Illum",
            &[("DETAIL_MAPPING", 0x1), ("ALPHAGLOW", 0x2), ("VERTCOLORS", 0x4)],
        );
        shaders.register("FrozenLayerWIP", &[("VERTCOLORS", 0x10), ("DETAIL_MAPPING", 0x40)]);
        shaders.register("WetLayer", &[("ALPHAGLOW", 0x8)]);

        let listener = Arc::new(RecordingListener::default());
        let geometry = Arc::new(RecordingGeometry::default());
        let surface_types = Arc::new(SurfaceTypeTable::new(&["mat_default", "mat_rock", "mat_metal"]));

        let services = Services::from_store(Arc::clone(&store), Arc::clone(&shaders) as _)
            .with_surface_types(surface_types)
            .with_listener(Arc::clone(&listener) as _)
            .with_geometry(Arc::clone(&geometry) as _);

        Self {
            manager: MaterialManager::new(services, config),
            store,
            shaders,
            listener,
            geometry,
        }
    }
}

pub fn illum(diffuse_texture: &str) -> DocumentNode {
    DocumentNode::new("Material")
        .with_attr("Shader", "Illum")
        .with_child(
            DocumentNode::new("Textures").with_child(
                DocumentNode::new("Texture")
                    .with_attr("Map", "Diffuse")
                    .with_attr("File", diffuse_texture),
            ),
        )
}
