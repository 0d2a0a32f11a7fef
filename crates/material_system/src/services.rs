//! External collaborators of the material system
//!
//! Everything the manager needs from the rest of the engine is reached
//! through the traits in this module, bundled in [`Services`].

use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::DocumentSource;
use crate::material::MaterialRef;
use crate::shader::ShaderService;

/// Compilation status of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    /// Waiting for the asset compiler
    Queued,
    /// Being compiled right now
    Compiling,
    /// Compiled and available
    Compiled,
    /// No source for the asset
    Missing,
    /// Compilation failed
    Failed,
    /// Status could not be determined
    Unknown,
}

/// File system and asset compiler status
pub trait AssetSource: Send + Sync {
    /// Whether the file exists
    fn exists(&self, path: &str) -> bool;

    /// Compilation status of a file that does not exist yet
    fn asset_status(&self, path: &str) -> AssetStatus;

    /// Files below `folder` with the given extension
    fn enumerate(&self, _folder: &str, _extension: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Physical surface type referenced by materials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceType {
    /// Numeric id, never 0
    pub id: u32,
    /// Surface type name
    pub name: String,
}

/// Surface type lookup
pub trait SurfaceTypeRegistry: Send + Sync {
    /// Surface type by name; `why` describes the requester for diagnostics
    fn by_name(&self, name: &str, why: &str) -> Option<Arc<SurfaceType>>;

    /// Load the surface type definitions
    fn load_surface_types(&self) {}

    /// Forget all surface types
    fn remove_all(&self) {}
}

/// In-memory surface type registry
///
/// Ids are assigned in registration order starting from 1.
#[derive(Default)]
pub struct SurfaceTypeTable {
    definitions: Vec<String>,
    types: RwLock<Vec<Arc<SurfaceType>>>,
}

impl SurfaceTypeTable {
    /// Create a table that loads the given surface type names
    pub fn new(names: &[&str]) -> Self {
        Self {
            definitions: names.iter().map(|n| (*n).to_string()).collect(),
            types: RwLock::new(Vec::new()),
        }
    }

    /// Number of loaded surface types
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Whether no surface type is loaded
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl SurfaceTypeRegistry for SurfaceTypeTable {
    fn by_name(&self, name: &str, why: &str) -> Option<Arc<SurfaceType>> {
        let found = self
            .types
            .read()
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned();
        if found.is_none() {
            log::warn!("Unknown surface type \"{}\" requested by {}", name, why);
        }
        found
    }

    fn load_surface_types(&self) {
        let mut types = self.types.write();
        if !types.is_empty() {
            return;
        }
        for (index, name) in self.definitions.iter().enumerate() {
            types.push(Arc::new(SurfaceType {
                id: u32::try_from(index + 1).unwrap_or(u32::MAX),
                name: name.clone(),
            }));
        }
        log::debug!("Loaded {} surface types", types.len());
    }

    fn remove_all(&self) {
        self.types.write().clear();
    }
}

/// Receives material lifecycle notifications
pub trait MaterialListener: Send + Sync {
    /// A material finished building
    fn on_create_material(&self, _material: &MaterialRef) {}

    /// A material is about to be unregistered for deletion
    fn on_delete_material(&self, _material: &MaterialRef) {}
}

/// Owner of geometry instances that reference materials
pub trait GeometryRefresher: Send + Sync {
    /// Reload geometry using the material so it picks up a fresh load
    fn refresh_users_of(&self, material: &MaterialRef);

    /// Switch geometry away from a material that no longer exists
    fn detach_users_of(&self, material: &MaterialRef);

    /// Reload geometry that fell back to the default material
    fn refresh_default_users(&self);
}

/// Collaborators of a [`MaterialManager`](crate::MaterialManager)
#[derive(Clone)]
pub struct Services {
    /// Descriptor parser
    pub documents: Arc<dyn DocumentSource>,
    /// File existence and compilation status
    pub assets: Arc<dyn AssetSource>,
    /// Shader binding
    pub shaders: Arc<dyn ShaderService>,
    /// Surface type lookup
    pub surface_types: Arc<dyn SurfaceTypeRegistry>,
    /// Optional lifecycle listener
    pub listener: Option<Arc<dyn MaterialListener>>,
    /// Optional dependent geometry owner
    pub geometry: Option<Arc<dyn GeometryRefresher>>,
}

impl Services {
    /// Create a service bundle with an empty surface type table
    pub fn new(
        documents: Arc<dyn DocumentSource>,
        assets: Arc<dyn AssetSource>,
        shaders: Arc<dyn ShaderService>,
    ) -> Self {
        Self {
            documents,
            assets,
            shaders,
            surface_types: Arc::new(SurfaceTypeTable::default()),
            listener: None,
            geometry: None,
        }
    }

    /// Use one store as both document and asset source
    pub fn from_store<S>(store: Arc<S>, shaders: Arc<dyn ShaderService>) -> Self
    where
        S: DocumentSource + AssetSource + 'static,
    {
        Self::new(store.clone(), store, shaders)
    }

    /// Replace the surface type registry
    #[must_use]
    pub fn with_surface_types(mut self, surface_types: Arc<dyn SurfaceTypeRegistry>) -> Self {
        self.surface_types = surface_types;
        self
    }

    /// Attach a lifecycle listener
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn MaterialListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Attach a dependent geometry owner
    #[must_use]
    pub fn with_geometry(mut self, geometry: Arc<dyn GeometryRefresher>) -> Self {
        self.geometry = Some(geometry);
        self
    }
}
