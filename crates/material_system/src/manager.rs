//! Material manager
//!
//! Public entry point of the material system. Resolves names to materials,
//! loading each name at most once no matter how many threads ask for it at
//! the same time, and keeps the registry consistent through renames,
//! unregistration, hot reload and shutdown.

use std::sync::Arc;
use std::time::Instant;

use crate::builder::{BuildParams, MaterialBuilder};
use crate::config::MaterialConfig;
use crate::defaults::{DefaultMaterials, DefaultsInitializer};
use crate::document::DocumentNode;
use crate::error::{MaterialError, MaterialResult};
use crate::flags::{CopyFlags, MaterialFlags, RuntimeFlags};
use crate::gate::LoadTicket;
use crate::material::{Material, MaterialRef};
use crate::naming::{material_file_name, resolve_geometry_material, unify_name, MATERIAL_EXTENSION};
use crate::registry::{Claim, MaterialRegistry};
use crate::resources::{ShaderResources, TextureSlot};
use crate::services::{AssetStatus, Services};

/// Placeholder shader used while an asset compiles
const PLACEHOLDER_SHADER: &str = "Illum";

/// How [`MaterialManager::load_or_create`] treats a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Return the default material when nothing could be loaded
    pub create_if_missing: bool,
    /// Keep the result alive until shutdown
    pub keep_alive: bool,
    /// Caller defined flags forwarded to nested loads
    pub load_flags: u32,
}

impl LoadOptions {
    /// Fall back to the default material
    pub fn create_if_missing() -> Self {
        Self {
            create_if_missing: true,
            ..Self::default()
        }
    }

    /// Keep the result alive until shutdown
    pub fn keep_alive() -> Self {
        Self {
            keep_alive: true,
            ..Self::default()
        }
    }

    /// Set the forwarded load flags
    #[must_use]
    pub fn with_load_flags(mut self, load_flags: u32) -> Self {
        self.load_flags = load_flags;
        self
    }
}

/// Name-keyed material cache and loader
pub struct MaterialManager {
    registry: MaterialRegistry,
    services: Services,
    config: MaterialConfig,
    defaults: DefaultsInitializer,
}

impl MaterialManager {
    /// Create a manager; defaults are built on first use
    pub fn new(services: Services, config: MaterialConfig) -> Self {
        Self {
            registry: MaterialRegistry::new(),
            services,
            config,
            defaults: DefaultsInitializer::new(),
        }
    }

    /// Manager settings
    pub fn config(&self) -> &MaterialConfig {
        &self.config
    }

    /// Collaborators
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Underlying registry
    pub fn registry(&self) -> &MaterialRegistry {
        &self.registry
    }

    /// Build the default materials now instead of on first use
    pub fn init_defaults(&self) {
        self.defaults.ensure(self);
    }

    /// Snapshot of the default materials
    pub fn defaults(&self) -> DefaultMaterials {
        self.defaults.ensure(self);
        self.defaults.materials()
    }

    /// Replace-me material
    pub fn default_material(&self) -> Option<MaterialRef> {
        self.defaults().default
    }

    /// Shared material layers
    pub fn default_layers_material(&self) -> Option<MaterialRef> {
        self.defaults().layers
    }

    /// Editor helper material
    pub fn default_helper_material(&self) -> Option<MaterialRef> {
        self.defaults().helper
    }

    /// Terrain layer fallback
    pub fn default_terrain_layer_material(&self) -> Option<MaterialRef> {
        self.defaults().terrain_layer
    }

    /// Registered no-draw sentinel
    pub fn no_draw_material(&self) -> Option<MaterialRef> {
        self.defaults().no_draw
    }

    /// Create and register an empty material
    ///
    /// Pure children are not registered; non-removable materials are
    /// retained until shutdown.
    pub fn create(&self, name: &str, flags: MaterialFlags, runtime: RuntimeFlags) -> MaterialRef {
        let unified = unify_name(name);
        let material = Arc::new(Material::new(&unified, flags, runtime));

        if !runtime.contains(RuntimeFlags::PURE_CHILD) {
            self.registry.insert(&unified, Arc::clone(&material));
        }
        if runtime.contains(RuntimeFlags::NON_REMOVABLE) {
            self.registry.retain(Arc::clone(&material));
        }
        material
    }

    /// Registered material; never loads
    pub fn find(&self, name: &str) -> Option<MaterialRef> {
        self.registry.get(&unify_name(name))
    }

    /// Resolve a name to a material, loading it if needed
    ///
    /// Concurrent requests for one name share a single load. Returns `None`
    /// only when nothing could be loaded and `create_if_missing` is unset.
    pub fn load_or_create(&self, name: &str, options: LoadOptions) -> Option<MaterialRef> {
        self.defaults.ensure(self);

        if self.config.always_use_default {
            if let Some(default) = self.defaults.materials().default {
                return Some(default);
            }
        }

        let unified = unify_name(name);
        let material = self.load_unified(&unified, options.load_flags);
        let material = match material {
            Some(material) => material,
            None if options.create_if_missing => self.defaults.materials().default?,
            None => return None,
        };

        if options.keep_alive {
            self.registry.retain(Arc::clone(&material));
        }
        Some(material)
    }

    fn load_unified(&self, unified: &str, load_flags: u32) -> Option<MaterialRef> {
        match self.registry.claim(unified) {
            Claim::Cached(material) => Some(material),
            Claim::Wait(gate) => {
                if gate.is_owned_by_current_thread() {
                    log::warn!("{}", MaterialError::Cycle(unified.to_string()));
                    return None;
                }
                gate.wait_with_diagnostics(unified, self.config.stall_warning_interval());
                let material = self.registry.get(unified);
                if material.is_none() {
                    log::debug!("Material {} not found after waiting for its load", unified);
                }
                material
            }
            Claim::Owner(ticket) => self.load_owned(unified, &ticket, load_flags),
        }
    }

    /// Finish a load this thread owns; dropping `ticket` releases waiters
    fn load_owned(&self, unified: &str, ticket: &LoadTicket, load_flags: u32) -> Option<MaterialRef> {
        match self.load_descriptor(unified, load_flags) {
            Ok(material) => Some(material),
            Err(err) if err.is_transient() => {
                log::info!("{}; using placeholder", err);
                Some(self.create_placeholder(unified))
            }
            Err(err) => {
                log::warn!("{}", err);
                self.registry.abandon_load(unified, ticket.gate());
                None
            }
        }
    }

    fn load_descriptor(&self, unified: &str, load_flags: u32) -> MaterialResult<MaterialRef> {
        let file = material_file_name(unified);
        let assets = &self.services.assets;

        if !assets.exists(&file) {
            match assets.asset_status(&file) {
                AssetStatus::Queued | AssetStatus::Compiling => {
                    return Err(MaterialError::Unavailable(file));
                }
                AssetStatus::Compiled if assets.exists(&file) => {}
                _ => return Err(MaterialError::NotFound(file)),
            }
        }

        let node = self
            .services
            .documents
            .parse(&file)
            .ok_or_else(|| MaterialError::Corrupt(file.clone()))?;

        let params = BuildParams {
            load_flags,
            ..BuildParams::default()
        };
        MaterialBuilder::new(self).build(unified, &node, params)
    }

    /// Flat white material registered while the real asset compiles
    fn create_placeholder(&self, unified: &str) -> MaterialRef {
        let material = self.create(unified, MaterialFlags::empty(), RuntimeFlags::empty());
        let mut resources = ShaderResources::new(unified);
        resources.set_texture(TextureSlot::Diffuse, &self.config.placeholder_texture);

        material.set_shader_name(PLACEHOLDER_SHADER);
        MaterialBuilder::new(self).load_material_shader(&material, PLACEHOLDER_SHADER, 0, resources);
        material
    }

    /// Build from an in-memory descriptor
    ///
    /// A material already registered under the name is re-parsed in place.
    pub fn load_from_document(&self, name: &str, node: &DocumentNode) -> Option<MaterialRef> {
        self.defaults.ensure(self);

        let params = BuildParams {
            existing: self.find(name),
            ..BuildParams::default()
        };
        match MaterialBuilder::new(self).build(name, node, params) {
            Ok(material) => Some(material),
            Err(err) => {
                log::warn!("{}", err);
                None
            }
        }
    }

    /// Register `material` under a new name
    pub fn rename(&self, material: &MaterialRef, new_name: &str) {
        let new_unified = unify_name(new_name);
        if material.is_pure_child() {
            material.set_name(&new_unified);
        } else {
            let old_unified = unify_name(&material.name());
            self.registry.rename(&old_unified, &new_unified, material);
        }
    }

    /// Remove a material from lookup
    ///
    /// With `notify` the listener hears about the deletion first.
    pub fn unregister(&self, material: &MaterialRef, notify: bool) {
        if notify {
            if let Some(listener) = &self.services.listener {
                listener.on_delete_material(material);
            }
        }
        if material.is_pure_child() {
            return;
        }
        let unified = unify_name(&material.name());
        if !self.registry.remove(&unified, material) {
            log::debug!("Material {} is not the registered instance", unified);
        }
    }

    /// Snapshot of all registered materials
    pub fn list_all(&self) -> Vec<MaterialRef> {
        self.registry.snapshot()
    }

    /// Snapshot of the retention list
    pub fn retained(&self) -> Vec<MaterialRef> {
        self.registry.retained()
    }

    /// Release everything the manager holds; it can be used again afterwards
    pub fn shutdown(&self) {
        self.registry.clear();
        self.defaults.reset();
        self.services.surface_types.remove_all();
        log::info!("Material manager shut down");
    }

    /// Copy of a material with its own resources
    ///
    /// For a multi-material, `sub_index` selects the one sub-material to
    /// copy while the others are shared; `None` copies all of them.
    pub fn clone_material(&self, src: &MaterialRef, sub_index: Option<usize>) -> MaterialRef {
        self.clone_with(src, |index, _| sub_index.map_or(true, |selected| selected == index))
    }

    /// Like [`clone_material`](Self::clone_material) selecting the copied
    /// sub-material by name
    pub fn clone_multi_material(&self, src: &MaterialRef, sub_name: Option<&str>) -> MaterialRef {
        self.clone_with(src, |_, sub| {
            sub_name.map_or(true, |name| sub.name().eq_ignore_ascii_case(name))
        })
    }

    fn clone_with(&self, src: &MaterialRef, copy_slot: impl Fn(usize, &MaterialRef) -> bool) -> MaterialRef {
        let copy = src.deep_clone();
        if src.is_multi_submaterial() {
            for (index, sub) in src.sub_materials().into_iter().enumerate() {
                let sub = sub.map(|sub| {
                    if copy_slot(index, &sub) {
                        sub.deep_clone()
                    } else {
                        sub
                    }
                });
                copy.set_sub_material(index, sub);
            }
        }
        log::debug!("Cloned material {}", src.name());
        copy
    }

    /// Copy selected parts of one material onto another
    pub fn copy_material(&self, src: &MaterialRef, dst: &MaterialRef, what: CopyFlags) {
        src.copy_to(dst, what);
    }

    /// Load a material referenced by a geometry file
    ///
    /// Bare names resolve next to the geometry file.
    pub fn load_geometry_material(
        &self,
        material_name: &str,
        geometry_path: &str,
        load_flags: u32,
    ) -> Option<MaterialRef> {
        let resolved = resolve_geometry_material(material_name, geometry_path);
        self.load_or_create(&resolved, LoadOptions::create_if_missing().with_load_flags(load_flags))
    }

    /// Load every material in a level's resource list and keep it alive
    pub fn preload_level_materials<S: AsRef<str>>(&self, resources: &[S]) -> usize {
        let materials: Vec<&str> = resources
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| has_material_extension(path))
            .collect();
        self.preload("level", &materials)
    }

    /// Load every material in the decals folder and keep it alive
    pub fn preload_decal_materials(&self) -> usize {
        let decals = self.services.assets.enumerate(&self.config.decals_folder, "mtl");
        let decals: Vec<&str> = decals.iter().map(String::as_str).collect();
        self.preload("decal", &decals)
    }

    fn preload(&self, what: &str, paths: &[&str]) -> usize {
        let started = Instant::now();
        let loaded = paths
            .iter()
            .filter(|path| self.load_or_create(path, LoadOptions::keep_alive()).is_some())
            .count();

        log::info!(
            "Preloaded {}/{} {} materials in {:.2}s",
            loaded,
            paths.len(),
            what,
            started.elapsed().as_secs_f32()
        );
        loaded
    }

    /// Numeric surface type id; 0 when unknown
    pub fn surface_type_id(&self, name: &str, why: &str) -> u32 {
        self.services
            .surface_types
            .by_name(name, why)
            .map_or(0, |surface| surface.id)
    }

    /// A material descriptor changed on disk
    ///
    /// The registered material is dropped so the next request loads it
    /// fresh, and its users are refreshed. Returns `false` for files that
    /// are not material descriptors.
    pub fn on_file_changed(&self, path: &str) -> bool {
        if !has_material_extension(path) {
            return false;
        }

        match self.find(path) {
            Some(material) => {
                log::info!("Reloading material {}", material.name());
                self.unregister(&material, false);
                if let Some(geometry) = &self.services.geometry {
                    geometry.refresh_users_of(&material);
                }
            }
            None => {
                if let Some(geometry) = &self.services.geometry {
                    geometry.refresh_default_users();
                }
            }
        }
        true
    }

    /// A material descriptor was deleted
    pub fn on_file_removed(&self, path: &str) -> bool {
        if !has_material_extension(path) {
            return false;
        }

        if let Some(material) = self.find(path) {
            log::info!("Material {} removed", material.name());
            self.unregister(&material, true);
            if let Some(geometry) = &self.services.geometry {
                geometry.detach_users_of(&material);
            }
        }
        true
    }
}

fn has_material_extension(path: &str) -> bool {
    path.trim().to_ascii_lowercase().ends_with(MATERIAL_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocumentStore;
    use crate::shader::HeadlessShaderService;

    fn manager() -> (Arc<MemoryDocumentStore>, MaterialManager) {
        crate::logging::init_for_tests();
        let store = Arc::new(MemoryDocumentStore::new());
        let services = Services::from_store(Arc::clone(&store), Arc::new(HeadlessShaderService::new()));
        (store, MaterialManager::new(services, MaterialConfig::default()))
    }

    fn illum() -> DocumentNode {
        DocumentNode::new("Material").with_attr("Shader", "Illum")
    }

    #[test]
    fn test_find_returns_loaded_instance() {
        let (store, manager) = manager();
        store.insert("materials/rock.mtl", illum());

        let loaded = manager.load_or_create("Materials\\Rock", LoadOptions::default()).unwrap();
        let found = manager.find("materials/rock.mtl").unwrap();
        assert!(Arc::ptr_eq(&loaded, &found));
        assert!(loaded.has_render_capability());
    }

    #[test]
    fn test_missing_without_fallback() {
        let (_, manager) = manager();
        assert!(manager.load_or_create("materials/none", LoadOptions::default()).is_none());
        assert!(manager.registry().pending_gate("materials/none").is_none());

        let fallback = manager.load_or_create("materials/none", LoadOptions::create_if_missing()).unwrap();
        assert!(Arc::ptr_eq(&fallback, &manager.default_material().unwrap()));
        assert!(manager.find("materials/none").is_none());
    }

    #[test]
    fn test_corrupt_descriptor_is_terminal() {
        let (store, manager) = manager();
        store.insert("materials/odd.mtl", DocumentNode::new("Texture"));

        assert!(manager.load_or_create("materials/odd", LoadOptions::default()).is_none());
        assert!(manager.registry().pending_gate("materials/odd").is_none());
    }

    #[test]
    fn test_create_pure_child_not_registered() {
        let (_, manager) = manager();
        let child = manager.create("child", MaterialFlags::empty(), RuntimeFlags::PURE_CHILD);
        assert!(manager.find("child").is_none());

        let kept = manager.create("kept", MaterialFlags::empty(), RuntimeFlags::NON_REMOVABLE);
        assert!(manager.find("kept").is_some());
        assert!(manager.retained().iter().any(|m| Arc::ptr_eq(m, &kept)));
        assert!(!manager.retained().iter().any(|m| Arc::ptr_eq(m, &child)));
    }

    #[test]
    fn test_always_use_default() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert("materials/rock.mtl", illum());
        let services = Services::from_store(Arc::clone(&store), Arc::new(HeadlessShaderService::new()));
        let config = MaterialConfig {
            always_use_default: true,
            ..MaterialConfig::default()
        };
        let manager = MaterialManager::new(services, config);

        let material = manager.load_or_create("materials/rock", LoadOptions::default()).unwrap();
        assert!(Arc::ptr_eq(&material, &manager.default_material().unwrap()));
    }

    #[test]
    fn test_no_draw_sentinel_resolves() {
        let (_, manager) = manager();
        let sentinel = manager.no_draw_material().unwrap();
        let loaded = manager.load_or_create("NoDraw", LoadOptions::default()).unwrap();

        assert!(Arc::ptr_eq(&sentinel, &loaded));
        assert!(loaded.flags().contains(MaterialFlags::NO_DRAW));
        assert!(manager.registry().pending_gate("nodraw").unwrap().is_set());
    }

    #[test]
    fn test_material_extension_check() {
        assert!(has_material_extension("materials/rock.MTL"));
        assert!(!has_material_extension("textures/rock.dds"));
        assert!(!has_material_extension("tl"));
    }
}
