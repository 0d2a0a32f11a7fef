//! Material objects
//!
//! A [`Material`] is shared as [`MaterialRef`] between the registry, parent
//! materials and any number of geometry instances. Its state sits behind an
//! internal lock so shared materials can be renamed, re-parsed in place and
//! have layers or sub-materials attached. Accessors take the lock briefly
//! and never lock a second material while holding it.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::flags::{CopyFlags, LayerFlags, MaterialFlags, RuntimeFlags};
use crate::resources::ShaderResources;
use crate::services::SurfaceType;
use crate::shader::ShaderItem;

/// Number of layer slots per material
pub const MAX_LAYER_SLOTS: usize = 3;

/// Shared material handle
pub type MaterialRef = Arc<Material>;

/// Shader variant drawn on top of a material's base pass
#[derive(Debug, Clone)]
pub struct MaterialLayer {
    flags: LayerFlags,
    shader_item: ShaderItem,
}

impl MaterialLayer {
    /// Create a layer
    pub fn new(flags: LayerFlags, shader_item: ShaderItem) -> Self {
        Self { flags, shader_item }
    }

    /// Layer flags
    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    /// Bound layer shader
    pub fn shader_item(&self) -> &ShaderItem {
        &self.shader_item
    }

    /// Layer shader name
    pub fn shader_name(&self) -> &str {
        self.shader_item.shader_name()
    }
}

#[derive(Clone)]
struct MaterialState {
    name: String,
    flags: MaterialFlags,
    runtime: RuntimeFlags,
    shader_name: String,
    gen_mask: u64,
    resources: Arc<ShaderResources>,
    shader_item: Option<ShaderItem>,
    surface_type: Option<Arc<SurfaceType>>,
    sub_materials: Vec<Option<MaterialRef>>,
    layers: [Option<MaterialLayer>; MAX_LAYER_SLOTS],
    link_name: Option<String>,
}

/// Renderable material
pub struct Material {
    state: RwLock<MaterialState>,
}

impl Material {
    /// Create an unregistered material
    pub fn new(name: &str, flags: MaterialFlags, runtime: RuntimeFlags) -> Self {
        Self {
            state: RwLock::new(MaterialState {
                name: name.to_string(),
                flags,
                runtime,
                shader_name: String::new(),
                gen_mask: 0,
                resources: Arc::new(ShaderResources::new(name)),
                shader_item: None,
                surface_type: None,
                sub_materials: Vec::new(),
                layers: Default::default(),
                link_name: None,
            }),
        }
    }

    /// Display name
    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.state.write().name = name.to_string();
    }

    /// Persisted flags
    pub fn flags(&self) -> MaterialFlags {
        self.state.read().flags
    }

    /// Replace the persisted flags
    pub fn set_flags(&self, flags: MaterialFlags) {
        self.state.write().flags = flags;
    }

    /// Add persisted flags
    pub fn add_flags(&self, flags: MaterialFlags) {
        self.state.write().flags |= flags;
    }

    /// Runtime-only flags
    pub fn runtime_flags(&self) -> RuntimeFlags {
        self.state.read().runtime
    }

    /// Add runtime flags
    pub fn add_runtime_flags(&self, flags: RuntimeFlags) {
        self.state.write().runtime |= flags;
    }

    /// Exists only inside a parent's sub-material list
    pub fn is_pure_child(&self) -> bool {
        self.runtime_flags().contains(RuntimeFlags::PURE_CHILD)
    }

    /// Groups sub-materials and has no shader of its own
    pub fn is_multi_submaterial(&self) -> bool {
        self.flags().contains(MaterialFlags::MULTI_SUBMTL)
    }

    /// Shader name from the descriptor
    pub fn shader_name(&self) -> String {
        self.state.read().shader_name.clone()
    }

    /// Set the shader name
    pub fn set_shader_name(&self, name: &str) {
        self.state.write().shader_name = name.to_string();
    }

    /// Requested generation mask
    pub fn gen_mask(&self) -> u64 {
        self.state.read().gen_mask
    }

    /// Set the requested generation mask
    pub fn set_gen_mask(&self, mask: u64) {
        self.state.write().gen_mask = mask;
    }

    /// Bound shader, if binding succeeded
    pub fn shader_item(&self) -> Option<ShaderItem> {
        self.state.read().shader_item.clone()
    }

    /// Attach a bound shader; its resources become the material's resources
    pub fn set_shader_item(&self, item: Option<ShaderItem>) {
        let mut state = self.state.write();
        if let Some(resources) = item.as_ref().and_then(|i| i.resources.clone()) {
            state.resources = resources;
        }
        state.shader_item = item;
    }

    /// Whether a shader is bound and the material can be drawn
    pub fn has_render_capability(&self) -> bool {
        self.state.read().shader_item.is_some()
    }

    /// Shader resources
    pub fn resources(&self) -> Arc<ShaderResources> {
        Arc::clone(&self.state.read().resources)
    }

    /// Replace the shader resources
    pub fn set_resources(&self, resources: Arc<ShaderResources>) {
        self.state.write().resources = resources;
    }

    /// Modify the shader resources; the bound shader item follows the change
    pub fn update_resources(&self, update: impl FnOnce(&mut ShaderResources)) {
        let mut state = self.state.write();
        update(Arc::make_mut(&mut state.resources));
        let resources = Arc::clone(&state.resources);
        if let Some(item) = state.shader_item.as_mut() {
            item.resources = Some(resources);
        }
    }

    /// Surface type
    pub fn surface_type(&self) -> Option<Arc<SurfaceType>> {
        self.state.read().surface_type.clone()
    }

    /// Set the surface type
    pub fn set_surface_type(&self, surface_type: Option<Arc<SurfaceType>>) {
        self.state.write().surface_type = surface_type;
    }

    /// Number of sub-material slots
    pub fn sub_material_count(&self) -> usize {
        self.state.read().sub_materials.len()
    }

    /// Resize the sub-material slots; new slots are empty
    pub fn set_sub_material_count(&self, count: usize) {
        self.state.write().sub_materials.resize(count, None);
    }

    /// Sub-material in a slot
    pub fn sub_material(&self, slot: usize) -> Option<MaterialRef> {
        self.state.read().sub_materials.get(slot).cloned().flatten()
    }

    /// Fill a slot; out of range slots are ignored
    pub fn set_sub_material(&self, slot: usize, material: Option<MaterialRef>) {
        let mut state = self.state.write();
        if let Some(entry) = state.sub_materials.get_mut(slot) {
            *entry = material;
            return;
        }
        log::warn!("Sub-material slot {} out of range for material {}", slot, state.name);
    }

    /// Snapshot of all sub-material slots
    pub fn sub_materials(&self) -> Vec<Option<MaterialRef>> {
        self.state.read().sub_materials.clone()
    }

    /// Layer in a slot
    pub fn layer(&self, slot: usize) -> Option<MaterialLayer> {
        self.state.read().layers.get(slot).cloned().flatten()
    }

    /// Fill a layer slot; out of range slots are ignored
    pub fn set_layer(&self, slot: usize, layer: Option<MaterialLayer>) {
        if let Some(entry) = self.state.write().layers.get_mut(slot) {
            *entry = layer;
        }
    }

    /// Number of occupied layer slots
    pub fn layer_count(&self) -> usize {
        self.state.read().layers.iter().flatten().count()
    }

    /// Alias hint consumed by geometry code
    pub fn link_name(&self) -> Option<String> {
        self.state.read().link_name.clone()
    }

    /// Set the alias hint
    pub fn set_link_name(&self, link_name: Option<String>) {
        self.state.write().link_name = link_name;
    }

    /// Copy of this material with its own shader resources
    ///
    /// Sub-material slots are shared with the source. The copy is never
    /// non-removable and is not registered anywhere.
    pub fn deep_clone(&self) -> MaterialRef {
        let mut state = self.state.read().clone();
        state.runtime.remove(RuntimeFlags::NON_REMOVABLE);

        let resources = Arc::new((*state.resources).clone());
        if let Some(item) = state.shader_item.as_mut() {
            item.resources = Some(Arc::clone(&resources));
        }
        state.resources = resources;

        Arc::new(Self {
            state: RwLock::new(state),
        })
    }

    /// Copy selected parts of this material onto `dst`
    pub fn copy_to(&self, dst: &Self, what: CopyFlags) {
        if std::ptr::eq(self, dst) {
            return;
        }
        let src = self.state.read().clone();
        let mut dst = dst.state.write();

        if what.contains(CopyFlags::NAME) {
            dst.name = src.name;
        }
        if what.contains(CopyFlags::TEMPLATE) {
            dst.flags = src.flags;
            dst.shader_name = src.shader_name;
            dst.gen_mask = src.gen_mask;
            dst.shader_item = src.shader_item;
            dst.surface_type = src.surface_type;
            dst.link_name = src.link_name;
            dst.resources = Arc::clone(&src.resources);
        }
        if what.contains(CopyFlags::TEXTURES) {
            let textures = src.resources.textures.clone();
            Arc::make_mut(&mut dst.resources).textures = textures;
            let resources = Arc::clone(&dst.resources);
            if let Some(item) = dst.shader_item.as_mut() {
                item.resources = Some(resources);
            }
        }
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Material")
            .field("name", &state.name)
            .field("flags", &state.flags)
            .field("runtime", &state.runtime)
            .field("shader", &state.shader_name)
            .field("sub_materials", &state.sub_materials.len())
            .finish_non_exhaustive()
    }
}
