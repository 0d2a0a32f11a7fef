//! Descriptor to material construction
//!
//! [`MaterialBuilder`] turns a `Material` descriptor node into a material:
//! flags, shader binding, public parameters, layers and sub-materials.
//! Inline sub-materials are built recursively as pure children; referenced
//! sub-materials go back through
//! [`MaterialManager::load_or_create`](crate::MaterialManager::load_or_create).

use std::sync::Arc;

use crate::document::DocumentNode;
use crate::error::{MaterialError, MaterialResult};
use crate::flags::{LayerFlags, LayerUsage, MaterialFlags, RuntimeFlags};
use crate::manager::{LoadOptions, MaterialManager};
use crate::material::{MaterialLayer, MaterialRef, MAX_LAYER_SLOTS};
use crate::naming::NO_DRAW_NAME;
use crate::resources::{ShaderResources, TextureSlot};
use crate::shader::intersect_named_gen_bits;

/// Shader name of the reserved frozen layer
const FROZEN_LAYER_SHADER: &str = "frozenlayerwip";

/// Options for [`MaterialBuilder::build`]
#[derive(Debug, Default)]
pub struct BuildParams<'p> {
    /// Build as a pure child that is never registered
    pub force_pure_child: bool,
    /// Draw order among siblings
    pub sort_priority: u16,
    /// Re-parse into this material instead of creating one
    pub existing: Option<MaterialRef>,
    /// Caller supplied load flags, forwarded to referenced loads
    pub load_flags: u32,
    /// Material whose sub-material list the result goes into
    pub parent: Option<&'p MaterialRef>,
}

impl BuildParams<'_> {
    /// Re-parse into an existing material
    pub fn reparse(existing: MaterialRef) -> Self {
        Self {
            existing: Some(existing),
            ..Self::default()
        }
    }
}

/// Builds materials from descriptors
pub struct MaterialBuilder<'a> {
    manager: &'a MaterialManager,
}

impl<'a> MaterialBuilder<'a> {
    /// Create a builder registering into `manager`
    pub fn new(manager: &'a MaterialManager) -> Self {
        Self { manager }
    }

    /// Build a material from a `Material` node
    pub fn build(&self, name: &str, node: &DocumentNode, params: BuildParams<'_>) -> MaterialResult<MaterialRef> {
        if !node.is_tag("Material") {
            return Err(MaterialError::Corrupt(format!(
                "{name}: expected <Material>, found <{}>",
                node.tag
            )));
        }

        let flags = node
            .attr_as::<u32>("MtlFlags")
            .map(MaterialFlags::from_persisted)
            .unwrap_or_default();
        let runtime = if params.force_pure_child {
            RuntimeFlags::PURE_CHILD
        } else {
            RuntimeFlags::empty()
        };

        let material = match params.existing {
            Some(existing) => {
                existing.add_flags(flags);
                existing.add_runtime_flags(runtime);
                existing
            }
            None => self.manager.create(name, flags, runtime),
        };

        let shaders = &self.manager.services().shaders;
        let mut resources = ShaderResources::new(&material.name());
        resources.sort_priority = params.sort_priority;

        let mut shader_name = String::new();
        let mut gen_mask = 0;
        if !material.is_multi_submaterial() {
            shader_name = node.attr("Shader").unwrap_or_default().trim().to_string();

            if let Some(stored) = node.attr_as::<u64>("GenMask") {
                if material.flags().contains(MaterialFlags::SHADERGEN_MASK_64BIT) {
                    gen_mask = stored;
                } else {
                    gen_mask = shaders.remap_gen_mask(&shader_name, stored & u64::from(u32::MAX), false);
                    material.add_flags(MaterialFlags::SHADERGEN_MASK_64BIT);
                }
            }
            gen_mask = match node.attr("StringGenMask") {
                Some(mask) => shaders.mask_from_string(&shader_name, mask, gen_mask),
                None => shaders.remap_gen_mask(&shader_name, gen_mask, true),
            };

            if let Some(surface) = node.attr("SurfaceType").filter(|s| !s.is_empty()) {
                let why = format!("material {}", material.name());
                material.set_surface_type(self.manager.services().surface_types.by_name(surface, &why));
            }

            if shader_name.eq_ignore_ascii_case(NO_DRAW_NAME) {
                material.add_flags(MaterialFlags::NO_DRAW);
            }

            resources.read_from(node);
        }
        material.set_shader_name(&shader_name);
        material.set_gen_mask(gen_mask);

        let link_name = node
            .find_child("MaterialLinkName")
            .and_then(|link| link.attr("name"))
            .map(str::to_string);
        material.set_link_name(link_name);

        if let Some(public_params) = node.find_child("PublicParams") {
            resources.read_public_params(public_params);
        }

        if shader_name.is_empty() {
            material.set_resources(Arc::new(resources));
            material.set_shader_item(None);
        } else {
            self.load_material_shader(&material, &shader_name, gen_mask, resources);
        }

        if material.has_render_capability() {
            if let Some(layers) = node.find_child("MaterialLayers") {
                self.build_layers(&material, layers);
            }
        }

        if let Some(sub_materials) = node.find_child("SubMaterials") {
            self.build_sub_materials(&material, sub_materials, params.load_flags);
        }

        if let Some(parent) = params.parent {
            log::trace!("Built sub-material {} of {}", material.name(), parent.name());
        }
        if let Some(listener) = &self.manager.services().listener {
            listener.on_create_material(&material);
        }
        Ok(material)
    }

    /// Bind `shader_name` to the material; failure leaves it without render capability
    pub fn load_material_shader(
        &self,
        material: &MaterialRef,
        shader_name: &str,
        gen_mask: u64,
        resources: ShaderResources,
    ) -> bool {
        let resources = Arc::new(resources);
        material.set_resources(Arc::clone(&resources));

        let shaders = &self.manager.services().shaders;
        match shaders.load_shader_item(shader_name, false, 0, &resources, gen_mask) {
            Ok(mut item) => {
                if item.resources.is_none() {
                    item.resources = Some(resources);
                }
                material.set_shader_item(Some(item));
                true
            }
            Err(source) => {
                let err = MaterialError::ShaderBind {
                    shader: shader_name.to_string(),
                    material: material.name(),
                    source,
                };
                log::warn!("{}", err);
                material.set_shader_item(None);
                false
            }
        }
    }

    fn build_layers(&self, material: &MaterialRef, layers: &DocumentNode) {
        let mut usage = LayerUsage::empty();

        for (slot, layer) in layers
            .children()
            .iter()
            .filter(|c| c.is_tag("Layer"))
            .take(MAX_LAYER_SLOTS)
            .enumerate()
        {
            let shader_name = layer.attr("Name").unwrap_or_default().trim();
            let mut flags = LayerFlags::empty();
            if layer.attr_bool("NoDraw") == Some(true) {
                flags |= LayerFlags::NO_DRAW;
                if shader_name.eq_ignore_ascii_case(FROZEN_LAYER_SHADER) {
                    usage |= LayerUsage::FROZEN;
                }
            }
            if layer.attr_bool("FadeOut") == Some(true) {
                flags |= LayerFlags::FADE_OUT;
            }

            if shader_name.is_empty() {
                continue;
            }
            self.build_layer(slot, material, shader_name, layer.find_child("PublicParams"), flags);
        }

        if !usage.is_empty() {
            material.update_resources(|r| r.layer_usage |= usage);
        }
    }

    /// Build one layer into `slot`
    ///
    /// Rejected when the slot is taken, the shader is the no-draw sentinel or
    /// the layer has no public parameters.
    pub fn build_layer(
        &self,
        slot: usize,
        material: &MaterialRef,
        shader_name: &str,
        public_params: Option<&DocumentNode>,
        flags: LayerFlags,
    ) -> bool {
        if slot >= MAX_LAYER_SLOTS || material.layer(slot).is_some() {
            log::debug!("Layer slot {} of {} unavailable", slot, material.name());
            return false;
        }
        if shader_name.eq_ignore_ascii_case(NO_DRAW_NAME) {
            return false;
        }
        let Some(public_params) = public_params else {
            return false;
        };
        let Some(base_item) = material.shader_item() else {
            return false;
        };

        let config = self.manager.config();
        let base_resources = material.resources();
        let mut layer_resources = (*base_resources).clone();
        let diffuse = base_resources
            .texture(TextureSlot::Diffuse)
            .unwrap_or(config.replace_me_texture.as_str());
        let normals = base_resources
            .texture(TextureSlot::Normals)
            .unwrap_or(config.flat_normal_texture.as_str());
        layer_resources.set_texture(TextureSlot::Diffuse, diffuse);
        layer_resources.set_texture(TextureSlot::Normals, normals);

        let shaders = &self.manager.services().shaders;
        let Some(unmasked) = shaders.load_shader(shader_name, 0, 0) else {
            log::warn!("Layer shader {} not found for material {}", shader_name, material.name());
            return false;
        };
        let gen_mask = intersect_named_gen_bits(&base_item.shader, &unmasked);

        layer_resources.read_public_params(public_params);
        let layer_resources = Arc::new(layer_resources);

        match shaders.load_shader_item(shader_name, false, 0, &layer_resources, gen_mask) {
            Ok(mut item) => {
                if item.resources.is_none() {
                    item.resources = Some(layer_resources);
                }
                material.set_layer(slot, Some(MaterialLayer::new(flags, item)));
                true
            }
            Err(err) => {
                log::warn!("Failed to build layer {} of {}: {}", shader_name, material.name(), err);
                false
            }
        }
    }

    fn build_sub_materials(&self, material: &MaterialRef, sub_materials: &DocumentNode, load_flags: u32) {
        let count = sub_materials.child_count();
        material.set_sub_material_count(count);

        for (index, child) in sub_materials.children().iter().enumerate() {
            let sub = if child.is_tag("Material") {
                let sub_name = child.attr("Name").unwrap_or_default();
                let params = BuildParams {
                    force_pure_child: true,
                    sort_priority: u16::try_from(count - index - 1).unwrap_or(u16::MAX),
                    existing: None,
                    load_flags,
                    parent: Some(material),
                };
                match self.build(sub_name, child, params) {
                    Ok(sub) => Some(sub),
                    Err(err) => {
                        log::warn!("Sub-material {} of {}: {}", index, material.name(), err);
                        self.manager.default_material()
                    }
                }
            } else if child.is_tag("MaterialRef") {
                child
                    .attr("Name")
                    .filter(|name| !name.trim().is_empty())
                    .and_then(|name| {
                        self.manager
                            .load_or_create(name, LoadOptions::create_if_missing().with_load_flags(load_flags))
                    })
            } else {
                log::warn!("Unexpected <{}> in sub-materials of {}", child.tag, material.name());
                None
            };
            material.set_sub_material(index, sub);
        }
    }
}
