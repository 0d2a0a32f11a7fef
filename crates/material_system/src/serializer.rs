//! Material to descriptor
//!
//! The inverse of [`MaterialBuilder`](crate::MaterialBuilder). Only persisted
//! flags are written. Pure-child sub-materials are written inline, shared
//! ones as name references.

use crate::document::DocumentNode;
use crate::flags::{LayerFlags, MaterialFlags};
use crate::material::{Material, MAX_LAYER_SLOTS};

/// Writes materials as descriptor nodes
pub struct MaterialSerializer;

impl MaterialSerializer {
    /// Descriptor for a material
    pub fn save(material: &Material) -> DocumentNode {
        let mut node = DocumentNode::new("Material");
        Self::save_into(&mut node, material);
        node
    }

    /// Write a material onto an existing node
    pub fn save_into(node: &mut DocumentNode, material: &Material) {
        let mut flags = material.flags();
        let shader_item = material.shader_item();
        if shader_item.is_some() {
            flags |= MaterialFlags::SHADERGEN_MASK_64BIT;
        }
        node.set_attr("MtlFlags", flags.bits());

        let resources = material.resources();
        if !material.is_multi_submaterial() {
            node.set_attr("Shader", material.shader_name());
            let gen_mask = shader_item
                .as_ref()
                .map_or_else(|| material.gen_mask(), |item| item.shader.gen_mask());
            node.set_attr("GenMask", gen_mask);
            if let Some(surface_type) = material.surface_type() {
                node.set_attr("SurfaceType", &surface_type.name);
            }
            resources.write_to(node);
        }

        if let Some(link_name) = material.link_name() {
            node.new_child("MaterialLinkName").set_attr("name", link_name);
        }

        let sub_materials = material.sub_materials();
        if !sub_materials.is_empty() {
            let list = node.new_child("SubMaterials");
            for sub in &sub_materials {
                match sub {
                    Some(sub) if sub.is_pure_child() => {
                        let child = list.new_child("Material");
                        child.set_attr("Name", sub.name());
                        Self::save_into(child, sub);
                    }
                    Some(sub) => {
                        list.new_child("MaterialRef").set_attr("Name", sub.name());
                    }
                    None => {
                        list.new_child("MaterialRef");
                    }
                }
            }
        }

        if !resources.params.is_empty() {
            resources.write_public_params(node.new_child("PublicParams"));
        }

        let layers: Vec<_> = (0..MAX_LAYER_SLOTS).map(|slot| material.layer(slot)).collect();
        let has_layers = layers
            .iter()
            .flatten()
            .any(|layer| !layer.shader_name().is_empty());
        if has_layers {
            let list = node.new_child("MaterialLayers");
            for layer in &layers {
                let entry = list.new_child("Layer");
                let Some(layer) = layer else {
                    continue;
                };
                entry.set_attr("Name", layer.shader_name());
                entry.set_attr("NoDraw", u8::from(layer.flags().contains(LayerFlags::NO_DRAW)));
                entry.set_attr("FadeOut", u8::from(layer.flags().contains(LayerFlags::FADE_OUT)));

                let params = entry.new_child("PublicParams");
                if let Some(layer_resources) = &layer.shader_item().resources {
                    layer_resources.write_public_params(params);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::RuntimeFlags;

    #[test]
    fn test_multi_material_has_no_shader_attributes() {
        let material = Material::new("multi", MaterialFlags::MULTI_SUBMTL, RuntimeFlags::empty());
        material.set_sub_material_count(1);

        let node = MaterialSerializer::save(&material);
        assert_eq!(node.attr_as::<u32>("MtlFlags"), Some(MaterialFlags::MULTI_SUBMTL.bits()));
        assert!(!node.has_attr("Shader"));
        assert!(!node.has_attr("Diffuse"));

        let subs = node.find_child("SubMaterials").unwrap();
        assert_eq!(subs.child_count(), 1);
        assert!(subs.child(0).unwrap().is_tag("MaterialRef"));
        assert!(!subs.child(0).unwrap().has_attr("Name"));
    }

    #[test]
    fn test_runtime_flags_not_written() {
        let material = Material::new(
            "kept",
            MaterialFlags::TWO_SIDED,
            RuntimeFlags::NON_REMOVABLE | RuntimeFlags::ALWAYS_USED,
        );
        let node = MaterialSerializer::save(&material);
        assert_eq!(node.attr_as::<u32>("MtlFlags"), Some(MaterialFlags::TWO_SIDED.bits()));
        assert!(node.find_child("MaterialLayers").is_none());
        assert!(node.find_child("PublicParams").is_none());
    }
}
