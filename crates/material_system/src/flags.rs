//! Material flag sets
//!
//! Persisted flags are written to and read from descriptors; runtime flags
//! only describe how a material is owned while the process runs. Bits keep
//! their descriptor values so files written by older tools stay compatible:
//! runtime bits found in a file are simply dropped on load.

use bitflags::bitflags;

bitflags! {
    /// Flags stored in a descriptor's `MtlFlags` attribute
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        /// Render as wireframe
        const WIRE = 0x0001;
        /// Disable back-face culling
        const TWO_SIDED = 0x0002;
        /// Additive blending
        const ADDITIVE = 0x0004;
        /// Detail decal
        const DETAIL_DECAL = 0x0008;
        /// Lit material
        const LIGHTING = 0x0010;
        /// Does not cast shadows
        const NO_SHADOW = 0x0020;
        /// Compound material grouping sub-materials, has no shader of its own
        const MULTI_SUBMTL = 0x0100;
        /// Not physicalized
        const NO_PHYSICALIZE = 0x0200;
        /// Never drawn
        const NO_DRAW = 0x0400;
        /// Hidden from previews
        const NO_PREVIEW = 0x0800;
        /// Collision proxy geometry
        const COLLISION_PROXY = 0x2000;
        /// Subsurface scattering
        const SCATTER = 0x4000;
        /// Needs the forward pipeline
        const REQUIRE_FORWARD_RENDERING = 0x8000;
        /// Hidden when the owning geometry breaks
        const HIDE_ON_BREAK = 0x0002_0000;
        /// User interface material
        const UI_MATERIAL = 0x0004_0000;
        /// `GenMask` holds the 64-bit encoding
        const SHADERGEN_MASK_64BIT = 0x0008_0000;
        /// Raycast proxy geometry
        const RAYCAST_PROXY = 0x0010_0000;
        /// Requires the nearest environment cubemap
        const REQUIRE_NEAREST_CUBEMAP = 0x0020_0000;
        /// Console specific material
        const CONSOLE_MAT = 0x0040_0000;
        /// Blends with terrain
        const BLEND_TERRAIN = 0x0100_0000;
        /// Texture can be traced
        const TRACEABLE_TEXTURE = 0x0200_0000;
        /// Refractive surface
        const REFRACTIVE = 0x0400_0000;
    }
}

bitflags! {
    /// Ownership flags that are never persisted
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuntimeFlags: u32 {
        /// Referenced by a loaded level
        const ALWAYS_USED = 0x0040;
        /// Exists only inside its parent's sub-material list
        const PURE_CHILD = 0x0080;
        /// Kept alive by the registry's retention list
        const NON_REMOVABLE = 0x0001_0000;
        /// Scheduled for deletion by editing tools
        const DELETE_PENDING = 0x0080_0000;
    }
}

bitflags! {
    /// Per-layer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LayerFlags: u8 {
        /// Layer replaces the base pass instead of drawing over it
        const NO_DRAW = 0x01;
        /// Layer fades out over time
        const FADE_OUT = 0x02;
    }
}

bitflags! {
    /// Layer kinds recorded on the base material's resources
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LayerUsage: u8 {
        /// Reserved frozen layer is present
        const FROZEN = 0x01;
        /// Wet layer
        const WET = 0x02;
        /// Cloak layer
        const CLOAK = 0x04;
        /// Dynamic frozen layer
        const DYNAMIC_FROZEN = 0x08;
    }
}

bitflags! {
    /// What [`Material::copy_to`](crate::Material::copy_to) transfers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CopyFlags: u8 {
        /// Display name
        const NAME = 0x01;
        /// Flags, shader name and shader item
        const TEMPLATE = 0x02;
        /// Texture assignments of the shader resources
        const TEXTURES = 0x04;
    }
}

impl MaterialFlags {
    /// Read a raw `MtlFlags` value, keeping only persisted bits
    pub fn from_persisted(raw: u32) -> Self {
        Self::from_bits_truncate(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_bits_dropped_on_load() {
        let raw = MaterialFlags::TWO_SIDED.bits()
            | RuntimeFlags::PURE_CHILD.bits()
            | RuntimeFlags::NON_REMOVABLE.bits();
        let flags = MaterialFlags::from_persisted(raw);
        assert_eq!(flags, MaterialFlags::TWO_SIDED);
    }

    #[test]
    fn test_sets_are_disjoint() {
        assert!(MaterialFlags::all().bits() & RuntimeFlags::all().bits() == 0);
    }
}
