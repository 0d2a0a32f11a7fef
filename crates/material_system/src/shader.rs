//! Shader service interface
//!
//! The material system never compiles shaders itself. It asks a
//! [`ShaderService`] to turn a shader name, a set of resources and a
//! generation mask into a bound [`ShaderItem`]. [`HeadlessShaderService`]
//! implements the interface without a GPU for tools and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::naming::NO_DRAW_NAME;
use crate::resources::ShaderResources;

/// Shader service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// No shader with that name
    #[error("Shader not found: {0}")]
    NotFound(String),

    /// The shader exists but the requested permutation failed to build
    #[error("Shader compilation failed: {0}")]
    Compile(String),
}

/// One named generation toggle of a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderGenBit {
    /// Parameter name, shared across shaders
    pub param_name: String,
    /// Bit position(s) in this shader's generation mask
    pub mask: u64,
}

impl ShaderGenBit {
    /// Create a generation bit
    pub fn new(param_name: impl Into<String>, mask: u64) -> Self {
        Self {
            param_name: param_name.into(),
            mask,
        }
    }
}

/// A loaded shader permutation
#[derive(Debug, Clone)]
pub struct Shader {
    name: String,
    gen_mask: u64,
    gen_bits: Vec<ShaderGenBit>,
}

impl Shader {
    /// Create a shader description
    pub fn new(name: impl Into<String>, gen_mask: u64, gen_bits: Vec<ShaderGenBit>) -> Self {
        Self {
            name: name.into(),
            gen_mask,
            gen_bits,
        }
    }

    /// Shader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active generation mask of this permutation
    pub fn gen_mask(&self) -> u64 {
        self.gen_mask
    }

    /// Named generation toggles the shader understands
    pub fn gen_bits(&self) -> &[ShaderGenBit] {
        &self.gen_bits
    }

    /// Whether the named toggle is active in this permutation
    pub fn has_active_bit(&self, param_name: &str) -> bool {
        self.gen_bits
            .iter()
            .any(|bit| bit.param_name.eq_ignore_ascii_case(param_name) && self.gen_mask & bit.mask != 0)
    }
}

/// A shader bound to the resources it renders with
#[derive(Debug, Clone)]
pub struct ShaderItem {
    /// Bound shader permutation
    pub shader: Arc<Shader>,
    /// Resources the shader was bound with
    pub resources: Option<Arc<ShaderResources>>,
}

impl ShaderItem {
    /// Bind a shader to resources
    pub fn new(shader: Arc<Shader>, resources: Option<Arc<ShaderResources>>) -> Self {
        Self { shader, resources }
    }

    /// Name of the bound shader
    pub fn shader_name(&self) -> &str {
        self.shader.name()
    }
}

/// Renderer side of shader binding
pub trait ShaderService: Send + Sync {
    /// Load a shader permutation and bind it to `resources`
    fn load_shader_item(
        &self,
        name: &str,
        force_generic: bool,
        flags: u32,
        resources: &Arc<ShaderResources>,
        gen_mask: u64,
    ) -> Result<ShaderItem, ShaderError>;

    /// Load a shader permutation without resources
    fn load_shader(&self, name: &str, flags: u32, gen_mask: u64) -> Option<Arc<Shader>>;

    /// Translate a stored generation mask into the current bit layout
    ///
    /// `is_64bit` is false for masks written with the legacy 32-bit encoding.
    fn remap_gen_mask(&self, _shader_name: &str, mask: u64, _is_64bit: bool) -> u64 {
        mask
    }

    /// Build a generation mask from `%NAME%NAME` tokens
    fn mask_from_string(&self, shader_name: &str, mask: &str, fallback: u64) -> u64;
}

/// Bits of `layer` whose parameter is active in `base`
///
/// Bit positions are shader specific, so toggles are matched by name.
pub fn intersect_named_gen_bits(base: &Shader, layer: &Shader) -> u64 {
    layer
        .gen_bits()
        .iter()
        .filter(|bit| base.has_active_bit(&bit.param_name))
        .fold(0, |mask, bit| mask | bit.mask)
}

/// GPU-less shader service with a fixed table of shader definitions
pub struct HeadlessShaderService {
    definitions: RwLock<HashMap<String, Vec<ShaderGenBit>>>,
    items_loaded: AtomicUsize,
}

impl HeadlessShaderService {
    /// Create a service knowing the engine's built-in shaders
    pub fn new() -> Self {
        let service = Self::empty();
        for name in ["Illum", "Terrain.Layer", "Helper", NO_DRAW_NAME] {
            service.register(name, &[]);
        }
        service
    }

    /// Create a service with no shaders at all
    pub fn empty() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            items_loaded: AtomicUsize::new(0),
        }
    }

    /// Register a shader and its named generation toggles
    pub fn register(&self, name: &str, gen_bits: &[(&str, u64)]) {
        let bits = gen_bits
            .iter()
            .map(|(param, mask)| ShaderGenBit::new(*param, *mask))
            .collect();
        self.definitions.write().insert(name.to_lowercase(), bits);
    }

    /// Number of shader items bound so far
    pub fn items_loaded(&self) -> usize {
        self.items_loaded.load(Ordering::SeqCst)
    }

    fn build(&self, name: &str, gen_mask: u64) -> Option<Arc<Shader>> {
        let definitions = self.definitions.read();
        let bits = definitions.get(&name.to_lowercase())?;
        let known = bits.iter().fold(0, |mask, bit| mask | bit.mask);
        Some(Arc::new(Shader::new(name, gen_mask & known, bits.clone())))
    }
}

impl Default for HeadlessShaderService {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderService for HeadlessShaderService {
    fn load_shader_item(
        &self,
        name: &str,
        _force_generic: bool,
        flags: u32,
        resources: &Arc<ShaderResources>,
        gen_mask: u64,
    ) -> Result<ShaderItem, ShaderError> {
        let shader = self
            .load_shader(name, flags, gen_mask)
            .ok_or_else(|| ShaderError::NotFound(name.to_string()))?;
        self.items_loaded.fetch_add(1, Ordering::SeqCst);
        Ok(ShaderItem::new(shader, Some(Arc::clone(resources))))
    }

    fn load_shader(&self, name: &str, _flags: u32, gen_mask: u64) -> Option<Arc<Shader>> {
        self.build(name, gen_mask)
    }

    fn mask_from_string(&self, shader_name: &str, mask: &str, fallback: u64) -> u64 {
        let definitions = self.definitions.read();
        let Some(bits) = definitions.get(&shader_name.to_lowercase()) else {
            return fallback;
        };

        mask.split('%')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .fold(0, |acc, token| {
                match bits.iter().find(|bit| bit.param_name.eq_ignore_ascii_case(token)) {
                    Some(bit) => acc | bit.mask,
                    None => {
                        log::debug!("Shader {} has no generation bit {}", shader_name, token);
                        acc
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> HeadlessShaderService {
        let service = HeadlessShaderService::new();
        service.register("Illum", &[("DETAIL_MAPPING", 0x1), ("ALPHAGLOW", 0x2), ("VERTCOLORS", 0x4)]);
        service.register("FrozenLayerWIP", &[("VERTCOLORS", 0x10), ("DETAIL_MAPPING", 0x40)]);
        service
    }

    #[test]
    fn test_named_bit_intersection() {
        let service = service();
        let base = service.load_shader("Illum", 0, 0x1 | 0x4).unwrap();
        let layer = service.load_shader("FrozenLayerWIP", 0, 0).unwrap();

        assert_eq!(intersect_named_gen_bits(&base, &layer), 0x10 | 0x40);

        let base = service.load_shader("Illum", 0, 0x2).unwrap();
        assert_eq!(intersect_named_gen_bits(&base, &layer), 0);
    }

    #[test]
    fn test_mask_from_string() {
        let service = service();
        assert_eq!(service.mask_from_string("Illum", "%ALPHAGLOW%VERTCOLORS", 0), 0x6);
        assert_eq!(service.mask_from_string("Illum", "%UNKNOWN", 0), 0);
        assert_eq!(service.mask_from_string("Missing", "%ALPHAGLOW", 9), 9);
    }

    #[test]
    fn test_unknown_shader() {
        let service = service();
        let resources = Arc::new(ShaderResources::default());
        assert!(service.load_shader("Glass", 0, 0).is_none());
        assert_eq!(
            service.load_shader_item("Glass", false, 0, &resources, 0).unwrap_err(),
            ShaderError::NotFound("Glass".into())
        );
        assert_eq!(service.items_loaded(), 0);
    }

    #[test]
    fn test_item_keeps_resources() {
        let service = service();
        let resources = Arc::new(ShaderResources::default());
        let item = service.load_shader_item("illum", false, 0, &resources, 0xff).unwrap();
        assert!(Arc::ptr_eq(item.resources.as_ref().unwrap(), &resources));
        assert_eq!(item.shader.gen_mask(), 0x7);
        assert_eq!(service.items_loaded(), 1);
    }
}
