//! Shader-side material data
//!
//! [`ShaderResources`] holds everything a shader is bound with: lighting
//! coefficients, texture assignments, public shader parameters and the
//! vertex deformation. It reads and writes its own part of a descriptor.

use std::collections::BTreeMap;

use nalgebra::Vector4;

use crate::document::DocumentNode;
use crate::error::{MaterialError, MaterialResult};
use crate::flags::LayerUsage;
use crate::naming::has_drive_letter;

/// Texture slot of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureSlot {
    /// Base colour
    Diffuse,
    /// Tangent space normal map
    Normals,
    /// Specular colour
    Specular,
    /// Environment cubemap
    Environment,
    /// Detail overlay
    Detail,
    /// Opacity mask
    Opacity,
    /// Decal overlay
    Decal,
    /// Subsurface scattering
    SubSurface,
    /// Shader specific
    Custom,
    /// Second shader specific slot
    CustomSecondary,
    /// Emissive colour
    Emittance,
    /// Height map
    Height,
}

impl TextureSlot {
    /// All slots in persisted order
    pub const ALL: [Self; 12] = [
        Self::Diffuse,
        Self::Normals,
        Self::Specular,
        Self::Environment,
        Self::Detail,
        Self::Opacity,
        Self::Decal,
        Self::SubSurface,
        Self::Custom,
        Self::CustomSecondary,
        Self::Emittance,
        Self::Height,
    ];

    /// Name used in the `Map` attribute
    pub fn map_name(self) -> &'static str {
        match self {
            Self::Diffuse => "Diffuse",
            Self::Normals => "Bumpmap",
            Self::Specular => "Specular",
            Self::Environment => "Environment",
            Self::Detail => "Detail",
            Self::Opacity => "Opacity",
            Self::Decal => "Decal",
            Self::SubSurface => "SubSurface",
            Self::Custom => "Custom",
            Self::CustomSecondary => "[1] Custom",
            Self::Emittance => "Emittance",
            Self::Height => "Heightmap",
        }
    }

    /// Slot for a `Map` attribute value
    pub fn from_map_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.map_name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Lighting coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    /// Diffuse colour (RGBA)
    pub diffuse: Vector4<f32>,
    /// Specular colour (RGBA)
    pub specular: Vector4<f32>,
    /// Emissive colour, alpha holds intensity
    pub emissive: Vector4<f32>,
    /// Opacity in `[0, 1]`
    pub opacity: f32,
    /// Specular exponent
    pub shininess: f32,
    /// Alpha test reference
    pub alpha_test: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            diffuse: Vector4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vector4::new(0.0, 0.0, 0.0, 1.0),
            emissive: Vector4::zeros(),
            opacity: 1.0,
            shininess: 10.0,
            alpha_test: 0.0,
        }
    }
}

/// Vertex deformation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeformType {
    /// No deformation
    #[default]
    None,
    /// Sine wave along the vertex normal
    SinWave,
    /// Sine wave scaled by vertex colour
    SinWaveUsingVtxColor,
    /// Bulge
    Bulge,
    /// Squeeze
    Squeeze,
    /// 2D Perlin noise
    Perlin2D,
    /// 3D Perlin noise
    Perlin3D,
    /// Push away from the object centre
    FromCenter,
    /// Vegetation bending
    Bending,
}

impl DeformType {
    /// Persisted integer code
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::SinWave => 1,
            Self::SinWaveUsingVtxColor => 2,
            Self::Bulge => 3,
            Self::Squeeze => 4,
            Self::Perlin2D => 5,
            Self::Perlin3D => 6,
            Self::FromCenter => 7,
            Self::Bending => 8,
        }
    }

    /// Kind for a persisted code; unknown codes disable deformation
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::SinWave,
            2 => Self::SinWaveUsingVtxColor,
            3 => Self::Bulge,
            4 => Self::Squeeze,
            5 => Self::Perlin2D,
            6 => Self::Perlin3D,
            7 => Self::FromCenter,
            8 => Self::Bending,
            _ => Self::None,
        }
    }
}

/// Wave shape used by deformations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveForm {
    /// Constant
    #[default]
    None,
    /// Sine
    Sin,
    /// Positive half of a sine
    HalfSin,
    /// Square
    Square,
    /// Triangle
    Triangle,
    /// Saw tooth
    SawTooth,
}

impl WaveForm {
    /// Persisted integer code
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Sin => 1,
            Self::HalfSin => 2,
            Self::Square => 3,
            Self::Triangle => 4,
            Self::SawTooth => 5,
        }
    }

    /// Wave form for a persisted code
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Sin,
            2 => Self::HalfSin,
            3 => Self::Square,
            4 => Self::Triangle,
            5 => Self::SawTooth,
            _ => Self::None,
        }
    }
}

/// Wave parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveParams {
    /// Shape
    pub form: WaveForm,
    /// Amplitude
    pub amp: f32,
    /// Offset
    pub level: f32,
    /// Phase
    pub phase: f32,
    /// Frequency
    pub freq: f32,
}

/// Vertex deformation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VertexDeform {
    /// Deformation kind
    pub kind: DeformType,
    /// Wave length divider along X
    pub divider_x: f32,
    /// Wave along X
    pub wave_x: WaveParams,
}

/// Named public shader parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParam {
    /// Parameter name
    pub name: String,
    /// Parameter value; scalars use `x`
    pub value: Vector4<f32>,
}

/// Resources a shader is bound with
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderResources {
    /// Owning material name
    pub material_name: String,
    /// Draw order among sibling sub-materials
    pub sort_priority: u16,
    /// Lighting coefficients
    pub lighting: Lighting,
    /// Texture file per slot
    pub textures: BTreeMap<TextureSlot, String>,
    /// Public shader parameters in descriptor order
    pub params: Vec<ShaderParam>,
    /// Optional vertex deformation
    pub vertex_deform: Option<VertexDeform>,
    /// Renderer specific resource flags
    pub res_flags: u32,
    /// Layers that replace the base pass
    pub layer_usage: LayerUsage,
}

/// Split a comma separated list of numbers
fn parse_components(name: &str, value: &str) -> MaterialResult<Vec<f32>> {
    value
        .split(',')
        .map(str::trim)
        .map(|component| {
            if component.is_empty() {
                Ok(0.0)
            } else {
                component.parse::<f32>().map_err(|_| MaterialError::ParameterParse {
                    name: name.to_string(),
                    value: value.to_string(),
                })
            }
        })
        .collect()
}

/// Parse a comma separated 4-vector; missing components are zero
pub fn parse_vec4(name: &str, value: &str) -> MaterialResult<Vector4<f32>> {
    let components = parse_components(name, value)?;
    let mut result = Vector4::zeros();
    for (i, component) in components.into_iter().take(4).enumerate() {
        result[i] = component;
    }
    Ok(result)
}

/// Parse an RGB or RGBA colour; a missing alpha is opaque
fn parse_color(name: &str, value: &str) -> MaterialResult<Vector4<f32>> {
    let mut color = parse_vec4(name, value)?;
    if value.split(',').count() < 4 {
        color.w = 1.0;
    }
    Ok(color)
}

/// Format a 4-vector the way [`parse_vec4`] reads it
pub fn format_vec4(value: &Vector4<f32>) -> String {
    format!("{},{},{},{}", value.x, value.y, value.z, value.w)
}

fn log_skipped(err: &MaterialError, material: &str) {
    log::warn!("{} in material {}", err, material);
}

impl ShaderResources {
    /// Create resources for a material
    pub fn new(material_name: &str) -> Self {
        Self {
            material_name: material_name.to_string(),
            ..Self::default()
        }
    }

    /// Texture assigned to a slot
    pub fn texture(&self, slot: TextureSlot) -> Option<&str> {
        self.textures
            .get(&slot)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Assign a texture to a slot
    pub fn set_texture(&mut self, slot: TextureSlot, file: impl Into<String>) {
        self.textures.insert(slot, file.into());
    }

    /// Public parameter by name (case-insensitive)
    pub fn param(&self, name: &str) -> Option<&ShaderParam> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Set or replace a public parameter
    pub fn set_param(&mut self, name: &str, value: Vector4<f32>) {
        match self.params.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(param) => param.value = value,
            None => self.params.push(ShaderParam {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Read lighting, textures and vertex deformation from a material node
    pub fn read_from(&mut self, node: &DocumentNode) {
        self.read_lighting(node);

        if let Some(textures) = node.find_child("Textures") {
            self.read_textures(textures);
        }

        if let Some(deform) = node.find_child("VertexDeform") {
            self.vertex_deform = Some(read_vertex_deform(deform));
        }
    }

    fn read_lighting(&mut self, node: &DocumentNode) {
        let material = self.material_name.clone();
        let lighting = &mut self.lighting;

        let colors = [
            ("Diffuse", &mut lighting.diffuse),
            ("Specular", &mut lighting.specular),
        ];
        for (attr, target) in colors {
            if let Some(value) = node.attr(attr) {
                match parse_color(attr, value) {
                    Ok(color) => *target = color,
                    Err(err) => log_skipped(&err, &material),
                }
            }
        }

        // Older descriptors call the emissive colour "Emittance"
        let emissive = node
            .attr("Emissive")
            .map(|v| ("Emissive", v))
            .or_else(|| node.attr("Emittance").map(|v| ("Emittance", v)));
        if let Some((attr, value)) = emissive {
            match parse_vec4(attr, value) {
                Ok(color) => lighting.emissive = color,
                Err(err) => log_skipped(&err, &material),
            }
        }

        if let Some(opacity) = node.attr_as::<f32>("Opacity") {
            lighting.opacity = opacity;
        }
        if let Some(shininess) = node.attr_as::<f32>("Shininess") {
            lighting.shininess = shininess;
        }
        if let Some(alpha_test) = node.attr_as::<f32>("AlphaTest") {
            lighting.alpha_test = alpha_test;
        }
    }

    fn read_textures(&mut self, textures: &DocumentNode) {
        for texture in textures.children().iter().filter(|c| c.is_tag("Texture")) {
            let Some(map) = texture.attr("Map") else {
                continue;
            };
            let Some(slot) = TextureSlot::from_map_name(map) else {
                log::warn!("Unknown texture map \"{}\" in material {}", map, self.material_name);
                continue;
            };
            let file = texture.attr("File").unwrap_or_default().trim();
            if has_drive_letter(file) {
                log::warn!(
                    "Invalid texture path \"{}\" in material {}: absolute paths are not portable",
                    file,
                    self.material_name
                );
            }
            self.set_texture(slot, file);
        }
    }

    /// Overlay public parameters from a `PublicParams` node
    pub fn read_public_params(&mut self, node: &DocumentNode) {
        for (name, value) in node.attributes() {
            match parse_vec4(name, value) {
                Ok(value) => self.set_param(name, value),
                Err(err) => log_skipped(&err, &self.material_name),
            }
        }
    }

    /// Write lighting, textures and vertex deformation onto a material node
    pub fn write_to(&self, node: &mut DocumentNode) {
        let lighting = &self.lighting;
        node.set_attr("Diffuse", format_vec4(&lighting.diffuse));
        node.set_attr("Specular", format_vec4(&lighting.specular));
        node.set_attr("Emissive", format_vec4(&lighting.emissive));
        node.set_attr("Opacity", lighting.opacity);
        node.set_attr("Shininess", lighting.shininess);
        node.set_attr("AlphaTest", lighting.alpha_test);

        if !self.textures.is_empty() {
            let textures = node.new_child("Textures");
            for (slot, file) in &self.textures {
                let texture = textures.new_child("Texture");
                texture.set_attr("Map", slot.map_name());
                texture.set_attr("File", file);
            }
        }

        if let Some(deform) = &self.vertex_deform {
            write_vertex_deform(deform, node.new_child("VertexDeform"));
        }
    }

    /// Write public parameters onto a `PublicParams` node
    pub fn write_public_params(&self, node: &mut DocumentNode) {
        for param in &self.params {
            node.set_attr(&param.name, format_vec4(&param.value));
        }
    }
}

fn read_vertex_deform(node: &DocumentNode) -> VertexDeform {
    let mut deform = VertexDeform {
        kind: DeformType::from_code(node.attr_as("Type").unwrap_or(0)),
        divider_x: node.attr_as("DividerX").unwrap_or(0.0),
        wave_x: WaveParams::default(),
    };

    if let Some(wave) = node.find_child("WaveX") {
        deform.wave_x = WaveParams {
            form: WaveForm::from_code(wave.attr_as("Type").unwrap_or(0)),
            amp: wave.attr_as("Amp").unwrap_or(0.0),
            level: wave.attr_as("Level").unwrap_or(0.0),
            phase: wave.attr_as("Phase").unwrap_or(0.0),
            freq: wave.attr_as("Freq").unwrap_or(0.0),
        };
    }
    deform
}

fn write_vertex_deform(deform: &VertexDeform, node: &mut DocumentNode) {
    node.set_attr("Type", deform.kind.code());
    node.set_attr("DividerX", deform.divider_x);

    let wave = node.new_child("WaveX");
    wave.set_attr("Type", deform.wave_x.form.code());
    wave.set_attr("Amp", deform.wave_x.amp);
    wave.set_attr("Level", deform.wave_x.level);
    wave.set_attr("Phase", deform.wave_x.phase);
    wave.set_attr("Freq", deform.wave_x.freq);
}
