//! # Material System
//!
//! Concurrent, name-keyed cache and loader for hierarchical material
//! descriptors.
//!
//! ## Features
//!
//! - **Single-flight loading**: concurrent requests for one name build it once
//! - **Hierarchical materials**: inline and referenced sub-materials
//! - **Material layers**: overlay shader variants matched by generation-bit name
//! - **Hot reloading**: asset changed / removed notifications
//! - **Serialization**: material to descriptor and back
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use material_system::prelude::*;
//!
//! let store = Arc::new(RonDocumentStore::new("assets"));
//! let shaders = Arc::new(HeadlessShaderService::new());
//! let services = Services::from_store(store, shaders);
//! let manager = MaterialManager::new(services, MaterialConfig::default());
//!
//! let material = manager
//!     .load_or_create("Materials/rock", LoadOptions::create_if_missing())
//!     .expect("default material is always available");
//! println!("{}", material.name());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod builder;
pub mod config;
pub mod defaults;
pub mod document;
pub mod error;
pub mod flags;
pub mod gate;
pub mod logging;
pub mod manager;
pub mod material;
pub mod naming;
pub mod registry;
pub mod resources;
pub mod serializer;
pub mod services;
pub mod shader;

pub use builder::{BuildParams, MaterialBuilder};
pub use config::{Config, ConfigError, MaterialConfig};
pub use defaults::DefaultMaterials;
pub use document::{DocumentError, DocumentNode, DocumentSource, MemoryDocumentStore, RonDocumentStore};
pub use error::{MaterialError, MaterialResult};
pub use flags::{CopyFlags, LayerFlags, LayerUsage, MaterialFlags, RuntimeFlags};
pub use gate::{LoadTicket, ManualGate};
pub use manager::{LoadOptions, MaterialManager};
pub use material::{Material, MaterialLayer, MaterialRef, MAX_LAYER_SLOTS};
pub use registry::MaterialRegistry;
pub use resources::{Lighting, ShaderParam, ShaderResources, TextureSlot, VertexDeform};
pub use serializer::MaterialSerializer;
pub use services::{
    AssetSource, AssetStatus, GeometryRefresher, MaterialListener, Services, SurfaceType,
    SurfaceTypeRegistry, SurfaceTypeTable,
};
pub use shader::{HeadlessShaderService, Shader, ShaderError, ShaderGenBit, ShaderItem, ShaderService};

/// Common imports for material system users
pub mod prelude {
    pub use crate::{
        AssetSource, AssetStatus, DocumentNode, DocumentSource, HeadlessShaderService, LoadOptions,
        Material, MaterialConfig, MaterialFlags, MaterialManager, MaterialRef, MaterialSerializer,
        MemoryDocumentStore, RonDocumentStore, RuntimeFlags, Services, ShaderService,
    };
}
