//! Built-in materials
//!
//! The defaults are built once per manager, on first use. Building them can
//! re-enter the manager (the layers default is loaded by name), so a
//! recursive call from the initializing thread returns immediately while
//! other threads wait for initialization to finish.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::builder::MaterialBuilder;
use crate::flags::{MaterialFlags, RuntimeFlags};
use crate::manager::{LoadOptions, MaterialManager};
use crate::material::{Material, MaterialRef};
use crate::naming::NO_DRAW_NAME;
use crate::resources::{ShaderResources, TextureSlot};

/// Built-in materials; any of them may be missing
#[derive(Debug, Clone, Default)]
pub struct DefaultMaterials {
    /// Replace-me material used for anything missing or broken
    pub default: Option<MaterialRef>,
    /// Terrain layer fallback
    pub terrain_layer: Option<MaterialRef>,
    /// Shared material layers
    pub layers: Option<MaterialRef>,
    /// Registered sentinel that is never drawn
    pub no_draw: Option<MaterialRef>,
    /// Editor helper material
    pub helper: Option<MaterialRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitPhase {
    Uninitialized,
    Running(ThreadId),
    Done,
}

/// One-time construction of [`DefaultMaterials`]
pub(crate) struct DefaultsInitializer {
    phase: Mutex<InitPhase>,
    finished: Condvar,
    materials: RwLock<DefaultMaterials>,
}

/// Resets the phase if initialization unwinds
struct PhaseGuard<'a> {
    initializer: &'a DefaultsInitializer,
    completed: bool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let mut phase = self.initializer.phase.lock();
        *phase = if self.completed {
            InitPhase::Done
        } else {
            InitPhase::Uninitialized
        };
        self.initializer.finished.notify_all();
    }
}

impl DefaultsInitializer {
    pub(crate) fn new() -> Self {
        Self {
            phase: Mutex::new(InitPhase::Uninitialized),
            finished: Condvar::new(),
            materials: RwLock::new(DefaultMaterials::default()),
        }
    }

    /// Build the defaults unless that already happened
    pub(crate) fn ensure(&self, manager: &MaterialManager) {
        let current = thread::current().id();
        {
            let mut phase = self.phase.lock();
            loop {
                match *phase {
                    InitPhase::Done => return,
                    InitPhase::Running(owner) if owner == current => return,
                    InitPhase::Running(_) => self.finished.wait(&mut phase),
                    InitPhase::Uninitialized => {
                        *phase = InitPhase::Running(current);
                        break;
                    }
                }
            }
        }

        let mut guard = PhaseGuard {
            initializer: self,
            completed: false,
        };
        self.build(manager);
        guard.completed = true;
    }

    /// Current defaults, possibly partial while initialization runs
    pub(crate) fn materials(&self) -> DefaultMaterials {
        self.materials.read().clone()
    }

    /// Forget the defaults so the next use builds them again
    pub(crate) fn reset(&self) {
        *self.materials.write() = DefaultMaterials::default();
        let mut phase = self.phase.lock();
        if *phase == InitPhase::Done {
            *phase = InitPhase::Uninitialized;
        }
    }

    fn build(&self, manager: &MaterialManager) {
        let config = manager.config();
        let services = manager.services();

        if config.load_surface_types_in_init {
            services.surface_types.load_surface_types();
        }

        let default = Self::built_in(manager, "Default", "Illum");
        self.materials.write().default = Some(default);

        let terrain_layer = Self::built_in(manager, "DefaultTerrainLayer", "Terrain.Layer");
        self.materials.write().terrain_layer = Some(terrain_layer);

        let layers = manager.load_or_create(&config.default_layers_material, LoadOptions::default());
        if layers.is_none() {
            log::warn!("Default layers material {} not available", config.default_layers_material);
        }
        self.materials.write().layers = layers;

        let no_draw = Arc::new(Material::new(NO_DRAW_NAME, MaterialFlags::NO_DRAW, RuntimeFlags::empty()));
        no_draw.set_shader_name(NO_DRAW_NAME);
        MaterialBuilder::new(manager).load_material_shader(
            &no_draw,
            NO_DRAW_NAME,
            0,
            ShaderResources::new(NO_DRAW_NAME),
        );
        manager.registry().install_sentinel(NO_DRAW_NAME, no_draw.clone());
        self.materials.write().no_draw = Some(no_draw);

        let helper = Self::built_in(manager, "DefaultHelper", "Helper");
        self.materials.write().helper = Some(helper);

        log::info!("Default materials initialized");
    }

    /// White replace-me material bound to `shader`; never registered, so an
    /// asset with the same name still loads normally
    fn built_in(manager: &MaterialManager, name: &str, shader: &str) -> MaterialRef {
        let material = Arc::new(Material::new(name, MaterialFlags::empty(), RuntimeFlags::empty()));
        let mut resources = ShaderResources::new(name);
        resources.set_texture(TextureSlot::Diffuse, &manager.config().replace_me_texture);

        material.set_shader_name(shader);
        MaterialBuilder::new(manager).load_material_shader(&material, shader, 0, resources);
        material
    }
}
