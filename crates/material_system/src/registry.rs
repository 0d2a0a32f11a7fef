//! Name-keyed material registry
//!
//! The name map and the pending-load table are one unit guarded by a single
//! lock. The lock is only held for bookkeeping: never while waiting on a gate,
//! reading a file or binding a shader. The retention list of non-removable
//! materials has its own lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::gate::{LoadTicket, ManualGate};
use crate::material::MaterialRef;

/// Outcome of claiming a name for loading
#[derive(Debug)]
pub enum Claim {
    /// A finished material is registered under the name
    Cached(MaterialRef),
    /// Another load of the name is in flight; wait on the gate, then look again
    Wait(Arc<ManualGate>),
    /// The caller owns the load and must finish it
    Owner(LoadTicket),
}

#[derive(Default)]
struct RegistryState {
    materials: HashMap<String, MaterialRef>,
    pending: HashMap<String, Arc<ManualGate>>,
}

/// Unified-name map, pending loads and retained materials
#[derive(Default)]
pub struct MaterialRegistry {
    state: Mutex<RegistryState>,
    retained: Mutex<Vec<MaterialRef>>,
}

impl MaterialRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide how the caller obtains the material registered as `unified`
    pub fn claim(&self, unified: &str) -> Claim {
        let mut state = self.state.lock();

        let pending = state.pending.get(unified).cloned();
        if let Some(gate) = pending {
            if !gate.is_set() {
                return Claim::Wait(gate);
            }
        }

        if let Some(material) = state.materials.get(unified) {
            return Claim::Cached(Arc::clone(material));
        }

        // A signaled record without an entry is stale; replace it
        let gate = Arc::new(ManualGate::new());
        state.pending.insert(unified.to_string(), Arc::clone(&gate));
        Claim::Owner(LoadTicket::new(gate))
    }

    /// Registered material
    pub fn get(&self, unified: &str) -> Option<MaterialRef> {
        self.state.lock().materials.get(unified).cloned()
    }

    /// Register a material, replacing any previous entry
    pub fn insert(&self, unified: &str, material: MaterialRef) {
        let previous = self
            .state
            .lock()
            .materials
            .insert(unified.to_string(), material);
        if previous.is_some() {
            log::debug!("Replaced registry entry {}", unified);
        }
    }

    /// Register a material that never goes through the load path
    pub fn install_sentinel(&self, unified: &str, material: MaterialRef) {
        let mut state = self.state.lock();
        state.materials.insert(unified.to_string(), material);
        state
            .pending
            .insert(unified.to_string(), Arc::new(ManualGate::signaled()));
    }

    /// Finish a failed load: drop its pending record and release waiters
    pub fn abandon_load(&self, unified: &str, gate: &Arc<ManualGate>) {
        let mut state = self.state.lock();
        if state
            .pending
            .get(unified)
            .is_some_and(|pending| Arc::ptr_eq(pending, gate))
        {
            state.pending.remove(unified);
        }
        gate.set();
    }

    /// Move an entry and its pending record to a new name
    ///
    /// The material's name is stamped before the lock is released, so a
    /// lookup under `new` never sees the old name.
    pub fn rename(&self, old: &str, new: &str, material: &MaterialRef) {
        let mut state = self.state.lock();
        if state
            .materials
            .get(old)
            .is_some_and(|existing| Arc::ptr_eq(existing, material))
        {
            state.materials.remove(old);
            if let Some(gate) = state.pending.remove(old) {
                state.pending.insert(new.to_string(), gate);
            }
        }
        material.set_name(new);
        state.materials.insert(new.to_string(), Arc::clone(material));
    }

    /// Remove the entry and pending record of `material`
    ///
    /// Returns `false` if a different material is registered under the name.
    pub fn remove(&self, unified: &str, material: &MaterialRef) -> bool {
        let mut state = self.state.lock();
        let registered = state
            .materials
            .get(unified)
            .map(|existing| Arc::ptr_eq(existing, material));
        match registered {
            Some(false) => return false,
            Some(true) => {
                state.materials.remove(unified);
            }
            None => {}
        }
        state.pending.remove(unified);
        true
    }

    /// Snapshot of all registered materials
    pub fn snapshot(&self) -> Vec<MaterialRef> {
        self.state.lock().materials.values().cloned().collect()
    }

    /// Number of registered materials
    pub fn len(&self) -> usize {
        self.state.lock().materials.len()
    }

    /// Whether no material is registered
    pub fn is_empty(&self) -> bool {
        self.state.lock().materials.is_empty()
    }

    /// Pending record of a name
    pub fn pending_gate(&self, unified: &str) -> Option<Arc<ManualGate>> {
        self.state.lock().pending.get(unified).cloned()
    }

    /// Number of pending records, resolved or in flight
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Keep a material alive until [`clear`](Self::clear)
    pub fn retain(&self, material: MaterialRef) {
        let mut retained = self.retained.lock();
        if !retained.iter().any(|m| Arc::ptr_eq(m, &material)) {
            retained.push(material);
        }
    }

    /// Snapshot of the retention list
    pub fn retained(&self) -> Vec<MaterialRef> {
        self.retained.lock().clone()
    }

    /// Drop every reference the registry holds
    pub fn clear(&self) {
        let (materials, pending) = {
            let mut state = self.state.lock();
            (
                std::mem::take(&mut state.materials),
                std::mem::take(&mut state.pending),
            )
        };
        let retained = std::mem::take(&mut *self.retained.lock());

        log::debug!(
            "Cleared {} materials, {} pending records, {} retained",
            materials.len(),
            pending.len(),
            retained.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{MaterialFlags, RuntimeFlags};
    use crate::material::Material;

    fn material(name: &str) -> MaterialRef {
        Arc::new(Material::new(name, MaterialFlags::empty(), RuntimeFlags::empty()))
    }

    #[test]
    fn test_claim_sequence() {
        let registry = MaterialRegistry::new();

        let Claim::Owner(ticket) = registry.claim("rock") else {
            panic!("first claim must own the load");
        };
        assert!(matches!(registry.claim("rock"), Claim::Wait(_)));

        let rock = material("rock");
        registry.insert("rock", Arc::clone(&rock));
        // Registered but still building
        assert!(matches!(registry.claim("rock"), Claim::Wait(_)));

        drop(ticket);
        match registry.claim("rock") {
            Claim::Cached(found) => assert!(Arc::ptr_eq(&found, &rock)),
            other => panic!("expected cached, got {other:?}"),
        }
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_abandon_removes_record() {
        let registry = MaterialRegistry::new();
        let Claim::Owner(ticket) = registry.claim("missing") else {
            panic!("first claim must own the load");
        };

        registry.abandon_load("missing", ticket.gate());
        assert!(ticket.gate().is_set());
        assert!(registry.pending_gate("missing").is_none());
        assert!(matches!(registry.claim("missing"), Claim::Owner(_)));
    }

    #[test]
    fn test_rename_carries_pending_record() {
        let registry = MaterialRegistry::new();
        let Claim::Owner(ticket) = registry.claim("a") else {
            panic!("first claim must own the load");
        };
        let m = material("a");
        registry.insert("a", Arc::clone(&m));
        let gate = Arc::clone(ticket.gate());

        registry.rename("a", "b", &m);
        assert!(registry.get("a").is_none());
        assert!(registry.pending_gate("a").is_none());
        assert!(Arc::ptr_eq(&registry.pending_gate("b").unwrap(), &gate));
        assert!(Arc::ptr_eq(&registry.get("b").unwrap(), &m));
        assert_eq!(m.name(), "b");
    }

    #[test]
    fn test_rename_visible_with_new_name() {
        let registry = Arc::new(MaterialRegistry::new());
        let m = material("old");
        registry.insert("old", Arc::clone(&m));

        let reader = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || loop {
                if let Some(found) = registry.get("new") {
                    return found.name();
                }
                std::thread::yield_now();
            })
        };
        registry.rename("old", "new", &m);
        assert_eq!(reader.join().unwrap(), "new");
    }

    #[test]
    fn test_remove_only_matching_material() {
        let registry = MaterialRegistry::new();
        let registered = material("rock");
        registry.install_sentinel("rock", Arc::clone(&registered));

        assert!(!registry.remove("rock", &material("rock")));
        assert!(registry.get("rock").is_some());

        assert!(registry.remove("rock", &registered));
        assert!(registry.is_empty());
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_retention_and_clear() {
        let registry = MaterialRegistry::new();
        let kept = material("kept");
        registry.retain(Arc::clone(&kept));
        registry.retain(Arc::clone(&kept));
        registry.insert("kept", Arc::clone(&kept));
        assert_eq!(registry.retained().len(), 1);

        registry.clear();
        assert!(registry.retained().is_empty());
        assert!(registry.is_empty());
        assert_eq!(Arc::strong_count(&kept), 1);
    }
}
