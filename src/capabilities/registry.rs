use std::collections::HashMap;
use std::sync::Arc;

use super::compress::CompressCapability;
use super::extend::ExtendCapability;
use super::palette::PaletteCapability;
use super::remote::RemoteCapability;
use super::signature::SignatureRipCapability;
use super::vectorize::VectorizeCapability;
use super::Capability;
use crate::clients::InferenceClient;
use crate::ops::Operation;

/// Route-to-capability dispatch table, built once at startup. Tests swap in
/// mock capabilities through [`register`](Self::register).
pub struct CapabilityRegistry {
    map: HashMap<Operation, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Full production wiring: the five in-process engines plus one remote
    /// proxy per backend-served operation.
    pub fn production(client: Arc<InferenceClient>) -> Self {
        let mut registry = Self::new();
        for op in Operation::ALL {
            let capability: Arc<dyn Capability> = match op {
                Operation::Compress => Arc::new(CompressCapability),
                Operation::Palette => Arc::new(PaletteCapability),
                Operation::SignatureRip => Arc::new(SignatureRipCapability),
                Operation::Extend => Arc::new(ExtendCapability),
                Operation::Vectorize => Arc::new(VectorizeCapability),
                remote => Arc::new(RemoteCapability::new(remote, Arc::clone(&client))),
            };
            registry.register(op, capability);
        }
        registry
    }

    pub fn register(&mut self, op: Operation, capability: Arc<dyn Capability>) {
        self.map.insert(op, capability);
    }

    pub fn get(&self, op: Operation) -> Option<Arc<dyn Capability>> {
        self.map.get(&op).cloned()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
