use std::collections::HashSet;
use std::sync::Mutex;

/// Services whose identity probe has succeeded in this process.
///
/// Guarded by its own lock, never the record lock. Two first-time probes for
/// the same service may both run; marking is idempotent.
#[derive(Debug, Default)]
pub struct ProbeGate {
    probed: Mutex<HashSet<String>>,
}

impl ProbeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_probed(&self, service_id: &str) -> bool {
        self.probed
            .lock()
            .expect("probe gate lock poisoned")
            .contains(service_id)
    }

    /// Returns `true` when this call closed the gate.
    pub fn mark_probed(&self, service_id: &str) -> bool {
        self.probed
            .lock()
            .expect("probe gate lock poisoned")
            .insert(service_id.to_string())
    }
}
