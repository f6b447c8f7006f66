//! Durable instance and binding records for the broker.
//!
//! Stores keep the whole record set in memory and persist it as a single
//! document on [`RecordStore::save`]. Reads always observe prior writes made
//! through the same store, whether or not they have been saved yet.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

pub mod error;
pub mod file;
pub mod memory;
pub mod opaque;
pub mod records;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use opaque::{ErasedDocument, OpaqueValue};
pub use records::{BindResource, BindingRecord, InstanceRecord, RecordSet};

/// Key-value persistence for instance and binding records.
///
/// Implementors supply the in-memory table plus `save`/`restore`; the record
/// operations are shared.
pub trait RecordStore: Send + Sync {
    fn records(&self) -> &RwLock<RecordSet>;

    /// Load the persisted dataset, replacing the in-memory one.
    fn restore(&self) -> StoreResult<()>;

    /// Persist the whole in-memory dataset.
    fn save(&self) -> StoreResult<()>;

    /// Insert or replace the record for `instance_id`.
    fn create_instance(&self, instance_id: &str, record: InstanceRecord) -> StoreResult<()> {
        debug!(instance_id, "storing instance record");
        write(self.records()).instances.insert(instance_id.to_string(), record);
        Ok(())
    }

    fn retrieve_instance(&self, instance_id: &str) -> StoreResult<InstanceRecord> {
        read(self.records())
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StoreError::instance_not_found(instance_id))
    }

    fn delete_instance(&self, instance_id: &str) -> StoreResult<()> {
        write(self.records())
            .instances
            .remove(instance_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::instance_not_found(instance_id))
    }

    fn is_instance_conflict(&self, instance_id: &str, record: &InstanceRecord) -> bool {
        read(self.records()).instance_conflicts(instance_id, record)
    }

    /// Insert or replace the record for `binding_id`.
    fn create_binding(&self, binding_id: &str, record: BindingRecord) -> StoreResult<()> {
        debug!(binding_id, "storing binding record");
        write(self.records()).bindings.insert(binding_id.to_string(), record);
        Ok(())
    }

    fn retrieve_binding(&self, binding_id: &str) -> StoreResult<BindingRecord> {
        read(self.records())
            .bindings
            .get(binding_id)
            .cloned()
            .ok_or_else(|| StoreError::binding_not_found(binding_id))
    }

    fn delete_binding(&self, binding_id: &str) -> StoreResult<()> {
        write(self.records())
            .bindings
            .remove(binding_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::binding_not_found(binding_id))
    }

    fn is_binding_conflict(&self, binding_id: &str, record: &BindingRecord) -> bool {
        read(self.records()).binding_conflicts(binding_id, record)
    }

    fn instance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(self.records()).instances.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn binding_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(self.records()).bindings.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn read(records: &RwLock<RecordSet>) -> RwLockReadGuard<'_, RecordSet> {
    records.read().expect("record set lock poisoned")
}

fn write(records: &RwLock<RecordSet>) -> RwLockWriteGuard<'_, RecordSet> {
    records.write().expect("record set lock poisoned")
}
