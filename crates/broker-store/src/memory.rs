use std::sync::RwLock;

use crate::{RecordSet, RecordStore, StoreResult};

/// Non-durable store. `save` and `restore` succeed without doing anything.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<RecordSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn records(&self) -> &RwLock<RecordSet> {
        &self.records
    }

    fn restore(&self) -> StoreResult<()> {
        Ok(())
    }

    fn save(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BindingRecord, InstanceRecord, OpaqueValue};
    use serde_json::json;

    #[test]
    fn instance_lifecycle() {
        let store = MemoryStore::new();
        let record = InstanceRecord {
            service_id: "svc".into(),
            plan_id: "plan".into(),
            organization_guid: "org".into(),
            space_guid: "space".into(),
            fingerprint: OpaqueValue::from(json!(null)),
        };

        store.create_instance("i-1", record).unwrap();
        assert_eq!(store.retrieve_instance("i-1").unwrap().plan_id, "plan");
        assert_eq!(store.instance_ids(), vec!["i-1".to_string()]);

        store.delete_instance("i-1").unwrap();
        assert!(store.retrieve_instance("i-1").unwrap_err().is_not_found());
        assert!(store.delete_instance("i-1").unwrap_err().is_not_found());
    }

    #[test]
    fn binding_lifecycle() {
        let store = MemoryStore::new();
        store
            .create_binding("b-1", BindingRecord::default())
            .unwrap();
        assert!(store.retrieve_binding("b-1").is_ok());
        store.delete_binding("b-1").unwrap();
        assert!(store.retrieve_binding("b-1").unwrap_err().is_not_found());
    }
}
