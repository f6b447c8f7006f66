use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{info, warn};

use crate::{RecordSet, RecordStore, StoreError, StoreResult};

/// Record store persisted as one pretty-printed JSON file.
///
/// `save` writes to a sibling temporary file and renames it over the target so
/// a crash mid-write never leaves a truncated record file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    records: RwLock<RecordSet>,
}

impl FileStore {
    /// Create a store for `path`. Nothing is read until [`RecordStore::restore`].
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: RwLock::new(RecordSet::default()),
        }
    }

    /// Create and immediately restore.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let store = Self::new(path);
        store.restore()?;
        Ok(store)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for FileStore {
    fn records(&self) -> &RwLock<RecordSet> {
        &self.records
    }

    fn restore(&self) -> StoreResult<()> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no record file yet, starting empty");
            return Ok(());
        }

        let data = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let state: RecordSet = if data.trim().is_empty() {
            warn!(path = %self.path.display(), "record file is empty");
            RecordSet::default()
        } else {
            serde_json::from_str(&data).map_err(|source| StoreError::Decode {
                path: self.path.clone(),
                source,
            })?
        };

        info!(
            path = %self.path.display(),
            instances = state.instances.len(),
            bindings = state.bindings.len(),
            "restored broker records"
        );
        *self.records.write().expect("record set lock poisoned") = state;
        Ok(())
    }

    fn save(&self) -> StoreResult<()> {
        let json = {
            let state = self.records.read().expect("record set lock poisoned");
            serde_json::to_string_pretty(&*state).map_err(StoreError::Encode)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }
}
