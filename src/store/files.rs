use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, TaskboardError};
use crate::model::{EntityKind, Label, Task, TaskStatus, User};
use crate::store::lock;

/// A record persisted as one JSON file under its kind's directory.
pub trait Record: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> u64;
}

impl Record for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> u64 {
        self.id
    }
}

impl Record for TaskStatus {
    const KIND: EntityKind = EntityKind::Status;

    fn id(&self) -> u64 {
        self.id
    }
}

impl Record for Label {
    const KIND: EntityKind = EntityKind::Label;

    fn id(&self) -> u64 {
        self.id
    }
}

impl Record for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> u64 {
        self.id
    }
}

fn first_id() -> u64 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
struct Counter {
    #[serde(default = "first_id")]
    task: u64,
    #[serde(default = "first_id")]
    status: u64,
    #[serde(default = "first_id")]
    label: u64,
    #[serde(default = "first_id")]
    user: u64,
}

impl Counter {
    fn slot(&mut self, kind: EntityKind) -> &mut u64 {
        match kind {
            EntityKind::Task => &mut self.task,
            EntityKind::Status => &mut self.status,
            EntityKind::Label => &mut self.label,
            EntityKind::User => &mut self.user,
        }
    }
}

/// Root of the .taskboard directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub const DIR_NAME: &'static str = ".taskboard";

    /// Open an existing .taskboard directory under `base`.
    pub fn open(base: &Path) -> Result<Self> {
        let root = base.join(Self::DIR_NAME);
        if !root.join(Config::FILE_NAME).exists() {
            return Err(TaskboardError::NotInitialized);
        }
        Ok(Self { root })
    }

    /// Create an empty .taskboard directory under `base`.
    pub fn init(base: &Path, config: &Config) -> Result<Self> {
        let root = base.join(Self::DIR_NAME);
        if root.join(Config::FILE_NAME).exists() {
            return Err(TaskboardError::AlreadyInitialized);
        }

        for kind in EntityKind::ALL {
            fs::create_dir_all(root.join(kind.dir_name()))?;
        }
        fs::write(root.join("counter.json"), "{}")?;
        config.save(&root)?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    fn record_path(&self, kind: EntityKind, id: u64) -> PathBuf {
        self.kind_dir(kind).join(format!("{id}.json"))
    }

    /// Allocate the next id for `kind` under the counter lock.
    pub fn next_id(&self, kind: EntityKind) -> Result<u64> {
        let lock_file = lock::acquire_lock(&self.root.join("counter.lock"))?;

        let path = self.root.join("counter.json");
        let mut counter: Counter = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let slot = counter.slot(kind);
        let id = *slot;
        *slot += 1;
        fs::write(&path, serde_json::to_string(&counter)?)?;

        lock::release_lock(lock_file)?;
        Ok(id)
    }

    pub fn try_read<T: Record>(&self, id: u64) -> Result<Option<T>> {
        let path = self.record_path(T::KIND, id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn read<T: Record>(&self, id: u64) -> Result<T> {
        self.try_read(id)?
            .ok_or_else(|| TaskboardError::not_found(T::KIND, id))
    }

    pub fn write<T: Record>(&self, record: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(self.record_path(T::KIND, record.id()), json)?;
        Ok(())
    }

    pub fn delete(&self, kind: EntityKind, id: u64) -> Result<()> {
        let path = self.record_path(kind, id);
        if !path.exists() {
            return Err(TaskboardError::not_found(kind, id));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn list_ids(&self, kind: EntityKind) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.kind_dir(kind))? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json")
                && let Ok(id) = stem.parse::<u64>()
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn list_all<T: Record>(&self) -> Result<Vec<T>> {
        self.list_ids(T::KIND)?
            .into_iter()
            .map(|id| self.read(id))
            .collect()
    }

    /// Fingerprint of every record file's (kind, id, size, mtime). Changes
    /// whenever any record file does.
    pub fn fingerprint(&self) -> Result<String> {
        let mut entries = Vec::new();
        for kind in EntityKind::ALL {
            for entry in fs::read_dir(self.kind_dir(kind))? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(stem) = name.strip_suffix(".json")
                    && let Ok(id) = stem.parse::<u64>()
                {
                    let meta = entry.metadata()?;
                    let mtime = meta
                        .modified()?
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_nanos();
                    entries.push((kind.dir_name(), id, meta.len(), mtime));
                }
            }
        }
        entries.sort();
        Ok(entries
            .iter()
            .map(|(kind, id, size, mtime)| format!("{kind}/{id}:{size}:{mtime}"))
            .collect::<Vec<_>>()
            .join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn label(store: &FileStore, name: &str) -> Label {
        let label = Label {
            id: store.next_id(EntityKind::Label).unwrap(),
            name: name.into(),
            created_at: Utc::now(),
        };
        store.write(&label).unwrap();
        label
    }

    #[test]
    fn init_creates_directory_structure() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path(), &Config::default()).unwrap();
        assert!(store.root().join("config.json").exists());
        assert!(store.root().join("counter.json").exists());
        for kind in EntityKind::ALL {
            assert!(store.root().join(kind.dir_name()).is_dir());
        }
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempdir().unwrap();
        FileStore::init(dir.path(), &Config::default()).unwrap();
        assert!(matches!(
            FileStore::init(dir.path(), &Config::default()),
            Err(TaskboardError::AlreadyInitialized)
        ));
    }

    #[test]
    fn open_requires_init() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            FileStore::open(dir.path()),
            Err(TaskboardError::NotInitialized)
        ));
    }

    #[test]
    fn ids_are_sequential_per_kind() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path(), &Config::default()).unwrap();
        assert_eq!(store.next_id(EntityKind::Label).unwrap(), 1);
        assert_eq!(store.next_id(EntityKind::Label).unwrap(), 2);
        assert_eq!(store.next_id(EntityKind::Task).unwrap(), 1);
        assert_eq!(store.next_id(EntityKind::Label).unwrap(), 3);
    }

    #[test]
    fn write_read_list_and_delete() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path(), &Config::default()).unwrap();
        let feature = label(&store, "feature");
        label(&store, "bug");

        assert_eq!(store.read::<Label>(feature.id).unwrap(), feature);
        assert_eq!(store.list_all::<Label>().unwrap().len(), 2);

        store.delete(EntityKind::Label, feature.id).unwrap();
        assert!(store.try_read::<Label>(feature.id).unwrap().is_none());
        assert!(matches!(
            store.read::<Label>(feature.id),
            Err(TaskboardError::NotFound(EntityKind::Label, _))
        ));
        assert!(store.delete(EntityKind::Label, feature.id).is_err());
    }

    #[test]
    fn fingerprint_changes_when_records_change() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path(), &Config::default()).unwrap();
        let empty = store.fingerprint().unwrap();
        let bug = label(&store, "bug");
        let one = store.fingerprint().unwrap();
        assert_ne!(empty, one);
        store.delete(EntityKind::Label, bug.id).unwrap();
        assert_eq!(store.fingerprint().unwrap(), empty);
    }

    #[test]
    fn lock_file_persists_after_id_allocation() {
        let dir = tempdir().unwrap();
        let store = FileStore::init(dir.path(), &Config::default()).unwrap();
        store.next_id(EntityKind::Task).unwrap();
        assert!(store.root().join("counter.lock").exists());
    }
}
