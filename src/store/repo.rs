use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::Config;
use crate::error::{Result, TaskboardError};
use crate::filter::{PageRequest, Predicate, TaskFilter, TaskPage};
use crate::model::{EntityKind, Label, Reference, Task, TaskStatus, User};
use crate::resolve::Resolver;
use crate::store::EntityStore;
use crate::store::files::FileStore;
use crate::store::index::Index;
use crate::update::{self, BackrefDelta, TaskCreate, TaskUpdate};

/// Statuses and labels every new board starts with, as (name, slug).
pub const DEFAULT_STATUSES: [(&str, &str); 5] = [
    ("Draft", "draft"),
    ("ToReview", "to_review"),
    ("ToBeFixed", "to_be_fixed"),
    ("ToPublish", "to_publish"),
    ("Published", "published"),
];
pub const DEFAULT_LABELS: [&str; 2] = ["feature", "bug"];

/// Record files plus their derived index, opened together.
pub struct Repo {
    pub store: FileStore,
    pub index: Index,
    pub config: Config,
}

impl Repo {
    /// Open an existing board, rebuilding the index if stale or missing.
    pub fn open(base: &Path) -> Result<Self> {
        let store = FileStore::open(base)?;
        let config = Config::load(store.root())?;
        let index_path = store.root().join("index.db");
        let missing = !index_path.exists();
        let index = Index::open(&index_path)?;

        let current_fp = store.fingerprint()?;
        let stale = missing || index.get_fingerprint()?.as_deref() != Some(current_fp.as_str());
        let repo = Self {
            store,
            index,
            config,
        };
        if stale {
            repo.reindex()?;
        }
        Ok(repo)
    }

    /// Create a board under `base` and seed the default statuses and labels.
    pub fn init(base: &Path, config: Config) -> Result<Self> {
        FileStore::init(base, &config)?;
        let repo = Self::open(base)?;
        for (name, slug) in DEFAULT_STATUSES {
            repo.create_status(&crate::catalog::StatusCreate::new(name, slug))?;
        }
        for name in DEFAULT_LABELS {
            repo.create_label(&crate::catalog::LabelCreate::new(name))?;
        }
        tracing::info!(root = %repo.store.root().display(), "initialized board");
        Ok(repo)
    }

    /// Rebuild the index from the record files.
    pub fn reindex(&self) -> Result<usize> {
        let tasks: Vec<Task> = self.store.list_all()?;
        let statuses: Vec<TaskStatus> = self.store.list_all()?;
        let labels: Vec<Label> = self.store.list_all()?;
        let users: Vec<User> = self.store.list_all()?;
        self.index.rebuild(&tasks, &statuses, &labels, &users)?;
        self.refresh_fingerprint()?;
        Ok(tasks.len())
    }

    /// Record the current file state as indexed. Called after every write.
    pub(crate) fn refresh_fingerprint(&self) -> Result<()> {
        self.index.set_fingerprint(&self.store.fingerprint()?)
    }

    pub fn resolver(&self) -> Resolver<'_, Self> {
        Resolver::new(self, self.config.label_policy)
    }

    pub fn list_tasks(&self, filter: &TaskFilter, page: u32) -> Result<TaskPage> {
        let request = PageRequest::new(page, self.config.page_size)?;
        let predicate = filter.build();
        tracing::debug!(unfiltered = predicate.is_all(), page, "listing tasks");
        self.query_tasks(&predicate, request)
    }

    pub fn show_task(&self, id: u64) -> Result<Task> {
        self.store.read(id)
    }

    pub fn create_task(&self, request: &TaskCreate) -> Result<Task> {
        let draft = request.resolve(&self.resolver())?;
        let id = self.store.next_id(EntityKind::Task)?;
        let resolved = draft.into_task(id, Utc::now());
        self.store.write(&resolved.task)?;
        self.index.upsert_task(&resolved.task, &resolved.delta)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, status = %resolved.task.status, "created task");
        Ok(resolved.task)
    }

    pub fn update_task(&self, id: u64, request: &TaskUpdate) -> Result<Task> {
        let current: Task = self.store.read(id)?;
        if request.is_empty() {
            return Ok(current);
        }
        let resolved = update::apply(&self.resolver(), &current, request)?;
        self.store.write(&resolved.task)?;
        self.index.upsert_task(&resolved.task, &resolved.delta)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, "updated task");
        Ok(resolved.task)
    }

    pub fn delete_task(&self, id: u64) -> Result<Task> {
        let task: Task = self.store.read(id)?;
        self.store.delete(EntityKind::Task, id)?;
        self.index.remove_task(id)?;
        self.refresh_fingerprint()?;
        let delta = BackrefDelta::between(Some(&task), None);
        tracing::info!(id, released = ?delta.removed, "deleted task");
        Ok(task)
    }

    /// Fail with `InUse` while any task still holds `reference`.
    pub(crate) fn guard_unreferenced(&self, reference: &Reference) -> Result<()> {
        let count = self.reference_count(reference)?;
        if count > 0 {
            return Err(TaskboardError::InUse {
                kind: reference.kind(),
                key: reference.key(),
                count,
            });
        }
        Ok(())
    }
}

impl EntityStore for Repo {
    fn task(&self, id: u64) -> Result<Option<Task>> {
        self.store.try_read(id)
    }

    fn status_by_slug(&self, slug: &str) -> Result<Option<TaskStatus>> {
        match self.index.status_id_by_slug(slug)? {
            Some(id) => self.store.try_read(id),
            None => Ok(None),
        }
    }

    fn label(&self, id: u64) -> Result<Option<Label>> {
        self.store.try_read(id)
    }

    fn user(&self, id: u64) -> Result<Option<User>> {
        self.store.try_read(id)
    }

    fn query_tasks(&self, predicate: &Predicate, page: PageRequest) -> Result<TaskPage> {
        let (total, ids) = self.index.query(predicate, page)?;
        let tasks = ids
            .into_iter()
            .map(|id| self.store.read(id))
            .collect::<Result<Vec<Task>>>()?;
        Ok(TaskPage {
            page: page.page(),
            page_size: page.size(),
            total,
            tasks,
        })
    }

    fn referencing_tasks(&self, reference: &Reference) -> Result<Vec<u64>> {
        self.index.referencing_tasks(reference)
    }
}

/// Walk up from the current directory to the nearest .taskboard root.
pub fn find_board_root() -> Result<PathBuf> {
    let mut dir = std::env::current_dir()?;
    loop {
        if dir.join(FileStore::DIR_NAME).exists() {
            return Ok(dir);
        }
        if !dir.pop() {
            return Err(TaskboardError::NotInitialized);
        }
    }
}
