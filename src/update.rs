//! Task creation and sparse updates.
//!
//! [`apply`] takes the current task and a [`TaskUpdate`] and produces a
//! [`Resolved`] task without modifying its input. Only fields present in the
//! update are looked up through the [`Resolver`]; any failure leaves the
//! caller's task exactly as it was.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskboardError};
use crate::model::{self, Reference, Task};
use crate::patch::Patch;
use crate::resolve::Resolver;
use crate::store::EntityStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub index: Patch<i64>,
    #[serde(default, rename = "title", skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, rename = "content", skip_serializing_if = "Patch::is_absent")]
    pub description: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub status: Patch<String>,
    #[serde(default, rename = "assignee_id", skip_serializing_if = "Patch::is_absent")]
    pub assignee: Patch<u64>,
    #[serde(
        default,
        rename = "label_ids",
        alias = "taskLabelIds",
        skip_serializing_if = "Patch::is_absent"
    )]
    pub labels: Patch<Vec<u64>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn index(mut self, index: Option<i64>) -> Self {
        self.index = index.map_or(Patch::Null, Patch::Value);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Patch::Value(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description.map_or(Patch::Null, Patch::Value);
        self
    }

    #[must_use]
    pub fn status(mut self, slug: impl Into<String>) -> Self {
        self.status = Patch::Value(slug.into());
        self
    }

    #[must_use]
    pub fn assignee(mut self, assignee: Option<u64>) -> Self {
        self.assignee = assignee.map_or(Patch::Null, Patch::Value);
        self
    }

    #[must_use]
    pub fn labels(mut self, ids: Vec<u64>) -> Self {
        self.labels = Patch::Value(ids);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_absent()
            && self.name.is_absent()
            && self.description.is_absent()
            && self.status.is_absent()
            && self.assignee.is_absent()
            && self.labels.is_absent()
    }

    /// Field checks that need no store access.
    fn validate(&self) -> Result<()> {
        match self.name.as_ref() {
            Patch::Null => return Err(TaskboardError::invalid("title cannot be null")),
            Patch::Value(name) => model::validate_task_name(name)?,
            Patch::Absent => {}
        }
        match self.status.as_ref() {
            Patch::Null => return Err(TaskboardError::invalid("status cannot be null")),
            Patch::Value(slug) if slug.is_empty() => {
                return Err(TaskboardError::invalid("status must not be empty"));
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(default, rename = "content", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    #[serde(default, rename = "assignee_id", skip_serializing_if = "Option::is_none")]
    pub assignee: Option<u64>,
    #[serde(default, rename = "label_ids", alias = "taskLabelIds")]
    pub labels: Vec<u64>,
}

impl TaskCreate {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            index: None,
            name: name.into(),
            description: None,
            status: status.into(),
            assignee: None,
            labels: Vec::new(),
        }
    }

    /// Validate and resolve every reference. The returned draft only lacks the
    /// identity the store assigns on insert.
    pub fn resolve<S: EntityStore + ?Sized>(
        &self,
        resolver: &Resolver<'_, S>,
    ) -> Result<TaskDraft> {
        model::validate_task_name(&self.name)?;
        if self.status.is_empty() {
            return Err(TaskboardError::invalid("status must not be empty"));
        }
        let status = resolver.status(&self.status)?.slug;
        let assignee = self
            .assignee
            .map(|id| resolver.user(id).map(|u| u.id))
            .transpose()?;
        let labels = resolver.labels(&self.labels)?.into_iter().map(|l| l.id).collect();
        Ok(TaskDraft {
            index: self.index,
            name: self.name.clone(),
            description: self.description.clone(),
            status,
            assignee,
            labels,
        })
    }
}

/// A fully resolved task that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub index: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub assignee: Option<u64>,
    pub labels: BTreeSet<u64>,
}

impl TaskDraft {
    pub fn into_task(self, id: u64, created_at: DateTime<Utc>) -> Resolved {
        let task = Task {
            id,
            index: self.index,
            name: self.name,
            description: self.description,
            status: self.status,
            assignee: self.assignee,
            labels: self.labels,
            created_at,
        };
        let delta = BackrefDelta::between(None, Some(&task));
        Resolved { task, delta }
    }
}

/// Changes to the back-reference index implied by one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackrefDelta {
    pub added: Vec<Reference>,
    pub removed: Vec<Reference>,
}

impl BackrefDelta {
    /// Edges to drop and insert when a task goes from `before` to `after`.
    /// `None` on either side models creation or deletion.
    pub fn between(before: Option<&Task>, after: Option<&Task>) -> Self {
        let edges = |task: Option<&Task>| -> BTreeSet<Reference> {
            task.map(Task::references)
                .unwrap_or_default()
                .into_iter()
                .collect()
        };
        let (old, new) = (edges(before), edges(after));
        Self {
            added: new.difference(&old).cloned().collect(),
            removed: old.difference(&new).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A task ready to persist together with the index changes it implies.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub task: Task,
    pub delta: BackrefDelta,
}

/// Apply a sparse update to `current`.
///
/// Absent fields keep their value and are never looked up. `title` and
/// `status` cannot be nulled. A present `label_ids` replaces the whole set.
pub fn apply<S: EntityStore + ?Sized>(
    resolver: &Resolver<'_, S>,
    current: &Task,
    update: &TaskUpdate,
) -> Result<Resolved> {
    update.validate()?;

    let status = match update.status.as_ref() {
        Patch::Value(slug) => resolver.status(slug)?.slug,
        _ => current.status.clone(),
    };
    let assignee = match update.assignee.as_ref() {
        Patch::Value(&id) => Some(resolver.user(id)?.id),
        Patch::Null => None,
        Patch::Absent => current.assignee,
    };
    let labels = match update.labels.as_ref() {
        Patch::Value(ids) => resolver.labels(ids)?.into_iter().map(|l| l.id).collect(),
        Patch::Null => BTreeSet::new(),
        Patch::Absent => current.labels.clone(),
    };

    let task = Task {
        id: current.id,
        index: update.index.clone().merge(current.index),
        name: match update.name.as_ref() {
            Patch::Value(name) => name.clone(),
            _ => current.name.clone(),
        },
        description: update.description.clone().merge(current.description.clone()),
        status,
        assignee,
        labels,
        created_at: current.created_at,
    };
    let delta = BackrefDelta::between(Some(current), Some(&task));
    if !delta.is_empty() {
        tracing::debug!(
            task = task.id,
            added = ?delta.added,
            removed = ?delta.removed,
            "back-references moved"
        );
    }
    Ok(Resolved { task, delta })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::LabelPolicy;
    use crate::error::TaskboardError;
    use crate::filter::{PageRequest, Predicate, TaskPage};
    use crate::model::{EntityKind, Label, TaskStatus, User};
    use crate::store::memory::MemoryStore;

    /// Counts every point lookup made through it.
    struct CountingStore<'a> {
        inner: &'a MemoryStore,
        lookups: Cell<usize>,
    }

    impl<'a> CountingStore<'a> {
        fn new(inner: &'a MemoryStore) -> Self {
            Self {
                inner,
                lookups: Cell::new(0),
            }
        }

        fn bump(&self) {
            self.lookups.set(self.lookups.get() + 1);
        }
    }

    impl EntityStore for CountingStore<'_> {
        fn task(&self, id: u64) -> Result<Option<Task>> {
            self.bump();
            self.inner.task(id)
        }

        fn status_by_slug(&self, slug: &str) -> Result<Option<TaskStatus>> {
            self.bump();
            self.inner.status_by_slug(slug)
        }

        fn label(&self, id: u64) -> Result<Option<Label>> {
            self.bump();
            self.inner.label(id)
        }

        fn user(&self, id: u64) -> Result<Option<User>> {
            self.bump();
            self.inner.user(id)
        }

        fn query_tasks(&self, predicate: &Predicate, page: PageRequest) -> Result<TaskPage> {
            self.inner.query_tasks(predicate, page)
        }

        fn referencing_tasks(&self, reference: &Reference) -> Result<Vec<u64>> {
            self.inner.referencing_tasks(reference)
        }
    }

    fn seeded() -> (MemoryStore, Task) {
        let mut store = MemoryStore::default();
        store.insert_status("Draft", "draft");
        store.insert_status("ToBeFixed", "to_be_fixed");
        store.insert_label("feature");
        store.insert_label("bug");
        store.insert_user("one@example.com");
        store.insert_user("two@example.com");
        let mut create = TaskCreate::new("Old", "draft");
        create.description = Some("keep me".into());
        create.assignee = Some(1);
        create.labels = vec![1];
        create.index = Some(5);
        let task = store.create_task(&create, LabelPolicy::Drop).unwrap();
        (store, task)
    }

    fn run(store: &MemoryStore, task: &Task, update: &TaskUpdate) -> Result<Resolved> {
        apply(&Resolver::new(store, LabelPolicy::Drop), task, update)
    }

    #[test]
    fn empty_update_is_identity_without_lookups() {
        let (store, task) = seeded();
        let counting = CountingStore::new(&store);
        let resolver = Resolver::new(&counting, LabelPolicy::Drop);

        let resolved = apply(&resolver, &task, &TaskUpdate::new()).unwrap();

        assert_eq!(resolved.task, task);
        assert!(resolved.delta.is_empty());
        assert_eq!(counting.lookups.get(), 0);
    }

    #[test]
    fn only_present_references_are_looked_up() {
        let (store, task) = seeded();
        let counting = CountingStore::new(&store);
        let resolver = Resolver::new(&counting, LabelPolicy::Drop);

        let update = TaskUpdate::new().name("Renamed").description(None);
        apply(&resolver, &task, &update).unwrap();
        assert_eq!(counting.lookups.get(), 0);

        apply(&resolver, &task, &TaskUpdate::new().status("to_be_fixed")).unwrap();
        assert_eq!(counting.lookups.get(), 1);
    }

    #[test]
    fn null_description_clears_only_description() {
        let (store, task) = seeded();
        let resolved = run(&store, &task, &TaskUpdate::new().description(None)).unwrap();

        let mut expected = task.clone();
        expected.description = None;
        assert_eq!(resolved.task, expected);
    }

    #[test]
    fn null_status_is_rejected_and_task_untouched() {
        let (store, task) = seeded();
        let before = task.clone();
        let update = TaskUpdate {
            status: Patch::Null,
            ..TaskUpdate::default()
        };
        let err = run(&store, &task, &update).unwrap_err();
        assert!(matches!(err, TaskboardError::ValidationFailed(_)));
        assert_eq!(task, before);
    }

    #[test]
    fn unknown_status_fails_without_partial_application() {
        let (store, task) = seeded();
        let before = task.clone();
        let update = TaskUpdate::new()
            .name("Changed")
            .assignee(None)
            .labels(vec![2])
            .status("missing");
        let err = run(&store, &task, &update).unwrap_err();
        assert!(matches!(err, TaskboardError::NotFound(EntityKind::Status, _)));
        assert_eq!(task, before);
        assert_eq!(store.task(task.id).unwrap().unwrap(), before);
    }

    #[test]
    fn empty_title_fails_before_any_lookup() {
        let (store, task) = seeded();
        let counting = CountingStore::new(&store);
        let resolver = Resolver::new(&counting, LabelPolicy::Drop);
        let update = TaskUpdate::new().name("").status("to_be_fixed");
        let err = apply(&resolver, &task, &update).unwrap_err();
        assert!(matches!(err, TaskboardError::ValidationFailed(_)));
        assert_eq!(counting.lookups.get(), 0);
    }

    #[test]
    fn null_title_is_rejected() {
        let (store, task) = seeded();
        let update = TaskUpdate {
            name: Patch::Null,
            ..TaskUpdate::default()
        };
        assert!(matches!(
            run(&store, &task, &update).unwrap_err(),
            TaskboardError::ValidationFailed(_)
        ));
    }

    #[test]
    fn unknown_assignee_is_not_found() {
        let (store, task) = seeded();
        let err = run(&store, &task, &TaskUpdate::new().assignee(Some(77))).unwrap_err();
        assert!(matches!(err, TaskboardError::NotFound(EntityKind::User, _)));
    }

    #[test]
    fn label_ids_replace_the_whole_set_dropping_unknown() {
        let (store, task) = seeded();
        let resolved = run(&store, &task, &TaskUpdate::new().labels(vec![2, 999])).unwrap();
        assert_eq!(resolved.task.labels, BTreeSet::from([2]));
        assert_eq!(resolved.delta.added, vec![Reference::Label(2)]);
        assert_eq!(resolved.delta.removed, vec![Reference::Label(1)]);
    }

    #[test]
    fn reject_policy_fails_label_update_on_unknown_id() {
        let (store, task) = seeded();
        let resolver = Resolver::new(&store, LabelPolicy::Reject);
        let err = apply(&resolver, &task, &TaskUpdate::new().labels(vec![1, 999])).unwrap_err();
        assert!(matches!(err, TaskboardError::NotFound(EntityKind::Label, _)));
    }

    #[test]
    fn null_label_list_clears_labels() {
        let (store, task) = seeded();
        let update = TaskUpdate {
            labels: Patch::Null,
            ..TaskUpdate::default()
        };
        let resolved = run(&store, &task, &update).unwrap();
        assert!(resolved.task.labels.is_empty());
    }

    #[test]
    fn absent_labels_are_retained() {
        let (store, task) = seeded();
        let resolved = run(&store, &task, &TaskUpdate::new().name("x")).unwrap();
        assert_eq!(resolved.task.labels, task.labels);
    }

    #[test]
    fn renaming_keeps_status() {
        let (store, task) = seeded();
        let resolved = run(&store, &task, &TaskUpdate::new().name("New")).unwrap();
        assert_eq!(resolved.task.name, "New");
        assert_eq!(resolved.task.status, "draft");
        assert_eq!(resolved.task.created_at, task.created_at);
    }

    #[test]
    fn status_and_assignee_moves_are_recorded_once() {
        let (store, task) = seeded();
        let update = TaskUpdate::new().status("to_be_fixed").assignee(Some(2));
        let resolved = run(&store, &task, &update).unwrap();
        assert_eq!(
            resolved.delta.added,
            vec![
                Reference::Status("to_be_fixed".into()),
                Reference::Assignee(2)
            ]
        );
        assert_eq!(
            resolved.delta.removed,
            vec![Reference::Status("draft".into()), Reference::Assignee(1)]
        );
    }

    #[test]
    fn null_index_and_assignee_clear() {
        let (store, task) = seeded();
        let update = TaskUpdate::new().index(None).assignee(None);
        let resolved = run(&store, &task, &update).unwrap();
        assert_eq!(resolved.task.index, None);
        assert_eq!(resolved.task.assignee, None);
        assert_eq!(resolved.delta.removed, vec![Reference::Assignee(1)]);
    }

    #[test]
    fn json_payload_distinguishes_absent_from_null() {
        let update: TaskUpdate =
            serde_json::from_str(r#"{"title": "New", "content": null, "taskLabelIds": [1]}"#).unwrap();
        assert_eq!(update.name, Patch::Value("New".into()));
        assert_eq!(update.description, Patch::Null);
        assert_eq!(update.status, Patch::Absent);
        assert_eq!(update.assignee, Patch::Absent);
        assert_eq!(update.labels, Patch::Value(vec![1]));
    }

    #[test]
    fn create_requires_resolvable_status() {
        let (store, _) = seeded();
        let resolver = Resolver::new(&store, LabelPolicy::Drop);
        let err = TaskCreate::new("Task", "nope").resolve(&resolver).unwrap_err();
        assert!(matches!(err, TaskboardError::NotFound(EntityKind::Status, _)));

        let err = TaskCreate::new("", "draft").resolve(&resolver).unwrap_err();
        assert!(matches!(err, TaskboardError::ValidationFailed(_)));
    }

    #[test]
    fn created_task_delta_adds_every_reference() {
        let (store, _) = seeded();
        let resolver = Resolver::new(&store, LabelPolicy::Drop);
        let mut create = TaskCreate::new("Task", "draft");
        create.labels = vec![2, 1, 1];
        let resolved = create.resolve(&resolver).unwrap().into_task(9, Utc::now());
        assert_eq!(resolved.task.labels, BTreeSet::from([1, 2]));
        assert_eq!(resolved.delta.added.len(), 3);
        assert!(resolved.delta.removed.is_empty());
    }
}
