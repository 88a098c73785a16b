use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::config::LabelPolicy;
use crate::error::{Result, TaskboardError};
use crate::filter::{PageRequest, Predicate, TaskPage};
use crate::model::{EntityKind, Label, Reference, Task, TaskStatus, User};
use crate::resolve::Resolver;
use crate::store::EntityStore;
use crate::update::{self, BackrefDelta, Resolved, TaskCreate, TaskUpdate};

/// Volatile store for embedding and tests. The back-reference map is kept in
/// step with task writes by applying each write's [`BackrefDelta`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: BTreeMap<u64, Task>,
    statuses: BTreeMap<u64, TaskStatus>,
    labels: BTreeMap<u64, Label>,
    users: BTreeMap<u64, User>,
    backrefs: BTreeMap<Reference, BTreeSet<u64>>,
    next_ids: BTreeMap<EntityKind, u64>,
}

impl MemoryStore {
    fn next_id(&mut self, kind: EntityKind) -> u64 {
        let next = self.next_ids.entry(kind).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }

    pub fn insert_status(&mut self, name: &str, slug: &str) -> TaskStatus {
        let status = TaskStatus {
            id: self.next_id(EntityKind::Status),
            name: name.into(),
            slug: slug.into(),
            created_at: Utc::now(),
        };
        self.statuses.insert(status.id, status.clone());
        status
    }

    pub fn insert_label(&mut self, name: &str) -> Label {
        let label = Label {
            id: self.next_id(EntityKind::Label),
            name: name.into(),
            created_at: Utc::now(),
        };
        self.labels.insert(label.id, label.clone());
        label
    }

    pub fn insert_user(&mut self, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: self.next_id(EntityKind::User),
            email: email.into(),
            first_name: None,
            last_name: None,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn create_task(&mut self, request: &TaskCreate, policy: LabelPolicy) -> Result<Task> {
        let draft = request.resolve(&Resolver::new(&*self, policy))?;
        let id = self.next_id(EntityKind::Task);
        let resolved = draft.into_task(id, Utc::now());
        Ok(self.save(resolved))
    }

    pub fn update_task(
        &mut self,
        id: u64,
        request: &TaskUpdate,
        policy: LabelPolicy,
    ) -> Result<Task> {
        let current = self
            .tasks
            .get(&id)
            .ok_or_else(|| TaskboardError::not_found(EntityKind::Task, id))?;
        let resolved = update::apply(&Resolver::new(&*self, policy), current, request)?;
        Ok(self.save(resolved))
    }

    /// Persist a resolved task and move its back-references.
    pub fn save(&mut self, resolved: Resolved) -> Task {
        let Resolved { task, delta } = resolved;
        self.apply_delta(task.id, &delta);
        self.tasks.insert(task.id, task.clone());
        task
    }

    pub fn delete_task(&mut self, id: u64) -> Result<Task> {
        let task = self
            .tasks
            .remove(&id)
            .ok_or_else(|| TaskboardError::not_found(EntityKind::Task, id))?;
        self.apply_delta(id, &BackrefDelta::between(Some(&task), None));
        Ok(task)
    }

    fn apply_delta(&mut self, task_id: u64, delta: &BackrefDelta) {
        for reference in &delta.removed {
            if let Some(ids) = self.backrefs.get_mut(reference) {
                ids.remove(&task_id);
                if ids.is_empty() {
                    self.backrefs.remove(reference);
                }
            }
        }
        for reference in &delta.added {
            self.backrefs
                .entry(reference.clone())
                .or_default()
                .insert(task_id);
        }
    }
}

impl EntityStore for MemoryStore {
    fn task(&self, id: u64) -> Result<Option<Task>> {
        Ok(self.tasks.get(&id).cloned())
    }

    fn status_by_slug(&self, slug: &str) -> Result<Option<TaskStatus>> {
        Ok(self.statuses.values().find(|s| s.slug == slug).cloned())
    }

    fn label(&self, id: u64) -> Result<Option<Label>> {
        Ok(self.labels.get(&id).cloned())
    }

    fn user(&self, id: u64) -> Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    fn query_tasks(&self, predicate: &Predicate, page: PageRequest) -> Result<TaskPage> {
        Ok(TaskPage::collect(self.tasks.values(), predicate, page))
    }

    fn referencing_tasks(&self, reference: &Reference) -> Result<Vec<u64>> {
        Ok(self
            .backrefs
            .get(reference)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TaskFilter;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::default();
        store.insert_status("Draft", "draft");
        store.insert_status("ToBeFixed", "to_be_fixed");
        store.insert_label("feature");
        store.insert_label("bug");
        store.insert_user("hexlet@example.com");
        store
    }

    fn create(store: &mut MemoryStore, name: &str, status: &str, labels: Vec<u64>) -> Task {
        let mut request = TaskCreate::new(name, status);
        request.labels = labels;
        store.create_task(&request, LabelPolicy::Drop).unwrap()
    }

    #[test]
    fn filters_select_expected_tasks() {
        let mut store = store();
        let a = create(&mut store, "A", "draft", vec![1]);
        let b = create(&mut store, "B", "to_be_fixed", vec![1, 2]);
        let c = create(&mut store, "C", "draft", vec![]);
        let page = PageRequest::new(1, 10).unwrap();

        let ids = |filter: TaskFilter| -> Vec<u64> {
            store
                .query_tasks(&filter.build(), page)
                .unwrap()
                .tasks
                .into_iter()
                .map(|t| t.id)
                .collect()
        };

        let draft = TaskFilter {
            status: Some("draft".into()),
            ..Default::default()
        };
        let label = TaskFilter {
            label_id: Some(1),
            ..Default::default()
        };
        let both = TaskFilter {
            status: Some("draft".into()),
            label_id: Some(1),
            ..Default::default()
        };
        assert_eq!(ids(draft), vec![a.id, c.id]);
        assert_eq!(ids(label), vec![a.id, b.id]);
        assert_eq!(ids(both), vec![a.id]);
        assert_eq!(ids(TaskFilter::default()), vec![a.id, b.id, c.id]);
    }

    #[test]
    fn back_references_follow_updates_and_deletes() {
        let mut store = store();
        let task = create(&mut store, "A", "draft", vec![1]);
        let draft = Reference::Status("draft".into());
        let fixed = Reference::Status("to_be_fixed".into());
        assert_eq!(store.referencing_tasks(&draft).unwrap(), vec![task.id]);

        store
            .update_task(
                task.id,
                &TaskUpdate::new().status("to_be_fixed").assignee(Some(1)),
                LabelPolicy::Drop,
            )
            .unwrap();
        assert_eq!(store.reference_count(&draft).unwrap(), 0);
        assert_eq!(store.referencing_tasks(&fixed).unwrap(), vec![task.id]);
        assert_eq!(store.reference_count(&Reference::Assignee(1)).unwrap(), 1);

        store.delete_task(task.id).unwrap();
        assert_eq!(store.reference_count(&fixed).unwrap(), 0);
        assert_eq!(store.reference_count(&Reference::Label(1)).unwrap(), 0);
        assert_eq!(store.reference_count(&Reference::Assignee(1)).unwrap(), 0);
    }

    #[test]
    fn failed_update_leaves_store_untouched() {
        let mut store = store();
        let task = create(&mut store, "A", "draft", vec![1]);
        let err = store
            .update_task(task.id, &TaskUpdate::new().status("gone"), LabelPolicy::Drop)
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert_eq!(store.task(task.id).unwrap().unwrap(), task);
        assert_eq!(
            store
                .referencing_tasks(&Reference::Status("draft".into()))
                .unwrap(),
            vec![task.id]
        );
    }

    #[test]
    fn update_of_missing_task_is_not_found() {
        let mut store = store();
        let err = store
            .update_task(42, &TaskUpdate::new(), LabelPolicy::Drop)
            .unwrap_err();
        assert!(matches!(err, TaskboardError::NotFound(EntityKind::Task, _)));
    }
}
