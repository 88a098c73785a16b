pub mod files;
pub mod index;
pub mod lock;
pub mod memory;
pub mod repo;

use crate::error::Result;
use crate::filter::{PageRequest, Predicate, TaskPage};
use crate::model::{Label, Reference, Task, TaskStatus, User};

/// Read side of an entity store: point lookups, predicate queries, and the
/// derived back-reference index.
pub trait EntityStore {
    fn task(&self, id: u64) -> Result<Option<Task>>;

    fn status_by_slug(&self, slug: &str) -> Result<Option<TaskStatus>>;

    fn label(&self, id: u64) -> Result<Option<Label>>;

    fn user(&self, id: u64) -> Result<Option<User>>;

    /// Tasks matching `predicate`, ordered by id, sliced to `page`.
    fn query_tasks(&self, predicate: &Predicate, page: PageRequest) -> Result<TaskPage>;

    /// Ids of tasks holding `reference`, ascending.
    fn referencing_tasks(&self, reference: &Reference) -> Result<Vec<u64>>;

    fn reference_count(&self, reference: &Reference) -> Result<usize> {
        Ok(self.referencing_tasks(reference)?.len())
    }
}
