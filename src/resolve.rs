use std::collections::BTreeMap;

use crate::config::LabelPolicy;
use crate::error::{Result, TaskboardError};
use crate::model::{EntityKind, Label, TaskStatus, User};
use crate::store::EntityStore;

/// Turns foreign keys from request payloads into live entities.
///
/// Every lookup is a store read; nothing here writes.
pub struct Resolver<'s, S: ?Sized> {
    store: &'s S,
    label_policy: LabelPolicy,
}

impl<'s, S: EntityStore + ?Sized> Resolver<'s, S> {
    pub fn new(store: &'s S, label_policy: LabelPolicy) -> Self {
        Self {
            store,
            label_policy,
        }
    }

    pub fn status(&self, slug: &str) -> Result<TaskStatus> {
        tracing::debug!(slug, "resolving task status");
        self.store
            .status_by_slug(slug)?
            .ok_or_else(|| TaskboardError::not_found(EntityKind::Status, slug))
    }

    pub fn user(&self, id: u64) -> Result<User> {
        tracing::debug!(id, "resolving assignee");
        self.store
            .user(id)?
            .ok_or_else(|| TaskboardError::not_found(EntityKind::User, id))
    }

    /// Resolve a list of label ids into a duplicate-free set, ordered by id.
    ///
    /// Under [`LabelPolicy::Drop`] ids without a live label are skipped;
    /// under [`LabelPolicy::Reject`] the first one fails the call.
    pub fn labels(&self, ids: &[u64]) -> Result<Vec<Label>> {
        let mut resolved = BTreeMap::new();
        let mut dropped = Vec::new();
        for &id in ids {
            if resolved.contains_key(&id) {
                continue;
            }
            match self.store.label(id)? {
                Some(label) => {
                    resolved.insert(id, label);
                }
                None if self.label_policy == LabelPolicy::Reject => {
                    return Err(TaskboardError::not_found(EntityKind::Label, id));
                }
                None => dropped.push(id),
            }
        }
        if !dropped.is_empty() {
            tracing::warn!(?dropped, "ignoring unknown label ids");
        }
        Ok(resolved.into_values().collect())
    }
}
