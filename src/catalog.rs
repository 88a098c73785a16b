//! Statuses, labels, and users: the entities a task refers to.
//!
//! Unlike tasks these carry no relational fields of their own, so updates are
//! plain field replacement. Deletes (and slug renames) are refused while any
//! task still points at the entity.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskboardError};
use crate::model::{self, EntityKind, Label, Reference, TaskStatus, User};
use crate::password;
use crate::patch::Patch;
use crate::store::repo::Repo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCreate {
    pub name: String,
    pub slug: String,
}

impl StatusCreate {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub slug: Patch<String>,
}

impl StatusUpdate {
    pub fn apply(&self, current: &TaskStatus) -> Result<TaskStatus> {
        let name = self.name.clone().required("name")?;
        let slug = self.slug.clone().required("slug")?;
        let next = TaskStatus {
            name: name.unwrap_or_else(|| current.name.clone()),
            slug: slug.unwrap_or_else(|| current.slug.clone()),
            ..current.clone()
        };
        model::validate_status_fields(&next.name, &next.slug)?;
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCreate {
    pub name: String,
}

impl LabelCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub name: Patch<String>,
}

impl LabelUpdate {
    pub fn apply(&self, current: &Label) -> Result<Label> {
        match self.name.clone().required("name")? {
            Some(name) => {
                model::validate_label_name(&name)?;
                Ok(Label {
                    name,
                    ..current.clone()
                })
            }
            None => Ok(current.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    #[serde(default, rename = "firstName", alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, rename = "lastName", alias = "last_name")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub email: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub password: Patch<String>,
    #[serde(
        default,
        rename = "firstName",
        alias = "first_name",
        skip_serializing_if = "Patch::is_absent"
    )]
    pub first_name: Patch<String>,
    #[serde(
        default,
        rename = "lastName",
        alias = "last_name",
        skip_serializing_if = "Patch::is_absent"
    )]
    pub last_name: Patch<String>,
}

impl UserUpdate {
    /// Replace fields on a copy of `current`. A new password is hashed with
    /// `cost` before it is stored.
    pub fn apply(&self, current: &User, cost: u32) -> Result<User> {
        let email = self.email.clone().required("email")?;
        if let Some(email) = &email {
            model::validate_email(email)?;
        }
        let password_hash = match self.password.clone().required("password")? {
            Some(plain) => {
                model::validate_password(&plain)?;
                password::hash(&plain, cost)?
            }
            None => current.password_hash.clone(),
        };
        Ok(User {
            id: current.id,
            email: email.unwrap_or_else(|| current.email.clone()),
            first_name: self.first_name.clone().merge(current.first_name.clone()),
            last_name: self.last_name.clone().merge(current.last_name.clone()),
            password_hash,
            created_at: current.created_at,
            updated_at: Utc::now(),
        })
    }
}

impl Repo {
    fn ensure_unique(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
        holder: Option<u64>,
        own: Option<u64>,
    ) -> Result<()> {
        match holder {
            Some(id) if Some(id) != own => Err(TaskboardError::Conflict(
                kind,
                format!("{field} '{value}'"),
            )),
            _ => Ok(()),
        }
    }

    pub fn list_statuses(&self) -> Result<Vec<TaskStatus>> {
        self.store.list_all()
    }

    pub fn show_status(&self, id: u64) -> Result<TaskStatus> {
        self.store.read(id)
    }

    pub fn create_status(&self, request: &StatusCreate) -> Result<TaskStatus> {
        model::validate_status_fields(&request.name, &request.slug)?;
        let kind = EntityKind::Status;
        self.ensure_unique(
            kind,
            "name",
            &request.name,
            self.index.status_id_by_name(&request.name)?,
            None,
        )?;
        self.ensure_unique(
            kind,
            "slug",
            &request.slug,
            self.index.status_id_by_slug(&request.slug)?,
            None,
        )?;

        let status = TaskStatus {
            id: self.store.next_id(kind)?,
            name: request.name.clone(),
            slug: request.slug.clone(),
            created_at: Utc::now(),
        };
        self.store.write(&status)?;
        self.index.upsert_status(&status)?;
        self.refresh_fingerprint()?;
        tracing::info!(id = status.id, slug = %status.slug, "created task status");
        Ok(status)
    }

    pub fn update_status(&self, id: u64, request: &StatusUpdate) -> Result<TaskStatus> {
        let current: TaskStatus = self.store.read(id)?;
        let next = request.apply(&current)?;
        let kind = EntityKind::Status;
        self.ensure_unique(
            kind,
            "name",
            &next.name,
            self.index.status_id_by_name(&next.name)?,
            Some(id),
        )?;
        self.ensure_unique(
            kind,
            "slug",
            &next.slug,
            self.index.status_id_by_slug(&next.slug)?,
            Some(id),
        )?;
        if next.slug != current.slug {
            // Tasks refer to statuses by slug.
            self.guard_unreferenced(&Reference::Status(current.slug.clone()))?;
        }

        self.store.write(&next)?;
        self.index.upsert_status(&next)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, "updated task status");
        Ok(next)
    }

    pub fn delete_status(&self, id: u64) -> Result<TaskStatus> {
        let status: TaskStatus = self.store.read(id)?;
        self.guard_unreferenced(&Reference::Status(status.slug.clone()))?;
        self.store.delete(EntityKind::Status, id)?;
        self.index.remove_status(id)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, "deleted task status");
        Ok(status)
    }

    pub fn list_labels(&self) -> Result<Vec<Label>> {
        self.store.list_all()
    }

    pub fn show_label(&self, id: u64) -> Result<Label> {
        self.store.read(id)
    }

    pub fn create_label(&self, request: &LabelCreate) -> Result<Label> {
        model::validate_label_name(&request.name)?;
        let kind = EntityKind::Label;
        self.ensure_unique(
            kind,
            "name",
            &request.name,
            self.index.label_id_by_name(&request.name)?,
            None,
        )?;

        let label = Label {
            id: self.store.next_id(kind)?,
            name: request.name.clone(),
            created_at: Utc::now(),
        };
        self.store.write(&label)?;
        self.index.upsert_label(&label)?;
        self.refresh_fingerprint()?;
        tracing::info!(id = label.id, name = %label.name, "created label");
        Ok(label)
    }

    pub fn update_label(&self, id: u64, request: &LabelUpdate) -> Result<Label> {
        let current: Label = self.store.read(id)?;
        let next = request.apply(&current)?;
        self.ensure_unique(
            EntityKind::Label,
            "name",
            &next.name,
            self.index.label_id_by_name(&next.name)?,
            Some(id),
        )?;

        self.store.write(&next)?;
        self.index.upsert_label(&next)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, "updated label");
        Ok(next)
    }

    pub fn delete_label(&self, id: u64) -> Result<Label> {
        let label: Label = self.store.read(id)?;
        self.guard_unreferenced(&Reference::Label(id))?;
        self.store.delete(EntityKind::Label, id)?;
        self.index.remove_label(id)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, "deleted label");
        Ok(label)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.store.list_all()
    }

    pub fn show_user(&self, id: u64) -> Result<User> {
        self.store.read(id)
    }

    pub fn create_user(&self, request: &UserCreate) -> Result<User> {
        model::validate_email(&request.email)?;
        model::validate_password(&request.password)?;
        let kind = EntityKind::User;
        self.ensure_unique(
            kind,
            "email",
            &request.email,
            self.index.user_id_by_email(&request.email)?,
            None,
        )?;

        let now = Utc::now();
        let user = User {
            id: self.store.next_id(kind)?,
            email: request.email.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            password_hash: password::hash(&request.password, self.config.bcrypt_cost)?,
            created_at: now,
            updated_at: now,
        };
        self.store.write(&user)?;
        self.index.upsert_user(&user)?;
        self.refresh_fingerprint()?;
        tracing::info!(id = user.id, "created user");
        Ok(user)
    }

    pub fn update_user(&self, id: u64, request: &UserUpdate) -> Result<User> {
        let current: User = self.store.read(id)?;
        let next = request.apply(&current, self.config.bcrypt_cost)?;
        self.ensure_unique(
            EntityKind::User,
            "email",
            &next.email,
            self.index.user_id_by_email(&next.email)?,
            Some(id),
        )?;

        self.store.write(&next)?;
        self.index.upsert_user(&next)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, "updated user");
        Ok(next)
    }

    pub fn delete_user(&self, id: u64) -> Result<User> {
        let user: User = self.store.read(id)?;
        self.guard_unreferenced(&Reference::Assignee(id))?;
        self.store.delete(EntityKind::User, id)?;
        self.index.remove_user(id)?;
        self.refresh_fingerprint()?;
        tracing::info!(id, "deleted user");
        Ok(user)
    }

    /// Check an email/password pair against the stored hash.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let Some(id) = self.index.user_id_by_email(email)? else {
            return Err(TaskboardError::InvalidCredentials);
        };
        let user: User = self.store.read(id)?;
        if !password::verify(password, &user.password_hash) {
            return Err(TaskboardError::InvalidCredentials);
        }
        Ok(user)
    }
}
