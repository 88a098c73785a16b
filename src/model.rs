use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskboardError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    Status,
    Label,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Task, Self::Status, Self::Label, Self::User];

    /// Directory under the store root holding one JSON file per record.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Status => "statuses",
            Self::Label => "labels",
            Self::User => "users",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Status => write!(f, "task status"),
            Self::Label => write!(f, "label"),
            Self::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(rename = "title")]
    pub name: String,
    #[serde(rename = "content", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Slug of the owning status.
    pub status: String,
    #[serde(rename = "assignee_id", default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<u64>,
    #[serde(rename = "label_ids", default)]
    pub labels: BTreeSet<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a user; the password hash never leaves the store.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserView<'a> {
    pub id: u64,
    pub email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn view(&self) -> UserView<'_> {
        UserView {
            id: self.id,
            email: &self.email,
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A task-to-entity edge in the derived back-reference index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    Status(String),
    Label(u64),
    Assignee(u64),
}

impl Reference {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Status(_) => EntityKind::Status,
            Self::Label(_) => EntityKind::Label,
            Self::Assignee(_) => EntityKind::User,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::Status(slug) => slug.clone(),
            Self::Label(id) | Self::Assignee(id) => id.to_string(),
        }
    }
}

impl Task {
    /// Every outgoing edge of this task, as stored in the back-reference index.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::Status(self.status.clone())];
        refs.extend(self.assignee.map(Reference::Assignee));
        refs.extend(self.labels.iter().copied().map(Reference::Label));
        refs
    }
}

pub fn validate_task_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TaskboardError::invalid("title must not be empty"));
    }
    Ok(())
}

pub fn validate_status_fields(name: &str, slug: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TaskboardError::invalid("status name must not be empty"));
    }
    if slug.trim().is_empty() {
        return Err(TaskboardError::invalid("status slug must not be empty"));
    }
    Ok(())
}

pub fn validate_label_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(3..=1000).contains(&len) {
        return Err(TaskboardError::invalid(
            "label name must be between 3 and 1000 characters",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(TaskboardError::invalid(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 3 {
        return Err(TaskboardError::invalid(
            "password must be at least 3 characters",
        ));
    }
    Ok(())
}
