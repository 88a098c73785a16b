//! Three-state field for sparse update payloads.
//!
//! A JSON key that is missing deserializes to [`Patch::Absent`] (the field must
//! carry `#[serde(default)]`), an explicit `null` to [`Patch::Null`], and
//! anything else to [`Patch::Value`]. Collapsing these into `Option<T>` would
//! make "leave unchanged" indistinguishable from "clear".

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TaskboardError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Self::Absent => Patch::Absent,
            Self::Null => Patch::Null,
            Self::Value(v) => Patch::Value(v),
        }
    }

    /// For a field that cannot be cleared: `None` when absent, and a null is
    /// rejected as a validation failure naming `field`.
    pub fn required(self, field: &str) -> Result<Option<T>> {
        match self {
            Self::Absent => Ok(None),
            Self::Null => Err(TaskboardError::invalid(format!("{field} cannot be null"))),
            Self::Value(v) => Ok(Some(v)),
        }
    }

    /// Resolve an optional field against its current value.
    pub fn merge(self, current: Option<T>) -> Option<T> {
        match self {
            Self::Absent => current,
            Self::Null => None,
            Self::Value(v) => Some(v),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|value| match value {
            Some(v) => Self::Value(v),
            None => Self::Null,
        })
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Absent | Self::Null => serializer.serialize_none(),
            Self::Value(v) => serializer.serialize_some(v),
        }
    }
}
