//! Task listing filters.
//!
//! [`TaskFilter`] holds the optional query parameters; [`TaskFilter::build`]
//! folds the present ones into a single [`Predicate`]. The predicate is a plain
//! expression tree: stores either evaluate it in memory via
//! [`Predicate::matches`] or compile it to their own query language.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskboardError};
use crate::model::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every task.
    All,
    AssigneeIs(u64),
    /// Needle is stored case-folded.
    TitleContains(String),
    StatusIs(String),
    HasLabel(u64),
    /// Conjunction of at least two non-`All` terms, never nested.
    And(Vec<Predicate>),
}

/// Case folding applied to both sides of a title comparison.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

impl Predicate {
    pub fn title_contains(needle: &str) -> Self {
        Self::TitleContains(fold_case(needle))
    }

    /// Logical AND. `All` is the identity and nested conjunctions are
    /// flattened, so any grouping of the same terms yields the same tree.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Self::All, p) | (p, Self::All) => p,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut terms), p) => {
                terms.push(p);
                Self::And(terms)
            }
            (p, Self::And(mut terms)) => {
                terms.insert(0, p);
                Self::And(terms)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::AssigneeIs(id) => task.assignee == Some(*id),
            Self::TitleContains(needle) => fold_case(&task.name).contains(needle.as_str()),
            Self::StatusIs(slug) => task.status == *slug,
            Self::HasLabel(id) => task.labels.contains(id),
            Self::And(terms) => terms.iter().all(|term| term.matches(task)),
        }
    }
}

/// Optional listing filters; an absent field contributes no term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<u64>,
    #[serde(
        default,
        rename = "titleCont",
        alias = "title_cont",
        skip_serializing_if = "Option::is_none"
    )]
    pub title_cont: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        default,
        rename = "labelId",
        alias = "label_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub label_id: Option<u64>,
}

impl TaskFilter {
    pub fn build(&self) -> Predicate {
        [
            self.assignee_id.map(Predicate::AssigneeIs),
            self.title_cont.as_deref().map(Predicate::title_contains),
            self.status.clone().map(Predicate::StatusIs),
            self.label_id.map(Predicate::HasLabel),
        ]
        .into_iter()
        .flatten()
        .fold(Predicate::All, Predicate::and)
    }
}

/// A 1-indexed page of fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Result<Self> {
        if page < 1 {
            return Err(TaskboardError::invalid("page numbers start at 1"));
        }
        if size < 1 {
            return Err(TaskboardError::invalid("page size must be positive"));
        }
        Ok(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Zero-based offset of the first row on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPage {
    pub page: u32,
    pub page_size: u32,
    /// Number of tasks matching the predicate across all pages.
    pub total: u64,
    pub tasks: Vec<Task>,
}

impl TaskPage {
    /// Filter, order by id, and slice an in-memory task collection.
    pub fn collect<'a>(
        tasks: impl IntoIterator<Item = &'a Task>,
        predicate: &Predicate,
        request: PageRequest,
    ) -> Self {
        let mut matching: Vec<&Task> = tasks.into_iter().filter(|t| predicate.matches(t)).collect();
        matching.sort_by_key(|t| t.id);
        let total = matching.len() as u64;
        let tasks = matching
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.size() as usize)
            .cloned()
            .collect();
        Self {
            page: request.page(),
            page_size: request.size(),
            total,
            tasks,
        }
    }
}
