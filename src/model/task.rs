use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Done,
    Dismissed,
}

impl TaskStatus {
    /// The character used inside the checkbox `[ ]` of the outline
    pub fn checkbox_char(self) -> char {
        match self {
            TaskStatus::Active => ' ',
            TaskStatus::Done => 'x',
            TaskStatus::Dismissed => '~',
        }
    }

    /// Parse a checkbox character into a status
    pub fn from_checkbox_char(c: char) -> Option<TaskStatus> {
        match c {
            ' ' => Some(TaskStatus::Active),
            'x' => Some(TaskStatus::Done),
            '~' => Some(TaskStatus::Dismissed),
            _ => None,
        }
    }

    pub fn is_closed(self) -> bool {
        !matches!(self, TaskStatus::Active)
    }
}

/// The reference payload carried by tree nodes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Tags (without the `@` prefix)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Work may begin on this day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Task {
            title: title.into(),
            ..Task::default()
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_due(mut self, due: NaiveDate) -> Self {
        self.due = Some(due);
        self
    }

    /// Case-insensitive tag match; a leading `@` on `tag` is ignored
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.strip_prefix('@').unwrap_or(tag);
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }

    /// No start date, or a start date on or before `today`
    pub fn is_started(&self, today: NaiveDate) -> bool {
        self.start.is_none_or(|start| start <= today)
    }

    /// Active with a due date strictly before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_active() && self.due.is_some_and(|due| due < today)
    }
}
