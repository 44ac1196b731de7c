use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Wire token meaning "no parent / root level".
///
/// Distinct from an absent field: the backend receives the literal string.
pub const NULL_SENTINEL: &str = "NULL";

/// Identifier of a task node.
///
/// A `Placeholder` is assigned by the client when a task is created locally
/// and lives until the backend confirms the row and hands back a
/// `Persistent` identifier. Placeholders render as negative integers on the
/// wire (`-1`, `-2`, ...) so they can never collide with backend row IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    Placeholder(u32),
    Persistent(String),
}

impl TaskId {
    #[must_use]
    pub fn persistent(raw: impl Into<String>) -> Self {
        Self::Persistent(raw.into())
    }

    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// Parse user input: `-N` is a placeholder, anything else is persistent.
    ///
    /// # Errors
    ///
    /// Returns [`ParseEnumError`] for blank input or `-0`.
    pub fn parse(raw: &str) -> Result<Self, ParseEnumError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseEnumError {
                expected: "task id",
                got: raw.to_string(),
            });
        }
        if let Some(digits) = trimmed.strip_prefix('-') {
            return match digits.parse::<u32>() {
                Ok(n) if n > 0 => Ok(Self::Placeholder(n)),
                _ => Err(ParseEnumError {
                    expected: "task id",
                    got: raw.to_string(),
                }),
            };
        }
        Ok(Self::Persistent(trimmed.to_string()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder(n) => write!(f, "-{n}"),
            Self::Persistent(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parent reference as carried in create and move payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    Root,
    Task(TaskId),
}

impl ParentRef {
    #[must_use]
    pub fn from_option(parent: Option<&TaskId>) -> Self {
        parent.map_or(Self::Root, |id| Self::Task(id.clone()))
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str(NULL_SENTINEL),
            Self::Task(id) => id.fmt(f),
        }
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Editable task columns, named as the backend names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Name,
    ActualStart,
    ActualEnd,
    ProgressValue,
    Parent,
}

impl Field {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::ActualStart => "actualStart",
            Self::ActualEnd => "actualEnd",
            Self::ProgressValue => "progressValue",
            Self::Parent => "parent",
        }
    }

    /// Whether values of this field go through the timestamp codec.
    #[must_use]
    pub const fn is_timestamp(self) -> bool {
        matches!(self, Self::ActualStart | Self::ActualEnd)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "actualStart" | "actual_start" => Ok(Self::ActualStart),
            "actualEnd" | "actual_end" => Ok(Self::ActualEnd),
            "progressValue" | "progress_value" | "progress" => Ok(Self::ProgressValue),
            "parent" => Ok(Self::Parent),
            _ => Err(ParseEnumError {
                expected: "field",
                got: s.to_string(),
            }),
        }
    }
}

/// A single scalar write to a task node.
///
/// Reparenting is not a field change; it goes through
/// [`TaskTree::move_to`](crate::tree::TaskTree::move_to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Id(TaskId),
    Name(String),
    /// Epoch milliseconds.
    ActualStart(i64),
    /// Epoch milliseconds.
    ActualEnd(i64),
    ProgressValue(String),
}

impl FieldChange {
    #[must_use]
    pub const fn field(&self) -> Field {
        match self {
            Self::Id(_) => Field::Id,
            Self::Name(_) => Field::Name,
            Self::ActualStart(_) => Field::ActualStart,
            Self::ActualEnd(_) => Field::ActualEnd,
            Self::ProgressValue(_) => Field::ProgressValue,
        }
    }
}

/// Field values for a task that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub actual_start: i64,
    pub actual_end: i64,
    pub progress_value: String,
}

impl NewTask {
    /// A fresh task at `0%` progress.
    #[must_use]
    pub fn new(name: impl Into<String>, actual_start: i64, actual_end: i64) -> Self {
        Self {
            name: name.into(),
            actual_start,
            actual_end,
            progress_value: "0%".to_string(),
        }
    }
}

/// One node of the task tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    pub id: TaskId,
    pub name: String,
    /// Epoch milliseconds.
    pub actual_start: i64,
    /// Epoch milliseconds.
    pub actual_end: i64,
    pub progress_value: String,
    pub parent: Option<TaskId>,
    pub children: Vec<TaskId>,
}

impl TaskNode {
    #[must_use]
    pub fn from_new(id: TaskId, parent: Option<TaskId>, task: NewTask) -> Self {
        Self {
            id,
            name: task.name,
            actual_start: task.actual_start,
            actual_end: task.actual_end,
            progress_value: task.progress_value,
            parent,
            children: Vec::new(),
        }
    }

    pub(crate) fn apply(&mut self, change: &FieldChange) {
        match change {
            FieldChange::Id(id) => self.id = id.clone(),
            FieldChange::Name(name) => self.name.clone_from(name),
            FieldChange::ActualStart(ms) => self.actual_start = *ms,
            FieldChange::ActualEnd(ms) => self.actual_end = *ms,
            FieldChange::ProgressValue(value) => self.progress_value.clone_from(value),
        }
    }
}

/// Error returned when parsing an identifier or enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}
