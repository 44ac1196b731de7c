//! Building a [`TaskTree`] from the flat task table served by the data
//! endpoint.
//!
//! Each row carries its own `parent` link. Rows are attached in table order,
//! so sibling order follows row order. A row whose parent is null, blank, or
//! the `NULL` sentinel is a root; a row naming a parent that is not in the
//! table is attached at root with a warning. Rows that are never reachable
//! from a root (parent cycles) make the whole table invalid, as does a
//! negative row id, which would read back as a client placeholder.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::TaskTree;
use crate::cascade::collect_descendants;
use crate::codec::{CodecError, TimestampCodec};
use crate::error::ErrorCode;
use crate::model::{Field, NULL_SENTINEL, TaskId, TaskNode};
use crate::persist::TransportError;

/// A JSON scalar as emitted by loosely typed backends (`42`, `"42"`, `0.5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// One row of the task table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    pub id: Scalar,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub actual_start: Option<String>,
    #[serde(default)]
    pub actual_end: Option<String>,
    #[serde(default)]
    pub progress_value: Option<Scalar>,
    #[serde(default)]
    pub parent: Option<Scalar>,
}

/// Errors that make the initial table load fail. All are terminal for the
/// editing session.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("data endpoint reported failure: {0}")]
    Rejected(String),
    #[error("task table is not a JSON array of rows: {0}")]
    Malformed(String),
    #[error("task table contains id '{0}' more than once")]
    DuplicateId(TaskId),
    #[error("task table row id '{0}' collides with the placeholder id range")]
    PlaceholderId(String),
    #[error("task '{id}' has no {field}")]
    MissingTimestamp { id: TaskId, field: Field },
    #[error("task '{id}' has an invalid {field}: {source}")]
    Timestamp {
        id: TaskId,
        field: Field,
        source: CodecError,
    },
    #[error("{} task(s) are unreachable from any root (parent cycle): {}", .0.len(), join_ids(.0))]
    Cycle(Vec<TaskId>),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl LoadError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Rejected(_) => ErrorCode::TableLoadRejected,
            Self::Malformed(_)
            | Self::DuplicateId(_)
            | Self::PlaceholderId(_)
            | Self::Cycle(_) => ErrorCode::MalformedTable,
            Self::MissingTimestamp { .. } | Self::Timestamp { .. } => ErrorCode::InvalidTimestamp,
            Self::Transport(err) => err.code(),
        }
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Interpret a data-endpoint response body: an array of rows, or an object
/// with a `fail` member.
///
/// # Errors
///
/// [`LoadError::Rejected`] for a `fail` object, [`LoadError::Malformed`] for
/// anything that is not an array of rows.
pub fn parse_table(body: serde_json::Value) -> Result<Vec<TaskRow>, LoadError> {
    if let Some(fail) = body.get("fail") {
        return Err(LoadError::Rejected(fail.to_string()));
    }
    serde_json::from_value(body).map_err(|err| LoadError::Malformed(err.to_string()))
}

impl TaskTree {
    /// Build a tree from table rows. No notifications are emitted.
    ///
    /// # Errors
    ///
    /// See [`LoadError`].
    pub fn from_table(rows: Vec<TaskRow>, codec: TimestampCodec) -> Result<Self, LoadError> {
        let mut tree = Self::new();
        let mut links: Vec<(TaskId, Option<TaskId>)> = Vec::with_capacity(rows.len());

        for row in rows {
            let raw_id = row.id.into_text();
            if matches!(TaskId::parse(&raw_id), Ok(TaskId::Placeholder(_))) {
                return Err(LoadError::PlaceholderId(raw_id));
            }
            let id = TaskId::persistent(raw_id);
            let actual_start =
                decode_column(&id, Field::ActualStart, row.actual_start.as_deref(), codec)?;
            let actual_end = decode_column(&id, Field::ActualEnd, row.actual_end.as_deref(), codec)?;
            let parent = row
                .parent
                .map(Scalar::into_text)
                .filter(|raw| !raw.trim().is_empty() && raw != NULL_SENTINEL)
                .map(TaskId::persistent);

            if tree.nodes.contains_key(&id) {
                return Err(LoadError::DuplicateId(id));
            }
            tree.nodes.insert(
                id.clone(),
                TaskNode {
                    id: id.clone(),
                    name: row.name,
                    actual_start,
                    actual_end,
                    progress_value: row
                        .progress_value
                        .map_or_else(|| "0%".to_string(), Scalar::into_text),
                    parent: None,
                    children: Vec::new(),
                },
            );
            links.push((id, parent));
        }

        for (id, parent) in links {
            match parent {
                Some(parent_id) if tree.nodes.contains_key(&parent_id) => {
                    if let Some(parent_node) = tree.nodes.get_mut(&parent_id) {
                        parent_node.children.push(id.clone());
                    }
                    if let Some(node) = tree.nodes.get_mut(&id) {
                        node.parent = Some(parent_id);
                    }
                }
                Some(parent_id) => {
                    warn!(task = %id, parent = %parent_id, "parent row missing; attaching task at root");
                    tree.roots.push(id);
                }
                None => tree.roots.push(id),
            }
        }

        let reachable: usize = tree
            .roots
            .iter()
            .map(|root| collect_descendants(&tree, root).count())
            .sum();
        if reachable != tree.nodes.len() {
            let mut seen = std::collections::HashSet::new();
            for root in &tree.roots {
                seen.extend(collect_descendants(&tree, root).cloned());
            }
            let mut stranded: Vec<TaskId> = tree
                .nodes
                .keys()
                .filter(|id| !seen.contains(*id))
                .cloned()
                .collect();
            stranded.sort();
            return Err(LoadError::Cycle(stranded));
        }

        Ok(tree)
    }
}

fn decode_column(
    id: &TaskId,
    field: Field,
    raw: Option<&str>,
    codec: TimestampCodec,
) -> Result<i64, LoadError> {
    let raw = raw
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| LoadError::MissingTimestamp {
            id: id.clone(),
            field,
        })?;
    codec.decode(raw).map_err(|source| LoadError::Timestamp {
        id: id.clone(),
        field,
        source,
    })
}
