//! Edit-intent builder: turns a classified [`Mutation`] into the exact
//! request payload for the persistence endpoint.
//!
//! | Mutation       | Payload                                              |
//! |----------------|------------------------------------------------------|
//! | `Created`      | `action=create, name, actualStart, actualEnd, parent` |
//! | `FieldUpdated` | `action=update, id, field, value`                     |
//! | `MovedTo`      | `action=update, id, field=parent, value`              |
//! | `Removed`      | `action=delete, id, ids`                              |
//!
//! Timestamps are encoded with the session's [`TimestampCodec`]. A missing
//! parent is sent as the `NULL` sentinel, never omitted.

use serde::Serialize;
use std::fmt;

use crate::codec::{CodecError, TimestampCodec};
use crate::error::ErrorCode;
use crate::model::{Field, FieldChange, ParentRef, TaskId};
use crate::router::Mutation;
use crate::tree::TaskTree;

/// The three backend verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persistence request, as a flat field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PersistRequest {
    Create {
        name: String,
        #[serde(rename = "actualStart")]
        actual_start: String,
        #[serde(rename = "actualEnd")]
        actual_end: String,
        parent: ParentRef,
    },
    Update {
        id: TaskId,
        field: Field,
        value: String,
    },
    Delete {
        id: TaskId,
        ids: Vec<TaskId>,
    },
}

impl PersistRequest {
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Create { .. } => Action::Create,
            Self::Update { .. } => Action::Update,
            Self::Delete { .. } => Action::Delete,
        }
    }

    /// The task this request targets, if it names one.
    #[must_use]
    pub const fn target(&self) -> Option<&TaskId> {
        match self {
            Self::Create { .. } => None,
            Self::Update { id, .. } | Self::Delete { id, .. } => Some(id),
        }
    }

    /// Form-encoding pairs. List values use the `ids[]` bracket convention.
    #[must_use]
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("action".to_string(), self.action().to_string())];
        match self {
            Self::Create {
                name,
                actual_start,
                actual_end,
                parent,
            } => {
                pairs.push(("name".to_string(), name.clone()));
                pairs.push(("actualStart".to_string(), actual_start.clone()));
                pairs.push(("actualEnd".to_string(), actual_end.clone()));
                pairs.push(("parent".to_string(), parent.to_string()));
            }
            Self::Update { id, field, value } => {
                pairs.push(("id".to_string(), id.to_string()));
                pairs.push(("field".to_string(), field.to_string()));
                pairs.push(("value".to_string(), value.clone()));
            }
            Self::Delete { id, ids } => {
                pairs.push(("id".to_string(), id.to_string()));
                pairs.extend(ids.iter().map(|member| ("ids[]".to_string(), member.to_string())));
            }
        }
        pairs
    }
}

impl fmt::Display for PersistRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .form_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        f.write_str(&rendered.join(" "))
    }
}

/// Errors while building a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("created task '{0}' is no longer in the tree")]
    MissingNode(TaskId),
    #[error("cannot encode {field} of task '{id}': {source}")]
    Timestamp {
        id: TaskId,
        field: Field,
        source: CodecError,
    },
}

impl IntentError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingNode(_) => ErrorCode::TaskNotFound,
            Self::Timestamp { .. } => ErrorCode::InvalidTimestamp,
        }
    }
}

/// Build the request for one mutation.
///
/// `tree` is consulted only for `Created`, to read the new node's fields.
///
/// # Errors
///
/// [`IntentError::MissingNode`] when a created node has already gone,
/// [`IntentError::Timestamp`] when a timestamp cannot be encoded.
pub fn build(
    mutation: &Mutation,
    tree: &TaskTree,
    codec: TimestampCodec,
) -> Result<PersistRequest, IntentError> {
    match mutation {
        Mutation::Created { item, parent } => {
            let node = tree
                .search(item)
                .ok_or_else(|| IntentError::MissingNode(item.clone()))?;
            Ok(PersistRequest::Create {
                name: node.name.clone(),
                actual_start: encode_field(codec, item, Field::ActualStart, node.actual_start)?,
                actual_end: encode_field(codec, item, Field::ActualEnd, node.actual_end)?,
                parent: ParentRef::from_option(parent.as_ref()),
            })
        }
        Mutation::FieldUpdated { item, change } => {
            let value = match change {
                FieldChange::Id(id) => id.to_string(),
                FieldChange::Name(text) | FieldChange::ProgressValue(text) => text.clone(),
                FieldChange::ActualStart(ms) | FieldChange::ActualEnd(ms) => {
                    encode_field(codec, item, change.field(), *ms)?
                }
            };
            Ok(PersistRequest::Update {
                id: item.clone(),
                field: change.field(),
                value,
            })
        }
        Mutation::MovedTo { item, new_parent } => Ok(PersistRequest::Update {
            id: item.clone(),
            field: Field::Parent,
            value: ParentRef::from_option(new_parent.as_ref()).to_string(),
        }),
        Mutation::Removed { item, cascade } => Ok(PersistRequest::Delete {
            id: item.clone(),
            ids: cascade.clone(),
        }),
    }
}

fn encode_field(
    codec: TimestampCodec,
    id: &TaskId,
    field: Field,
    millis: i64,
) -> Result<String, IntentError> {
    codec.encode(millis).map_err(|source| IntentError::Timestamp {
        id: id.clone(),
        field,
        source,
    })
}
