//! Edit form input and view state.
//!
//! The form has three inputs (name, actual start, actual end). With a task
//! selected it edits that task; without one it creates a new root task.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::codec::{TIMESTAMP_FORMAT, TimestampCodec};
use crate::error::ErrorCode;
use crate::model::{NewTask, TaskId, TaskNode};

/// Accepted input formats. Seconds are optional and always reset to zero.
const INPUT_FORMATS: [&str; 2] = [TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} '{input}' is not a `YYYY-MM-DD HH:MM` timestamp")]
    Timestamp { field: &'static str, input: String },
}

impl ValidationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidFormInput
    }
}

/// Raw form contents, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormInput {
    pub name: Option<String>,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
}

impl FormInput {
    #[must_use]
    pub fn new(name: &str, actual_start: &str, actual_end: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            actual_start: Some(actual_start.to_string()),
            actual_end: Some(actual_end.to_string()),
        }
    }

    /// Parse `name | start | end`. Missing segments stay `None`.
    #[must_use]
    pub fn parse_line(line: &str) -> Self {
        let mut parts = line.splitn(3, '|').map(|part| part.trim().to_string());
        Self {
            name: parts.next(),
            actual_start: parts.next(),
            actual_end: parts.next(),
        }
    }

    /// Check all three inputs and convert the timestamps to epoch ms.
    ///
    /// # Errors
    ///
    /// [`ValidationError::Missing`] for an absent or blank input,
    /// [`ValidationError::Timestamp`] for an unparseable timestamp.
    pub fn validate(&self, codec: TimestampCodec) -> Result<NewTask, ValidationError> {
        let name = required("name", self.name.as_deref())?;
        let start = required("actual start", self.actual_start.as_deref())?;
        let end = required("actual end", self.actual_end.as_deref())?;
        Ok(NewTask::new(
            name,
            to_minute_millis("actual start", start, codec)?,
            to_minute_millis("actual end", end, codec)?,
        ))
    }
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(ValidationError::Missing(field)),
    }
}

fn to_minute_millis(
    field: &'static str,
    input: &str,
    codec: TimestampCodec,
) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::Timestamp {
        field,
        input: input.to_string(),
    };
    let wall = INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .and_then(|parsed| parsed.with_second(0))
        .ok_or_else(invalid)?;
    codec
        .decode(&wall.format(TIMESTAMP_FORMAT).to_string())
        .map_err(|_| invalid())
}

/// What the edit form shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FormView {
    CreateRoot,
    EditExisting {
        id: TaskId,
        name: String,
        actual_start: String,
        actual_end: String,
    },
}

impl FormView {
    /// Form for editing `node`. Timestamps are shown through `codec`; an
    /// unrepresentable value is shown as raw epoch ms.
    #[must_use]
    pub fn for_node(node: &TaskNode, codec: TimestampCodec) -> Self {
        let show = |ms: i64| codec.encode(ms).unwrap_or_else(|_| ms.to_string());
        Self::EditExisting {
            id: node.id.clone(),
            name: node.name.clone(),
            actual_start: show(node.actual_start),
            actual_end: show(node.actual_end),
        }
    }

    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::CreateRoot => "Add new root task:".to_string(),
            Self::EditExisting { id, .. } => format!("Selected item ID: {id}"),
        }
    }

    /// Label of the save button.
    #[must_use]
    pub const fn save_label(&self) -> &'static str {
        match self {
            Self::CreateRoot => "Add new task",
            Self::EditExisting { .. } => "Save selected task",
        }
    }

    /// Remove and add-child need a selected task.
    #[must_use]
    pub const fn has_selection(&self) -> bool {
        matches!(self, Self::EditExisting { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTC: TimestampCodec = TimestampCodec::with_offset(0);
    const NINE_AM: i64 = 1_493_715_600_000; // 2017-05-02 09:00:00 UTC

    #[test]
    fn valid_input_resets_seconds() {
        let input = FormInput::new("Design", "2017-05-02 09:00:45", "2017-05-02 17:00");
        let task = input.validate(UTC).unwrap();
        assert_eq!(task.name, "Design");
        assert_eq!(task.actual_start, NINE_AM);
        assert_eq!(task.actual_end, NINE_AM + 8 * 3_600_000);
        assert_eq!(task.progress_value, "0%");
    }

    #[test]
    fn offset_is_applied() {
        let input = FormInput::new("Design", "2017-05-02 12:00", "2017-05-02 20:00");
        let task = input.validate(TimestampCodec::with_offset(-180)).unwrap();
        assert_eq!(task.actual_start, NINE_AM);
    }

    #[test]
    fn blank_or_missing_fields_are_rejected() {
        let blank_name = FormInput::new("  ", "2017-05-02 09:00", "2017-05-02 17:00");
        assert_eq!(
            blank_name.validate(UTC).unwrap_err(),
            ValidationError::Missing("name")
        );

        let missing_end = FormInput::parse_line("Design | 2017-05-02 09:00");
        assert_eq!(
            missing_end.validate(UTC).unwrap_err(),
            ValidationError::Missing("actual end")
        );
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let input = FormInput::new("Design", "tomorrow", "2017-05-02 17:00");
        let err = input.validate(UTC).unwrap_err();
        assert!(matches!(err, ValidationError::Timestamp { field: "actual start", .. }));
        assert_eq!(err.code(), ErrorCode::InvalidFormInput);
    }

    #[test]
    fn parse_line_splits_on_pipes() {
        let input = FormInput::parse_line(" Design |2017-05-02 09:00 | 2017-05-02 17:00 ");
        assert_eq!(
            input,
            FormInput::new("Design", "2017-05-02 09:00", "2017-05-02 17:00")
        );
    }

    #[test]
    fn view_titles_follow_mode() {
        let node = TaskNode::from_new(
            TaskId::persistent("42"),
            None,
            NewTask::new("Design", NINE_AM, NINE_AM + 3_600_000),
        );
        let view = FormView::for_node(&node, UTC);
        assert_eq!(view.title(), "Selected item ID: 42");
        assert_eq!(view.save_label(), "Save selected task");
        assert!(view.has_selection());
        assert_eq!(
            view,
            FormView::EditExisting {
                id: TaskId::persistent("42"),
                name: "Design".into(),
                actual_start: "2017-05-02 09:00:00".into(),
                actual_end: "2017-05-02 10:00:00".into(),
            }
        );

        assert_eq!(FormView::CreateRoot.title(), "Add new root task:");
        assert!(!FormView::CreateRoot.has_selection());
    }
}
