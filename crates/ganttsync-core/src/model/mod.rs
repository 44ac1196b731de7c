pub mod task;

pub use task::{
    Field, FieldChange, NULL_SENTINEL, NewTask, ParentRef, ParseEnumError, TaskId, TaskNode,
};
