//! Identifier reconciler.
//!
//! Tracks which placeholder belongs to which in-flight create request and,
//! once the backend confirms the row, swaps the placeholder for the
//! persistent identifier. The swap is a plain ID write on the tree performed
//! with dispatch suspended, so it never reaches the router as a field update.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::model::{FieldChange, TaskId};
use crate::session::Ticket;
use crate::tree::{TaskTree, TreeError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("placeholder '{0}' has no pending create")]
    NotPending(TaskId),
    #[error("cannot substitute identifier: {0}")]
    Tree(#[from] TreeError),
}

impl ReconcileError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotPending(_) => ErrorCode::PlaceholderNotPending,
            Self::Tree(err) => err.code(),
        }
    }
}

/// Pending-identifier table: placeholder to the ticket of its create.
#[derive(Debug, Default)]
pub struct Reconciler {
    pending: HashMap<TaskId, Ticket>,
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, placeholder: TaskId, ticket: Ticket) {
        self.pending.insert(placeholder, ticket);
    }

    #[must_use]
    pub fn is_pending(&self, placeholder: &TaskId) -> bool {
        self.pending.contains_key(placeholder)
    }

    /// The placeholder whose create was dispatched under `ticket`.
    #[must_use]
    pub fn placeholder_for(&self, ticket: Ticket) -> Option<&TaskId> {
        self.pending
            .iter()
            .find_map(|(placeholder, pending)| (*pending == ticket).then_some(placeholder))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Replace `placeholder` with `persistent` on its node.
    ///
    /// The pending entry is dropped even when the tree write fails (for
    /// example because the node was removed before the response arrived).
    ///
    /// # Errors
    ///
    /// [`ReconcileError::NotPending`] when `placeholder` was never registered
    /// or already resolved, [`ReconcileError::Tree`] when the ID write fails.
    pub fn on_create_confirmed(
        &mut self,
        tree: &mut TaskTree,
        placeholder: &TaskId,
        persistent: TaskId,
    ) -> Result<(), ReconcileError> {
        if self.pending.remove(placeholder).is_none() {
            return Err(ReconcileError::NotPending(placeholder.clone()));
        }

        let mut tree = tree.suspend_dispatch();
        tree.set_field(placeholder, FieldChange::Id(persistent.clone()))?;
        info!(placeholder = %placeholder, id = %persistent, "create confirmed");
        Ok(())
    }

    /// Forget a create that failed. The node keeps its placeholder.
    pub fn on_create_failed(&mut self, placeholder: &TaskId) {
        if self.pending.remove(placeholder).is_some() {
            warn!(placeholder = %placeholder, "create failed; task keeps its placeholder id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTask;

    fn tree_with_placeholder() -> TaskTree {
        let mut tree = TaskTree::new();
        tree.add_child(None, TaskId::persistent("42"), NewTask::new("Root", 0, 1))
            .unwrap();
        tree.add_child(
            Some(&TaskId::persistent("42")),
            TaskId::Placeholder(1),
            NewTask::new("Child", 0, 1),
        )
        .unwrap();
        tree.add_child(
            Some(&TaskId::Placeholder(1)),
            TaskId::persistent("99"),
            NewTask::new("Grandchild", 0, 1),
        )
        .unwrap();
        tree.drain_notifications();
        tree
    }

    #[test]
    fn confirmation_substitutes_silently() {
        let mut tree = tree_with_placeholder();
        let mut reconciler = Reconciler::new();
        reconciler.register(TaskId::Placeholder(1), Ticket::new(7));
        assert_eq!(
            reconciler.placeholder_for(Ticket::new(7)),
            Some(&TaskId::Placeholder(1))
        );

        reconciler
            .on_create_confirmed(&mut tree, &TaskId::Placeholder(1), TaskId::persistent("57"))
            .unwrap();

        assert!(tree.search(&TaskId::Placeholder(1)).is_none());
        let node = tree.search(&TaskId::persistent("57")).unwrap();
        assert_eq!(node.name, "Child");
        assert_eq!(node.parent, Some(TaskId::persistent("42")));
        assert_eq!(
            tree.search(&TaskId::persistent("99")).unwrap().parent,
            Some(TaskId::persistent("57"))
        );
        assert!(tree.drain_notifications().is_empty());
        assert!(tree.is_dispatching());
        assert!(reconciler.is_empty());
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let mut tree = tree_with_placeholder();
        let mut reconciler = Reconciler::new();
        let err = reconciler
            .on_create_confirmed(&mut tree, &TaskId::Placeholder(1), TaskId::persistent("57"))
            .unwrap_err();
        assert_eq!(err, ReconcileError::NotPending(TaskId::Placeholder(1)));
        assert_eq!(err.code(), ErrorCode::PlaceholderNotPending);
        assert!(tree.search(&TaskId::Placeholder(1)).is_some());
    }

    #[test]
    fn vanished_node_resumes_dispatch_and_drops_entry() {
        let mut tree = tree_with_placeholder();
        tree.remove(&TaskId::Placeholder(1)).unwrap();
        tree.drain_notifications();

        let mut reconciler = Reconciler::new();
        reconciler.register(TaskId::Placeholder(1), Ticket::new(1));
        let err = reconciler
            .on_create_confirmed(&mut tree, &TaskId::Placeholder(1), TaskId::persistent("57"))
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Tree(TreeError::NotFound(_))));
        assert!(tree.is_dispatching());
        assert!(!reconciler.is_pending(&TaskId::Placeholder(1)));
    }

    #[test]
    fn colliding_persistent_id_is_refused() {
        let mut tree = tree_with_placeholder();
        let mut reconciler = Reconciler::new();
        reconciler.register(TaskId::Placeholder(1), Ticket::new(1));
        let err = reconciler
            .on_create_confirmed(&mut tree, &TaskId::Placeholder(1), TaskId::persistent("42"))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Tree(TreeError::DuplicateId(_))));
        assert!(tree.search(&TaskId::Placeholder(1)).is_some());
    }

    #[test]
    fn failure_keeps_placeholder() {
        let mut tree = tree_with_placeholder();
        let mut reconciler = Reconciler::new();
        reconciler.register(TaskId::Placeholder(1), Ticket::new(3));
        reconciler.on_create_failed(&TaskId::Placeholder(1));
        assert!(reconciler.is_empty());
        assert!(tree.search(&TaskId::Placeholder(1)).is_some());
        assert!(tree.drain_notifications().is_empty());
    }
}
