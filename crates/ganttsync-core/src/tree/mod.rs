//! In-memory task tree with chart-widget style change notifications.
//!
//! The tree mirrors the data-binding surface of the Gantt widget: nodes are
//! searched by ID, added under a parent (or at root), removed, reparented,
//! and have scalar fields written one at a time. Every mutation queues a
//! [`Notification`] while dispatch is enabled; the session drains the queue
//! after each user action and routes it.
//!
//! # Notification shapes
//!
//! The widget reports a reparent as two notifications: a `Remove` against
//! the old parent followed by a `Move` carrying the new parent. An explicit
//! removal produces only the `Remove`. The two `Remove` notifications are
//! indistinguishable on their own; see [`crate::router`] for how they are
//! told apart.
//!
//! # Dispatch suspension
//!
//! [`TaskTree::suspend_dispatch`] returns a [`DispatchGuard`]. While it is
//! alive, mutations are applied but not reported. Dropping the guard restores
//! the previous dispatch state on every exit path, including `?` returns and
//! unwinding.

pub mod table;

use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::cascade::{Hierarchy, cascade_set, collect_descendants};
use crate::error::ErrorCode;
use crate::model::{FieldChange, NewTask, TaskId, TaskNode};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Change notification emitted by the tree after a mutation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A node was inserted. `parent` is `None` for a root.
    Create {
        item: TaskId,
        parent: Option<TaskId>,
    },
    /// A node was attached under `new_parent` as the second half of a
    /// reparent.
    Move {
        item: TaskId,
        new_parent: Option<TaskId>,
    },
    /// A node was detached from `old_parent`, either by explicit removal or
    /// as the first half of a reparent. `subtree` snapshots the node and its
    /// descendants at detach time.
    Remove {
        item: TaskId,
        old_parent: Option<TaskId>,
        subtree: Subtree,
    },
    /// A scalar field was written. For an ID change, `item` is the new ID.
    Update { item: TaskId, change: FieldChange },
}

/// Snapshot of a detached node's child lists, enough to walk its cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    root: TaskId,
    children: HashMap<TaskId, Vec<TaskId>>,
}

impl Subtree {
    fn capture(tree: &TaskTree, root: &TaskId) -> Self {
        let children = collect_descendants(tree, root)
            .map(|id| {
                let kids = tree
                    .nodes
                    .get(id)
                    .map(|node| node.children.clone())
                    .unwrap_or_default();
                (id.clone(), kids)
            })
            .collect();
        Self {
            root: root.clone(),
            children,
        }
    }

    #[must_use]
    pub const fn root(&self) -> &TaskId {
        &self.root
    }
}

impl Hierarchy for Subtree {
    fn num_children(&self, id: &TaskId) -> usize {
        self.children.get(id).map_or(0, Vec::len)
    }

    fn child_at(&self, id: &TaskId, index: usize) -> Option<&TaskId> {
        self.children.get(id)?.get(index)
    }
}

/// Errors from tree mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("task not found: '{0}'")]
    NotFound(TaskId),
    #[error("task id '{0}' is already in use")]
    DuplicateId(TaskId),
    #[error("parent task not found: '{0}'")]
    ParentNotFound(TaskId),
    #[error("moving '{item}' under '{proposed_parent}' would create a cycle")]
    Cycle {
        item: TaskId,
        proposed_parent: TaskId,
    },
}

impl TreeError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) | Self::ParentNotFound(_) => ErrorCode::TaskNotFound,
            Self::DuplicateId(_) => ErrorCode::DuplicateTaskId,
            Self::Cycle { .. } => ErrorCode::CycleDetected,
        }
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Ordered forest of task nodes keyed by ID.
#[derive(Debug, Clone)]
pub struct TaskTree {
    nodes: HashMap<TaskId, TaskNode>,
    roots: Vec<TaskId>,
    dispatching: bool,
    pending: VecDeque<Notification>,
}

impl Default for TaskTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTree {
    /// Empty tree with dispatch enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            dispatching: true,
            pending: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node by ID.
    #[must_use]
    pub fn search(&self, id: &TaskId) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    /// Every node with its depth, in display (pre-order) order.
    #[must_use]
    pub fn outline(&self) -> Vec<(usize, &TaskNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, &TaskId)> = self.roots.iter().rev().map(|id| (0, id)).collect();
        while let Some((depth, id)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            out.push((depth, node));
            stack.extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        }
        out
    }

    // -- dispatch ----------------------------------------------------------

    #[must_use]
    pub const fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// Enable or disable notification dispatch.
    pub fn set_dispatch(&mut self, enabled: bool) {
        self.dispatching = enabled;
    }

    /// Suspend dispatch until the returned guard is dropped.
    pub fn suspend_dispatch(&mut self) -> DispatchGuard<'_> {
        let previous = self.dispatching;
        self.dispatching = false;
        DispatchGuard {
            tree: self,
            previous,
        }
    }

    /// Pop the oldest queued notification.
    pub fn next_notification(&mut self) -> Option<Notification> {
        self.pending.pop_front()
    }

    /// Take every queued notification in emission order.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.pending.drain(..).collect()
    }

    fn emit(&mut self, notification: Notification) {
        if self.dispatching {
            self.pending.push_back(notification);
        } else {
            trace!(?notification, "dispatch suspended; notification dropped");
        }
    }

    // -- mutations ---------------------------------------------------------

    /// Insert a new node as the last child of `parent` (or as the last root).
    ///
    /// # Errors
    ///
    /// [`TreeError::DuplicateId`] if `id` is taken,
    /// [`TreeError::ParentNotFound`] if `parent` is not in the tree.
    pub fn add_child(
        &mut self,
        parent: Option<&TaskId>,
        id: TaskId,
        task: NewTask,
    ) -> Result<(), TreeError> {
        if self.nodes.contains_key(&id) {
            return Err(TreeError::DuplicateId(id));
        }
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(TreeError::ParentNotFound(parent_id.clone()));
            }
        }

        let node = TaskNode::from_new(id.clone(), parent.cloned(), task);
        self.nodes.insert(id.clone(), node);
        self.attach(parent, id.clone());
        self.emit(Notification::Create {
            item: id,
            parent: parent.cloned(),
        });
        Ok(())
    }

    /// Remove a node and all of its descendants.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotFound`] if `id` is not in the tree.
    pub fn remove(&mut self, id: &TaskId) -> Result<(), TreeError> {
        let old_parent = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?
            .parent
            .clone();

        let subtree = Subtree::capture(self, id);
        self.detach(id, old_parent.as_ref());
        for member in cascade_set(&subtree, id) {
            self.nodes.remove(&member);
        }

        self.emit(Notification::Remove {
            item: id.clone(),
            old_parent,
            subtree,
        });
        Ok(())
    }

    /// Reparent a node (with its descendants) as the last child of
    /// `new_parent`, or as the last root.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotFound`] / [`TreeError::ParentNotFound`] for unknown
    /// IDs, [`TreeError::Cycle`] when `new_parent` is `id` or one of its
    /// descendants.
    pub fn move_to(&mut self, id: &TaskId, new_parent: Option<&TaskId>) -> Result<(), TreeError> {
        let old_parent = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?
            .parent
            .clone();

        if let Some(parent_id) = new_parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(TreeError::ParentNotFound(parent_id.clone()));
            }
            if collect_descendants(self, id).any(|member| member == parent_id) {
                return Err(TreeError::Cycle {
                    item: id.clone(),
                    proposed_parent: parent_id.clone(),
                });
            }
        }

        let subtree = Subtree::capture(self, id);
        self.detach(id, old_parent.as_ref());
        self.emit(Notification::Remove {
            item: id.clone(),
            old_parent,
            subtree,
        });

        self.attach(new_parent, id.clone());
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = new_parent.cloned();
        }
        self.emit(Notification::Move {
            item: id.clone(),
            new_parent: new_parent.cloned(),
        });
        Ok(())
    }

    /// Write one scalar field.
    ///
    /// Writing [`FieldChange::Id`] re-keys the node and patches its parent's
    /// child list and its children's parent references.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotFound`] if `id` is not in the tree,
    /// [`TreeError::DuplicateId`] if a new ID is already taken.
    pub fn set_field(&mut self, id: &TaskId, change: FieldChange) -> Result<(), TreeError> {
        let item = if let FieldChange::Id(new_id) = &change {
            if new_id != id {
                self.rekey(id, new_id.clone())?;
            } else if !self.nodes.contains_key(id) {
                return Err(TreeError::NotFound(id.clone()));
            }
            new_id.clone()
        } else {
            let node = self
                .nodes
                .get_mut(id)
                .ok_or_else(|| TreeError::NotFound(id.clone()))?;
            node.apply(&change);
            id.clone()
        };

        self.emit(Notification::Update { item, change });
        Ok(())
    }

    fn rekey(&mut self, old: &TaskId, new: TaskId) -> Result<(), TreeError> {
        if self.nodes.contains_key(&new) {
            return Err(TreeError::DuplicateId(new));
        }
        let mut node = self
            .nodes
            .remove(old)
            .ok_or_else(|| TreeError::NotFound(old.clone()))?;
        node.id = new.clone();

        for child in &node.children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = Some(new.clone());
            }
        }
        if let Some(siblings) = self.siblings_mut(node.parent.as_ref()) {
            for slot in siblings.iter_mut().filter(|slot| **slot == *old) {
                *slot = new.clone();
            }
        }

        self.nodes.insert(new, node);
        Ok(())
    }

    fn siblings_mut(&mut self, parent: Option<&TaskId>) -> Option<&mut Vec<TaskId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(parent_id) => self.nodes.get_mut(parent_id).map(|node| &mut node.children),
        }
    }

    fn attach(&mut self, parent: Option<&TaskId>, id: TaskId) {
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.push(id);
        }
    }

    fn detach(&mut self, id: &TaskId, parent: Option<&TaskId>) {
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.retain(|sibling| sibling != id);
        }
    }
}

impl Hierarchy for TaskTree {
    fn num_children(&self, id: &TaskId) -> usize {
        self.nodes.get(id).map_or(0, |node| node.children.len())
    }

    fn child_at(&self, id: &TaskId, index: usize) -> Option<&TaskId> {
        self.nodes.get(id)?.children.get(index)
    }
}

/// Scope guard returned by [`TaskTree::suspend_dispatch`].
#[derive(Debug)]
pub struct DispatchGuard<'a> {
    tree: &'a mut TaskTree,
    previous: bool,
}

impl Deref for DispatchGuard<'_> {
    type Target = TaskTree;

    fn deref(&self) -> &Self::Target {
        self.tree
    }
}

impl DerefMut for DispatchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tree
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.tree.dispatching = self.previous;
    }
}
