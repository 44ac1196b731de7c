//! Cascade resolution for explicit task removal.
//!
//! The backend has no foreign keys between task rows, so deleting a parent
//! must name every descendant row too. [`collect_descendants`] walks the
//! subtree depth-first in pre-order, starting at (and including) the removed
//! node and visiting children in their current order.
//!
//! The walk only needs two read operations, captured by [`Hierarchy`]; both
//! the live [`TaskTree`](crate::tree::TaskTree) and a detached
//! [`Subtree`](crate::tree::Subtree) snapshot implement it.

use crate::model::TaskId;

/// Read access to ordered child lists.
pub trait Hierarchy {
    /// Number of direct children of `id` (zero when `id` is unknown).
    fn num_children(&self, id: &TaskId) -> usize;

    /// The child of `id` at `index`, in current child order.
    fn child_at(&self, id: &TaskId, index: usize) -> Option<&TaskId>;
}

/// Pre-order iterator over a node and all of its descendants.
///
/// Cloning forks the walk at its current position; call
/// [`collect_descendants`] again for a fresh walk.
#[derive(Debug)]
pub struct Descendants<'a, H: ?Sized> {
    tree: &'a H,
    stack: Vec<&'a TaskId>,
}

impl<H: ?Sized> Clone for Descendants<'_, H> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            stack: self.stack.clone(),
        }
    }
}

impl<'a, H: Hierarchy + ?Sized> Iterator for Descendants<'a, H> {
    type Item = &'a TaskId;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let current = self.stack.pop()?;
        let count = tree.num_children(current);
        // Reverse push so the first child is popped first.
        for index in (0..count).rev() {
            if let Some(child) = tree.child_at(current, index) {
                self.stack.push(child);
            }
        }
        Some(current)
    }
}

/// Walk `root` and its descendants depth-first, pre-order.
pub fn collect_descendants<'a, H: Hierarchy + ?Sized>(
    tree: &'a H,
    root: &'a TaskId,
) -> Descendants<'a, H> {
    Descendants {
        tree,
        stack: vec![root],
    }
}

/// Owned cascade set for a delete request.
#[must_use]
pub fn cascade_set<H: Hierarchy + ?Sized>(tree: &H, root: &TaskId) -> Vec<TaskId> {
    collect_descendants(tree, root).cloned().collect()
}
