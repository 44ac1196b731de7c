//! Mutation router: classifies raw tree notifications into [`Mutation`]s.
//!
//! # The remove flag
//!
//! A reparent is reported by the tree as a `Remove` (old parent context)
//! followed by a `Move` (new parent). An explicit removal is reported as the
//! same `Remove` on its own. The router tells them apart with a single flag
//! that only the explicit remove action arms:
//!
//! - `Remove` with the flag armed: a real deletion. The flag is cleared.
//! - `Remove` with the flag unset: the first half of a reparent. Ignored.
//!
//! The flag is cleared on every `Remove` it sees, whatever the outcome, so a
//! stale arm can never turn a later reparent into a deletion. Arming the flag
//! and then not removing anything is a caller bug; see
//! [`Router::disarm_remove`].

use std::mem;

use tracing::debug;

use crate::cascade::cascade_set;
use crate::model::{FieldChange, TaskId};
use crate::tree::Notification;

/// A classified edit, ready for the intent builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Created {
        item: TaskId,
        parent: Option<TaskId>,
    },
    FieldUpdated {
        item: TaskId,
        change: FieldChange,
    },
    MovedTo {
        item: TaskId,
        new_parent: Option<TaskId>,
    },
    /// `cascade` is the removed node followed by its descendants, pre-order.
    Removed {
        item: TaskId,
        cascade: Vec<TaskId>,
    },
}

impl Mutation {
    #[must_use]
    pub const fn item(&self) -> &TaskId {
        match self {
            Self::Created { item, .. }
            | Self::FieldUpdated { item, .. }
            | Self::MovedTo { item, .. }
            | Self::Removed { item, .. } => item,
        }
    }
}

/// Everything the router listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Tree(Notification),
    /// A row was clicked (`Some`) or the selection was cleared (`None`).
    RowSelect(Option<TaskId>),
}

/// What to do with a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Persist(Mutation),
    Select(Option<TaskId>),
    Skip,
}

#[derive(Debug, Default)]
pub struct Router {
    remove_armed: bool,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the next `Remove` notification as an explicit deletion.
    pub fn arm_remove(&mut self) {
        self.remove_armed = true;
    }

    /// Undo [`arm_remove`](Self::arm_remove) when the removal it announced
    /// did not happen.
    pub fn disarm_remove(&mut self) {
        self.remove_armed = false;
    }

    #[must_use]
    pub const fn is_remove_armed(&self) -> bool {
        self.remove_armed
    }

    pub fn route(&mut self, signal: Signal) -> Route {
        match signal {
            Signal::Tree(notification) => self.classify(notification),
            Signal::RowSelect(selection) => Route::Select(selection),
        }
    }

    fn classify(&mut self, notification: Notification) -> Route {
        match notification {
            Notification::Create { item, parent } => {
                Route::Persist(Mutation::Created { item, parent })
            }
            Notification::Update { item, change } => {
                Route::Persist(Mutation::FieldUpdated { item, change })
            }
            Notification::Move { item, new_parent } => {
                Route::Persist(Mutation::MovedTo { item, new_parent })
            }
            Notification::Remove { item, subtree, .. } => {
                if mem::take(&mut self.remove_armed) {
                    let cascade = cascade_set(&subtree, subtree.root());
                    Route::Persist(Mutation::Removed { item, cascade })
                } else {
                    debug!(item = %item, "remove without armed flag: reparent, skipping");
                    Route::Skip
                }
            }
        }
    }
}
