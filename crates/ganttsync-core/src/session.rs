//! Editing session: owns the task tree, the selection, the router, the
//! pending-identifier table, and the outbox of persistence requests.
//!
//! Every user action mutates the tree and then drains the tree's
//! notifications through the router and the intent builder. Each resulting
//! request is queued as a [`Dispatch`] with a fresh [`Ticket`]. The caller
//! sends dispatches however it likes and hands each outcome back with
//! [`Session::complete`], in any order.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::TimestampCodec;
use crate::error::ErrorCode;
use crate::form::{FormInput, FormView, ValidationError};
use crate::intent::{self, Action, PersistRequest};
use crate::model::{FieldChange, ParentRef, TaskId};
use crate::persist::{PersistResponse, PersistenceClient, TransportError};
use crate::reconcile::Reconciler;
use crate::router::{Mutation, Route, Router, Signal};
use crate::tree::{TaskTree, TreeError};

/// Correlates a dispatched request with its eventual outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticket(u64);

impl Ticket {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One request waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub request: PersistRequest,
}

/// Result of handing an outcome back to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Completion {
    /// A create succeeded and its placeholder was replaced.
    Confirmed {
        ticket: Ticket,
        placeholder: TaskId,
        id: TaskId,
    },
    /// The request succeeded; nothing local changed.
    Acknowledged { ticket: Ticket, action: Action },
    /// Transport failure or a falsy `success`. Logged only.
    Failed {
        ticket: Ticket,
        action: Action,
        reason: String,
    },
    /// The ticket is not in flight (never issued, or already completed).
    Unknown { ticket: Ticket },
}

/// One request sent by [`Session::pump`] and what came of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub request: PersistRequest,
    pub completion: Completion,
}

/// Request counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid data, please recheck: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("no task selected")]
    NothingSelected,
}

impl SessionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(err) => err.code(),
            Self::Tree(err) => err.code(),
            Self::NothingSelected => ErrorCode::NothingSelected,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    tree: TaskTree,
    selection: Option<TaskId>,
    router: Router,
    reconciler: Reconciler,
    codec: TimestampCodec,
    outbox: VecDeque<Dispatch>,
    in_flight: HashMap<Ticket, Action>,
    next_ticket: u64,
    next_placeholder: u32,
    stats: SessionStats,
}

impl Session {
    /// Start a session over a loaded tree. Notifications already queued on
    /// the tree are discarded.
    #[must_use]
    pub fn new(mut tree: TaskTree, codec: TimestampCodec) -> Self {
        tree.drain_notifications();
        tree.set_dispatch(true);
        Self {
            tree,
            selection: None,
            router: Router::new(),
            reconciler: Reconciler::new(),
            codec,
            outbox: VecDeque::new(),
            in_flight: HashMap::new(),
            next_ticket: 1,
            next_placeholder: 1,
            stats: SessionStats::default(),
        }
    }

    #[must_use]
    pub const fn tree(&self) -> &TaskTree {
        &self.tree
    }

    #[must_use]
    pub const fn selection(&self) -> Option<&TaskId> {
        self.selection.as_ref()
    }

    #[must_use]
    pub const fn codec(&self) -> TimestampCodec {
        self.codec
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Requests queued but not yet taken.
    #[must_use]
    pub fn outbox(&self) -> &VecDeque<Dispatch> {
        &self.outbox
    }

    /// Tickets taken but not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    // -- selection ---------------------------------------------------------

    /// Select a task, or clear the selection with `None`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Tree`] when `id` is not in the tree.
    pub fn select(&mut self, id: Option<&TaskId>) -> Result<FormView, SessionError> {
        if let Some(target) = id {
            if !self.tree.contains(target) {
                return Err(TreeError::NotFound(target.clone()).into());
            }
        }
        if let Route::Select(selection) = self.router.route(Signal::RowSelect(id.cloned())) {
            self.selection = selection;
        }
        Ok(self.form_view())
    }

    #[must_use]
    pub fn form_view(&self) -> FormView {
        self.selection
            .as_ref()
            .and_then(|id| self.tree.search(id))
            .map_or(FormView::CreateRoot, |node| FormView::for_node(node, self.codec))
    }

    // -- form actions ------------------------------------------------------

    /// Save the form: update the selected task's name and timestamps, or add
    /// a new root task when nothing is selected.
    ///
    /// # Errors
    ///
    /// [`SessionError::Validation`] when the form is incomplete; nothing is
    /// mutated in that case.
    pub fn save(&mut self, input: &FormInput) -> Result<FormView, SessionError> {
        let task = input.validate(self.codec)?;
        match self.selection.clone() {
            Some(id) => {
                if self.tree.contains(&id) {
                    self.tree.set_field(&id, FieldChange::Name(task.name))?;
                    self.tree
                        .set_field(&id, FieldChange::ActualStart(task.actual_start))?;
                    self.tree
                        .set_field(&id, FieldChange::ActualEnd(task.actual_end))?;
                } else {
                    warn!(id = %id, "selected task not found; nothing saved");
                }
            }
            None => {
                let id = self.allocate_placeholder();
                self.tree.add_child(None, id, task)?;
            }
        }
        self.process();
        Ok(self.form_view())
    }

    /// Add a child under the selected task.
    ///
    /// # Errors
    ///
    /// [`SessionError::Validation`] for incomplete input,
    /// [`SessionError::NothingSelected`] without a selection.
    pub fn add_child(&mut self, input: &FormInput) -> Result<FormView, SessionError> {
        let task = input.validate(self.codec)?;
        let parent = self.selection.clone().ok_or(SessionError::NothingSelected)?;
        if self.tree.contains(&parent) {
            let id = self.allocate_placeholder();
            self.tree.add_child(Some(&parent), id, task)?;
            self.process();
        } else {
            warn!(id = %parent, "selected task not found; no child added");
        }
        Ok(self.form_view())
    }

    /// Remove the selected task and its descendants, then clear the
    /// selection.
    ///
    /// # Errors
    ///
    /// [`SessionError::NothingSelected`] without a selection.
    pub fn remove_selected(&mut self) -> Result<FormView, SessionError> {
        let id = self.selection.clone().ok_or(SessionError::NothingSelected)?;
        if !self.tree.contains(&id) {
            warn!(id = %id, "selected task not found; nothing removed");
            return Ok(self.form_view());
        }

        self.router.arm_remove();
        if let Err(err) = self.tree.remove(&id) {
            self.router.disarm_remove();
            return Err(err.into());
        }
        self.selection = None;
        self.process();
        Ok(self.form_view())
    }

    /// Reparent a task (drag and drop in the chart).
    ///
    /// # Errors
    ///
    /// [`SessionError::Tree`] for unknown IDs or a cycle.
    pub fn move_task(&mut self, id: &TaskId, new_parent: Option<&TaskId>) -> Result<(), SessionError> {
        self.tree.move_to(id, new_parent)?;
        self.process();
        Ok(())
    }

    /// Write one field directly (inline edit in the data grid).
    ///
    /// # Errors
    ///
    /// [`SessionError::Tree`] when the task is missing or an ID is taken.
    pub fn set_field(&mut self, id: &TaskId, change: FieldChange) -> Result<(), SessionError> {
        let renames_selection =
            matches!(&change, FieldChange::Id(_)) && self.selection.as_ref() == Some(id);
        let new_id = match &change {
            FieldChange::Id(new_id) => Some(new_id.clone()),
            _ => None,
        };
        self.tree.set_field(id, change)?;
        if renames_selection {
            self.selection = new_id;
        }
        self.process();
        Ok(())
    }

    // -- dispatch ----------------------------------------------------------

    /// Take every queued dispatch. Each ticket stays in flight until
    /// [`complete`](Self::complete) is called for it.
    pub fn take_dispatches(&mut self) -> Vec<Dispatch> {
        self.outbox.drain(..).collect()
    }

    /// Deliver the outcome of a dispatched request.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<PersistResponse, TransportError>,
    ) -> Completion {
        let Some(action) = self.in_flight.remove(&ticket) else {
            warn!(%ticket, "completion for a ticket that is not in flight");
            return Completion::Unknown { ticket };
        };
        let placeholder = self.reconciler.placeholder_for(ticket).cloned();

        let response = match outcome {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                let reason = response.reason();
                warn!(%ticket, %action, code = %ErrorCode::ServerRejected, %reason, "request rejected");
                return self.fail(ticket, action, placeholder.as_ref(), reason);
            }
            Err(err) => {
                warn!(%ticket, %action, code = %err.code(), error = %err, "request failed");
                return self.fail(ticket, action, placeholder.as_ref(), err.to_string());
            }
        };

        self.stats.succeeded += 1;
        let Some(placeholder) = placeholder else {
            debug!(%ticket, %action, "request acknowledged");
            return Completion::Acknowledged { ticket, action };
        };

        let Some(id) = response.assigned_id() else {
            warn!(%ticket, placeholder = %placeholder, body = %response.body(), "create succeeded without an id");
            self.reconciler.on_create_failed(&placeholder);
            return Completion::Acknowledged { ticket, action };
        };

        match self
            .reconciler
            .on_create_confirmed(&mut self.tree, &placeholder, id.clone())
        {
            Ok(()) => {
                if self.selection.as_ref() == Some(&placeholder) {
                    self.selection = Some(id.clone());
                }
                Completion::Confirmed {
                    ticket,
                    placeholder,
                    id,
                }
            }
            Err(err) => {
                warn!(%ticket, code = %err.code(), error = %err, "could not apply confirmed id");
                Completion::Acknowledged { ticket, action }
            }
        }
    }

    /// Send every queued dispatch through `client`, in queue order, and
    /// complete it.
    pub fn pump<C: PersistenceClient + ?Sized>(&mut self, client: &mut C) -> Vec<Exchange> {
        let mut exchanges = Vec::new();
        for dispatch in self.take_dispatches() {
            let outcome = client.submit(&dispatch.request);
            let completion = self.complete(dispatch.ticket, outcome);
            exchanges.push(Exchange {
                request: dispatch.request,
                completion,
            });
        }
        exchanges
    }

    // -- internals ---------------------------------------------------------

    fn allocate_placeholder(&mut self) -> TaskId {
        let id = TaskId::Placeholder(self.next_placeholder);
        self.next_placeholder += 1;
        id
    }

    fn fail(
        &mut self,
        ticket: Ticket,
        action: Action,
        placeholder: Option<&TaskId>,
        reason: String,
    ) -> Completion {
        self.stats.failed += 1;
        if let Some(placeholder) = placeholder {
            self.reconciler.on_create_failed(placeholder);
        }
        Completion::Failed {
            ticket,
            action,
            reason,
        }
    }

    fn process(&mut self) {
        while let Some(notification) = self.tree.next_notification() {
            match self.router.route(Signal::Tree(notification)) {
                Route::Persist(mutation) => self.enqueue(&mutation),
                Route::Select(selection) => self.selection = selection,
                Route::Skip => {}
            }
        }
    }

    fn enqueue(&mut self, mutation: &Mutation) {
        let request = match intent::build(mutation, &self.tree, self.codec) {
            Ok(request) => request,
            Err(err) => {
                warn!(item = %mutation.item(), code = %err.code(), error = %err, "mutation not persisted");
                return;
            }
        };

        if references_placeholder(&request) {
            warn!(%request, "request references a task whose create is unconfirmed");
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        if let Mutation::Created { item, .. } = mutation {
            if item.is_placeholder() {
                self.reconciler.register(item.clone(), ticket);
            }
        }

        debug!(%ticket, %request, "dispatch queued");
        self.stats.dispatched += 1;
        self.in_flight.insert(ticket, request.action());
        self.outbox.push_back(Dispatch { ticket, request });
    }
}

fn references_placeholder(request: &PersistRequest) -> bool {
    match request {
        PersistRequest::Create { parent, .. } => {
            matches!(parent, ParentRef::Task(id) if id.is_placeholder())
        }
        PersistRequest::Update { id, .. } | PersistRequest::Delete { id, .. } => {
            id.is_placeholder()
        }
    }
}
