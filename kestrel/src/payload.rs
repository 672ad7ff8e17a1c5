//! The opaque carrier handed back by `simulate` and consumed by
//! `simulate_incremental`: everything the driver needs to diff a plan change
//! against a prior run without re-deriving it from scratch.

use crate::frame::HistoryEntry;
use crate::span::Span;
use crate::task::{Directive, TaskId};
use ahash::{AHashMap, AHashSet};

/// All bookkeeping produced by one `simulate` run.
///
/// None of this is meaningful to a caller beyond passing it back into
/// [`crate::incremental::simulate_incremental`]; treat it as opaque.
#[derive(Clone, Debug, Default)]
pub struct Payload {
    pub events: Vec<HistoryEntry>,
    pub spans: Vec<Span>,
    pub plan_directive_to_task: AHashMap<Directive, TaskId>,
    pub task_directives: AHashMap<TaskId, Directive>,
    pub task_children_called: AHashMap<TaskId, Vec<TaskId>>,
    pub task_children_spawned: AHashMap<TaskId, Vec<TaskId>>,
    pub task_parent_called: AHashMap<TaskId, TaskId>,
    pub task_parent_spawned: AHashMap<TaskId, TaskId>,
    pub deleted_tasks: AHashSet<TaskId>,
    /// The task id counter at the end of the run that produced this payload.
    /// A later incremental run must seed its own counter from here so that
    /// any newly-created task can't alias a retained task's id.
    pub next_id: u32,
}
