//! Observed task lifetimes.

use crate::task::{Args, Directive, TaskId};

/// What a span is "about": a directly-planned invocation keeps its full
/// [Directive], while a task created mid-run via `spawn`/`call` keeps only
/// its activity type and arguments (its task id is an implementation detail,
/// stripped from the externally-returned form; see [`Span::without_task`]).
#[derive(Clone, Debug, PartialEq)]
pub enum SpanKind {
    Directive(Directive),
    Adhoc { activity_type: String, args: Args },
}

/// The interval `[start, end]` during which a task existed, tagged with the
/// directive or ad-hoc invocation that created it.
///
/// Kept with its `task` id for internal bookkeeping (incremental span
/// reconciliation needs to match spans back to deleted/stale tasks); the
/// externally-returned form drops it via [`without_task`](crate::history::without_task).
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub kind: SpanKind,
    pub task: TaskId,
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub fn new(kind: SpanKind, task: TaskId, start: u64, end: u64) -> Self {
        Span { kind, task, start, end }
    }
}

/// The task-id-free form of a [Span], returned to callers of `simulate`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalSpan {
    pub kind: SpanKind,
    pub start: u64,
    pub end: u64,
}

impl From<&Span> for ExternalSpan {
    fn from(span: &Span) -> Self {
        ExternalSpan {
            kind: span.kind.clone(),
            start: span.start,
            end: span.end,
        }
    }
}
