//! Tasks, directives, and the suspension protocol activities speak.

use crate::event::Value;
use crate::frame::TaskFrame;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A stable, never-reused identifier for one task activation.
///
/// Issued monotonically by the engine (see [`crate::engine::SimulationEngine`]),
/// rather than derived from a pointer, so that parent/child bookkeeping forms
/// a plain integer-keyed arena instead of a graph of raw pointers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaskId(pub(crate) u32);

impl TaskId {
    pub(crate) fn new(id: u32) -> Self {
        TaskId(id)
    }

    /// Sentinel progeny for diagnostic, task-less reads (see
    /// [`TaskFrame::model_only`](crate::frame::TaskFrame::model_only)). Never
    /// issued by the engine and never appears in real engine bookkeeping.
    pub const NONE: TaskId = TaskId(u32::MAX);
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The arguments passed to an activity invocation, keyed by name.
pub type Args = BTreeMap<String, Value>;

/// The plan-level description of one activity invocation: `(type, start_time, args)`.
///
/// Equality and hashing are structural over all three fields, which is what
/// lets the incremental driver diff an old plan against a new one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Directive {
    pub activity_type: String,
    pub start_time: u64,
    pub args: Args,
}

impl Directive {
    pub fn new(activity_type: impl Into<String>, start_time: u64, args: Args) -> Self {
        Directive {
            activity_type: activity_type.into(),
            start_time,
            args,
        }
    }
}

/// An ordered sequence of [Directive]s.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plan {
    pub directives: Vec<Directive>,
}

impl Plan {
    pub fn new(directives: Vec<Directive>) -> Self {
        Plan { directives }
    }
}

impl FromIterator<Directive> for Plan {
    fn from_iter<I: IntoIterator<Item = Directive>>(iter: I) -> Self {
        Plan {
            directives: iter.into_iter().collect(),
        }
    }
}

/// What a [Task] did on its most recent [`Task::advance`], i.e. where it
/// suspended (or that it finished).
pub enum TaskStatus {
    /// The task has nothing left to do.
    Completed,
    /// Suspend for `duration` simulation-time units, then resume. Must be
    /// strictly positive; the engine treats `Delay(0)` as a model bug.
    Delay(u64),
    /// Suspend until `predicate` returns true. Re-evaluated once per tick
    /// against a read-only frame, so the predicate may call
    /// [`TaskFrame::read`] but not [`TaskFrame::emit`].
    AwaitCondition(Box<dyn FnMut(&mut TaskFrame) -> bool + Send>),
    /// Create a child task and block until it completes.
    Call(String, Args),
    /// Create a child task and continue without waiting for it.
    Spawn(String, Args),
}

impl fmt::Debug for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Completed => write!(f, "Completed"),
            TaskStatus::Delay(d) => write!(f, "Delay({d})"),
            TaskStatus::AwaitCondition(_) => write!(f, "AwaitCondition(..)"),
            TaskStatus::Call(t, args) => write!(f, "Call({t}, {args:?})"),
            TaskStatus::Spawn(t, args) => write!(f, "Spawn({t}, {args:?})"),
        }
    }
}

/// A suspended activity invocation.
///
/// Rather than relying on language-level coroutines, an activity is any type
/// that can be driven one suspension at a time by repeated calls to
/// [`Task::advance`]. Implementations typically close over an explicit
/// resumption state (an enum of "where was I") the same way a hand-written
/// `Future::poll` state machine would; the kernel does not care how that
/// state is represented, only that advancing picks up exactly where the last
/// call left off.
pub trait Task: Send {
    /// Advance the task to its next suspension point, or to completion.
    ///
    /// `frame` is the scratch accumulator for events emitted or read during
    /// this activation; see [`TaskFrame`].
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus>;
}

/// Wraps a plain (non-suspending) function as a one-shot [Task].
///
/// A model function that never yields is invoked in full on the first (and
/// only) `advance`, and is then reported as immediately `Completed`.
pub struct OneShot<F>(Option<F>)
where
    F: FnMut(&mut TaskFrame) -> anyhow::Result<()> + Send;

impl<F> OneShot<F>
where
    F: FnMut(&mut TaskFrame) -> anyhow::Result<()> + Send,
{
    pub fn new(f: F) -> Self {
        OneShot(Some(f))
    }
}

impl<F> Task for OneShot<F>
where
    F: FnMut(&mut TaskFrame) -> anyhow::Result<()> + Send,
{
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        if let Some(mut f) = self.0.take() {
            f(frame)?;
        }
        Ok(TaskStatus::Completed)
    }
}

/// Suspend for `duration` simulation-time units.
pub fn delay(duration: u64) -> TaskStatus {
    TaskStatus::Delay(duration)
}

/// Suspend until `predicate` returns true, re-evaluated once per tick.
pub fn wait_until(predicate: impl FnMut(&mut TaskFrame) -> bool + Send + 'static) -> TaskStatus {
    TaskStatus::AwaitCondition(Box::new(predicate))
}

/// Create a child task and continue without waiting for it.
pub fn spawn(activity_type: impl Into<String>, args: Args) -> TaskStatus {
    TaskStatus::Spawn(activity_type.into(), args)
}

/// Create a child task and block until it completes.
pub fn call(activity_type: impl Into<String>, args: Args) -> TaskStatus {
    TaskStatus::Call(activity_type.into(), args)
}
