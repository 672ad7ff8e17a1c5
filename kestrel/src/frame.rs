//! The task frame (C3): per-activation scratch for the event graph produced
//! by one step of one task, including any children it spawned along the way.

use crate::error::KestrelError;
use crate::event::{Event, Topic, Value};
use crate::event_graph::EventGraph;
use crate::task::TaskId;
use smallvec::SmallVec;

/// One (time, graph) entry of recorded history, as seen by a [TaskFrame].
pub type HistoryEntry = (u64, EventGraph);

/// Mutable per-activation scratchpad.
///
/// A frame is created fresh for each [`Task::advance`](crate::task::Task::advance)
/// call (and, separately, for each re-evaluation of a pending condition or
/// diagnostic profile sample). `tip` accumulates atoms emitted since the last
/// `spawn`; `branches` records the `(events-before-spawn, child's graph)`
/// pairs so [`collect`](Self::collect) can splice children back in with the
/// right causal ordering.
pub struct TaskFrame {
    elapsed_time: u64,
    task: Option<TaskId>,
    tip: EventGraph,
    /// Most activations spawn at most one child before completing; inlining
    /// a couple of branch entries avoids a heap allocation for that case.
    branches: SmallVec<(EventGraph, EventGraph), 2>,
    /// A snapshot of the engine's recorded history at the moment this frame
    /// was created. Owned rather than borrowed: the engine must keep
    /// mutating itself (scheduling, span bookkeeping) while a frame it
    /// handed out is still alive, which an `&` borrow of `engine.events`
    /// would forbid. Cloning is cheap since every entry is an `Rc`-backed
    /// [`EventGraph`].
    history: Vec<HistoryEntry>,
}

impl TaskFrame {
    /// A frame not associated with any task. Can `read` but never `emit`;
    /// used only by diagnostic helpers (e.g. sampling an attribute's value at
    /// a point in history without attributing the read to a running task).
    pub fn model_only(elapsed_time: u64, history: Vec<HistoryEntry>) -> Self {
        TaskFrame {
            elapsed_time,
            task: None,
            tip: EventGraph::empty(),
            branches: SmallVec::new(),
            history,
        }
    }

    /// A frame driving one activation of `task`.
    pub fn for_task(elapsed_time: u64, task: TaskId, history: Vec<HistoryEntry>) -> Self {
        TaskFrame {
            elapsed_time,
            task: Some(task),
            tip: EventGraph::empty(),
            branches: SmallVec::new(),
            history,
        }
    }

    pub fn elapsed_time(&self) -> u64 {
        self.elapsed_time
    }

    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    /// Appends an emitted event to `tip`. Fails if this frame has no owning
    /// task.
    pub fn emit(&mut self, topic: impl Into<Topic>, value: impl Into<Value>) -> Result<(), KestrelError> {
        let task = self.task.ok_or(KestrelError::EmitWithoutTask)?;
        self.tip = EventGraph::seq(
            std::mem::replace(&mut self.tip, EventGraph::empty()),
            EventGraph::atom(Event::new(topic, value, task)),
        );
        Ok(())
    }

    /// Records a `READ` atom for `topics`, then returns the filtered view of
    /// every history entry (including this frame's own not-yet-committed
    /// work) where the filtered result is non-empty.
    pub fn read(&mut self, topics: &[Topic]) -> Vec<HistoryEntry> {
        let progeny = self.task.unwrap_or(TaskId::NONE);
        self.tip = EventGraph::seq(
            std::mem::replace(&mut self.tip, EventGraph::empty()),
            EventGraph::atom(Event::new(Topic::Read, Value::Topics(topics.to_vec()), progeny)),
        );

        self.visible_history()
            .into_iter()
            .filter_map(|(t, g)| {
                let filtered = g.filter(topics);
                if filtered.is_empty() {
                    None
                } else {
                    Some((t, filtered))
                }
            })
            .collect()
    }

    /// The caller-provided history plus one synthetic entry at
    /// `elapsed_time` holding everything this frame has produced so far
    /// (branch bases, but not branches' spliced-in children, since those
    /// happened concurrently with -- not before -- the reader's vantage).
    fn visible_history(&self) -> Vec<HistoryEntry> {
        let mut res = EventGraph::empty();
        for (base, _) in &self.branches {
            res = EventGraph::seq(res, base.clone());
        }
        res = EventGraph::seq(res, self.tip.clone());

        let mut out = self.history.clone();
        out.push((self.elapsed_time, res));
        out
    }

    /// Closes the current `tip` as a new branch entry recording a spawned
    /// child's graph, then resets `tip` to empty.
    pub fn spawn(&mut self, child_graph: EventGraph) {
        self.branches.push((std::mem::replace(&mut self.tip, EventGraph::empty()), child_graph));
    }

    /// Folds `branches` right-to-left into `seq(base, conc(child, rest))`,
    /// with `rest` starting as `tip`: events before a spawn happen-before the
    /// child's entire graph, and the parent's emits after a spawn are
    /// concurrent with it.
    pub fn collect(&self) -> EventGraph {
        let mut res = self.tip.clone();
        for (base, child) in self.branches.iter().rev() {
            res = EventGraph::seq(base.clone(), EventGraph::conc(child.clone(), res));
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> TaskId {
        TaskId::new(n)
    }

    #[test]
    fn emit_without_task_fails() {
        let mut frame = TaskFrame::model_only(0, vec![]);
        assert!(matches!(frame.emit("x", 1i64), Err(KestrelError::EmitWithoutTask)));
    }

    #[test]
    fn collect_interleaves_spawn_concurrently() {
        let mut frame = TaskFrame::for_task(0, t(1), vec![]);
        frame.emit("before", 1i64).unwrap();
        let child_graph = EventGraph::atom(Event::new("child", 2i64, t(2)));
        frame.spawn(child_graph.clone());
        frame.emit("after", 3i64).unwrap();

        let collected = frame.collect();
        // before;(child|after)
        assert_eq!(collected.to_string_diag(), "before=1;(child=2|after=3)");
    }

    #[test]
    fn read_sees_own_uncommitted_emits_but_not_siblings() {
        let mut frame = TaskFrame::for_task(5, t(1), vec![]);
        frame.emit("x", 10i64).unwrap();
        let visible = frame.read(&[Topic::from("x")]);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].0, 5);
        assert_eq!(visible[0].1.to_string_diag(), "x=10");
    }
}
