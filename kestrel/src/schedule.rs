//! The job schedule (C2): a time-indexed multiset of runnable tasks.

use crate::error::KestrelError;
use crate::task::TaskId;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Most batches are one or two tasks; inlining a handful avoids a heap
/// allocation for the common case.
type Batch = SmallVec<TaskId, 4>;

/// Maps simulation time to the tasks runnable at that time.
///
/// Insertion order within a batch is preserved (tasks are stepped in that
/// order), but since a batch's event graph is composed with `conc`, that
/// ordering is never observable through the recorded history.
#[derive(Default)]
pub struct JobSchedule {
    by_time: BTreeMap<u64, Batch>,
}

impl JobSchedule {
    pub fn new() -> Self {
        JobSchedule::default()
    }

    /// Schedules `task` at `time`. Fails if `task` is already scheduled at
    /// any time: double-scheduling a task is a programmer error, not
    /// something the caller can reasonably intend.
    pub fn schedule(&mut self, time: u64, task: TaskId) -> Result<(), KestrelError> {
        for batch in self.by_time.values() {
            if batch.contains(&task) {
                return Err(KestrelError::ScheduleConflict { task });
            }
        }
        self.by_time.entry(time).or_default().push(task);
        Ok(())
    }

    /// The earliest scheduled time. Panics if the schedule is empty; callers
    /// must check [`is_empty`](Self::is_empty) first.
    pub fn peek_next_time(&self) -> u64 {
        *self
            .by_time
            .keys()
            .next()
            .expect("peek_next_time called on an empty schedule")
    }

    /// Removes and returns the batch of tasks at the earliest scheduled time.
    pub fn get_next_batch(&mut self) -> Vec<TaskId> {
        let time = self.peek_next_time();
        self.by_time.remove(&time).unwrap_or_default().into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }
}
