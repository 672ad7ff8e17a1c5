//! The kernel's closed error surface (§7).
//!
//! Every kind here is a programmer or data error: double-scheduling a task,
//! two retained history entries landing on the same instant, an emit with no
//! owning task, a model yielding something the kernel doesn't recognize, or a
//! directive naming an activity type the model doesn't have. None are
//! recoverable within a tick, so the engine surfaces them immediately rather
//! than trying to patch around them. Activity authors that want to return
//! their own errors (e.g. "no such ephemeris entry") do so through the same
//! `anyhow::Result` every `Task::advance` call already returns; this enum
//! only covers mistakes the kernel itself can detect.

use crate::task::TaskId;
use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum KestrelError {
    #[display("task {task} is already scheduled")]
    ScheduleConflict { task: TaskId },

    #[display("duplicate resume time {time} in retained old_events")]
    DuplicateResumeTime { time: u64 },

    #[display("attempted to emit an event with no owning task")]
    EmitWithoutTask,

    #[display("model yielded an unrecognized task status")]
    UnknownStatus,

    #[display("directive references unknown activity type {activity_type:?}")]
    UnknownActivity { activity_type: String },
}
