use kestrel::task::{spawn, Args, TaskStatus};
use kestrel::{Task, TaskFrame};

/// Spawns [`super::my_child_activity::MyChildActivity`] without waiting for
/// it, then keeps going -- the spawned child's graph ends up concurrent with
/// (not sequenced before) the emit below.
#[derive(Default)]
pub struct MyDecomposingActivity {
    spawned: bool,
}

impl Task for MyDecomposingActivity {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        if !self.spawned {
            self.spawned = true;
            Ok(spawn("my_child_activity", Args::default()))
        } else {
            frame.emit("x", 57i64)?;
            Ok(TaskStatus::Completed)
        }
    }
}
