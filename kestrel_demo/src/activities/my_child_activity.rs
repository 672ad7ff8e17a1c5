use kestrel::task::TaskStatus;
use kestrel::{Task, TaskFrame};

/// A one-shot child spawned by [`super::my_decomposing_activity::MyDecomposingActivity`].
#[derive(Default)]
pub struct MyChildActivity;

impl Task for MyChildActivity {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        frame.emit("y", 13i64)?;
        Ok(TaskStatus::Completed)
    }
}
