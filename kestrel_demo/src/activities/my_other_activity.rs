use kestrel::task::{delay, TaskStatus};
use kestrel::{Task, TaskFrame};

/// Settles the bus voltage down in two steps, ten ticks apart.
#[derive(Default)]
pub struct MyOtherActivity {
    stage: u8,
}

impl Task for MyOtherActivity {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        match self.stage {
            0 => {
                self.stage = 1;
                Ok(delay(10))
            }
            1 => {
                frame.emit("x", 50i64)?;
                self.stage = 2;
                Ok(delay(5))
            }
            _ => {
                frame.emit("x", 55i64)?;
                Ok(TaskStatus::Completed)
            }
        }
    }
}
