use kestrel::task::{delay, Args, TaskStatus};
use kestrel::{Task, TaskFrame, Value};

/// Nudges `y` up based on `param1`, pausing partway through.
pub struct MyActivity {
    param1: i64,
    stage: u8,
}

impl MyActivity {
    pub fn new(args: &Args) -> anyhow::Result<Self> {
        let param1 = match args.get("param1") {
            Some(Value::Int(i)) => *i,
            other => anyhow::bail!("my_activity expects an integer `param1`, got {other:?}"),
        };
        Ok(MyActivity { param1, stage: 0 })
    }
}

impl Task for MyActivity {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        match self.stage {
            0 => {
                frame.emit("y", self.param1)?;
                self.stage = 1;
                Ok(delay(15))
            }
            _ => {
                frame.emit("y", self.param1 as f64 * 0.6)?;
                Ok(TaskStatus::Completed)
            }
        }
    }
}
