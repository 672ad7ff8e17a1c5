use kestrel::task::{Args, TaskStatus};
use kestrel::{Task, TaskFrame, Value};

/// A one-shot child invoked via `call` by
/// [`super::caller_activity::CallerActivity`]; never appears in a plan
/// directly, only as an ad-hoc `(activity_type, args)` invocation.
pub struct CalleeActivity {
    value: i64,
}

impl CalleeActivity {
    pub fn new(args: &Args) -> anyhow::Result<Self> {
        let value = match args.get("value") {
            Some(Value::Int(i)) => *i,
            other => anyhow::bail!("callee_activity expects an integer `value`, got {other:?}"),
        };
        Ok(CalleeActivity { value })
    }
}

impl Task for CalleeActivity {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        frame.emit("x", self.value)?;
        Ok(TaskStatus::Completed)
    }
}
