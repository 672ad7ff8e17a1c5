use kestrel::task::{call, Args, TaskStatus};
use kestrel::{Task, TaskFrame, Value};

/// Calls [`super::callee_activity::CalleeActivity`] and blocks until it
/// completes -- unlike [`super::my_decomposing_activity::MyDecomposingActivity`]'s
/// spawn, the callee's graph happens-before this activity's own resumption.
#[derive(Default)]
pub struct CallerActivity {
    called: bool,
}

impl Task for CallerActivity {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        if !self.called {
            self.called = true;
            let mut args = Args::new();
            args.insert("value".to_string(), Value::int(99));
            Ok(call("callee_activity", args))
        } else {
            frame.emit("x", 98i64)?;
            Ok(TaskStatus::Completed)
        }
    }
}
