//! A toy spacecraft-adjacent model: three attributes (`x`, `y`, `z`) and the
//! six activities in [`crate::activities`]. This is the whole of kestrel's
//! "model" contract (§6 of the kernel's own docs) -- everything else in this
//! crate is just `main` wiring a [`kestrel::Plan`] through it.

use crate::activities::{
    callee_activity::CalleeActivity, caller_activity::CallerActivity, my_activity::MyActivity, my_child_activity::MyChildActivity,
    my_decomposing_activity::MyDecomposingActivity, my_other_activity::MyOtherActivity,
};
use kestrel::task::Args;
use kestrel::{KestrelError, Model, Task, TaskFrame, Topic, Value};

#[derive(Clone, Default)]
pub struct SpacecraftModel;

impl Model for SpacecraftModel {
    fn make_task(&self, activity_type: &str, args: &Args) -> Result<Box<dyn Task>, KestrelError> {
        let unknown = || KestrelError::UnknownActivity {
            activity_type: activity_type.to_string(),
        };
        match activity_type {
            "my_other_activity" => Ok(Box::new(MyOtherActivity::default())),
            "my_activity" => Ok(Box::new(MyActivity::new(args).map_err(|_| unknown())?)),
            "my_decomposing_activity" => Ok(Box::new(MyDecomposingActivity::default())),
            "my_child_activity" => Ok(Box::new(MyChildActivity)),
            "caller_activity" => Ok(Box::new(CallerActivity::default())),
            "callee_activity" => Ok(Box::new(CalleeActivity::new(args).map_err(|_| unknown())?)),
            _ => Err(unknown()),
        }
    }

    fn activity_types(&self) -> Vec<String> {
        vec![
            "my_other_activity".to_string(),
            "my_activity".to_string(),
            "my_decomposing_activity".to_string(),
            "my_child_activity".to_string(),
            "caller_activity".to_string(),
            "callee_activity".to_string(),
        ]
    }

    fn attributes(&self) -> Vec<String> {
        vec!["x".to_string(), "y".to_string(), "z".to_string()]
    }

    fn get_attribute(&self, frame: &mut TaskFrame, name: &str) -> anyhow::Result<Value> {
        // `z` tracks elapsed simulation time directly; it's never written by
        // an activity, so there's nothing to read through the frame.
        if name == "z" {
            return Ok(Value::int(frame.elapsed_time() as i64));
        }

        let initial = match name {
            "x" => Value::int(55),
            "y" => Value::int(0),
            other => anyhow::bail!("no such attribute {other:?}"),
        };

        let mut latest = initial;
        for (_, graph) in frame.read(&[Topic::from(name)]) {
            // Last write wins *within* an instant, in traversal order --
            // `to_set` would pick the value-maximum instead, which is wrong
            // whenever a topic is written more than once in one tick (see
            // `my_decomposing_activity`, which writes `x` both directly and,
            // concurrently, via its spawned child's sibling write to `y`).
            if let Some(v) = graph.to_vec(|e| e.value.clone()).into_iter().next_back() {
                latest = v;
            }
        }
        Ok(latest)
    }
}
