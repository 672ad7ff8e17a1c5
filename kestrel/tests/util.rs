//! A tiny test harness model shared by the integration tests.
//!
//! The kernel's only dependency on domain code is [`kestrel::Model`], so
//! these tests exercise it against a handful of generic activities rather
//! than a real spacecraft model: `emit` (a one-shot write), `delay_emit` (a
//! `Delay` suspension), `call_child`/`spawn_child` (the two flavors of child
//! task), and `wait_then_emit` (an `AwaitCondition` suspension). Together
//! they cover every suspension shape the engine has to drive.

use kestrel::task::{call, delay, spawn, wait_until, Args, Task, TaskStatus};
use kestrel::{Directive, KestrelError, Model, OneShot, TaskFrame, Topic, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Builds an `Args` map from `(name, value)` pairs.
#[allow(unused)]
pub fn args(pairs: &[(&str, Value)]) -> Args {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[allow(unused)]
pub fn directive(activity_type: &str, start_time: u64, args: Args) -> Directive {
    Directive::new(activity_type, start_time, args)
}

fn get_string(args: &Args, key: &str) -> anyhow::Result<String> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => anyhow::bail!("expected string arg {key:?}, got {other:?}"),
    }
}

fn get_int(args: &Args, key: &str) -> anyhow::Result<i64> {
    match args.get(key) {
        Some(Value::Int(i)) => Ok(*i),
        other => anyhow::bail!("expected int arg {key:?}, got {other:?}"),
    }
}

fn get_value(args: &Args, key: &str) -> Value {
    args.get(key).cloned().unwrap_or(Value::Int(0))
}

fn get_args_map(args: &Args, key: &str) -> Args {
    match args.get(key) {
        Some(Value::Map(m)) => m.clone(),
        _ => BTreeMap::new(),
    }
}

/// Suspends for `delay` ticks, then emits `(topic, value)` once.
struct DelayEmit {
    topic: String,
    value: Value,
    delay: u64,
    delayed: bool,
}

impl Task for DelayEmit {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        if !self.delayed {
            self.delayed = true;
            Ok(delay(self.delay))
        } else {
            frame.emit(self.topic.clone(), self.value.clone())?;
            Ok(TaskStatus::Completed)
        }
    }
}

/// Calls `child_type(child_args)` and, once it completes, emits `(out_topic, true)`.
struct CallChild {
    child_type: String,
    child_args: Args,
    out_topic: String,
    called: bool,
}

impl Task for CallChild {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        if !self.called {
            self.called = true;
            Ok(call(self.child_type.clone(), self.child_args.clone()))
        } else {
            frame.emit(self.out_topic.clone(), Value::Bool(true))?;
            Ok(TaskStatus::Completed)
        }
    }
}

/// Spawns `child_type(child_args)` without waiting, then emits
/// `(out_topic, out_value)` -- concurrently with the child's own graph.
struct SpawnChild {
    child_type: String,
    child_args: Args,
    out_topic: String,
    out_value: Value,
    spawned: bool,
}

impl Task for SpawnChild {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        if !self.spawned {
            self.spawned = true;
            Ok(spawn(self.child_type.clone(), self.child_args.clone()))
        } else {
            frame.emit(self.out_topic.clone(), self.out_value.clone())?;
            Ok(TaskStatus::Completed)
        }
    }
}

/// Reads `in_topic` once and emits the last-written value under `out_topic`.
/// Unlike `wait_then_emit` (which only reads from inside an `AwaitCondition`
/// predicate), this reads directly from a task's own `advance`, producing an
/// ordinary `Seq`-composed `READ` atom in its own graph -- the shape the
/// staleness walk (§4.5.A) is built to detect when the topic it names was
/// written by a directive that has since changed.
struct ReadEmit {
    in_topic: String,
    out_topic: String,
}

impl Task for ReadEmit {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        let history = frame.read(&[Topic::from(self.in_topic.as_str())]);
        let mut latest = Value::Int(0);
        for (_, graph) in history {
            if let Some(v) = graph.to_vec(|e| e.value.clone()).into_iter().next_back() {
                latest = v;
            }
        }
        frame.emit(self.out_topic.clone(), latest)?;
        Ok(TaskStatus::Completed)
    }
}

/// Waits until `watch_topic` carries a value `>= threshold`, then emits
/// `(out_topic, true)`.
struct WaitThenEmit {
    watch_topic: String,
    threshold: i64,
    out_topic: String,
    waited: bool,
}

impl Task for WaitThenEmit {
    fn advance(&mut self, frame: &mut TaskFrame) -> anyhow::Result<TaskStatus> {
        if !self.waited {
            self.waited = true;
            let watch_topic = self.watch_topic.clone();
            let threshold = self.threshold;
            Ok(wait_until(move |frame: &mut TaskFrame| {
                frame.read(&[Topic::from(watch_topic.as_str())]).iter().any(|(_, g)| {
                    g.to_set(|e| e.value.clone())
                        .into_iter()
                        .any(|v| matches!(v, Value::Int(i) if i >= threshold))
                })
            }))
        } else {
            frame.emit(self.out_topic.clone(), Value::Bool(true))?;
            Ok(TaskStatus::Completed)
        }
    }
}

/// Records every `(activity_type, args)` pair the engine asked for a task
/// for, so tests can assert the minimality law (§8): an incremental run must
/// invoke no activity outside the added/stale set.
#[derive(Clone, Default)]
pub struct Invocations(Arc<Mutex<Vec<(String, Args)>>>);

impl Invocations {
    pub fn new() -> Self {
        Invocations::default()
    }

    pub fn calls(&self) -> Vec<(String, Args)> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// A harness [`Model`] exposing the generic activities above, with an
/// optional forbidden-call list: any `(activity_type, args)` pair in it
/// panics on construction, giving tests a way to assert an activity was
/// never re-invoked.
#[derive(Clone)]
pub struct TestModel {
    attributes: Vec<String>,
    forbidden: Vec<(String, Args)>,
    invocations: Invocations,
}

impl TestModel {
    pub fn new(attributes: &[&str]) -> Self {
        TestModel {
            attributes: attributes.iter().map(|s| s.to_string()).collect(),
            forbidden: Vec::new(),
            invocations: Invocations::new(),
        }
    }

    /// Returns a clone of this model that panics if `activity_type(args)` is
    /// ever constructed -- use after capturing a baseline payload, to assert
    /// an incremental rerun does not touch a given invocation.
    pub fn forbidding(&self, activity_type: &str, args: Args) -> Self {
        let mut forbidden = self.forbidden.clone();
        forbidden.push((activity_type.to_string(), args));
        TestModel {
            attributes: self.attributes.clone(),
            forbidden,
            invocations: self.invocations.clone(),
        }
    }

    pub fn invocations(&self) -> Invocations {
        self.invocations.clone()
    }
}

impl Model for TestModel {
    fn make_task(&self, activity_type: &str, args: &Args) -> Result<Box<dyn Task>, KestrelError> {
        self.invocations.0.lock().unwrap().push((activity_type.to_string(), args.clone()));
        if self.forbidden.iter().any(|(t, a)| t == activity_type && a == args) {
            panic!("forbidden rerun: {activity_type}({args:?})");
        }

        match activity_type {
            "emit" => {
                let topic = get_string(args, "topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let value = get_value(args, "value");
                Ok(Box::new(OneShot::new(move |frame: &mut TaskFrame| frame.emit(topic.clone(), value.clone()).map_err(Into::into))))
            }
            "delay_emit" => {
                let topic = get_string(args, "topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let value = get_value(args, "value");
                let delay = get_int(args, "delay").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })? as u64;
                Ok(Box::new(DelayEmit { topic, value, delay, delayed: false }))
            }
            "call_child" => {
                let child_type = get_string(args, "child_type").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let out_topic = get_string(args, "out_topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let child_args = get_args_map(args, "child_args");
                Ok(Box::new(CallChild { child_type, child_args, out_topic, called: false }))
            }
            "spawn_child" => {
                let child_type = get_string(args, "child_type").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let out_topic = get_string(args, "out_topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let out_value = get_value(args, "out_value");
                let child_args = get_args_map(args, "child_args");
                Ok(Box::new(SpawnChild { child_type, child_args, out_topic, out_value, spawned: false }))
            }
            "wait_then_emit" => {
                let watch_topic = get_string(args, "watch_topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let threshold = get_int(args, "threshold").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let out_topic = get_string(args, "out_topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                Ok(Box::new(WaitThenEmit { watch_topic, threshold, out_topic, waited: false }))
            }
            "read_emit" => {
                let in_topic = get_string(args, "in_topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                let out_topic = get_string(args, "out_topic").map_err(|_| KestrelError::UnknownActivity { activity_type: activity_type.into() })?;
                Ok(Box::new(ReadEmit { in_topic, out_topic }))
            }
            other => Err(KestrelError::UnknownActivity { activity_type: other.to_string() }),
        }
    }

    fn activity_types(&self) -> Vec<String> {
        vec![
            "emit".into(),
            "delay_emit".into(),
            "call_child".into(),
            "spawn_child".into(),
            "wait_then_emit".into(),
            "read_emit".into(),
        ]
    }

    fn attributes(&self) -> Vec<String> {
        self.attributes.clone()
    }

    fn get_attribute(&self, frame: &mut TaskFrame, name: &str) -> anyhow::Result<Value> {
        let history = frame.read(&[Topic::from(name)]);
        let mut latest = Value::Int(0);
        for (_, graph) in history {
            // `to_vec` preserves traversal order within the instant, so the
            // last element is the last write -- `to_set` would instead pick
            // the value-maximum, which only coincidentally agrees with "most
            // recent" for some topics.
            if let Some(v) = graph.to_vec(|e| e.value.clone()).into_iter().next_back() {
                latest = v;
            }
        }
        Ok(latest)
    }
}
