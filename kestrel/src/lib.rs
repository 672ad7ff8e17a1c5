//! # Kestrel
//!
//! A discrete-event simulation kernel built for incremental re-simulation:
//! given the result of simulating a plan, and a new plan that differs from
//! it by a handful of added, removed, or edited directives, `kestrel` can
//! replay *only* the activities whose behavior could have changed, reusing
//! everything else from the original run's recorded history.
//!
//! Kestrel is the kernel only. It knows nothing about resources, schedulers,
//! or spacecraft; it knows how to run cooperative activities ([`Task`]s)
//! that suspend on delays, conditions, calls, and spawns, how to record what
//! they did as an algebraic [`EventGraph`], and how to tell -- from that
//! algebra alone, with no domain knowledge -- which activities a plan edit
//! invalidates. Everything domain-specific (what activities exist, what
//! they do, what attributes they expose) is supplied by implementing
//! [`Model`].
//!
//! ## Concepts
//!
//! - **Tasks** ([`task`]) are the unit of cooperative execution: an activity
//!   implements [`Task::advance`], returning a [`TaskStatus`] each time it
//!   suspends (`Delay`, `AwaitCondition`, `Call`, `Spawn`) or completes.
//! - **Events** ([`event`]) are the atomic facts a task can emit or read:
//!   a `(topic, value, progeny)` triple, where `progeny` is the task that
//!   produced (for an emit) or observed (for a `READ`) it.
//! - **Event graphs** ([`event_graph`]) are how kestrel records *what
//!   happened* during one instant without collapsing away the difference
//!   between "A before B" and "A alongside B" -- that distinction is the
//!   whole basis for staleness analysis. See [`EventGraph`].
//! - **Frames** ([`frame`]) are the per-activation scratchpad a task reads
//!   and emits through; see [`TaskFrame`].
//! - **The schedule** ([`schedule`]) is a time-indexed multiset of runnable
//!   tasks; see [`JobSchedule`].
//! - **The engine** ([`engine`]) drives a plan to completion (or a stop
//!   time), producing recorded history, observed task spans, and an opaque
//!   [`Payload`] that a later incremental run can diff against.
//! - **The incremental driver** ([`incremental`]) diffs an old plan against
//!   a new one, computes exactly which tasks are deleted or stale, and
//!   replays only those, reusing everything else.
//!
//! ## A minimal model
//!
//! ```ignore
//! use kestrel::{Args, KestrelError, Model, Task, TaskFrame, Value};
//! use kestrel::task::OneShot;
//!
//! struct MyModel;
//!
//! impl Model for MyModel {
//!     fn make_task(&self, activity_type: &str, _args: &Args) -> Result<Box<dyn Task>, KestrelError> {
//!         match activity_type {
//!             "greet" => Ok(Box::new(OneShot::new(|frame: &mut TaskFrame| {
//!                 frame.emit("greeting", "hello")?;
//!                 Ok(())
//!             }))),
//!             other => Err(KestrelError::UnknownActivity { activity_type: other.to_string() }),
//!         }
//!     }
//!
//!     fn activity_types(&self) -> Vec<String> {
//!         vec!["greet".to_string()]
//!     }
//!
//!     fn get_attribute(&self, _frame: &mut TaskFrame, _name: &str) -> anyhow::Result<Value> {
//!         anyhow::bail!("no attributes")
//!     }
//! }
//! ```
//!
//! ## Non-goals
//!
//! Kestrel does not persist plans or history to disk, does not schedule
//! real-wall-clock work, and does not itself know how to serialize a
//! [`Model`]'s internal state -- only its [`Directive`]/[`Event`]/[`Value`]
//! wire types optionally round-trip through `serde` (the `serde` feature,
//! on by default). Callers that need persistence layer it on top.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_graph;
pub mod frame;
pub mod history;
pub mod incremental;
pub mod model;
pub mod payload;
pub mod schedule;
pub mod span;
pub mod task;

pub use config::SimulationConfig;
pub use engine::{profile, simulate, ReplayContext};
pub use error::KestrelError;
pub use event::{Event, Topic, Value};
pub use event_graph::EventGraph;
pub use frame::{HistoryEntry, TaskFrame};
pub use incremental::simulate_incremental;
pub use model::Model;
pub use payload::Payload;
pub use schedule::JobSchedule;
pub use span::{ExternalSpan, Span, SpanKind};
pub use task::{call, delay, spawn, wait_until, Args, Directive, OneShot, Plan, Task, TaskId, TaskStatus};
