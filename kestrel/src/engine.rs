//! The simulation engine (C4): owns the clock, the task table, the
//! schedule, and the set of pending conditions, and drives a plan one batch
//! at a time.
//!
//! This is the kernel's busiest module, so a quick map of the control flow:
//! [`run`] is the main tick loop; it delegates each batch to
//! [`SimulationEngine::drive`], which recursively follows `Spawn`/`Call`
//! suspensions down through any children before returning the graph the
//! batch contributed. Mid-tick staleness (applied inline, not just at the
//! top of [`crate::incremental`]) is handled by
//! [`SimulationEngine::resolve_mid_tick_staleness`], which recurses back into
//! [`run`] for a nested, bounded replay and folds the result back in.

use crate::config::SimulationConfig;
use crate::error::KestrelError;
use crate::event::{Event, Topic, Value};
use crate::event_graph::EventGraph;
use crate::frame::{HistoryEntry, TaskFrame};
use crate::history;
use crate::model::Model;
use crate::payload::Payload;
use crate::schedule::JobSchedule;
use crate::span::{ExternalSpan, Span, SpanKind};
use crate::task::{Args, Directive, Plan, Task, TaskId, TaskStatus};

use ahash::{AHashMap, AHashSet};
use log::{debug, trace, warn};

/// Whether a child task came from a `Spawn` (non-blocking) or `Call`
/// (blocking) suspension, and correspondingly whether it gets a plan-grade
/// span or an ad-hoc one (§3: "Directive-or-input").
#[derive(Copy, Clone, Eq, PartialEq)]
enum Origin {
    Spawned,
    Called,
}

type Condition = Box<dyn FnMut(&mut TaskFrame) -> bool + Send>;

/// One run's mutable state: everything [`crate::payload::Payload`] will
/// eventually be assembled from, plus the live task table and schedule that
/// don't survive past the run itself.
pub struct SimulationEngine<M: Model> {
    model: M,
    elapsed_time: u64,
    next_id: u32,
    tasks: AHashMap<TaskId, Box<dyn Task>>,
    task_start_times: AHashMap<TaskId, u64>,
    task_inputs: AHashMap<TaskId, (String, Args)>,
    task_directives: AHashMap<TaskId, Directive>,
    task_children_spawned: AHashMap<TaskId, Vec<TaskId>>,
    task_children_called: AHashMap<TaskId, Vec<TaskId>>,
    task_parent_spawned: AHashMap<TaskId, TaskId>,
    task_parent_called: AHashMap<TaskId, TaskId>,
    awaiting_conditions: Vec<(Condition, TaskId)>,
    awaiting_tasks: AHashMap<TaskId, TaskId>,
    spans: Vec<Span>,
    schedule: JobSchedule,
    events: Vec<HistoryEntry>,
}

impl<M: Model + Clone> SimulationEngine<M> {
    fn new(model: M) -> Self {
        Self::with_id_seed(model, 0)
    }

    /// Like [`new`](Self::new), but issues task ids starting at `seed`
    /// rather than `0`. Used so a nested mid-tick replay's task ids can
    /// never collide with the outer engine's, letting [`absorb`](Self::absorb)
    /// merge bookkeeping maps directly instead of remapping every key.
    fn with_id_seed(model: M, seed: u32) -> Self {
        SimulationEngine {
            model,
            elapsed_time: 0,
            next_id: seed,
            tasks: AHashMap::new(),
            task_start_times: AHashMap::new(),
            task_inputs: AHashMap::new(),
            task_directives: AHashMap::new(),
            task_children_spawned: AHashMap::new(),
            task_children_called: AHashMap::new(),
            task_parent_spawned: AHashMap::new(),
            task_parent_called: AHashMap::new(),
            awaiting_conditions: Vec::new(),
            awaiting_tasks: AHashMap::new(),
            spans: Vec::new(),
            schedule: JobSchedule::new(),
            events: Vec::new(),
        }
    }

    fn next_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Builds a task and registers its bookkeeping, but does not schedule or
    /// step it; callers do that according to why the task exists (deferred,
    /// spawned, or called).
    fn new_task(&mut self, activity_type: &str, args: &Args, start_time: u64) -> Result<TaskId, KestrelError> {
        let task = self.model.make_task(activity_type, args)?;
        let id = self.next_task_id();
        self.tasks.insert(id, task);
        self.task_start_times.insert(id, start_time);
        self.task_inputs.insert(id, (activity_type.to_string(), args.clone()));
        self.task_directives.insert(id, Directive::new(activity_type, start_time, args.clone()));
        Ok(id)
    }

    /// Turns one plan directive into a scheduled, not-yet-run task.
    fn defer(&mut self, directive: &Directive) -> Result<(), KestrelError> {
        let id = self.new_task(&directive.activity_type, &directive.args, directive.start_time)?;
        self.schedule.schedule(directive.start_time, id)?;
        trace!("deferred {id} ({}) to run at t={}", directive.activity_type, directive.start_time);
        Ok(())
    }

    /// Creates a child task for a `Spawn`/`Call` suspension and drives it to
    /// its own first suspension, recording parent/child bookkeeping along
    /// the way. Returns the graph the child contributed, prefixed with its
    /// own `SPAWN` marker.
    fn spawn_child(&mut self, activity_type: &str, args: &Args, parent: TaskId, origin: Origin) -> anyhow::Result<EventGraph> {
        let child = self.new_task(activity_type, args, self.elapsed_time)?;
        match origin {
            Origin::Spawned => {
                self.task_children_spawned.entry(parent).or_default().push(child);
                self.task_parent_spawned.insert(child, parent);
            }
            Origin::Called => {
                self.task_children_called.entry(parent).or_default().push(child);
                self.task_parent_called.insert(child, parent);
                self.awaiting_tasks.insert(child, parent);
            }
        }

        let mut frame = TaskFrame::for_task(self.elapsed_time, child, self.events.clone());
        frame.emit(Topic::Spawn, Value::int(child.0 as i64))?;
        self.drive(child, frame)
    }

    /// Drives `task_id` (already framed) through possibly many suspensions
    /// until it either yields control back to the engine (`Delay`,
    /// `AwaitCondition`) or completes. `Spawn`/`Call` are handled inline
    /// without returning, since they don't suspend the driving loop itself.
    fn drive(&mut self, task_id: TaskId, mut frame: TaskFrame) -> anyhow::Result<EventGraph> {
        loop {
            let status = {
                let task = self.tasks.get_mut(&task_id).expect("driven task missing from task table");
                task.advance(&mut frame)?
            };
            match status {
                TaskStatus::Spawn(activity_type, args) => {
                    let child_graph = self.spawn_child(&activity_type, &args, task_id, Origin::Spawned)?;
                    frame.spawn(child_graph);
                }
                TaskStatus::Call(activity_type, args) => {
                    let child_graph = self.spawn_child(&activity_type, &args, task_id, Origin::Called)?;
                    frame.spawn(child_graph);
                    return Ok(frame.collect());
                }
                TaskStatus::Delay(d) => {
                    if d == 0 {
                        warn!("{task_id} yielded Delay(0); treating as an immediate re-schedule");
                    }
                    self.schedule.schedule(self.elapsed_time + d, task_id)?;
                    return Ok(frame.collect());
                }
                TaskStatus::AwaitCondition(pred) => {
                    self.awaiting_conditions.push((pred, task_id));
                    return Ok(frame.collect());
                }
                TaskStatus::Completed => {
                    return self.complete(task_id, frame);
                }
            }
        }
    }

    /// Records a finished task's span and, if something is blocked on it via
    /// `Call`, schedules the caller and splices in the synthetic
    /// completion-read (§4.4: "`Completed`").
    fn complete(&mut self, task_id: TaskId, mut frame: TaskFrame) -> anyhow::Result<EventGraph> {
        let start = self.task_start_times[&task_id];
        let kind = self.span_kind(task_id);
        self.spans.push(Span::new(kind, task_id, start, self.elapsed_time));
        debug!("{task_id} completed at t={}", self.elapsed_time);

        match self.awaiting_tasks.remove(&task_id) {
            None => Ok(frame.collect()),
            Some(caller) => {
                self.schedule.schedule(self.elapsed_time, caller)?;
                frame.emit(Topic::Finish(task_id), Value::string("FINISHED"))?;
                let collected = frame.collect();
                // The synthetic notification is a READ (not a FINISH atom)
                // attributed to the *caller*, so the staleness walk treats
                // "the caller observed the callee finish" as an ordinary
                // dependency rather than a special case.
                let synthetic = EventGraph::atom(Event::new(Topic::Read, Value::Topics(vec![Topic::Finish(task_id)]), caller));
                Ok(EventGraph::seq(collected, synthetic))
            }
        }
    }

    /// Whether `task_id` keeps a genuine plan [Directive] for span purposes,
    /// or only its ad-hoc `(activity_type, args)` input. A `task_directives`
    /// entry exists for every task (needed so incremental replay can
    /// reconstruct a directive for a stale child task too), but the span's
    /// external *shape* only shows a `Directive` for tasks the plan itself
    /// named -- this engine distinguishes the two by whether `spawn_child`
    /// (rather than `defer`) created the task.
    fn span_kind(&self, task_id: TaskId) -> SpanKind {
        if self.task_parent_spawned.contains_key(&task_id) || self.task_parent_called.contains_key(&task_id) {
            let (activity_type, args) = self.task_inputs[&task_id].clone();
            SpanKind::Adhoc { activity_type, args }
        } else {
            SpanKind::Directive(self.task_directives[&task_id].clone())
        }
    }

    /// Re-evaluates every pending condition once, scheduling the ones that
    /// now hold and keeping the rest pending. Returns the combined graph of
    /// every condition's read (§4.4: conditions are re-checked, not
    /// suspended tasks advanced, so this never calls `drive`).
    fn evaluate_conditions(&mut self) -> Result<EventGraph, KestrelError> {
        let pending = std::mem::take(&mut self.awaiting_conditions);
        let mut combined = EventGraph::empty();
        for (mut predicate, task_id) in pending {
            let mut frame = TaskFrame::for_task(self.elapsed_time, task_id, self.events.clone());
            let holds = predicate(&mut frame);
            combined = EventGraph::conc(combined, frame.collect());
            if holds {
                self.schedule.schedule(self.elapsed_time, task_id)?;
            } else {
                self.awaiting_conditions.push((predicate, task_id));
            }
        }
        Ok(combined)
    }

    /// Merges `(time, graph)` into `events`, keeping it sorted by time and
    /// `seq`-coalescing anything that lands on a time already present.
    fn merge_history(&mut self, time: u64, graph: EventGraph) {
        merge_history_entry(&mut self.events, time, graph);
    }
}

fn merge_history_entry(events: &mut Vec<HistoryEntry>, time: u64, graph: EventGraph) {
    if graph.is_empty() {
        return;
    }
    match events.binary_search_by_key(&time, |(t, _)| *t) {
        Ok(idx) => {
            let existing = events[idx].1.clone();
            events[idx].1 = EventGraph::seq(existing, graph);
        }
        Err(idx) => events.insert(idx, (time, graph)),
    }
}

/// Bundles the bits of retained history a nested or incremental run needs
/// that aren't part of the plan itself.
#[derive(Default, Clone)]
pub struct ReplayContext {
    pub old_events: Vec<HistoryEntry>,
    pub deleted_tasks: AHashSet<TaskId>,
    pub old_task_directives: AHashMap<TaskId, Directive>,
    pub old_task_parent_called: AHashMap<TaskId, TaskId>,
    /// Where to start issuing task ids from, so a run that reuses another
    /// run's retained history can't hand out an id that history already
    /// uses. Leave at `0` for a genuinely from-scratch run.
    pub id_seed: u32,
}

/// Runs `plan` to completion (or to `config`'s stop time), returning the
/// externally-visible spans and history plus the opaque [Payload] needed to
/// incrementally re-simulate a changed plan later.
///
/// `replay` carries retained history from a previous run: pass
/// [`ReplayContext::default`] for a from-scratch run. See §6.
pub fn simulate<M: Model + Clone>(model: M, plan: &Plan, config: &SimulationConfig, replay: ReplayContext) -> anyhow::Result<(Vec<ExternalSpan>, Vec<HistoryEntry>, Payload)> {
    validate_old_events(&replay.old_events)?;

    let id_seed = replay.id_seed;
    let (mut engine, deleted_tasks) = run(model, plan, config, replay, id_seed)?;

    engine.spans.sort_by_key(|s| (s.start, s.end));

    let plan_directive_to_task = engine
        .task_directives
        .iter()
        .filter(|(task, _)| !engine.task_parent_spawned.contains_key(task) && !engine.task_parent_called.contains_key(task))
        .map(|(task, directive)| (directive.clone(), *task))
        .collect();

    let external_spans = history::without_task(&engine.spans);
    let visible_events = history::without_special_events(&engine.events);

    let payload = Payload {
        events: std::mem::take(&mut engine.events),
        spans: std::mem::take(&mut engine.spans),
        plan_directive_to_task,
        task_directives: engine.task_directives.clone(),
        task_children_called: engine.task_children_called.clone(),
        task_children_spawned: engine.task_children_spawned.clone(),
        task_parent_called: engine.task_parent_called.clone(),
        task_parent_spawned: engine.task_parent_spawned.clone(),
        deleted_tasks,
        next_id: engine.next_id,
    };

    Ok((external_spans, visible_events, payload))
}

/// Drives the schedule until empty or until `config`'s stop time, without
/// doing any of the finalization (span sorting, payload assembly) that only
/// makes sense for a top-level caller. Shared by [`simulate`] and the
/// mid-tick nested replay, which needs the still-running engine back rather
/// than a finished [Payload]. `id_seed` lets a nested replay issue task ids
/// that can never collide with its parent engine's. Also returns the final
/// `deleted_tasks` set: mid-tick staleness detection may grow it beyond what
/// the caller passed in, and callers need that growth (see [`simulate`] and
/// [`crate::incremental`]).
fn run<M: Model + Clone>(
    model: M,
    plan: &Plan,
    config: &SimulationConfig,
    mut replay: ReplayContext,
    id_seed: u32,
) -> anyhow::Result<(SimulationEngine<M>, AHashSet<TaskId>)> {
    let mut engine = SimulationEngine::with_id_seed(model, id_seed);

    for directive in &plan.directives {
        engine.defer(directive)?;
    }

    loop {
        if engine.schedule.is_empty() {
            break;
        }
        let next_time = engine.schedule.peek_next_time();
        if let Some(stop) = config.stop_time() {
            if next_time >= stop {
                break;
            }
        }
        engine.elapsed_time = next_time;

        // Drain retained history strictly before this tick verbatim.
        while let Some((t, _)) = replay.old_events.first() {
            if *t < engine.elapsed_time {
                let (t, g) = replay.old_events.remove(0);
                engine.events.push((t, g));
            } else {
                break;
            }
        }

        let batch = engine.schedule.get_next_batch();
        let mut batch_graph = EventGraph::empty();
        for task_id in batch {
            let contributed = engine.drive(task_id, TaskFrame::for_task(engine.elapsed_time, task_id, engine.events.clone()))?;
            batch_graph = EventGraph::conc(batch_graph, contributed);
        }

        let newly_invalidated_topics = batch_graph.to_set(|e| e.topic.clone());

        if let Some((t, _)) = replay.old_events.first() {
            if *t == engine.elapsed_time {
                let (_, retained_graph) = replay.old_events.remove(0);
                batch_graph = EventGraph::conc(batch_graph, retained_graph);
                if let Some((t2, _)) = replay.old_events.first() {
                    if *t2 == engine.elapsed_time {
                        return Err(KestrelError::DuplicateResumeTime { time: engine.elapsed_time }.into());
                    }
                }
            }
        }

        engine.merge_history(engine.elapsed_time, batch_graph);

        engine.resolve_mid_tick_staleness(&newly_invalidated_topics, &mut replay)?;

        let condition_graph = engine.evaluate_conditions()?;
        engine.merge_history(engine.elapsed_time, condition_graph);
    }

    for (t, g) in replay.old_events.drain(..) {
        engine.merge_history(t, g);
    }

    Ok((engine, replay.deleted_tasks))
}

impl<M: Model + Clone> SimulationEngine<M> {
    /// §4.5.A applied inline, during a live tick rather than at the top of
    /// an incremental run: some of the topics just written this tick may
    /// have been read, in the retained portion of `old_events` still ahead
    /// of us, by a task whose directive is unchanged but whose dependency
    /// just moved. Find those readers, escalate through `Call` parents,
    /// strip their future atoms out of the retained history, and replay
    /// them (and only them) under a nested engine before continuing.
    fn resolve_mid_tick_staleness(&mut self, newly_invalidated_topics: &std::collections::BTreeSet<Topic>, replay: &mut ReplayContext) -> anyhow::Result<()> {
        if newly_invalidated_topics.is_empty() || replay.old_events.is_empty() {
            return Ok(());
        }

        let mut newly_stale_readers: AHashSet<TaskId> = AHashSet::new();
        for (_, graph) in &replay.old_events {
            let (stale_reads, _) = graph.stale_reads(newly_invalidated_topics);
            for event in stale_reads {
                if !replay.deleted_tasks.contains(&event.progeny) {
                    newly_stale_readers.insert(event.progeny);
                }
            }
        }

        if newly_stale_readers.is_empty() {
            return Ok(());
        }

        // Escalate: a reader that is itself a Call-child can't be
        // meaningfully re-run alone, since its parent's control flow is
        // what invoked it. Walk up to the nearest non-Call-child ancestor.
        let mut worklist: Vec<TaskId> = newly_stale_readers.iter().copied().collect();
        while let Some(reader) = worklist.pop() {
            if let Some(parent) = replay.old_task_parent_called.get(&reader) {
                if newly_stale_readers.insert(*parent) {
                    worklist.push(*parent);
                }
            }
        }

        warn!("mid-tick staleness at t={}: {} reader(s) invalidated", self.elapsed_time, newly_stale_readers.len());

        replay.deleted_tasks.extend(newly_stale_readers.iter().copied());

        // Strip the stale readers' future atoms from the still-retained
        // portion of old_events, dropping entries that become empty.
        let mut remaining = Vec::with_capacity(replay.old_events.len());
        for (t, g) in replay.old_events.drain(..) {
            let stripped = g.filter_p(|e| !newly_stale_readers.contains(&e.progeny));
            if !stripped.is_empty() {
                remaining.push((t, stripped));
            }
        }
        replay.old_events = remaining;

        // Reconstruct directives for every stale reader that isn't itself a
        // Call-child (those are covered by their escalated parent).
        let directives_to_replay: Vec<Directive> = newly_stale_readers
            .iter()
            .filter(|task| !replay.old_task_parent_called.contains_key(task))
            .filter_map(|task| replay.old_task_directives.get(task).cloned())
            .collect();

        if directives_to_replay.is_empty() {
            return Ok(());
        }

        warn!("mid-tick staleness at t={}: triggering a nested replay of {} directive(s)", self.elapsed_time, directives_to_replay.len());

        let nested_plan = Plan::new(directives_to_replay);
        let nested_config = SimulationConfig::new().with_stop_time(self.elapsed_time);
        let (nested, nested_deleted) = run(self.model.clone(), &nested_plan, &nested_config, ReplayContext::default(), self.next_id)?;

        self.absorb(nested);
        replay.deleted_tasks.extend(nested_deleted);
        Ok(())
    }

    /// Folds a nested engine's state back into `self`. The nested engine's
    /// task ids were seeded above `self`'s own counter (see
    /// [`with_id_seed`](Self::with_id_seed)), so every map merges directly
    /// with no risk of key collision; `self.next_id` is bumped past
    /// whatever the nested run consumed so subsequently-created tasks in
    /// `self` still can't collide with it either.
    fn absorb(&mut self, mut nested: SimulationEngine<M>) {
        self.next_id = self.next_id.max(nested.next_id);

        self.tasks.extend(nested.tasks.drain());
        self.task_start_times.extend(nested.task_start_times.drain());
        self.task_inputs.extend(nested.task_inputs.drain());
        self.task_directives.extend(nested.task_directives.drain());
        self.task_children_spawned.extend(nested.task_children_spawned.drain());
        self.task_children_called.extend(nested.task_children_called.drain());
        self.task_parent_spawned.extend(nested.task_parent_spawned.drain());
        self.task_parent_called.extend(nested.task_parent_called.drain());
        self.awaiting_conditions.extend(nested.awaiting_conditions.drain(..));
        self.awaiting_tasks.extend(nested.awaiting_tasks.drain());
        self.spans.extend(nested.spans.drain(..));

        while !nested.schedule.is_empty() {
            let time = nested.schedule.peek_next_time();
            for task_id in nested.schedule.get_next_batch() {
                self.schedule.schedule(time, task_id).expect("nested task ids cannot collide with the outer schedule");
            }
        }

        for (t, g) in nested.events.drain(..) {
            self.merge_history(t, g);
        }
    }
}

fn validate_old_events(old_events: &[HistoryEntry]) -> Result<(), KestrelError> {
    let mut last: Option<u64> = None;
    for (t, _) in old_events {
        if let Some(prev) = last {
            if prev == *t {
                return Err(KestrelError::DuplicateResumeTime { time: *t });
            }
        }
        last = Some(*t);
    }
    Ok(())
}

/// Samples every attribute `model` exposes (§4.4/profile diagnostics,
/// §8 scenario 2) at time `0` and after each entry of `events`, by replaying
/// a fresh read-only [`TaskFrame`] against the history accumulated so far.
pub fn profile<M: Model>(model: &M, events: &[HistoryEntry]) -> AHashMap<String, Vec<(u64, Value)>> {
    let mut profiles: AHashMap<String, Vec<(u64, Value)>> = model.attributes().into_iter().map(|a| (a, Vec::new())).collect();

    let mut history: Vec<HistoryEntry> = Vec::new();
    let mut frame = TaskFrame::model_only(0, history.clone());
    for (name, series) in profiles.iter_mut() {
        if let Ok(value) = model.get_attribute(&mut frame, name) {
            series.push((0, value));
        }
    }

    for (time, graph) in events {
        history.push((*time, graph.clone()));
        let mut frame = TaskFrame::model_only(*time, history.clone());
        for (name, series) in profiles.iter_mut() {
            if let Ok(value) = model.get_attribute(&mut frame, name) {
                series.push((*time, value));
            }
        }
    }

    profiles
}
