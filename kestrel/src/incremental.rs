//! The incremental driver (C5): diffs an old plan against a new one and
//! replays only the directives that were added, plus whatever retained
//! history turned out to depend on something that changed.
//!
//! Four stages, run in order: diff the plans as a stable multiset, compute
//! the deletion closure over spawned/called children, run the staleness
//! fixpoint over retained history, then replay the union of added and stale
//! directives against the residual history and reconcile spans.

use crate::config::SimulationConfig;
use crate::engine::{self, ReplayContext};
use crate::event::Topic;
use crate::event_graph::EventGraph;
use crate::frame::HistoryEntry;
use crate::history;
use crate::model::Model;
use crate::payload::Payload;
use crate::span::{ExternalSpan, SpanKind};
use crate::task::{Directive, Plan, TaskId};

use ahash::{AHashMap, AHashSet};
use log::info;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Diffs `old` against `new` as a stable multiset: directives are bucketed
/// by a canonical hash of their full contents (type, start time, and args),
/// and within a bucket old and new directives are paired up in the order
/// they appear in their respective plans. Whatever's left unpaired in the
/// old bucket is "removed"; whatever's left unpaired in the new bucket is
/// "added". A directive that appears verbatim in both plans -- even if its
/// plan-order position shifted -- is paired and contributes to neither list.
///
/// Bucketing by hash and pairing in original-plan order is deterministic
/// regardless of how the two plans are laid out relative to each other,
/// unlike a greedy pairwise-removal diff, which can depend on iteration
/// order when multiple directives collide on the same fields.
fn diff_plans(old: &[Directive], new: &[Directive]) -> (Vec<Directive>, Vec<Directive>) {
    let mut old_buckets: AHashMap<u64, Vec<&Directive>> = AHashMap::new();
    for directive in old {
        old_buckets.entry(canonical_hash(directive)).or_default().push(directive);
    }

    let mut consumed: AHashMap<u64, usize> = AHashMap::new();
    let mut added = Vec::new();

    for directive in new {
        let key = canonical_hash(directive);
        let idx = consumed.entry(key).or_insert(0);
        let paired = old_buckets.get(&key).map(|bucket| *idx < bucket.len()).unwrap_or(false);
        if paired {
            *idx += 1;
        } else {
            added.push(directive.clone());
        }
    }

    let mut removed = Vec::new();
    for (key, bucket) in &old_buckets {
        let used = consumed.get(key).copied().unwrap_or(0);
        removed.extend(bucket[used..].iter().map(|d| (*d).clone()));
    }

    (removed, added)
}

fn canonical_hash(directive: &Directive) -> u64 {
    let mut hasher = ahash::AHasher::default();
    directive.hash(&mut hasher);
    hasher.finish()
}

/// Computes the transitive closure of `seed` over both kinds of parent/child
/// edges: deleting a task deletes everything it ever spawned or called.
fn deletion_closure(seed: impl IntoIterator<Item = TaskId>, task_children_spawned: &AHashMap<TaskId, Vec<TaskId>>, task_children_called: &AHashMap<TaskId, Vec<TaskId>>) -> AHashSet<TaskId> {
    let mut closure: AHashSet<TaskId> = seed.into_iter().collect();
    let mut worklist: Vec<TaskId> = closure.iter().copied().collect();
    while let Some(task) = worklist.pop() {
        for table in [task_children_spawned, task_children_called] {
            if let Some(children) = table.get(&task) {
                for child in children {
                    if closure.insert(*child) {
                        worklist.push(*child);
                    }
                }
            }
        }
    }
    closure
}

/// Finds every task whose retained `READ` depends, directly or
/// transitively, on a deleted or already-stale task's output (§4.5.A).
///
/// Folds `filter_p(topic==READ || progeny deleted || progeny stale)` across
/// the *entire* retained history in causal order (as one sequential
/// composition, since top-level history entries are already time-ordered),
/// then walks it with [`EventGraph::stale_reads`] starting from an empty
/// topic set: every retained atom surviving the filter is, by construction,
/// either a read or something written by a deleted/stale task, so the walk
/// correctly marks topics stale exactly where a deleted/stale write
/// happens, and flags any later read that touches one.
fn find_stale_reads(events: &[HistoryEntry], deleted_tasks: &AHashSet<TaskId>, stale_tasks: &AHashSet<TaskId>) -> AHashSet<TaskId> {
    let mut relevant = EventGraph::empty();
    for (_, graph) in events {
        let filtered = graph.filter_p(|e| e.topic == Topic::Read || deleted_tasks.contains(&e.progeny) || stale_tasks.contains(&e.progeny));
        relevant = EventGraph::seq(relevant, filtered);
    }

    let (stale_reads, _) = relevant.stale_reads(&BTreeSet::new());
    stale_reads
        .into_iter()
        .map(|e| e.progeny)
        .filter(|task| !deleted_tasks.contains(task) && !stale_tasks.contains(task))
        .collect()
}

/// Replays only what changed between `old_plan` and `new_plan`, reusing
/// retained history for everything else (§4.5, §6).
///
/// `payload` must come from the `simulate`/`simulate_incremental` run that
/// actually produced `old_plan`'s recorded history; passing a mismatched
/// payload produces meaningless results rather than a detectable error,
/// since the kernel has no way to tell the two apart.
///
/// The third return value is always `None`: unlike a full `simulate`, an
/// incremental run does not itself produce a further `Payload` to chain
/// another incremental round off of. Callers that need to keep
/// incrementally re-simulating must go back through a full `simulate` first.
pub fn simulate_incremental<M: Model + Clone>(model: M, new_plan: &Plan, old_plan: &Plan, payload: Payload) -> anyhow::Result<(Vec<ExternalSpan>, Vec<HistoryEntry>, Option<Payload>)> {
    let (removed_directives, added_directives) = diff_plans(&old_plan.directives, &new_plan.directives);
    info!("incremental diff: {} removed, {} added", removed_directives.len(), added_directives.len());

    let removed_tasks: Vec<TaskId> = removed_directives.iter().filter_map(|d| payload.plan_directive_to_task.get(d).copied()).collect();
    let deleted_tasks = deletion_closure(removed_tasks, &payload.task_children_spawned, &payload.task_children_called);

    let mut stale_tasks: AHashSet<TaskId> = AHashSet::new();
    loop {
        let new_stale = find_stale_reads(&payload.events, &deleted_tasks, &stale_tasks);
        if new_stale.is_empty() {
            break;
        }
        stale_tasks.extend(new_stale);
    }
    if !stale_tasks.is_empty() {
        info!("incremental staleness fixpoint: {} task(s) invalidated by a changed dependency", stale_tasks.len());
    }

    let stale_directives: Vec<Directive> = stale_tasks.iter().filter_map(|task| payload.task_directives.get(task).cloned()).collect();

    let mut directives_to_simulate = added_directives;
    directives_to_simulate.extend(stale_directives.iter().cloned());

    let residual_events: Vec<HistoryEntry> = payload
        .events
        .iter()
        .filter_map(|(t, g)| {
            let filtered = g.filter_p(|e| !deleted_tasks.contains(&e.progeny) && !stale_tasks.contains(&e.progeny));
            if filtered.is_empty() {
                None
            } else {
                Some((*t, filtered))
            }
        })
        .collect();

    let replay = ReplayContext {
        old_events: residual_events,
        deleted_tasks: deleted_tasks.clone(),
        old_task_directives: payload.task_directives.clone(),
        old_task_parent_called: payload.task_parent_called.clone(),
        id_seed: payload.next_id,
    };

    let replay_plan = Plan::new(directives_to_simulate);
    let (new_spans, new_events, new_payload) = engine::simulate(model, &replay_plan, &SimulationConfig::new(), replay)?;

    // Residual entries pulled in from a mid-tick nested replay may not all
    // have landed through the same merge point, so re-collapse by time once
    // more before returning. Harmless if everything was already coalesced.
    let new_events = history::collapse_simultaneous(&new_events, EventGraph::seq);

    let mut all_deleted = deleted_tasks;
    all_deleted.extend(new_payload.deleted_tasks.iter().copied());

    let retired_directives: AHashSet<&Directive> = all_deleted.iter().filter_map(|task| payload.task_directives.get(task)).chain(stale_directives.iter()).collect();

    let mut spans: Vec<ExternalSpan> = payload
        .spans
        .iter()
        .filter(|span| {
            if all_deleted.contains(&span.task) {
                return false;
            }
            match &span.kind {
                SpanKind::Directive(d) => !retired_directives.contains(d),
                SpanKind::Adhoc { .. } => true,
            }
        })
        .map(ExternalSpan::from)
        .collect();
    spans.extend(new_spans);
    spans.sort_by_key(|s| (s.start, s.end));

    Ok((spans, new_events, None))
}
