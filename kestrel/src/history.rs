//! Post-processing helpers applied to a finished run's recorded history
//! before it is handed back to a caller.

use crate::event::Topic;
use crate::event_graph::EventGraph;
use crate::frame::HistoryEntry;
use crate::span::{ExternalSpan, Span};

/// Drops `READ`, `SPAWN`, and `FINISH(_)` atoms from every history entry,
/// dropping entries that filter down to `Empty` entirely.
pub fn without_special_events(events: &[HistoryEntry]) -> Vec<HistoryEntry> {
    events
        .iter()
        .filter_map(|(t, g)| {
            let filtered = g.filter_p(|e| !matches!(e.topic, Topic::Read | Topic::Spawn | Topic::Finish(_)));
            if filtered.is_empty() {
                None
            } else {
                Some((*t, filtered))
            }
        })
        .collect()
}

/// Merges history entries that share a time, in the order given, via
/// `combiner` (always `EventGraph::seq` in practice: earlier-merged entries
/// happened first).
pub fn collapse_simultaneous(history: &[HistoryEntry], combiner: impl Fn(EventGraph, EventGraph) -> EventGraph) -> Vec<HistoryEntry> {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|(t, _)| *t);

    let mut out: Vec<HistoryEntry> = Vec::new();
    for (t, g) in sorted {
        match out.last_mut() {
            Some((last_t, last_g)) if *last_t == t => {
                *last_g = combiner(last_g.clone(), g);
            }
            _ => out.push((t, g)),
        }
    }
    out
}

/// Strips task ids from a finished run's internal spans, producing the form
/// returned to callers.
pub fn without_task(spans: &[Span]) -> Vec<ExternalSpan> {
    spans.iter().map(ExternalSpan::from).collect()
}
