//! The event-graph algebra (C1): an immutable, structure-preserving record of
//! everything a set of tasks did during one instant.
//!
//! `EventGraph` is a persistent algebraic data type: `Empty`, a single
//! `Atom`, or the sequential/concurrent composition of two subgraphs.
//! Subtrees are reference-counted so filtering and replaying can share
//! structure instead of deep-cloning; there is no interior mutability and no
//! canonicalization — `seq` and `conc` nodes are kept exactly as built so
//! that staleness analysis (§4.5) can tell a happens-before edge from mere
//! coincidence.

use crate::event::{Event, Topic};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Empty,
    Atom(Event),
    Sequentially(EventGraph, EventGraph),
    Concurrently(EventGraph, EventGraph),
}

/// A persistent, structurally-shared event graph. Cheap to clone (an `Rc`
/// bump) and cheap to compare when the two graphs share the same spine.
#[derive(Clone, Debug, PartialEq)]
pub struct EventGraph(Rc<Node>);

impl EventGraph {
    pub fn empty() -> Self {
        EventGraph(Rc::new(Node::Empty))
    }

    pub fn atom(event: Event) -> Self {
        EventGraph(Rc::new(Node::Atom(event)))
    }

    pub fn is_empty(&self) -> bool {
        matches!(*self.0, Node::Empty)
    }

    /// Sequential composition: `a` happens-before `b`.
    ///
    /// Collapses `Empty` neighbors so that an `Empty` operand never shows up
    /// in the result.
    pub fn seq(a: EventGraph, b: EventGraph) -> Self {
        if a.is_empty() {
            b
        } else if b.is_empty() {
            a
        } else {
            EventGraph(Rc::new(Node::Sequentially(a, b)))
        }
    }

    /// Concurrent (unordered) composition.
    pub fn conc(a: EventGraph, b: EventGraph) -> Self {
        if a.is_empty() {
            b
        } else if b.is_empty() {
            a
        } else {
            EventGraph(Rc::new(Node::Concurrently(a, b)))
        }
    }

    /// The subgraph of atoms whose topic is in `topics`, preserving
    /// structure. Composed nodes whose children both reduce to `Empty`
    /// collapse away via the smart constructors above.
    pub fn filter(&self, topics: &[Topic]) -> Self {
        self.filter_p(|e| topics.contains(&e.topic))
    }

    /// Same shape as [`filter`](Self::filter), but with an arbitrary predicate.
    pub fn filter_p(&self, predicate: impl Fn(&Event) -> bool + Copy) -> Self {
        match &*self.0 {
            Node::Empty => EventGraph::empty(),
            Node::Atom(e) => {
                if predicate(e) {
                    self.clone()
                } else {
                    EventGraph::empty()
                }
            }
            Node::Sequentially(a, b) => EventGraph::seq(a.filter_p(predicate), b.filter_p(predicate)),
            Node::Concurrently(a, b) => EventGraph::conc(a.filter_p(predicate), b.filter_p(predicate)),
        }
    }

    /// A post-order fold collecting `projector(e)` for every atom into a set.
    pub fn to_set<T: Ord>(&self, projector: impl Fn(&Event) -> T + Copy) -> BTreeSet<T> {
        let mut out = BTreeSet::new();
        self.to_set_into(projector, &mut out);
        out
    }

    fn to_set_into<T: Ord>(&self, projector: impl Fn(&Event) -> T + Copy, out: &mut BTreeSet<T>) {
        match &*self.0 {
            Node::Empty => {}
            Node::Atom(e) => {
                out.insert(projector(e));
            }
            Node::Sequentially(a, b) | Node::Concurrently(a, b) => {
                a.to_set_into(projector, out);
                b.to_set_into(projector, out);
            }
        }
    }

    /// A post-order fold collecting `projector(e)` for every atom into a
    /// `Vec`, in traversal order: a `Sequentially` node visits its prefix
    /// then its suffix, and (since this is a diagnostic/model-facing
    /// traversal, not a causal one) a `Concurrently` node visits its left
    /// child then its right. Unlike [`to_set`](Self::to_set), duplicates and
    /// order survive -- this is what a model's `get_attribute` needs to
    /// answer "what was the last write to this topic in this instant", which
    /// a set can't express.
    pub fn to_vec<T>(&self, projector: impl Fn(&Event) -> T + Copy) -> Vec<T> {
        let mut out = Vec::new();
        self.to_vec_into(projector, &mut out);
        out
    }

    fn to_vec_into<T>(&self, projector: impl Fn(&Event) -> T + Copy, out: &mut Vec<T>) {
        match &*self.0 {
            Node::Empty => {}
            Node::Atom(e) => out.push(projector(e)),
            Node::Sequentially(a, b) | Node::Concurrently(a, b) => {
                a.to_vec_into(projector, out);
                b.to_vec_into(projector, out);
            }
        }
    }

    /// Renders the graph for diagnostics and tests: atoms as `"topic=value"`,
    /// `seq(a,b)` as `"a;b"`, `conc(a,b)` as `"(a|b)"`, `Empty` as `""`.
    pub fn to_string_diag(&self) -> String {
        match &*self.0 {
            Node::Empty => String::new(),
            Node::Atom(e) => format!("{e}"),
            Node::Sequentially(a, b) => format!("{};{}", a.to_string_diag(), b.to_string_diag()),
            Node::Concurrently(a, b) => format!("({}|{})", a.to_string_diag(), b.to_string_diag()),
        }
    }

    /// Walks the staleness linearization described in §4.5.A.
    ///
    /// `stale_topics` starts as the topics already known to be invalidated.
    /// Returns the `READ` atoms found stale, and the accumulated topic set
    /// (so callers folding over a sequence of history entries can thread the
    /// set through in causal order).
    pub fn stale_reads(&self, stale_topics: &BTreeSet<Topic>) -> (Vec<Event>, BTreeSet<Topic>) {
        match &*self.0 {
            Node::Empty => (vec![], stale_topics.clone()),
            Node::Atom(e) => {
                if e.topic == Topic::Read {
                    let reads_stale = e
                        .read_topics()
                        .map(|ts| ts.iter().any(|t| stale_topics.contains(t)))
                        .unwrap_or(false);
                    if reads_stale {
                        (vec![e.clone()], stale_topics.clone())
                    } else {
                        (vec![], stale_topics.clone())
                    }
                } else {
                    let mut next = stale_topics.clone();
                    next.insert(e.topic.clone());
                    (vec![], next)
                }
            }
            Node::Sequentially(a, b) => {
                let (mut ra, sa) = a.stale_reads(stale_topics);
                let merged: BTreeSet<Topic> = stale_topics.union(&sa).cloned().collect();
                let (rb, sb) = b.stale_reads(&merged);
                ra.extend(rb);
                (ra, sa.union(&sb).cloned().collect())
            }
            Node::Concurrently(a, b) => {
                // Siblings do not see each other: both sides start from the
                // same incoming `stale_topics`, independent of one another.
                let (mut rl, sl) = a.stale_reads(stale_topics);
                let (rr, sr) = b.stale_reads(stale_topics);
                rl.extend(rr);
                (rl, sl.union(&sr).cloned().collect())
            }
        }
    }
}

impl fmt::Display for EventGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_diag())
    }
}

impl Default for EventGraph {
    fn default() -> Self {
        EventGraph::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Value;
    use crate::task::TaskId;

    fn t(n: u32) -> TaskId {
        TaskId::new(n)
    }

    fn atom(topic: &str, value: i64) -> EventGraph {
        EventGraph::atom(Event::new(topic, value, t(0)))
    }

    #[test]
    fn empty_elision() {
        let g = atom("x", 1);
        assert_eq!(EventGraph::seq(EventGraph::empty(), g.clone()), g);
        assert_eq!(EventGraph::seq(g.clone(), EventGraph::empty()), g);
        assert_eq!(EventGraph::conc(EventGraph::empty(), g.clone()), g);
        assert_eq!(EventGraph::conc(g.clone(), EventGraph::empty()), g);
    }

    #[test]
    fn to_string_shapes() {
        let a = atom("x", 1);
        let b = atom("y", 2);
        assert_eq!(EventGraph::seq(a.clone(), b.clone()).to_string_diag(), "x=1;y=2");
        assert_eq!(EventGraph::conc(a, b).to_string_diag(), "(x=1|y=2)");
        assert_eq!(EventGraph::empty().to_string_diag(), "");
    }

    #[test]
    fn filter_preserves_structure() {
        let a = atom("x", 1);
        let b = atom("y", 2);
        let g = EventGraph::conc(a, b);
        let filtered = g.filter(&[Topic::from("x")]);
        assert_eq!(filtered.to_string_diag(), "x=1");
    }

    #[test]
    fn filter_composition_law() {
        let a = atom("x", 1);
        let b = atom("y", 2);
        let c = atom("z", 3);
        let g = EventGraph::seq(EventGraph::conc(a, b), c);

        let left = g
            .filter(&[Topic::from("x"), Topic::from("y")])
            .filter(&[Topic::from("y")]);
        let right = g.filter(&[Topic::from("y")]);
        assert_eq!(left, right);
    }

    #[test]
    fn to_set_collects_all_topics() {
        let a = atom("x", 1);
        let b = atom("y", 2);
        let g = EventGraph::seq(a, b);
        let set = g.to_set(|e| e.topic.clone());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn to_vec_preserves_traversal_order_for_repeated_topics() {
        let writes = [atom("x", 55), atom("y", 13), atom("x", 57)];
        let g = EventGraph::seq(writes[0].clone(), EventGraph::conc(writes[1].clone(), writes[2].clone()));
        let xs: Vec<i64> = g
            .to_vec(|e| e.value.clone())
            .into_iter()
            .filter_map(|v| match v {
                Value::Int(i) => Some(i),
                _ => None,
            })
            .collect();
        // Last x write in traversal order is 57, not 55 -- a set would lose
        // this, since `{55, 57}.next_back()` happens to agree here only by
        // coincidence of ordering on i64.
        assert_eq!(xs.last(), Some(&57));
    }
}
