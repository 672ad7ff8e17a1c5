//! Checks the `Conc` half of the staleness walk: a reader that only ever
//! read one of two concurrently-scheduled writers must not be invalidated
//! when the *other* writer's directive changes, because concurrent siblings
//! do not see each other's topics during staleness analysis (§4.5.A).

mod util;

use kestrel::task::Plan;
use kestrel::{simulate, simulate_incremental, ReplayContext, SimulationConfig, Value};
use util::{args, directive, TestModel};

#[test]
fn concurrent_writers_are_recorded_as_concurrent_not_sequential() {
    let model = TestModel::new(&[]);
    let plan = Plan::new(vec![
        directive("emit", 0, args(&[("topic", "a".into()), ("value", Value::int(1))])),
        directive("emit", 0, args(&[("topic", "b".into()), ("value", Value::int(2))])),
    ]);

    let (_, events, _) = simulate(model, &plan, &SimulationConfig::new(), ReplayContext::default()).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.to_string_diag(), "(a=1|b=2)");
}

#[test]
fn editing_one_concurrent_sibling_does_not_invalidate_a_reader_of_the_other() {
    let model = TestModel::new(&[]);
    let a = directive("emit", 0, args(&[("topic", "a".into()), ("value", Value::int(1))]));
    let b_old = directive("emit", 0, args(&[("topic", "b".into()), ("value", Value::int(2))]));
    let waiter = directive("wait_then_emit", 0, args(&[("watch_topic", "a".into()), ("threshold", Value::int(1)), ("out_topic", "saw_a".into())]));
    let old_plan = Plan::new(vec![a.clone(), b_old.clone(), waiter.clone()]);

    let (_, events, payload) = simulate(model.clone(), &old_plan, &SimulationConfig::new(), ReplayContext::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.to_string_diag(), "(a=1|b=2);saw_a=true");

    let forbidding_both = model
        .forbidding("emit", args(&[("topic", "a".into()), ("value", Value::int(1))]))
        .forbidding("wait_then_emit", args(&[("watch_topic", "a".into()), ("threshold", Value::int(1)), ("out_topic", "saw_a".into())]));

    let b_new = directive("emit", 0, args(&[("topic", "b".into()), ("value", Value::int(99))]));
    let new_plan = Plan::new(vec![a, b_new, waiter]);

    let (_, new_events, _) = simulate_incremental(forbidding_both, &new_plan, &old_plan, payload).unwrap();

    assert_eq!(new_events.len(), 1);
    // The replayed writer and the retained thread merge back in as two
    // concurrent branches at the top level, regardless of how the original
    // run's single shared batch happened to associate them.
    assert_eq!(new_events[0].1.to_string_diag(), "(b=99|a=1;saw_a=true)");
}
