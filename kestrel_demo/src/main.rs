//! A worked example of `kestrel`: run a baseline plan against a toy model,
//! then edit the plan and re-simulate incrementally, showing that only the
//! activities touched by the edit get re-invoked.

mod activities;
mod model;

use kestrel::task::Args;
use kestrel::{simulate, simulate_incremental, Directive, Plan, ReplayContext, SimulationConfig, Value};
use model::SpacecraftModel;

fn baseline_plan() -> Plan {
    let mut my_activity_args = Args::new();
    my_activity_args.insert("param1".to_string(), Value::int(5));

    Plan::new(vec![
        Directive::new("my_other_activity", 10, Args::new()),
        Directive::new("my_activity", 20, my_activity_args),
        Directive::new("my_decomposing_activity", 40, Args::new()),
        Directive::new("caller_activity", 50, Args::new()),
    ])
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let model = SpacecraftModel;
    let old_plan = baseline_plan();

    let (spans, events, payload) = simulate(model.clone(), &old_plan, &SimulationConfig::new(), ReplayContext::default())?;

    println!("== baseline ==");
    for (time, graph) in &events {
        println!("  t={time}: {graph}");
    }
    for span in &spans {
        println!("  span {:?}: [{}, {}]", span.kind, span.start, span.end);
    }

    let profile = kestrel::profile(&model, &events);
    for name in ["x", "y", "z"] {
        println!("  {name} profile: {:?}", profile[name]);
    }

    // Now edit the plan: add a new directive at t=60, leaving everything
    // else untouched. Per the minimality law, incremental replay must only
    // invoke `my_decomposing_activity` for the new directive -- none of the
    // three original activities get reconstructed.
    let mut new_plan = old_plan.clone();
    new_plan.directives.push(Directive::new("my_decomposing_activity", 60, Args::new()));

    let (new_spans, new_events, _) = simulate_incremental(model, &new_plan, &old_plan, payload)?;

    println!("== after adding a directive at t=60 ==");
    for (time, graph) in &new_events {
        println!("  t={time}: {graph}");
    }
    for span in &new_spans {
        println!("  span {:?}: [{}, {}]", span.kind, span.start, span.end);
    }

    Ok(())
}
