use std::time::Duration;

use stategraph_core::{GraphError, NodeError, StateMap};
use stategraph_graph::{CompiledGraph, ExecutionConfig, ExecutionStatus, StateGraph, END};

fn add(
    field: &'static str,
    amount: i64,
) -> impl Fn(&StateMap) -> Result<StateMap, NodeError> + Send + Sync + 'static {
    move |s: &StateMap| {
        let current = s.require_int(field).unwrap_or(0);
        Ok(StateMap::from([(field, current + amount)]))
    }
}

fn three_step_graph() -> CompiledGraph<StateMap> {
    StateGraph::<StateMap>::new()
        .add_fn_node("a", add("n", 1))
        .unwrap()
        .add_fn_node("b", add("n", 10))
        .unwrap()
        .add_fn_node("c", add("n", 100))
        .unwrap()
        .add_edge("a", "b")
        .unwrap()
        .add_edge("b", "c")
        .unwrap()
        .add_edge("c", END)
        .unwrap()
        .set_entry_point("a")
        .unwrap()
        .compile()
        .unwrap()
}

#[test]
fn iterate_yields_one_event_per_node() {
    let graph = three_step_graph();

    let events: Vec<_> = graph
        .execute(StateMap::new())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(events.len(), 3);

    assert_eq!(events[0].node, "a");
    assert_eq!(events[0].step, 1);
    assert_eq!(events[0].state.require_int("n").unwrap(), 1);

    assert_eq!(events[1].node, "b");
    assert_eq!(events[1].state.require_int("n").unwrap(), 11);

    assert_eq!(events[2].node, "c");
    assert_eq!(events[2].step, 3);
    assert_eq!(events[2].state.require_int("n").unwrap(), 111);
}

#[test]
fn step_walks_the_state_machine() {
    let graph = three_step_graph();
    let mut execution = graph.execute(StateMap::new()).unwrap();

    assert_eq!(execution.status(), &ExecutionStatus::Running("a".into()));
    execution.step().unwrap();
    assert_eq!(execution.status(), &ExecutionStatus::Running("b".into()));
    execution.step().unwrap();
    execution.step().unwrap();
    assert_eq!(execution.status(), &ExecutionStatus::Succeeded);

    // Further steps are no-ops.
    assert!(execution.step().unwrap().is_none());
    assert_eq!(execution.trace().visited(), ["a", "b", "c"]);

    let state = execution.into_state().unwrap();
    assert_eq!(state.require_int("n").unwrap(), 111);
}

#[test]
fn failure_discards_partial_state() {
    let graph = StateGraph::<StateMap>::new()
        .add_fn_node("ok", add("n", 1))
        .unwrap()
        .add_fn_node("bad", |_s: &StateMap| Err("bad input".into()))
        .unwrap()
        .add_edge("ok", "bad")
        .unwrap()
        .set_entry_point("ok")
        .unwrap()
        .compile()
        .unwrap();

    let mut execution = graph.execute(StateMap::new()).unwrap();
    let first = execution.next().unwrap().unwrap();
    assert_eq!(first.node, "ok");

    let err = execution.next().unwrap().unwrap_err();
    assert_eq!(err.node(), Some("bad"));
    assert_eq!(execution.status(), &ExecutionStatus::Failed);
    assert!(execution.state().is_none());
    assert_eq!(execution.trace().visited(), ["ok", "bad"]);

    // The iterator is fused after a failure.
    assert!(execution.next().is_none());
    assert!(execution.into_state().is_none());
}

#[test]
fn run_after_failure_reports_error() {
    let graph = StateGraph::<StateMap>::new()
        .add_fn_node("bad", |_s: &StateMap| Err("bad input".into()))
        .unwrap()
        .set_entry_point("bad")
        .unwrap()
        .compile()
        .unwrap();

    let mut execution = graph.execute(StateMap::new()).unwrap();
    assert!(execution.step().is_err());
    let err = execution.run().unwrap_err();
    assert!(err.to_string().contains("already failed"), "got: {err}");
}

#[test]
fn each_run_gets_a_fresh_trace() {
    let graph = three_step_graph();

    let (_, first) = graph.invoke_with_trace(StateMap::new()).unwrap();
    let (_, second) = graph.invoke_with_trace(StateMap::new()).unwrap();

    assert_eq!(first.visited(), second.visited());
    assert_ne!(first.run_id(), second.run_id());
}

#[test]
fn zero_deadline_fails_before_first_node() {
    let graph = three_step_graph();

    let err = graph
        .invoke_with_config(
            StateMap::new(),
            ExecutionConfig::new().with_deadline(Duration::ZERO),
        )
        .unwrap_err();

    match err {
        GraphError::DeadlineExceeded { deadline, trace } => {
            assert_eq!(deadline, Duration::ZERO);
            assert!(trace.is_empty());
        }
        other => panic!("expected DeadlineExceeded, got: {other}"),
    }
}

#[test]
fn deadline_is_checked_between_steps() {
    let graph = StateGraph::<StateMap>::new()
        .add_fn_node("slow", |s: &StateMap| {
            std::thread::sleep(Duration::from_millis(30));
            add("n", 1)(s)
        })
        .unwrap()
        .add_edge("slow", "slow")
        .unwrap()
        .set_entry_point("slow")
        .unwrap()
        .compile()
        .unwrap();

    let err = graph
        .invoke_with_config(
            StateMap::new(),
            ExecutionConfig::new().with_deadline(Duration::from_millis(50)),
        )
        .unwrap_err();

    let trace = err.trace().unwrap();
    assert!(matches!(err, GraphError::DeadlineExceeded { .. }));
    assert!(trace.len() >= 2, "trace: {trace}");
}

#[test]
fn generous_deadline_does_not_interfere() {
    let graph = three_step_graph();

    let result = graph
        .invoke_with_config(
            StateMap::new(),
            ExecutionConfig::new().with_deadline(Duration::from_secs(60)),
        )
        .unwrap();
    assert_eq!(result.require_int("n").unwrap(), 111);
}

#[test]
fn execution_config_serde() {
    let config: ExecutionConfig =
        serde_json::from_str(r#"{"max_steps": 50, "deadline_ms": 1500}"#).unwrap();
    assert_eq!(config.max_steps, 50);
    assert_eq!(config.deadline, Some(Duration::from_millis(1500)));

    let defaults: ExecutionConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, ExecutionConfig::default());
    assert_eq!(defaults.max_steps, 10_000);

    let json = serde_json::to_value(ExecutionConfig::new().with_max_steps(3)).unwrap();
    assert_eq!(json, serde_json::json!({"max_steps": 3, "deadline_ms": null}));
}
