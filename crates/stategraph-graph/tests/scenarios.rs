//! The greeting, counter, two-step and parity graphs, built on `StateMap`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stategraph_core::{NodeError, StateMap, Value};
use stategraph_graph::{CompiledGraph, StateGraph, END};

fn greeting_graph() -> Result<CompiledGraph<StateMap>, stategraph_core::GraphError> {
    StateGraph::<StateMap>::new()
        .add_fn_node("greeter", |s: &StateMap| {
            let name = s.require_str("name")?;
            Ok(StateMap::from([("message", format!("Hello, {name}!"))]))
        })?
        .set_entry_point("greeter")?
        .add_edge("greeter", END)?
        .compile()
}

#[test]
fn greeter_adds_message() {
    let graph = greeting_graph().unwrap();

    let result = graph.invoke(StateMap::from([("name", "Alice")])).unwrap();
    assert_eq!(
        result,
        StateMap::from([("name", "Alice"), ("message", "Hello, Alice!")])
    );

    // The same compiled graph can be invoked again.
    let result = graph.invoke(StateMap::from([("name", "Bob")])).unwrap();
    assert_eq!(result.require_str("message").unwrap(), "Hello, Bob!");
}

#[test]
fn counter_adds_one() {
    let graph = StateGraph::<StateMap>::new()
        .add_fn_node("counter", |s: &StateMap| {
            Ok(StateMap::from([("count", s.require_int("start")? + 1)]))
        })
        .unwrap()
        .set_entry_point("counter")
        .unwrap()
        .add_edge("counter", END)
        .unwrap()
        .compile()
        .unwrap();

    let result = graph.invoke(StateMap::from([("start", 5)])).unwrap();
    assert_eq!(result, StateMap::from([("start", 5), ("count", 6)]));

    let result = graph.invoke(StateMap::from([("start", 0)])).unwrap();
    assert_eq!(result.require_int("count").unwrap(), 1);
}

#[test]
fn doubler_then_messenger() {
    let graph = StateGraph::<StateMap>::new()
        .add_fn_node("doubler", |s: &StateMap| {
            Ok(StateMap::from([("doubled", s.require_int("number")? * 2)]))
        })
        .unwrap()
        .add_fn_node("messenger", |s: &StateMap| {
            let number = s.require_int("number")?;
            let doubled = s.require_int("doubled")?;
            Ok(StateMap::from([(
                "message",
                format!("The number {number} doubled is {doubled}"),
            )]))
        })
        .unwrap()
        .set_entry_point("doubler")
        .unwrap()
        .add_edge("doubler", "messenger")
        .unwrap()
        .add_edge("messenger", END)
        .unwrap()
        .compile()
        .unwrap();

    let (result, trace) = graph
        .invoke_with_trace(StateMap::from([("number", 5)]))
        .unwrap();
    assert_eq!(trace.visited(), ["doubler", "messenger"]);
    assert_eq!(
        result.require_str("message").unwrap(),
        "The number 5 doubled is 10"
    );
    assert_eq!(result.get("doubled"), Some(&Value::Int(10)));
}

fn tagging_node(
    tag: &'static str,
    calls: Arc<AtomicUsize>,
) -> impl Fn(&StateMap) -> Result<StateMap, NodeError> + Send + Sync + 'static {
    move |_s: &StateMap| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(StateMap::from([("handled_by", tag)]))
    }
}

#[test]
fn parity_checker_routes_odd_values() {
    let even_calls = Arc::new(AtomicUsize::new(0));
    let odd_calls = Arc::new(AtomicUsize::new(0));

    let graph = StateGraph::<StateMap>::new()
        .add_fn_node("checker", |s: &StateMap| {
            let value = s.require_int("value")?;
            Ok(StateMap::from([("is_even", value % 2 == 0)]))
        })
        .unwrap()
        .add_fn_node("evenHandler", tagging_node("even", even_calls.clone()))
        .unwrap()
        .add_fn_node("oddHandler", tagging_node("odd", odd_calls.clone()))
        .unwrap()
        .set_entry_point("checker")
        .unwrap()
        .add_conditional_edges(
            "checker",
            |s: &StateMap| {
                if s.require_bool("is_even").unwrap_or(false) {
                    "even".to_string()
                } else {
                    "odd".to_string()
                }
            },
            [("even", "evenHandler"), ("odd", "oddHandler")],
        )
        .unwrap()
        .add_edge("evenHandler", END)
        .unwrap()
        .add_edge("oddHandler", END)
        .unwrap()
        .compile()
        .unwrap();

    let (result, trace) = graph
        .invoke_with_trace(StateMap::from([("value", 7)]))
        .unwrap();
    assert_eq!(trace.visited(), ["checker", "oddHandler"]);
    assert_eq!(result.require_str("handled_by").unwrap(), "odd");
    assert_eq!(odd_calls.load(Ordering::SeqCst), 1);
    assert_eq!(even_calls.load(Ordering::SeqCst), 0);

    let result = graph.invoke(StateMap::from([("value", 4)])).unwrap();
    assert_eq!(result.require_str("handled_by").unwrap(), "even");
    assert_eq!(even_calls.load(Ordering::SeqCst), 1);
}
