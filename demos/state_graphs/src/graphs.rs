//! Graph definitions for the demo. Each graph is built inside a function and
//! handed back to the caller; nothing is kept in module-level state.

use stategraph::core::{GraphError, NodeError, StateMap};
use stategraph::graph::{CompiledGraph, State, StateGraph, END};

// ---------------------------------------------------------------------------
// Greeting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GreetingState {
    pub name: String,
    pub message: Option<String>,
}

impl GreetingState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct GreetingUpdate {
    pub message: Option<String>,
}

impl State for GreetingState {
    type Update = GreetingUpdate;

    fn merge(&mut self, update: GreetingUpdate) {
        if update.message.is_some() {
            self.message = update.message;
        }
    }
}

pub fn greeting() -> Result<CompiledGraph<GreetingState>, GraphError> {
    StateGraph::<GreetingState>::new()
        .add_fn_node("greeter", |s: &GreetingState| {
            Ok(GreetingUpdate {
                message: Some(format!("Hello, {}!", s.name)),
            })
        })?
        .set_entry_point("greeter")?
        .add_edge("greeter", END)?
        .compile()
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CounterState {
    pub start: i64,
    pub count: Option<i64>,
}

impl State for CounterState {
    type Update = Option<i64>;

    fn merge(&mut self, count: Option<i64>) {
        if count.is_some() {
            self.count = count;
        }
    }
}

pub fn counter() -> Result<CompiledGraph<CounterState>, GraphError> {
    StateGraph::<CounterState>::new()
        .add_fn_node("counter", |s: &CounterState| {
            let count = s.start.checked_add(1).ok_or("counter overflow")?;
            Ok(Some(count))
        })?
        .set_entry_point("counter")?
        .add_edge("counter", END)?
        .compile()
}

// ---------------------------------------------------------------------------
// Two-step number processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NumberState {
    pub number: i64,
    pub doubled: Option<i64>,
    pub message: Option<String>,
}

impl NumberState {
    pub fn new(number: i64) -> Self {
        Self {
            number,
            doubled: None,
            message: None,
        }
    }
}

#[derive(Debug)]
pub enum NumberUpdate {
    Doubled(i64),
    Message(String),
}

impl State for NumberState {
    type Update = NumberUpdate;

    fn merge(&mut self, update: NumberUpdate) {
        match update {
            NumberUpdate::Doubled(n) => self.doubled = Some(n),
            NumberUpdate::Message(m) => self.message = Some(m),
        }
    }
}

fn double_number(state: &NumberState) -> Result<NumberUpdate, NodeError> {
    let doubled = state.number.checked_mul(2).ok_or("doubling overflows")?;
    Ok(NumberUpdate::Doubled(doubled))
}

fn create_message(state: &NumberState) -> Result<NumberUpdate, NodeError> {
    let doubled = state.doubled.ok_or("'doubled' has not been computed")?;
    Ok(NumberUpdate::Message(format!(
        "The number {} doubled is {doubled}",
        state.number
    )))
}

pub fn two_step() -> Result<CompiledGraph<NumberState>, GraphError> {
    StateGraph::<NumberState>::new()
        .add_fn_node("doubler", double_number)?
        .add_fn_node("messenger", create_message)?
        .set_entry_point("doubler")?
        .add_edge("doubler", "messenger")?
        .add_edge("messenger", END)?
        .compile()
}

// ---------------------------------------------------------------------------
// Parity routing (dynamic state)
// ---------------------------------------------------------------------------

fn handler(
    tag: &'static str,
) -> impl Fn(&StateMap) -> Result<StateMap, NodeError> + Send + Sync + 'static {
    move |_s: &StateMap| Ok(StateMap::from([("handled_by", tag)]))
}

pub fn parity() -> Result<CompiledGraph<StateMap>, GraphError> {
    StateGraph::<StateMap>::new()
        .add_fn_node("checker", |s: &StateMap| {
            let value = s.require_int("value")?;
            Ok(StateMap::from([("is_even", value % 2 == 0)]))
        })?
        .add_fn_node("evenHandler", handler("even"))?
        .add_fn_node("oddHandler", handler("odd"))?
        .set_entry_point("checker")?
        .add_fallible_conditional_edges(
            "checker",
            |s: &StateMap| {
                let key = if s.require_bool("is_even")? { "even" } else { "odd" };
                Ok(key.to_string())
            },
            [("even", "evenHandler"), ("odd", "oddHandler")],
        )?
        .add_edge("evenHandler", END)?
        .add_edge("oddHandler", END)?
        .strict(true)
        .compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_graph() {
        let result = greeting().unwrap().invoke(GreetingState::new("Alice")).unwrap();
        assert_eq!(result.message.as_deref(), Some("Hello, Alice!"));
    }

    #[test]
    fn counter_graph() {
        let graph = counter().unwrap();
        let result = graph.invoke(CounterState { start: 5, count: None }).unwrap();
        assert_eq!(result.count, Some(6));

        let err = graph
            .invoke(CounterState {
                start: i64::MAX,
                count: None,
            })
            .unwrap_err();
        assert_eq!(err.node(), Some("counter"));
    }

    #[test]
    fn two_step_graph() {
        let result = two_step().unwrap().invoke(NumberState::new(5)).unwrap();
        assert_eq!(result.doubled, Some(10));
        assert_eq!(result.message.as_deref(), Some("The number 5 doubled is 10"));
    }

    #[test]
    fn parity_graph() {
        let graph = parity().unwrap();
        let (result, trace) = graph
            .invoke_with_trace(StateMap::from([("value", 7)]))
            .unwrap();
        assert_eq!(trace.visited(), ["checker", "oddHandler"]);
        assert_eq!(result.require_str("handled_by").unwrap(), "odd");
    }
}
