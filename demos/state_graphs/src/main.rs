mod config;
mod graphs;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stategraph::core::{GraphError, StateMap};
use stategraph::graph::{CompiledGraph, ExecutionConfig, State};

use crate::config::{Cli, DrawFormat, Example};
use crate::graphs::{CounterState, GreetingState, NumberState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if cli.show_config {
        println!("{}", cli.effective());
        return Ok(());
    }

    let config = cli.execution_config();
    match cli.graph {
        Example::Greeting => {
            let graph = graphs::greeting()?;
            let result = run(graph, GreetingState::new(&cli.name), config, cli.draw).await?;
            println!("{}", result.message.unwrap_or_default());
        }
        Example::Counter => {
            let graph = graphs::counter()?;
            let initial = CounterState {
                start: cli.number,
                count: None,
            };
            let result = run(graph, initial, config, cli.draw).await?;
            println!("Count: {}", result.count.unwrap_or(result.start));
        }
        Example::TwoStep => {
            let graph = graphs::two_step()?;
            let result = run(graph, NumberState::new(cli.number), config, cli.draw).await?;
            println!("{}", result.message.unwrap_or_default());
        }
        Example::Parity => {
            let graph = graphs::parity()?;
            let initial = StateMap::from([("value", cli.number)]);
            let result = run(graph, initial, config, cli.draw).await?;
            println!("{}", serde_json::Value::from(result));
        }
    }
    Ok(())
}

/// Optionally render `graph`, then invoke it on the blocking pool.
async fn run<S>(
    graph: CompiledGraph<S>,
    initial: S,
    config: ExecutionConfig,
    draw: Option<DrawFormat>,
) -> anyhow::Result<S>
where
    S: State,
{
    match draw {
        Some(DrawFormat::Mermaid) => println!("{}\n", graph.draw_mermaid()),
        Some(DrawFormat::Ascii) => println!("{graph}\n"),
        Some(DrawFormat::Dot) => println!("{}\n", graph.draw_dot()),
        None => {}
    }

    let graph = Arc::new(graph);
    let entry = graph.entry_point().to_string();
    let (state, trace) = tokio::task::spawn_blocking(move || -> Result<_, GraphError> {
        let execution = graph.execute_with_config(initial, config)?;
        execution.run()
    })
    .await
    .context("graph run panicked")?
    .with_context(|| format!("graph starting at '{entry}' failed"))?;

    info!(run_id = trace.run_id(), path = %trace, "graph finished");
    Ok(state)
}
