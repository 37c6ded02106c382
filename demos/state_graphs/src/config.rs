use std::fmt;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use stategraph::graph::{ExecutionConfig, DEFAULT_MAX_STEPS};

#[derive(Parser, Debug)]
#[command(
    name = "state-graphs",
    version,
    about = "Run one of the bundled example state graphs"
)]
pub struct Cli {
    /// Which graph to run
    #[arg(value_enum)]
    pub graph: Example,

    /// Name used by the greeting graph
    #[arg(long, env = "GREETING_NAME", default_value = "Alice")]
    pub name: String,

    /// Input number for the counter, two-step and parity graphs
    #[arg(short, long, default_value_t = 5, allow_negative_numbers = true)]
    pub number: i64,

    /// Maximum number of node executions per run
    #[arg(long, env = "STATEGRAPH_MAX_STEPS", default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,

    /// Wall-clock budget for a run, in milliseconds
    #[arg(long, env = "STATEGRAPH_DEADLINE_MS")]
    pub deadline_ms: Option<u64>,

    /// API key for downstream services; never printed in clear
    #[arg(long, env = "STATEGRAPH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Render the graph before running it
    #[arg(long, value_enum)]
    pub draw: Option<DrawFormat>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Example {
    Greeting,
    Counter,
    TwoStep,
    Parity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DrawFormat {
    Mermaid,
    Ascii,
    Dot,
}

impl Cli {
    pub fn execution_config(&self) -> ExecutionConfig {
        let config = ExecutionConfig::new().with_max_steps(self.max_steps);
        match self.deadline_ms {
            Some(ms) => config.with_deadline(Duration::from_millis(ms)),
            None => config,
        }
    }

    pub fn effective(&self) -> EffectiveConfig<'_> {
        EffectiveConfig(self)
    }
}

/// Replace every character of a secret with `*`.
pub fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

/// Display adapter that prints the effective configuration with secrets masked.
pub struct EffectiveConfig<'a>(&'a Cli);

impl fmt::Display for EffectiveConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cli = self.0;
        writeln!(f, "=== Configuration ===")?;
        writeln!(f, "graph:       {:?}", cli.graph)?;
        writeln!(f, "name:        {}", cli.name)?;
        writeln!(f, "number:      {}", cli.number)?;
        writeln!(f, "max_steps:   {}", cli.max_steps)?;
        match cli.deadline_ms {
            Some(ms) => writeln!(f, "deadline:    {ms}ms")?,
            None => writeln!(f, "deadline:    none")?,
        }
        match &cli.api_key {
            Some(key) => write!(f, "api_key:     {}", mask(key)),
            None => write!(f, "api_key:     (not set)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("state-graphs").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_graph_selection() {
        assert_eq!(parse(&["two-step"]).graph, Example::TwoStep);
        assert!(Cli::try_parse_from(["state-graphs", "bogus"]).is_err());
    }

    #[test]
    fn defaults() {
        let cli = parse(&["counter"]);
        assert_eq!(cli.number, 5);
        assert_eq!(cli.execution_config().deadline, None);
    }

    #[test]
    fn deadline_flag_sets_config() {
        let cli = parse(&["parity", "--deadline-ms", "250", "--max-steps", "3"]);
        let config = cli.execution_config();
        assert_eq!(config.max_steps, 3);
        assert_eq!(config.deadline, Some(Duration::from_millis(250)));
    }

    #[test]
    fn api_key_is_masked() {
        let cli = parse(&["greeting", "--api-key", "secret_123"]);
        let shown = cli.effective().to_string();
        assert!(shown.contains("api_key:     **********"), "got: {shown}");
        assert!(!shown.contains("secret_123"));
        assert_eq!(mask(""), "");
    }
}
