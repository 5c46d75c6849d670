//! Command-line argument parsing for querydesk.

use clap::{Parser, Subcommand};
use querydesk::engine::EngineKind;
use std::path::PathBuf;

/// Run SQL through an asynchronous query engine and serve it to an agent.
#[derive(Parser, Debug)]
#[command(name = "querydesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Query engine to use (overrides config): local, http or mock
    #[arg(long, global = true, value_name = "ENGINE")]
    pub engine: Option<EngineKind>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit a query, wait for it to finish and print the result
    Query {
        /// SQL text to execute
        #[arg(value_name = "SQL")]
        sql: String,

        /// Print the result as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Delay between status checks, in milliseconds
        #[arg(long, value_name = "MS")]
        poll_interval_ms: Option<u64>,

        /// Maximum time to wait for completion, in seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,

        /// SQL script to run against the local engine first
        #[arg(long, value_name = "PATH")]
        seed: Option<PathBuf>,
    },

    /// Handle one action-invocation envelope and print the response
    Invoke {
        /// Path to the event JSON (use "-" for stdin)
        #[arg(long, value_name = "PATH", default_value = "-")]
        event: String,

        /// SQL script to run against the local engine first
        #[arg(long, value_name = "PATH")]
        seed: Option<PathBuf>,
    },

    /// Ask questions interactively through the agent
    Chat {
        /// Agent endpoint (overrides config; offline agent when unset)
        #[arg(long, value_name = "URL")]
        agent_url: Option<String>,

        /// SQL script to run against the local engine first
        #[arg(long, value_name = "PATH")]
        seed: Option<PathBuf>,
    },

    /// Print example prompts
    Examples,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(querydesk::config::Config::default_path)
    }

    /// Returns true if logs should go to a file rather than stderr.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, Command::Chat { .. })
    }

    /// Returns the seed script path for the selected command, if any.
    pub fn seed(&self) -> Option<&PathBuf> {
        match &self.command {
            Command::Query { seed, .. } | Command::Invoke { seed, .. } | Command::Chat { seed, .. } => {
                seed.as_ref()
            }
            Command::Examples => None,
        }
    }
}
