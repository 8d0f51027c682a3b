use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// SQL Query Agent - Answer questions about a warehouse dataset with
/// LLM-generated SQL
#[derive(Parser, Debug)]
#[command(name = "sql-query-agent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a config file (overrides .sql-agent.toml lookup)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging and per-attempt output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// Question in natural language
        question: String,

        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Show the prompts that would be sent without calling the model
        #[arg(long)]
        dry_run: bool
    },
    /// Answer questions read from stdin, one per line
    Chat {
        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        output: OutputArgs
    },
    /// Print the dataset schema as the model sees it
    Schema
}

/// Model selection overrides
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// LLM provider to use
    #[arg(short, long, value_enum)]
    pub provider: Option<Provider>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Corrective regenerations after a failed table validation
    #[arg(long)]
    pub max_regenerations: Option<u32>
}

/// Result rendering options
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    pub output_format: Format,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    Gemini,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    Ollama
}

impl Provider {
    /// Name understood by the provider factory
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml
}
