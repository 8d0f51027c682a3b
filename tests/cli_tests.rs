// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use clap::Parser;
use sql_query_agent::{
    app::{convert_format, create_output_options},
    cli::{Cli, Commands, Format, Provider},
    llm::ProviderKind,
    output::OutputFormat
};

#[test]
fn test_provider_names_match_factory() {
    for provider in [
        Provider::Gemini,
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::Ollama
    ] {
        assert!(ProviderKind::parse(provider.as_str()).is_ok());
    }
}

#[test]
fn test_convert_format() {
    assert!(matches!(convert_format(Format::Text), OutputFormat::Text));
    assert!(matches!(convert_format(Format::Json), OutputFormat::Json));
    assert!(matches!(convert_format(Format::Yaml), OutputFormat::Yaml));
}

#[test]
fn test_parse_ask() {
    let cli = Cli::try_parse_from([
        "sql-query-agent",
        "ask",
        "How many orders?",
        "--provider",
        "openai",
        "-m",
        "gpt-4o",
        "--max-regenerations",
        "3",
        "-f",
        "json",
        "--dry-run"
    ])
    .unwrap();

    match cli.command {
        Commands::Ask {
            question,
            llm,
            output,
            dry_run
        } => {
            assert_eq!(question, "How many orders?");
            assert_eq!(llm.provider, Some(Provider::OpenAI));
            assert_eq!(llm.model.as_deref(), Some("gpt-4o"));
            assert_eq!(llm.max_regenerations, Some(3));
            assert_eq!(output.output_format, Format::Json);
            assert!(dry_run);
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["sql-query-agent", "chat", "--no-color", "-v", "-c", "agent.toml"])
        .unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.config.unwrap().to_str(), Some("agent.toml"));
    match cli.command {
        Commands::Chat {
            output, ..
        } => {
            let opts = create_output_options(&output, cli.verbose);
            assert!(!opts.colored);
            assert!(opts.verbose);
        }
        other => panic!("unexpected command {:?}", other)
    }
}

#[test]
fn test_parse_schema() {
    let cli = Cli::try_parse_from(["sql-query-agent", "schema"]).unwrap();
    assert!(matches!(cli.command, Commands::Schema));
}

#[test]
fn test_ask_requires_question() {
    assert!(Cli::try_parse_from(["sql-query-agent", "ask"]).is_err());
}

#[test]
fn test_rejects_unknown_provider() {
    assert!(Cli::try_parse_from(["sql-query-agent", "ask", "q", "-p", "watson"]).is_err());
}
