use std::{io, process};

use clap::Parser;
use dotenv::dotenv;
use sql_query_agent::{
    app::{apply_llm_overrides, create_output_options, run_ask, run_chat, run_schema},
    cli::{Cli, Commands},
    config::Config,
    error::AppResult
};
use tokio::main;
use tracing_subscriber::EnvFilter;

#[main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,sql_query_agent=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> AppResult<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?
    };

    match cli.command {
        Commands::Ask {
            question,
            llm,
            output,
            dry_run
        } => {
            apply_llm_overrides(&mut config, &llm);
            let opts = create_output_options(&output, cli.verbose);
            let result = run_ask(&config, &question, &opts, dry_run).await?;
            println!("{}", result.output);
            Ok(result.exit_code)
        }
        Commands::Chat {
            llm,
            output
        } => {
            apply_llm_overrides(&mut config, &llm);
            let opts = create_output_options(&output, cli.verbose);
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            run_chat(&config, stdin.lock(), &mut stdout, &opts).await
        }
        Commands::Schema => {
            let result = run_schema(&config).await?;
            println!("{}", result.output);
            Ok(result.exit_code)
        }
    }
}
