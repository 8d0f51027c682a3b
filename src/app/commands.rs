//! Command runners.
//!
//! `run_*` functions build the real LLM and warehouse clients from
//! configuration; `answer_*` functions take a ready [`Session`] and are what
//! the runners delegate to.

use std::{
    io::{BufRead, Write},
    sync::Arc
};

use tracing::info;

use super::{
    helpers::{build_backend, build_warehouse, exit_code_for, spinner},
    types::CommandOutput
};
use crate::{
    cache::SchemaCache,
    catalog::SchemaCatalog,
    config::Config,
    error::{AppResult, file_read_error, output_write_error},
    generator::{GenerationRequest, QueryGenerator},
    output::{OutputOptions, format_prompts, format_query_result},
    session::Session
};

/// Start a session from configuration.
///
/// # Errors
///
/// Invalid configuration, or a schema that cannot be fetched.
pub async fn start_session(config: &Config) -> AppResult<Session> {
    let settings = config.validate()?;
    let backend = build_backend(config)?;
    let warehouse = build_warehouse(config)?;
    let cache = Arc::new(SchemaCache::new(config.agent.schema_cache_ttl()));
    let pb = spinner("Loading warehouse schema...");
    let session = Session::start(&settings, backend, warehouse, cache).await;
    pb.finish_and_clear();
    Ok(session?)
}

/// Run the `ask` command.
///
/// With `dry_run` the schema is still fetched, but the prompts are printed
/// instead of being sent to the model.
pub async fn run_ask(
    config: &Config,
    question: &str,
    opts: &OutputOptions,
    dry_run: bool
) -> AppResult<CommandOutput> {
    if dry_run {
        let settings = config.validate()?;
        let catalog = SchemaCatalog::new(
            build_warehouse(config)?,
            settings.dataset.clone(),
            Arc::new(SchemaCache::new(config.agent.schema_cache_ttl()))
        );
        let schema_text = catalog.schema_text().await?;
        let generator =
            QueryGenerator::new(build_backend(config)?, settings.dataset, settings.temperature);
        let request = generator.completion_request(&GenerationRequest::new(question, schema_text));
        return Ok(CommandOutput::success(format_prompts(&request, opts)));
    }
    let session = start_session(config).await?;
    Ok(answer_question(&session, question, opts).await)
}

/// Answer one question and render the outcome
pub async fn answer_question(session: &Session, question: &str, opts: &OutputOptions) -> CommandOutput {
    let pb = spinner("Generating and running SQL...");
    let result = session.ask(question).await;
    pb.finish_and_clear();
    CommandOutput {
        exit_code: exit_code_for(&result),
        output:    format_query_result(&result, opts)
    }
}

/// Run the `chat` command over `input`, writing answers to `out`
pub async fn run_chat<R, W>(config: &Config, input: R, out: &mut W, opts: &OutputOptions) -> AppResult<i32>
where
    R: BufRead,
    W: Write
{
    let session = start_session(config).await?;
    answer_lines(&session, input, out, opts).await
}

/// Answer each non-empty line of `input` as an independent question.
///
/// `exit` or `quit` ends the loop early. Returns 1 when any question failed.
pub async fn answer_lines<R, W>(
    session: &Session,
    input: R,
    out: &mut W,
    opts: &OutputOptions
) -> AppResult<i32>
where
    R: BufRead,
    W: Write
{
    let mut exit_code = 0;
    for line in input.lines() {
        let line = line.map_err(|e| file_read_error("stdin", e))?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        info!(question, "Answering question");
        let answer = answer_question(session, question, opts).await;
        exit_code = exit_code.max(answer.exit_code);
        writeln!(out, "{}", answer.output).map_err(output_write_error)?;
        out.flush().map_err(output_write_error)?;
    }
    Ok(exit_code)
}

/// Run the `schema` command: the schema text exactly as the model sees it
pub async fn run_schema(config: &Config) -> AppResult<CommandOutput> {
    let dataset = config.validate_warehouse()?;
    let catalog = SchemaCatalog::new(
        build_warehouse(config)?,
        dataset,
        Arc::new(SchemaCache::new(config.agent.schema_cache_ttl()))
    );
    Ok(CommandOutput::success(catalog.schema_text().await?))
}
