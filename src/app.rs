//! Application logic for the SQL Query Agent CLI.
//!
//! Everything between parsed arguments and printed output lives here, apart
//! from the entry point, so commands can be driven from tests with in-memory
//! backends.

mod commands;
mod convert;
mod helpers;
mod types;

pub use commands::{answer_lines, answer_question, run_ask, run_chat, run_schema, start_session};
pub use convert::{convert_format, create_output_options};
pub use helpers::{apply_llm_overrides, build_backend, build_warehouse, exit_code_for};
pub use types::CommandOutput;
