//! Application types for CLI commands.

/// What a command printed and how the process should exit.
///
/// # Example
///
/// ```
/// use sql_query_agent::app::CommandOutput;
///
/// let out = CommandOutput::success("done");
/// assert_eq!(out.exit_code, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code: 0 on success, 1 on a failed request
    pub exit_code: i32,
    /// Rendered output for stdout
    pub output:    String
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output:    output.into()
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            output:    output.into()
        }
    }
}
