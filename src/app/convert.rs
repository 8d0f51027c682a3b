//! Conversion from CLI-facing types to internal ones.

use crate::{
    cli::{Format, OutputArgs},
    output::{OutputFormat, OutputOptions}
};

/// Converts a CLI format enum to the internal output format type.
///
/// ```
/// use sql_query_agent::{app::convert_format, cli::Format, output::OutputFormat};
///
/// assert!(matches!(convert_format(Format::Yaml), OutputFormat::Yaml));
/// ```
pub fn convert_format(format: Format) -> OutputFormat {
    match format {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Yaml => OutputFormat::Yaml
    }
}

/// Output options for the given flags
pub fn create_output_options(args: &OutputArgs, verbose: bool) -> OutputOptions {
    OutputOptions {
        format: convert_format(args.output_format),
        colored: !args.no_color,
        verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_output_options_no_color() {
        let args = OutputArgs {
            output_format: Format::Json,
            no_color:      true
        };
        let opts = create_output_options(&args, true);
        assert!(matches!(opts.format, OutputFormat::Json));
        assert!(!opts.colored);
        assert!(opts.verbose);
    }
}
