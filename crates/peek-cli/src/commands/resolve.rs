//! `peek resolve`: display name of an expression with its indices resolved.

use clap::Args;
use console::style;
use peek_core::resolve_indices;

use super::{parse_locals, OutputFormat};
use crate::{CliError, Result};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Expression text, e.g. `m[i][j]`
    pub expr: String,

    /// Local binding `name=EXPR`; may be repeated
    #[arg(short = 'L', long = "local", value_name = "NAME=EXPR")]
    pub locals: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

pub fn resolve_command(args: ResolveArgs) -> Result<()> {
    let locals = parse_locals(&args.locals)?;
    let resolution = resolve_indices(&args.expr, &locals);
    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&resolution)
                .map_err(|err| CliError::InvalidInput(err.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("{}", resolution.display_name);
            for index in &resolution.indices {
                println!(
                    "  {} {} {}",
                    style(&index.raw_text).dim(),
                    style("->").cyan(),
                    index.resolved_display
                );
            }
        }
    }
    Ok(())
}
