//! `peek extract`: the argument text a primitive would report for a source line.

use std::path::PathBuf;

use clap::Args;
use peek_core::source::SourceFile;
use peek_core::{extract, PeekConfig, Primitive};
use tracing::warn;

use super::PrimitiveArg;
use crate::{CliError, Result};

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Source file to read
    pub file: PathBuf,

    /// 1-based line the call starts on
    #[arg(short, long)]
    pub line: usize,

    /// Primitive whose call is extracted
    #[arg(short, long, value_enum, default_value = "pv")]
    pub primitive: PrimitiveArg,
}

pub fn extract_command(args: ExtractArgs, config: &PeekConfig) -> Result<()> {
    let source = std::fs::read_to_string(&args.file)?;
    let file = SourceFile::new(args.file.clone(), &source);
    let text = file
        .call_text(args.line, config.max_call_lines)
        .ok_or_else(|| {
            CliError::InvalidInput(format!(
                "{} has {} lines, no line {}",
                args.file.display(),
                file.line_count(),
                args.line
            ))
        })?;
    let primitive = Primitive::from(args.primitive);
    let extracted = extract(&text, primitive);
    if extracted.is_empty() {
        warn!("no {}! call on line {}", primitive, args.line);
    }
    println!("{}", extracted);
    Ok(())
}
