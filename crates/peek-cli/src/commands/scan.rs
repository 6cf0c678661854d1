//! `peek scan`: list every `po!`/`pv!`/`pe!` call under the given paths.

use std::path::{Path, PathBuf};

use clap::Args;
use itertools::Itertools;
use peek_core::extract::invocations;
use peek_core::Primitive;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use super::PrimitiveArg;
use crate::{CliError, Result};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Files or directories to scan (`.rs` files only)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only report this primitive
    #[arg(short, long, value_enum)]
    pub primitive: Option<PrimitiveArg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteHit {
    pub line: usize,
    pub primitive: Primitive,
    pub text: String,
}

pub fn scan_command(args: ScanArgs) -> Result<()> {
    let primitives: Vec<Primitive> = match args.primitive {
        Some(primitive) => vec![primitive.into()],
        None => Primitive::ALL.to_vec(),
    };
    let mut total = 0;
    for file in rust_files(&args.paths)? {
        let source = std::fs::read_to_string(&file)?;
        for hit in scan_source(&source, &primitives) {
            println!(
                "{}@{} {}!({})",
                hit.line,
                file.display(),
                hit.primitive,
                hit.text
            );
            total += 1;
        }
    }
    info!("{} call sites", total);
    Ok(())
}

/// Macro-form calls in `source`, in source order.
pub fn scan_source(source: &str, primitives: &[Primitive]) -> Vec<CallSiteHit> {
    primitives
        .iter()
        .flat_map(|&primitive| {
            invocations(source, primitive.name())
                .filter(move |invocation| {
                    source[invocation.start + primitive.name().len()..].starts_with('!')
                })
                .map(move |invocation| (invocation.start, primitive, invocation.args))
        })
        .sorted_by_key(|(start, _, _)| *start)
        .map(|(start, primitive, args)| CallSiteHit {
            line: source[..start].matches('\n').count() + 1,
            primitive,
            text: args.lines().map(str::trim).filter(|l| !l.is_empty()).join(" "),
        })
        .collect()
}

fn rust_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(CliError::InvalidInput(format!(
                "{} does not exist",
                path.display()
            )));
        }
        for entry in WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry))
        {
            let entry = entry.map_err(|err| CliError::Io(err.into()))?;
            if entry.file_type().is_file() && is_rust_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    debug!("scanning {} files", files.len());
    Ok(files)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name.starts_with('.') || name == "target")
}

fn is_rust_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rs")
}
