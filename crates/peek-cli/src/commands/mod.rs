//! Command implementations for the `peek` CLI

pub mod eval;
pub mod extract;
pub mod resolve;
pub mod scan;

pub use eval::eval_command;
pub use extract::extract_command;
pub use resolve::resolve_command;
pub use scan::scan_command;

use clap::ValueEnum;
use peek_core::{evaluate, Locals, Primitive};

use crate::{CliError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PrimitiveArg {
    Po,
    Pv,
    Pe,
}

impl From<PrimitiveArg> for Primitive {
    fn from(arg: PrimitiveArg) -> Self {
        match arg {
            PrimitiveArg::Po => Primitive::Po,
            PrimitiveArg::Pv => Primitive::Pv,
            PrimitiveArg::Pe => Primitive::Pe,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Build a locals snapshot from `name=EXPR` bindings. Each value is evaluated against the
/// bindings before it, so `--local i=1 --local j=i+1` works.
pub fn parse_locals(bindings: &[String]) -> Result<Locals> {
    let mut locals = Locals::new();
    for binding in bindings {
        let (name, expr) = binding.split_once('=').ok_or_else(|| {
            CliError::InvalidInput(format!("expected name=EXPR, got '{}'", binding))
        })?;
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(CliError::InvalidInput(format!(
                "invalid local name '{}'",
                name
            )));
        }
        let value = evaluate(expr.trim(), &locals).map_err(|err| {
            CliError::InvalidInput(format!("local '{}': {}", name, err))
        })?;
        locals.insert(name, value);
    }
    Ok(locals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use peek_core::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn locals_see_earlier_bindings() {
        let locals = parse_locals(&[
            "i=1".to_string(),
            "j = i + 1".to_string(),
            "lst=[10, 20, 30]".to_string(),
        ])
        .unwrap();
        assert_eq!(locals.get("j"), Some(&Value::int(2)));
        assert_eq!(locals.len(), 3);
    }

    #[test]
    fn malformed_bindings_are_rejected() {
        assert!(parse_locals(&["i".to_string()]).is_err());
        assert!(parse_locals(&["a b=1".to_string()]).is_err());
        assert!(parse_locals(&["x=undefined".to_string()]).is_err());
    }
}
