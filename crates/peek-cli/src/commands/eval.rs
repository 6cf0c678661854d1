//! `peek eval`: run the whitelisted index evaluator.

use clap::Args;
use peek_core::{evaluate, Style};
use tracing::info;

use super::parse_locals;
use crate::Result;

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Expression to evaluate, e.g. `lst[i + 1]`
    pub expr: String,

    /// Local binding `name=EXPR`; may be repeated
    #[arg(short = 'L', long = "local", value_name = "NAME=EXPR")]
    pub locals: Vec<String>,
}

pub fn eval_command(args: EvalArgs) -> Result<()> {
    let locals = parse_locals(&args.locals)?;
    info!("evaluating '{}' with {} locals", args.expr, locals.len());
    let value = evaluate(&args.expr, &locals)?;
    println!("{}", value.render(Style::Literal));
    Ok(())
}
