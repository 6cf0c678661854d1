//! The `po` / `pv` / `pe` primitives.
//!
//! Each call renders one line and hands it to the sink. Nothing here returns an error: a missing
//! frame, unreadable source, unresolvable index or failing conversion only degrades the line.

use itertools::Itertools;
use once_cell::sync::Lazy;

use crate::callsite::{locate, CallSite};
use crate::config::PeekConfig;
use crate::context::{DiagnosticContext, CALLER};
use crate::extract::{find_invocation, Primitive};
use crate::resolve::resolve_indices;
use crate::sink::Sink;
use crate::value::{format_value, Inspected, Style};

/// Label used by `pe` when the call's text cannot be recovered.
pub const FALLBACK_EXPRESSION: &str = "expression";

#[derive(Debug, Clone)]
pub struct Inspector {
    config: PeekConfig,
    sink: Sink,
}

impl Inspector {
    pub fn new(config: PeekConfig) -> Self {
        let sink = Sink::from_kind(config.sink);
        Self { config, sink }
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &PeekConfig {
        &self.config
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// `{line}@{file} {v1}, {v2}, ...`
    pub fn render_po(&self, ctx: &dyn DiagnosticContext, values: &[Inspected]) -> String {
        let site = locate(ctx, CALLER);
        let joined = values
            .iter()
            .map(|value| format_value(value, Style::Plain))
            .join(", ");
        format!("{} {}", self.location(&site), joined)
    }

    /// `{line}@{file} {name} = {value}`, with index sub-expressions of `name` resolved.
    pub fn render_pv(&self, ctx: &dyn DiagnosticContext, value: &Inspected) -> String {
        let site = locate(ctx, CALLER);
        let name = argument_text(ctx, &site, Primitive::Pv).unwrap_or_default();
        let display_name = if name.is_empty() || !self.config.resolve_indices {
            name
        } else {
            resolve_indices(&name, &ctx.current_locals()).display_name
        };
        format!(
            "{} {} = {}",
            self.location(&site),
            display_name,
            format_value(value, Style::Literal)
        )
    }

    /// `{line}@{file} {expr} = {value}`
    pub fn render_pe(&self, ctx: &dyn DiagnosticContext, value: &Inspected) -> String {
        let site = locate(ctx, CALLER);
        let expression = argument_text(ctx, &site, Primitive::Pe)
            .unwrap_or_else(|| FALLBACK_EXPRESSION.to_string());
        format!(
            "{} {} = {}",
            self.location(&site),
            expression,
            format_value(value, Style::Literal)
        )
    }

    pub fn po(&self, ctx: &dyn DiagnosticContext, values: &[Inspected], end: &str) {
        if self.enabled() {
            self.emit(self.render_po(ctx, values), end);
        }
    }

    pub fn pv(&self, ctx: &dyn DiagnosticContext, value: &Inspected, end: &str) {
        if self.enabled() {
            self.emit(self.render_pv(ctx, value), end);
        }
    }

    pub fn pe(&self, ctx: &dyn DiagnosticContext, value: &Inspected, end: &str) {
        if self.enabled() {
            self.emit(self.render_pe(ctx, value), end);
        }
    }

    fn location(&self, site: &CallSite) -> String {
        site.location(self.config.full_paths)
    }

    fn emit(&self, mut line: String, end: &str) {
        line.push_str(end);
        self.sink.write_line(&line);
    }
}

/// Argument text of the call, preferring the caller's source over the macro label.
///
/// The source text is used only when it spells the same tokens as the label, which singles out
/// the right call on a line holding several and skips stale or unrelated source.
pub fn argument_text(
    ctx: &dyn DiagnosticContext,
    site: &CallSite,
    primitive: Primitive,
) -> Option<String> {
    let label = ctx.label().map(str::trim).filter(|label| !label.is_empty());
    let extracted = find_invocation(&site.source_text, primitive, |argument| match label {
        Some(label) => same_tokens(argument, label),
        None => true,
    })
    .map(|invocation| invocation.argument(primitive).to_string())
    .filter(|argument| !argument.is_empty());
    extracted.or_else(|| label.map(str::to_string))
}

fn same_tokens(a: &str, b: &str) -> bool {
    let significant = |c: &char| !c.is_whitespace();
    a.chars().filter(significant).eq(b.chars().filter(significant))
}

static GLOBAL_INSPECTOR: Lazy<Inspector> =
    Lazy::new(|| Inspector::new(PeekConfig::global().clone()));

/// The inspector behind the `po!`, `pv!` and `pe!` macros.
pub fn inspector() -> &'static Inspector {
    &GLOBAL_INSPECTOR
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Frame, FrameStack, Locals};
    use crate::error::ConversionError;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn inspector() -> Inspector {
        Inspector::new(PeekConfig::default()).with_sink(Sink::buffer())
    }

    fn at(line: u32, source: &str) -> FrameStack {
        FrameStack::caller(Frame::new("src/demo.rs", line).with_source(source))
    }

    #[test]
    fn pv_resolves_indices_from_locals() {
        let ctx = at(4, "pv(lst[i])").with_locals(
            Locals::new()
                .with("i", Value::int(1))
                .with("lst", Value::list([10, 20, 30].map(Value::int))),
        );
        assert_eq!(
            inspector().render_pv(&ctx, &Ok(Value::int(20))),
            "4@demo.rs lst[1] = 20"
        );
    }

    #[test]
    fn pv_resolves_chained_and_tuple_indices() {
        let locals = Locals::new().with("i", Value::int(0)).with("j", Value::int(1));
        let chained = at(5, "pv(m[i][j])").with_locals(locals.clone());
        let tuple = at(6, "pv(m[i,j])").with_locals(locals);
        assert_eq!(
            inspector().render_pv(&chained, &Ok(Value::int(2))),
            "5@demo.rs m[0][1] = 2"
        );
        assert_eq!(
            inspector().render_pv(&tuple, &Ok(Value::int(2))),
            "6@demo.rs m[0,1] = 2"
        );
    }

    #[test]
    fn pv_without_call_text_leaves_the_name_empty() {
        let ctx = at(9, "let x = compute();");
        assert_eq!(
            inspector().render_pv(&ctx, &Ok(Value::str("s"))),
            "9@demo.rs  = 's'"
        );
    }

    #[test]
    fn pe_uses_the_literal_expression() {
        let ctx = at(2, "pe(1 + 2 * 3)");
        assert_eq!(
            inspector().render_pe(&ctx, &Ok(Value::int(7))),
            "2@demo.rs 1 + 2 * 3 = 7"
        );
        assert_eq!(
            inspector().render_pe(&at(3, ""), &Ok(Value::Bool(true))),
            "3@demo.rs expression = true"
        );
    }

    #[test]
    fn label_selects_among_calls_on_one_line() {
        let ctx = at(8, "pe!(a + 1); pe!(b * 2);").with_label("b*2");
        assert_eq!(
            inspector().render_pe(&ctx, &Ok(Value::int(4))),
            "8@demo.rs b * 2 = 4"
        );
        let stale = at(8, "other()").with_label("b * 2");
        assert_eq!(
            inspector().render_pe(&stale, &Ok(Value::int(4))),
            "8@demo.rs b * 2 = 4"
        );
    }

    #[test]
    fn unknown_location() {
        let ctx = FrameStack::new();
        assert_eq!(
            inspector().render_pv(&ctx, &Ok(Value::int(5))),
            "unknown@unknown  = 5"
        );
        assert_eq!(
            inspector().render_pe(&ctx, &Ok(Value::int(5))),
            "unknown@unknown expression = 5"
        );
    }

    #[test]
    fn po_joins_values_and_isolates_conversion_errors() {
        let ctx = at(1, "po(1, 'a', None, bad)");
        let values = [
            Ok(Value::int(1)),
            Ok(Value::str("a")),
            Ok(Value::None),
            Err(ConversionError::new("boom")),
        ];
        assert_eq!(
            inspector().render_po(&ctx, &values),
            "1@demo.rs 1, a, None, [Conversion Error]: boom"
        );
    }

    #[test]
    fn emitted_lines_end_with_the_terminator() {
        let inspector = inspector();
        let ctx = at(7, "pv(x)");
        inspector.pv(&ctx, &Ok(Value::int(1)), "\n");
        inspector.po(&ctx, &[Ok(Value::int(2))], " | ");
        assert_eq!(inspector.sink().contents(), "7@demo.rs x = 1\n7@demo.rs 2 | ");
    }

    #[test]
    fn disabled_inspector_is_silent() {
        let config = PeekConfig {
            enabled: false,
            ..PeekConfig::default()
        };
        let inspector = Inspector::new(config).with_sink(Sink::buffer());
        inspector.pe(&at(1, "pe(1)"), &Ok(Value::int(1)), "\n");
        assert_eq!(inspector.sink().contents(), "");
    }

    #[test]
    fn full_paths_keep_the_directory() {
        let config = PeekConfig {
            full_paths: true,
            ..PeekConfig::default()
        };
        let inspector = Inspector::new(config);
        assert_eq!(
            inspector.render_po(&at(3, ""), &[Ok(Value::Unit)]),
            "3@src/demo.rs ()"
        );
    }
}
