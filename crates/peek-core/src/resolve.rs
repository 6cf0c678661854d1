//! Index resolution: `lst[i]` is displayed as `lst[1]` when `i` is bound to `1`.

use serde::Serialize;
use tracing::debug;

use crate::context::Locals;
use crate::eval::evaluate;
use crate::scan::{closer_for, matching_close, split_top_level, CodeBytes};
use crate::value::Style;

pub const EMPTY_INDEX: &str = "<EMPTY>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Wrapper {
    Paren,
    Bracket,
}

impl Wrapper {
    fn delimiters(self) -> (char, char) {
        match self {
            Wrapper::Paren => ('(', ')'),
            Wrapper::Bracket => ('[', ']'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum BracketStyle {
    /// No trailing subscript.
    None,
    /// `base[a]`
    Single,
    /// `base[a][b]...`
    Chained,
    /// `base[a, b]`, or `base[(a, b)]` / `base[[a, b]]` with the inner delimiters kept.
    Tuple {
        separator: &'static str,
        wrapper: Option<Wrapper>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedExpression {
    pub base_text: String,
    pub index_groups: Vec<String>,
    pub bracket_style: BracketStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIndex {
    pub raw_text: String,
    pub resolved_display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// `None` when the text was malformed and left untouched.
    pub expression: Option<ParsedExpression>,
    pub indices: Vec<ResolvedIndex>,
    pub display_name: String,
}

/// Split `text` into its base and trailing subscript groups.
///
/// Returns `None` for text with unbalanced or mismatched delimiters.
pub fn parse_expression(text: &str) -> Option<ParsedExpression> {
    let text = text.trim();
    let groups = top_level_subscripts(text)?;

    // keep only the run of groups that ends the text
    let mut run: Vec<(usize, usize)> = Vec::new();
    let mut end = text.len();
    for &(open, close) in groups.iter().rev() {
        if !text[close + 1..end].trim().is_empty() {
            break;
        }
        run.push((open, close));
        end = open;
    }
    run.reverse();

    // `[1, 2][i]`: a leading array literal is part of the base
    if !run.is_empty() && text[..run[0].0].trim().is_empty() {
        run.remove(0);
    }
    let Some(&(first_open, _)) = run.first() else {
        return Some(ParsedExpression {
            base_text: text.to_string(),
            index_groups: Vec::new(),
            bracket_style: BracketStyle::None,
        });
    };
    let base_text = text[..first_open].trim_end().to_string();
    let inners: Vec<&str> = run
        .iter()
        .map(|&(open, close)| &text[open + 1..close])
        .collect();

    if inners.len() >= 2 {
        return Some(ParsedExpression {
            base_text,
            index_groups: inners.into_iter().map(str::to_string).collect(),
            bracket_style: BracketStyle::Chained,
        });
    }
    let inner = inners[0];
    let (parts, wrapper) = if let Some(parts) = comma_parts(inner) {
        (parts, None)
    } else if let Some((wrapped, wrapper)) = unwrap_group(inner) {
        match comma_parts(wrapped) {
            Some(parts) => (parts, Some(wrapper)),
            None => (vec![inner], None),
        }
    } else {
        (vec![inner], None)
    };
    if parts.len() == 1 {
        return Some(ParsedExpression {
            base_text,
            index_groups: vec![inner.to_string()],
            bracket_style: BracketStyle::Single,
        });
    }

    let separator = if parts[1..].iter().any(|part| part.starts_with(' ')) {
        ", "
    } else {
        ","
    };
    let index_groups = parts
        .iter()
        .enumerate()
        .map(|(idx, part)| match separator {
            ", " if idx > 0 => part.strip_prefix(' ').unwrap_or(part).to_string(),
            _ => part.to_string(),
        })
        .collect();
    Some(ParsedExpression {
        base_text,
        index_groups,
        bracket_style: BracketStyle::Tuple { separator, wrapper },
    })
}

/// `[` groups at nesting depth zero, as `(open, close)` offsets.
fn top_level_subscripts(text: &str) -> Option<Vec<(usize, usize)>> {
    let mut stack = Vec::new();
    let mut groups = Vec::new();
    for (idx, byte) in CodeBytes::new(text, 0) {
        match byte {
            b'(' | b'[' | b'{' => stack.push((byte, idx)),
            b')' | b']' | b'}' => {
                let (open_byte, open) = stack.pop()?;
                if closer_for(open_byte) != Some(byte) {
                    return None;
                }
                if stack.is_empty() && byte == b']' {
                    groups.push((open, idx));
                }
            }
            _ => {}
        }
    }
    stack.is_empty().then_some(groups)
}

fn comma_parts(text: &str) -> Option<Vec<&str>> {
    let mut parts = split_top_level(text, b',');
    // trailing comma of a one-element tuple
    if parts.len() > 1 && parts.last().is_some_and(|last| last.trim().is_empty()) {
        parts.pop();
    }
    (parts.len() > 1).then_some(parts)
}

/// `(a, b)` or `[a, b]` spanning the whole text, returned without its delimiters.
fn unwrap_group(text: &str) -> Option<(&str, Wrapper)> {
    let trimmed = text.trim();
    let wrapper = match trimmed.as_bytes().first()? {
        b'(' => Wrapper::Paren,
        b'[' => Wrapper::Bracket,
        _ => return None,
    };
    let close = matching_close(trimmed, 0)?;
    (close == trimmed.len() - 1).then(|| (&trimmed[1..close], wrapper))
}

/// Display form of one index sub-expression.
///
/// Never fails: text that cannot be evaluated against `locals` is returned unchanged.
pub fn resolve_index(raw: &str, locals: &Locals) -> String {
    if raw.is_empty() {
        return EMPTY_INDEX.to_string();
    }
    if raw.trim().is_empty() {
        return format!("<SPACE:{}>", raw.chars().count());
    }
    match evaluate(raw.trim(), locals) {
        Ok(value) => value.render(Style::Literal),
        Err(err) => {
            debug!("index '{}' left unresolved: {}", raw, err);
            raw.to_string()
        }
    }
}

/// Rebuild the expression text with the given index displays.
pub fn display_name(parsed: &ParsedExpression, displays: &[String]) -> String {
    let mut name = parsed.base_text.clone();
    match &parsed.bracket_style {
        BracketStyle::None => {}
        BracketStyle::Single | BracketStyle::Chained => {
            for display in displays {
                name.push('[');
                name.push_str(display);
                name.push(']');
            }
        }
        BracketStyle::Tuple { separator, wrapper } => {
            let joined = displays.join(*separator);
            name.push('[');
            match wrapper.map(Wrapper::delimiters) {
                Some((open, close)) => {
                    name.push(open);
                    name.push_str(&joined);
                    name.push(close);
                }
                None => name.push_str(&joined),
            }
            name.push(']');
        }
    }
    name
}

pub fn resolve_indices(expression_text: &str, locals: &Locals) -> Resolution {
    let Some(parsed) = parse_expression(expression_text) else {
        debug!("malformed expression '{}', not resolving", expression_text);
        return Resolution {
            expression: None,
            indices: Vec::new(),
            display_name: expression_text.to_string(),
        };
    };
    let indices: Vec<ResolvedIndex> = parsed
        .index_groups
        .iter()
        .map(|raw| ResolvedIndex {
            raw_text: raw.clone(),
            resolved_display: resolve_index(raw, locals),
        })
        .collect();
    let displays: Vec<String> = indices
        .iter()
        .map(|index| index.resolved_display.clone())
        .collect();
    Resolution {
        display_name: display_name(&parsed, &displays),
        expression: Some(parsed),
        indices,
    }
}
