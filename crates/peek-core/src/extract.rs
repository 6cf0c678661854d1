use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::scan::{is_ident_byte, matching_close, split_top_level, CodeBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Po,
    Pv,
    Pe,
}

impl Primitive {
    pub const ALL: [Primitive; 3] = [Primitive::Po, Primitive::Pv, Primitive::Pe];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Po => "po",
            Primitive::Pv => "pv",
            Primitive::Pe => "pe",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Primitive {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_end_matches('!');
        Primitive::ALL
            .into_iter()
            .find(|primitive| primitive.name() == name)
            .ok_or_else(|| Error::Config(format!("unknown primitive '{}'", s)))
    }
}

/// One balanced `name(...)` or `name!(...)` occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// Byte offset of the primitive name.
    pub start: usize,
    /// Byte offset of the closing parenthesis.
    pub close: usize,
    /// Everything between the outer parentheses.
    pub args: &'a str,
}

impl<'a> Invocation<'a> {
    /// The argument text as the given primitive reports it.
    pub fn argument(&self, primitive: Primitive) -> &'a str {
        match primitive {
            // keep the positional argument, drop `end = ...`
            Primitive::Pv => split_top_level(self.args, b',')
                .first()
                .map_or("", |first| first.trim()),
            Primitive::Po | Primitive::Pe => self.args.trim(),
        }
    }
}

/// Balanced invocations of `name` in `text`, left to right. Occurrences inside string literals
/// and comments, and ones whose parentheses never close, are skipped.
pub fn invocations<'a>(text: &'a str, name: &'a str) -> impl Iterator<Item = Invocation<'a>> + 'a {
    let bytes = text.as_bytes();
    let mut code = CodeBytes::new(text, 0);
    std::iter::from_fn(move || {
        while let Some((idx, _)) = code.next() {
            if !bytes[idx..].starts_with(name.as_bytes()) {
                continue;
            }
            if idx > 0 && is_ident_byte(bytes[idx - 1]) {
                continue;
            }
            let Some(open) = open_paren_after(bytes, idx + name.len()) else {
                continue;
            };
            let Some(close) = matching_close(text, open) else {
                continue;
            };
            code.seek(close + 1);
            return Some(Invocation {
                start: idx,
                close,
                args: &text[open + 1..close],
            });
        }
        None
    })
}

/// Offset of the `(` that directly follows a primitive name, allowing `!` and blanks in between.
fn open_paren_after(bytes: &[u8], mut cursor: usize) -> Option<usize> {
    if bytes.get(cursor) == Some(&b'!') {
        cursor += 1;
    }
    while bytes.get(cursor).is_some_and(|b| *b == b' ' || *b == b'\t') {
        cursor += 1;
    }
    (bytes.get(cursor) == Some(&b'(')).then_some(cursor)
}

/// First invocation of `primitive` whose argument satisfies `accept`.
pub fn find_invocation<'a>(
    text: &'a str,
    primitive: Primitive,
    mut accept: impl FnMut(&str) -> bool,
) -> Option<Invocation<'a>> {
    invocations(text, primitive.name()).find(|invocation| accept(invocation.argument(primitive)))
}

/// The argument text of the first `primitive` call in `source_text`, or `""` when there is none.
pub fn extract(source_text: &str, primitive: Primitive) -> String {
    find_invocation(source_text, primitive, |_| true)
        .map(|invocation| invocation.argument(primitive).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_macro_and_function_calls() {
        assert_eq!(extract("    pv!(lst[i]);", Primitive::Pv), "lst[i]");
        assert_eq!(extract("pv(lst[i])", Primitive::Pv), "lst[i]");
        assert_eq!(extract("peek::pe! (1 + 2 * 3);", Primitive::Pe), "1 + 2 * 3");
    }

    #[test]
    fn nested_parentheses_use_the_outermost_close() {
        assert_eq!(
            extract("pe!(f(a, g(b)) + h(c)); other(d)", Primitive::Pe),
            "f(a, g(b)) + h(c)"
        );
    }

    #[test]
    fn pv_drops_the_terminator_argument() {
        assert_eq!(extract("pv!(m[i, j], end = \"\")", Primitive::Pv), "m[i, j]");
        assert_eq!(extract("pv(x, end='')", Primitive::Pv), "x");
        assert_eq!(
            extract("po!(a, b, end = \" \")", Primitive::Po),
            "a, b, end = \" \""
        );
    }

    #[test]
    fn other_names_and_literals_do_not_match() {
        assert_eq!(extract("dpv!(x); // pv!(y)", Primitive::Pv), "");
        assert_eq!(extract("println!(\"pv!(x)\")", Primitive::Pv), "");
        assert_eq!(extract("pe!(x", Primitive::Pe), "");
        assert_eq!(extract("", Primitive::Po), "");
    }

    #[test]
    fn find_invocation_skips_rejected_calls() {
        let text = "pv!(a); pv!(b[0]);";
        let found = find_invocation(text, Primitive::Pv, |arg| arg.starts_with('b')).unwrap();
        assert_eq!(found.args, "b[0]");
        assert_eq!(&text[found.start..=found.close], "pv!(b[0])");
        assert_eq!(invocations(text, "pv").count(), 2);
    }

    #[test]
    fn primitive_names_parse() {
        assert_eq!("pv!".parse::<Primitive>().unwrap(), Primitive::Pv);
        assert!("px".parse::<Primitive>().is_err());
    }
}
