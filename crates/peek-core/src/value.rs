use std::any::Any;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::{self, Debug, Display, Formatter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use itertools::Itertools;
use serde::Serialize;

use crate::error::ConversionError;

/// Dynamic view of a value handed to a diagnostic primitive.
///
/// Only the shapes the formatter and the index evaluator care about are modelled; anything
/// else arrives pre-rendered as [`Value::Text`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    None,
    Unit,
    Bool(bool),
    Int(i128),
    Float(f64),
    Char(char),
    Str(String),
    Bytes(Bytes),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Text(String),
}

/// How the top level of a value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Literal form: strings quoted, bytes prefixed with `b`.
    Literal,
    /// Textual form: top-level strings and chars unquoted. Nested elements stay literal.
    Plain,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn int(i: impl Into<i128>) -> Self {
        Value::Int(i.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Text(_) => "opaque",
        }
    }

    pub fn render(&self, style: Style) -> String {
        let mut out = String::new();
        self.write_to(&mut out, style);
        out
    }

    fn write_to(&self, out: &mut String, style: Style) {
        match self {
            Value::None => out.push_str("None"),
            Value::Unit => out.push_str("()"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&format!("{:?}", f)),
            Value::Char(c) => match style {
                Style::Plain => out.push(*c),
                Style::Literal => quote_str(&c.to_string(), out),
            },
            Value::Str(s) => match style {
                Style::Plain => out.push_str(s),
                Style::Literal => quote_str(s, out),
            },
            Value::Bytes(b) => quote_bytes(b, out),
            Value::List(items) => {
                out.push('[');
                write_items(items, out);
                out.push(']');
            }
            Value::Tuple(items) => {
                out.push('(');
                write_items(items, out);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Map(entries) => {
                out.push('{');
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    key.write_to(out, Style::Literal);
                    out.push_str(": ");
                    value.write_to(out, Style::Literal);
                }
                out.push('}');
            }
            Value::Set(items) if items.is_empty() => out.push_str("set()"),
            Value::Set(items) => {
                out.push('{');
                write_items(items, out);
                out.push('}');
            }
            Value::Text(text) => out.push_str(text),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Style::Literal))
    }
}

fn write_items(items: &[Value], out: &mut String) {
    let joined = items
        .iter()
        .map(|item| item.render(Style::Literal))
        .join(", ");
    out.push_str(&joined);
}

fn quote_str(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() && (c as u32) < 0x100 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn quote_bytes(bytes: &[u8], out: &mut String) {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    out.push('b');
    out.push(quote as char);
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", byte);
            }
        }
    }
    out.push(quote as char);
}

/// Result of converting a value for display.
pub type Inspected = std::result::Result<Value, ConversionError>;

/// Conversion of a Rust value into its dynamic [`Value`] view.
///
/// `Option` and `Result` have an inherent `inspect` method that shadows this one, so call it
/// fully qualified on them: `Inspect::inspect(&Some(3))`.
pub trait Inspect {
    fn inspect(&self) -> Inspected;
}

/// Render a converted value, substituting the conversion-error marker on failure.
pub fn format_value(value: &Inspected, style: Style) -> String {
    match value {
        Ok(value) => value.render(style),
        Err(err) => format!("[Conversion Error]: {}", err),
    }
}

/// Run a formatting closure, turning formatter errors and panics into [`ConversionError`].
pub fn render_guarded(
    f: impl FnOnce(&mut String) -> fmt::Result,
) -> std::result::Result<String, ConversionError> {
    let mut out = String::new();
    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut out))) {
        Ok(Ok(())) => Ok(out),
        Ok(Err(err)) => Err(err.into()),
        Err(payload) => Err(ConversionError::new(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic while formatting value".to_string()
    }
}

/// Displays a value through its [`Display`] impl, shown verbatim.
pub struct Shown<'a, T: ?Sized>(pub &'a T);

impl<T: Display + ?Sized> Inspect for Shown<'_, T> {
    fn inspect(&self) -> Inspected {
        render_guarded(|out| write!(out, "{}", self.0)).map(Value::Text)
    }
}

/// Displays a value through its [`Debug`] impl, shown verbatim.
pub struct Debugged<'a, T: ?Sized>(pub &'a T);

impl<T: Debug + ?Sized> Inspect for Debugged<'_, T> {
    fn inspect(&self) -> Inspected {
        render_guarded(|out| write!(out, "{:?}", self.0)).map(Value::Text)
    }
}

macro_rules! inspect_int {
    ($($ty:ty),*) => {
        $(
            impl Inspect for $ty {
                fn inspect(&self) -> Inspected {
                    Ok(Value::Int(*self as i128))
                }
            }
        )*
    };
}

inspect_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl Inspect for u128 {
    fn inspect(&self) -> Inspected {
        Ok(i128::try_from(*self)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(self.to_string())))
    }
}

impl Inspect for f64 {
    fn inspect(&self) -> Inspected {
        Ok(Value::Float(*self))
    }
}

impl Inspect for f32 {
    fn inspect(&self) -> Inspected {
        // go through the shortest decimal form so 0.1f32 shows as 0.1
        let widened = self.to_string().parse::<f64>().unwrap_or(*self as f64);
        Ok(Value::Float(widened))
    }
}

impl Inspect for bool {
    fn inspect(&self) -> Inspected {
        Ok(Value::Bool(*self))
    }
}

impl Inspect for char {
    fn inspect(&self) -> Inspected {
        Ok(Value::Char(*self))
    }
}

impl Inspect for str {
    fn inspect(&self) -> Inspected {
        Ok(Value::Str(self.to_string()))
    }
}

impl Inspect for String {
    fn inspect(&self) -> Inspected {
        Ok(Value::Str(self.clone()))
    }
}

impl Inspect for Cow<'_, str> {
    fn inspect(&self) -> Inspected {
        Ok(Value::Str(self.to_string()))
    }
}

impl Inspect for () {
    fn inspect(&self) -> Inspected {
        Ok(Value::Unit)
    }
}

impl Inspect for Value {
    fn inspect(&self) -> Inspected {
        Ok(self.clone())
    }
}

impl Inspect for Bytes {
    fn inspect(&self) -> Inspected {
        Ok(Value::Bytes(self.clone()))
    }
}

impl Inspect for BytesMut {
    fn inspect(&self) -> Inspected {
        Ok(Value::Bytes(Bytes::copy_from_slice(self)))
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn inspect(&self) -> Inspected {
        match self {
            None => Ok(Value::None),
            Some(inner) => {
                let inner = inner.inspect()?;
                Ok(Value::Text(format!("Some({})", inner.render(Style::Literal))))
            }
        }
    }
}

macro_rules! inspect_pointer {
    ($($ptr:ty),*) => {
        $(
            impl<T: Inspect + ?Sized> Inspect for $ptr {
                fn inspect(&self) -> Inspected {
                    (**self).inspect()
                }
            }
        )*
    };
}

inspect_pointer!(&T, &mut T, Box<T>, Rc<T>, Arc<T>);

macro_rules! inspect_tuple {
    ($(($($name:ident . $idx:tt),+)),*) => {
        $(
            impl<$($name: Inspect),+> Inspect for ($($name,)+) {
                fn inspect(&self) -> Inspected {
                    Ok(Value::Tuple(vec![$(self.$idx.inspect()?),+]))
                }
            }
        )*
    };
}

inspect_tuple!(
    (A.0),
    (A.0, B.1),
    (A.0, B.1, C.2),
    (A.0, B.1, C.2, D.3),
    (A.0, B.1, C.2, D.3, E.4),
    (A.0, B.1, C.2, D.3, E.4, F.5)
);

fn inspect_seq<'a, T: Inspect + 'a>(
    items: impl IntoIterator<Item = &'a T>,
) -> std::result::Result<Vec<Value>, ConversionError> {
    items.into_iter().map(Inspect::inspect).collect()
}

impl<T: Inspect> Inspect for [T] {
    fn inspect(&self) -> Inspected {
        Ok(Value::List(inspect_seq(self)?))
    }
}

impl<T: Inspect, const N: usize> Inspect for [T; N] {
    fn inspect(&self) -> Inspected {
        self.as_slice().inspect()
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn inspect(&self) -> Inspected {
        self.as_slice().inspect()
    }
}

impl<T: Inspect> Inspect for VecDeque<T> {
    fn inspect(&self) -> Inspected {
        Ok(Value::List(inspect_seq(self)?))
    }
}

impl<T: Inspect, S> Inspect for HashSet<T, S> {
    fn inspect(&self) -> Inspected {
        Ok(Value::Set(inspect_seq(self)?))
    }
}

impl<T: Inspect> Inspect for BTreeSet<T> {
    fn inspect(&self) -> Inspected {
        Ok(Value::Set(inspect_seq(self)?))
    }
}

fn inspect_entries<'a, K: Inspect + 'a, V: Inspect + 'a>(
    entries: impl IntoIterator<Item = (&'a K, &'a V)>,
) -> Inspected {
    let entries = entries
        .into_iter()
        .map(|(key, value)| Ok((key.inspect()?, value.inspect()?)))
        .collect::<std::result::Result<Vec<_>, ConversionError>>()?;
    Ok(Value::Map(entries))
}

impl<K: Inspect, V: Inspect, S> Inspect for HashMap<K, V, S> {
    fn inspect(&self) -> Inspected {
        inspect_entries(self)
    }
}

impl<K: Inspect, V: Inspect> Inspect for BTreeMap<K, V> {
    fn inspect(&self) -> Inspected {
        inspect_entries(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Exploding;

    impl Display for Exploding {
        fn fmt(&self, _f: &mut Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    struct Panicking;

    impl Debug for Panicking {
        fn fmt(&self, _f: &mut Formatter<'_>) -> fmt::Result {
            panic!("cannot show this")
        }
    }

    #[test]
    fn literal_style_quotes_strings_and_bytes() {
        assert_eq!(Value::str("a").render(Style::Literal), "'a'");
        assert_eq!(Value::str("it's").render(Style::Literal), "\"it's\"");
        assert_eq!(Value::str("a\nb").render(Style::Literal), "'a\\nb'");
        let bytes = Bytes::from_static(b"ab\x00");
        assert_eq!(Value::Bytes(bytes).render(Style::Literal), "b'ab\\x00'");
    }

    #[test]
    fn plain_style_only_unquotes_the_top_level() {
        assert_eq!(Value::str("a").render(Style::Plain), "a");
        let nested = Value::list([Value::str("a"), Value::None, Value::Bool(true)]);
        assert_eq!(nested.render(Style::Plain), "['a', None, true]");
    }

    #[test]
    fn collections_render_like_literals() {
        assert_eq!(Value::tuple([Value::int(1)]).render(Style::Literal), "(1,)");
        assert_eq!(Value::Set(vec![]).render(Style::Literal), "set()");
        let map = Value::Map(vec![(Value::str("k"), Value::Float(1.0))]);
        assert_eq!(map.render(Style::Literal), "{'k': 1.0}");
    }

    #[test]
    fn rust_values_convert_through_inspect() {
        let nested = vec![vec![1, 2], vec![3, 4]];
        assert_eq!(nested.inspect().unwrap().to_string(), "[[1, 2], [3, 4]]");
        assert_eq!((1u8, "x").inspect().unwrap().to_string(), "(1, 'x')");
        assert_eq!(Inspect::inspect(&None::<i32>).unwrap().to_string(), "None");
        assert_eq!(Inspect::inspect(&Some(3)).unwrap().to_string(), "Some(3)");
        assert_eq!(0.1f32.inspect().unwrap().to_string(), "0.1");
    }

    #[test]
    fn failing_display_becomes_conversion_error() {
        let shown = Shown(&Exploding).inspect();
        assert_eq!(
            format_value(&shown, Style::Plain),
            "[Conversion Error]: formatter returned an error"
        );
    }

    #[test]
    fn panicking_debug_becomes_conversion_error() {
        let shown = Debugged(&Panicking).inspect();
        assert_eq!(
            format_value(&shown, Style::Literal),
            "[Conversion Error]: cannot show this"
        );
    }
}
