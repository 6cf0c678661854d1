//! Diagnostic contexts: the injected view of a caller's location, source text and locals.
//!
//! Rust has no runtime reflection over caller frames, so every primitive receives a
//! [`DiagnosticContext`]. The `po!`/`pv!`/`pe!` macros build a [`MacroSite`] from compiler-provided
//! call-site data; embedders that track their own frames (script hosts, tests) use [`FrameStack`].

use std::borrow::Cow;

use crate::source::source_cache;
use crate::value::Value;

/// Depth of the frame that invoked a primitive. Depth 0 is the primitive itself.
pub const CALLER: usize = 1;

/// Ordered snapshot of a caller's local bindings, name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locals {
    entries: Vec<(String, Value)>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing an earlier binding in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Locals {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut locals = Locals::new();
        for (name, value) in iter {
            locals.insert(name, value);
        }
        locals
    }
}

/// Metadata of one stack frame as far as the host can provide it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub filename: Option<String>,
    pub line: Option<u32>,
    pub source: Option<String>,
}

impl Frame {
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        Self {
            filename: Some(filename.into()),
            line: Some(line),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

pub trait DiagnosticContext {
    /// The frame `depth` levels above the primitive, if the host knows it.
    fn frame(&self, depth: usize) -> Option<Frame>;

    /// Local bindings of the calling frame.
    fn current_locals(&self) -> Cow<'_, Locals> {
        Cow::Owned(Locals::default())
    }

    /// Literal argument text captured at the call site, when a macro supplied it.
    fn label(&self) -> Option<&str> {
        None
    }

    fn caller_location(&self) -> Option<(String, u32)> {
        let frame = self.frame(CALLER)?;
        Some((frame.filename?, frame.line?))
    }

    fn current_source_line(&self) -> Option<String> {
        self.frame(CALLER)?.source
    }
}

/// Call-site data recorded by the `po!`/`pv!`/`pe!` expansions.
#[derive(Debug, Clone)]
pub struct MacroSite {
    file: &'static str,
    line: u32,
    manifest_dir: Option<&'static str>,
    label: &'static str,
    locals: Locals,
}

impl MacroSite {
    pub fn new(
        file: &'static str,
        line: u32,
        manifest_dir: Option<&'static str>,
        label: &'static str,
    ) -> Self {
        Self {
            file,
            line,
            manifest_dir,
            label,
            locals: Locals::default(),
        }
    }

    pub fn with_locals(mut self, locals: Locals) -> Self {
        self.locals = locals;
        self
    }
}

impl DiagnosticContext for MacroSite {
    fn frame(&self, depth: usize) -> Option<Frame> {
        if depth != CALLER {
            return None;
        }
        let source = source_cache().call_text(self.file, self.line as usize, self.manifest_dir);
        Some(Frame {
            filename: Some(self.file.to_string()),
            line: Some(self.line),
            source,
        })
    }

    fn current_locals(&self) -> Cow<'_, Locals> {
        Cow::Borrowed(&self.locals)
    }

    fn label(&self) -> Option<&str> {
        Some(self.label)
    }
}

/// Explicit frames, innermost first: index 0 is the primitive, index 1 its caller.
#[derive(Debug, Clone, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
    locals: Locals,
    label: Option<String>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack whose caller frame is `frame`; the primitive's own frame carries no metadata.
    pub fn caller(frame: Frame) -> Self {
        Self::new().push(Frame::default()).push(frame)
    }

    pub fn push(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn with_locals(mut self, locals: Locals) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl DiagnosticContext for FrameStack {
    fn frame(&self, depth: usize) -> Option<Frame> {
        self.frames.get(depth).cloned()
    }

    fn current_locals(&self) -> Cow<'_, Locals> {
        Cow::Borrowed(&self.locals)
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn locals_keep_insertion_order_and_replace_in_place() {
        let mut locals: Locals = [("i", Value::int(1)), ("lst", Value::List(vec![]))]
            .into_iter()
            .collect();
        locals.insert("i", Value::int(2));
        let names: Vec<_> = locals.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["i", "lst"]);
        assert_eq!(locals.get("i"), Some(&Value::int(2)));
        assert_eq!(locals.get("j"), None);
    }

    #[test]
    fn frame_stack_reports_caller_location() {
        let stack = FrameStack::caller(Frame::new("src/main.rs", 7).with_source("pv!(x)"));
        assert_eq!(
            stack.caller_location(),
            Some(("src/main.rs".to_string(), 7))
        );
        assert_eq!(stack.current_source_line().as_deref(), Some("pv!(x)"));
        assert_eq!(stack.frame(5), None);
    }

    #[test]
    fn empty_stack_has_no_caller() {
        assert_eq!(FrameStack::new().caller_location(), None);
    }
}
