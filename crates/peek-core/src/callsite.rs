use std::path::Path;

use crate::context::{DiagnosticContext, Frame};

const UNKNOWN: &str = "unknown";

/// Where a primitive was called from. Built per call and dropped after the line is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub filename: Option<String>,
    pub line_number: Option<u32>,
    pub source_text: String,
}

impl CallSite {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.filename.is_some() && self.line_number.is_some()
    }

    /// The `{line}@{file}` prefix of every diagnostic line.
    pub fn location(&self, full_paths: bool) -> String {
        match (&self.filename, self.line_number) {
            (Some(filename), Some(line)) if full_paths => format!("{}@{}", line, filename),
            (Some(filename), Some(line)) => format!("{}@{}", line, short_name(filename)),
            _ => format!("{}@{}", UNKNOWN, UNKNOWN),
        }
    }
}

fn short_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename)
}

/// Resolve the frame `depth` levels above the primitive. Missing frames or frames without
/// file/line metadata produce [`CallSite::unknown`].
pub fn locate(ctx: &dyn DiagnosticContext, depth: usize) -> CallSite {
    match ctx.frame(depth) {
        Some(Frame {
            filename: Some(filename),
            line: Some(line),
            source,
        }) => CallSite {
            filename: Some(filename),
            line_number: Some(line),
            source_text: source.unwrap_or_default(),
        },
        _ => CallSite::unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FrameStack, CALLER};
    use pretty_assertions::assert_eq;

    #[test]
    fn locate_reads_the_requested_depth() {
        let stack = FrameStack::caller(Frame::new("crates/app/src/main.rs", 12).with_source("po!(x)"))
            .push(Frame::new("crates/app/src/lib.rs", 40));
        let site = locate(&stack, CALLER);
        assert_eq!(site.location(false), "12@main.rs");
        assert_eq!(site.location(true), "12@crates/app/src/main.rs");
        assert_eq!(site.source_text, "po!(x)");
        assert_eq!(locate(&stack, 2).location(false), "40@lib.rs");
    }

    #[test]
    fn exhausted_stack_is_unknown() {
        let stack = FrameStack::caller(Frame::new("main.rs", 1));
        assert_eq!(locate(&stack, 3), CallSite::unknown());
        assert_eq!(locate(&stack, 3).location(false), "unknown@unknown");
    }

    #[test]
    fn frame_without_line_is_unknown() {
        let frame = Frame {
            filename: Some("main.rs".to_string()),
            line: None,
            source: Some("pv!(x)".to_string()),
        };
        let site = locate(&FrameStack::caller(frame), CALLER);
        assert!(!site.is_known());
        assert_eq!(site.source_text, "");
    }
}
