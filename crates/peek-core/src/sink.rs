use std::cell::RefCell;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::config::SinkKind;

thread_local! {
    static CAPTURE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Destination of diagnostic lines. Every line goes out in a single write.
#[derive(Debug, Clone)]
pub enum Sink {
    Stdout,
    Stderr,
    Buffer(Arc<Mutex<String>>),
}

impl Sink {
    pub fn from_kind(kind: SinkKind) -> Self {
        match kind {
            SinkKind::Stdout => Sink::Stdout,
            SinkKind::Stderr => Sink::Stderr,
        }
    }

    pub fn buffer() -> Self {
        Sink::Buffer(Arc::default())
    }

    /// Text written so far to a buffer sink; empty for the standard streams.
    pub fn contents(&self) -> String {
        match self {
            Sink::Buffer(buffer) => buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            Sink::Stdout | Sink::Stderr => String::new(),
        }
    }

    /// Write `text` as is. A capture active on this thread takes precedence over the sink.
    pub fn write_line(&self, text: &str) {
        let captured = CAPTURE.with(|capture| match capture.borrow_mut().as_mut() {
            Some(buffer) => {
                buffer.push_str(text);
                true
            }
            None => false,
        });
        if captured {
            return;
        }
        let result = match self {
            Sink::Stdout => write_all(&mut io::stdout().lock(), text),
            Sink::Stderr => write_all(&mut io::stderr().lock(), text),
            Sink::Buffer(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_str(text);
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!("failed to write diagnostic line: {}", err);
        }
    }
}

fn write_all(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// Run `f`, collecting everything the primitives write on this thread instead of emitting it.
pub fn capture_output(f: impl FnOnce()) -> String {
    struct Restore(Option<String>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            CAPTURE.with(|capture| *capture.borrow_mut() = previous);
        }
    }

    let previous = CAPTURE.with(|capture| capture.borrow_mut().replace(String::new()));
    let restore = Restore(previous);
    f();
    let captured = CAPTURE.with(|capture| capture.borrow_mut().take());
    drop(restore);
    captured.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn buffer_sink_accumulates_lines() {
        let sink = Sink::buffer();
        sink.write_line("1@main.rs a\n");
        sink.write_line("2@main.rs b\n");
        assert_eq!(sink.contents(), "1@main.rs a\n2@main.rs b\n");
    }

    #[test]
    fn capture_intercepts_and_restores() {
        let sink = Sink::buffer();
        let outer = capture_output(|| {
            sink.write_line("outer\n");
            let inner = capture_output(|| sink.write_line("inner\n"));
            assert_eq!(inner, "inner\n");
            sink.write_line("again\n");
        });
        assert_eq!(outer, "outer\nagain\n");
        assert_eq!(sink.contents(), "");
        sink.write_line("direct\n");
        assert_eq!(sink.contents(), "direct\n");
    }
}
