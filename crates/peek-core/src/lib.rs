//! Call-site aware debug printing.
//!
//! ```ignore
//! use peek_core::{pe, po, pv};
//!
//! let (i, lst) = (1, vec![10, 20, 30]);
//! pv!(lst[i]); // 4@main.rs lst[1] = 20
//! pe!(1 + 2 * 3); // 5@main.rs 1 + 2 * 3 = 7
//! po!(1, "a", None::<i32>); // 6@main.rs 1, a, None
//! ```
extern crate self as peek_core;

pub mod callsite;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod extract;
pub mod inspector;
pub mod resolve;
pub mod scan;
pub mod sink;
pub mod source;
pub mod value;

pub use callsite::{locate, CallSite};
pub use config::{PeekConfig, SinkKind};
pub use context::{DiagnosticContext, Frame, FrameStack, Locals, MacroSite, CALLER};
pub use error::{ConversionError, Error, EvalError, Result};
pub use eval::evaluate;
pub use extract::{extract, Primitive};
pub use inspector::{inspector, Inspector};
pub use peek_macro::{pe, po, pv};
pub use resolve::{resolve_index, resolve_indices, BracketStyle, Resolution};
pub use sink::{capture_output, Sink};
pub use source::source_cache;
pub use value::{format_value, Debugged, Inspect, Inspected, Shown, Style, Value};

#[doc(hidden)]
pub mod __private {
    pub use crate::capture::{DebugProbe, InspectProbe, OpaqueProbe, Probe};
}
