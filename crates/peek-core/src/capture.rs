//! Value capture used by the macro expansions.
//!
//! `(&Probe(&x)).peek_value()` picks the most specific conversion by autoref: an [`Inspect`]
//! impl when there is one, otherwise the value's `Debug` output. `peek_local` snapshots only
//! [`Inspect`] values; anything else is left out of the locals.

use std::fmt::Debug;

use crate::value::{Debugged, Inspect, Inspected, Value};

pub struct Probe<'a, T: ?Sized>(pub &'a T);

pub trait InspectProbe {
    fn peek_value(&self) -> Inspected;
    fn peek_local(&self) -> Option<Value>;
}

impl<T: Inspect + ?Sized> InspectProbe for Probe<'_, T> {
    fn peek_value(&self) -> Inspected {
        self.0.inspect()
    }

    fn peek_local(&self) -> Option<Value> {
        self.0.inspect().ok()
    }
}

pub trait DebugProbe {
    fn peek_value(&self) -> Inspected;
}

impl<T: Debug + ?Sized> DebugProbe for &Probe<'_, T> {
    fn peek_value(&self) -> Inspected {
        Debugged(self.0).inspect()
    }
}

pub trait OpaqueProbe {
    fn peek_local(&self) -> Option<Value>;
}

impl<T: ?Sized> OpaqueProbe for &Probe<'_, T> {
    fn peek_local(&self) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Point {
        x: i32,
    }

    struct Hidden;

    #[test]
    fn inspect_wins_over_debug() {
        let name = "a";
        assert_eq!((&Probe(&name)).peek_value(), Ok(Value::str("a")));
        assert_eq!((&Probe(&3u8)).peek_local(), Some(Value::int(3)));
    }

    #[test]
    fn debug_is_the_fallback() {
        let point = Point { x: 1 };
        assert_eq!(
            (&Probe(&point)).peek_value(),
            Ok(Value::Text("Point { x: 1 }".to_string()))
        );
        assert_eq!(point.x, 1);
        assert_eq!((&Probe(&Hidden)).peek_local(), None);
    }
}
