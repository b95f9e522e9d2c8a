//! Consumption helpers: drive an iterator to a conclusion.
//!
//! [`iterate`] runs an action over every produced value until
//! exhaustion or until the action asks to stop. [`collect`] gathers
//! values into a vector with an optional cap; when the cap is hit the
//! source is not invoked again, so a capped collect over an infinite
//! source performs exactly `max_count` invocations and terminates.

use std::ops::ControlFlow;

use coil_core::{CoilResult, Iterate, Step, Value};

// ============================================================================
// Loop Driver
// ============================================================================

/// Invokes `it` repeatedly, handing each produced value to `action`,
/// until exhaustion or until `action` breaks.
pub fn iterate<I, F>(it: &mut I, mut action: F) -> CoilResult<()>
where
    I: Iterate + ?Sized,
    F: FnMut(Value) -> ControlFlow<()>,
{
    loop {
        match it.invoke()? {
            Step::Produced(value) => {
                if action(value).is_break() {
                    return Ok(());
                }
            }
            Step::Exhausted => return Ok(()),
        }
    }
}

// ============================================================================
// Bounded Collection
// ============================================================================

/// Collects produced values into a vector.
///
/// With `max_count` of `None` this runs to exhaustion. With
/// `Some(n)` it stops as soon as `n` values are held and performs no
/// further invocations; `Some(0)` never invokes the source at all.
pub fn collect<I>(it: &mut I, max_count: Option<usize>) -> CoilResult<Vec<Value>>
where
    I: Iterate + ?Sized,
{
    let mut out = match max_count {
        Some(0) => return Ok(Vec::new()),
        Some(n) => Vec::with_capacity(n),
        None => Vec::new(),
    };
    loop {
        match it.invoke()? {
            Step::Produced(value) => {
                out.push(value);
                if Some(out.len()) == max_count {
                    return Ok(out);
                }
            }
            Step::Exhausted => return Ok(out),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coil_core::{from_fn, iter_values};
    use std::cell::Cell;
    use std::rc::Rc;

    fn nums(n: i64) -> impl Iterate {
        iter_values((0..n).map(Value::Int))
    }

    #[test]
    fn test_iterate_visits_everything_in_order() {
        let mut seen = Vec::new();
        iterate(&mut nums(4), |v| {
            seen.push(v);
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_iterate_break_stops_early() {
        let mut seen = Vec::new();
        iterate(&mut nums(100), |v| {
            seen.push(v);
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_collect_unbounded_runs_to_exhaustion() {
        let out = collect(&mut nums(3), None).unwrap();
        assert_eq!(out, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_collect_cap_larger_than_source() {
        let out = collect(&mut nums(2), Some(10)).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_capped_collect_counts_invocations_exactly() {
        // An infinite counter that records every invocation.
        let calls = Rc::new(Cell::new(0u32));
        let calls_inner = Rc::clone(&calls);
        let mut endless = from_fn(move || {
            calls_inner.set(calls_inner.get() + 1);
            Ok(Step::Produced(Value::Int(calls_inner.get() as i64)))
        });
        let out = collect(&mut endless, Some(3)).unwrap();
        assert_eq!(
            out,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        // The cap stops collection without a probing extra invocation.
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_collect_zero_cap_never_invokes() {
        let calls = Rc::new(Cell::new(0u32));
        let calls_inner = Rc::clone(&calls);
        let mut endless = from_fn(move || {
            calls_inner.set(calls_inner.get() + 1);
            Ok(Step::Produced(Value::Unit))
        });
        let out = collect(&mut endless, Some(0)).unwrap();
        assert!(out.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_error_propagates_from_both_helpers() {
        use coil_core::CoilError;
        let mut broken = from_fn(|| Err(CoilError::runtime("invoke failed")));
        assert!(iterate(&mut broken, |_| ControlFlow::Continue(())).is_err());
        let mut broken = from_fn(|| Err(CoilError::runtime("invoke failed")));
        assert!(collect(&mut broken, Some(5)).is_err());
    }
}
