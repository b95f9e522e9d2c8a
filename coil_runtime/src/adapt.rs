//! Iterator adapters expressed as generator bodies.
//!
//! An adapter is nothing special: it is a generator whose body walks a
//! source handle and yields transformed values. Because the walk runs
//! through the ordinary iteration protocol, source exhaustion
//! propagates to the adapter on its own; no extra bookkeeping exists
//! here.
//!
//! [`map`] covers the dominant shape, a one-argument transform applied
//! to every element. [`map_with`] threads extra bound values through to
//! the transform for closures expressed as plain functions.

use coil_core::{CoilResult, IterHandle, NativeFn, Value};
use coil_compiler::{Body, Expr, Stmt};

use crate::factory::generator;
use crate::generator::Generator;

// ============================================================================
// Mapping Adapters
// ============================================================================

/// Builds a generator that yields `transform(x)` for every `x` the
/// source produces, in order, and exhausts when the source does.
pub fn map(source: IterHandle, transform: NativeFn) -> CoilResult<Generator> {
    map_with(source, transform, Vec::new())
}

/// Like [`map`], with `extra` appended to every transform call after
/// the element itself.
pub fn map_with(
    source: IterHandle,
    transform: NativeFn,
    extra: Vec<Value>,
) -> CoilResult<Generator> {
    let mut args = vec![Expr::local("x")];
    args.extend(extra.into_iter().map(Expr::Const));
    let body = Body::new("map").param("src").stmt(Stmt::for_each(
        "x",
        Expr::local("src"),
        vec![Stmt::yield_value(Expr::call_native(transform, args))],
    ));
    generator(&body)?.call(&[Value::Iter(source)])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coil_core::{iter_values, CoilError, Iterate, Step};

    fn upper() -> NativeFn {
        NativeFn::new(|args| {
            let s = args[0].as_str().unwrap_or_default().to_uppercase();
            Ok(Value::str(s))
        })
    }

    fn source(items: &[&str]) -> IterHandle {
        IterHandle::new(iter_values(items.iter().map(|s| Value::str(s))))
    }

    #[test]
    fn test_map_transforms_in_order() {
        let mut adapted = map(source(&["a", "b", "c"]), upper()).unwrap();
        assert_eq!(adapted.invoke().unwrap(), Step::Produced(Value::str("A")));
        assert_eq!(adapted.invoke().unwrap(), Step::Produced(Value::str("B")));
        assert_eq!(adapted.invoke().unwrap(), Step::Produced(Value::str("C")));
        assert_eq!(adapted.invoke().unwrap(), Step::Exhausted);
    }

    #[test]
    fn test_map_exhaustion_is_sticky() {
        let mut adapted = map(source(&[]), upper()).unwrap();
        assert_eq!(adapted.invoke().unwrap(), Step::Exhausted);
        assert_eq!(adapted.invoke().unwrap(), Step::Exhausted);
    }

    #[test]
    fn test_map_with_bound_values() {
        let append = NativeFn::new(|args| {
            let s = args[0].as_str().unwrap_or_default();
            let suffix = args[1].as_str().unwrap_or_default();
            Ok(Value::str(format!("{s}{suffix}")))
        });
        let mut adapted =
            map_with(source(&["x", "y"]), append, vec![Value::str("!")]).unwrap();
        assert_eq!(adapted.invoke().unwrap(), Step::Produced(Value::str("x!")));
        assert_eq!(adapted.invoke().unwrap(), Step::Produced(Value::str("y!")));
        assert_eq!(adapted.invoke().unwrap(), Step::Exhausted);
    }

    #[test]
    fn test_map_over_generator_source() {
        let body = Body::new("nums")
            .stmt(Stmt::yield_value(Expr::constant(3i64)))
            .stmt(Stmt::yield_value(Expr::constant(4i64)));
        let square = NativeFn::new(|args| {
            let n = args[0].expect_int("map input")?;
            Ok(Value::Int(n * n))
        });
        let handle = crate::factory::gen(&body).unwrap().into_handle();
        let mut adapted = map(handle, square).unwrap();
        assert_eq!(adapted.invoke().unwrap(), Step::Produced(Value::Int(9)));
        assert_eq!(adapted.invoke().unwrap(), Step::Produced(Value::Int(16)));
        assert_eq!(adapted.invoke().unwrap(), Step::Exhausted);
    }

    #[test]
    fn test_transform_error_exhausts_adapter() {
        let strict = NativeFn::new(|args| {
            args[0]
                .as_int()
                .map(Value::Int)
                .ok_or_else(|| CoilError::type_error("expected int"))
        });
        let mut adapted = map(source(&["oops"]), strict).unwrap();
        assert!(adapted.invoke().is_err());
        assert_eq!(adapted.invoke().unwrap(), Step::Exhausted);
    }
}
