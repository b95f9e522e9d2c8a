//! The step function: pure forward execution of a compiled program.
//!
//! [`step`] runs ordinary instructions immediately, starting from the
//! supplied entry pc, until it either reaches a suspension point
//! (returning [`Outcome::Produced`] with the value and the
//! suspension-point id to resume from) or completes
//! ([`Outcome::Completed`]). It never returns control before one of
//! those two outcomes and never blocks.
//!
//! Errors raised during forward execution propagate to the caller; the
//! policy for what happens to the machine afterwards belongs to the
//! iterator runtime, not here.

use std::sync::Arc;

use coil_core::{CoilError, CoilResult, IterHandle, NativeFn, Step, Value};
use coil_compiler::{BinOp, Expr, Instr, Program, UnaryOp};

use crate::frame::{Cursor, Frame};
use crate::generator::Generator;

// ============================================================================
// Outcome
// ============================================================================

/// Result of one forward run of the step function.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A suspension point was reached.
    Produced {
        /// The produced value.
        value: Value,
        /// Suspension-point id to resume from.
        resume: u32,
    },
    /// Control reached the end of the body or an explicit terminal
    /// statement. The value is only present for procedures.
    Completed { value: Option<Value> },
}

// ============================================================================
// Step Function
// ============================================================================

/// Executes `program` forward from `entry` until suspension or
/// completion.
pub fn step(program: &Program, frame: &mut Frame, entry: u32) -> CoilResult<Outcome> {
    let mut pc = entry;
    loop {
        let Some(instr) = program.instr(pc) else {
            // The compiler always appends a terminator; running past the
            // end still completes cleanly.
            return Ok(Outcome::Completed { value: None });
        };
        match instr {
            Instr::Store { slot, expr } => {
                let value = eval(program, frame, expr)?;
                frame.store(*slot, value);
                pc += 1;
            }
            Instr::Effect { expr } => {
                eval(program, frame, expr)?;
                pc += 1;
            }
            Instr::Yield { expr, resume } => {
                let value = eval(program, frame, expr)?;
                return Ok(Outcome::Produced {
                    value,
                    resume: *resume,
                });
            }
            Instr::Jump { target } => pc = *target,
            Instr::JumpIfFalse { cond, target } => {
                pc = if eval(program, frame, cond)?.is_truthy() {
                    pc + 1
                } else {
                    *target
                };
            }
            Instr::IterInit { cursor, source } => {
                let source = eval(program, frame, source)?;
                frame.set_cursor(*cursor, Cursor::from_value(source)?);
                pc += 1;
            }
            Instr::IterNext { cursor, slot, done } => {
                match frame.cursor_mut(*cursor)?.advance()? {
                    Step::Produced(value) => {
                        frame.store(*slot, value);
                        pc += 1;
                    }
                    Step::Exhausted => pc = *done,
                }
            }
            Instr::Define { slot, program: sub } => {
                frame.store(*slot, Value::Func(procedure_fn(Arc::clone(sub))));
                pc += 1;
            }
            Instr::Return { value } => {
                let value = match value {
                    Some(expr) => Some(eval(program, frame, expr)?),
                    None => None,
                };
                return Ok(Outcome::Completed { value });
            }
        }
    }
}

/// Runs an ordinary procedure to completion and returns its value.
pub fn run_procedure(program: &Program, args: &[Value]) -> CoilResult<Value> {
    if args.len() != program.arity() {
        return Err(CoilError::Arity {
            expected: program.arity(),
            got: args.len(),
        });
    }
    let mut frame = Frame::new(program);
    for (i, arg) in args.iter().enumerate() {
        frame.store(coil_compiler::SlotId(i as u32), arg.clone());
    }
    match step(program, &mut frame, 0)? {
        Outcome::Completed { value } => Ok(value.unwrap_or(Value::Unit)),
        // Procedures are validated to contain no suspension markers.
        Outcome::Produced { .. } => Err(CoilError::runtime(format!(
            "procedure '{}' suspended",
            program.name()
        ))),
    }
}

/// Wraps a compiled procedure as a callable value.
pub(crate) fn procedure_fn(program: Arc<Program>) -> NativeFn {
    NativeFn::new(move |args| run_procedure(&program, args))
}

// ============================================================================
// Expression Evaluation
// ============================================================================

/// Evaluates an expression atomically against the frame.
pub fn eval(program: &Program, frame: &Frame, expr: &Expr) -> CoilResult<Value> {
    match expr {
        Expr::Const(v) => Ok(v.clone()),
        Expr::Slot(slot) => frame.load(*slot, program),
        Expr::Unary(op, inner) => {
            let v = eval(program, frame, inner)?;
            unary(*op, v)
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(program, frame, lhs)?;
            let rhs = eval(program, frame, rhs)?;
            binary(*op, lhs, rhs)
        }
        Expr::Apply(callee, args) => {
            let callee = eval(program, frame, callee)?;
            let Some(f) = callee.as_func().cloned() else {
                return Err(CoilError::type_error(format!(
                    "{} is not callable",
                    callee.type_name()
                )));
            };
            let args = args
                .iter()
                .map(|a| eval(program, frame, a))
                .collect::<CoilResult<Vec<_>>>()?;
            f.call(&args)
        }
        // A nested generator definition instantiates a fresh, independent
        // machine every time it is evaluated.
        Expr::GenDef(sub) => {
            let generator = Generator::instantiate(Arc::clone(sub), &[])?;
            Ok(Value::Iter(IterHandle::new(generator)))
        }
        Expr::Local(_) | Expr::Gen(_) => Err(CoilError::runtime(
            "unlowered expression reached the machine",
        )),
    }
}

fn unary(op: UnaryOp, v: Value) -> CoilResult<Value> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| CoilError::runtime("integer overflow")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) => Err(CoilError::type_error(format!(
            "cannot negate {}",
            v.type_name()
        ))),
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> CoilResult<Value> {
    use BinOp::*;
    match op {
        Eq => Ok(Value::Bool(lhs == rhs)),
        Ne => Ok(Value::Bool(lhs != rhs)),
        Lt | Le | Gt | Ge => compare(op, lhs, rhs),
        Add | Sub | Mul | Div => arithmetic(op, lhs, rhs),
    }
}

fn compare(op: BinOp, lhs: Value, rhs: Value) -> CoilResult<Value> {
    let result = match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => ordered(op, a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => ordered(op, a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = as_f64(&lhs);
            let b = as_f64(&rhs);
            match op {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                BinOp::Ge => a >= b,
                _ => unreachable!(),
            }
        }
        _ => {
            return Err(CoilError::type_error(format!(
                "cannot compare {} and {}",
                lhs.type_name(),
                rhs.type_name()
            )));
        }
    };
    Ok(Value::Bool(result))
}

fn ordered(op: BinOp, ordering: std::cmp::Ordering) -> bool {
    match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    }
}

fn arithmetic(op: BinOp, lhs: Value, rhs: Value) -> CoilResult<Value> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = as_f64(&lhs);
            let b = as_f64(&rhs);
            Ok(Value::Float(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                _ => unreachable!(),
            }))
        }
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => {
            Ok(Value::str(format!("{a}{b}")))
        }
        _ => Err(CoilError::type_error(format!(
            "invalid operands {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn int_arithmetic(op: BinOp, a: i64, b: i64) -> CoilResult<Value> {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(CoilError::runtime("division by zero"));
            }
            a.checked_div(b)
        }
        _ => unreachable!(),
    };
    result
        .map(Value::Int)
        .ok_or_else(|| CoilError::runtime("integer overflow"))
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => unreachable!("checked by caller"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coil_compiler::{compile_generator, compile_procedure, Body, Stmt};

    fn run_all(program: &Program) -> Vec<Value> {
        let mut frame = Frame::new(program);
        let mut out = Vec::new();
        let mut entry = 0;
        loop {
            match step(program, &mut frame, entry).unwrap() {
                Outcome::Produced { value, resume } => {
                    out.push(value);
                    entry = program.resume_pc(resume).unwrap();
                }
                Outcome::Completed { .. } => return out,
            }
        }
    }

    #[test]
    fn test_step_sequential_yields() {
        let body = Body::new("abc")
            .stmt(Stmt::yield_value(Expr::constant("a")))
            .stmt(Stmt::yield_value(Expr::constant("b")));
        let program = compile_generator(&body).unwrap();
        assert_eq!(run_all(&program), vec![Value::str("a"), Value::str("b")]);
    }

    #[test]
    fn test_step_counting_loop() {
        let body = Body::new("count")
            .stmt(Stmt::assign("i", Expr::constant(0i64)))
            .stmt(Stmt::While {
                cond: Expr::binary(BinOp::Lt, Expr::local("i"), Expr::constant(3i64)),
                body: vec![
                    Stmt::yield_value(Expr::local("i")),
                    Stmt::assign(
                        "i",
                        Expr::binary(BinOp::Add, Expr::local("i"), Expr::constant(1i64)),
                    ),
                ],
            });
        let program = compile_generator(&body).unwrap();
        assert_eq!(
            run_all(&program),
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn test_step_for_each_over_list() {
        let body = Body::new("each").stmt(Stmt::for_each(
            "x",
            Expr::constant(Value::int_range(5, 8)),
            vec![Stmt::yield_value(Expr::local("x"))],
        ));
        let program = compile_generator(&body).unwrap();
        assert_eq!(
            run_all(&program),
            vec![Value::Int(5), Value::Int(6), Value::Int(7)]
        );
    }

    #[test]
    fn test_step_conditional_branches() {
        let body = Body::new("fork").param("flag").stmt(Stmt::If {
            cond: Expr::local("flag"),
            then_body: vec![Stmt::yield_value(Expr::constant("yes"))],
            else_body: vec![Stmt::yield_value(Expr::constant("no"))],
        });
        let program = compile_generator(&body).unwrap();

        let mut frame = Frame::new(&program);
        frame.store(coil_compiler::SlotId(0), Value::Bool(false));
        let Outcome::Produced { value, .. } = step(&program, &mut frame, 0).unwrap() else {
            panic!("expected produced");
        };
        assert_eq!(value, Value::str("no"));
    }

    #[test]
    fn test_procedure_returns_value() {
        let body = Body::new("double")
            .param("x")
            .stmt(Stmt::ReturnValue(Expr::binary(
                BinOp::Add,
                Expr::local("x"),
                Expr::local("x"),
            )));
        let program = compile_procedure(&body).unwrap();
        assert_eq!(
            run_procedure(&program, &[Value::Int(21)]).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn test_procedure_arity_checked() {
        let body = Body::new("id")
            .param("x")
            .stmt(Stmt::ReturnValue(Expr::local("x")));
        let program = compile_procedure(&body).unwrap();
        assert_eq!(
            run_procedure(&program, &[]),
            Err(CoilError::Arity {
                expected: 1,
                got: 0
            })
        );
    }

    #[test]
    fn test_procedure_without_return_yields_unit() {
        let body = Body::new("noop").stmt(Stmt::Effect(Expr::constant(1i64)));
        let program = compile_procedure(&body).unwrap();
        assert_eq!(run_procedure(&program, &[]).unwrap(), Value::Unit);
    }

    #[test]
    fn test_division_by_zero_propagates() {
        let body = Body::new("boom").stmt(Stmt::yield_value(Expr::binary(
            BinOp::Div,
            Expr::constant(1i64),
            Expr::constant(0i64),
        )));
        let program = compile_generator(&body).unwrap();
        let mut frame = Frame::new(&program);
        let err = step(&program, &mut frame, 0).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_apply_non_callable_is_type_error() {
        let body = Body::new("bad").stmt(Stmt::yield_value(Expr::apply(
            Expr::constant(5i64),
            vec![],
        )));
        let program = compile_generator(&body).unwrap();
        let mut frame = Frame::new(&program);
        let err = step(&program, &mut frame, 0).unwrap_err();
        assert!(err.to_string().contains("int is not callable"));
    }

    #[test]
    fn test_binary_helpers() {
        assert_eq!(
            binary(BinOp::Add, Value::str("a"), Value::str("b")).unwrap(),
            Value::str("ab")
        );
        assert_eq!(
            binary(BinOp::Lt, Value::Int(1), Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(BinOp::Eq, Value::Unit, Value::Unit).unwrap(),
            Value::Bool(true)
        );
        assert!(binary(BinOp::Lt, Value::Unit, Value::Int(1)).is_err());
        assert_eq!(
            binary(BinOp::Mul, Value::Int(6), Value::Int(7)).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn test_unary_helpers() {
        assert_eq!(unary(UnaryOp::Not, Value::Int(0)).unwrap(), Value::Bool(true));
        assert_eq!(unary(UnaryOp::Neg, Value::Int(5)).unwrap(), Value::Int(-5));
        assert!(unary(UnaryOp::Neg, Value::str("x")).is_err());
    }

    #[test]
    fn test_integer_overflow_is_error() {
        let err = binary(BinOp::Add, Value::Int(i64::MAX), Value::Int(1)).unwrap_err();
        assert!(err.to_string().contains("integer overflow"));
    }
}
