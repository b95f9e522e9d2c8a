//! Structural validation of bodies.
//!
//! Runs before lowering and reports every error at factory-construction
//! time, before any iterator exists:
//!
//! - A generator body must contain at least one *reachable* suspension
//!   marker; a body that can never suspend would never behave as an
//!   iterator.
//! - An ordinary procedure body must contain no suspension marker at
//!   all. A `yield` nested inside a `Define` never suspends the outer
//!   machine, so it is rejected outright rather than silently ignored.
//! - `break`/`continue` must sit inside a loop; generators complete
//!   bare, so `ReturnValue` is procedure-only; parameter names must be
//!   distinct.
//!
//! Reachability is a conservative CFG walk: code after `Return`, or
//! after an unconditional `Loop` whose body contains no reachable
//! `Break`, is unreachable. Loop bodies count as reachable even when a
//! bounded source could be empty.

use std::sync::Arc;

use coil_core::{CoilError, CoilResult};

use crate::body::{Body, Expr, Stmt};
use crate::program::Mode;

/// Validates a body for the given compilation mode.
pub fn validate(body: &Body, mode: Mode) -> CoilResult<()> {
    validate_parts(&body.name, &body.params, &body.stmts, mode)
}

/// Validates a unit given as loose parts (used for nested `Define`s).
pub(crate) fn validate_parts(
    name: &str,
    params: &[Arc<str>],
    stmts: &[Stmt],
    mode: Mode,
) -> CoilResult<()> {
    check_distinct_params(name, params)?;

    let ctx = Ctx {
        name,
        mode,
        loop_depth: 0,
    };
    check_block(stmts, ctx)?;

    if mode == Mode::Generator && scan_block(stmts).yields == 0 {
        return Err(CoilError::compile(format!(
            "generator '{name}' has no reachable suspension point"
        )));
    }
    Ok(())
}

fn check_distinct_params(name: &str, params: &[Arc<str>]) -> CoilResult<()> {
    for (i, p) in params.iter().enumerate() {
        if params[..i].contains(p) {
            return Err(CoilError::compile(format!(
                "duplicate parameter '{p}' in '{name}'"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Structural Checks
// ============================================================================

#[derive(Clone, Copy)]
struct Ctx<'a> {
    name: &'a str,
    mode: Mode,
    loop_depth: u32,
}

impl<'a> Ctx<'a> {
    fn in_loop(self) -> Self {
        Self {
            loop_depth: self.loop_depth + 1,
            ..self
        }
    }
}

fn check_block(stmts: &[Stmt], ctx: Ctx<'_>) -> CoilResult<()> {
    for stmt in stmts {
        check_stmt(stmt, ctx)?;
    }
    Ok(())
}

fn check_stmt(stmt: &Stmt, ctx: Ctx<'_>) -> CoilResult<()> {
    match stmt {
        Stmt::Assign(_, expr) | Stmt::Effect(expr) => check_expr(expr, ctx),
        Stmt::Yield(expr) => {
            if ctx.mode == Mode::Procedure {
                return Err(CoilError::compile(format!(
                    "suspension marker inside ordinary procedure '{}'",
                    ctx.name
                )));
            }
            check_expr(expr, ctx)
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            check_expr(cond, ctx)?;
            check_block(then_body, ctx)?;
            check_block(else_body, ctx)
        }
        Stmt::While { cond, body } => {
            check_expr(cond, ctx)?;
            check_block(body, ctx.in_loop())
        }
        Stmt::ForEach { source, body, .. } => {
            check_expr(source, ctx)?;
            check_block(body, ctx.in_loop())
        }
        Stmt::Loop(body) => check_block(body, ctx.in_loop()),
        Stmt::Break => {
            if ctx.loop_depth == 0 {
                return Err(CoilError::compile(format!(
                    "'break' outside of a loop in '{}'",
                    ctx.name
                )));
            }
            Ok(())
        }
        Stmt::Continue => {
            if ctx.loop_depth == 0 {
                return Err(CoilError::compile(format!(
                    "'continue' outside of a loop in '{}'",
                    ctx.name
                )));
            }
            Ok(())
        }
        Stmt::Return => Ok(()),
        Stmt::ReturnValue(expr) => {
            if ctx.mode == Mode::Generator {
                return Err(CoilError::compile(format!(
                    "generator '{}' cannot return a value",
                    ctx.name
                )));
            }
            check_expr(expr, ctx)
        }
        Stmt::Define { name, params, body } => {
            // A nested ordinary procedure is its own unit: fresh locals,
            // fresh loop context, and no suspension markers.
            validate_parts(name, params, body, Mode::Procedure)
        }
    }
}

fn check_expr(expr: &Expr, ctx: Ctx<'_>) -> CoilResult<()> {
    match expr {
        Expr::Const(_) | Expr::Local(_) => Ok(()),
        Expr::Unary(_, inner) => check_expr(inner, ctx),
        Expr::Binary(_, lhs, rhs) => {
            check_expr(lhs, ctx)?;
            check_expr(rhs, ctx)
        }
        Expr::Apply(callee, args) => {
            check_expr(callee, ctx)?;
            for arg in args {
                check_expr(arg, ctx)?;
            }
            Ok(())
        }
        // A nested generator is a separate compiled unit with its own
        // suspension points; validate it as one.
        Expr::Gen(body) => validate(body, Mode::Generator),
        Expr::Slot(_) | Expr::GenDef(_) => Err(CoilError::compile(format!(
            "lowered form in source body '{}'",
            ctx.name
        ))),
    }
}

// ============================================================================
// Reachability
// ============================================================================

/// Summary of a block's control flow.
struct Flow {
    /// Reachable suspension markers belonging to *this* unit.
    yields: usize,
    /// Whether control can run off the end of the block.
    falls_through: bool,
    /// Whether a reachable `break` escapes to the enclosing loop.
    breaks: bool,
}

fn scan_block(stmts: &[Stmt]) -> Flow {
    let mut yields = 0;
    let mut breaks = false;
    let mut reachable = true;

    for stmt in stmts {
        if !reachable {
            break;
        }
        match stmt {
            Stmt::Yield(_) => yields += 1,
            Stmt::Return | Stmt::ReturnValue(_) => reachable = false,
            Stmt::Break => {
                breaks = true;
                reachable = false;
            }
            Stmt::Continue => reachable = false,
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                let then_flow = scan_block(then_body);
                let else_flow = scan_block(else_body);
                yields += then_flow.yields + else_flow.yields;
                breaks |= then_flow.breaks || else_flow.breaks;
                if !then_flow.falls_through && !else_flow.falls_through {
                    reachable = false;
                }
            }
            // Condition-checked and bounded loops can always terminate;
            // their breaks bind to themselves.
            Stmt::While { body, .. } | Stmt::ForEach { body, .. } => {
                yields += scan_block(body).yields;
            }
            Stmt::Loop(body) => {
                let flow = scan_block(body);
                yields += flow.yields;
                if !flow.breaks {
                    reachable = false;
                }
            }
            // Separate units: their markers are not ours.
            Stmt::Define { .. } | Stmt::Assign(..) | Stmt::Effect(_) => {}
        }
    }

    Flow {
        yields,
        falls_through: reachable,
        breaks,
    }
}

// ============================================================================
// Tests
// ============================================================================
