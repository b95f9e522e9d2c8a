//! Body descriptions: the statement/expression language fed to the
//! compiler.
//!
//! A [`Body`] is a control-flow graph in tree form — sequential
//! statements, conditionals, loops, and [`Stmt::Yield`] suspension
//! markers. Expressions never suspend: they are evaluated atomically
//! between suspension points, which is why host callables
//! ([`coil_core::NativeFn`]) are opaque to the compiler.
//!
//! Two expression variants are produced by lowering and never written by
//! hand: [`Expr::Slot`] (a resolved local) and [`Expr::GenDef`] (a nested
//! generator compiled into its own unit).

use std::sync::Arc;

use coil_core::Value;

use crate::program::{Program, SlotId};

/// Binary operators available in body expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Unary operators available in body expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation (truthiness-based).
    Not,
    /// Arithmetic negation.
    Neg,
}

/// An expression. Evaluated atomically; never a suspension point.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value.
    Const(Value),
    /// A local read, by name.
    Local(Arc<str>),
    /// A local read, by resolved slot. Produced by lowering.
    Slot(SlotId),
    /// Unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operation.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Ordinary call of a callable value. Opaque to the outer machine:
    /// whatever happens inside runs to completion within one step.
    Apply(Box<Expr>, Vec<Expr>),
    /// A nested generator definition. Compiled as a separate, unrelated
    /// unit; evaluating it instantiates a fresh iterator.
    Gen(Box<Body>),
    /// A nested generator after lowering.
    GenDef(Arc<Program>),
}

impl Expr {
    /// A literal expression.
    pub fn constant<V: Into<Value>>(v: V) -> Self {
        Self::Const(v.into())
    }

    /// A local read by name.
    pub fn local(name: &str) -> Self {
        Self::Local(Arc::from(name))
    }

    /// A binary operation.
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// An application of a callable expression.
    pub fn apply(callee: Expr, args: Vec<Expr>) -> Self {
        Self::Apply(Box::new(callee), args)
    }

    /// An application of a host function literal.
    pub fn call_native(f: coil_core::NativeFn, args: Vec<Expr>) -> Self {
        Self::apply(Expr::Const(Value::Func(f)), args)
    }
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Evaluate and store into a local.
    Assign(Arc<str>, Expr),
    /// Evaluate for effect only.
    Effect(Expr),
    /// The suspension marker: produce a value and suspend.
    Yield(Expr),
    /// Conditional.
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// Condition-checked loop.
    While { cond: Expr, body: Vec<Stmt> },
    /// Finite loop over a list or an upstream iterator. Upstream
    /// exhaustion ends the loop exactly like running off the end of a
    /// sequence.
    ForEach {
        var: Arc<str>,
        source: Expr,
        body: Vec<Stmt>,
    },
    /// Unconditional infinite loop.
    Loop(Vec<Stmt>),
    /// Exit the innermost loop.
    Break,
    /// Jump back to the innermost loop's head.
    Continue,
    /// Early completion of the machine.
    Return,
    /// Early completion with a value. Only valid in ordinary procedures.
    ReturnValue(Expr),
    /// A nested ordinary procedure definition: its own compiled unit,
    /// its own locals, and — critically — no suspension markers.
    Define {
        name: Arc<str>,
        params: Vec<Arc<str>>,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    /// An assignment statement.
    pub fn assign(name: &str, expr: Expr) -> Self {
        Self::Assign(Arc::from(name), expr)
    }

    /// A suspension marker producing the given expression's value.
    pub fn yield_value(expr: Expr) -> Self {
        Self::Yield(expr)
    }

    /// A loop over the values of `source`, binding each to `var`.
    pub fn for_each(var: &str, source: Expr, body: Vec<Stmt>) -> Self {
        Self::ForEach {
            var: Arc::from(var),
            source,
            body,
        }
    }
}

/// A procedure body: parameters plus statements.
#[derive(Debug, Clone)]
pub struct Body {
    /// Name used in diagnostics.
    pub name: Arc<str>,
    /// Parameter names, bound in order at instantiation.
    pub params: Vec<Arc<str>>,
    /// The statements.
    pub stmts: Vec<Stmt>,
}

impl Body {
    /// Creates an empty body.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            params: Vec::new(),
            stmts: Vec::new(),
        }
    }

    /// Adds a parameter.
    pub fn param(mut self, name: &str) -> Self {
        self.params.push(Arc::from(name));
        self
    }

    /// Adds a statement.
    pub fn stmt(mut self, stmt: Stmt) -> Self {
        self.stmts.push(stmt);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
