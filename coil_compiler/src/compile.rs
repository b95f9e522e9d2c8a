//! Lowering: body descriptions to flat instruction programs.
//!
//! Structured control flow becomes absolute jumps via labels with
//! forward-reference patching; local names become frame slots; each
//! `ForEach` gets a dedicated frame cursor so a suspension inside the
//! loop resumes in the same iteration context; each `Yield` records the
//! pc after itself in the resume table.
//!
//! Lowering is deterministic: the same input body always produces the
//! same instruction sequence and the same suspension-point ids.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use coil_core::{CoilError, CoilResult};

use crate::body::{Body, Expr, Stmt};
use crate::program::{CursorId, Instr, Mode, Program, ResumeTable, SlotId};
use crate::validate::validate;

/// Placeholder jump target overwritten by label patching.
const UNPATCHED: u32 = u32::MAX;

/// Stack-allocated loop context stack for typical nesting depths.
type LoopStack = SmallVec<[LoopContext; 4]>;

/// Jump targets for `break`/`continue` inside the current loop.
#[derive(Debug, Clone, Copy)]
struct LoopContext {
    break_label: Label,
    continue_label: Label,
}

/// A forward-patchable jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Label(u32);

/// Compiles a body in the given mode. Validation runs first; every
/// structural error surfaces here, before any iterator exists.
pub fn compile(body: &Body, mode: Mode) -> CoilResult<Arc<Program>> {
    validate(body, mode)?;
    compile_parts(&body.name, &body.params, &body.stmts, mode)
}

/// Compiles a generator body.
pub fn compile_generator(body: &Body) -> CoilResult<Arc<Program>> {
    compile(body, Mode::Generator)
}

/// Compiles an ordinary procedure body.
pub fn compile_procedure(body: &Body) -> CoilResult<Arc<Program>> {
    compile(body, Mode::Procedure)
}

/// Lowers an already-validated unit.
fn compile_parts(
    name: &Arc<str>,
    params: &[Arc<str>],
    stmts: &[Stmt],
    mode: Mode,
) -> CoilResult<Arc<Program>> {
    let mut c = Compiler::new(name.clone(), mode);
    for param in params {
        c.slot(param);
    }
    for stmt in stmts {
        c.compile_stmt(stmt)?;
    }
    // Running off the end completes the machine.
    c.instrs.push(Instr::Return { value: None });
    c.finish(params.to_vec())
}

// ============================================================================
// Compiler
// ============================================================================

struct Compiler {
    name: Arc<str>,
    mode: Mode,
    instrs: Vec<Instr>,
    resume: ResumeTable,
    slots: FxHashMap<Arc<str>, SlotId>,
    slot_names: Vec<Arc<str>>,
    cursor_count: u32,
    /// Bound label positions, indexed by label id.
    labels: Vec<Option<u32>>,
    /// Instructions whose target awaits a label position.
    patches: Vec<(usize, Label)>,
    loop_stack: LoopStack,
}

impl Compiler {
    fn new(name: Arc<str>, mode: Mode) -> Self {
        Self {
            name,
            mode,
            instrs: Vec::new(),
            resume: ResumeTable::new(),
            slots: FxHashMap::default(),
            slot_names: Vec::new(),
            cursor_count: 0,
            labels: Vec::new(),
            patches: Vec::new(),
            loop_stack: LoopStack::new(),
        }
    }

    /// Resolves a local name to its slot, allocating on first sight.
    fn slot(&mut self, name: &Arc<str>) -> SlotId {
        if let Some(&slot) = self.slots.get(name) {
            return slot;
        }
        let slot = SlotId(self.slot_names.len() as u32);
        self.slots.insert(name.clone(), slot);
        self.slot_names.push(name.clone());
        slot
    }

    fn create_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Binds a label to the current pc.
    fn bind_label(&mut self, label: Label) {
        debug_assert!(self.labels[label.0 as usize].is_none(), "label bound twice");
        self.labels[label.0 as usize] = Some(self.instrs.len() as u32);
    }

    fn emit_jump(&mut self, label: Label) {
        self.patches.push((self.instrs.len(), label));
        self.instrs.push(Instr::Jump { target: UNPATCHED });
    }

    fn emit_jump_if_false(&mut self, cond: Expr, label: Label) {
        self.patches.push((self.instrs.len(), label));
        self.instrs.push(Instr::JumpIfFalse {
            cond,
            target: UNPATCHED,
        });
    }

    fn emit_iter_next(&mut self, cursor: CursorId, slot: SlotId, done: Label) {
        self.patches.push((self.instrs.len(), done));
        self.instrs.push(Instr::IterNext {
            cursor,
            slot,
            done: UNPATCHED,
        });
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) -> CoilResult<()> {
        match stmt {
            Stmt::Assign(name, expr) => {
                let expr = self.lower_expr(expr)?;
                let slot = self.slot(name);
                self.instrs.push(Instr::Store { slot, expr });
            }

            Stmt::Effect(expr) => {
                let expr = self.lower_expr(expr)?;
                self.instrs.push(Instr::Effect { expr });
            }

            Stmt::Yield(expr) => {
                let expr = self.lower_expr(expr)?;
                // The machine continues at the instruction after the
                // yield; the resume table records exactly that pc.
                let resume = self.resume.add(self.instrs.len() as u32 + 1);
                self.instrs.push(Instr::Yield { expr, resume });
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond = self.lower_expr(cond)?;
                let else_label = self.create_label();
                self.emit_jump_if_false(cond, else_label);

                for s in then_body {
                    self.compile_stmt(s)?;
                }

                if else_body.is_empty() {
                    self.bind_label(else_label);
                } else {
                    let end_label = self.create_label();
                    self.emit_jump(end_label);
                    self.bind_label(else_label);
                    for s in else_body {
                        self.compile_stmt(s)?;
                    }
                    self.bind_label(end_label);
                }
            }

            Stmt::While { cond, body } => {
                let start = self.create_label();
                let end = self.create_label();

                self.bind_label(start);
                let cond = self.lower_expr(cond)?;
                self.emit_jump_if_false(cond, end);

                self.loop_stack.push(LoopContext {
                    break_label: end,
                    continue_label: start,
                });
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.loop_stack.pop();

                self.emit_jump(start);
                self.bind_label(end);
            }

            Stmt::ForEach { var, source, body } => {
                let cursor = CursorId(self.cursor_count);
                self.cursor_count += 1;

                let source = self.lower_expr(source)?;
                self.instrs.push(Instr::IterInit { cursor, source });

                let start = self.create_label();
                let end = self.create_label();
                let slot = self.slot(var);

                self.bind_label(start);
                self.emit_iter_next(cursor, slot, end);

                self.loop_stack.push(LoopContext {
                    break_label: end,
                    continue_label: start,
                });
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.loop_stack.pop();

                self.emit_jump(start);
                self.bind_label(end);
            }

            Stmt::Loop(body) => {
                let start = self.create_label();
                let end = self.create_label();

                self.bind_label(start);
                self.loop_stack.push(LoopContext {
                    break_label: end,
                    continue_label: start,
                });
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.loop_stack.pop();

                self.emit_jump(start);
                self.bind_label(end);
            }

            Stmt::Break => {
                let ctx = self.current_loop()?;
                self.emit_jump(ctx.break_label);
            }

            Stmt::Continue => {
                let ctx = self.current_loop()?;
                self.emit_jump(ctx.continue_label);
            }

            Stmt::Return => {
                self.instrs.push(Instr::Return { value: None });
            }

            Stmt::ReturnValue(expr) => {
                let expr = self.lower_expr(expr)?;
                self.instrs.push(Instr::Return { value: Some(expr) });
            }

            Stmt::Define { name, params, body } => {
                let program = compile_parts(name, params, body, Mode::Procedure)?;
                let slot = self.slot(name);
                self.instrs.push(Instr::Define { slot, program });
            }
        }
        Ok(())
    }

    fn current_loop(&self) -> CoilResult<LoopContext> {
        // Validation rejects stray break/continue; this guards the
        // compiler against its own bookkeeping.
        self.loop_stack.last().copied().ok_or_else(|| {
            CoilError::compile(format!("no enclosing loop in '{}'", self.name))
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn lower_expr(&mut self, expr: &Expr) -> CoilResult<Expr> {
        Ok(match expr {
            Expr::Const(v) => Expr::Const(v.clone()),
            Expr::Local(name) => Expr::Slot(self.slot(name)),
            Expr::Unary(op, inner) => Expr::Unary(*op, Box::new(self.lower_expr(inner)?)),
            Expr::Binary(op, lhs, rhs) => Expr::Binary(
                *op,
                Box::new(self.lower_expr(lhs)?),
                Box::new(self.lower_expr(rhs)?),
            ),
            Expr::Apply(callee, args) => {
                let callee = Box::new(self.lower_expr(callee)?);
                let args = args
                    .iter()
                    .map(|a| self.lower_expr(a))
                    .collect::<CoilResult<Vec<_>>>()?;
                Expr::Apply(callee, args)
            }
            Expr::Gen(body) => Expr::GenDef(compile_parts(
                &body.name,
                &body.params,
                &body.stmts,
                Mode::Generator,
            )?),
            Expr::Slot(_) | Expr::GenDef(_) => {
                return Err(CoilError::compile(format!(
                    "lowered form in source body '{}'",
                    self.name
                )));
            }
        })
    }

    // ------------------------------------------------------------------
    // Finish
    // ------------------------------------------------------------------

    fn finish(mut self, params: Vec<Arc<str>>) -> CoilResult<Arc<Program>> {
        for (index, label) in self.patches.drain(..) {
            let pc = self.labels[label.0 as usize].ok_or_else(|| {
                CoilError::compile(format!("unbound label in '{}'", self.name))
            })?;
            match &mut self.instrs[index] {
                Instr::Jump { target } | Instr::JumpIfFalse { target, .. } => *target = pc,
                Instr::IterNext { done, .. } => *done = pc,
                other => {
                    debug_assert!(false, "patch on non-jump instruction {other:?}");
                    return Err(CoilError::compile(format!(
                        "internal patch error in '{}'",
                        self.name
                    )));
                }
            }
        }

        debug_assert_eq!(self.mode == Mode::Procedure, self.resume.is_empty());
        Ok(Arc::new(Program::new(
            self.name,
            self.mode,
            self.instrs,
            self.resume,
            params,
            self.slot_names,
            self.cursor_count,
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BinOp;
    use coil_core::Value;

    fn abc_body() -> Body {
        Body::new("abc")
            .stmt(Stmt::yield_value(Expr::constant("a")))
            .stmt(Stmt::yield_value(Expr::constant("b")))
            .stmt(Stmt::yield_value(Expr::constant("c")))
    }

    fn assert_fully_patched(program: &Program) {
        for pc in 0..program.len() as u32 {
            match program.instr(pc).unwrap() {
                Instr::Jump { target } | Instr::JumpIfFalse { target, .. } => {
                    assert_ne!(*target, UNPATCHED, "unpatched jump at pc {pc}");
                    assert!(*target <= program.len() as u32);
                }
                Instr::IterNext { done, .. } => {
                    assert_ne!(*done, UNPATCHED, "unpatched IterNext at pc {pc}");
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_compile_abc() {
        let program = compile_generator(&abc_body()).unwrap();
        // Three yields plus the implicit terminator.
        assert_eq!(program.len(), 4);
        assert_eq!(program.resume().len(), 3);
        // Each suspension point resumes right after its own yield.
        assert_eq!(program.resume_pc(0), Some(1));
        assert_eq!(program.resume_pc(1), Some(2));
        assert_eq!(program.resume_pc(2), Some(3));
        assert!(matches!(
            program.instr(3),
            Some(Instr::Return { value: None })
        ));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let a = compile_generator(&abc_body()).unwrap();
        let b = compile_generator(&abc_body()).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a.resume().len(), b.resume().len());
        for id in 0..a.resume().len() as u32 {
            assert_eq!(a.resume_pc(id), b.resume_pc(id));
        }
    }

    #[test]
    fn test_params_take_first_slots() {
        let body = Body::new("pair")
            .param("x")
            .param("y")
            .stmt(Stmt::yield_value(Expr::local("y")))
            .stmt(Stmt::yield_value(Expr::local("x")));
        let program = compile_generator(&body).unwrap();
        assert_eq!(program.arity(), 2);
        assert_eq!(program.slot_name(SlotId(0)), "x");
        assert_eq!(program.slot_name(SlotId(1)), "y");
    }

    #[test]
    fn test_locals_are_lowered_to_slots() {
        let body = Body::new("inc")
            .stmt(Stmt::assign("n", Expr::constant(0i64)))
            .stmt(Stmt::yield_value(Expr::binary(
                BinOp::Add,
                Expr::local("n"),
                Expr::constant(1i64),
            )));
        let program = compile_generator(&body).unwrap();
        let Some(Instr::Yield { expr, .. }) = program.instr(1) else {
            panic!("expected yield at pc 1");
        };
        let Expr::Binary(BinOp::Add, lhs, _) = expr else {
            panic!("expected lowered binary");
        };
        assert!(matches!(**lhs, Expr::Slot(SlotId(0))));
    }

    #[test]
    fn test_for_each_allocates_cursor() {
        let body = Body::new("each").stmt(Stmt::for_each(
            "x",
            Expr::constant(Value::int_range(0, 3)),
            vec![Stmt::yield_value(Expr::local("x"))],
        ));
        let program = compile_generator(&body).unwrap();
        assert_eq!(program.cursor_count(), 1);
        assert!(matches!(
            program.instr(0),
            Some(Instr::IterInit {
                cursor: CursorId(0),
                ..
            })
        ));
        assert_fully_patched(&program);
    }

    #[test]
    fn test_nested_loops_get_distinct_cursors() {
        let body = Body::new("grid").stmt(Stmt::for_each(
            "i",
            Expr::constant(Value::int_range(0, 2)),
            vec![Stmt::for_each(
                "j",
                Expr::constant(Value::int_range(0, 2)),
                vec![Stmt::yield_value(Expr::local("j"))],
            )],
        ));
        let program = compile_generator(&body).unwrap();
        assert_eq!(program.cursor_count(), 2);
    }

    #[test]
    fn test_while_and_break_targets_resolve() {
        let body = Body::new("count")
            .stmt(Stmt::assign("i", Expr::constant(0i64)))
            .stmt(Stmt::While {
                cond: Expr::binary(BinOp::Lt, Expr::local("i"), Expr::constant(10i64)),
                body: vec![
                    Stmt::yield_value(Expr::local("i")),
                    Stmt::assign(
                        "i",
                        Expr::binary(BinOp::Add, Expr::local("i"), Expr::constant(1i64)),
                    ),
                    Stmt::If {
                        cond: Expr::binary(BinOp::Eq, Expr::local("i"), Expr::constant(5i64)),
                        then_body: vec![Stmt::Break],
                        else_body: vec![],
                    },
                ],
            });
        let program = compile_generator(&body).unwrap();
        assert_fully_patched(&program);
    }

    #[test]
    fn test_infinite_loop_jumps_back() {
        let body = Body::new("forever").stmt(Stmt::Loop(vec![Stmt::yield_value(
            Expr::constant(1i64),
        )]));
        let program = compile_generator(&body).unwrap();
        // yield, jump-back, terminator
        assert_eq!(program.len(), 3);
        assert!(matches!(program.instr(1), Some(Instr::Jump { target: 0 })));
    }

    #[test]
    fn test_define_compiles_nested_procedure() {
        let body = Body::new("outer")
            .stmt(Stmt::Define {
                name: "double".into(),
                params: vec!["x".into()],
                body: vec![Stmt::ReturnValue(Expr::binary(
                    BinOp::Add,
                    Expr::local("x"),
                    Expr::local("x"),
                ))],
            })
            .stmt(Stmt::yield_value(Expr::apply(
                Expr::local("double"),
                vec![Expr::constant(21i64)],
            )));
        let program = compile_generator(&body).unwrap();
        let Some(Instr::Define { program: sub, .. }) = program.instr(0) else {
            panic!("expected define at pc 0");
        };
        assert_eq!(sub.mode(), Mode::Procedure);
        assert_eq!(sub.arity(), 1);
        assert!(sub.resume().is_empty());
    }

    #[test]
    fn test_nested_generator_lowered_to_separate_unit() {
        let inner = Body::new("inner").stmt(Stmt::yield_value(Expr::constant(1i64)));
        let body = Body::new("outer")
            .stmt(Stmt::assign("g", Expr::Gen(Box::new(inner))))
            .stmt(Stmt::yield_value(Expr::local("g")));
        let program = compile_generator(&body).unwrap();
        let Some(Instr::Store { expr, .. }) = program.instr(0) else {
            panic!("expected store at pc 0");
        };
        let Expr::GenDef(sub) = expr else {
            panic!("expected lowered nested generator");
        };
        assert_eq!(sub.mode(), Mode::Generator);
        assert_eq!(sub.resume().len(), 1);
    }

    #[test]
    fn test_compile_rejects_invalid_body() {
        let body = Body::new("empty");
        assert!(compile_generator(&body).is_err());
    }
}
