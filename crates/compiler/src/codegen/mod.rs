//! RISC-V code generation from the raw Koopa program.
//!
//! Two passes per function: [`frame::FrameLayout`] sizes the activation
//! record and assigns every value its slot, then the emitter walks the
//! basic blocks in order (entry first) and materializes each instruction.
//!
//! Register discipline is deliberately trivial: `t0` carries the current
//! result or first operand, `t1` the second operand, `t2` constants such
//! as pointer strides. `t3` belongs to the assembly writer's offset
//! patching. Conditional branches never rely on the 4 KB `bnez` range;
//! each one gets a local trampoline label and two unconditional jumps.

pub mod asm;
pub mod frame;

use crate::koopa::{BinaryOp, Function, Program, Type, ValueId, ValueKind};
use asm::{AsmWriter, imm12};
use frame::FrameLayout;

/// Error raised when the raw program cannot be lowered to RISC-V. Seeing
/// one means the IR writer or parser let something malformed through.
#[derive(Debug)]
pub struct CodeGenError(pub String);

impl std::fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code generation error: {}", self.0)
    }
}

impl std::error::Error for CodeGenError {}

impl From<String> for CodeGenError {
    fn from(s: String) -> Self {
        CodeGenError(s)
    }
}

pub fn emit_program(prog: &Program) -> Result<String, CodeGenError> {
    let mut r#gen = CodeGen {
        prog,
        asm: AsmWriter::new(),
        branch_labels: 0,
    };
    for &global in &prog.globals {
        r#gen.emit_global(global)?;
    }
    for func in &prog.funcs {
        r#gen.emit_func(func)?;
    }
    Ok(r#gen.asm.finish())
}

struct CodeGen<'a> {
    prog: &'a Program,
    asm: AsmWriter,
    branch_labels: usize,
}

/// `@main` and `%entry` become `main` and `entry` in assembly.
fn strip_sigil(name: &str) -> &str {
    &name[1..]
}

impl CodeGen<'_> {
    // ----- globals -----

    fn emit_global(&mut self, id: ValueId) -> Result<(), CodeGenError> {
        let value = self.prog.value(id);
        let name = value
            .name
            .as_deref()
            .ok_or_else(|| CodeGenError("global without a name".to_string()))?;
        let symbol = strip_sigil(name);
        let init = match value.kind {
            ValueKind::GlobalAlloc { init } => init,
            ref other => {
                return Err(CodeGenError(format!(
                    "global '{}' is not a global allocation: {:?}",
                    name, other
                )));
            }
        };

        self.asm.append("  .data\n");
        self.asm.append(&format!("  .globl {}\n", symbol));
        self.asm.label(symbol);

        let pointee = value
            .ty
            .pointee()
            .ok_or_else(|| CodeGenError(format!("global '{}' has a non-pointer type", name)))?;
        match pointee {
            Type::Int32 => match self.prog.value(init).kind {
                ValueKind::ZeroInit => self.asm.zero(4),
                ValueKind::Integer(n) => self.asm.word(n),
                ref other => {
                    return Err(CodeGenError(format!(
                        "bad initializer for integer global '{}': {:?}",
                        name, other
                    )));
                }
            },
            Type::Array(..) => self.emit_aggregate_words(init)?,
            other => {
                return Err(CodeGenError(format!(
                    "global '{}' of unsupported type {}",
                    name, other
                )));
            }
        }
        self.asm.append("\n");
        Ok(())
    }

    fn emit_aggregate_words(&mut self, id: ValueId) -> Result<(), CodeGenError> {
        match &self.prog.value(id).kind {
            ValueKind::Integer(n) => {
                self.asm.word(*n);
                Ok(())
            }
            ValueKind::Aggregate { elems } => {
                for &elem in elems {
                    self.emit_aggregate_words(elem)?;
                }
                Ok(())
            }
            other => Err(CodeGenError(format!(
                "global array initializer must be an aggregate of integers, got {:?}",
                other
            ))),
        }
    }

    // ----- functions -----

    fn emit_func(&mut self, func: &Function) -> Result<(), CodeGenError> {
        let frame = FrameLayout::plan(self.prog, func);
        tracing::debug!(
            func = %func.name,
            delta = frame.delta,
            "planned stack frame"
        );

        let name = strip_sigil(&func.name);
        self.asm.append("  .text\n");
        self.asm.append(&format!("  .globl {}\n", name));
        self.asm.label(name);

        if frame.delta > 0 {
            self.asm.adjust_sp(-(frame.delta as i32));
        }
        if frame.saves_ra() {
            self.asm.sw("ra", "sp", frame.ra_offset());
        }

        // Entry first, the rest in their original order. The epilogue is
        // emitted inline at every ret.
        let entry = func
            .bbs
            .iter()
            .position(|bb| bb.name == "%entry")
            .unwrap_or(0);
        self.emit_block(func, &frame, entry)?;
        for idx in 0..func.bbs.len() {
            if idx != entry {
                self.emit_block(func, &frame, idx)?;
            }
        }
        self.asm.append("\n");
        Ok(())
    }

    fn emit_block(
        &mut self,
        func: &Function,
        frame: &FrameLayout,
        idx: usize,
    ) -> Result<(), CodeGenError> {
        let bb = &func.bbs[idx];
        if bb.name != "%entry" {
            self.asm.label(strip_sigil(&bb.name));
        }
        for &inst in &bb.insts {
            self.emit_inst(func, frame, inst)?;
        }
        Ok(())
    }

    fn emit_inst(
        &mut self,
        func: &Function,
        frame: &FrameLayout,
        id: ValueId,
    ) -> Result<(), CodeGenError> {
        match &self.prog.value(id).kind {
            ValueKind::Alloc => Ok(()),

            ValueKind::Binary { op, lhs, rhs } => {
                self.materialize(frame, *lhs, "t0")?;
                self.materialize(frame, *rhs, "t1")?;
                match op {
                    BinaryOp::NotEq => {
                        self.asm.binary("xor", "t0", "t0", "t1");
                        self.asm.op2("snez", "t0", "t0");
                    }
                    BinaryOp::Eq => {
                        self.asm.binary("xor", "t0", "t0", "t1");
                        self.asm.op2("seqz", "t0", "t0");
                    }
                    BinaryOp::Ge => {
                        self.asm.binary("slt", "t0", "t0", "t1");
                        self.asm.op2("seqz", "t0", "t0");
                    }
                    BinaryOp::Le => {
                        self.asm.binary("sgt", "t0", "t0", "t1");
                        self.asm.op2("seqz", "t0", "t0");
                    }
                    simple => {
                        self.asm.binary(simple_op_inst(*simple), "t0", "t0", "t1");
                    }
                }
                self.spill(frame, id, "t0")
            }

            ValueKind::Load { src } => {
                match &self.prog.value(*src).kind {
                    ValueKind::GlobalAlloc { .. } => {
                        let name = self.value_name(*src)?;
                        self.asm.la("t0", strip_sigil(&name));
                        self.asm.lw("t0", "t0", 0);
                    }
                    ValueKind::Alloc => {
                        let off = self.slot(frame, *src)?;
                        self.asm.lw("t0", "sp", off);
                    }
                    // The slot holds a pointer; chase it.
                    _ => {
                        let off = self.slot(frame, *src)?;
                        self.asm.lw("t0", "sp", off);
                        self.asm.lw("t0", "t0", 0);
                    }
                }
                self.spill(frame, id, "t0")
            }

            ValueKind::Store { value, dest } => {
                self.materialize(frame, *value, "t0")?;
                match &self.prog.value(*dest).kind {
                    ValueKind::GlobalAlloc { .. } => {
                        let name = self.value_name(*dest)?;
                        self.asm.la("t1", strip_sigil(&name));
                        self.asm.sw("t0", "t1", 0);
                    }
                    ValueKind::Alloc => {
                        let off = self.slot(frame, *dest)?;
                        self.asm.sw("t0", "sp", off);
                    }
                    _ => {
                        let off = self.slot(frame, *dest)?;
                        self.asm.lw("t1", "sp", off);
                        self.asm.sw("t0", "t1", 0);
                    }
                }
                Ok(())
            }

            ValueKind::Branch {
                cond,
                then_bb,
                else_bb,
            } => {
                self.materialize(frame, *cond, "t0")?;
                // bnez alone reaches only +-4 KB; branch to a local
                // trampoline and let unconditional jumps cover the rest.
                let tmp = format!(".L{}", self.branch_labels);
                self.branch_labels += 1;
                self.asm.bnez("t0", &tmp);
                self.asm.jump(strip_sigil(&func.bbs[*else_bb].name));
                self.asm.label(&tmp);
                self.asm.jump(strip_sigil(&func.bbs[*then_bb].name));
                Ok(())
            }

            ValueKind::Jump { target } => {
                self.asm.jump(strip_sigil(&func.bbs[*target].name));
                Ok(())
            }

            ValueKind::Call { callee, ret, args } => {
                for (i, &arg) in args.iter().enumerate() {
                    if i < 8 {
                        self.materialize(frame, arg, &format!("a{}", i))?;
                    } else {
                        self.materialize(frame, arg, "t0")?;
                        self.asm.sw("t0", "sp", ((i - 8) * 4) as i32);
                    }
                }
                self.asm.call(strip_sigil(callee));
                if *ret == Type::Int32 {
                    self.spill(frame, id, "a0")?;
                }
                Ok(())
            }

            ValueKind::Return { value } => {
                if let Some(v) = value {
                    self.materialize(frame, *v, "a0")?;
                }
                if frame.saves_ra() {
                    self.asm.lw("ra", "sp", frame.ra_offset());
                }
                if frame.delta > 0 {
                    self.asm.adjust_sp(frame.delta as i32);
                }
                self.asm.ret();
                Ok(())
            }

            ValueKind::GetElemPtr { src, index } => {
                let stride = match self.prog.value(*src).ty.pointee() {
                    Some(Type::Array(base, _)) => base.size(),
                    _ => {
                        return Err(CodeGenError(
                            "getelemptr source is not a pointer to an array".to_string(),
                        ));
                    }
                };
                self.emit_pointer_offset(frame, id, *src, *index, stride)
            }

            ValueKind::GetPtr { src, index } => {
                let stride = match self.prog.value(*src).ty.pointee() {
                    Some(pointee) => pointee.size(),
                    None => {
                        return Err(CodeGenError("getptr source is not a pointer".to_string()));
                    }
                };
                self.emit_pointer_offset(frame, id, *src, *index, stride)
            }

            // Integers, argument references and initializers are operands,
            // never standalone instructions.
            _ => Ok(()),
        }
    }

    /// `base + index * stride` into this value's slot.
    fn emit_pointer_offset(
        &mut self,
        frame: &FrameLayout,
        id: ValueId,
        src: ValueId,
        index: ValueId,
        stride: usize,
    ) -> Result<(), CodeGenError> {
        self.materialize(frame, src, "t0")?;
        self.materialize(frame, index, "t1")?;
        self.asm.li("t2", stride as i32);
        self.asm.binary("mul", "t1", "t1", "t2");
        self.asm.binary("add", "t0", "t0", "t1");
        self.spill(frame, id, "t0")
    }

    /// Bring the value of `id` into `reg`: constants via `li`, argument
    /// registers via `mv` (or the caller's frame for arguments 9..),
    /// addresses of allocs and globals, and everything else from its slot.
    fn materialize(
        &mut self,
        frame: &FrameLayout,
        id: ValueId,
        reg: &str,
    ) -> Result<(), CodeGenError> {
        match &self.prog.value(id).kind {
            ValueKind::Integer(n) => {
                self.asm.li(reg, *n);
                Ok(())
            }
            ValueKind::FuncArgRef(i) => {
                if *i < 8 {
                    self.asm.mv(reg, &format!("a{}", i));
                } else {
                    let off = frame.delta as i32 + ((i - 8) * 4) as i32;
                    self.asm.lw(reg, "sp", off);
                }
                Ok(())
            }
            ValueKind::GlobalAlloc { .. } => {
                let name = self.value_name(id)?;
                self.asm.la(reg, strip_sigil(&name));
                Ok(())
            }
            ValueKind::Alloc => {
                let off = self.slot(frame, id)?;
                if imm12(off) {
                    self.asm.binary("addi", reg, "sp", &off.to_string());
                } else {
                    self.asm.li(reg, off);
                    self.asm.binary("add", reg, "sp", reg);
                }
                Ok(())
            }
            _ => {
                let off = self.slot(frame, id)?;
                self.asm.lw(reg, "sp", off);
                Ok(())
            }
        }
    }

    fn spill(&mut self, frame: &FrameLayout, id: ValueId, reg: &str) -> Result<(), CodeGenError> {
        let off = self.slot(frame, id)?;
        self.asm.sw(reg, "sp", off);
        Ok(())
    }

    fn slot(&self, frame: &FrameLayout, id: ValueId) -> Result<i32, CodeGenError> {
        frame.offset(id).ok_or_else(|| {
            CodeGenError(format!(
                "value {:?} has no stack slot",
                self.prog.value(id).name
            ))
        })
    }

    fn value_name(&self, id: ValueId) -> Result<String, CodeGenError> {
        self.prog
            .value(id)
            .name
            .clone()
            .ok_or_else(|| CodeGenError("expected a named value".to_string()))
    }
}

fn simple_op_inst(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Mod => "rem",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::Xor => "xor",
        BinaryOp::Shl => "sll",
        BinaryOp::Shr => "srl",
        BinaryOp::Sar => "sra",
        BinaryOp::Lt => "slt",
        BinaryOp::Gt => "sgt",
        BinaryOp::NotEq | BinaryOp::Eq | BinaryOp::Ge | BinaryOp::Le => {
            unreachable!("composite comparisons are expanded inline")
        }
    }
}
