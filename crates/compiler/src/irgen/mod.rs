//! AST lowering to Koopa IR text.
//!
//! A single [`IrGen`] context is threaded through the whole walk. It owns
//! the IR writer, the scoped symbol tables, the loop-label stack and the
//! reachability flag. The flag is the only mechanism that suppresses
//! unreachable code: statements in a dead block are dropped, every label
//! revives the block, every terminator kills it.
//!
//! Expressions lower to value operands, either a decimal literal or a
//! temporary `%k`. Constant contexts (array dimensions, const and global
//! initializers) never lower; they fold through [`IrGen::eval_exp`].

pub mod writer;

use crate::ast::{
    BinaryOp, Block, BlockItem, CompUnit, ConstDef, Decl, Exp, FuncDef, FuncType, InitVal, LVal,
    Stmt, UnaryOp, VarDef,
};
use crate::symbol::{SymbolStack, SymbolType};
use writer::IrWriter;

struct LoopLabels {
    entry: String,
    end: String,
}

pub struct IrGen {
    w: IrWriter,
    symbols: SymbolStack,
    loops: Vec<LoopLabels>,
    alive: bool,
}

/// Lower a translation unit to Koopa IR text.
pub fn generate(unit: &CompUnit) -> Result<String, String> {
    let mut r#gen = IrGen {
        w: IrWriter::new(),
        symbols: SymbolStack::new(),
        loops: Vec::new(),
        alive: true,
    };
    r#gen.lower_comp_unit(unit)?;
    Ok(r#gen.w.finish())
}

impl IrGen {
    fn lower_comp_unit(&mut self, unit: &CompUnit) -> Result<(), String> {
        self.symbols.open_scope();

        self.w.decl_lib_funcs();
        self.symbols.declare_func("getint", true);
        self.symbols.declare_func("getch", true);
        self.symbols.declare_func("getarray", true);
        self.symbols.declare_func("putint", false);
        self.symbols.declare_func("putch", false);
        self.symbols.declare_func("putarray", false);
        self.symbols.declare_func("starttime", false);
        self.symbols.declare_func("stoptime", false);

        for decl in &unit.decls {
            self.lower_decl(decl, true)?;
        }
        self.w.append("\n");

        tracing::debug!(
            globals = unit.decls.len(),
            functions = unit.funcs.len(),
            "lowering translation unit"
        );

        for func in &unit.funcs {
            self.lower_func(func)?;
        }

        self.symbols.close_scope();
        Ok(())
    }

    // ----- declarations -----

    fn lower_decl(&mut self, decl: &Decl, is_global: bool) -> Result<(), String> {
        match decl {
            Decl::Const(c) => {
                for def in &c.defs {
                    self.lower_const_def(def, is_global)?;
                }
            }
            Decl::Var(v) => {
                for def in &v.defs {
                    self.lower_var_def(def, is_global)?;
                }
            }
        }
        Ok(())
    }

    fn lower_const_def(&mut self, def: &ConstDef, is_global: bool) -> Result<(), String> {
        if def.dims.is_empty() {
            let value = match &def.init {
                InitVal::Exp(e) => self.eval_exp(e)?,
                InitVal::List(_) => {
                    return Err(format!("constant '{}' initialized with a list", def.ident));
                }
            };
            self.symbols.declare_int_const(&def.ident, value);
            return Ok(());
        }

        let dims = self.eval_dims(&def.dims)?;
        let name = self.symbols.declare_array(&def.ident, dims.clone(), true);
        let total: usize = dims.iter().map(|&d| d as usize).product();
        let mut buf = vec![String::from("0"); total];
        let items = match &def.init {
            InitVal::List(items) => items,
            InitVal::Exp(_) => {
                return Err(format!(
                    "array constant '{}' initialized with a scalar",
                    def.ident
                ));
            }
        };
        // Constant array elements always fold, locally as well as globally.
        self.fill_init(items, &dims, &mut buf, true)?;

        let ty = IrWriter::array_type(&dims);
        if is_global {
            let init = IrWriter::init_list(&buf, &dims);
            self.w.global_alloc(&name, &ty, &init);
        } else {
            self.w.alloc(&name, &ty);
            self.init_array(&name, &buf, &dims);
        }
        Ok(())
    }

    fn lower_var_def(&mut self, def: &VarDef, is_global: bool) -> Result<(), String> {
        if def.dims.is_empty() {
            let name = self.symbols.declare_int(&def.ident);
            if is_global {
                let init = match &def.init {
                    None => String::from("zeroinit"),
                    Some(InitVal::Exp(e)) => self.eval_exp(e)?.to_string(),
                    Some(InitVal::List(_)) => {
                        return Err(format!("scalar '{}' initialized with a list", def.ident));
                    }
                };
                self.w.global_alloc(&name, "i32", &init);
            } else {
                self.w.alloc(&name, "i32");
                match &def.init {
                    None => {}
                    Some(InitVal::Exp(e)) => {
                        let value = self.lower_exp(e)?;
                        self.w.store(&value, &name);
                    }
                    Some(InitVal::List(_)) => {
                        return Err(format!("scalar '{}' initialized with a list", def.ident));
                    }
                }
            }
            return Ok(());
        }

        let dims = self.eval_dims(&def.dims)?;
        let name = self.symbols.declare_array(&def.ident, dims.clone(), false);
        let ty = IrWriter::array_type(&dims);
        let total: usize = dims.iter().map(|&d| d as usize).product();

        if is_global {
            let mut buf = vec![String::from("0"); total];
            if let Some(init) = &def.init {
                let items = match init {
                    InitVal::List(items) => items,
                    InitVal::Exp(_) => {
                        return Err(format!(
                            "array '{}' initialized with a scalar",
                            def.ident
                        ));
                    }
                };
                self.fill_init(items, &dims, &mut buf, true)?;
            }
            let init = IrWriter::init_list(&buf, &dims);
            self.w.global_alloc(&name, &ty, &init);
        } else {
            self.w.alloc(&name, &ty);
            if let Some(init) = &def.init {
                let items = match init {
                    InitVal::List(items) => items,
                    InitVal::Exp(_) => {
                        return Err(format!(
                            "array '{}' initialized with a scalar",
                            def.ident
                        ));
                    }
                };
                let mut buf = vec![String::from("0"); total];
                self.fill_init(items, &dims, &mut buf, false)?;
                self.init_array(&name, &buf, &dims);
            }
        }
        Ok(())
    }

    fn eval_dims(&mut self, dims: &[Exp]) -> Result<Vec<i32>, String> {
        let mut out = Vec::with_capacity(dims.len());
        for d in dims {
            let n = self.eval_exp(d)?;
            if n <= 0 {
                return Err(format!("array dimension must be positive, got {}", n));
            }
            out.push(n);
        }
        Ok(out)
    }

    /// Fill `buf` (flat, row-major, pre-padded with `"0"`) from a brace
    /// list. A sub-brace aligns to the largest dimension boundary its
    /// cursor position is a multiple of; a brace that would align to the
    /// innermost dimension alone is malformed.
    fn fill_init(
        &mut self,
        items: &[InitVal],
        dims: &[i32],
        buf: &mut [String],
        fold: bool,
    ) -> Result<(), String> {
        let n = dims.len();
        let mut width = vec![0usize; n];
        width[n - 1] = dims[n - 1] as usize;
        for i in (0..n - 1).rev() {
            width[i] = width[i + 1] * dims[i] as usize;
        }

        let mut i = 0usize;
        for item in items {
            match item {
                InitVal::Exp(e) => {
                    buf[i] = if fold {
                        self.eval_exp(e)?.to_string()
                    } else {
                        self.lower_exp(e)?
                    };
                    i += 1;
                }
                InitVal::List(sub) => {
                    if n <= 1 {
                        return Err("braced initializer nested under a one-dimensional array"
                            .to_string());
                    }
                    let j = if i == 0 {
                        1
                    } else {
                        // Largest dimension boundary the cursor sits on.
                        let mut j = n as isize - 1;
                        while j >= 0 && i % width[j as usize] == 0 {
                            j -= 1;
                        }
                        if j == n as isize - 1 {
                            // Not even on an innermost row boundary; the
                            // brace cannot align anywhere.
                            return Err(
                                "braced initializer does not align to a dimension boundary"
                                    .to_string(),
                            );
                        }
                        (j + 1) as usize
                    };
                    self.fill_init(sub, &dims[j..], &mut buf[i..i + width[j]], fold)?;
                    i += width[j];
                }
            }
            if i >= width[0] {
                break;
            }
        }
        Ok(())
    }

    /// Element-wise stores for a local array: one `getelemptr` per index
    /// step and a `store` per leaf, zeros included.
    fn init_array(&mut self, name: &str, buf: &[String], dims: &[i32]) {
        let n = dims[0] as usize;
        if dims.len() == 1 {
            for (i, value) in buf.iter().take(n).enumerate() {
                let ptr = self.symbols.fresh_temp();
                self.w.getelemptr(&ptr, name, &i.to_string());
                self.w.store(value, &ptr);
            }
        } else {
            let width: usize = dims[1..].iter().map(|&d| d as usize).product();
            for i in 0..n {
                let ptr = self.symbols.fresh_temp();
                self.w.getelemptr(&ptr, name, &i.to_string());
                self.init_array(&ptr, &buf[i * width..(i + 1) * width], &dims[1..]);
            }
        }
    }

    // ----- functions -----

    fn lower_func(&mut self, func: &FuncDef) -> Result<(), String> {
        self.symbols.reset_temps();
        let returns_int = func.ret == FuncType::Int;
        self.symbols.declare_func(&func.ident, returns_int);

        // Evaluate parameter shapes before the header: dimension
        // expressions are constants from the enclosing scope.
        let mut param_dims = Vec::with_capacity(func.params.len());
        let mut header = Vec::with_capacity(func.params.len());
        for (i, param) in func.params.iter().enumerate() {
            let raw = format!("%p{}", i);
            match &param.dims {
                None => {
                    header.push((raw, String::from("i32")));
                    param_dims.push(None);
                }
                Some(dims) => {
                    let dims = self.eval_dims(dims)?;
                    header.push((raw, format!("*{}", IrWriter::array_type(&dims))));
                    param_dims.push(Some(dims));
                }
            }
        }

        self.w.fun_header(&format!("@{}", func.ident), &header, returns_int);
        self.start_block("%entry");

        // Parameters land in the function scope; the body block reuses it.
        self.symbols.open_scope();
        for (i, param) in func.params.iter().enumerate() {
            let raw = &header[i].0;
            match &param_dims[i] {
                None => {
                    let name = self.symbols.declare_int(&param.ident);
                    self.w.alloc(&name, "i32");
                    self.w.store(raw, &name);
                }
                Some(dims) => {
                    let mut padded = vec![-1];
                    padded.extend_from_slice(dims);
                    let name = self.symbols.declare_array(&param.ident, padded, false);
                    self.w
                        .alloc(&name, &format!("*{}", IrWriter::array_type(dims)));
                    self.w.store(raw, &name);
                }
            }
        }

        self.lower_block(&func.body, false)?;

        if self.alive {
            if returns_int {
                self.emit_ret(Some("0"));
            } else {
                self.emit_ret(None);
            }
        }
        self.w.fun_end();
        self.symbols.close_scope();
        Ok(())
    }

    fn lower_block(&mut self, block: &Block, new_scope: bool) -> Result<(), String> {
        if new_scope {
            self.symbols.open_scope();
        }
        for item in &block.items {
            match item {
                BlockItem::Decl(d) => {
                    if self.alive {
                        self.lower_decl(d, false)?;
                    }
                }
                BlockItem::Stmt(s) => self.lower_stmt(s)?,
            }
        }
        if new_scope {
            self.symbols.close_scope();
        }
        Ok(())
    }

    // ----- statements -----

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), String> {
        if !self.alive {
            return Ok(());
        }
        match stmt {
            Stmt::Return(exp) => {
                match exp {
                    Some(e) => {
                        let value = self.lower_exp(e)?;
                        self.emit_ret(Some(&value));
                    }
                    None => self.emit_ret(None),
                }
            }
            Stmt::Assign { lval, exp } => {
                let value = self.lower_exp(exp)?;
                let dest = self.lower_lval(lval, true)?;
                self.w.store(&value, &dest);
            }
            Stmt::Block(b) => self.lower_block(b, true)?,
            Stmt::Exp(exp) => {
                if let Some(e) = exp {
                    self.lower_exp(e)?;
                }
            }
            Stmt::While { cond, body } => {
                let entry = self.symbols.fresh_label("while_entry");
                let body_label = self.symbols.fresh_label("while_body");
                let end = self.symbols.fresh_label("while_end");

                self.loops.push(LoopLabels {
                    entry: entry.clone(),
                    end: end.clone(),
                });

                self.emit_jump(&entry);
                self.start_block(&entry);
                let c = self.lower_exp(cond)?;
                self.emit_br(&c, &body_label, &end);

                self.start_block(&body_label);
                self.lower_stmt(body)?;
                if self.alive {
                    self.emit_jump(&entry);
                }

                self.start_block(&end);
                self.loops.pop();
            }
            Stmt::Break => {
                let end = match self.loops.last() {
                    Some(l) => l.end.clone(),
                    None => return Err("break outside of a loop".to_string()),
                };
                self.emit_jump(&end);
            }
            Stmt::Continue => {
                let entry = match self.loops.last() {
                    Some(l) => l.entry.clone(),
                    None => return Err("continue outside of a loop".to_string()),
                };
                self.emit_jump(&entry);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.lower_exp(cond)?;
                let then_label = self.symbols.fresh_label("then");
                let else_label = else_branch
                    .as_ref()
                    .map(|_| self.symbols.fresh_label("else"));
                let end = self.symbols.fresh_label("end");

                let br_false = else_label.as_deref().unwrap_or(&end);
                self.emit_br(&c, &then_label, br_false);

                self.start_block(&then_label);
                self.lower_stmt(then_branch)?;
                if self.alive {
                    self.emit_jump(&end);
                }

                if let (Some(else_stmt), Some(else_label)) = (else_branch, &else_label) {
                    self.start_block(else_label);
                    self.lower_stmt(else_stmt)?;
                    if self.alive {
                        self.emit_jump(&end);
                    }
                }

                self.start_block(&end);
            }
        }
        Ok(())
    }

    // ----- expressions -----

    /// Lower an expression to a value operand: a literal or a `%k` temp.
    fn lower_exp(&mut self, exp: &Exp) -> Result<String, String> {
        match exp {
            Exp::Number(n) => Ok(n.to_string()),
            Exp::LVal(lval) => self.lower_lval(lval, false),
            Exp::Assign { lval, exp } => {
                let value = self.lower_exp(exp)?;
                let dest = self.lower_lval(lval, true)?;
                self.w.store(&value, &dest);
                Ok(value)
            }
            Exp::Call { ident, args } => self.lower_call(ident, args),
            Exp::Unary { op, exp } => {
                let value = self.lower_exp(exp)?;
                match op {
                    UnaryOp::Plus => Ok(value),
                    UnaryOp::Neg => {
                        let dest = self.symbols.fresh_temp();
                        self.w.binary("sub", &dest, "0", &value);
                        Ok(dest)
                    }
                    UnaryOp::Not => {
                        let dest = self.symbols.fresh_temp();
                        self.w.binary("eq", &dest, "0", &value);
                        Ok(dest)
                    }
                }
            }
            Exp::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => self.lower_short_circuit(lhs, rhs, false),
                BinaryOp::Or => self.lower_short_circuit(lhs, rhs, true),
                _ => {
                    let a = self.lower_exp(lhs)?;
                    let b = self.lower_exp(rhs)?;
                    let dest = self.symbols.fresh_temp();
                    self.w.binary(binary_op_name(*op), &dest, &a, &b);
                    Ok(dest)
                }
            },
        }
    }

    /// `a && b` / `a || b` through an in-memory staging slot, so the right
    /// operand only runs when it must.
    fn lower_short_circuit(
        &mut self,
        lhs: &Exp,
        rhs: &Exp,
        is_or: bool,
    ) -> Result<String, String> {
        let slot = self.symbols.fresh_var("sc_res");
        self.w.alloc(&slot, "i32");
        self.w.store(if is_or { "1" } else { "0" }, &slot);

        let a = self.lower_exp(lhs)?;
        let rhs_label = self.symbols.fresh_label("sc_rhs");
        let end = self.symbols.fresh_label("sc_end");

        if is_or {
            // Left operand true: the slot already holds 1.
            self.emit_br(&a, &end, &rhs_label);
        } else {
            self.emit_br(&a, &rhs_label, &end);
        }

        self.start_block(&rhs_label);
        let b = self.lower_exp(rhs)?;
        let norm = self.symbols.fresh_temp();
        self.w.binary("ne", &norm, &b, "0");
        self.w.store(&norm, &slot);
        self.emit_jump(&end);

        self.start_block(&end);
        let result = self.symbols.fresh_temp();
        self.w.load(&result, &slot);
        Ok(result)
    }

    fn lower_call(&mut self, ident: &str, args: &[Exp]) -> Result<String, String> {
        let (name, returns_int) = match self.symbols.lookup(ident) {
            Some(sym) => match sym.ty {
                SymbolType::FuncInt => (sym.name.clone(), true),
                SymbolType::FuncVoid => (sym.name.clone(), false),
                _ => return Err(format!("'{}' is not a function", ident)),
            },
            None => return Err(format!("call to undeclared function '{}'", ident)),
        };

        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            lowered.push(self.lower_exp(arg)?);
        }

        if returns_int {
            let dest = self.symbols.fresh_temp();
            self.w.call(Some(&dest), &name, &lowered);
            Ok(dest)
        } else {
            self.w.call(None, &name, &lowered);
            Ok(String::new())
        }
    }

    /// Lower an lvalue. With `want_addr` the result is a pointer operand
    /// fit for `store`; otherwise it is the loaded value, or the decayed
    /// pointer when an array is named with fewer indices than dimensions.
    fn lower_lval(&mut self, lval: &LVal, want_addr: bool) -> Result<String, String> {
        let sym = self
            .symbols
            .lookup(&lval.ident)
            .ok_or_else(|| format!("undeclared identifier '{}'", lval.ident))?;
        let name = sym.name.clone();
        let ty = sym.ty.clone();

        if lval.indices.is_empty() {
            return match ty {
                SymbolType::IntConst(v) => {
                    if want_addr {
                        Err(format!("cannot assign to constant '{}'", lval.ident))
                    } else {
                        Ok(v.to_string())
                    }
                }
                SymbolType::Int => {
                    if want_addr {
                        Ok(name)
                    } else {
                        let dest = self.symbols.fresh_temp();
                        self.w.load(&dest, &name);
                        Ok(dest)
                    }
                }
                SymbolType::Array { dims, .. } => {
                    // A bare array name decays to a pointer to its first
                    // row; an array parameter already holds that pointer.
                    if dims.first() == Some(&-1) {
                        let dest = self.symbols.fresh_temp();
                        self.w.load(&dest, &name);
                        Ok(dest)
                    } else {
                        let dest = self.symbols.fresh_temp();
                        self.w.getelemptr(&dest, &name, "0");
                        Ok(dest)
                    }
                }
                SymbolType::FuncInt | SymbolType::FuncVoid => {
                    Err(format!("'{}' is a function, not a value", lval.ident))
                }
            };
        }

        let dims = match ty {
            SymbolType::Array { dims, .. } => dims,
            _ => return Err(format!("'{}' is not an array", lval.ident)),
        };

        let mut indices = Vec::with_capacity(lval.indices.len());
        for index in &lval.indices {
            indices.push(self.lower_exp(index)?);
        }
        if indices.len() > dims.len() {
            return Err(format!("too many indices for array '{}'", lval.ident));
        }

        let ptr = if dims.first() == Some(&-1) {
            // Array parameter: the slot holds a pointer, and the first
            // index walks through it with getptr.
            let base = self.symbols.fresh_temp();
            self.w.load(&base, &name);
            let first = self.symbols.fresh_temp();
            self.w.getptr(&first, &base, &indices[0]);
            self.elem_ptr_chain(first, &indices[1..])
        } else {
            self.elem_ptr_chain(name, &indices)
        };

        if indices.len() < dims.len() {
            // Partial indexing: decay the rest to a pointer to its first
            // row, matching the callee's array-parameter convention.
            let decayed = self.symbols.fresh_temp();
            self.w.getelemptr(&decayed, &ptr, "0");
            return Ok(decayed);
        }
        if want_addr {
            return Ok(ptr);
        }
        let dest = self.symbols.fresh_temp();
        self.w.load(&dest, &ptr);
        Ok(dest)
    }

    fn elem_ptr_chain(&mut self, base: String, indices: &[String]) -> String {
        let mut cur = base;
        for index in indices {
            let next = self.symbols.fresh_temp();
            self.w.getelemptr(&next, &cur, index);
            cur = next;
        }
        cur
    }

    // ----- constant evaluation -----

    /// Fold a constant expression with 32-bit wrapping semantics.
    fn eval_exp(&mut self, exp: &Exp) -> Result<i32, String> {
        match exp {
            Exp::Number(n) => Ok(*n),
            Exp::LVal(lval) => {
                if !lval.indices.is_empty() {
                    return Err(format!(
                        "'{}' indexed in a constant expression",
                        lval.ident
                    ));
                }
                match self.symbols.lookup(&lval.ident) {
                    Some(sym) => match sym.ty {
                        SymbolType::IntConst(v) => Ok(v),
                        _ => Err(format!(
                            "'{}' is not a compile-time constant",
                            lval.ident
                        )),
                    },
                    None => Err(format!("undeclared identifier '{}'", lval.ident)),
                }
            }
            Exp::Assign { .. } => Err("assignment in a constant expression".to_string()),
            Exp::Call { ident, .. } => {
                Err(format!("call to '{}' in a constant expression", ident))
            }
            Exp::Unary { op, exp } => {
                let v = self.eval_exp(exp)?;
                Ok(match op {
                    UnaryOp::Plus => v,
                    UnaryOp::Neg => v.wrapping_neg(),
                    UnaryOp::Not => (v == 0) as i32,
                })
            }
            Exp::Binary { op, lhs, rhs } => {
                let a = self.eval_exp(lhs)?;
                let b = self.eval_exp(rhs)?;
                match op {
                    BinaryOp::Add => Ok(a.wrapping_add(b)),
                    BinaryOp::Sub => Ok(a.wrapping_sub(b)),
                    BinaryOp::Mul => Ok(a.wrapping_mul(b)),
                    BinaryOp::Div => {
                        if b == 0 {
                            Err("division by zero in a constant expression".to_string())
                        } else {
                            Ok(a.wrapping_div(b))
                        }
                    }
                    BinaryOp::Mod => {
                        if b == 0 {
                            Err("remainder by zero in a constant expression".to_string())
                        } else {
                            Ok(a.wrapping_rem(b))
                        }
                    }
                    BinaryOp::Lt => Ok((a < b) as i32),
                    BinaryOp::Gt => Ok((a > b) as i32),
                    BinaryOp::Le => Ok((a <= b) as i32),
                    BinaryOp::Ge => Ok((a >= b) as i32),
                    BinaryOp::Eq => Ok((a == b) as i32),
                    BinaryOp::Ne => Ok((a != b) as i32),
                    BinaryOp::And => Ok((a != 0 && b != 0) as i32),
                    BinaryOp::Or => Ok((a != 0 || b != 0) as i32),
                }
            }
        }
    }

    // ----- block liveness -----

    fn start_block(&mut self, label: &str) {
        self.w.label(label);
        self.alive = true;
    }

    fn emit_jump(&mut self, label: &str) {
        self.w.jump(label);
        self.alive = false;
    }

    fn emit_br(&mut self, cond: &str, then_label: &str, else_label: &str) {
        self.w.br(cond, then_label, else_label);
        self.alive = false;
    }

    fn emit_ret(&mut self, value: Option<&str>) {
        self.w.ret(value);
        self.alive = false;
    }
}

fn binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Mod => "mod",
        BinaryOp::Lt => "lt",
        BinaryOp::Gt => "gt",
        BinaryOp::Le => "le",
        BinaryOp::Ge => "ge",
        BinaryOp::Eq => "eq",
        BinaryOp::Ne => "ne",
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops have no single opcode"),
    }
}
