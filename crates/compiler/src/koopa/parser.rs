//! Koopa IR text parser.
//!
//! Consumes the dialect the IR writer emits (and nothing more general):
//! `decl` lines, `global` allocations, `fun` bodies with column-0 labels
//! and two-space indented instructions. Every named operand is resolved
//! through the per-function environment or the global one, every value is
//! typed, and the block structure is verified while building. A failure
//! here means the writer produced bad text, so errors carry the offending
//! line verbatim.

use super::{
    BasicBlock, BinaryOp, FuncDecl, Function, Program, Type, ValueData, ValueId, ValueKind,
};
use std::collections::HashMap;

pub fn parse_program(text: &str) -> Result<Program, String> {
    let mut prog = Program::new();
    let mut globals: HashMap<String, ValueId> = HashMap::new();
    // Known signatures: declarations plus every function seen so far.
    let mut sigs: HashMap<String, Type> = HashMap::new();

    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("decl ") {
            let decl = parse_decl(rest).map_err(|e| err_on(line, &e))?;
            sigs.insert(decl.name.clone(), decl.ret.clone());
            prog.decls.push(decl);
            i += 1;
        } else if let Some(rest) = trimmed.strip_prefix("global ") {
            parse_global(&mut prog, &mut globals, rest).map_err(|e| err_on(line, &e))?;
            i += 1;
        } else if trimmed.starts_with("fun ") {
            i = parse_fun(&mut prog, &globals, &mut sigs, &lines, i)?;
        } else {
            return Err(err_on(line, "unrecognized top-level form"));
        }
    }
    Ok(prog)
}

fn err_on(line: &str, message: &str) -> String {
    format!("IR parse error: {} in '{}'", message, line.trim())
}

// ----- types and initializers -----

/// Parse one type from the front of `s`, returning the remainder.
fn parse_type(s: &str) -> Result<(Type, &str), String> {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix("i32") {
        Ok((Type::Int32, rest))
    } else if let Some(rest) = s.strip_prefix('*') {
        let (base, rest) = parse_type(rest)?;
        Ok((Type::pointer(base), rest))
    } else if let Some(rest) = s.strip_prefix('[') {
        let (base, rest) = parse_type(rest)?;
        let rest = rest
            .trim_start()
            .strip_prefix(',')
            .ok_or_else(|| "expected ',' in array type".to_string())?;
        let rest = rest.trim_start();
        let end = rest
            .find(']')
            .ok_or_else(|| "expected ']' in array type".to_string())?;
        let len: usize = rest[..end]
            .trim()
            .parse()
            .map_err(|_| "bad array length".to_string())?;
        Ok((Type::array(base, len), &rest[end + 1..]))
    } else {
        Err(format!("expected type at '{}'", s))
    }
}

/// Parse a global initializer of the given type from the front of `s`.
fn parse_init<'a>(
    prog: &mut Program,
    s: &'a str,
    ty: &Type,
) -> Result<(ValueId, &'a str), String> {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix("zeroinit") {
        let id = prog.add_value(ValueData {
            name: None,
            ty: ty.clone(),
            kind: ValueKind::ZeroInit,
        });
        return Ok((id, rest));
    }
    if let Some(mut rest) = s.strip_prefix('{') {
        let (base, len) = match ty {
            Type::Array(base, len) => (base.as_ref(), *len),
            other => return Err(format!("aggregate initializer for non-array type {}", other)),
        };
        let mut elems = Vec::with_capacity(len);
        for k in 0..len {
            if k > 0 {
                rest = rest
                    .trim_start()
                    .strip_prefix(',')
                    .ok_or_else(|| "expected ',' in aggregate".to_string())?;
            }
            let (elem, r) = parse_init(prog, rest, base)?;
            elems.push(elem);
            rest = r;
        }
        let rest = rest
            .trim_start()
            .strip_prefix('}')
            .ok_or_else(|| "expected '}' closing aggregate".to_string())?;
        let id = prog.add_value(ValueData {
            name: None,
            ty: ty.clone(),
            kind: ValueKind::Aggregate { elems },
        });
        return Ok((id, rest));
    }
    // Integer leaf.
    let end = s
        .char_indices()
        .find(|&(k, c)| !(c == '-' && k == 0) && !c.is_ascii_digit())
        .map(|(k, _)| k)
        .unwrap_or(s.len());
    let value: i32 = s[..end]
        .parse()
        .map_err(|_| format!("expected integer initializer at '{}'", s))?;
    let id = prog.add_value(ValueData {
        name: None,
        ty: Type::Int32,
        kind: ValueKind::Integer(value),
    });
    Ok((id, &s[end..]))
}

// ----- top-level forms -----

/// `@getarray(*i32): i32`
fn parse_decl(rest: &str) -> Result<FuncDecl, String> {
    let open = rest
        .find('(')
        .ok_or_else(|| "expected '(' in declaration".to_string())?;
    let name = rest[..open].trim().to_string();
    if !name.starts_with('@') {
        return Err(format!("function name '{}' must start with '@'", name));
    }
    let rest = &rest[open + 1..];

    let mut params = Vec::new();
    let mut cursor = rest.trim_start();
    if !cursor.starts_with(')') {
        loop {
            let (ty, r) = parse_type(cursor)?;
            params.push(ty);
            cursor = r.trim_start();
            if let Some(r) = cursor.strip_prefix(',') {
                cursor = r.trim_start();
            } else {
                break;
            }
        }
    }
    let cursor = cursor
        .strip_prefix(')')
        .ok_or_else(|| "expected ')' in declaration".to_string())?;

    let ret = match cursor.trim().strip_prefix(':') {
        Some(r) => parse_type(r)?.0,
        None => Type::Unit,
    };
    Ok(FuncDecl { name, params, ret })
}

/// `@a_0 = alloc [[i32, 3], 2], {{1, 2, 3}, {4, 5, 6}}`
fn parse_global(
    prog: &mut Program,
    globals: &mut HashMap<String, ValueId>,
    rest: &str,
) -> Result<(), String> {
    let (name, rest) = rest
        .split_once(" = alloc ")
        .ok_or_else(|| "expected '= alloc' in global".to_string())?;
    let name = name.trim().to_string();
    let (ty, rest) = parse_type(rest)?;
    let rest = rest
        .trim_start()
        .strip_prefix(',')
        .ok_or_else(|| "expected ',' before global initializer".to_string())?;
    let (init, rest) = parse_init(prog, rest, &ty)?;
    if !rest.trim().is_empty() {
        return Err(format!("trailing text after initializer: '{}'", rest));
    }

    let id = prog.add_value(ValueData {
        name: Some(name.clone()),
        ty: Type::pointer(ty),
        kind: ValueKind::GlobalAlloc { init },
    });
    if globals.insert(name.clone(), id).is_some() {
        return Err(format!("global '{}' defined twice", name));
    }
    prog.globals.push(id);
    Ok(())
}

// ----- functions -----

struct FuncEnv<'a> {
    globals: &'a HashMap<String, ValueId>,
    locals: HashMap<String, ValueId>,
    blocks: HashMap<String, usize>,
}

impl FuncEnv<'_> {
    fn resolve(&self, prog: &mut Program, token: &str) -> Result<ValueId, String> {
        let token = token.trim();
        if token
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '-')
        {
            let value: i32 = token
                .parse()
                .map_err(|_| format!("bad integer operand '{}'", token))?;
            return Ok(prog.add_value(ValueData {
                name: None,
                ty: Type::Int32,
                kind: ValueKind::Integer(value),
            }));
        }
        self.locals
            .get(token)
            .or_else(|| self.globals.get(token))
            .copied()
            .ok_or_else(|| format!("unknown value '{}'", token))
    }

    fn define(&mut self, name: &str, id: ValueId) -> Result<(), String> {
        if self.locals.insert(name.to_string(), id).is_some() {
            return Err(format!("value '{}' defined twice", name));
        }
        Ok(())
    }

    fn block(&self, label: &str) -> Result<usize, String> {
        self.blocks
            .get(label.trim())
            .copied()
            .ok_or_else(|| format!("unknown basic block '{}'", label.trim()))
    }
}

/// Parse a `fun` starting at `lines[start]`; returns the index just past
/// the closing `}`.
fn parse_fun(
    prog: &mut Program,
    globals: &HashMap<String, ValueId>,
    sigs: &mut HashMap<String, Type>,
    lines: &[&str],
    start: usize,
) -> Result<usize, String> {
    let header = lines[start].trim();
    let rest = header
        .strip_prefix("fun ")
        .and_then(|r| r.strip_suffix('{'))
        .ok_or_else(|| err_on(header, "malformed function header"))?
        .trim();

    let open = rest
        .find('(')
        .ok_or_else(|| err_on(header, "expected '(' in function header"))?;
    let close = rest
        .rfind(')')
        .ok_or_else(|| err_on(header, "expected ')' in function header"))?;
    let name = rest[..open].trim().to_string();
    let ret = match rest[close + 1..].trim().strip_prefix(':') {
        Some(r) => parse_type(r).map_err(|e| err_on(header, &e))?.0,
        None => Type::Unit,
    };

    let mut env = FuncEnv {
        globals,
        locals: HashMap::new(),
        blocks: HashMap::new(),
    };
    let mut params = Vec::new();
    for (idx, piece) in split_top_level(&rest[open + 1..close]).into_iter().enumerate() {
        let (pname, pty) = piece
            .split_once(':')
            .ok_or_else(|| err_on(header, "expected ':' in parameter"))?;
        let (ty, leftover) = parse_type(pty).map_err(|e| err_on(header, &e))?;
        if !leftover.trim().is_empty() {
            return Err(err_on(header, "trailing text after parameter type"));
        }
        let id = prog.add_value(ValueData {
            name: Some(pname.trim().to_string()),
            ty,
            kind: ValueKind::FuncArgRef(idx),
        });
        env.define(pname.trim(), id).map_err(|e| err_on(header, &e))?;
        params.push(id);
    }

    sigs.insert(name.clone(), ret.clone());

    // Find the function body and collect block labels first, so branches
    // can refer forward.
    let mut end = start + 1;
    while end < lines.len() && lines[end].trim_end() != "}" {
        end += 1;
    }
    if end == lines.len() {
        return Err(err_on(header, "unterminated function body"));
    }

    let mut bbs = Vec::new();
    for line in &lines[start + 1..end] {
        let t = line.trim_end();
        if !t.starts_with(' ')
            && let Some(label) = t.strip_suffix(':')
        {
            env.blocks.insert(label.to_string(), bbs.len());
            bbs.push(BasicBlock {
                name: label.to_string(),
                insts: Vec::new(),
            });
        }
    }
    if bbs.is_empty() {
        return Err(err_on(header, "function has no basic blocks"));
    }

    let mut current: Option<usize> = None;
    for line in &lines[start + 1..end] {
        let t = line.trim_end();
        if t.trim().is_empty() {
            continue;
        }
        if !t.starts_with(' ') {
            let label = t
                .strip_suffix(':')
                .ok_or_else(|| err_on(t, "expected a label"))?;
            current = Some(env.block(label).map_err(|e| err_on(t, &e))?);
            continue;
        }
        let bb = current.ok_or_else(|| err_on(t, "instruction before first label"))?;
        let inst = parse_inst(prog, &mut env, sigs, t.trim()).map_err(|e| err_on(t, &e))?;
        bbs[bb].insts.push(inst);
    }

    // Exactly one terminator per block, in last position.
    for bb in &bbs {
        match bb.insts.last() {
            Some(&last) if prog.value(last).kind.is_terminator() => {}
            _ => {
                return Err(format!(
                    "basic block '{}' of function '{}' does not end in a terminator",
                    bb.name, name
                ));
            }
        }
        for &inst in &bb.insts[..bb.insts.len() - 1] {
            if prog.value(inst).kind.is_terminator() {
                return Err(format!(
                    "basic block '{}' of function '{}' has a terminator before its end",
                    bb.name, name
                ));
            }
        }
    }

    prog.funcs.push(Function {
        name,
        params,
        ret,
        bbs,
    });
    Ok(end + 1)
}

fn parse_inst(
    prog: &mut Program,
    env: &mut FuncEnv,
    sigs: &HashMap<String, Type>,
    text: &str,
) -> Result<ValueId, String> {
    // Value-producing forms are `name = ...`.
    if let Some((dest, rhs)) = text.split_once(" = ") {
        let dest = dest.trim();
        let rhs = rhs.trim();

        if let Some(rest) = rhs.strip_prefix("alloc ") {
            let (ty, leftover) = parse_type(rest)?;
            if !leftover.trim().is_empty() {
                return Err("trailing text after alloc type".to_string());
            }
            let id = prog.add_value(ValueData {
                name: Some(dest.to_string()),
                ty: Type::pointer(ty),
                kind: ValueKind::Alloc,
            });
            env.define(dest, id)?;
            return Ok(id);
        }
        if let Some(rest) = rhs.strip_prefix("load ") {
            let src = env.resolve(prog, rest)?;
            let ty = prog
                .value(src)
                .ty
                .pointee()
                .cloned()
                .ok_or_else(|| format!("load from non-pointer '{}'", rest.trim()))?;
            let id = prog.add_value(ValueData {
                name: Some(dest.to_string()),
                ty,
                kind: ValueKind::Load { src },
            });
            env.define(dest, id)?;
            return Ok(id);
        }
        if let Some(rest) = rhs.strip_prefix("getelemptr ") {
            let (src_tok, idx_tok) = split_two(rest)?;
            let src = env.resolve(prog, src_tok)?;
            let index = env.resolve(prog, idx_tok)?;
            let elem = match prog.value(src).ty.pointee() {
                Some(Type::Array(base, _)) => (**base).clone(),
                _ => {
                    return Err(format!(
                        "getelemptr on '{}', which is not a pointer to an array",
                        src_tok
                    ));
                }
            };
            let id = prog.add_value(ValueData {
                name: Some(dest.to_string()),
                ty: Type::pointer(elem),
                kind: ValueKind::GetElemPtr { src, index },
            });
            env.define(dest, id)?;
            return Ok(id);
        }
        if let Some(rest) = rhs.strip_prefix("getptr ") {
            let (src_tok, idx_tok) = split_two(rest)?;
            let src = env.resolve(prog, src_tok)?;
            let index = env.resolve(prog, idx_tok)?;
            let ty = prog.value(src).ty.clone();
            if ty.pointee().is_none() {
                return Err(format!("getptr on non-pointer '{}'", src_tok));
            }
            let id = prog.add_value(ValueData {
                name: Some(dest.to_string()),
                ty,
                kind: ValueKind::GetPtr { src, index },
            });
            env.define(dest, id)?;
            return Ok(id);
        }
        if rhs.starts_with("call ") {
            let (callee, ret, args) = parse_call(prog, env, sigs, rhs)?;
            if ret == Type::Unit {
                return Err(format!("void call to '{}' assigned to '{}'", callee, dest));
            }
            let id = prog.add_value(ValueData {
                name: Some(dest.to_string()),
                ty: ret.clone(),
                kind: ValueKind::Call { callee, ret, args },
            });
            env.define(dest, id)?;
            return Ok(id);
        }
        // Binary operation: `op lhs, rhs`.
        if let Some((op_name, operands)) = rhs.split_once(' ')
            && let Some(op) = BinaryOp::from_name(op_name)
        {
            let (lhs_tok, rhs_tok) = split_two(operands)?;
            let lhs = env.resolve(prog, lhs_tok)?;
            let rhs_id = env.resolve(prog, rhs_tok)?;
            let id = prog.add_value(ValueData {
                name: Some(dest.to_string()),
                ty: Type::Int32,
                kind: ValueKind::Binary {
                    op,
                    lhs,
                    rhs: rhs_id,
                },
            });
            env.define(dest, id)?;
            return Ok(id);
        }
        return Err(format!("unrecognized instruction '{}'", rhs));
    }

    if let Some(rest) = text.strip_prefix("store ") {
        let (val_tok, dest_tok) = split_two(rest)?;
        let value = env.resolve(prog, val_tok)?;
        let dest = env.resolve(prog, dest_tok)?;
        return Ok(prog.add_value(ValueData {
            name: None,
            ty: Type::Unit,
            kind: ValueKind::Store { value, dest },
        }));
    }
    if let Some(rest) = text.strip_prefix("br ") {
        let parts: Vec<&str> = rest.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err("br expects a condition and two labels".to_string());
        }
        let cond = env.resolve(prog, parts[0])?;
        let then_bb = env.block(parts[1])?;
        let else_bb = env.block(parts[2])?;
        return Ok(prog.add_value(ValueData {
            name: None,
            ty: Type::Unit,
            kind: ValueKind::Branch {
                cond,
                then_bb,
                else_bb,
            },
        }));
    }
    if let Some(rest) = text.strip_prefix("jump ") {
        let target = env.block(rest)?;
        return Ok(prog.add_value(ValueData {
            name: None,
            ty: Type::Unit,
            kind: ValueKind::Jump { target },
        }));
    }
    if text == "ret" {
        return Ok(prog.add_value(ValueData {
            name: None,
            ty: Type::Unit,
            kind: ValueKind::Return { value: None },
        }));
    }
    if let Some(rest) = text.strip_prefix("ret ") {
        let value = env.resolve(prog, rest)?;
        return Ok(prog.add_value(ValueData {
            name: None,
            ty: Type::Unit,
            kind: ValueKind::Return { value: Some(value) },
        }));
    }
    if text.starts_with("call ") {
        let (callee, ret, args) = parse_call(prog, env, sigs, text)?;
        return Ok(prog.add_value(ValueData {
            name: None,
            ty: ret.clone(),
            kind: ValueKind::Call { callee, ret, args },
        }));
    }
    Err(format!("unrecognized instruction '{}'", text))
}

fn parse_call(
    prog: &mut Program,
    env: &mut FuncEnv,
    sigs: &HashMap<String, Type>,
    text: &str,
) -> Result<(String, Type, Vec<ValueId>), String> {
    let rest = text.strip_prefix("call ").unwrap_or(text);
    let open = rest
        .find('(')
        .ok_or_else(|| "expected '(' in call".to_string())?;
    let close = rest
        .rfind(')')
        .ok_or_else(|| "expected ')' in call".to_string())?;
    let callee = rest[..open].trim().to_string();
    let ret = sigs
        .get(&callee)
        .cloned()
        .ok_or_else(|| format!("call to unknown function '{}'", callee))?;

    let inner = rest[open + 1..close].trim();
    let mut args = Vec::new();
    if !inner.is_empty() {
        for tok in inner.split(',') {
            args.push(env.resolve(prog, tok)?);
        }
    }
    Ok((callee, ret, args))
}

/// Split `a, b` into two operand tokens.
fn split_two(s: &str) -> Result<(&str, &str), String> {
    s.split_once(',')
        .map(|(a, b)| (a.trim(), b.trim()))
        .ok_or_else(|| format!("expected two comma-separated operands in '{}'", s))
}

/// Split a parameter list on commas that sit outside `[...]` nesting.
fn split_top_level(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
decl @getint(): i32
decl @putint(i32)

global @g_0 = alloc i32, zeroinit
global @a_0 = alloc [[i32, 2], 3], {{1, 2}, {3, 4}, {5, 6}}

fun @main(): i32 {
%entry:
  @x_0 = alloc i32
  store 0, @x_0
  %0 = load @x_0
  %1 = add %0, 1
  store %1, @x_0
  br %1, %then_0, %else_0
%then_0:
  jump %end_0
%else_0:
  jump %end_0
%end_0:
  %2 = call @getint()
  call @putint(%2)
  ret 0
}
";

    #[test]
    fn test_parse_sample_program_shape() {
        let prog = parse_program(SAMPLE).unwrap();
        assert_eq!(prog.decls.len(), 2);
        assert_eq!(prog.globals.len(), 2);
        assert_eq!(prog.funcs.len(), 1);

        let main = &prog.funcs[0];
        assert_eq!(main.name, "@main");
        assert_eq!(main.ret, Type::Int32);
        assert_eq!(main.bbs.len(), 4);
        assert_eq!(main.bbs[0].name, "%entry");
        assert_eq!(main.bbs[0].insts.len(), 6);
    }

    #[test]
    fn test_branch_targets_resolve_forward() {
        let prog = parse_program(SAMPLE).unwrap();
        let main = &prog.funcs[0];
        let br = *main.bbs[0].insts.last().unwrap();
        match prog.value(br).kind {
            ValueKind::Branch {
                then_bb, else_bb, ..
            } => {
                assert_eq!(main.bbs[then_bb].name, "%then_0");
                assert_eq!(main.bbs[else_bb].name, "%else_0");
            }
            ref other => panic!("expected branch, got {:?}", other),
        }
    }

    #[test]
    fn test_global_aggregate_typing() {
        let prog = parse_program(SAMPLE).unwrap();
        let arr = prog.value(prog.globals[1]);
        assert_eq!(arr.name.as_deref(), Some("@a_0"));
        assert_eq!(
            arr.ty,
            Type::pointer(Type::array(Type::array(Type::Int32, 2), 3))
        );
        let init = match arr.kind {
            ValueKind::GlobalAlloc { init } => init,
            ref other => panic!("expected global alloc, got {:?}", other),
        };
        match &prog.value(init).kind {
            ValueKind::Aggregate { elems } => {
                assert_eq!(elems.len(), 3);
                match &prog.value(elems[2]).kind {
                    ValueKind::Aggregate { elems } => {
                        assert!(matches!(
                            prog.value(elems[1]).kind,
                            ValueKind::Integer(6)
                        ));
                    }
                    other => panic!("expected nested aggregate, got {:?}", other),
                }
            }
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn test_call_types_come_from_signatures() {
        let prog = parse_program(SAMPLE).unwrap();
        let main = &prog.funcs[0];
        let insts = &main.bbs[3].insts;
        match &prog.value(insts[0]).kind {
            ValueKind::Call { callee, ret, .. } => {
                assert_eq!(callee, "@getint");
                assert_eq!(*ret, Type::Int32);
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert_eq!(prog.value(insts[0]).ty, Type::Int32);
        match &prog.value(insts[1]).kind {
            ValueKind::Call { callee, ret, .. } => {
                assert_eq!(callee, "@putint");
                assert_eq!(*ret, Type::Unit);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_array_param_and_pointer_walks() {
        let text = "\
fun @f(%p0: *[i32, 3]): i32 {
%entry:
  @a_0 = alloc *[i32, 3]
  store %p0, @a_0
  %0 = load @a_0
  %1 = getptr %0, 2
  %2 = getelemptr %1, 1
  %3 = load %2
  ret %3
}
";
        let prog = parse_program(text).unwrap();
        let f = &prog.funcs[0];
        let insts = &f.bbs[0].insts;

        // Slot holds a pointer to the row array.
        assert_eq!(
            prog.value(insts[0]).ty,
            Type::pointer(Type::pointer(Type::array(Type::Int32, 3)))
        );
        // getptr keeps the pointer type, getelemptr peels the array.
        assert_eq!(
            prog.value(insts[3]).ty,
            Type::pointer(Type::array(Type::Int32, 3))
        );
        assert_eq!(prog.value(insts[4]).ty, Type::pointer(Type::Int32));
        assert_eq!(prog.value(insts[5]).ty, Type::Int32);
    }

    #[test]
    fn test_getelemptr_on_non_array_pointer_is_rejected() {
        let text = "\
fun @main(): i32 {
%entry:
  @x_0 = alloc i32
  %0 = getelemptr @x_0, 0
  ret 0
}
";
        let err = parse_program(text).unwrap_err();
        assert!(err.contains("getelemptr"), "error was: {}", err);
    }

    #[test]
    fn test_block_without_terminator_is_rejected() {
        let text = "\
fun @main(): i32 {
%entry:
  @x_0 = alloc i32
}
";
        let err = parse_program(text).unwrap_err();
        assert!(err.contains("terminator"), "error was: {}", err);
    }

    #[test]
    fn test_terminator_in_the_middle_is_rejected() {
        let text = "\
fun @main(): i32 {
%entry:
  ret 0
  ret 1
}
";
        let err = parse_program(text).unwrap_err();
        assert!(err.contains("terminator"), "error was: {}", err);
    }

    #[test]
    fn test_negative_integer_operands() {
        let text = "\
fun @main(): i32 {
%entry:
  %0 = add -5, 7
  ret %0
}
";
        let prog = parse_program(text).unwrap();
        let add = prog.funcs[0].bbs[0].insts[0];
        match prog.value(add).kind {
            ValueKind::Binary { lhs, .. } => {
                assert!(matches!(prog.value(lhs).kind, ValueKind::Integer(-5)));
            }
            ref other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operand_is_rejected() {
        let text = "\
fun @main(): i32 {
%entry:
  %0 = add %missing, 1
  ret %0
}
";
        assert!(parse_program(text).is_err());
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!(parse_type("i32").unwrap().0, Type::Int32);
        assert_eq!(
            parse_type("*[i32, 4]").unwrap().0,
            Type::pointer(Type::array(Type::Int32, 4))
        );
        assert_eq!(
            parse_type("[[i32, 2], 3]").unwrap().0,
            Type::array(Type::array(Type::Int32, 2), 3)
        );
        assert!(parse_type("float").is_err());
    }
}
