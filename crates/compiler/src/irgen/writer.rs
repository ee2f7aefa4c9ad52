//! Append-only Koopa IR text writer.
//!
//! One method per IR form. The writer never validates; block structure,
//! operand types and name uniqueness are the lowering pass's problem.
//! Instructions are indented two spaces, labels sit at column 0.

/// Builds the IR text for one compilation.
pub struct IrWriter {
    buf: String,
}

impl IrWriter {
    pub fn new() -> Self {
        IrWriter { buf: String::new() }
    }

    pub fn finish(self) -> String {
        self.buf
    }

    pub fn append(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    /// The implicit library interface, declared once per compilation.
    pub fn decl_lib_funcs(&mut self) {
        self.append("decl @getint(): i32\n");
        self.append("decl @getch(): i32\n");
        self.append("decl @getarray(*i32): i32\n");
        self.append("decl @putint(i32)\n");
        self.append("decl @putch(i32)\n");
        self.append("decl @putarray(i32, *i32)\n");
        self.append("decl @starttime()\n");
        self.append("decl @stoptime()\n");
        self.append("\n");
    }

    /// `fun @name(%p0: i32, %p1: *[i32, 3]): i32 {`
    pub fn fun_header(&mut self, name: &str, params: &[(String, String)], returns_int: bool) {
        self.buf.push_str("fun ");
        self.buf.push_str(name);
        self.buf.push('(');
        for (i, (pname, ty)) in params.iter().enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            self.buf.push_str(pname);
            self.buf.push_str(": ");
            self.buf.push_str(ty);
        }
        self.buf.push(')');
        if returns_int {
            self.buf.push_str(": i32");
        }
        self.buf.push_str(" {\n");
    }

    pub fn fun_end(&mut self) {
        self.buf.push_str("}\n\n");
    }

    pub fn label(&mut self, name: &str) {
        self.buf.push_str(name);
        self.buf.push_str(":\n");
    }

    pub fn alloc(&mut self, name: &str, ty: &str) {
        self.buf
            .push_str(&format!("  {} = alloc {}\n", name, ty));
    }

    /// `global @a_0 = alloc [i32, 4], {1, 2, 3, 4}` (or `zeroinit`).
    pub fn global_alloc(&mut self, name: &str, ty: &str, init: &str) {
        self.buf
            .push_str(&format!("global {} = alloc {}, {}\n", name, ty, init));
    }

    pub fn load(&mut self, dest: &str, src: &str) {
        self.buf.push_str(&format!("  {} = load {}\n", dest, src));
    }

    pub fn store(&mut self, value: &str, dest: &str) {
        self.buf
            .push_str(&format!("  store {}, {}\n", value, dest));
    }

    pub fn binary(&mut self, op: &str, dest: &str, lhs: &str, rhs: &str) {
        self.buf
            .push_str(&format!("  {} = {} {}, {}\n", dest, op, lhs, rhs));
    }

    pub fn br(&mut self, cond: &str, then_label: &str, else_label: &str) {
        self.buf.push_str(&format!(
            "  br {}, {}, {}\n",
            cond, then_label, else_label
        ));
    }

    pub fn jump(&mut self, label: &str) {
        self.buf.push_str(&format!("  jump {}\n", label));
    }

    /// `ret %0`, or a bare `ret` when `value` is `None`.
    pub fn ret(&mut self, value: Option<&str>) {
        match value {
            Some(v) => self.buf.push_str(&format!("  ret {}\n", v)),
            None => self.buf.push_str("  ret\n"),
        }
    }

    /// `%0 = call @f(%1, 2)`, or a bare call when `dest` is `None`.
    pub fn call(&mut self, dest: Option<&str>, func: &str, args: &[String]) {
        self.buf.push_str("  ");
        if let Some(d) = dest {
            self.buf.push_str(d);
            self.buf.push_str(" = ");
        }
        self.buf.push_str("call ");
        self.buf.push_str(func);
        self.buf.push('(');
        self.buf.push_str(&args.join(", "));
        self.buf.push_str(")\n");
    }

    pub fn getelemptr(&mut self, dest: &str, src: &str, index: &str) {
        self.buf
            .push_str(&format!("  {} = getelemptr {}, {}\n", dest, src, index));
    }

    pub fn getptr(&mut self, dest: &str, src: &str, index: &str) {
        self.buf
            .push_str(&format!("  {} = getptr {}, {}\n", dest, src, index));
    }

    /// Koopa array type for `dims`, wrapped right to left:
    /// `[4, 3, 2]` becomes `[[[i32, 2], 3], 4]`.
    pub fn array_type(dims: &[i32]) -> String {
        let mut ty = String::from("i32");
        for d in dims.iter().rev() {
            ty = format!("[{}, {}]", ty, d);
        }
        ty
    }

    /// Nested brace initializer for a flat row-major `buf` of stringified
    /// elements. The nesting follows `dims` exactly; callers pre-pad the
    /// buffer with `"0"`.
    pub fn init_list(buf: &[String], dims: &[i32]) -> String {
        let mut out = String::from("{");
        if dims.len() == 1 {
            out.push_str(&buf.join(", "));
        } else {
            let width: usize = dims[1..].iter().map(|&d| d as usize).product();
            for i in 0..dims[0] as usize {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&Self::init_list(
                    &buf[i * width..(i + 1) * width],
                    &dims[1..],
                ));
            }
        }
        out.push('}');
        out
    }
}

impl Default for IrWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_type_nests_right_to_left() {
        assert_eq!(IrWriter::array_type(&[]), "i32");
        assert_eq!(IrWriter::array_type(&[4]), "[i32, 4]");
        assert_eq!(IrWriter::array_type(&[4, 3, 2]), "[[[i32, 2], 3], 4]");
    }

    #[test]
    fn test_init_list_nesting() {
        let buf: Vec<String> = (1..=6).map(|n| n.to_string()).collect();
        assert_eq!(
            IrWriter::init_list(&buf, &[2, 3]),
            "{{1, 2, 3}, {4, 5, 6}}"
        );
        assert_eq!(IrWriter::init_list(&buf, &[6]), "{1, 2, 3, 4, 5, 6}");
    }

    #[test]
    fn test_instruction_forms() {
        let mut w = IrWriter::new();
        w.fun_header("@main", &[], true);
        w.label("%entry");
        w.alloc("@x_0", "i32");
        w.store("0", "@x_0");
        w.load("%0", "@x_0");
        w.binary("add", "%1", "%0", "1");
        w.br("%1", "%then_0", "%else_0");
        w.label("%then_0");
        w.call(Some("%2"), "@getint", &[]);
        w.call(None, "@putint", &["%2".to_string()]);
        w.jump("%end_0");
        w.label("%end_0");
        w.ret(Some("0"));
        w.fun_end();

        let text = w.finish();
        assert!(text.starts_with("fun @main(): i32 {\n%entry:\n"));
        assert!(text.contains("  @x_0 = alloc i32\n"));
        assert!(text.contains("  store 0, @x_0\n"));
        assert!(text.contains("  %1 = add %0, 1\n"));
        assert!(text.contains("  br %1, %then_0, %else_0\n"));
        assert!(text.contains("  %2 = call @getint()\n"));
        assert!(text.contains("  call @putint(%2)\n"));
        assert!(text.ends_with("  ret 0\n}\n\n"));
    }
}
