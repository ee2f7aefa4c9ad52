//! RISC-V assembly text writer.
//!
//! Mnemonics are padded to a fixed width so the output column-aligns.
//! The frame-offset helpers own the 12-bit immediate rule: any `lw`/`sw`
//! whose offset falls outside [-2048, 2048) is rewritten through `t3`,
//! and `sp` adjustments outside that range go through `t0`. `t3` is
//! reserved for exactly this patching and must not carry live values.

pub struct AsmWriter {
    buf: String,
}

/// True if `i` fits a 12-bit signed immediate.
pub fn imm12(i: i32) -> bool {
    (-2048..2048).contains(&i)
}

impl AsmWriter {
    pub fn new() -> Self {
        AsmWriter { buf: String::new() }
    }

    pub fn finish(self) -> String {
        self.buf
    }

    pub fn append(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn label(&mut self, name: &str) {
        self.buf.push_str(name);
        self.buf.push_str(":\n");
    }

    pub fn binary(&mut self, op: &str, rd: &str, rs1: &str, rs2: &str) {
        self.buf
            .push_str(&format!("  {:<6}{}, {}, {}\n", op, rd, rs1, rs2));
    }

    /// Two-operand form: `seqz`, `snez`, `bnez` and friends.
    pub fn op2(&mut self, op: &str, a: &str, b: &str) {
        self.buf.push_str(&format!("  {:<6}{}, {}\n", op, a, b));
    }

    pub fn mv(&mut self, rd: &str, rs: &str) {
        self.op2("mv", rd, rs);
    }

    pub fn li(&mut self, rd: &str, imm: i32) {
        self.buf.push_str(&format!("  {:<6}{}, {}\n", "li", rd, imm));
    }

    pub fn la(&mut self, rd: &str, symbol: &str) {
        self.buf
            .push_str(&format!("  {:<6}{}, {}\n", "la", rd, symbol));
    }

    pub fn lw(&mut self, rd: &str, base: &str, offset: i32) {
        if imm12(offset) {
            self.buf
                .push_str(&format!("  {:<6}{}, {}({})\n", "lw", rd, offset, base));
        } else {
            self.li("t3", offset);
            self.binary("add", "t3", "t3", base);
            self.buf
                .push_str(&format!("  {:<6}{}, 0(t3)\n", "lw", rd));
        }
    }

    pub fn sw(&mut self, rs: &str, base: &str, offset: i32) {
        if imm12(offset) {
            self.buf
                .push_str(&format!("  {:<6}{}, {}({})\n", "sw", rs, offset, base));
        } else {
            self.li("t3", offset);
            self.binary("add", "t3", "t3", base);
            self.buf
                .push_str(&format!("  {:<6}{}, 0(t3)\n", "sw", rs));
        }
    }

    pub fn adjust_sp(&mut self, delta: i32) {
        if imm12(delta) {
            self.binary("addi", "sp", "sp", &delta.to_string());
        } else {
            self.li("t0", delta);
            self.binary("add", "sp", "sp", "t0");
        }
    }

    pub fn bnez(&mut self, rs: &str, target: &str) {
        self.op2("bnez", rs, target);
    }

    pub fn jump(&mut self, target: &str) {
        self.buf.push_str(&format!("  {:<6}{}\n", "j", target));
    }

    pub fn call(&mut self, func: &str) {
        self.buf.push_str(&format!("  call {}\n", func));
    }

    pub fn ret(&mut self) {
        self.buf.push_str("  ret\n");
    }

    pub fn word(&mut self, value: i32) {
        self.buf.push_str(&format!("  .word {}\n", value));
    }

    pub fn zero(&mut self, bytes: usize) {
        self.buf.push_str(&format!("  .zero {}\n", bytes));
    }
}

impl Default for AsmWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imm12_bounds() {
        assert!(imm12(0));
        assert!(imm12(-2048));
        assert!(imm12(2047));
        assert!(!imm12(2048));
        assert!(!imm12(-2049));
    }

    #[test]
    fn test_small_offsets_stay_inline() {
        let mut w = AsmWriter::new();
        w.lw("t0", "sp", 12);
        w.sw("t0", "sp", -8);
        let out = w.finish();
        assert_eq!(out, "  lw    t0, 12(sp)\n  sw    t0, -8(sp)\n");
    }

    #[test]
    fn test_large_offsets_go_through_t3() {
        let mut w = AsmWriter::new();
        w.lw("t0", "sp", 4096);
        let out = w.finish();
        assert_eq!(
            out,
            "  li    t3, 4096\n  add   t3, t3, sp\n  lw    t0, 0(t3)\n"
        );
    }

    #[test]
    fn test_sp_adjustment_fallback() {
        let mut w = AsmWriter::new();
        w.adjust_sp(-16);
        w.adjust_sp(-4000);
        let out = w.finish();
        assert!(out.starts_with("  addi  sp, sp, -16\n"));
        assert!(out.contains("  li    t0, -4000\n  add   sp, sp, t0\n"));
    }
}
