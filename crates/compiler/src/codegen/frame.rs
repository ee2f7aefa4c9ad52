//! Stack-frame planning.
//!
//! Runs before any code is emitted for a function, so every instruction's
//! slot offset is known when the emitter needs it. The frame has three
//! regions, low to high:
//!
//! ```text
//!   sp + 0        A: outgoing arguments 9.. of the largest call
//!   sp + A        S: one slot per value-producing instruction
//!                    (allocs sized by their pointee, others 4 bytes)
//!   sp + delta-4  R: saved ra, present iff the function calls anything
//! ```
//!
//! `delta` is the 16-byte aligned total.

use crate::koopa::{Function, Program, Type, ValueId, ValueKind};
use std::collections::HashMap;

pub struct FrameLayout {
    slots: HashMap<ValueId, usize>,
    a: usize,
    r: usize,
    s: usize,
    pub delta: usize,
}

impl FrameLayout {
    pub fn plan(prog: &Program, func: &Function) -> FrameLayout {
        let mut layout = FrameLayout {
            slots: HashMap::new(),
            a: 0,
            r: 0,
            s: 0,
            delta: 0,
        };

        for bb in &func.bbs {
            for &id in &bb.insts {
                let value = prog.value(id);
                if let ValueKind::Alloc = value.kind {
                    // The slot holds the allocated object itself.
                    let size = value.ty.pointee().map(Type::size).unwrap_or(0);
                    layout.push_slot(id, size);
                    continue;
                }
                if let ValueKind::Call { args, .. } = &value.kind {
                    layout.r = 4;
                    layout.a = layout.a.max(args.len().saturating_sub(8) * 4);
                }
                let size = value.ty.size();
                if size > 0 {
                    layout.push_slot(id, size);
                }
            }
        }

        let total = layout.s + layout.r + layout.a;
        layout.delta = total.div_ceil(16) * 16;
        layout
    }

    fn push_slot(&mut self, id: ValueId, size: usize) {
        self.slots.insert(id, self.s);
        self.s += size;
    }

    /// sp-relative offset of a value's slot. `None` for values that were
    /// never given one (unit-typed results, params, globals).
    pub fn offset(&self, id: ValueId) -> Option<i32> {
        self.slots.get(&id).map(|&s| (s + self.a) as i32)
    }

    /// Offset of the saved `ra`.
    pub fn ra_offset(&self) -> i32 {
        self.delta as i32 - 4
    }

    pub fn saves_ra(&self) -> bool {
        self.r > 0
    }

    #[cfg(test)]
    pub fn regions(&self) -> (usize, usize, usize) {
        (self.a, self.s, self.r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::koopa::parser::parse_program;

    #[test]
    fn test_leaf_function_has_no_ra_slot() {
        let prog = parse_program(
            "\
fun @main(): i32 {
%entry:
  @x_0 = alloc i32
  store 5, @x_0
  %0 = load @x_0
  ret %0
}
",
        )
        .unwrap();
        let layout = FrameLayout::plan(&prog, &prog.funcs[0]);
        let (a, s, r) = layout.regions();
        assert_eq!(a, 0);
        assert_eq!(r, 0);
        // One i32 alloc plus one load result.
        assert_eq!(s, 8);
        assert_eq!(layout.delta, 16);
        assert!(!layout.saves_ra());
    }

    #[test]
    fn test_array_alloc_takes_full_size() {
        let prog = parse_program(
            "\
fun @main(): i32 {
%entry:
  @a_0 = alloc [[i32, 3], 2]
  ret 0
}
",
        )
        .unwrap();
        let layout = FrameLayout::plan(&prog, &prog.funcs[0]);
        let (_, s, _) = layout.regions();
        assert_eq!(s, 24);
        assert_eq!(layout.delta, 32);
    }

    #[test]
    fn test_call_reserves_ra_and_overflow_args() {
        let prog = parse_program(
            "\
decl @f(i32, i32, i32, i32, i32, i32, i32, i32, i32, i32): i32

fun @main(): i32 {
%entry:
  %0 = call @f(1, 2, 3, 4, 5, 6, 7, 8, 9, 10)
  ret %0
}
",
        )
        .unwrap();
        let layout = FrameLayout::plan(&prog, &prog.funcs[0]);
        let (a, s, r) = layout.regions();
        assert_eq!(r, 4);
        // Arguments 9 and 10 spill.
        assert_eq!(a, 8);
        // The call result gets a slot.
        assert_eq!(s, 4);
        assert_eq!(layout.delta, 16);
        assert_eq!(layout.ra_offset(), 12);
        // Local slots sit above the A region.
        assert_eq!(layout.offset(prog.funcs[0].bbs[0].insts[0]), Some(8));
    }

    #[test]
    fn test_delta_is_16_byte_aligned() {
        let prog = parse_program(
            "\
fun @main(): i32 {
%entry:
  @a_0 = alloc [i32, 5]
  ret 0
}
",
        )
        .unwrap();
        let layout = FrameLayout::plan(&prog, &prog.funcs[0]);
        assert_eq!(layout.delta % 16, 0);
        assert!(layout.delta >= 20);
    }

    #[test]
    fn test_unit_values_get_no_slot() {
        let prog = parse_program(
            "\
fun @main(): i32 {
%entry:
  @x_0 = alloc i32
  store 1, @x_0
  ret 0
}
",
        )
        .unwrap();
        let layout = FrameLayout::plan(&prog, &prog.funcs[0]);
        let store = prog.funcs[0].bbs[0].insts[1];
        assert_eq!(layout.offset(store), None);
    }
}
