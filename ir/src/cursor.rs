//! An insertion-point cursor for synthesizing instructions.
//!
//! Mirrors Cranelift's `FuncCursor`/`InstBuilder` split: rather than
//! returning raw instruction pointers and reassigning a "last instruction"
//! variable by hand, callers hold a `Cursor` positioned after some anchor
//! instruction and call builder methods on it. Each call inserts one
//! instruction immediately after the cursor's current position and advances
//! the cursor to it, so a chain of calls produces a contiguous, correctly
//! ordered run of IR with no bookkeeping at the call site.

use crate::dfg::{CallKind, InstructionData};
use crate::entities::{Block, FuncRef, GlobalRef, Inst, Value};
use crate::function::Function;
use crate::types::Type;

/// Where the next instruction lands: immediately after an existing
/// instruction, or at the front of a block that has nothing in it yet
/// (or nothing before the point the cursor was asked to target).
enum Anchor {
    After(Inst),
    Front(Block),
}

/// A cursor positioned at one insertion point in one function's layout.
pub struct Cursor<'f> {
    pub func: &'f mut Function,
    anchor: Anchor,
}

impl<'f> Cursor<'f> {
    /// Start inserting immediately after `after`.
    pub fn after(func: &'f mut Function, after: Inst) -> Self {
        debug_assert!(func.layout.inst_block(after).is_some());
        Cursor {
            func,
            anchor: Anchor::After(after),
        }
    }

    /// Start inserting immediately before `before`. Every instruction placed
    /// through this cursor lands before `before` in layout order, in the
    /// order the calls were made.
    pub fn before(func: &'f mut Function, before: Inst) -> Self {
        let anchor = match func.layout.prev_inst(before) {
            Some(prev) => Anchor::After(prev),
            None => {
                let block = func
                    .layout
                    .inst_block(before)
                    .expect("cursor anchor not in layout");
                Anchor::Front(block)
            }
        };
        Cursor { func, anchor }
    }

    /// The instruction most recently inserted, if any has been placed yet
    /// through this cursor.
    pub fn current(&self) -> Option<Inst> {
        match self.anchor {
            Anchor::After(inst) => Some(inst),
            Anchor::Front(_) => None,
        }
    }

    /// The block this cursor is emitting into.
    pub fn block(&self) -> Block {
        match self.anchor {
            Anchor::After(inst) => self
                .func
                .layout
                .inst_block(inst)
                .expect("cursor anchor left the layout"),
            Anchor::Front(block) => block,
        }
    }

    fn place(&mut self, inst: Inst) -> Inst {
        match self.anchor {
            Anchor::After(after) => self.func.layout.insert_inst_after(inst, after),
            Anchor::Front(block) => self.func.layout.prepend_inst(inst, block),
        }
        self.anchor = Anchor::After(inst);
        inst
    }

    fn place_result(&mut self, data: InstructionData, ty: Type) -> Value {
        let (inst, value) = self.func.dfg.make_inst_result(data, ty);
        match self.anchor {
            Anchor::After(after) => self.func.layout.insert_inst_after(inst, after),
            Anchor::Front(block) => self.func.layout.prepend_inst(inst, block),
        }
        self.anchor = Anchor::After(inst);
        value
    }

    /// Stack-allocate one value of `ty`; the result is a pointer to it.
    pub fn alloca(&mut self, ty: Type) -> Value {
        self.place_result(InstructionData::Alloca { ty: ty.clone() }, Type::pointer_to(ty))
    }

    /// Load the value pointed to by `ptr`.
    pub fn load(&mut self, ptr: Value, ty: Type) -> Value {
        self.place_result(InstructionData::Load { ptr, ty: ty.clone() }, ty)
    }

    /// Store `value` through `ptr`.
    pub fn store(&mut self, value: Value, ptr: Value) -> Inst {
        let inst = self.func.dfg.make_inst(InstructionData::Store { value, ptr });
        self.place(inst)
    }

    /// Reinterpret `arg` as type `to`.
    pub fn bitcast(&mut self, arg: Value, to: Type) -> Value {
        self.place_result(InstructionData::BitCast { arg, to: to.clone() }, to)
    }

    /// A constant integer of type `ty`.
    pub fn iconst(&mut self, ty: Type, imm: i64) -> Value {
        self.place_result(InstructionData::IConst { ty: ty.clone(), imm }, ty)
    }

    /// The address of global `global`, as an opaque byte pointer.
    pub fn global_addr(&mut self, global: GlobalRef) -> Value {
        self.place_result(InstructionData::GlobalAddr { global }, Type::opaque_ptr())
    }

    /// An in-bounds field-address computation `&base[0][indices...]`. The
    /// result type is a pointer to the addressed field.
    pub fn gep(&mut self, base: Value, base_ty: Type, indices: Vec<i64>, field_ty: Type) -> Value {
        self.place_result(
            InstructionData::Gep {
                base,
                base_ty,
                indices,
            },
            Type::pointer_to(field_ty),
        )
    }

    /// A direct call with no return value.
    pub fn call_void(&mut self, callee: FuncRef, args: Vec<Value>) -> Inst {
        let inst = self.func.dfg.make_inst(InstructionData::Call {
            callee,
            args,
            kind: CallKind::Ordinary,
            result_ty: None,
        });
        self.place(inst)
    }

    /// An unconditional branch to `dest`.
    pub fn br(&mut self, dest: Block) -> Inst {
        let inst = self.func.dfg.make_inst(InstructionData::Br { dest });
        self.place(inst)
    }
}
