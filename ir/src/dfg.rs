//! The data-flow graph: instruction and value storage for one function.
//!
//! Mirrors Cranelift's split between "what values and instructions exist and
//! what do they reference" (this module) and "what order are they in"
//! ([`crate::layout::Layout`]). Nothing here records ordering, so inserting a
//! value doesn't require threading a cursor through; only placing its
//! defining instruction in the layout does.

use crate::entities::{Block, FuncRef, GlobalRef, Inst, Value};
use crate::types::Type;
use cranelift_entity::{PrimaryMap, SecondaryMap};

/// How a value came to exist.
#[derive(Clone, Debug)]
pub enum ValueDef {
    /// The single result of an instruction.
    Result(Inst),
    /// The `index`-th parameter of `block`.
    Param(Block, u32),
}

#[derive(Clone, Debug)]
struct ValueData {
    ty: Type,
    def: ValueDef,
}

/// Distinguishes an ordinary call from one with exception-style control flow
/// (an "invoke" with a normal-return successor and an unwind successor).
///
/// The source IR models these via two different instruction subclasses with a
/// shared adapter interface; here they are two variants of the same
/// instruction so there is exactly one thing to match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Ordinary,
    Invoke { normal: Block, unwind: Block },
}

impl CallKind {
    pub fn normal_successor(&self) -> Option<Block> {
        match self {
            CallKind::Ordinary => None,
            CallKind::Invoke { normal, .. } => Some(*normal),
        }
    }
}

/// The operation an instruction performs and the values/entities it refers to.
///
/// This is a deliberately small instruction set: just enough to model a
/// front-end's legacy launch sequence and the IR the rewriter synthesizes to
/// replace it. It is not a general-purpose compiler IR.
#[derive(Clone, Debug)]
pub enum InstructionData {
    /// Stack-allocate one value of `ty`, producing a pointer to it.
    Alloca { ty: Type },
    /// Load the value pointed to by `ptr`.
    Load { ptr: Value, ty: Type },
    /// Store `value` through `ptr`.
    Store { value: Value, ptr: Value },
    /// Reinterpret `arg`'s pointer type as `to` without changing the bits.
    BitCast { arg: Value, to: Type },
    /// A constant integer of the given type.
    IConst { ty: Type, imm: i64 },
    /// The address of a module-level global.
    GlobalAddr { global: GlobalRef },
    /// The address of a function symbol, as it appears before being bitcast
    /// to bytes at a `kernel_launch` call site.
    FuncAddr { func: FuncRef },
    /// An in-bounds, constant-index field-address computation, `&base[0][i0][i1]...`.
    Gep {
        base: Value,
        base_ty: Type,
        indices: Vec<i64>,
    },
    /// A direct call to `callee`. `result_ty` is `None` for void calls.
    Call {
        callee: FuncRef,
        args: Vec<Value>,
        kind: CallKind,
        result_ty: Option<Type>,
    },
    /// An unconditional branch to `dest`.
    Br { dest: Block },
    /// Return, optionally with a value.
    Ret { value: Option<Value> },
    /// Marks unreachable code (used only by tests constructing minimal CFGs).
    Unreachable,
}

impl InstructionData {
    /// The symbol this instruction calls, if it is a call.
    pub fn called_func(&self) -> Option<FuncRef> {
        match self {
            InstructionData::Call { callee, .. } => Some(*callee),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct BlockData {
    params: Vec<Value>,
}

/// Values, instructions and blocks, unordered: the "what" of a function,
/// independent of the "where" (see [`crate::layout::Layout`]).
#[derive(Default, Clone)]
pub struct DataFlowGraph {
    values: PrimaryMap<Value, ValueData>,
    insts: PrimaryMap<Inst, InstructionData>,
    results: SecondaryMap<Inst, cranelift_entity::packed_option::PackedOption<Value>>,
    blocks: PrimaryMap<Block, BlockData>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new, empty block.
    pub fn make_block(&mut self) -> Block {
        self.blocks.push(BlockData::default())
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn append_block_param(&mut self, block: Block, ty: Type) -> Value {
        let index = self.blocks[block].params.len() as u32;
        let v = self.values.push(ValueData {
            ty,
            def: ValueDef::Param(block, index),
        });
        self.blocks[block].params.push(v);
        v
    }

    pub fn block_params(&self, block: Block) -> &[Value] {
        &self.blocks[block].params
    }

    /// Insert an instruction with no result value.
    pub fn make_inst(&mut self, data: InstructionData) -> Inst {
        self.insts.push(data)
    }

    /// Insert an instruction and give it a single result of type `ty`.
    pub fn make_inst_result(&mut self, data: InstructionData, ty: Type) -> (Inst, Value) {
        let inst = self.insts.push(data);
        let v = self.values.push(ValueData {
            ty,
            def: ValueDef::Result(inst),
        });
        self.results[inst] = v.into();
        (inst, v)
    }

    pub fn inst_data(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    pub fn inst_data_mut(&mut self, inst: Inst) -> &mut InstructionData {
        &mut self.insts[inst]
    }

    pub fn inst_result(&self, inst: Inst) -> Option<Value> {
        self.results[inst].expand()
    }

    pub fn value_type(&self, v: Value) -> &Type {
        &self.values[v].ty
    }

    pub fn value_def(&self, v: Value) -> &ValueDef {
        &self.values[v].def
    }
}
