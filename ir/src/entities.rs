//! Opaque entity references used throughout the IR.
//!
//! Instructions reference other parts of a function (other instructions, blocks,
//! globals, called functions, struct definitions) through small `u32`-backed
//! handles rather than Rust references, so that a [`Function`](crate::function::Function)
//! can be freely walked and mutated without fighting the borrow checker. Each
//! entity kind gets its own type so a `Value` can never be confused for an `Inst`.

use cranelift_entity::entity_impl;

/// A reference to an SSA value: an instruction result, a block parameter, or a
/// global address.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A reference to an instruction in a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A reference to a basic block.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A reference to an interned struct type, resolved through a [`StructPool`](crate::types::StructPool).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructRef(u32);
entity_impl!(StructRef, "struct");

/// A reference to a module-level global (a string constant, in practice).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalRef(u32);
entity_impl!(GlobalRef, "gv");

/// A reference to an external function symbol (a runtime entry point or a
/// device-side kernel function).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncRef(u32);
entity_impl!(FuncRef, "fn");
