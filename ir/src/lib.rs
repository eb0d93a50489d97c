//! `launchpatch-ir`: a small typed SSA intermediate representation.
//!
//! Modeled on Cranelift's `ir`/`cursor`/`layout` split (entity-indexed
//! storage, a separate layout for ordering, a cursor for emission) but with
//! an LLVM-flavored type system — pointers, structs and vectors are first
//! class — since the rewriter this crate supports needs to reason about
//! memory layout, not just register-sized SSA values.

pub mod cursor;
pub mod dfg;
pub mod entities;
pub mod function;
pub mod layout;
pub mod module;
pub mod types;
pub mod verifier;
pub mod write;

pub use dfg::{CallKind, DataFlowGraph, InstructionData, ValueDef};
pub use entities::{Block, FuncRef, GlobalRef, Inst, StructRef, Value};
pub use function::{Function, Signature};
pub use module::Module;
pub use types::{DataLayout, StructData, StructPool, Type};
