//! The struct cloner (spec §4.2).
//!
//! Builds a "pointer-free twin" of a struct type — same layout, but every
//! pointer field replaced by integer padding of the same width — and emits
//! the IR that copies every non-pointer scalar field from an instance of the
//! original into a fresh stack allocation of the twin. Pointer fields are
//! left uninitialized in the twin; they are forwarded separately by the
//! by-value-struct marshaller via [`crate::layout::PointerInfo`].

use crate::error::RewriteError;
use launchpatch_ir::cursor::Cursor;
use launchpatch_ir::{Module, StructData, StructRef, Type};

/// Builds pointer-free twins of struct types, caching each twin by the
/// `StructRef` it was derived from so repeated marshalling of the same
/// struct type reuses one twin declaration instead of redeclaring it.
#[derive(Default)]
pub struct StructCloner {
    twins: std::collections::HashMap<StructRef, StructRef>,
}

impl StructCloner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or build the pointer-free twin of `original`, recursively cloning
    /// any nested struct fields so their embedded pointers are padded out
    /// too. Fails with `UnsupportedStructShape` if a field kind can't be
    /// represented in a twin (none currently can't be — every field kind
    /// this IR has is representable — but the hook exists for parity with
    /// the source, which rejects shapes its cloner doesn't understand).
    pub fn clone_no_pointers(
        &mut self,
        module: &mut Module,
        original: StructRef,
    ) -> Result<StructRef, RewriteError> {
        if let Some(existing) = self.twins.get(&original) {
            return Ok(*existing);
        }
        let pointer_width_bits = module.data_layout.pointer_size * 8;
        let data: StructData = module.structs.get(original).clone();
        let mut twin_fields = Vec::with_capacity(data.fields.len());
        for field in &data.fields {
            let twin_field = match field {
                Type::Pointer(_) => Type::Int(pointer_width_bits),
                Type::Struct(inner) => Type::Struct(self.clone_no_pointers(module, *inner)?),
                other => other.clone(),
            };
            twin_fields.push(twin_field);
        }
        let twin = module.structs.declare(None, twin_fields);
        self.twins.insert(original, twin);
        Ok(twin)
    }
}

/// Emit IR copying every non-pointer leaf of `src` (a pointer to `original`)
/// into the corresponding field of `dst` (a pointer to `twin`), in
/// depth-first field order. Pointer leaves are skipped: the twin's
/// corresponding bytes are left uninitialized, to be filled in by the
/// runtime's buffer-binding entry point instead.
pub fn emit_field_copy(
    cursor: &mut Cursor,
    module: &Module,
    original: &Type,
    twin: &Type,
    src: launchpatch_ir::Value,
    dst: launchpatch_ir::Value,
) {
    let mut path = Vec::new();
    copy_leaves(cursor, module, original, twin, src, dst, &mut path);
}

fn copy_leaves(
    cursor: &mut Cursor,
    module: &Module,
    original: &Type,
    twin: &Type,
    src: launchpatch_ir::Value,
    dst: launchpatch_ir::Value,
    path: &mut Vec<i64>,
) {
    match (original, twin) {
        (Type::Struct(orig_ref), Type::Struct(twin_ref)) => {
            let orig_fields = module.structs.get(*orig_ref).fields.clone();
            let twin_fields = module.structs.get(*twin_ref).fields.clone();
            for (index, (orig_field, twin_field)) in
                orig_fields.iter().zip(twin_fields.iter()).enumerate()
            {
                path.push(index as i64);
                copy_leaves(cursor, module, orig_field, twin_field, src, dst, path);
                path.pop();
            }
        }
        (Type::Pointer(_), _) => {
            // Pointer leaves are forwarded separately; the twin's matching
            // bytes are left uninitialized.
        }
        (leaf, _) => {
            let leaf = leaf.clone();
            let src_field = cursor.gep(src, original.clone(), path.clone(), leaf.clone());
            let dst_field = cursor.gep(dst, twin.clone(), path.clone(), leaf.clone());
            let value = cursor.load(src_field, leaf);
            cursor.store(value, dst_field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpatch_ir::{Function, Signature};

    #[test]
    fn twin_has_same_size_as_original() {
        let mut module = Module::new();
        let s = module
            .structs
            .declare(None, vec![Type::i32(), Type::pointer_to(Type::Float32)]);
        let mut cloner = StructCloner::new();
        let twin = cloner.clone_no_pointers(&mut module, s).unwrap();
        let orig_size = module.data_layout.size_of(&Type::Struct(s), &module.structs);
        let twin_size = module
            .data_layout
            .size_of(&Type::Struct(twin), &module.structs);
        assert_eq!(orig_size, twin_size);
    }

    #[test]
    fn twin_is_cached_across_calls() {
        let mut module = Module::new();
        let s = module.structs.declare(None, vec![Type::pointer_to(Type::i32())]);
        let mut cloner = StructCloner::new();
        let t1 = cloner.clone_no_pointers(&mut module, s).unwrap();
        let t2 = cloner.clone_no_pointers(&mut module, s).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn field_copy_skips_pointer_leaves() {
        let mut module = Module::new();
        let s = module
            .structs
            .declare(None, vec![Type::i32(), Type::pointer_to(Type::Float32)]);
        let mut cloner = StructCloner::new();
        let twin = cloner.clone_no_pointers(&mut module, s).unwrap();

        let mut func = Function::new("f", Signature::default());
        let block = func.create_block();
        let entry = func
            .dfg
            .make_inst(launchpatch_ir::InstructionData::Unreachable);
        func.layout.append_inst(entry, block);

        let mut cursor = Cursor::after(&mut func, entry);
        let src = cursor.alloca(Type::Struct(s));
        let dst = cursor.alloca(Type::Struct(twin));
        emit_field_copy(
            &mut cursor,
            &module,
            &Type::Struct(s),
            &Type::Struct(twin),
            src,
            dst,
        );
        // One gep+load+gep+store quartet for the single non-pointer field.
        let insts: Vec<_> = func.layout.block_insts(block).collect();
        assert_eq!(insts.len(), 1 /*unreachable*/ + 2 /*allocas*/ + 4);
    }
}
