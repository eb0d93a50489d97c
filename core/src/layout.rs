//! The type layout oracle (spec §4.1).
//!
//! Reports how a type is laid out in memory: its byte size, and for structs,
//! the index path and byte offset of every field that is (transitively) a
//! pointer. The struct cloner and the by-value-struct marshaller both walk
//! this output rather than re-deriving layout themselves.

use launchpatch_ir::{DataLayout, Module, StructPool, Type};

/// One embedded pointer field found by [`walk_struct`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointerInfo {
    /// Byte offset of this field from the base of the struct.
    pub offset: u32,
    /// The pointer's declared type (e.g. `f32*`).
    pub element_type: Type,
    /// Chain of field indices from the outermost struct down to this field.
    pub index_path: Vec<usize>,
}

/// The result of a layout walk over one struct type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructInfo {
    pub total_size: u32,
    pub pointer_infos: Vec<PointerInfo>,
}

impl StructInfo {
    pub fn has_pointers(&self) -> bool {
        !self.pointer_infos.is_empty()
    }
}

/// The size, in bytes, `ty` occupies under `layout`.
pub fn size_of(ty: &Type, layout: &DataLayout, structs: &StructPool) -> u32 {
    layout.size_of(ty, structs)
}

/// Depth-first, field-index-ordered descent over `ty`'s fields, collecting
/// every embedded pointer's offset and index path.
///
/// Arrays of structs are not modeled as a distinct type in this IR (see
/// [`launchpatch_ir::Type`]); a `Vector` field is always of primitive
/// elements and is treated as a single non-pointer leaf, matching the
/// source's "array of struct is one opaque aggregate field" rule.
pub fn walk_struct(ty: &Type, layout: &DataLayout, structs: &StructPool) -> StructInfo {
    let mut info = StructInfo {
        total_size: layout.size_of(ty, structs),
        pointer_infos: Vec::new(),
    };
    let mut path = Vec::new();
    walk(ty, 0, &mut path, layout, structs, &mut info);
    info
}

fn walk(
    ty: &Type,
    base_offset: u32,
    path: &mut Vec<usize>,
    layout: &DataLayout,
    structs: &StructPool,
    info: &mut StructInfo,
) {
    match ty {
        Type::Struct(r) => {
            let mut offset = base_offset;
            for (index, field) in structs.get(*r).fields.iter().enumerate() {
                path.push(index);
                walk(field, offset, path, layout, structs, info);
                path.pop();
                offset += layout.size_of(field, structs);
            }
        }
        Type::Pointer(inner) => {
            info.pointer_infos.push(PointerInfo {
                offset: base_offset,
                element_type: (**inner).clone(),
                index_path: path.clone(),
            });
        }
        _ => {
            // Scalar leaf (or a vector, treated as an opaque aggregate leaf):
            // contributes to size only, already folded into `total_size` above.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpatch_ir::StructPool;

    #[test]
    fn flat_struct_finds_one_pointer() {
        let mut structs = StructPool::new();
        let s = structs.declare(None, vec![Type::i32(), Type::pointer_to(Type::Float32)]);
        let layout = DataLayout::host();
        let info = walk_struct(&Type::Struct(s), &layout, &structs);
        assert_eq!(info.pointer_infos.len(), 1);
        assert_eq!(info.pointer_infos[0].offset, 4);
        assert_eq!(info.pointer_infos[0].index_path, vec![1]);
    }

    #[test]
    fn nested_struct_accumulates_offset_and_path() {
        let mut structs = StructPool::new();
        let inner = structs.declare(None, vec![Type::i32(), Type::pointer_to(Type::i32())]);
        let outer = structs.declare(None, vec![Type::i32(), Type::Struct(inner)]);
        let layout = DataLayout::host();
        let info = walk_struct(&Type::Struct(outer), &layout, &structs);
        assert_eq!(info.pointer_infos.len(), 1);
        assert_eq!(info.pointer_infos[0].offset, 4 + 4);
        assert_eq!(info.pointer_infos[0].index_path, vec![1, 1]);
    }

    #[test]
    fn struct_with_no_pointers_reports_none() {
        let mut structs = StructPool::new();
        let s = structs.declare(None, vec![Type::i32(), Type::Float32]);
        let layout = DataLayout::host();
        let info = walk_struct(&Type::Struct(s), &layout, &structs);
        assert!(!info.has_pointers());
        assert_eq!(info.total_size, 8);
    }
}
