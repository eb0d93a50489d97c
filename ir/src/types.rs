//! The type system: integers, floats, pointers, vectors and structs.
//!
//! Unlike Cranelift's scalar `Type`, which only needs to describe SSA value
//! lanes, this IR is rewriting calls whose arguments are laid out in memory
//! (structs with embedded pointers, fixed-width vectors passed by value), so
//! the type system carries that structure explicitly.

use crate::entities::StructRef;
use cranelift_entity::PrimaryMap;
use std::collections::HashMap;
use std::fmt;

/// A type attached to an IR value or declared on a function parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// `void`, the type of an instruction with no result.
    Void,
    /// An integer of the given bit width.
    Int(u32),
    /// IEEE-754 single precision.
    Float32,
    /// IEEE-754 double precision.
    Float64,
    /// A pointer to a value of the given type.
    Pointer(Box<Type>),
    /// A named or anonymous aggregate, interned in a [`StructPool`].
    Struct(StructRef),
    /// A fixed-length vector of a primitive element type.
    Vector(Box<Type>, u32),
}

impl Type {
    /// Shorthand for `Pointer(Box::new(inner))`.
    pub fn pointer_to(inner: Type) -> Type {
        Type::Pointer(Box::new(inner))
    }

    /// The pointee type, if this is a pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// The struct this type names, if it is a pointer-to-struct or a bare struct.
    pub fn struct_ref(&self) -> Option<StructRef> {
        match self {
            Type::Struct(r) => Some(*r),
            Type::Pointer(inner) => inner.struct_ref(),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float32 | Type::Float64)
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Type::Float64)
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector(..))
    }

    pub fn i8() -> Type {
        Type::Int(8)
    }
    pub fn i32() -> Type {
        Type::Int(32)
    }
    pub fn i64() -> Type {
        Type::Int(64)
    }

    /// The opaque byte-pointer type (`i8*` in the source dialect) used by every
    /// runtime entry point that takes a buffer.
    pub fn opaque_ptr() -> Type {
        Type::pointer_to(Type::i8())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Float32 => write!(f, "f32"),
            Type::Float64 => write!(f, "f64"),
            Type::Pointer(inner) => write!(f, "{inner}*"),
            Type::Struct(r) => write!(f, "{r}"),
            Type::Vector(elem, n) => write!(f, "{elem}x{n}"),
        }
    }
}

/// The fields of a struct type, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructData {
    /// The struct's nominal name, e.g. `struct.float4`. Anonymous structs have
    /// none, and are interned structurally instead.
    pub name: Option<String>,
    pub fields: Vec<Type>,
}

/// Interns struct types by name (or by structure, when anonymous).
///
/// Struct identity is "structural + name equality" per the source IR's type
/// tables: two declarations with the same name are the same type, and two
/// anonymous declarations with the same field list are also the same type.
#[derive(Default, Clone)]
pub struct StructPool {
    structs: PrimaryMap<StructRef, StructData>,
    by_name: HashMap<String, StructRef>,
    by_shape: HashMap<Vec<Type>, StructRef>,
}

impl StructPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or look up) a struct type.
    pub fn declare(&mut self, name: Option<String>, fields: Vec<Type>) -> StructRef {
        if let Some(name) = &name {
            if let Some(existing) = self.by_name.get(name) {
                return *existing;
            }
        } else if let Some(existing) = self.by_shape.get(&fields) {
            return *existing;
        }
        let r = self.structs.push(StructData {
            name: name.clone(),
            fields: fields.clone(),
        });
        if let Some(name) = name {
            self.by_name.insert(name, r);
        } else {
            self.by_shape.insert(fields, r);
        }
        r
    }

    pub fn get(&self, r: StructRef) -> &StructData {
        &self.structs[r]
    }

    /// Look up a struct purely by its nominal name, used by the classifier's
    /// `struct.float4` special case.
    pub fn name_of(&self, r: StructRef) -> Option<&str> {
        self.structs[r].name.as_deref()
    }

    /// Iterate every interned struct, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (StructRef, &StructData)> {
        self.structs.iter()
    }
}

/// The byte-size and alignment rules for the host module being rewritten.
///
/// The source tool reads this straight off LLVM's `DataLayout` for the parsed
/// module; we only need the one number that drives every marshalling
/// decision in this rewriter: the pointer width. Field layout within structs
/// is sequential (no inter-field padding), which keeps `size_of(twin) ==
/// size_of(original)` trivially true as long as both share a field list with
/// pointer-sized padding substituted for pointers (see the struct cloner).
#[derive(Clone, Copy, Debug)]
pub struct DataLayout {
    pub pointer_size: u32,
}

impl DataLayout {
    /// The layout of the host triple this rewriter targets, read from the
    /// process's own target triple the way `cranelift-codegen`'s ISA setup
    /// reads pointer width off a `target_lexicon::Triple`.
    pub fn host() -> Self {
        let pointer_size = match target_lexicon::Triple::host().pointer_width() {
            Ok(width) => width.bytes() as u32,
            Err(()) => 8,
        };
        DataLayout { pointer_size }
    }

    /// The allocation size of `ty`, in bytes.
    pub fn size_of(&self, ty: &Type, structs: &StructPool) -> u32 {
        match ty {
            Type::Void => 0,
            Type::Int(bits) => bits.div_ceil(8),
            Type::Float32 => 4,
            Type::Float64 => 8,
            Type::Pointer(_) => self.pointer_size,
            Type::Vector(elem, count) => self.size_of(elem, structs) * count,
            Type::Struct(r) => structs
                .get(*r)
                .fields
                .iter()
                .map(|field| self.size_of(field, structs))
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_structs_intern_by_name() {
        let mut structs = StructPool::new();
        let a = structs.declare(Some("struct.Point".into()), vec![Type::i32(), Type::i32()]);
        let b = structs.declare(Some("struct.Point".into()), vec![Type::i32(), Type::i32()]);
        assert_eq!(a, b);
    }

    #[test]
    fn anonymous_structs_intern_by_shape() {
        let mut structs = StructPool::new();
        let a = structs.declare(None, vec![Type::i32(), Type::Float32]);
        let b = structs.declare(None, vec![Type::i32(), Type::Float32]);
        let c = structs.declare(None, vec![Type::Float32, Type::i32()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn size_of_struct_is_sum_of_fields() {
        let mut structs = StructPool::new();
        let layout = DataLayout::host();
        let s = structs.declare(None, vec![Type::i32(), Type::pointer_to(Type::Float32)]);
        assert_eq!(layout.size_of(&Type::Struct(s), &structs), 12);
    }
}
