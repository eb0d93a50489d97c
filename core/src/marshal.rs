//! The marshaller (spec §4.4).
//!
//! Turns one resolved [`Strategy`](crate::classify::Strategy) into the IR
//! subgraph that materializes the argument in the form the runtime accepts,
//! followed by the runtime call that hands it over. Every helper here takes
//! a [`Cursor`] positioned after the last instruction emitted so far and
//! leaves it positioned after the last one it emits, so a launch site's
//! whole marshalling sequence threads through as one contiguous run of IR.

use crate::classify::Strategy;
use crate::cloner::{emit_field_copy, StructCloner};
use crate::error::RewriteError;
use crate::layout::walk_struct;
use launchpatch_ir::cursor::Cursor;
use launchpatch_ir::write::print_inst;
use launchpatch_ir::{Function, Inst, Module, Signature, Type};

fn runtime_fn(module: &mut Module, name: &str, params: Vec<Type>) -> launchpatch_ir::FuncRef {
    module.declare_func(name, Signature::new(params, None))
}

/// `set_kernel_arg_int{8,32,64}(value)`.
fn emit_integer(cursor: &mut Cursor, module: &mut Module, value: launchpatch_ir::Value, bits: u32) {
    let name = match bits {
        8 => "set_kernel_arg_int8",
        32 => "set_kernel_arg_int32",
        64 => "set_kernel_arg_int64",
        _ => unreachable!("classifier rejects widths outside {{8, 32, 64}}"),
    };
    let callee = runtime_fn(module, name, vec![Type::Int(bits)]);
    cursor.call_void(callee, vec![value]);
}

/// `set_kernel_arg_float(value)`.
fn emit_float(cursor: &mut Cursor, module: &mut Module, value: launchpatch_ir::Value) {
    let callee = runtime_fn(module, "set_kernel_arg_float", vec![Type::Float32]);
    cursor.call_void(callee, vec![value]);
}

/// Bitcast `ptr` to an opaque byte pointer and emit
/// `set_kernel_arg_gpu_buffer(ptr, element_size)`.
fn emit_pointer_to_scalar(
    cursor: &mut Cursor,
    module: &mut Module,
    ptr: launchpatch_ir::Value,
    element_size: u32,
) {
    let byte_ptr = cursor.bitcast(ptr, Type::opaque_ptr());
    let size = cursor.iconst(Type::i32(), element_size as i64);
    let callee = runtime_fn(
        module,
        "set_kernel_arg_gpu_buffer",
        vec![Type::opaque_ptr(), Type::i32()],
    );
    cursor.call_void(callee, vec![byte_ptr, size]);
}

/// Bitcast `ptr` to an opaque byte pointer and emit
/// `set_kernel_arg_hostside_buffer(ptr, byte_count)`.
fn emit_hostside_buffer(
    cursor: &mut Cursor,
    module: &mut Module,
    ptr: launchpatch_ir::Value,
    byte_count: u32,
) {
    let byte_ptr = cursor.bitcast(ptr, Type::opaque_ptr());
    let size = cursor.iconst(Type::i32(), byte_count as i64);
    let callee = runtime_fn(
        module,
        "set_kernel_arg_hostside_buffer",
        vec![Type::opaque_ptr(), Type::i32()],
    );
    cursor.call_void(callee, vec![byte_ptr, size]);
}

/// Marshal a by-value struct: clone it into a pointer-free twin if it has
/// embedded pointers, hand the twin (or the original, if it has none) over
/// as a hostside buffer, then forward every embedded pointer separately.
fn emit_byvalue_struct(
    cursor: &mut Cursor,
    module: &mut Module,
    cloner: &mut StructCloner,
    site_inst: Inst,
    struct_ptr: launchpatch_ir::Value,
    struct_ty: &Type,
) -> Result<(), RewriteError> {
    let struct_ref = struct_ty.struct_ref().expect("classifier only selects this strategy for struct types");
    let info = walk_struct(struct_ty, &module.data_layout, &module.structs);

    // If the staging pointer doesn't currently point at the struct type the
    // device side expects, bitcast it into place first (source: "doesn't
    // actually point to a struct ... adding a bitcast").
    let current_ty = cursor.func.dfg.value_type(struct_ptr).clone();
    let struct_ptr = if current_ty != Type::pointer_to(struct_ty.clone()) {
        cursor.bitcast(struct_ptr, Type::pointer_to(struct_ty.clone()))
    } else {
        struct_ptr
    };

    let (source_ptr, source_ty, total_size) = if info.has_pointers() {
        let twin_ref = cloner.clone_no_pointers(module, struct_ref)?;
        let twin_ty = Type::Struct(twin_ref);
        let twin_alloc = cursor.alloca(twin_ty.clone());
        emit_field_copy(cursor, module, struct_ty, &twin_ty, struct_ptr, twin_alloc);
        let twin_size = module.data_layout.size_of(&twin_ty, &module.structs);
        (twin_alloc, twin_ty, twin_size)
    } else {
        (struct_ptr, struct_ty.clone(), info.total_size)
    };
    let _ = source_ty;

    emit_hostside_buffer(cursor, module, source_ptr, total_size);

    for pointer_info in &info.pointer_infos {
        // The field itself has type `element_type*`; the gep addresses
        // that field, so its result type is one level more indirect.
        let field_ptr = cursor.gep(
            struct_ptr,
            struct_ty.clone(),
            pointer_info.index_path.iter().map(|i| *i as i64).collect(),
            Type::pointer_to(pointer_info.element_type.clone()),
        );
        let loaded = cursor.load(field_ptr, Type::pointer_to(pointer_info.element_type.clone()));
        let element_size = module
            .data_layout
            .size_of(&pointer_info.element_type, &module.structs);
        emit_pointer_to_scalar(cursor, module, loaded, element_size);
    }

    let _ = site_inst;
    Ok(())
}

/// Emit the marshalling IR for one argument and advance `cursor` past it.
pub fn emit_arg(
    cursor: &mut Cursor,
    module: &mut Module,
    cloner: &mut StructCloner,
    site_inst: Inst,
    strategy: Strategy,
) -> Result<(), RewriteError> {
    match strategy {
        Strategy::Integer { value, bits } => emit_integer(cursor, module, value, bits),
        Strategy::Float { value } => emit_float(cursor, module, value),
        Strategy::PointerToScalar { ptr, element_size } => {
            emit_pointer_to_scalar(cursor, module, ptr, element_size)
        }
        Strategy::ByValueVector { ptr, total_bytes } => {
            emit_hostside_buffer(cursor, module, ptr, total_bytes)
        }
        Strategy::ByValueStruct {
            struct_ptr,
            struct_ty,
        } => emit_byvalue_struct(cursor, module, cloner, site_inst, struct_ptr, &struct_ty)?,
    }
    Ok(())
}

/// Print the offending instruction for a marshaller-raised error, sharing
/// the same diagnostic convention as the classifier.
pub fn site_text(func: &Function, module: &Module, inst: Inst) -> String {
    print_inst(func, module, inst)
}
