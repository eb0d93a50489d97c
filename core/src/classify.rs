//! The argument classifier (spec §4.3).
//!
//! Given one staged argument, picks exactly one of the six marshalling
//! strategies from its device-side type and its value-side IR, and fails
//! with a specific error kind for every shape the core explicitly forbids.

use crate::error::RewriteError;
use crate::layout::walk_struct;
use crate::rewrite::ParamInfo;
use launchpatch_ir::write::print_inst;
use launchpatch_ir::{DataFlowGraph, Function, Inst, Module, Type, Value, ValueDef};

/// One of the six ways a marshalled argument can be materialized at the
/// launch site, fully resolved: every value and size the marshaller needs
/// has already been computed by the classifier.
pub enum Strategy {
    Integer { value: Value, bits: u32 },
    Float { value: Value },
    /// Covers both a genuine pointer-to-scalar argument and the
    /// `struct.float4` re-dispatch out of the by-value-struct branch: in
    /// both cases the runtime just needs a buffer pointer and a size.
    PointerToScalar {
        ptr: Value,
        element_size: u32,
    },
    ByValueStruct {
        struct_ptr: Value,
        struct_ty: Type,
    },
    ByValueVector {
        ptr: Value,
        total_bytes: u32,
    },
}

fn site(func: &Function, module: &Module, inst: Inst) -> String {
    print_inst(func, module, inst)
}

/// Walk back through one level of field-address (`gep`) indirection, the
/// way the source does when a by-value struct's staging pointer was
/// produced via a GEP rather than directly via the setup call's alloca —
/// so the emitted marshalling operates on the whole aggregate.
fn unwrap_one_gep_level(dfg: &DataFlowGraph, ptr: Value) -> Value {
    if let ValueDef::Result(inst) = dfg.value_def(ptr) {
        if let launchpatch_ir::InstructionData::Gep { base, .. } = dfg.inst_data(*inst) {
            return *base;
        }
    }
    ptr
}

/// Classify `param` against its device-side type and its value-side IR,
/// selecting exactly one marshalling strategy.
pub fn classify(
    func: &Function,
    module: &Module,
    site_inst: Inst,
    param: &ParamInfo,
) -> Result<Strategy, RewriteError> {
    let layout = &module.data_layout;
    let structs = &module.structs;

    // Branch 1: device-side by-value struct (represented device-side as a
    // pointer-to-struct parameter).
    if param.device_side_by_val {
        if let Some(struct_ref) = param.device_side_type.pointee().and_then(Type::struct_ref) {
            if structs.name_of(struct_ref) == Some("struct.float4") {
                let ptr = unwrap_one_gep_level(&func.dfg, param.pointer);
                let element_size = layout.size_of(&Type::Struct(struct_ref), structs);
                return Ok(Strategy::PointerToScalar { ptr, element_size });
            }
            let struct_ptr = unwrap_one_gep_level(&func.dfg, param.pointer);
            return Ok(Strategy::ByValueStruct {
                struct_ptr,
                struct_ty: Type::Struct(struct_ref),
            });
        }
    }

    let value_ty = func.dfg.value_type(param.value).clone();

    if let Type::Int(bits) = value_ty {
        if matches!(bits, 8 | 32 | 64) {
            return Ok(Strategy::Integer {
                value: param.value,
                bits,
            });
        }
        return Err(RewriteError::UnsupportedBitWidth {
            bits,
            site: site(func, module, site_inst),
        });
    }

    if value_ty.is_float() {
        if value_ty.is_double() {
            return Err(RewriteError::DoubleNotSupported {
                site: site(func, module, site_inst),
            });
        }
        return Ok(Strategy::Float { value: param.value });
    }

    if let Type::Pointer(elem) = &value_ty {
        if let Type::Struct(struct_ref) = elem.as_ref() {
            let info = walk_struct(&Type::Struct(*struct_ref), layout, structs);
            if info.has_pointers() {
                return Err(RewriteError::PointersInsideDeviceStruct {
                    index_path: info.pointer_infos[0].index_path.clone(),
                    site: site(func, module, site_inst),
                });
            }
            let element_size = layout.size_of(elem, structs);
            return Ok(Strategy::PointerToScalar {
                ptr: param.value,
                element_size,
            });
        }
        if elem.is_double() {
            return Err(RewriteError::DoubleNotSupported {
                site: site(func, module, site_inst),
            });
        }
        let element_size = layout.size_of(elem, structs);
        return Ok(Strategy::PointerToScalar {
            ptr: param.value,
            element_size,
        });
    }

    if let Type::Struct(struct_ref) = &value_ty {
        return Ok(Strategy::ByValueStruct {
            struct_ptr: param.pointer,
            struct_ty: Type::Struct(*struct_ref),
        });
    }

    if let Type::Vector(elem, count) = &value_ty {
        if !(elem.is_integer() || elem.is_float()) {
            return Err(RewriteError::UnsupportedVectorElement {
                element_type: elem.to_string(),
                site: site(func, module, site_inst),
            });
        }
        let total_bytes = layout.size_of(elem, structs) * count;
        return Ok(Strategy::ByValueVector {
            ptr: param.pointer,
            total_bytes,
        });
    }

    Err(RewriteError::UnsupportedArgumentKind {
        site: site(func, module, site_inst),
    })
}
