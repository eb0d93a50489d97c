//! The launch-site rewriter (spec §4.5): the state machine that walks one
//! function's basic blocks, stages setup calls into [`ParamInfo`]s, and when
//! the launch call is reached, splices in the prologue, the marshalling
//! sequence and the trigger, then neutralizes the original calls.
//!
//! Per the redesign guidance (spec §9), the in-flight assembly buffer that
//! the source keeps as a module-level singleton is modeled here as a value
//! local to [`rewrite_function`]: created fresh per function, drained per
//! launch site, never shared across functions.

use crate::classify::classify;
use crate::cloner::StructCloner;
use crate::error::RewriteError;
use crate::marshal::emit_arg;
use launchpatch_ir::cursor::Cursor;
use launchpatch_ir::write::print_inst;
use launchpatch_ir::{
    Block, CallKind, Function, GlobalRef, Inst, InstructionData, Module, Type, Value, ValueDef,
};

const SETUP_ARGUMENT_SYMBOL: &str = "kernel_setup_argument";
const LAUNCH_SYMBOL: &str = "kernel_launch";

/// One staged argument: its position, the staging slot it was loaded from,
/// and (once the launch call is reached) the device-side type and
/// pass-by-value attribute it's being matched against.
pub struct ParamInfo {
    pub param_index: usize,
    pub size: i64,
    /// A freshly inserted load of the staging slot: the argument's runtime value.
    pub value: Value,
    /// The staging allocation itself (the setup call's bitcast operand, unwrapped).
    pub pointer: Value,
    pub device_side_type: Type,
    pub device_side_by_val: bool,
}

/// The in-flight assembly state for one launch site, live from the first
/// setup call seen after the previous launch site (or function entry) until
/// the launch call that drains it.
#[derive(Default)]
pub struct LaunchCallInfo {
    pub kernel_name: String,
    pub params: Vec<ParamInfo>,
}

/// Recover the staging allocation from a setup call's first operand, which
/// is either a direct alloca result or a bitcast of one to an opaque byte
/// pointer.
fn recover_staging_ptr(
    func: &Function,
    module: &Module,
    site_inst: Inst,
    arg0: Value,
) -> Result<Value, RewriteError> {
    match func.dfg.value_def(arg0) {
        ValueDef::Result(inst) => match func.dfg.inst_data(*inst) {
            InstructionData::BitCast { arg, .. } => Ok(*arg),
            _ => Ok(arg0),
        },
        ValueDef::Param(..) => Err(RewriteError::MalformedSetupArgument {
            site: print_inst(func, module, site_inst),
        }),
    }
}

/// Read a compile-time integer constant operand, used for the setup call's
/// declared size. Falls back to `0` if the operand isn't a literal (the
/// source tolerates this the same way: `size` is diagnostic, never
/// load-bearing for a marshalling decision).
fn const_operand(func: &Function, value: Value) -> i64 {
    if let ValueDef::Result(inst) = func.dfg.value_def(value) {
        if let InstructionData::IConst { imm, .. } = func.dfg.inst_data(*inst) {
            return *imm;
        }
    }
    0
}

/// Stage one `kernel_setup_argument(ptr, size, ...)` call: recover the
/// staging slot and insert a load of it immediately before the call, so the
/// load dominates the eventual launch site by construction.
fn collect_setup_argument(
    func: &mut Function,
    module: &Module,
    site_inst: Inst,
    param_index: usize,
) -> Result<ParamInfo, RewriteError> {
    let data = func.dfg.inst_data(site_inst).clone();
    let args = match data {
        InstructionData::Call { args, .. } => args,
        _ => unreachable!("caller only invokes this for a Call instruction"),
    };
    let staging_ptr = recover_staging_ptr(func, module, site_inst, args[0])?;
    let size = const_operand(func, args[1]);

    let load_ty = func
        .dfg
        .value_type(staging_ptr)
        .pointee()
        .cloned()
        .unwrap_or_else(Type::opaque_ptr);
    let (load_inst, load_value) = func
        .dfg
        .make_inst_result(InstructionData::Load { ptr: staging_ptr, ty: load_ty }, load_ty);
    func.layout.insert_inst_before(load_inst, site_inst);

    Ok(ParamInfo {
        param_index,
        size,
        value: load_value,
        pointer: staging_ptr,
        device_side_type: Type::Void,
        device_side_by_val: false,
    })
}

/// Walk back through a `kernel_launch` call's bitcast-to-bytes operand to
/// the function symbol it names.
fn kernel_symbol_name(
    func: &Function,
    module: &Module,
    site_inst: Inst,
    fn_as_bytes: Value,
) -> Result<String, RewriteError> {
    if let ValueDef::Result(bitcast_inst) = func.dfg.value_def(fn_as_bytes) {
        if let InstructionData::BitCast { arg, .. } = func.dfg.inst_data(*bitcast_inst) {
            if let ValueDef::Result(addr_inst) = func.dfg.value_def(*arg) {
                if let InstructionData::FuncAddr { func: fr } = func.dfg.inst_data(*addr_inst) {
                    return Ok(module.extern_func(*fr).name.clone());
                }
            }
        }
    }
    Err(RewriteError::UnknownKernel {
        function: func.name.clone(),
        kernel_name: "<unresolved kernel_launch operand>".to_string(),
        site: print_inst(func, module, site_inst),
    })
}

/// Re-intern a type declared against the device module's struct table into
/// the host module's, recursively, so a `StructRef` handed back to the host
/// rewriter always resolves against the pool it's actually looked up in. The
/// two modules are parsed independently and so start with disjoint struct
/// tables even when they name the same kernel's parameter types; struct
/// identity is structural-plus-name (see `StructPool`), so re-declaring by
/// name/shape here lands on the same host-side entry every launch site that
/// mentions it reuses.
fn import_device_type(
    ty: &Type,
    device_structs: &launchpatch_ir::StructPool,
    host: &mut Module,
) -> Type {
    match ty {
        Type::Pointer(inner) => Type::pointer_to(import_device_type(inner, device_structs, host)),
        Type::Struct(r) => {
            let data = device_structs.get(*r).clone();
            let fields = data
                .fields
                .iter()
                .map(|f| import_device_type(f, device_structs, host))
                .collect();
            Type::Struct(host.structs.declare(data.name, fields))
        }
        Type::Vector(elem, count) => {
            Type::Vector(Box::new(import_device_type(elem, device_structs, host)), *count)
        }
        other => other.clone(),
    }
}

/// Populate every staged `ParamInfo`'s device-side type and by-value
/// attribute from the device function's parameter list, in positional
/// order. Warns (rather than failing) if more arguments were staged than
/// the device kernel declares (spec §9, Open Question: kept as a warning).
fn populate_device_side_types(
    info: &mut LaunchCallInfo,
    device_fn: &Function,
    device_structs: &launchpatch_ir::StructPool,
    host: &mut Module,
) {
    let declared = device_fn.signature.params.len();
    for (i, param) in info.params.iter_mut().enumerate() {
        if i >= declared {
            log::warn!(
                "kernel '{}': {} argument(s) staged but only {} declared on the device side; ignoring the rest",
                info.kernel_name,
                info.params.len(),
                declared
            );
            break;
        }
        param.device_side_type = import_device_type(&device_fn.signature.params[i], device_structs, host);
        param.device_side_by_val = device_fn.signature.by_val.get(i).copied().unwrap_or(false);
    }
}

/// Emit the full prologue, marshalling sequence and trigger for one launch
/// site, positioned immediately before the (soon to be neutralized) launch
/// call, and return the kernel's device-side function for diagnostics.
fn emit_launch_site(
    func: &mut Function,
    module: &mut Module,
    device_module: &Module,
    cloner: &mut StructCloner,
    site_inst: Inst,
    info: &mut LaunchCallInfo,
    device_ir_global: GlobalRef,
) -> Result<(), RewriteError> {
    let data = func.dfg.inst_data(site_inst).clone();
    let fn_as_bytes = match &data {
        InstructionData::Call { args, .. } => args[0],
        _ => unreachable!("caller only invokes this for a Call instruction"),
    };
    let kernel_name = kernel_symbol_name(func, module, site_inst, fn_as_bytes)?;
    info.kernel_name = kernel_name.clone();

    let device_fn = device_module
        .find_function(&kernel_name)
        .ok_or_else(|| RewriteError::UnknownKernel {
            function: func.name.clone(),
            kernel_name: kernel_name.clone(),
            site: print_inst(func, module, site_inst),
        })?;
    populate_device_side_types(info, device_fn, &device_module.structs, module);

    let kernel_name_global = module.declare_global(
        &format!("kernel_name_{}_{}_{}", func.name, kernel_name, site_inst),
        kernel_name.clone(),
    );

    let mut cursor = Cursor::before(func, site_inst);
    let name_ptr = cursor.global_addr(kernel_name_global);
    let source_ptr = cursor.global_addr(device_ir_global);
    let configure_kernel = module.declare_func(
        "configure_kernel",
        launchpatch_ir::Signature::new(vec![Type::opaque_ptr(), Type::opaque_ptr()], None),
    );
    cursor.call_void(configure_kernel, vec![name_ptr, source_ptr]);

    for i in 0..info.params.len() {
        let strategy = classify(&*cursor.func, module, site_inst, &info.params[i])?;
        emit_arg(&mut cursor, module, cloner, site_inst, strategy)?;
    }

    let kernel_go = module.declare_func("kernel_go", launchpatch_ir::Signature::new(vec![], None));
    cursor.call_void(kernel_go, vec![]);
    Ok(())
}

/// Turn a setup or launch call into a zero constant of its original result
/// type, preserving its position and identity so anything that (in
/// principle) still referenced its result keeps a valid def. If it was an
/// exception-style call, splice in an unconditional branch to its normal
/// successor immediately after it, so the block it terminated still has
/// exactly one terminator.
fn neutralize(func: &mut Function, inst: Inst) {
    let data = func.dfg.inst_data(inst).clone();
    let (result_ty, normal_successor) = match data {
        InstructionData::Call {
            result_ty, kind, ..
        } => (result_ty.unwrap_or(Type::i32()), kind.normal_successor()),
        _ => unreachable!("only call instructions are ever marked for neutralization"),
    };
    if let Some(normal) = normal_successor {
        let br = func.dfg.make_inst(InstructionData::Br { dest: normal });
        func.layout.insert_inst_after(br, inst);
    }
    *func.dfg.inst_data_mut(inst) = InstructionData::IConst {
        ty: result_ty,
        imm: 0,
    };
}

/// Rewrite one function: stage every `kernel_setup_argument` call, and at
/// every `kernel_launch` call, splice in the marshalling sequence and
/// neutralize the calls that drove it.
pub fn rewrite_function(
    func: &mut Function,
    module: &mut Module,
    device_module: &Module,
    cloner: &mut StructCloner,
    device_ir_global: GlobalRef,
) -> Result<(), RewriteError> {
    let (setup_fn, launch_fn) = match (
        module.find_func(SETUP_ARGUMENT_SYMBOL),
        module.find_func(LAUNCH_SYMBOL),
    ) {
        (Some(s), Some(l)) => (s, l),
        _ => return Ok(()),
    };

    let mut info = LaunchCallInfo::default();
    let mut to_neutralize: Vec<Inst> = Vec::new();

    let blocks: Vec<Block> = func.blocks().collect();
    for block in blocks {
        let insts: Vec<Inst> = func.layout.block_insts(block).collect();
        for inst in insts {
            let callee = match func.dfg.inst_data(inst) {
                InstructionData::Call { callee, .. } => *callee,
                _ => continue,
            };
            if callee == setup_fn {
                let param_index = info.params.len();
                let param = collect_setup_argument(func, module, inst, param_index)?;
                info.params.push(param);
                to_neutralize.push(inst);
            } else if callee == launch_fn {
                emit_launch_site(func, module, device_module, cloner, inst, &mut info, device_ir_global)?;
                to_neutralize.push(inst);
                info.params.clear();
                info.kernel_name.clear();
            }
        }
    }

    for inst in to_neutralize {
        neutralize(func, inst);
    }
    Ok(())
}
