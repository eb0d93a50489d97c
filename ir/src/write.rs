//! Textual IR printer.
//!
//! Produces the same dialect the reader accepts, so `write_module` composed
//! with `reader::parse_module` round-trips. Kept deliberately plain (one
//! instruction per line, no column alignment) the way Cranelift's own
//! `write_function` favors legibility over polish for a format nobody hand-edits.

use crate::dfg::{CallKind, InstructionData};
use crate::entities::Inst;
use crate::function::Function;
use crate::module::Module;
use std::fmt::Write;

fn write_inst(out: &mut String, func: &Function, module: &Module, inst: Inst) {
    let data = func.dfg.inst_data(inst);
    let result = func.dfg.inst_result(inst);
    let lhs = result.map(|v| format!("%{v} = ")).unwrap_or_default();
    match data {
        InstructionData::Alloca { ty } => {
            let _ = writeln!(out, "    {lhs}alloca {ty}");
        }
        InstructionData::Load { ptr, ty } => {
            let _ = writeln!(out, "    {lhs}load {ty}, {ty}* %{ptr}");
        }
        InstructionData::Store { value, ptr } => {
            let ty = func.dfg.value_type(*value);
            let _ = writeln!(out, "    store {ty} %{value}, {ty}* %{ptr}");
        }
        InstructionData::BitCast { arg, to } => {
            let from = func.dfg.value_type(*arg);
            let _ = writeln!(out, "    {lhs}bitcast {from} %{arg} to {to}");
        }
        InstructionData::IConst { ty, imm } => {
            let _ = writeln!(out, "    {lhs}iconst {ty} {imm}");
        }
        InstructionData::GlobalAddr { global } => {
            let _ = writeln!(out, "    {lhs}global_addr @{}", module.global(*global).name);
        }
        InstructionData::FuncAddr { func } => {
            let _ = writeln!(out, "    {lhs}func_addr @{}", module.extern_func(*func).name);
        }
        InstructionData::Gep {
            base,
            base_ty,
            indices,
        } => {
            let idx = indices
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "    {lhs}gep {base_ty}, {base_ty}* %{base}, 0, {idx}");
        }
        InstructionData::Call {
            callee,
            args,
            kind,
            result_ty,
        } => {
            let args = args
                .iter()
                .map(|v| format!("%{v}"))
                .collect::<Vec<_>>()
                .join(", ");
            let retty = result_ty
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "void".to_string());
            let tag = match kind {
                CallKind::Ordinary => "call".to_string(),
                CallKind::Invoke { normal, unwind } => {
                    format!("invoke to {normal} unwind {unwind}")
                }
            };
            let name = &module.extern_func(*callee).name;
            let _ = writeln!(out, "    {lhs}{tag} {retty} @{name}({args})");
        }
        InstructionData::Br { dest } => {
            let _ = writeln!(out, "    br {dest}");
        }
        InstructionData::Ret { value } => match value {
            Some(v) => {
                let ty = func.dfg.value_type(*v);
                let _ = writeln!(out, "    ret {ty} %{v}");
            }
            None => {
                let _ = writeln!(out, "    ret void");
            }
        },
        InstructionData::Unreachable => {
            let _ = writeln!(out, "    unreachable");
        }
    }
}

/// Print a single instruction, without the block's surrounding context.
/// Used for diagnostics, where callers need to name the offending
/// instruction without printing the whole function around it.
pub fn print_inst(func: &Function, module: &Module, inst: Inst) -> String {
    let mut out = String::new();
    write_inst(&mut out, func, module, inst);
    out.trim_end().to_string()
}

/// Print one function's body.
pub fn write_function(func: &Function, module: &Module) -> String {
    let mut out = String::new();
    let params = func
        .signature
        .params
        .iter()
        .enumerate()
        .map(|(i, ty)| format!("{ty} %p{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let retty = func
        .signature
        .ret
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "void".to_string());
    let _ = writeln!(out, "define {retty} @{}({params}) {{", func.name);
    for block in func.blocks() {
        let _ = writeln!(out, "{block}:");
        for inst in func.layout.block_insts(block) {
            write_inst(&mut out, func, module, inst);
        }
    }
    let _ = writeln!(out, "}}");
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Print the struct type table, in declaration order so each `structN`
/// reference (see [`crate::types::Type`]'s `Display`) lines up with the
/// `N`-th `type` line a reader sees.
fn write_structs(out: &mut String, module: &Module) {
    for (r, data) in module.structs.iter() {
        let fields = data
            .fields
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match &data.name {
            Some(name) => {
                let _ = writeln!(out, "type {r} = {name} {{ {fields} }}");
            }
            None => {
                let _ = writeln!(out, "type {r} = {{ {fields} }}");
            }
        }
    }
}

fn write_globals(out: &mut String, module: &Module) {
    for r in module.global_refs() {
        let g = module.global(r);
        let _ = writeln!(out, "global @{} = \"{}\"", g.name, escape(&g.contents));
    }
}

fn write_externs(out: &mut String, module: &Module) {
    for r in module.extern_refs() {
        let e = module.extern_func(r);
        let params = e
            .signature
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                if e.signature.by_val.get(i).copied().unwrap_or(false) {
                    format!("{ty} byval")
                } else {
                    ty.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let retty = e
            .signature
            .ret
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "void".to_string());
        let _ = writeln!(out, "declare {retty} @{}({params})", e.name);
    }
}

/// Print an entire module: struct table, globals, extern declarations, then
/// every defined function, in that order.
pub fn write_module(module: &Module) -> String {
    let mut out = String::new();
    write_structs(&mut out, module);
    write_globals(&mut out, module);
    write_externs(&mut out, module);
    for func in &module.functions {
        out.push_str(&write_function(func, module));
        out.push('\n');
    }
    out
}
