//! A (deliberately minimal) structural verifier.
//!
//! Checks the invariants this rewriter depends on and that its output must
//! continue to satisfy: every block ends in exactly one terminator, every
//! value used by an instruction was defined somewhere earlier in the same
//! function, and every called symbol is declared. This is not a substitute
//! for a full IR verifier; it exists to catch rewriter bugs before they reach
//! the printer, the same role Cranelift's `verifier` module plays relative to
//! `cranelift_codegen::Context::compile`.

use crate::dfg::InstructionData;
use crate::entities::{Inst, Value};
use crate::function::Function;
use crate::module::Module;
use std::collections::HashSet;
use std::fmt;

/// One verification failure, naming the offending instruction or block.
#[derive(Debug, Clone)]
pub struct VerifierError {
    pub location: String,
    pub message: String,
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// The accumulated errors from one verification pass. Empty means success.
#[derive(Debug, Default, Clone)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl VerifierErrors {
    pub fn is_ok(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VerifierErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in &self.0 {
            writeln!(f, "{e}")?;
        }
        Ok(())
    }
}

fn is_terminator(data: &InstructionData) -> bool {
    matches!(data, InstructionData::Br { .. } | InstructionData::Ret { .. } | InstructionData::Unreachable)
}

fn used_values(data: &InstructionData) -> Vec<Value> {
    match data {
        InstructionData::Alloca { .. } => vec![],
        InstructionData::Load { ptr, .. } => vec![*ptr],
        InstructionData::Store { value, ptr } => vec![*value, *ptr],
        InstructionData::BitCast { arg, .. } => vec![*arg],
        InstructionData::IConst { .. } => vec![],
        InstructionData::GlobalAddr { .. } => vec![],
        InstructionData::FuncAddr { .. } => vec![],
        InstructionData::Gep { base, .. } => vec![*base],
        InstructionData::Call { args, .. } => args.clone(),
        InstructionData::Br { .. } => vec![],
        InstructionData::Ret { value } => value.iter().copied().collect(),
        InstructionData::Unreachable => vec![],
    }
}

/// Verify one function in isolation.
pub fn verify_function(func: &Function, module: &Module) -> VerifierErrors {
    let mut errors = Vec::new();
    let mut defined: HashSet<Value> = HashSet::new();
    for block in func.blocks() {
        for v in func.dfg.block_params(block) {
            defined.insert(*v);
        }
    }

    for block in func.blocks() {
        let insts: Vec<Inst> = func.layout.block_insts(block).collect();
        if insts.is_empty() {
            errors.push(VerifierError {
                location: format!("{block}"),
                message: "block has no instructions".into(),
            });
            continue;
        }
        for (i, inst) in insts.iter().enumerate() {
            let data = func.dfg.inst_data(*inst);
            let terminator = is_terminator(data);
            if terminator && i != insts.len() - 1 {
                errors.push(VerifierError {
                    location: format!("{inst}"),
                    message: "terminator is not the last instruction in its block".into(),
                });
            }
            if !terminator && i == insts.len() - 1 {
                errors.push(VerifierError {
                    location: format!("{block}"),
                    message: "block does not end in a terminator".into(),
                });
            }
            for used in used_values(data) {
                if !defined.contains(&used) {
                    errors.push(VerifierError {
                        location: format!("{inst}"),
                        message: format!("use of {used} before its definition"),
                    });
                }
            }
            if let InstructionData::Call { callee, .. } = data {
                if !module.has_func(*callee) {
                    errors.push(VerifierError {
                        location: format!("{inst}"),
                        message: "call to an undeclared function".into(),
                    });
                }
            }
            if let Some(result) = func.dfg.inst_result(*inst) {
                defined.insert(result);
            }
        }
    }
    VerifierErrors(errors)
}

/// Verify every function in a module.
pub fn verify_module(module: &Module) -> VerifierErrors {
    let mut all = Vec::new();
    for func in &module.functions {
        all.extend(verify_function(func, module).0);
    }
    VerifierErrors(all)
}
