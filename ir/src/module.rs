//! A module: a set of functions sharing one type pool, global table and
//! external-symbol table.

use crate::entities::{FuncRef, GlobalRef};
use crate::function::{Function, Signature};
use crate::types::{DataLayout, StructPool};
use cranelift_entity::EntityRef;
use std::collections::HashMap;

/// A function symbol a module's instructions can call, declared either by a
/// function defined in this module or an external one (a runtime entry point,
/// or the legacy setup/launch API).
#[derive(Clone, Debug)]
pub struct ExternFunc {
    pub name: String,
    pub signature: Signature,
}

/// A module-level string constant (used for the kernel name and the embedded
/// device IR source text).
#[derive(Clone, Debug)]
pub struct GlobalData {
    pub name: String,
    pub contents: String,
}

/// A collection of functions plus the type, global and external-symbol tables
/// they share.
#[derive(Clone)]
pub struct Module {
    pub functions: Vec<Function>,
    pub structs: StructPool,
    pub data_layout: DataLayout,
    externs: Vec<ExternFunc>,
    extern_by_name: HashMap<String, FuncRef>,
    globals: Vec<GlobalData>,
    global_by_name: HashMap<String, GlobalRef>,
}

impl Module {
    pub fn new() -> Self {
        Module {
            functions: Vec::new(),
            structs: StructPool::new(),
            data_layout: DataLayout::host(),
            externs: Vec::new(),
            extern_by_name: HashMap::new(),
            globals: Vec::new(),
            global_by_name: HashMap::new(),
        }
    }

    /// Get or declare an external function symbol, LLVM `getOrInsertFunction`-style:
    /// if `name` is already declared the existing reference is returned
    /// (without re-checking the signature matches; callers control that).
    pub fn declare_func(&mut self, name: &str, signature: Signature) -> FuncRef {
        if let Some(r) = self.extern_by_name.get(name) {
            return *r;
        }
        let r = FuncRef::new(self.externs.len());
        self.externs.push(ExternFunc {
            name: name.to_string(),
            signature,
        });
        self.extern_by_name.insert(name.to_string(), r);
        r
    }

    pub fn extern_func(&self, r: FuncRef) -> &ExternFunc {
        &self.externs[r.index()]
    }

    pub fn find_func(&self, name: &str) -> Option<FuncRef> {
        self.extern_by_name.get(name).copied()
    }

    pub fn has_func(&self, r: FuncRef) -> bool {
        r.index() < self.externs.len()
    }

    /// Find a defined function (one with a body) by name.
    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Intern a string constant as a module global, returning the existing
    /// one if `name` was already declared (the source tool shares one global
    /// per embedded device-IR source text across all launch sites).
    pub fn declare_global(&mut self, name: &str, contents: String) -> GlobalRef {
        if let Some(r) = self.global_by_name.get(name) {
            return *r;
        }
        let r = GlobalRef::new(self.globals.len());
        self.globals.push(GlobalData {
            name: name.to_string(),
            contents,
        });
        self.global_by_name.insert(name.to_string(), r);
        r
    }

    pub fn find_global(&self, name: &str) -> Option<GlobalRef> {
        self.global_by_name.get(name).copied()
    }

    pub fn global(&self, r: GlobalRef) -> &GlobalData {
        &self.globals[r.index()]
    }

    /// Every declared global's reference, in declaration order.
    pub fn global_refs(&self) -> impl Iterator<Item = GlobalRef> {
        (0..self.globals.len()).map(GlobalRef::new)
    }

    /// Every declared external symbol's reference, in declaration order.
    pub fn extern_refs(&self) -> impl Iterator<Item = FuncRef> {
        (0..self.externs.len()).map(FuncRef::new)
    }
}
