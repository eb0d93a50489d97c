//! Recursive-descent parser building a [`launchpatch_ir::Module`] from the
//! token stream. The grammar it accepts is exactly what
//! `launchpatch_ir::write` emits, so `write_module` composed with
//! `parse_module` round-trips a module through text.

use crate::error::{err, Location, ParseResult};
use crate::lexer::{Lexer, Token};
use cranelift_entity::EntityRef;
use launchpatch_ir::{
    Block, CallKind, DataFlowGraph, Function, Inst, InstructionData, Module, Signature, StructRef,
    Type, Value,
};
use std::collections::HashMap;

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Classify one type atom (a single identifier token's text) into a [`Type`].
/// Pointer wrapping from trailing `*` tokens is handled by the caller.
fn classify_atom(name: &str) -> Option<Type> {
    match name {
        "void" => return Some(Type::Void),
        "f32" => return Some(Type::Float32),
        "f64" => return Some(Type::Float64),
        _ => {}
    }
    if let Some(rest) = name.strip_prefix("struct") {
        if let Some(idx) = parse_digits(rest) {
            return Some(Type::Struct(StructRef::new(idx as usize)));
        }
    }
    if let Some(rest) = name.strip_prefix('i') {
        if let Some(bits) = parse_digits(rest) {
            return Some(Type::Int(bits));
        }
    }
    if let Some(xpos) = name.find('x') {
        let (head, tail) = name.split_at(xpos);
        if let Some(count) = parse_digits(&tail[1..]) {
            if let Some(elem) = classify_atom(head) {
                if elem.is_integer() || elem.is_float() {
                    return Some(Type::Vector(Box::new(elem), count));
                }
            }
        }
    }
    None
}

/// Walk `indices` through `base_ty`'s aggregate structure the way
/// `Cursor::gep`'s caller does, recovering the addressed field's type so the
/// parser doesn't have to print it explicitly.
fn gep_field_type(module: &Module, base_ty: &Type, indices: &[i64]) -> Option<Type> {
    let mut ty = base_ty.clone();
    for &idx in indices {
        ty = match ty {
            Type::Struct(r) => module.structs.get(r).fields.get(idx as usize)?.clone(),
            Type::Vector(elem, _) => *elem,
            Type::Pointer(inner) => *inner,
            _ => return None,
        };
    }
    Some(ty)
}

fn resolve_block(dfg: &mut DataFlowGraph, labels: &mut HashMap<String, Block>, name: &str) -> Block {
    *labels
        .entry(name.to_string())
        .or_insert_with(|| dfg.make_block())
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    tok: Token<'a>,
    loc: Location,
    lookahead: Option<(Token<'a>, Location)>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        let (tok, loc) = lexer.next()?;
        Ok(Parser {
            lexer,
            tok,
            loc,
            lookahead: None,
        })
    }

    fn bump(&mut self) -> ParseResult<Token<'a>> {
        let (next_tok, next_loc) = match self.lookahead.take() {
            Some(pair) => pair,
            None => self.lexer.next()?,
        };
        self.loc = next_loc;
        Ok(std::mem::replace(&mut self.tok, next_tok))
    }

    /// True if the token after the current one is `:`, without consuming
    /// either. Used to tell a block label (`identifier ':'`) apart from an
    /// opcode (`identifier operand...`) with one token of lookahead.
    fn next_is_colon(&mut self) -> ParseResult<bool> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next()?);
        }
        Ok(matches!(self.lookahead.as_ref().unwrap().0, Token::Colon))
    }

    fn expect(&mut self, expected: Token<'a>, what: &str) -> ParseResult<()> {
        if self.tok == expected {
            self.bump()?;
            Ok(())
        } else {
            err!(self.loc, "expected {}, found {:?}", what, self.tok)
        }
    }

    fn expect_identifier(&mut self, text: &str) -> ParseResult<()> {
        match self.tok {
            Token::Identifier(s) if s == text => {
                self.bump()?;
                Ok(())
            }
            _ => err!(self.loc, "expected '{}', found {:?}", text, self.tok),
        }
    }

    fn take_identifier(&mut self) -> ParseResult<String> {
        match self.tok {
            Token::Identifier(s) => {
                let s = s.to_string();
                self.bump()?;
                Ok(s)
            }
            _ => err!(self.loc, "expected an identifier, found {:?}", self.tok),
        }
    }

    fn take_value_name(&mut self) -> ParseResult<String> {
        match self.tok {
            Token::Value(s) => {
                let s = s.to_string();
                self.bump()?;
                Ok(s)
            }
            _ => err!(self.loc, "expected a '%value', found {:?}", self.tok),
        }
    }

    fn take_global_name(&mut self) -> ParseResult<String> {
        match self.tok {
            Token::Global(s) => {
                let s = s.to_string();
                self.bump()?;
                Ok(s)
            }
            _ => err!(self.loc, "expected an '@name', found {:?}", self.tok),
        }
    }

    fn take_integer(&mut self) -> ParseResult<i64> {
        match self.tok {
            Token::Integer(n) => {
                self.bump()?;
                Ok(n)
            }
            _ => err!(self.loc, "expected an integer, found {:?}", self.tok),
        }
    }

    fn take_string(&mut self) -> ParseResult<String> {
        if matches!(self.tok, Token::Str(_)) {
            match self.bump()? {
                Token::Str(s) => Ok(s),
                _ => unreachable!(),
            }
        } else {
            err!(self.loc, "expected a string literal, found {:?}", self.tok)
        }
    }

    fn eat_byval(&mut self) -> ParseResult<bool> {
        if matches!(self.tok, Token::Identifier("byval")) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_type(&mut self) -> ParseResult<Type> {
        let loc = self.loc;
        let name = self.take_identifier()?;
        let mut ty = classify_atom(&name).ok_or_else(|| crate::error::ParseError {
            location: loc,
            message: format!("unrecognized type '{name}'"),
        })?;
        while self.tok == Token::Star {
            self.bump()?;
            ty = Type::pointer_to(ty);
        }
        Ok(ty)
    }

    fn parse_type_or_void(&mut self) -> ParseResult<Option<Type>> {
        if matches!(self.tok, Token::Identifier("void")) {
            self.bump()?;
            Ok(None)
        } else {
            Ok(Some(self.parse_type()?))
        }
    }

    fn resolve(&mut self, values: &HashMap<String, Value>) -> ParseResult<Value> {
        let loc = self.loc;
        let name = match self.tok {
            Token::Value(n) => n.to_string(),
            _ => return err!(loc, "expected a value operand, found {:?}", self.tok),
        };
        self.bump()?;
        values.get(&name).copied().ok_or_else(|| crate::error::ParseError {
            location: loc,
            message: format!("use of undefined value '%{name}'"),
        })
    }

    pub fn parse_module(&mut self) -> ParseResult<Module> {
        let mut module = Module::new();
        loop {
            match self.tok {
                Token::Eof => break,
                Token::Identifier("type") => self.parse_struct_decl(&mut module)?,
                Token::Identifier("global") => self.parse_global_decl(&mut module)?,
                Token::Identifier("declare") => self.parse_extern_decl(&mut module)?,
                Token::Identifier("define") => {
                    let f = self.parse_function(&mut module)?;
                    module.functions.push(f);
                }
                _ => return err!(self.loc, "expected a top-level item, found {:?}", self.tok),
            }
        }
        Ok(module)
    }

    fn parse_struct_decl(&mut self, module: &mut Module) -> ParseResult<()> {
        self.expect_identifier("type")?;
        let _label = self.take_identifier()?;
        self.expect(Token::Equal, "'='")?;
        let name = if matches!(self.tok, Token::Identifier(_)) {
            Some(self.take_identifier()?)
        } else {
            None
        };
        self.expect(Token::LBrace, "'{'")?;
        let mut fields = Vec::new();
        if self.tok != Token::RBrace {
            fields.push(self.parse_type()?);
            while self.tok == Token::Comma {
                self.bump()?;
                fields.push(self.parse_type()?);
            }
        }
        self.expect(Token::RBrace, "'}'")?;
        module.structs.declare(name, fields);
        Ok(())
    }

    fn parse_global_decl(&mut self, module: &mut Module) -> ParseResult<()> {
        self.expect_identifier("global")?;
        let name = self.take_global_name()?;
        self.expect(Token::Equal, "'='")?;
        let contents = self.take_string()?;
        module.declare_global(&name, contents);
        Ok(())
    }

    fn parse_extern_decl(&mut self, module: &mut Module) -> ParseResult<()> {
        self.expect_identifier("declare")?;
        let ret = self.parse_type_or_void()?;
        let name = self.take_global_name()?;
        self.expect(Token::LPar, "'('")?;
        let mut params = Vec::new();
        let mut by_val = Vec::new();
        if self.tok != Token::RPar {
            loop {
                params.push(self.parse_type()?);
                by_val.push(self.eat_byval()?);
                if self.tok == Token::Comma {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RPar, "')'")?;
        module.declare_func(&name, Signature { params, ret, by_val });
        Ok(())
    }

    fn parse_function(&mut self, module: &mut Module) -> ParseResult<Function> {
        self.expect_identifier("define")?;
        let ret = self.parse_type_or_void()?;
        let name = self.take_global_name()?;
        self.expect(Token::LPar, "'('")?;
        let mut params = Vec::new();
        if self.tok != Token::RPar {
            loop {
                params.push(self.parse_type()?);
                let _pname = self.take_value_name()?;
                if self.tok == Token::Comma {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RPar, "')'")?;
        self.expect(Token::LBrace, "'{'")?;

        let mut func = Function::new(name, Signature::new(params.clone(), ret));
        let mut labels: HashMap<String, Block> = HashMap::new();
        let mut values: HashMap<String, Value> = HashMap::new();
        let mut first_block = true;

        while self.tok != Token::RBrace {
            let label = self.take_identifier()?;
            self.expect(Token::Colon, "':'")?;
            let block = resolve_block(&mut func.dfg, &mut labels, &label);
            if !func.layout.is_block_inserted(block) {
                func.layout.append_block(block);
            }
            if first_block {
                first_block = false;
                for ty in &params {
                    let v = func.dfg.append_block_param(block, ty.clone());
                    values.insert(v.to_string(), v);
                }
            }
            loop {
                if self.tok == Token::RBrace {
                    break;
                }
                if matches!(self.tok, Token::Identifier(_)) && self.next_is_colon()? {
                    break;
                }
                self.parse_instruction(module, &mut func, &mut labels, &mut values, block)?;
            }
        }
        self.expect(Token::RBrace, "'}'")?;
        Ok(func)
    }

    fn parse_instruction(
        &mut self,
        module: &mut Module,
        func: &mut Function,
        labels: &mut HashMap<String, Block>,
        values: &mut HashMap<String, Value>,
        block: Block,
    ) -> ParseResult<()> {
        let lhs = if matches!(self.tok, Token::Value(_)) {
            let name = self.take_value_name()?;
            self.expect(Token::Equal, "'='")?;
            Some(name)
        } else {
            None
        };
        let loc = self.loc;
        let op = self.take_identifier()?;
        match op.as_str() {
            "alloca" => {
                let ty = self.parse_type()?;
                let (inst, v) = func
                    .dfg
                    .make_inst_result(InstructionData::Alloca { ty: ty.clone() }, Type::pointer_to(ty));
                self.finish(func, block, inst, Some(v), lhs, values);
            }
            "load" => {
                let ty = self.parse_type()?;
                self.expect(Token::Comma, "','")?;
                let _ptr_ty = self.parse_type()?;
                let ptr = self.resolve(values)?;
                let (inst, v) = func
                    .dfg
                    .make_inst_result(InstructionData::Load { ptr, ty: ty.clone() }, ty);
                self.finish(func, block, inst, Some(v), lhs, values);
            }
            "store" => {
                let _val_ty = self.parse_type()?;
                let value = self.resolve(values)?;
                self.expect(Token::Comma, "','")?;
                let _ptr_ty = self.parse_type()?;
                let ptr = self.resolve(values)?;
                let inst = func.dfg.make_inst(InstructionData::Store { value, ptr });
                self.finish(func, block, inst, None, None, values);
            }
            "bitcast" => {
                let _from_ty = self.parse_type()?;
                let arg = self.resolve(values)?;
                self.expect_identifier("to")?;
                let to = self.parse_type()?;
                let (inst, v) = func
                    .dfg
                    .make_inst_result(InstructionData::BitCast { arg, to: to.clone() }, to);
                self.finish(func, block, inst, Some(v), lhs, values);
            }
            "iconst" => {
                let ty = self.parse_type()?;
                let imm = self.take_integer()?;
                let (inst, v) = func
                    .dfg
                    .make_inst_result(InstructionData::IConst { ty: ty.clone(), imm }, ty);
                self.finish(func, block, inst, Some(v), lhs, values);
            }
            "global_addr" => {
                let name = self.take_global_name()?;
                let global = module.find_global(&name).ok_or_else(|| crate::error::ParseError {
                    location: loc,
                    message: format!("reference to undeclared global '@{name}'"),
                })?;
                let (inst, v) = func
                    .dfg
                    .make_inst_result(InstructionData::GlobalAddr { global }, Type::opaque_ptr());
                self.finish(func, block, inst, Some(v), lhs, values);
            }
            "func_addr" => {
                let name = self.take_global_name()?;
                let f = module.find_func(&name).ok_or_else(|| crate::error::ParseError {
                    location: loc,
                    message: format!("reference to undeclared function '@{name}'"),
                })?;
                let (inst, v) = func.dfg.make_inst_result(
                    InstructionData::FuncAddr { func: f },
                    Type::pointer_to(Type::Void),
                );
                self.finish(func, block, inst, Some(v), lhs, values);
            }
            "gep" => {
                let base_ty = self.parse_type()?;
                self.expect(Token::Comma, "','")?;
                let _base_ptr_ty = self.parse_type()?;
                let base = self.resolve(values)?;
                self.expect(Token::Comma, "','")?;
                let _leading_zero = self.take_integer()?;
                let mut indices = Vec::new();
                while self.tok == Token::Comma {
                    self.bump()?;
                    indices.push(self.take_integer()?);
                }
                let field_ty = gep_field_type(module, &base_ty, &indices).ok_or_else(|| {
                    crate::error::ParseError {
                        location: loc,
                        message: "gep indices do not address a field of the base type".into(),
                    }
                })?;
                let (inst, v) = func.dfg.make_inst_result(
                    InstructionData::Gep {
                        base,
                        base_ty,
                        indices,
                    },
                    Type::pointer_to(field_ty),
                );
                self.finish(func, block, inst, Some(v), lhs, values);
            }
            "call" | "invoke" => {
                let kind = if op == "invoke" {
                    self.expect_identifier("to")?;
                    let normal = self.take_identifier()?;
                    self.expect_identifier("unwind")?;
                    let unwind = self.take_identifier()?;
                    CallKind::Invoke {
                        normal: resolve_block(&mut func.dfg, labels, &normal),
                        unwind: resolve_block(&mut func.dfg, labels, &unwind),
                    }
                } else {
                    CallKind::Ordinary
                };
                let result_ty = self.parse_type_or_void()?;
                let name = self.take_global_name()?;
                let callee = module.find_func(&name).ok_or_else(|| crate::error::ParseError {
                    location: loc,
                    message: format!("call to undeclared function '@{name}'"),
                })?;
                self.expect(Token::LPar, "'('")?;
                let mut args = Vec::new();
                if self.tok != Token::RPar {
                    args.push(self.resolve(values)?);
                    while self.tok == Token::Comma {
                        self.bump()?;
                        args.push(self.resolve(values)?);
                    }
                }
                self.expect(Token::RPar, "')'")?;
                let data = InstructionData::Call {
                    callee,
                    args,
                    kind,
                    result_ty: result_ty.clone(),
                };
                match result_ty {
                    Some(ty) => {
                        let (inst, v) = func.dfg.make_inst_result(data, ty);
                        self.finish(func, block, inst, Some(v), lhs, values);
                    }
                    None => {
                        let inst = func.dfg.make_inst(data);
                        self.finish(func, block, inst, None, None, values);
                    }
                }
            }
            "br" => {
                let dest_name = self.take_identifier()?;
                let dest = resolve_block(&mut func.dfg, labels, &dest_name);
                let inst = func.dfg.make_inst(InstructionData::Br { dest });
                self.finish(func, block, inst, None, None, values);
            }
            "ret" => {
                let value = if matches!(self.tok, Token::Identifier("void")) {
                    self.bump()?;
                    None
                } else {
                    let _ty = self.parse_type()?;
                    Some(self.resolve(values)?)
                };
                let inst = func.dfg.make_inst(InstructionData::Ret { value });
                self.finish(func, block, inst, None, None, values);
            }
            "unreachable" => {
                let inst = func.dfg.make_inst(InstructionData::Unreachable);
                self.finish(func, block, inst, None, None, values);
            }
            other => return err!(loc, "unknown instruction '{}'", other),
        }
        Ok(())
    }

    fn finish(
        &mut self,
        func: &mut Function,
        block: Block,
        inst: Inst,
        result: Option<Value>,
        lhs: Option<String>,
        values: &mut HashMap<String, Value>,
    ) {
        func.layout.append_inst(inst, block);
        if let (Some(name), Some(v)) = (lhs, result) {
            values.insert(name, v);
        }
    }
}
