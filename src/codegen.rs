use thiserror::Error;

use crate::CompileOptions;
use crate::ast::{Node, NodeKind};
use crate::builtins::Builtin;
use crate::emitter::{CodeEmitter, EmitError};
use crate::symbols::{Symbol, SymbolTables};

#[derive(Debug, Error, PartialEq)]
pub enum CodegenError {
    #[error("Assignment carries no resolved target")]
    NoAssignmentTarget,
    #[error("Variable '{name}' was not bound before code generation")]
    UnresolvedVariable { name: String },
    #[error("Function '{function}' has no declared slot for parameter '{param}'")]
    MissingParameterSlot { function: String, param: String },
    #[error("Function '{name}' has no scope attached")]
    MissingScope { name: String },
    #[error("Loop was entered without a control id")]
    MissingControlId,
    #[error("Builtin '{name}' expects {expected} argument(s), found {found}")]
    BuiltinArity {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Builtin 'itxn_field' expects a literal field name as its first argument")]
    ItxnFieldName,
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Lowers a resolved tree to target assembly through a [`CodeEmitter`].
///
/// Generation is two-pass: one pass over everything outside function bodies
/// (with declarations skipped), then every collected function behind an
/// unconditional branch so bodies are only reachable via `callsub`.
pub struct CodeGenerator<'a> {
    tables: &'a SymbolTables,
    emitter: &'a mut CodeEmitter,
    max_scratch: u32,
    current_function: Option<String>,
    next_control_id: u32,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(
        tables: &'a SymbolTables,
        emitter: &'a mut CodeEmitter,
        options: &CompileOptions,
    ) -> Self {
        Self {
            tables,
            emitter,
            max_scratch: options.max_scratch,
            current_function: None,
            next_control_id: 1,
        }
    }

    pub fn generate_code(&mut self, root: &mut Node) -> Result<(), CodegenError> {
        let has_functions = contains_function(root);
        if has_functions {
            // Scratch slot 0 is reserved as the stack pointer; frames grow
            // downward from the top of scratch.
            self.emitter.add_with_comment(
                &format!("int {}", self.max_scratch),
                1,
                0,
                "stack pointer",
            )?;
            self.emitter.add("store 0", 0, 1)?;
        }

        self.generate(root)?;

        if has_functions {
            self.emitter.add("b program_end", 0, 0)?;
            self.emit_functions(root)?;
            self.emitter.label("program_end");
        }
        Ok(())
    }

    /// Generic walk: pre hook, children, post hook. Stack-machine code for
    /// an expression lands after its operands, so post is where most
    /// emission happens.
    fn generate(&mut self, node: &mut Node) -> Result<(), CodegenError> {
        if self.pre(node)? {
            for child in &mut node.children {
                self.generate(child)?;
            }
        }
        self.post(node)
    }

    fn pre(&mut self, node: &mut Node) -> Result<bool, CodegenError> {
        match &mut node.kind {
            // Bodies are emitted by the dedicated function pass.
            NodeKind::FunctionDeclaration { .. } => return Ok(false),
            NodeKind::ExprStatement
            | NodeKind::Return
            | NodeKind::DeclareVariable { .. }
            | NodeKind::DeclareConstant { .. } => self.emitter.reset_stack(),
            NodeKind::While { .. } => {
                let id = self.mint_control_id();
                node.control_id = Some(id);
                self.emitter.label(&format!("loop_start_{id}"));
            }
            NodeKind::FunctionCall { name, args } => {
                // Builtins evaluate their own arguments in the post hook.
                if Builtin::from_name(name).is_none() {
                    for arg in args {
                        self.generate(arg)?;
                    }
                }
            }
            _ => {}
        }
        Ok(true)
    }

    fn post(&mut self, node: &mut Node) -> Result<(), CodegenError> {
        match &mut node.kind {
            NodeKind::Number { value } => {
                self.emitter.add(&format!("int {value}"), 1, 0)?;
            }
            NodeKind::StringLiteral { value } => {
                self.emitter.add(&format!("byte \"{value}\""), 1, 0)?;
            }
            NodeKind::Operation {
                opcode,
                args,
                pushed,
                popped,
            } => {
                let mut text = opcode.clone();
                for arg in args.iter() {
                    text.push(' ');
                    text.push_str(arg);
                }
                self.emitter
                    .add(&text, pushed.unwrap_or(1), popped.unwrap_or(2))?;
            }
            NodeKind::ExprStatement => self.emitter.pop_all(),
            NodeKind::Return => {
                if let Some(function) = self.current_function.clone() {
                    // One epilogue per function: explicit returns branch to
                    // the shared cleanup label instead of emitting retsub.
                    self.emitter.add(&format!("b {function}-cleanup"), 0, 0)?;
                } else {
                    self.emitter.add("return", 0, 1)?;
                }
            }
            NodeKind::DeclareVariable { initializer, .. }
            | NodeKind::DeclareConstant { initializer, .. } => {
                if let Some(initializer) = initializer {
                    self.generate(initializer)?;
                    self.emitter.pop_all();
                }
            }
            NodeKind::AccessVariable { name } => {
                let Some(symbol) = &node.symbol else {
                    return Err(CodegenError::UnresolvedVariable { name: name.clone() });
                };
                if symbol.is_global {
                    self.emitter.add_with_comment(
                        &format!("load {}", symbol.position),
                        1,
                        0,
                        name,
                    )?;
                } else {
                    self.emitter.add("load 0", 1, 0)?;
                    self.emitter.add(&format!("int {}", symbol.position), 1, 0)?;
                    self.emitter.add("+", 1, 2)?;
                    self.emitter.add_with_comment("loads", 1, 1, name)?;
                }
            }
            NodeKind::Assignment { .. } => {
                if let Some(symbol) = &node.symbol {
                    self.emit_store(symbol)?;
                } else if !node.symbols.is_empty() {
                    for symbol in node.symbols.iter().rev() {
                        self.emit_store(symbol)?;
                    }
                } else {
                    return Err(CodegenError::NoAssignmentTarget);
                }
            }
            NodeKind::If {
                if_block,
                else_block,
            } => {
                // The condition was already emitted by the children walk.
                let id = self.mint_control_id();
                node.control_id = Some(id);
                self.emitter.add(&format!("bz else_{id}"), 0, 1)?;
                self.generate(if_block)?;
                self.emitter.add(&format!("b end_{id}"), 0, 0)?;
                self.emitter.label(&format!("else_{id}"));
                if let Some(else_block) = else_block {
                    self.generate(else_block)?;
                }
                self.emitter.label(&format!("end_{id}"));
            }
            NodeKind::While { body } => {
                let id = node.control_id.ok_or(CodegenError::MissingControlId)?;
                self.emitter.add(&format!("bz loop_end_{id}"), 0, 1)?;
                self.generate(body)?;
                self.emitter.add(&format!("b loop_start_{id}"), 0, 0)?;
                self.emitter.label(&format!("loop_end_{id}"));
            }
            NodeKind::FunctionCall { name, args } => {
                if let Some(builtin) = Builtin::from_name(name) {
                    self.emit_builtin(builtin, args)?;
                } else {
                    self.emitter
                        .add(&format!("callsub {name}"), 1, args.len())?;
                }
            }
            NodeKind::FunctionDeclaration { .. } | NodeKind::Block | NodeKind::Statement => {}
        }
        Ok(())
    }

    /// Stores the value on top of the compute stack into `symbol`'s slot,
    /// leaving the value in place so assignments work as expressions.
    fn emit_store(&mut self, symbol: &Symbol) -> Result<(), CodegenError> {
        if symbol.is_global {
            self.emitter.add("dup", 2, 1)?;
            self.emitter.add_with_comment(
                &format!("store {}", symbol.position),
                0,
                1,
                &symbol.name,
            )?;
        } else {
            self.emitter.add(&format!("int {}", symbol.position), 1, 0)?;
            self.emitter.add("load 0", 1, 0)?;
            self.emitter.add("+", 1, 2)?;
            self.emitter.add("dig 1", 1, 0)?;
            self.emitter.add_with_comment("stores", 0, 2, &symbol.name)?;
        }
        Ok(())
    }

    /// Emits one collected function: label, frame setup, parameter binding,
    /// body, shared epilogue. Functions declared inside the body are emitted
    /// right after it, in source order.
    fn emit_functions(&mut self, node: &mut Node) -> Result<(), CodegenError> {
        if matches!(node.kind, NodeKind::FunctionDeclaration { .. }) {
            self.emit_function(node)?;
            if let NodeKind::FunctionDeclaration { body, .. } = &mut node.kind {
                self.emit_functions(body)?;
            }
            return Ok(());
        }
        for child in &mut node.children {
            self.emit_functions(child)?;
        }
        Ok(())
    }

    fn emit_function(&mut self, node: &mut Node) -> Result<(), CodegenError> {
        let NodeKind::FunctionDeclaration { name, params, body } = &mut node.kind else {
            return Ok(());
        };
        let scope = node
            .scope
            .ok_or_else(|| CodegenError::MissingScope { name: name.clone() })?;
        let function = name.clone();
        // Frame slot 0 holds the caller's stack pointer; locals sit above it.
        let frame = self.tables.num_symbols(scope) + 1;

        self.emitter.section(Some(&function));
        self.emitter.label(&function);
        // The caller pushed one argument per parameter; they stay on the
        // compute stack until the binding loop below consumes them.
        self.emitter.assume_stack(params.len());
        self.emitter.add("load 0", 1, 0)?;
        self.emitter.add("load 0", 1, 0)?;
        self.emitter.add(&format!("int {frame}"), 1, 0)?;
        self.emitter.add("-", 1, 2)?;
        self.emitter.add("store 0", 0, 1)?;
        self.emitter.add("load 0", 1, 0)?;
        self.emitter.add("swap", 2, 2)?;
        self.emitter
            .add_with_comment("stores", 0, 2, "previous stack pointer")?;

        // Arguments arrive pushed in declaration order, so they come back
        // off the stack last parameter first.
        for param in params.iter().rev() {
            let symbol = self.tables.get(scope, param).ok_or_else(|| {
                CodegenError::MissingParameterSlot {
                    function: function.clone(),
                    param: param.clone(),
                }
            })?;
            self.emitter.add(&format!("int {}", symbol.position), 1, 0)?;
            self.emitter.add("load 0", 1, 0)?;
            self.emitter.add("+", 1, 2)?;
            self.emitter.add_with_comment("stores", 0, 2, param)?;
        }

        self.current_function = Some(function.clone());
        let body_result = self.generate(body);
        self.current_function = None;
        body_result?;

        self.emitter.label(&format!("{function}-cleanup"));
        self.emitter.reset_stack();
        self.emitter.add("load 0", 1, 0)?;
        self.emitter.add("loads", 1, 1)?;
        self.emitter.add("store 0", 0, 1)?;
        self.emitter.add("retsub", 0, 0)?;
        Ok(())
    }

    fn emit_builtin(&mut self, builtin: Builtin, args: &mut [Node]) -> Result<(), CodegenError> {
        if args.len() != builtin.arity() {
            return Err(CodegenError::BuiltinArity {
                name: builtin.name(),
                expected: builtin.arity(),
                found: args.len(),
            });
        }
        match builtin {
            Builtin::AppGlobalPut => {
                self.generate_all(args)?;
                self.emitter.add("app_global_put", 0, 2)?;
                self.push_dummy_result()?;
            }
            Builtin::AppGlobalGet => {
                self.generate_all(args)?;
                self.emitter.add("app_global_get", 1, 1)?;
            }
            Builtin::AppGlobalDel => {
                self.generate_all(args)?;
                self.emitter.add("app_global_del", 0, 1)?;
                self.push_dummy_result()?;
            }
            Builtin::AppLocalPut => {
                self.generate_all(args)?;
                self.emitter.add("app_local_put", 0, 3)?;
                self.push_dummy_result()?;
            }
            Builtin::AppLocalGet => {
                self.generate_all(args)?;
                self.emitter.add("app_local_get", 1, 2)?;
            }
            Builtin::AppLocalDel => {
                self.generate_all(args)?;
                self.emitter.add("app_local_del", 0, 2)?;
                self.push_dummy_result()?;
            }
            Builtin::Btoi => {
                self.generate_all(args)?;
                self.emitter.add("btoi", 1, 1)?;
            }
            Builtin::Itob => {
                self.generate_all(args)?;
                self.emitter.add("itob", 1, 1)?;
            }
            Builtin::Exit => {
                // Halts the program with the argument as its result, so no
                // placeholder value follows.
                self.generate_all(args)?;
                self.emitter.add("return", 0, 1)?;
            }
            Builtin::ItxnBegin => {
                self.emitter.add("itxn_begin", 0, 0)?;
                self.push_dummy_result()?;
            }
            Builtin::ItxnField => {
                let NodeKind::StringLiteral { value } = &args[0].kind else {
                    return Err(CodegenError::ItxnFieldName);
                };
                let field = value.clone();
                self.generate(&mut args[1])?;
                self.emitter.add(&format!("itxn_field {field}"), 0, 1)?;
                self.push_dummy_result()?;
            }
            Builtin::ItxnSubmit => {
                self.emitter.add("itxn_submit", 0, 0)?;
                self.push_dummy_result()?;
            }
        }
        Ok(())
    }

    fn generate_all(&mut self, args: &mut [Node]) -> Result<(), CodegenError> {
        for arg in args {
            self.generate(arg)?;
        }
        Ok(())
    }

    fn push_dummy_result(&mut self) -> Result<(), CodegenError> {
        self.emitter.add_with_comment("int 0", 1, 0, "dummy result")?;
        Ok(())
    }

    fn mint_control_id(&mut self) -> u32 {
        let id = self.next_control_id;
        self.next_control_id += 1;
        id
    }
}

fn contains_function(node: &Node) -> bool {
    if matches!(node.kind, NodeKind::FunctionDeclaration { .. }) {
        return true;
    }
    node.children.iter().any(contains_function)
}
