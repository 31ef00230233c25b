//! Statement and local-declaration lowering.

use super::symbol_table::{Symbol, SymbolKind};
use super::Cx;
use crate::diagnostic::Code;
use crate::structures::ast::*;
use llvm_ir::{LoopTargets, Type};

impl Cx<'_, '_> {
    pub fn visit_block(&mut self, block: &Block) {
        for item in &block.items {
            match item {
                BlockItem::Decl(decl) => self.visit_decl(decl),
                BlockItem::Stmt(stmt) => self.visit_stmt(stmt),
            }
        }
    }

    pub fn visit_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Const(decl) => {
                for def in decl.defs.iter() {
                    super::declare_const(
                        self.b.module_mut(),
                        &mut *self.scopes,
                        &mut *self.sink,
                        def,
                    );
                }
            }
            // A static local persists across calls: storage is a module
            // global, only the name is scoped here.
            Decl::Var(decl) if decl.is_static => {
                for def in decl.defs.iter() {
                    super::declare_global_var(
                        self.b.module_mut(),
                        &mut *self.scopes,
                        &mut *self.sink,
                        def,
                        true,
                        self.written,
                    );
                }
            }
            Decl::Var(decl) => {
                for def in decl.defs.iter() {
                    self.declare_local_var(def);
                }
            }
        }
    }

    fn declare_local_var(&mut self, def: &VarDef) {
        let ident = &def.ident;
        let symbol = match &def.len {
            None => {
                let slot = self.b.alloca(Type::Int);
                if let Some(init) = &def.init {
                    let value = match init {
                        InitVal::Scalar(exp) => self.visit_int_exp(exp),
                        InitVal::List(elems) => match elems.first() {
                            Some(exp) => self.visit_int_exp(exp),
                            None => self.b.const_int(0),
                        },
                    };
                    self.b.build_store(value, slot);
                }
                Symbol {
                    name: ident.name.clone(),
                    line: ident.line,
                    value: slot,
                    kind: SymbolKind::IntVar,
                }
            }
            Some(len) => {
                let init_len = match &def.init {
                    Some(InitVal::List(elems)) => elems.len(),
                    _ => 0,
                };
                let len = super::resolve_len(self.scopes, len, init_len);
                let slot = self.b.alloca(Type::int_array(len));
                if let Some(InitVal::List(elems)) = &def.init {
                    for (i, elem) in elems.iter().enumerate() {
                        let value = self.visit_int_exp(elem);
                        let index = self.b.const_int(i as i32);
                        let addr = self.element_addr(slot, index);
                        self.b.build_store(value, addr);
                    }
                }
                Symbol {
                    name: ident.name.clone(),
                    line: ident.line,
                    value: slot,
                    kind: SymbolKind::IntArray { len, frozen: None },
                }
            }
        };
        if let Err(rejected) = self.scopes.add(symbol) {
            self.sink.report(rejected.line, Code::Redefined, ident.span);
        }
    }

    pub fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Assign(assign) => self.visit_assign(assign),
            StmtKind::Exp(Some(exp)) => {
                self.visit_exp(exp);
            }
            StmtKind::Exp(None) => {}
            StmtKind::Block(block) => {
                self.scopes.push_scope();
                self.visit_block(block);
                self.scopes.pop_scope();
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.visit_if(cond, then_branch.as_ref(), else_branch.as_deref());
            }
            StmtKind::For { init, cond, step, body } => {
                let step = step.as_ref().map(|assigns| assigns.as_slice());
                self.visit_for(init.as_ref(), cond.as_ref(), step, body.as_ref());
            }
            StmtKind::Break => match self.b.innermost_loop() {
                Some(targets) => self.b.build_jump(targets.break_to),
                None => {
                    self.sink.report(stmt.line, Code::JumpOutsideLoop, Default::default());
                }
            },
            StmtKind::Continue => match self.b.innermost_loop() {
                Some(targets) => self.b.build_jump(targets.continue_to),
                None => {
                    self.sink.report(stmt.line, Code::JumpOutsideLoop, Default::default());
                }
            },
            StmtKind::Return(value) => self.visit_return(value.as_ref(), stmt.line),
            StmtKind::Printf { format, args } => self.visit_printf(format, args, stmt.line),
        }
    }

    fn visit_assign(&mut self, assign: &Assign) {
        let target = &assign.target;
        match self.scopes.lookup(&target.ident.name) {
            None => {
                self.sink.report(assign.line, Code::Undefined, target.ident.span);
                self.visit_exp(&assign.value);
                return;
            }
            Some(symbol) if symbol.kind.is_const() => {
                self.sink.report(assign.line, Code::AssignToConst, target.ident.span);
                self.visit_exp(&assign.value);
                return;
            }
            Some(_) => {}
        }
        let value = self.visit_int_exp(&assign.value);
        if let Some(addr) = self.lval_addr(target) {
            self.b.build_store(value, addr);
        }
    }

    fn visit_if(&mut self, cond: &Exp, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let then_block = self.b.new_block("if.then");
        let else_block = else_branch.map(|_| self.b.new_block("if.else"));
        let end_block = self.b.new_block("if.end");

        self.visit_cond(cond, then_block, else_block.unwrap_or(end_block));

        self.b.position_at(then_block);
        self.visit_stmt(then_branch);
        self.b.build_jump(end_block);

        if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
            self.b.position_at(else_block);
            self.visit_stmt(else_branch);
            self.b.build_jump(end_block);
        }

        self.b.position_at(end_block);
    }

    fn visit_for(
        &mut self,
        init: Option<&ForInit>,
        cond: Option<&Exp>,
        step: Option<&[Assign]>,
        body: &Stmt,
    ) {
        // A declaration in the init clause scopes its names to the whole
        // loop.
        let scoped = matches!(init, Some(ForInit::Decl(_)));
        if scoped {
            self.scopes.push_scope();
        }
        match init {
            Some(ForInit::Decl(decl)) => self.visit_decl(decl),
            Some(ForInit::Assigns(assigns)) => {
                for assign in assigns.iter() {
                    self.visit_assign(assign);
                }
            }
            None => {}
        }

        let cond_block = self.b.new_block("for.cond");
        let body_block = self.b.new_block("for.body");
        let step_block = self.b.new_block("for.step");
        let end_block = self.b.new_block("for.end");

        self.b.build_jump(cond_block);

        self.b.position_at(cond_block);
        match cond {
            Some(cond) => self.visit_cond(cond, body_block, end_block),
            // The condition defaults to true.
            None => self.b.build_jump(body_block),
        }

        self.b.position_at(body_block);
        self.b.push_loop(LoopTargets { break_to: end_block, continue_to: step_block });
        self.visit_stmt(body);
        self.b.pop_loop();
        self.b.build_jump(step_block);

        self.b.position_at(step_block);
        if let Some(assigns) = step {
            for assign in assigns {
                self.visit_assign(assign);
            }
        }
        self.b.build_jump(cond_block);

        self.b.position_at(end_block);
        if scoped {
            self.scopes.pop_scope();
        }
    }

    fn visit_return(&mut self, value: Option<&Exp>, line: u32) {
        match (self.ret_ty, value) {
            (FuncRetTy::Void, Some(exp)) => {
                self.sink.report(line, Code::ReturnValueInVoid, exp.span);
                self.visit_exp(exp);
                self.b.build_return(None);
            }
            (FuncRetTy::Void, None) => self.b.build_return(None),
            (FuncRetTy::Int, Some(exp)) => {
                let value = self.visit_int_exp(exp);
                self.b.build_return(Some(value));
            }
            // A bare `return` in an int function returns zero; whether the
            // function can fall off its end is judged separately.
            (FuncRetTy::Int, None) => {
                let zero = self.b.const_int(0);
                self.b.build_return(Some(zero));
            }
        }
    }

    /// Expands a printf into `putint`/`putch` calls, reading the format one
    /// character at a time. `%d` consumes one argument, `\n` prints a
    /// newline, everything else prints as itself. The surrounding quotes
    /// were already stripped by the lexer.
    fn visit_printf(&mut self, format: &str, args: &[Exp], line: u32) {
        let specifiers = format.matches("%d").count();
        if specifiers != args.len() {
            self.sink.report(line, Code::PrintfArgMismatch, Default::default());
        }

        let values: Vec<_> = args.iter().map(|arg| self.visit_int_exp(arg)).collect();
        let mut next_value = values.into_iter();

        let bytes = format.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' && bytes.get(i + 1) == Some(&b'd') {
                if let Some(value) = next_value.next() {
                    self.b.build_call(self.builtins.putint, vec![value]);
                }
                i += 2;
            } else if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'n') {
                let newline = self.b.const_int('\n' as i32);
                self.b.build_call(self.builtins.putch, vec![newline]);
                i += 2;
            } else {
                let ch = self.b.const_int(bytes[i] as i32);
                self.b.build_call(self.builtins.putch, vec![ch]);
                i += 1;
            }
        }
    }
}
