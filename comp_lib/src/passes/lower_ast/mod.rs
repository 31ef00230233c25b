//! Lowers the AST to IR while enforcing the language rules.
//!
//! One pass over the tree: global declarations first, then function
//! definitions in order, `main` last. Semantic errors are reported to the
//! sink and lowering continues with best-effort IR; callers must inspect the
//! sink before trusting the module.

mod const_eval;
mod expr;
mod stmt;
pub mod symbol_table;
#[cfg(test)]
mod tests;

use crate::diagnostic::{Code, DiagnosticSink};
use crate::structures::ast::*;
use llvm_ir::{IrBuilder, Module, Type, ValueId};
use std::collections::HashSet;
use symbol_table::{ScopeTree, Symbol, SymbolKind};

pub struct Lowering {
    pub module: Module,
    pub scopes: ScopeTree,
}

pub fn build_ir_from_ast(ast: &CompUnit, sink: &mut DiagnosticSink) -> Lowering {
    let mut visitor = Visitor::new(sink, collect_written_arrays(ast));
    visitor.visit(ast);
    Lowering { module: visitor.module, scopes: visitor.scopes }
}

/// The externally-resolved runtime functions, injected before user code.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Builtins {
    pub getint: ValueId,
    pub putint: ValueId,
    pub putch: ValueId,
    pub putstr: ValueId,
}

struct Visitor<'d> {
    module: Module,
    scopes: ScopeTree,
    sink: &'d mut DiagnosticSink,
    builtins: Builtins,
    /// Names of arrays the program may write through; reads of other global
    /// arrays may fold to their initializer.
    written_arrays: HashSet<String>,
}

/// Per-function lowering context: the instruction builder plus everything the
/// expression and statement visitors share.
pub(crate) struct Cx<'a, 'm> {
    pub b: IrBuilder<'m>,
    pub scopes: &'a mut ScopeTree,
    pub sink: &'a mut DiagnosticSink,
    pub builtins: Builtins,
    pub ret_ty: FuncRetTy,
    pub written: &'a HashSet<String>,
}

impl<'d> Visitor<'d> {
    fn new(sink: &'d mut DiagnosticSink, written_arrays: HashSet<String>) -> Self {
        let mut module = Module::new();
        let mut scopes = ScopeTree::new();
        let builtins = inject_builtins(&mut module, &mut scopes);
        Self { module, scopes, sink, builtins, written_arrays }
    }

    fn visit(&mut self, ast: &CompUnit) {
        for decl in &ast.decls {
            self.visit_global_decl(decl);
        }
        for func in &ast.funcs {
            self.visit_func_def(func, false);
        }
        if let Some(main) = &ast.main {
            self.visit_func_def(main, true);
        }
    }

    fn visit_global_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Const(decl) => {
                for def in decl.defs.iter() {
                    declare_const(&mut self.module, &mut self.scopes, &mut *self.sink, def);
                }
            }
            Decl::Var(decl) => {
                for def in decl.defs.iter() {
                    declare_global_var(
                        &mut self.module,
                        &mut self.scopes,
                        &mut *self.sink,
                        def,
                        decl.is_static,
                        &self.written_arrays,
                    );
                }
            }
        }
    }

    fn visit_func_def(&mut self, func: &FuncDef, is_main: bool) {
        let name = &func.ident.name;
        let ret_ty = match func.ret_ty {
            FuncRetTy::Void => Type::Void,
            FuncRetTy::Int => Type::Int,
        };
        let param_tys: Vec<Type> = func
            .params
            .iter()
            .map(|param| {
                if param.is_array {
                    Type::decayed_int_array()
                } else {
                    Type::Int
                }
            })
            .collect();

        let redefined = self.scopes.exists_in_scope(name);
        if redefined {
            self.sink.report(func.ident.line, Code::Redefined, func.ident.span);
        }

        let params: Vec<(&str, Type)> = func
            .params
            .iter()
            .zip(&param_tys)
            .map(|(param, ty)| (param.ident.name.as_str(), ty.clone()))
            .collect();
        let func_id = self.module.add_function(name, ret_ty, &params, false);
        if is_main {
            self.module.set_entry(func_id);
        }

        if !redefined {
            let kind = match func.ret_ty {
                FuncRetTy::Void => SymbolKind::VoidFunc { params: param_tys },
                FuncRetTy::Int => SymbolKind::IntFunc { params: param_tys },
            };
            let _ = self.scopes.add(Symbol {
                name: name.clone(),
                line: func.ident.line,
                value: func_id,
                kind,
            });
        }

        self.scopes.push_scope();
        let args = self.module.function(func_id).params.clone();
        let mut cx = Cx {
            b: IrBuilder::new(&mut self.module, func_id),
            scopes: &mut self.scopes,
            sink: &mut *self.sink,
            builtins: self.builtins,
            ret_ty: func.ret_ty,
            written: &self.written_arrays,
        };

        for (param, &arg) in func.params.iter().zip(&args) {
            let symbol = if param.is_array {
                Symbol {
                    name: param.ident.name.clone(),
                    line: param.ident.line,
                    value: arg,
                    kind: SymbolKind::IntArray { len: llvm_ir::DECAYED, frozen: None },
                }
            } else {
                // Scalar arguments get a home in the entry block so that the
                // body can take their address uniformly.
                let slot = cx.b.alloca(Type::Int);
                cx.b.build_store(arg, slot);
                Symbol {
                    name: param.ident.name.clone(),
                    line: param.ident.line,
                    value: slot,
                    kind: SymbolKind::IntVar,
                }
            };
            if let Err(rejected) = cx.scopes.add(symbol) {
                cx.sink.report(rejected.line, Code::Redefined, param.ident.span);
            }
        }

        cx.visit_block(&func.body);

        // Single reporting site for a missing return: the end of the function
        // block, judged by its last item.
        if func.ret_ty == FuncRetTy::Int {
            let last_is_return = matches!(
                func.body.items.last(),
                Some(BlockItem::Stmt(Stmt { kind: StmtKind::Return(_), .. }))
            );
            if !last_is_return {
                cx.sink.report(
                    func.body.end_line,
                    Code::MissingReturn,
                    crate::diagnostic::Span::default(),
                );
            }
        }
        // Close a still-open block so every reachable block ends terminated.
        match func.ret_ty {
            FuncRetTy::Void => cx.b.build_return(None),
            FuncRetTy::Int => {
                if cx.b.current_block().is_some() {
                    let zero = cx.b.const_int(0);
                    cx.b.build_return(Some(zero));
                }
            }
        }

        self.scopes.pop_scope();
    }
}

fn inject_builtins(module: &mut Module, scopes: &mut ScopeTree) -> Builtins {
    let getint = module.add_function("getint", Type::Int, &[], true);
    let putint = module.add_function("putint", Type::Void, &[("x", Type::Int)], true);
    let putch = module.add_function("putch", Type::Void, &[("c", Type::Int)], true);
    let putstr =
        module.add_function("putstr", Type::Void, &[("s", Type::decayed_int_array())], true);

    let entries: [(&str, ValueId, SymbolKind); 4] = [
        ("getint", getint, SymbolKind::IntFunc { params: vec![] }),
        ("putint", putint, SymbolKind::VoidFunc { params: vec![Type::Int] }),
        ("putch", putch, SymbolKind::VoidFunc { params: vec![Type::Int] }),
        (
            "putstr",
            putstr,
            SymbolKind::VoidFunc { params: vec![Type::decayed_int_array()] },
        ),
    ];
    for (name, value, kind) in entries {
        let _ = scopes.add(Symbol { name: name.into(), line: 0, value, kind });
    }
    Builtins { getint, putint, putch, putstr }
}

// ---- shared declaration lowering ---------------------------------------

/// Resolves the declared element count of an array definition. A
/// non-constant or missing length falls back to the initializer size.
fn resolve_len(scopes: &ScopeTree, len: &Exp, init_len: usize) -> i32 {
    const_eval::eval_exp(scopes, len)
        .filter(|n| *n >= 0)
        .unwrap_or(init_len as i32)
}

fn const_init_values(scopes: &ScopeTree, init: &InitVal, len: usize) -> Vec<i32> {
    let mut values: Vec<i32> = match init {
        InitVal::Scalar(exp) => vec![const_eval::eval_exp(scopes, exp).unwrap_or(0)],
        InitVal::List(elems) => elems
            .iter()
            .map(|elem| const_eval::eval_exp(scopes, elem).unwrap_or(0))
            .collect(),
    };
    values.resize(len, 0);
    values
}

pub(crate) fn declare_const(
    module: &mut Module,
    scopes: &mut ScopeTree,
    sink: &mut DiagnosticSink,
    def: &ConstDef,
) {
    let ident = &def.ident;
    let symbol = match &def.len {
        None => {
            let value = match &def.init {
                InitVal::Scalar(exp) => const_eval::eval_exp(scopes, exp).unwrap_or(0),
                InitVal::List(_) => 0,
            };
            Symbol {
                name: ident.name.clone(),
                line: ident.line,
                value: module.const_int(value),
                kind: SymbolKind::ConstInt { value },
            }
        }
        Some(len) => {
            let init_len = match &def.init {
                InitVal::List(elems) => elems.len(),
                InitVal::Scalar(_) => 0,
            };
            let len = resolve_len(scopes, len, init_len);
            let values = const_init_values(scopes, &def.init, len.max(0) as usize);
            let initializer = module.const_array(values.clone());
            let global = module.add_global(
                &ident.name,
                Type::int_array(len),
                Some(initializer),
                true,
            );
            Symbol {
                name: ident.name.clone(),
                line: ident.line,
                value: global,
                kind: SymbolKind::ConstIntArray { values },
            }
        }
    };
    if let Err(rejected) = scopes.add(symbol) {
        sink.report(rejected.line, Code::Redefined, ident.span);
    }
}

/// Lowers a global or `static` variable definition: storage is a module
/// global, zero-initialized unless the initializer is given.
pub(crate) fn declare_global_var(
    module: &mut Module,
    scopes: &mut ScopeTree,
    sink: &mut DiagnosticSink,
    def: &VarDef,
    is_static: bool,
    written: &HashSet<String>,
) {
    let ident = &def.ident;
    let symbol = match &def.len {
        None => {
            let initializer = def.init.as_ref().map(|init| {
                let value = const_init_values(scopes, init, 1)[0];
                module.const_int(value)
            });
            let global = module.add_global(&ident.name, Type::Int, initializer, false);
            Symbol {
                name: ident.name.clone(),
                line: ident.line,
                value: global,
                kind: if is_static { SymbolKind::StaticInt } else { SymbolKind::IntVar },
            }
        }
        Some(len) => {
            let init_len = match &def.init {
                Some(InitVal::List(elems)) => elems.len(),
                _ => 0,
            };
            let len = resolve_len(scopes, len, init_len);
            let values: Vec<i32> = match &def.init {
                Some(init) => const_init_values(scopes, init, len.max(0) as usize),
                None => vec![0; len.max(0) as usize],
            };
            let initializer = def
                .init
                .as_ref()
                .map(|_| module.const_array(values.clone()));
            // When nothing in the program ever writes through the array, it
            // is effectively constant: reads may fold to the initializer and
            // the global is emitted read-only.
            let frozen = (!written.contains(&ident.name)).then(|| values.clone());
            let global = module.add_global(
                &ident.name,
                Type::int_array(len),
                initializer,
                frozen.is_some(),
            );
            Symbol {
                name: ident.name.clone(),
                line: ident.line,
                value: global,
                kind: if is_static {
                    SymbolKind::StaticIntArray { len, frozen }
                } else {
                    SymbolKind::IntArray { len, frozen }
                },
            }
        }
    };
    if let Err(rejected) = scopes.add(symbol) {
        sink.report(rejected.line, Code::Redefined, ident.span);
    }
}

// ---- write-set pre-pass ------------------------------------------------

/// Names that may be written through as arrays: assignment targets, and bare
/// array names passed to calls (the callee may store through the decayed
/// address). Scoping is ignored, which only costs folding opportunities.
fn collect_written_arrays(ast: &CompUnit) -> HashSet<String> {
    let mut written = HashSet::new();
    for func in ast.funcs.iter().chain(&ast.main) {
        collect_block(&func.body, &mut written);
    }
    written
}

fn collect_block(block: &Block, written: &mut HashSet<String>) {
    for item in &block.items {
        match item {
            BlockItem::Decl(_) => {}
            BlockItem::Stmt(stmt) => collect_stmt(stmt, written),
        }
    }
}

fn collect_stmt(stmt: &Stmt, written: &mut HashSet<String>) {
    match &stmt.kind {
        StmtKind::Assign(assign) => collect_assign(assign, written),
        StmtKind::Exp(exp) => {
            if let Some(exp) = exp {
                collect_exp(exp, written);
            }
        }
        StmtKind::Block(block) => collect_block(block, written),
        StmtKind::If { cond, then_branch, else_branch } => {
            collect_exp(cond, written);
            collect_stmt(then_branch.as_ref(), written);
            if let Some(else_branch) = else_branch {
                collect_stmt(else_branch.as_ref(), written);
            }
        }
        StmtKind::For { init, cond, step, body } => {
            if let Some(ForInit::Assigns(assigns)) = init {
                assigns.iter().for_each(|assign| collect_assign(assign, written));
            }
            if let Some(cond) = cond {
                collect_exp(cond, written);
            }
            if let Some(step) = step {
                step.iter().for_each(|assign| collect_assign(assign, written));
            }
            collect_stmt(body.as_ref(), written);
        }
        StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Return(exp) => {
            if let Some(exp) = exp {
                collect_exp(exp, written);
            }
        }
        StmtKind::Printf { args, .. } => args.iter().for_each(|arg| collect_exp(arg, written)),
    }
}

fn collect_assign(assign: &Assign, written: &mut HashSet<String>) {
    written.insert(assign.target.ident.name.clone());
    if let Some(index) = &assign.target.index {
        collect_exp(index.as_ref(), written);
    }
    collect_exp(&assign.value, written);
}

fn collect_exp(exp: &Exp, written: &mut HashSet<String>) {
    match &exp.kind {
        ExpKind::Number(_) => {}
        ExpKind::LVal(lval) => {
            if let Some(index) = &lval.index {
                collect_exp(index.as_ref(), written);
            }
        }
        ExpKind::Call { args, .. } => {
            for arg in args {
                if let ExpKind::LVal(lval) = &arg.kind {
                    if lval.index.is_none() {
                        written.insert(lval.ident.name.clone());
                    }
                }
                collect_exp(arg, written);
            }
        }
        ExpKind::Unary { operand, .. } => collect_exp(operand.as_ref(), written),
        ExpKind::Binary { lhs, rhs, .. } => {
            collect_exp(lhs.as_ref(), written);
            collect_exp(rhs.as_ref(), written);
        }
    }
}
