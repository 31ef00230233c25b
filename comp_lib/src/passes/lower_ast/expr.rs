//! Expression lowering.

use super::const_eval;
use super::symbol_table::SymbolKind;
use super::Cx;
use crate::diagnostic::Code;
use crate::structures::ast::{BinaryOp, Exp, ExpKind, Ident, LVal, UnaryOp};
use llvm_ir::{
    BinaryOp as IrBinaryOp, CompareOp, LogicalOp, Type, UnaryOp as IrUnaryOp, ValueId,
};

impl Cx<'_, '_> {
    /// Lowers an expression to a 32-bit value; booleans are widened.
    pub fn visit_int_exp(&mut self, exp: &Exp) -> ValueId {
        let value = self.visit_exp(exp);
        self.as_int(value)
    }

    /// Widens a boolean to 32 bits on consumption; other values pass through.
    pub fn as_int(&mut self, value: ValueId) -> ValueId {
        match self.b.module().ty(value) {
            Type::Bool => self.b.build_zext(value),
            _ => value,
        }
    }

    /// Lowers an expression. The result is `Int`, `Bool` (from comparisons
    /// and logical operators), or an array base when a bare array name is
    /// used (only meaningful as a call argument).
    pub fn visit_exp(&mut self, exp: &Exp) -> ValueId {
        // Fold the whole expression first; emission happens only when some
        // leaf is not compile-time constant.
        if let Some(value) = const_eval::eval_exp(self.scopes, exp) {
            return self.b.const_int(value);
        }
        match &exp.kind {
            ExpKind::Number(value) => self.b.const_int(*value),
            ExpKind::LVal(lval) => self.read_lval(lval),
            ExpKind::Call { ident, args } => self.visit_call(ident, args),
            ExpKind::Unary { op, operand } => {
                let op = match op {
                    UnaryOp::Pos => IrUnaryOp::Pos,
                    UnaryOp::Neg => IrUnaryOp::Neg,
                    UnaryOp::Not => IrUnaryOp::Not,
                };
                let operand = self.visit_int_exp(operand.as_ref());
                self.b.build_unary(op, operand)
            }
            ExpKind::Binary { op, lhs, rhs } => {
                let lhs = self.visit_int_exp(lhs.as_ref());
                let rhs = self.visit_int_exp(rhs.as_ref());
                match op {
                    BinaryOp::Add => self.b.build_binary(IrBinaryOp::Add, lhs, rhs),
                    BinaryOp::Sub => self.b.build_binary(IrBinaryOp::Sub, lhs, rhs),
                    BinaryOp::Mul => self.b.build_binary(IrBinaryOp::Mul, lhs, rhs),
                    BinaryOp::Div => self.b.build_binary(IrBinaryOp::Div, lhs, rhs),
                    BinaryOp::Mod => self.b.build_binary(IrBinaryOp::Mod, lhs, rhs),
                    BinaryOp::Lt => self.b.build_compare(CompareOp::Lt, lhs, rhs),
                    BinaryOp::Gt => self.b.build_compare(CompareOp::Gt, lhs, rhs),
                    BinaryOp::Le => self.b.build_compare(CompareOp::Le, lhs, rhs),
                    BinaryOp::Ge => self.b.build_compare(CompareOp::Ge, lhs, rhs),
                    BinaryOp::Eq => self.b.build_compare(CompareOp::Eq, lhs, rhs),
                    BinaryOp::Ne => self.b.build_compare(CompareOp::Ne, lhs, rhs),
                    BinaryOp::And => self.b.build_logical(LogicalOp::And, lhs, rhs),
                    BinaryOp::Or => self.b.build_logical(LogicalOp::Or, lhs, rhs),
                }
            }
        }
    }

    /// Reads an lvalue. Constants with a known literal value were already
    /// folded by the caller; what remains loads through the address, except
    /// for a bare array name, which yields the array base itself.
    fn read_lval(&mut self, lval: &LVal) -> ValueId {
        let Some(symbol) = self.scopes.lookup(&lval.ident.name).cloned() else {
            self.sink.report(lval.ident.line, Code::Undefined, lval.ident.span);
            return self.b.const_int(0);
        };
        match (&symbol.kind, &lval.index) {
            (SymbolKind::ConstInt { value }, _) => {
                let value = *value;
                self.b.const_int(value)
            }
            (SymbolKind::IntFunc { .. } | SymbolKind::VoidFunc { .. }, _) => {
                self.b.const_int(0)
            }
            (_, None) if symbol.kind.is_array() => symbol.value,
            (_, None) => self.b.build_load(symbol.value),
            (_, Some(index)) if symbol.kind.is_array() => {
                let index = self.visit_int_exp(index.as_ref());
                let addr = self.element_addr(symbol.value, index);
                self.b.build_load(addr)
            }
            // Indexing a scalar: evaluate the index for its effects and read
            // the scalar anyway.
            (_, Some(index)) => {
                self.visit_int_exp(index.as_ref());
                self.b.build_load(symbol.value)
            }
        }
    }

    /// The address of one array element. A sized base is indexed `[0, i]`,
    /// a decayed base `[i]`.
    pub fn element_addr(&mut self, base: ValueId, index: ValueId) -> ValueId {
        let indices = if self.b.module().ty(base).is_decayed() {
            vec![index]
        } else {
            let zero = self.b.const_int(0);
            vec![zero, index]
        };
        self.b.build_gep(base, indices)
    }

    /// The address an assignment to `lval` stores through, or `None` when
    /// the name does not resolve to addressable storage.
    pub fn lval_addr(&mut self, lval: &LVal) -> Option<ValueId> {
        let symbol = self.scopes.lookup(&lval.ident.name).cloned()?;
        if symbol.kind.is_function() || matches!(symbol.kind, SymbolKind::ConstInt { .. }) {
            return None;
        }
        match &lval.index {
            Some(index) if symbol.kind.is_array() => {
                let index = self.visit_int_exp(index.as_ref());
                Some(self.element_addr(symbol.value, index))
            }
            Some(index) => {
                self.visit_int_exp(index.as_ref());
                Some(symbol.value)
            }
            None if symbol.kind.is_array() => None,
            None => Some(symbol.value),
        }
    }

    fn visit_call(&mut self, ident: &Ident, args: &[Exp]) -> ValueId {
        let Some(symbol) = self.scopes.lookup_function(&ident.name).cloned() else {
            self.sink.report(ident.line, Code::Undefined, ident.span);
            for arg in args {
                self.visit_exp(arg);
            }
            return self.b.const_int(0);
        };
        let params = match &symbol.kind {
            SymbolKind::IntFunc { params } | SymbolKind::VoidFunc { params } => params.clone(),
            _ => unreachable!("lookup_function returns function symbols"),
        };

        if args.len() != params.len() {
            self.sink.report(ident.line, Code::ArgCountMismatch, ident.span);
        }

        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            values.push(self.visit_arg(arg, params.get(i)));
        }
        self.b.build_call(symbol.value, values)
    }

    /// Lowers one call argument and checks its shape against the parameter.
    /// A sized array passed to an unsized parameter decays via `GEP [0, 0]`.
    fn visit_arg(&mut self, arg: &Exp, expected: Option<&Type>) -> ValueId {
        let raw = self.visit_exp(arg);
        let value = if self.b.module().ty(raw).is_array() {
            raw
        } else {
            self.as_int(raw)
        };
        let Some(expected) = expected else {
            return value;
        };
        let actual = self.b.module().ty(value).clone();
        if !actual.decays_to(expected) {
            self.sink.report(arg.line, Code::ArgTypeMismatch, arg.span);
            return value;
        }
        if actual.is_array() && !actual.is_decayed() && expected.is_decayed() {
            let zero = self.b.const_int(0);
            let zero2 = self.b.const_int(0);
            return self.b.build_gep(value, vec![zero, zero2]);
        }
        value
    }

    /// Short-circuit lowering for control context: branches directly without
    /// materializing a boolean. `||` jumps to the true target as soon as one
    /// alternative holds, `&&` to the false target as soon as one fails; a
    /// constant condition collapses to an unconditional jump.
    pub fn visit_cond(&mut self, cond: &Exp, true_block: ValueId, false_block: ValueId) {
        if let Some(value) = const_eval::eval_exp(self.scopes, cond) {
            let target = if value != 0 { true_block } else { false_block };
            self.b.build_jump(target);
            return;
        }
        match &cond.kind {
            ExpKind::Binary { op: BinaryOp::Or, lhs, rhs } => {
                let rhs_block = self.b.new_block("lor.rhs");
                self.visit_cond(lhs.as_ref(), true_block, rhs_block);
                self.b.position_at(rhs_block);
                self.visit_cond(rhs.as_ref(), true_block, false_block);
            }
            ExpKind::Binary { op: BinaryOp::And, lhs, rhs } => {
                let rhs_block = self.b.new_block("land.rhs");
                self.visit_cond(lhs.as_ref(), rhs_block, false_block);
                self.b.position_at(rhs_block);
                self.visit_cond(rhs.as_ref(), true_block, false_block);
            }
            ExpKind::Binary { op, lhs, rhs } if op.is_boolean() => {
                let op = match op {
                    BinaryOp::Lt => CompareOp::Lt,
                    BinaryOp::Gt => CompareOp::Gt,
                    BinaryOp::Le => CompareOp::Le,
                    BinaryOp::Ge => CompareOp::Ge,
                    BinaryOp::Eq => CompareOp::Eq,
                    BinaryOp::Ne => CompareOp::Ne,
                    _ => unreachable!("and/or handled above"),
                };
                let lhs = self.visit_int_exp(lhs.as_ref());
                let rhs = self.visit_int_exp(rhs.as_ref());
                let cond = self.b.build_compare(op, lhs, rhs);
                self.b.build_branch(cond, true_block, false_block);
            }
            ExpKind::Unary { op: UnaryOp::Not, operand } => {
                self.visit_cond(operand.as_ref(), false_block, true_block);
            }
            _ => {
                let value = self.visit_int_exp(cond);
                let zero = self.b.const_int(0);
                let cond = self.b.build_compare(CompareOp::Ne, value, zero);
                self.b.build_branch(cond, true_block, false_block);
            }
        }
    }
}
