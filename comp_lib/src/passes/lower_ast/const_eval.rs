use super::symbol_table::{ScopeTree, SymbolKind};
use crate::structures::ast::{BinaryOp, Exp, ExpKind, UnaryOp};

/// Side-effect-free compile-time evaluation.
///
/// Recursively evaluates an expression to an `i32` if every leaf is a literal,
/// a `const int`, an element of a `const int[]` with an in-range literal
/// index, or an element of a never-written global array with a known
/// initializer. Calls, plain variables and division by a literal zero make
/// the whole expression non-constant; the visitor then falls back to
/// instruction emission.
pub fn eval_exp(scopes: &ScopeTree, exp: &Exp) -> Option<i32> {
    match &exp.kind {
        ExpKind::Number(value) => Some(*value),
        ExpKind::Unary { op, operand } => {
            let value = eval_exp(scopes, operand.as_ref())?;
            Some(match op {
                UnaryOp::Pos => value,
                UnaryOp::Neg => value.wrapping_neg(),
                UnaryOp::Not => (value == 0) as i32,
            })
        }
        ExpKind::Binary { op, lhs, rhs } => {
            let lhs = eval_exp(scopes, lhs.as_ref())?;
            let rhs = eval_exp(scopes, rhs.as_ref())?;
            match op {
                BinaryOp::Add => Some(lhs.wrapping_add(rhs)),
                BinaryOp::Sub => Some(lhs.wrapping_sub(rhs)),
                BinaryOp::Mul => Some(lhs.wrapping_mul(rhs)),
                BinaryOp::Div => (rhs != 0).then(|| lhs.wrapping_div(rhs)),
                BinaryOp::Mod => (rhs != 0).then(|| lhs.wrapping_rem(rhs)),
                BinaryOp::Lt => Some((lhs < rhs) as i32),
                BinaryOp::Gt => Some((lhs > rhs) as i32),
                BinaryOp::Le => Some((lhs <= rhs) as i32),
                BinaryOp::Ge => Some((lhs >= rhs) as i32),
                BinaryOp::Eq => Some((lhs == rhs) as i32),
                BinaryOp::Ne => Some((lhs != rhs) as i32),
                BinaryOp::And => Some((lhs != 0 && rhs != 0) as i32),
                BinaryOp::Or => Some((lhs != 0 || rhs != 0) as i32),
            }
        }
        ExpKind::LVal(lval) => {
            let symbol = scopes.lookup(&lval.ident.name)?;
            match (&symbol.kind, &lval.index) {
                (SymbolKind::ConstInt { value }, None) => Some(*value),
                (SymbolKind::ConstIntArray { values }, Some(index))
                | (SymbolKind::IntArray { frozen: Some(values), .. }, Some(index))
                | (SymbolKind::StaticIntArray { frozen: Some(values), .. }, Some(index)) => {
                    let index = eval_exp(scopes, index.as_ref())?;
                    values.get(usize::try_from(index).ok()?).copied()
                }
                _ => None,
            }
        }
        ExpKind::Call { .. } => None,
    }
}
