use crate::{BinaryOp, InstKind, Module, ValueId};

/// Replaces instructions whose inputs are all constant with the evaluated
/// `ConstInt`, and applies the algebraic identities (`x+0`, `x*1`, `x*0`,
/// `x%1`, …). Division and modulo by a literal zero are left untouched.
///
/// Replacement rewires users with `replace_all_uses_with`, then removes the
/// dead definition.
pub fn const_fold(module: &mut Module, func: ValueId) -> bool {
    let mut changed = false;
    for block in module.blocks(func).to_vec() {
        let mut dead = Vec::new();
        for inst in module.insts(block).to_vec() {
            let Some(replacement) = fold(module, inst) else {
                continue;
            };
            module.replace_all_uses_with(inst, replacement);
            dead.push(inst);
            changed = true;
        }
        for inst in dead {
            module.remove_inst(inst);
        }
    }
    changed
}

fn fold(module: &mut Module, inst: ValueId) -> Option<ValueId> {
    let ty = module.ty(inst).clone();
    match module.inst(inst).clone() {
        InstKind::Binary { op, lhs, rhs } => {
            let lc = module.as_const_int(lhs);
            let rc = module.as_const_int(rhs);
            if let (Some(l), Some(r)) = (lc, rc) {
                let value = op.eval(l, r)?;
                return Some(module.const_int_of(ty, value));
            }
            match op {
                BinaryOp::Add => match (lc, rc) {
                    (Some(0), _) => Some(rhs),
                    (_, Some(0)) => Some(lhs),
                    _ => None,
                },
                BinaryOp::Sub => (rc == Some(0)).then_some(lhs),
                BinaryOp::Mul => match (lc, rc) {
                    (Some(0), _) | (_, Some(0)) => Some(module.const_int_of(ty, 0)),
                    (Some(1), _) => Some(rhs),
                    (_, Some(1)) => Some(lhs),
                    _ => None,
                },
                BinaryOp::Div => (rc == Some(1)).then_some(lhs),
                BinaryOp::Mod => (rc == Some(1)).then(|| module.const_int_of(ty, 0)),
            }
        }
        InstKind::Compare { op, lhs, rhs } => {
            let l = module.as_const_int(lhs)?;
            let r = module.as_const_int(rhs)?;
            Some(module.const_int_of(ty, op.eval(l, r) as i32))
        }
        InstKind::Logical { op, lhs, rhs } => {
            let l = module.as_const_int(lhs)?;
            let r = module.as_const_int(rhs)?;
            Some(module.const_int_of(ty, op.eval(l, r) as i32))
        }
        InstKind::Unary { op, operand } => {
            let v = module.as_const_int(operand)?;
            Some(module.const_int_of(ty, op.eval(v)))
        }
        InstKind::ZExt { operand } => {
            let v = module.as_const_int(operand)?;
            Some(module.const_int_of(ty, (v != 0) as i32))
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{IrBuilder, Type};

    #[test]
    fn folds_cascade_within_one_pass() {
        let mut module = Module::new();
        let func = module.add_function("f", Type::Int, &[], false);
        let mut b = IrBuilder::new(&mut module, func);
        let two = b.const_int(2);
        let three = b.const_int(3);
        let product = b.build_binary(BinaryOp::Mul, two, three);
        let sum = b.build_binary(BinaryOp::Add, product, two);
        b.build_return(Some(sum));

        assert!(const_fold(&mut module, func));
        let entry = module.entry_block(func);
        let insts = module.insts(entry);
        assert_eq!(insts.len(), 1, "both arithmetic instructions fold away");
        match module.inst(insts[0]) {
            InstKind::Return { value: Some(value) } => {
                assert_eq!(module.as_const_int(*value), Some(8));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn identity_applies_to_unknown_operands() {
        let mut module = Module::new();
        let func = module.add_function("f", Type::Int, &[], false);
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        let x = b.build_load(slot);
        let zero = b.const_int(0);
        // Append directly so the build-time simplifier cannot intervene.
        let entry = b.module().entry_block(func);
        let sum = b.module_mut().append_inst(
            entry,
            InstKind::Binary { op: BinaryOp::Add, lhs: x, rhs: zero },
            Type::Int,
        );
        b.build_return(Some(sum));

        assert!(const_fold(&mut module, func));
        let entry = module.entry_block(func);
        let last = *module.insts(entry).last().unwrap();
        match module.inst(last) {
            InstKind::Return { value: Some(value) } => assert_eq!(*value, x),
            other => panic!("unexpected {other:?}"),
        }
    }
}
