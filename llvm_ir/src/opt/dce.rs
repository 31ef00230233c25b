use crate::{InstKind, Module, ValueId};

fn is_removable(kind: &InstKind) -> bool {
    matches!(
        kind,
        InstKind::Alloca { .. }
            | InstKind::Binary { .. }
            | InstKind::Compare { .. }
            | InstKind::Logical { .. }
            | InstKind::ZExt { .. }
            | InstKind::Unary { .. }
            | InstKind::GetElementPtr { .. }
            | InstKind::Load { .. }
    )
}

/// Dead-code elimination.
///
/// First, allocas whose only uses are stores *into* them are dead: the stores
/// go, then the alloca. Then a worklist removes every side-effect-free
/// instruction with no remaining uses, re-enqueueing operands as they become
/// useless.
pub fn eliminate_dead_code(module: &mut Module, func: ValueId) -> bool {
    let mut changed = remove_dead_allocas(module, func);

    let mut worklist: Vec<ValueId> = Vec::new();
    for &block in module.blocks(func) {
        for &inst in module.insts(block) {
            if is_removable(module.inst(inst)) && module.use_count(inst) == 0 {
                worklist.push(inst);
            }
        }
    }

    while let Some(inst) = worklist.pop() {
        // An operand used twice by one dead instruction lands on the
        // worklist twice; the second entry is stale after the first removal.
        if !module.contains(inst) || module.use_count(inst) != 0 {
            continue;
        }
        let operands = module.inst(inst).operands();
        module.remove_inst(inst);
        changed = true;
        for op in operands {
            if module.value(op).is_inst()
                && is_removable(module.inst(op))
                && module.use_count(op) == 0
            {
                worklist.push(op);
            }
        }
    }
    changed
}

fn remove_dead_allocas(module: &mut Module, func: ValueId) -> bool {
    let mut dead = Vec::new();
    for &block in module.blocks(func) {
        for &inst in module.insts(block) {
            if !matches!(module.inst(inst), InstKind::Alloca { .. }) {
                continue;
            }
            let only_stored_into = module.users(inst).iter().all(|&user| {
                matches!(module.inst(user), InstKind::Store { value, addr }
                    if *addr == inst && *value != inst)
            });
            if only_stored_into && !module.users(inst).is_empty() {
                dead.push(inst);
            }
        }
    }

    let mut changed = false;
    for &alloca in &dead {
        for store in module.users(alloca).to_vec() {
            module.remove_inst(store);
        }
        module.remove_inst(alloca);
        changed = true;
    }
    changed
}
