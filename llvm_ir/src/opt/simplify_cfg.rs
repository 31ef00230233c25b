use crate::{InstKind, Module, ValueId, ValueKind};
use std::collections::{HashSet, VecDeque};

/// CFG simplification, iterated until nothing changes:
///
/// 1. `Branch` on a constant condition becomes a `Jump` to the taken side.
/// 2. Blocks unreachable from the entry block (breadth-first over terminator
///    edges) are dropped.
/// 3. A non-entry block whose only instruction is `Jump(T)` is merged away by
///    retargeting every predecessor terminator to `T`.
pub fn simplify_cfg(module: &mut Module, func: ValueId) -> bool {
    let mut changed = false;
    loop {
        let step = fold_constant_branches(module, func)
            | remove_unreachable_blocks(module, func)
            | merge_forwarding_blocks(module, func);
        if !step {
            break;
        }
        changed = true;
    }
    changed
}

fn fold_constant_branches(module: &mut Module, func: ValueId) -> bool {
    let mut changed = false;
    for block in module.blocks(func).to_vec() {
        let Some(term) = module.terminator(block) else {
            continue;
        };
        let InstKind::Branch { cond, then_block, else_block } = *module.inst(term) else {
            continue;
        };
        let Some(taken) = module.as_const_int(cond) else {
            continue;
        };
        let target = if taken != 0 { then_block } else { else_block };
        module.remove_inst(term);
        module.append_inst(block, InstKind::Jump { target }, crate::Type::Void);
        changed = true;
    }
    changed
}

fn successors(module: &Module, block: ValueId) -> Vec<ValueId> {
    match module.terminator(block).map(|term| module.inst(term)) {
        Some(InstKind::Jump { target }) => vec![*target],
        Some(InstKind::Branch { then_block, else_block, .. }) => vec![*then_block, *else_block],
        _ => Vec::new(),
    }
}

fn remove_unreachable_blocks(module: &mut Module, func: ValueId) -> bool {
    let entry = module.entry_block(func);
    let mut reachable = HashSet::from([entry]);
    let mut queue = VecDeque::from([entry]);
    while let Some(block) = queue.pop_front() {
        for succ in successors(module, block) {
            if reachable.insert(succ) {
                queue.push_back(succ);
            }
        }
    }

    let dead: Vec<ValueId> = module
        .blocks(func)
        .iter()
        .copied()
        .filter(|block| !reachable.contains(block))
        .collect();
    if dead.is_empty() {
        return false;
    }
    module.remove_blocks(func, &dead);
    true
}

fn merge_forwarding_blocks(module: &mut Module, func: ValueId) -> bool {
    let entry = module.entry_block(func);
    let mut changed = false;
    loop {
        let Some((block, target)) = find_forwarding_block(module, func, entry) else {
            return changed;
        };
        for other in module.blocks(func).to_vec() {
            if other == block {
                continue;
            }
            if let Some(term) = module.terminator(other) {
                retarget(module, term, block, target);
            }
        }
        module.remove_blocks(func, &[block]);
        changed = true;
    }
}

fn find_forwarding_block(
    module: &Module,
    func: ValueId,
    entry: ValueId,
) -> Option<(ValueId, ValueId)> {
    for &block in module.blocks(func) {
        if block == entry || module.insts(block).len() != 1 {
            continue;
        }
        if let InstKind::Jump { target } = *module.inst(module.insts(block)[0]) {
            if target != block {
                return Some((block, target));
            }
        }
    }
    None
}

fn retarget(module: &mut Module, term: ValueId, from: ValueId, to: ValueId) {
    let ValueKind::Inst(inst) = &mut module.value_mut(term).kind else {
        unreachable!("terminators are instructions");
    };
    match &mut inst.kind {
        InstKind::Jump { target } => {
            if *target == from {
                *target = to;
            }
        }
        InstKind::Branch { then_block, else_block, .. } => {
            if *then_block == from {
                *then_block = to;
            }
            if *else_block == from {
                *else_block = to;
            }
        }
        _ => {}
    }
}
