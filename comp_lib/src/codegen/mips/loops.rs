//! Loop-shaped peephole analyses: induction-variable pinning and fusing runs
//! of adjacent array updates into counted loops.

use llvm_ir::{BinaryOp, InstKind, Module, ValueId};
use std::collections::{HashMap, HashSet};

/// The idiomatic for-loop shape: `cond` ends in a branch on a compare with a
/// load of some address on one side, `body` jumps to `step`, `step` jumps
/// back to `cond`. That address is the loop's induction address; its live
/// value is pinned to `$t7` across the loop's blocks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopInfo {
    pub cond: ValueId,
    pub addr: ValueId,
}

#[derive(Debug, Default)]
pub(crate) struct LoopPlan {
    loops: Vec<LoopInfo>,
    /// cond/body/step block -> index into `loops`.
    by_member: HashMap<ValueId, usize>,
    /// cond block -> index into `loops`.
    by_cond: HashMap<ValueId, usize>,
}

impl LoopPlan {
    /// The induction address pinned while emitting `block`, if any.
    pub fn induction_for(&self, block: ValueId) -> Option<ValueId> {
        self.by_member.get(&block).map(|&at| self.loops[at].addr)
    }

    /// If `target` is the cond block of a recognized loop, its info.
    pub fn loop_at_cond(&self, target: ValueId) -> Option<LoopInfo> {
        self.by_cond.get(&target).map(|&at| self.loops[at])
    }

    pub fn is_member(&self, block: ValueId) -> bool {
        self.by_member.contains_key(&block)
    }
}

fn jump_target(module: &Module, block: ValueId) -> Option<ValueId> {
    match module.terminator(block).map(|term| module.inst(term)) {
        Some(InstKind::Jump { target }) => Some(*target),
        _ => None,
    }
}

pub(crate) fn detect_loops(module: &Module, func: ValueId) -> LoopPlan {
    let mut plan = LoopPlan::default();
    for &cond in module.blocks(func) {
        let Some(term) = module.terminator(cond) else { continue };
        let InstKind::Branch { cond: compare, then_block: body, else_block: _ } =
            *module.inst(term)
        else {
            continue;
        };
        let Some(step) = jump_target(module, body) else { continue };
        if jump_target(module, step) != Some(cond) {
            continue;
        }
        let Some(InstKind::Compare { lhs, rhs, .. }) = module.value(compare).as_inst() else {
            continue;
        };
        let addr = [*lhs, *rhs].into_iter().find_map(|side| {
            match module.value(side).as_inst() {
                Some(InstKind::Load { addr }) => Some(*addr),
                _ => None,
            }
        });
        let Some(addr) = addr else { continue };
        // Pinning is only sound for a stack slot: it is what `$t7` gets
        // seeded from on loop entry, and a scalar alloca has no aliases.
        if !matches!(module.value(addr).as_inst(), Some(InstKind::Alloca { .. })) {
            continue;
        }

        let at = plan.loops.len();
        plan.loops.push(LoopInfo { cond, addr });
        plan.by_member.insert(cond, at);
        plan.by_member.insert(body, at);
        plan.by_member.insert(step, at);
        plan.by_cond.insert(cond, at);
    }
    plan
}

/// A run of `arr[k] = arr[k] + delta` stores over sequential `k`, emitted as
/// a tight counted loop instead of straight-line code.
#[derive(Debug, Clone)]
pub(crate) struct ArrayLoopEmit {
    pub base: ValueId,
    pub delta: ValueId,
    pub start_index: i32,
    pub count: i32,
    pub stride: i32,
}

#[derive(Debug, Default)]
pub(crate) struct ArrayLoopPlan {
    /// Instruction at which a fused loop is emitted.
    pub emit_at: HashMap<ValueId, ArrayLoopEmit>,
    /// Instructions consumed by a fused loop and skipped during emission.
    pub skip: HashSet<ValueId>,
}

struct UpdateMatch {
    parts: [ValueId; 4],
    base: ValueId,
    delta: ValueId,
    index: i32,
    stride: i32,
}

/// Matches `store (add (load (gep base, …k)), delta), (gep base, …k)` where
/// every leading gep index is the literal zero and the last is a literal.
/// The pieces must be referenced only by each other, or fusing them away
/// would change other users.
fn match_array_update(module: &Module, store: ValueId) -> Option<UpdateMatch> {
    let InstKind::Store { value, addr } = *module.inst(store) else {
        return None;
    };
    let InstKind::Binary { op: BinaryOp::Add, lhs, rhs } =
        *module.value(value).as_inst()?
    else {
        return None;
    };
    let (load, delta) = if matches!(module.value(lhs).as_inst(), Some(InstKind::Load { .. })) {
        (lhs, rhs)
    } else if matches!(module.value(rhs).as_inst(), Some(InstKind::Load { .. })) {
        (rhs, lhs)
    } else {
        return None;
    };
    let InstKind::Load { addr: load_addr } = *module.inst(load) else {
        return None;
    };
    if load_addr != addr {
        return None;
    }
    let InstKind::GetElementPtr { base, ref indices } = *module.inst(addr) else {
        return None;
    };
    let (&last, leading) = indices.split_last()?;
    if leading
        .iter()
        .any(|&index| module.as_const_int(index) != Some(0))
    {
        return None;
    }
    let index = module.as_const_int(last)?;

    // Referenced from elsewhere: the load feeds only the add, the add only
    // the store, the gep only the load and the store.
    if module.use_count(load) != 1 || module.use_count(value) != 1 || module.use_count(addr) != 2 {
        return None;
    }

    let stride = module
        .ty(base)
        .element()
        .map(|elem| elem.size_bytes() as i32)
        .unwrap_or(4);
    Some(UpdateMatch { parts: [load, value, addr, store], base, delta, index, stride })
}

pub(crate) fn plan_array_loops(module: &Module, block: ValueId) -> ArrayLoopPlan {
    let matches: Vec<UpdateMatch> = module
        .insts(block)
        .iter()
        .filter_map(|&inst| match_array_update(module, inst))
        .collect();

    let mut plan = ArrayLoopPlan::default();
    let mut i = 0;
    while i < matches.len() {
        let first = &matches[i];
        let mut expected = first.index;
        let mut j = i;
        while j < matches.len()
            && matches[j].base == first.base
            && matches[j].delta == first.delta
            && matches[j].index == expected
        {
            expected += 1;
            j += 1;
        }

        let count = expected - first.index;
        if count >= 3 {
            let run: Vec<ValueId> = matches[i..j]
                .iter()
                .flat_map(|update| update.parts)
                .collect();
            let overlaps = run.iter().any(|part| plan.skip.contains(part));
            if !overlaps {
                // The loop replaces the run at the first store: by then every
                // operand it needs (base and delta) has been computed.
                plan.emit_at.insert(
                    first.parts[3],
                    ArrayLoopEmit {
                        base: first.base,
                        delta: first.delta,
                        start_index: first.index,
                        count,
                        stride: first.stride,
                    },
                );
                plan.skip.extend(run);
            }
        }
        i = j.max(i + 1);
    }
    plan
}

/// Compares whose only user is a branch are folded into the branch itself
/// and never emitted standalone.
pub(crate) fn branch_fused_compares(module: &Module, func: ValueId) -> HashSet<ValueId> {
    let mut fused = HashSet::new();
    for &block in module.blocks(func) {
        for &inst in module.insts(block) {
            let InstKind::Branch { cond, .. } = module.inst(inst) else {
                continue;
            };
            if matches!(module.value(*cond).as_inst(), Some(InstKind::Compare { .. }))
                && module.use_count(*cond) == 1
            {
                fused.insert(*cond);
            }
        }
    }
    fused
}
