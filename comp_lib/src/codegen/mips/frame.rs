//! Stack frame layout and the per-function register plan.

use llvm_ir::{InstKind, Module, ValueId, ValueKind};
use mips_ir::{Label, Reg};
use std::collections::{HashMap, HashSet};

fn align4(size: i32) -> i32 {
    (size + 3) / 4 * 4
}

/// Values that produce a result worth a register or spill slot.
pub(crate) fn needs_value_slot(kind: &InstKind) -> bool {
    matches!(
        kind,
        InstKind::Binary { .. }
            | InstKind::Compare { .. }
            | InstKind::Logical { .. }
            | InstKind::ZExt { .. }
            | InstKind::Call { .. }
            | InstKind::Load { .. }
            | InstKind::Unary { .. }
            | InstKind::GetElementPtr { .. }
    )
}

fn allocatable(module: &Module, value: ValueId) -> bool {
    match &module.value(value).kind {
        ValueKind::Argument(_) => true,
        ValueKind::Inst(inst) => needs_value_slot(&inst.kind),
        _ => false,
    }
}

/// Assignment of hot values to the callee-saved registers.
///
/// Use counts are gathered per value; values used at least twice get
/// `$s0..$s7` in descending use-count order until the registers run out.
#[derive(Debug, Default, Clone)]
pub(crate) struct RegisterPlan {
    pub value_regs: HashMap<ValueId, Reg>,
    pub callee_saved: Vec<Reg>,
    /// Offsets from `$sp` where each callee-saved register is preserved.
    pub callee_saved_offsets: HashMap<Reg, i32>,
}

pub(crate) fn plan_registers(module: &Module, func: ValueId) -> RegisterPlan {
    let mut use_counts: Vec<(ValueId, usize)> = Vec::new();
    let mut consider = |value: ValueId| {
        if allocatable(module, value) && module.use_count(value) > 0 {
            use_counts.push((value, module.use_count(value)));
        }
    };
    for &arg in &module.function(func).params {
        consider(arg);
    }
    for &block in module.blocks(func) {
        for &inst in module.insts(block) {
            consider(inst);
        }
    }
    // Descending by use count; creation order breaks ties so the plan is
    // deterministic.
    use_counts.sort_by_key(|&(value, count)| (std::cmp::Reverse(count), module.seq(value)));

    let mut plan = RegisterPlan::default();
    let mut next_saved = 0;
    for (value, count) in use_counts {
        if count < 2 || next_saved == 8 {
            continue;
        }
        let reg = Reg::saved(next_saved);
        next_saved += 1;
        plan.value_regs.insert(value, reg);
        plan.callee_saved.push(reg);
    }
    plan
}

/// Frame layout, growing downward from `$fp`:
///
/// saved `$ra`, saved `$fp` at the top; below them home slots for register
/// arguments that must be spilled because the function calls; then
/// per-instruction spill slots, reused through a free list once the value's
/// last use has passed; then allocas; then the callee-saved region. The
/// total is rounded up to a multiple of four.
#[derive(Debug, Default)]
pub(crate) struct FrameInfo {
    pub value_offsets: HashMap<ValueId, i32>,
    pub alloca_offsets: HashMap<ValueId, i32>,
    /// Home slots (offsets from `$fp`) for register arguments.
    pub arg_offsets: HashMap<ValueId, i32>,
    /// Stack arguments 5..n live above `$fp` in the caller's frame.
    pub caller_arg_offsets: HashMap<ValueId, i32>,
    /// In a leaf function, register arguments that simply stay in `$a0..$a3`.
    pub arg_regs: HashMap<ValueId, Reg>,
    pub block_labels: HashMap<ValueId, Label>,
    pub regs: RegisterPlan,
    pub frame_size: i32,
    pub omit_prologue: bool,
    pub has_call: bool,
}

pub(crate) fn function_has_call(module: &Module, func: ValueId) -> bool {
    module.blocks(func).iter().any(|&block| {
        module
            .insts(block)
            .iter()
            .any(|&inst| matches!(module.inst(inst), InstKind::Call { .. }))
    })
}

pub(crate) fn build_frame(
    module: &Module,
    func: ValueId,
    func_label: &Label,
    plan: RegisterPlan,
    has_call: bool,
) -> FrameInfo {
    let mut info = FrameInfo { has_call, ..FrameInfo::default() };
    let mut next_offset = 8; // space for $ra and $fp at the top

    // Argument homes.
    for (index, &arg) in module.function(func).params.iter().enumerate() {
        if index >= 4 {
            info.caller_arg_offsets.insert(arg, (index as i32 - 4) * 4);
        } else if !plan.value_regs.contains_key(&arg) && module.use_count(arg) > 0 {
            if has_call {
                next_offset += 4;
                info.arg_offsets.insert(arg, -next_offset);
            } else {
                info.arg_regs.insert(arg, Reg::arg(index));
            }
        }
    }

    let inst_list: Vec<ValueId> = module
        .blocks(func)
        .iter()
        .flat_map(|&block| module.insts(block).iter().copied())
        .collect();

    // Last use positions drive spill slot reuse.
    let mut last_use: HashMap<ValueId, usize> = HashMap::new();
    for (at, &inst) in inst_list.iter().enumerate() {
        for op in module.inst(inst).operands() {
            if module.value(op).is_inst() {
                last_use.insert(op, at);
            }
        }
    }
    let mut release_at: Vec<Vec<ValueId>> = vec![Vec::new(); inst_list.len()];
    for (&value, &at) in &last_use {
        release_at[at].push(value);
    }

    let mut free_slots: Vec<i32> = Vec::new();
    for (at, &inst) in inst_list.iter().enumerate() {
        let kind = module.inst(inst);
        let pinned = plan.value_regs.contains_key(&inst);
        if !matches!(kind, InstKind::Alloca { .. })
            && needs_value_slot(kind)
            && !pinned
            && module.use_count(inst) > 0
        {
            let offset = match free_slots.pop() {
                Some(offset) => offset,
                None => {
                    next_offset += 4;
                    -next_offset
                }
            };
            info.value_offsets.insert(inst, offset);
        }
        for &value in &release_at[at] {
            if let Some(&offset) = info.value_offsets.get(&value) {
                free_slots.push(offset);
            }
        }
    }

    // Allocas.
    for &inst in &inst_list {
        if let InstKind::Alloca { alloc_ty } = module.inst(inst) {
            next_offset += alloc_ty.size_bytes() as i32;
            info.alloca_offsets.insert(inst, -next_offset);
        }
    }

    // Callee-saved region.
    next_offset += plan.callee_saved.len() as i32 * 4;
    info.frame_size = align4(next_offset);
    info.regs = plan;
    let mut save_offset = 12;
    for &reg in &info.regs.callee_saved {
        info.regs
            .callee_saved_offsets
            .insert(reg, info.frame_size - save_offset);
        save_offset += 4;
    }

    let no_stack_slots = info.alloca_offsets.is_empty()
        && info.value_offsets.is_empty()
        && info.arg_offsets.is_empty()
        && info.regs.callee_saved.is_empty();
    if !has_call && no_stack_slots && info.caller_arg_offsets.is_empty() {
        info.frame_size = 0;
        info.omit_prologue = true;
    }

    // Unique labels for the blocks, prefixed with the function's own label.
    let mut used: HashSet<String> = HashSet::new();
    let mut unnamed = 0;
    for &block in module.blocks(func) {
        let base = match module.name(block) {
            Some(name) => Label::sanitized(name).as_ref().to_owned(),
            None => {
                unnamed += 1;
                format!("bb{}", unnamed - 1)
            }
        };
        let mut unique = base.clone();
        let mut suffix = 1;
        while used.contains(&unique) {
            unique = format!("{base}_{suffix}");
            suffix += 1;
        }
        used.insert(unique.clone());
        let mut label = format!("{func_label}_{unique}");
        if label == format!("{func_label}_ret") {
            label.push_str("_bb");
        }
        info.block_labels.insert(block, Label::from(label));
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use llvm_ir::{BinaryOp, IrBuilder, Type};

    #[test]
    fn hot_values_get_saved_registers() {
        let mut module = Module::new();
        let func = module.add_function("f", Type::Int, &[], false);
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        let x = b.build_load(slot);
        let one = b.const_int(1);
        let a = b.build_binary(BinaryOp::Add, x, one);
        let bsum = b.build_binary(BinaryOp::Mul, a, a);
        b.build_return(Some(bsum));

        let plan = plan_registers(&module, func);
        assert_eq!(plan.value_regs.get(&a), Some(&Reg::S0), "most-used value first");
        assert!(!plan.value_regs.contains_key(&bsum), "single-use values stay spilled");
    }

    #[test]
    fn leaf_function_without_slots_omits_prologue() {
        let mut module = Module::new();
        let func = module.add_function("f", Type::Int, &[], false);
        let mut b = IrBuilder::new(&mut module, func);
        let zero = b.const_int(0);
        b.build_return(Some(zero));
        let plan = plan_registers(&module, func);
        let frame = build_frame(&module, func, &Label::from("f"), plan, false);
        assert!(frame.omit_prologue);
        assert_eq!(frame.frame_size, 0);
    }

    #[test]
    fn spill_slots_are_reused_after_last_use() {
        let mut module = Module::new();
        let func = module.add_function("f", Type::Int, &[], false);
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        let x = b.build_load(slot);
        let one = b.const_int(1);
        // `x + 1` is x's last use; `(x + 1) + 1` then dies into the return.
        let s1 = b.build_binary(BinaryOp::Add, x, one);
        let s2 = b.build_binary(BinaryOp::Add, s1, one);
        b.build_return(Some(s2));

        let frame = build_frame(
            &module,
            func,
            &Label::from("f"),
            RegisterPlan::default(),
            false,
        );
        assert_eq!(
            frame.value_offsets.get(&x),
            frame.value_offsets.get(&s2),
            "s2 reuses x's released slot"
        );
    }

    #[test]
    fn frame_regions_are_laid_out_in_order() {
        let mut module = Module::new();
        let callee = module.add_function("g", Type::Void, &[], true);
        let func = module.add_function("f", Type::Int, &[("x", Type::Int)], false);
        let arg = module.function(func).params[0];
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        b.build_store(arg, slot);
        b.build_call(callee, vec![]);
        let x = b.build_load(slot);
        b.build_return(Some(x));

        let plan = plan_registers(&module, func);
        let frame = build_frame(&module, func, &Label::from("f"), plan, true);
        // The argument is used once (the store), so it gets a home slot right
        // below the saved registers, above everything else.
        let home = frame.arg_offsets[&arg];
        let alloca = *frame.alloca_offsets.values().next().unwrap();
        assert_eq!(home, -12);
        assert!(alloca < home, "allocas sit below the spill region");
        assert_eq!(frame.frame_size % 4, 0);
        assert!(!frame.omit_prologue);
    }

    #[test]
    fn block_labels_are_function_prefixed_and_unique() {
        let mut module = Module::new();
        let func = module.add_function("f", Type::Void, &[], false);
        module.add_block(func, "if.then");
        module.add_block(func, "if.then");
        let frame = build_frame(
            &module,
            func,
            &Label::from("f"),
            RegisterPlan::default(),
            false,
        );
        let labels: HashSet<&str> = frame
            .block_labels
            .values()
            .map(|label| label.as_ref())
            .collect();
        assert_eq!(labels.len(), 3);
        assert!(labels.contains("f_entry"));
        assert!(labels.contains("f_if.then"));
        assert!(labels.contains("f_if.then_1"));
    }
}
