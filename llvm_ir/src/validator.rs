use crate::{InstKind, Module, Type, ValueId, ValueKind};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidityReason {
    /// A defined function without blocks.
    MissingEntryBlock,
    /// A block reachable from the entry block that doesn't end in a
    /// terminator.
    MissingTerminator,
    /// A terminator somewhere other than the last position of its block.
    MisplacedTerminator,
    /// An alloca outside its function's entry block, or after the first
    /// non-alloca instruction there.
    MisplacedAlloca,
    /// A jump or branch targeting something that is not a block of the same
    /// function.
    ForeignBlockTarget,
    /// A `ret` whose value disagrees with the function's return type.
    ReturnTypeMismatch,
    /// An operand slot that is not mirrored in the operand's use list, or
    /// vice versa.
    BrokenUseEdge,
    /// A global initializer that is not a constant of the global's type.
    BadGlobalInitializer,
}

/// Checks the structural invariants of a module:
///
/// 1. every reachable block ends in exactly one terminator;
/// 2. allocas form a prefix of the entry block;
/// 3. use lists and operand slots mirror each other exactly;
/// 4. return values agree with the function's return type;
/// 5. global initializers are constants of the global's exact type.
///
/// Returns the first violation found. Only meaningful for IR built from a
/// clean compile; an erroneous compile may legally produce a module that
/// fails here.
pub fn validate(module: &Module) -> Result<(), InvalidityReason> {
    for &global in module.globals() {
        validate_global(module, global)?;
    }
    for &func in module.functions() {
        if !module.function(func).is_builtin {
            validate_function(module, func)?;
        }
    }
    Ok(())
}

fn validate_global(module: &Module, global: ValueId) -> Result<(), InvalidityReason> {
    let ValueKind::Global(data) = &module.value(global).kind else {
        return Err(InvalidityReason::BadGlobalInitializer);
    };
    let Some(init) = data.initializer else {
        return Ok(());
    };
    let init = module.value(init);
    let is_constant = matches!(init.kind, ValueKind::ConstInt(_) | ValueKind::ConstArray(_));
    if !is_constant || &init.ty != module.ty(global) {
        return Err(InvalidityReason::BadGlobalInitializer);
    }
    Ok(())
}

pub fn validate_function(module: &Module, func: ValueId) -> Result<(), InvalidityReason> {
    let blocks = module.blocks(func);
    if blocks.is_empty() {
        return Err(InvalidityReason::MissingEntryBlock);
    }
    let block_set: HashSet<ValueId> = blocks.iter().copied().collect();

    for &block in blocks {
        let insts = module.insts(block);
        for (at, &inst) in insts.iter().enumerate() {
            let kind = module.inst(inst);
            if kind.is_terminator() && at + 1 != insts.len() {
                return Err(InvalidityReason::MisplacedTerminator);
            }
            validate_inst(module, func, kind, &block_set)?;
            validate_use_edges(module, inst, kind)?;
        }
    }

    validate_alloca_placement(module, func)?;

    // Reachable blocks must end terminated; unreachable ones may be left
    // half-built by error recovery.
    for block in reachable_blocks(module, func) {
        if module.terminator(block).is_none() {
            return Err(InvalidityReason::MissingTerminator);
        }
    }
    Ok(())
}

fn validate_inst(
    module: &Module,
    func: ValueId,
    kind: &InstKind,
    blocks: &HashSet<ValueId>,
) -> Result<(), InvalidityReason> {
    let check_target = |target: ValueId| {
        if blocks.contains(&target) {
            Ok(())
        } else {
            Err(InvalidityReason::ForeignBlockTarget)
        }
    };
    match kind {
        InstKind::Jump { target } => check_target(*target)?,
        InstKind::Branch { then_block, else_block, .. } => {
            check_target(*then_block)?;
            check_target(*else_block)?;
        }
        InstKind::Return { value } => {
            let ok = match (module.ty(func), value) {
                (Type::Void, None) => true,
                (Type::Void, Some(_)) | (_, None) => false,
                (_, Some(value)) => *module.ty(*value) == Type::Int,
            };
            if !ok {
                return Err(InvalidityReason::ReturnTypeMismatch);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Operand slots and use lists must mirror each other with equal
/// multiplicity.
fn validate_use_edges(
    module: &Module,
    inst: ValueId,
    kind: &InstKind,
) -> Result<(), InvalidityReason> {
    let operands = kind.operands();
    for &op in &operands {
        let slots = operands.iter().filter(|&&o| o == op).count();
        let edges = module.users(op).iter().filter(|&&user| user == inst).count();
        if slots != edges {
            return Err(InvalidityReason::BrokenUseEdge);
        }
    }
    Ok(())
}

fn validate_alloca_placement(module: &Module, func: ValueId) -> Result<(), InvalidityReason> {
    let entry = module.entry_block(func);
    for &block in module.blocks(func) {
        let mut past_prefix = false;
        for &inst in module.insts(block) {
            let is_alloca = matches!(module.inst(inst), InstKind::Alloca { .. });
            if is_alloca && (block != entry || past_prefix) {
                return Err(InvalidityReason::MisplacedAlloca);
            }
            if !is_alloca {
                past_prefix = true;
            }
        }
    }
    Ok(())
}

/// Breadth-first over terminator edges from the entry block.
pub fn reachable_blocks(module: &Module, func: ValueId) -> Vec<ValueId> {
    let entry = module.entry_block(func);
    let mut seen = HashSet::from([entry]);
    let mut order = vec![entry];
    let mut queue = VecDeque::from([entry]);
    while let Some(block) = queue.pop_front() {
        let successors = match module.terminator(block).map(|term| module.inst(term)) {
            Some(InstKind::Jump { target }) => vec![*target],
            Some(InstKind::Branch { then_block, else_block, .. }) => {
                vec![*then_block, *else_block]
            }
            _ => Vec::new(),
        };
        for succ in successors {
            if seen.insert(succ) {
                order.push(succ);
                queue.push_back(succ);
            }
        }
    }
    order
}
