//! Per-function MIPS emission.

use super::frame::FrameInfo;
use super::loops::{self, ArrayLoopEmit, ArrayLoopPlan, LoopPlan};
use llvm_ir::{BinaryOp, CompareOp, InstKind, LogicalOp, Module, UnaryOp, ValueId, ValueKind};
use mips_ir::{Instruction as I, Label, Reg, Root};
use std::collections::{HashMap, HashSet};

fn fits_imm16(value: i32) -> bool {
    (-32768..=32767).contains(&value)
}

/// The scratch registers `$t0..$t6`, handed out most-recently-released
/// first. `$t7` is reserved for the pinned induction value and `$t8/$t9`
/// for the block value cache.
struct TempPool {
    free: Vec<Reg>,
}

impl TempPool {
    fn new() -> Self {
        Self {
            free: vec![Reg::T0, Reg::T1, Reg::T2, Reg::T3, Reg::T4, Reg::T5, Reg::T6],
        }
    }

    fn acquire(&mut self) -> Reg {
        self.free.pop().unwrap_or(Reg::T0)
    }

    fn release(&mut self, reg: Reg) {
        if (Reg::T0.number()..=Reg::T6.number()).contains(&reg.number())
            && !self.free.contains(&reg)
        {
            self.free.push(reg);
        }
    }
}

/// Two-slot most-recent-first value cache in `$t8`/`$t9`, FIFO eviction.
/// Flushed whenever a call may clobber the temporaries.
struct BlockCache {
    slots: [Option<ValueId>; 2],
    next_evict: usize,
}

impl BlockCache {
    const REGS: [Reg; 2] = [Reg::T8, Reg::T9];

    fn new() -> Self {
        Self { slots: [None, None], next_evict: 0 }
    }

    fn get(&self, value: ValueId) -> Option<Reg> {
        self.slots
            .iter()
            .position(|&slot| slot == Some(value))
            .map(|at| Self::REGS[at])
    }

    fn bind(&mut self, value: ValueId) -> Reg {
        if let Some(reg) = self.get(value) {
            return reg;
        }
        if let Some(at) = self.slots.iter().position(Option::is_none) {
            self.slots[at] = Some(value);
            return Self::REGS[at];
        }
        let at = self.next_evict;
        self.next_evict = (self.next_evict + 1) % self.slots.len();
        self.slots[at] = Some(value);
        Self::REGS[at]
    }

    fn invalidate_all(&mut self) {
        self.slots = [None, None];
    }
}

struct TargetReg {
    reg: Reg,
    is_temp: bool,
}

pub(crate) struct FunctionGenerator<'g, 'm> {
    module: &'m Module,
    root: &'g mut Root,
    global_labels: &'g HashMap<ValueId, Label>,
    func_labels: &'g HashMap<ValueId, Label>,
    loop_counter: &'g mut u32,
    func: ValueId,
    frame: FrameInfo,
    temps: TempPool,
    loops: LoopPlan,
    fused_compares: HashSet<ValueId>,
    /// The induction address pinned to `$t7` while inside a loop's blocks.
    induction: Option<ValueId>,
    in_loop_block: bool,
    ret_label: Label,
}

impl<'g, 'm> FunctionGenerator<'g, 'm> {
    pub fn new(
        module: &'m Module,
        root: &'g mut Root,
        global_labels: &'g HashMap<ValueId, Label>,
        func_labels: &'g HashMap<ValueId, Label>,
        loop_counter: &'g mut u32,
        func: ValueId,
    ) -> Self {
        let func_label = func_labels[&func].clone();
        let plan = super::frame::plan_registers(module, func);
        let has_call = super::frame::function_has_call(module, func);
        let frame = super::frame::build_frame(module, func, &func_label, plan, has_call);
        let loops = loops::detect_loops(module, func);
        let fused_compares = loops::branch_fused_compares(module, func);
        let ret_label = Label::from(format!("{func_label}_ret"));
        Self {
            module,
            root,
            global_labels,
            func_labels,
            loop_counter,
            func,
            frame,
            temps: TempPool::new(),
            loops,
            fused_compares,
            induction: None,
            in_loop_block: false,
            ret_label,
        }
    }

    pub fn generate(mut self) {
        let func_label = self.func_labels[&self.func].clone();
        self.root.push_label(func_label);
        self.emit_prologue();
        self.seed_arguments();

        for &block in self.module.blocks(self.func) {
            self.induction = self.loops.induction_for(block);
            self.in_loop_block = self.loops.is_member(block);
            let mut cache = BlockCache::new();
            let array_loops = loops::plan_array_loops(self.module, block);
            self.root.push_label(self.frame.block_labels[&block].clone());
            for &inst in self.module.insts(block) {
                self.emit_inst(inst, &mut cache, &array_loops);
            }
        }

        self.root.push_label(self.ret_label.clone());
        self.emit_epilogue();
        self.root.push_with_delay_slot(I::Jr(Reg::RA));
    }

    fn emit_prologue(&mut self) {
        if self.frame.omit_prologue {
            return;
        }
        let size = self.frame.frame_size;
        self.root.push(I::Addi(Reg::SP, Reg::SP, -size));
        if self.frame.has_call {
            self.root.push(I::Sw(Reg::RA, size - 4, Reg::SP));
        }
        self.root.push(I::Sw(Reg::FP, size - 8, Reg::SP));
        self.root.push(I::Addi(Reg::FP, Reg::SP, size));
        for &reg in &self.frame.regs.callee_saved {
            let offset = self.frame.regs.callee_saved_offsets[&reg];
            self.root.push(I::Sw(reg, offset, Reg::SP));
        }
    }

    fn emit_epilogue(&mut self) {
        if self.frame.omit_prologue {
            return;
        }
        let size = self.frame.frame_size;
        for &reg in &self.frame.regs.callee_saved {
            let offset = self.frame.regs.callee_saved_offsets[&reg];
            self.root.push(I::Lw(reg, offset, Reg::SP));
        }
        if self.frame.has_call {
            self.root.push(I::Lw(Reg::RA, size - 4, Reg::SP));
        }
        self.root.push(I::Lw(Reg::FP, size - 8, Reg::SP));
        self.root.push(I::Addi(Reg::SP, Reg::SP, size));
    }

    /// Moves register-pinned arguments into their `$s` registers and spills
    /// the rest into their home slots.
    fn seed_arguments(&mut self) {
        let params = self.module.function(self.func).params.clone();
        for (index, &arg) in params.iter().enumerate() {
            if let Some(&reg) = self.frame.regs.value_regs.get(&arg) {
                if index < 4 {
                    self.root.push(I::Move(reg, Reg::arg(index)));
                } else {
                    let offset = self.frame.caller_arg_offsets[&arg];
                    self.root.push(I::Lw(reg, offset, Reg::FP));
                }
            } else if index < 4 {
                if let Some(&offset) = self.frame.arg_offsets.get(&arg) {
                    self.root.push(I::Sw(Reg::arg(index), offset, Reg::FP));
                }
            }
        }
    }

    // ---- value access --------------------------------------------------

    fn mapped_reg(&self, value: ValueId) -> Option<Reg> {
        self.frame.regs.value_regs.get(&value).copied()
    }

    fn emit_move(&mut self, dst: Reg, src: Reg) {
        if dst != src {
            self.root.push(I::Move(dst, src));
        }
    }

    /// Materializes a value into `reg`.
    fn load_value(&mut self, value: ValueId, reg: Reg, cache: &mut BlockCache) {
        if let Some(mapped) = self.mapped_reg(value) {
            self.emit_move(reg, mapped);
            return;
        }
        if let Some(cached) = cache.get(value) {
            self.emit_move(reg, cached);
            return;
        }

        match &self.module.value(value).kind {
            ValueKind::ConstInt(v) => {
                self.root.push(I::Li(reg, *v));
                return;
            }
            ValueKind::Argument(_) => {
                if let Some(&home) = self.frame.arg_regs.get(&value) {
                    self.emit_move(reg, home);
                    return;
                }
                if let Some(&offset) = self.frame.arg_offsets.get(&value) {
                    self.root.push(I::Lw(reg, offset, Reg::FP));
                } else if let Some(&offset) = self.frame.caller_arg_offsets.get(&value) {
                    self.root.push(I::Lw(reg, offset, Reg::FP));
                } else {
                    self.root.push(I::Li(reg, 0));
                    return;
                }
            }
            ValueKind::Global(_) => {
                let label = self.global_labels[&value].clone();
                self.root.push(I::La(reg, label));
                self.root.push(I::Lw(reg, 0, reg));
            }
            ValueKind::Inst(inst) if matches!(inst.kind, InstKind::Alloca { .. }) => {
                match self.frame.alloca_offsets.get(&value) {
                    Some(&offset) => self.root.push(I::Lw(reg, offset, Reg::FP)),
                    None => {
                        self.root.push(I::Li(reg, 0));
                        return;
                    }
                }
            }
            _ => match self.frame.value_offsets.get(&value) {
                Some(&offset) => self.root.push(I::Lw(reg, offset, Reg::FP)),
                None => {
                    self.root.push(I::Li(reg, 0));
                    return;
                }
            },
        }

        // A value loaded from memory and needed again is worth a cache slot.
        if self.mapped_reg(value).is_none() && self.module.use_count(value) > 1 {
            let cache_reg = cache.bind(value);
            self.emit_move(cache_reg, reg);
        }
    }

    /// Materializes the address a memory operand refers to.
    fn load_address(&mut self, value: ValueId, reg: Reg) {
        if let Some(mapped) = self.mapped_reg(value) {
            self.emit_move(reg, mapped);
            return;
        }
        match &self.module.value(value).kind {
            ValueKind::Inst(inst) if matches!(inst.kind, InstKind::Alloca { .. }) => {
                let offset = self.frame.alloca_offsets.get(&value).copied().unwrap_or(0);
                self.root.push(I::Addi(reg, Reg::FP, offset));
            }
            ValueKind::Global(_) => {
                let label = self.global_labels[&value].clone();
                self.root.push(I::La(reg, label));
            }
            ValueKind::Argument(_) => {
                if let Some(&home) = self.frame.arg_regs.get(&value) {
                    self.emit_move(reg, home);
                } else if let Some(&offset) = self.frame.arg_offsets.get(&value) {
                    self.root.push(I::Lw(reg, offset, Reg::FP));
                } else if let Some(&offset) = self.frame.caller_arg_offsets.get(&value) {
                    self.root.push(I::Lw(reg, offset, Reg::FP));
                } else {
                    self.root.push(I::Move(reg, Reg::ZERO));
                }
            }
            ValueKind::Inst(_) => match self.frame.value_offsets.get(&value) {
                Some(&offset) => self.root.push(I::Lw(reg, offset, Reg::FP)),
                None => self.root.push(I::Move(reg, Reg::ZERO)),
            },
            _ => self.root.push(I::Move(reg, Reg::ZERO)),
        }
    }

    /// Spills a just-computed result to its slot and seeds the block cache.
    fn store_value(&mut self, value: ValueId, reg: Reg, cache: &mut BlockCache) {
        if self.module.use_count(value) == 0 {
            return;
        }
        if let Some(&offset) = self.frame.value_offsets.get(&value) {
            self.root.push(I::Sw(reg, offset, Reg::FP));
        }
        if self.mapped_reg(value).is_none() {
            let cache_reg = cache.bind(value);
            self.emit_move(cache_reg, reg);
        }
    }

    fn acquire_target(&mut self, value: ValueId) -> TargetReg {
        match self.mapped_reg(value) {
            Some(reg) => TargetReg { reg, is_temp: false },
            None => TargetReg { reg: self.temps.acquire(), is_temp: true },
        }
    }

    fn release_target(&mut self, target: TargetReg) {
        if target.is_temp {
            self.temps.release(target.reg);
        }
    }

    // ---- instruction emission ------------------------------------------

    fn emit_inst(&mut self, inst: ValueId, cache: &mut BlockCache, array_loops: &ArrayLoopPlan) {
        if let Some(emit) = array_loops.emit_at.get(&inst) {
            let emit = emit.clone();
            self.emit_array_update_loop(&emit, cache);
            return;
        }
        if self.fused_compares.contains(&inst) || array_loops.skip.contains(&inst) {
            return;
        }
        match self.module.inst(inst).clone() {
            InstKind::Alloca { .. } => {}
            InstKind::Store { value, addr } => self.emit_store(value, addr, cache),
            InstKind::Load { addr } => self.emit_load(inst, addr, cache),
            InstKind::Binary { op, lhs, rhs } => self.emit_binary(inst, op, lhs, rhs, cache),
            InstKind::Compare { op, lhs, rhs } => self.emit_compare(inst, op, lhs, rhs, cache),
            InstKind::Logical { op, lhs, rhs } => self.emit_logical(inst, op, lhs, rhs, cache),
            InstKind::ZExt { operand } => self.emit_zext(inst, operand, cache),
            InstKind::Unary { op, operand } => self.emit_unary(inst, op, operand, cache),
            InstKind::GetElementPtr { base, indices } => {
                self.emit_gep(inst, base, &indices, cache)
            }
            InstKind::Call { callee, args } => self.emit_call(inst, callee, &args, cache),
            InstKind::Return { value } => self.emit_return(value, cache),
            InstKind::Jump { target } => self.emit_jump(target),
            InstKind::Branch { cond, then_block, else_block } => {
                self.emit_branch(cond, then_block, else_block, cache)
            }
        }
    }

    fn emit_store(&mut self, value: ValueId, addr: ValueId, cache: &mut BlockCache) {
        let val_reg = self.temps.acquire();
        let addr_reg = self.temps.acquire();
        self.load_value(value, val_reg, cache);
        if self.induction == Some(addr) {
            self.root.push(I::Move(Reg::T7, val_reg));
        }
        self.load_address(addr, addr_reg);
        self.root.push(I::Sw(val_reg, 0, addr_reg));
        self.temps.release(val_reg);
        self.temps.release(addr_reg);
    }

    fn emit_load(&mut self, inst: ValueId, addr: ValueId, cache: &mut BlockCache) {
        if self.induction == Some(addr) {
            let dst = self.acquire_target(inst);
            self.emit_move(dst.reg, Reg::T7);
            self.store_value(inst, dst.reg, cache);
            self.release_target(dst);
            return;
        }
        let addr_reg = self.temps.acquire();
        let dst = self.acquire_target(inst);
        self.load_address(addr, addr_reg);
        self.root.push(I::Lw(dst.reg, 0, addr_reg));
        self.store_value(inst, dst.reg, cache);
        self.temps.release(addr_reg);
        self.release_target(dst);
    }

    fn emit_binary(
        &mut self,
        inst: ValueId,
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        cache: &mut BlockCache,
    ) {
        let lhs_imm = self.module.as_const_int(lhs);
        let rhs_imm = self.module.as_const_int(rhs);
        let dst = self.acquire_target(inst);

        // Additions and subtractions with a 16-bit immediate go straight to
        // addiu.
        let addiu = match (op, lhs_imm, rhs_imm) {
            (BinaryOp::Add, _, Some(imm)) if fits_imm16(imm) => Some((lhs, imm)),
            (BinaryOp::Add, Some(imm), _) if fits_imm16(imm) => Some((rhs, imm)),
            (BinaryOp::Sub, _, Some(imm))
                if imm.checked_neg().is_some_and(fits_imm16) =>
            {
                Some((lhs, -imm))
            }
            _ => None,
        };
        if let Some((operand, imm)) = addiu {
            let reg = self.temps.acquire();
            self.load_value(operand, reg, cache);
            self.root.push(I::Addiu(dst.reg, reg, imm));
            self.temps.release(reg);
            self.store_value(inst, dst.reg, cache);
            self.release_target(dst);
            return;
        }

        let lhs_reg = self.temps.acquire();
        let rhs_reg = self.temps.acquire();
        self.load_value(lhs, lhs_reg, cache);
        self.load_value(rhs, rhs_reg, cache);
        match op {
            BinaryOp::Add => self.root.push(I::Addu(dst.reg, lhs_reg, rhs_reg)),
            BinaryOp::Sub => self.root.push(I::Subu(dst.reg, lhs_reg, rhs_reg)),
            BinaryOp::Mul => self.root.push(I::Mul(dst.reg, lhs_reg, rhs_reg)),
            BinaryOp::Div => {
                self.root.push(I::Div(lhs_reg, rhs_reg));
                self.root.push(I::Mflo(dst.reg));
            }
            BinaryOp::Mod => {
                self.root.push(I::Div(lhs_reg, rhs_reg));
                self.root.push(I::Mfhi(dst.reg));
            }
        }
        self.store_value(inst, dst.reg, cache);
        self.temps.release(lhs_reg);
        self.temps.release(rhs_reg);
        self.release_target(dst);
    }

    fn emit_compare(
        &mut self,
        inst: ValueId,
        op: CompareOp,
        lhs: ValueId,
        rhs: ValueId,
        cache: &mut BlockCache,
    ) {
        let rhs_is_zero = self.module.as_const_int(rhs) == Some(0);
        let lhs_reg = self.temps.acquire();
        self.load_value(lhs, lhs_reg, cache);
        let dst = self.acquire_target(inst);

        if rhs_is_zero && op == CompareOp::Eq {
            self.root.push(I::Sltiu(dst.reg, lhs_reg, 1));
        } else if rhs_is_zero && op == CompareOp::Ne {
            self.root.push(I::Sltu(dst.reg, Reg::ZERO, lhs_reg));
        } else {
            let rhs_reg = self.temps.acquire();
            self.load_value(rhs, rhs_reg, cache);
            match op {
                CompareOp::Eq => {
                    self.root.push(I::Xor(dst.reg, lhs_reg, rhs_reg));
                    self.root.push(I::Sltiu(dst.reg, dst.reg, 1));
                }
                CompareOp::Ne => {
                    self.root.push(I::Xor(dst.reg, lhs_reg, rhs_reg));
                    self.root.push(I::Sltu(dst.reg, Reg::ZERO, dst.reg));
                }
                CompareOp::Lt => self.root.push(I::Slt(dst.reg, lhs_reg, rhs_reg)),
                CompareOp::Gt => self.root.push(I::Slt(dst.reg, rhs_reg, lhs_reg)),
                CompareOp::Le => {
                    self.root.push(I::Slt(dst.reg, rhs_reg, lhs_reg));
                    self.root.push(I::Xori(dst.reg, dst.reg, 1));
                }
                CompareOp::Ge => {
                    self.root.push(I::Slt(dst.reg, lhs_reg, rhs_reg));
                    self.root.push(I::Xori(dst.reg, dst.reg, 1));
                }
            }
            self.temps.release(rhs_reg);
        }
        self.store_value(inst, dst.reg, cache);
        self.temps.release(lhs_reg);
        self.release_target(dst);
    }

    fn emit_logical(
        &mut self,
        inst: ValueId,
        op: LogicalOp,
        lhs: ValueId,
        rhs: ValueId,
        cache: &mut BlockCache,
    ) {
        let lhs_reg = self.temps.acquire();
        let rhs_reg = self.temps.acquire();
        self.load_value(lhs, lhs_reg, cache);
        self.root.push(I::Sltu(lhs_reg, Reg::ZERO, lhs_reg));
        self.load_value(rhs, rhs_reg, cache);
        self.root.push(I::Sltu(rhs_reg, Reg::ZERO, rhs_reg));
        let dst = self.acquire_target(inst);
        match op {
            LogicalOp::And => self.root.push(I::And(dst.reg, lhs_reg, rhs_reg)),
            LogicalOp::Or => self.root.push(I::Or(dst.reg, lhs_reg, rhs_reg)),
        }
        self.store_value(inst, dst.reg, cache);
        self.temps.release(lhs_reg);
        self.temps.release(rhs_reg);
        self.release_target(dst);
    }

    fn emit_zext(&mut self, inst: ValueId, operand: ValueId, cache: &mut BlockCache) {
        let src = self.temps.acquire();
        self.load_value(operand, src, cache);
        let dst = self.acquire_target(inst);
        self.root.push(I::Sltu(dst.reg, Reg::ZERO, src));
        self.store_value(inst, dst.reg, cache);
        self.temps.release(src);
        self.release_target(dst);
    }

    fn emit_unary(
        &mut self,
        inst: ValueId,
        op: UnaryOp,
        operand: ValueId,
        cache: &mut BlockCache,
    ) {
        let src = self.temps.acquire();
        self.load_value(operand, src, cache);
        let dst = self.acquire_target(inst);
        match op {
            UnaryOp::Pos => self.emit_move(dst.reg, src),
            UnaryOp::Neg => self.root.push(I::Subu(dst.reg, Reg::ZERO, src)),
            UnaryOp::Not => self.root.push(I::Sltiu(dst.reg, src, 1)),
        }
        self.store_value(inst, dst.reg, cache);
        self.temps.release(src);
        self.release_target(dst);
    }

    fn emit_call(
        &mut self,
        inst: ValueId,
        callee: ValueId,
        args: &[ValueId],
        cache: &mut BlockCache,
    ) {
        let callee_label = self.func_labels[&callee].clone();
        if self.induction.is_some() {
            self.root.push(I::Addi(Reg::SP, Reg::SP, -4));
            self.root.push(I::Sw(Reg::T7, 0, Reg::SP));
        }
        // Arguments 5..n go on the stack, pushed right to left.
        for &arg in args.iter().skip(4).rev() {
            let reg = self.temps.acquire();
            if self.module.ty(arg).is_array() {
                self.load_address(arg, reg);
            } else {
                self.load_value(arg, reg, cache);
            }
            self.root.push(I::Addi(Reg::SP, Reg::SP, -4));
            self.root.push(I::Sw(reg, 0, Reg::SP));
            self.temps.release(reg);
        }
        for (index, &arg) in args.iter().take(4).enumerate() {
            if self.module.ty(arg).is_array() {
                self.load_address(arg, Reg::arg(index));
            } else {
                self.load_value(arg, Reg::arg(index), cache);
            }
        }
        self.root.push_with_delay_slot(I::Jal(callee_label));
        if args.len() > 4 {
            self.root.push(I::Addi(Reg::SP, Reg::SP, (args.len() as i32 - 4) * 4));
        }
        if self.induction.is_some() {
            self.root.push(I::Lw(Reg::T7, 0, Reg::SP));
            self.root.push(I::Addi(Reg::SP, Reg::SP, 4));
        }
        cache.invalidate_all();

        if !self.module.ty(callee).is_void() {
            let dst = self.acquire_target(inst);
            self.emit_move(dst.reg, Reg::V0);
            self.store_value(inst, dst.reg, cache);
            self.release_target(dst);
        }
    }

    fn add_immediate(&mut self, dst: Reg, src: Reg, imm: i32) {
        if fits_imm16(imm) {
            self.root.push(I::Addi(dst, src, imm));
            return;
        }
        let tmp = self.temps.acquire();
        self.root.push(I::Li(tmp, imm));
        self.root.push(I::Addu(dst, src, tmp));
        self.temps.release(tmp);
    }

    fn emit_gep(
        &mut self,
        inst: ValueId,
        base: ValueId,
        indices: &[ValueId],
        cache: &mut BlockCache,
    ) {
        let base_reg = self.temps.acquire();
        self.load_address(base, base_reg);

        let mut imm_offset = 0i32;
        let mut offset_reg: Option<Reg> = None;
        let mut cur_ty = self.module.ty(base).clone();
        for &index in indices {
            let stride = cur_ty
                .element()
                .map(|elem| elem.size_bytes() as i32)
                .unwrap_or_else(|| cur_ty.size_bytes() as i32);
            match self.module.as_const_int(index) {
                Some(value) => imm_offset = imm_offset.wrapping_add(value.wrapping_mul(stride)),
                None => {
                    let index_reg = self.temps.acquire();
                    self.load_value(index, index_reg, cache);
                    if stride > 1 && stride.count_ones() == 1 {
                        self.root.push(I::Sll(index_reg, index_reg, stride.trailing_zeros()));
                    } else if stride != 1 {
                        let mul_reg = self.temps.acquire();
                        self.root.push(I::Li(mul_reg, stride));
                        self.root.push(I::Mul(index_reg, index_reg, mul_reg));
                        self.temps.release(mul_reg);
                    }
                    match offset_reg {
                        None => offset_reg = Some(index_reg),
                        Some(acc) => {
                            self.root.push(I::Addu(acc, acc, index_reg));
                            self.temps.release(index_reg);
                        }
                    }
                }
            }
            if let Some(elem) = cur_ty.element() {
                cur_ty = elem.clone();
            }
        }

        if imm_offset != 0 {
            self.add_immediate(base_reg, base_reg, imm_offset);
        }
        if let Some(acc) = offset_reg {
            self.root.push(I::Addu(base_reg, base_reg, acc));
            self.temps.release(acc);
        }
        let dst = self.acquire_target(inst);
        self.emit_move(dst.reg, base_reg);
        self.store_value(inst, dst.reg, cache);
        self.release_target(dst);
        self.temps.release(base_reg);
    }

    fn emit_array_update_loop(&mut self, emit: &ArrayLoopEmit, cache: &mut BlockCache) {
        let stride = if emit.stride > 0 { emit.stride } else { 4 };
        let base_reg = self.temps.acquire();
        let delta_reg = self.temps.acquire();
        let val_reg = self.temps.acquire();
        let count_reg = self.temps.acquire();

        self.load_address(emit.base, base_reg);
        let start_offset = emit.start_index * stride;
        if start_offset != 0 {
            self.add_immediate(base_reg, base_reg, start_offset);
        }
        self.load_value(emit.delta, delta_reg, cache);
        self.root.push(I::Li(count_reg, emit.count));
        let label = Label::from(format!("loop.opt.{}", *self.loop_counter));
        *self.loop_counter += 1;
        self.root.push_label(label.clone());
        self.root.push(I::Lw(val_reg, 0, base_reg));
        self.root.push(I::Addu(val_reg, val_reg, delta_reg));
        self.root.push(I::Sw(val_reg, 0, base_reg));
        self.add_immediate(base_reg, base_reg, stride);
        self.root.push(I::Addi(count_reg, count_reg, -1));
        self.root.push_with_delay_slot(I::Bne(count_reg, Reg::ZERO, label));

        self.temps.release(base_reg);
        self.temps.release(delta_reg);
        self.temps.release(val_reg);
        self.temps.release(count_reg);
    }

    fn emit_return(&mut self, value: Option<ValueId>, cache: &mut BlockCache) {
        if let Some(value) = value {
            self.load_value(value, Reg::V0, cache);
        }
        self.root.push_with_delay_slot(I::J(self.ret_label.clone()));
    }

    fn emit_jump(&mut self, target: ValueId) {
        // Entering a recognized loop from outside seeds the pinned induction
        // register from the variable's stack slot.
        if let Some(info) = self.loops.loop_at_cond(target) {
            if !self.in_loop_block {
                if let Some(&offset) = self.frame.alloca_offsets.get(&info.addr) {
                    self.root.push(I::Lw(Reg::T7, offset, Reg::FP));
                }
            }
        }
        let label = self.frame.block_labels[&target].clone();
        self.root.push_with_delay_slot(I::J(label));
    }

    fn emit_branch(
        &mut self,
        cond: ValueId,
        then_block: ValueId,
        else_block: ValueId,
        cache: &mut BlockCache,
    ) {
        let then_label = self.frame.block_labels[&then_block].clone();
        let else_label = self.frame.block_labels[&else_block].clone();
        if let Some(value) = self.module.as_const_int(cond) {
            let taken = if value != 0 { then_label } else { else_label };
            self.root.push_with_delay_slot(I::J(taken));
            return;
        }
        if let Some(&InstKind::Compare { op, lhs, rhs }) = self.module.value(cond).as_inst() {
            self.emit_branch_compare(op, lhs, rhs, then_label, else_label, cache);
            return;
        }
        let reg = self.temps.acquire();
        self.load_value(cond, reg, cache);
        self.root.push_with_delay_slot(I::Bne(reg, Reg::ZERO, then_label));
        self.root.push_with_delay_slot(I::J(else_label));
        self.temps.release(reg);
    }

    /// A branch on a compare fuses into the conditional branch itself.
    fn emit_branch_compare(
        &mut self,
        op: CompareOp,
        lhs: ValueId,
        rhs: ValueId,
        then_label: Label,
        else_label: Label,
        cache: &mut BlockCache,
    ) {
        let lhs_reg = self.temps.acquire();
        self.load_value(lhs, lhs_reg, cache);
        let rhs_reg = self.temps.acquire();
        self.load_value(rhs, rhs_reg, cache);

        match op {
            CompareOp::Eq => {
                self.root.push_with_delay_slot(I::Beq(lhs_reg, rhs_reg, then_label));
            }
            CompareOp::Ne => {
                self.root.push_with_delay_slot(I::Bne(lhs_reg, rhs_reg, then_label));
            }
            CompareOp::Lt | CompareOp::Gt | CompareOp::Le | CompareOp::Ge => {
                let tmp = self.temps.acquire();
                match op {
                    CompareOp::Lt => {
                        self.root.push(I::Slt(tmp, lhs_reg, rhs_reg));
                        self.root.push_with_delay_slot(I::Bne(tmp, Reg::ZERO, then_label));
                    }
                    CompareOp::Gt => {
                        self.root.push(I::Slt(tmp, rhs_reg, lhs_reg));
                        self.root.push_with_delay_slot(I::Bne(tmp, Reg::ZERO, then_label));
                    }
                    CompareOp::Le => {
                        self.root.push(I::Slt(tmp, rhs_reg, lhs_reg));
                        self.root.push_with_delay_slot(I::Beq(tmp, Reg::ZERO, then_label));
                    }
                    CompareOp::Ge => {
                        self.root.push(I::Slt(tmp, lhs_reg, rhs_reg));
                        self.root.push_with_delay_slot(I::Beq(tmp, Reg::ZERO, then_label));
                    }
                    _ => unreachable!(),
                }
                self.temps.release(tmp);
            }
        }
        self.root.push_with_delay_slot(I::J(else_label));
        self.temps.release(lhs_reg);
        self.temps.release(rhs_reg);
    }
}
