use crate::{BinaryOp, CompareOp, InstKind, LogicalOp, Module, Type, UnaryOp, ValueId};
use std::collections::HashMap;

/// Targets for `break` and `continue` inside the innermost enclosing loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopTargets {
    pub break_to: ValueId,
    pub continue_to: ValueId,
}

/// Builds instructions into one function, maintaining the block invariants.
///
/// The builder tracks a *current block*: emitting a terminator clears it, and
/// while it is clear every non-terminator emission is a no-op that yields a
/// `ConstInt(0)` placeholder. This silently swallows the dead code that
/// follows `break`, `continue` and `return` without special cases at the call
/// sites.
///
/// Two per-block caches cut down on locally redundant instructions:
///
/// - a common-subexpression table keyed by opcode and operand identity, with
///   commutative operand pairs normalized for `Add`, `Mul`, `Eq` and `Ne`;
/// - a load cache keyed by address identity, invalidated by a store to the
///   same address and flushed entirely by calls.
///
/// Both reset whenever the builder moves to another block; they never reuse a
/// value across block boundaries.
pub struct IrBuilder<'m> {
    module: &'m mut Module,
    function: ValueId,
    cur_block: Option<ValueId>,
    cse: HashMap<CseKey, ValueId>,
    loads: HashMap<ValueId, ValueId>,
    loops: Vec<LoopTargets>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CseKey {
    Binary(BinaryOp, ValueId, ValueId),
    Unary(UnaryOp, ValueId),
    Compare(CompareOp, ValueId, ValueId),
    Logical(LogicalOp, ValueId, ValueId),
    ZExt(ValueId),
    Gep(ValueId, Vec<ValueId>),
}

fn normalized(module: &Module, lhs: ValueId, rhs: ValueId) -> (ValueId, ValueId) {
    if module.seq(rhs) < module.seq(lhs) {
        (rhs, lhs)
    } else {
        (lhs, rhs)
    }
}

impl<'m> IrBuilder<'m> {
    /// Starts building at the entry block of `function`.
    pub fn new(module: &'m mut Module, function: ValueId) -> Self {
        let entry = module.entry_block(function);
        Self {
            module,
            function,
            cur_block: Some(entry),
            cse: HashMap::new(),
            loads: HashMap::new(),
            loops: Vec::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        self.module
    }

    pub fn function(&self) -> ValueId {
        self.function
    }

    pub fn current_block(&self) -> Option<ValueId> {
        self.cur_block
    }

    /// Starts filling `block`. Block-local caches reset.
    pub fn position_at(&mut self, block: ValueId) {
        self.cur_block = Some(block);
        self.cse.clear();
        self.loads.clear();
    }

    pub fn new_block(&mut self, name: &str) -> ValueId {
        self.module.add_block(self.function, name)
    }

    // ---- loop target stack ---------------------------------------------

    pub fn push_loop(&mut self, targets: LoopTargets) {
        self.loops.push(targets);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn innermost_loop(&self) -> Option<LoopTargets> {
        self.loops.last().copied()
    }

    // ---- emission ------------------------------------------------------

    pub fn const_int(&mut self, value: i32) -> ValueId {
        self.module.const_int(value)
    }

    /// Allocates a stack slot in the entry block. Allocas bypass the current
    /// block entirely so that declarations in dead code still produce a valid
    /// symbol value; the optimizer removes them if nothing survives.
    pub fn alloca(&mut self, ty: Type) -> ValueId {
        self.module.insert_alloca(self.function, ty)
    }

    fn emit(&mut self, kind: InstKind, ty: Type) -> ValueId {
        match self.cur_block {
            Some(block) => self.module.append_inst(block, kind, ty),
            None => self.module.const_int(0),
        }
    }

    fn emit_cached(&mut self, key: CseKey, kind: InstKind, ty: Type) -> ValueId {
        if self.cur_block.is_none() {
            return self.module.const_int(0);
        }
        if let Some(&hit) = self.cse.get(&key) {
            return hit;
        }
        let id = self.emit(kind, ty);
        self.cse.insert(key, id);
        id
    }

    pub fn build_binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        if let Some(simplified) = self.simplify_binary(op, lhs, rhs) {
            return simplified;
        }
        let (a, b) = if op.is_commutative() {
            normalized(self.module, lhs, rhs)
        } else {
            (lhs, rhs)
        };
        self.emit_cached(
            CseKey::Binary(op, a, b),
            InstKind::Binary { op, lhs, rhs },
            Type::Int,
        )
    }

    /// The build-time algebraic identities: `x+0`, `0+x`, `x-0`, `x*1`, `1*x`
    /// and `x/1` yield `x`; `x*0`, `0*x` and `x%1` yield `0`.
    fn simplify_binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Option<ValueId> {
        let lc = self.module.as_const_int(lhs);
        let rc = self.module.as_const_int(rhs);
        match op {
            BinaryOp::Add => match (lc, rc) {
                (Some(0), _) => Some(rhs),
                (_, Some(0)) => Some(lhs),
                _ => None,
            },
            BinaryOp::Sub => (rc == Some(0)).then_some(lhs),
            BinaryOp::Mul => match (lc, rc) {
                (Some(0), _) | (_, Some(0)) => Some(self.module.const_int(0)),
                (Some(1), _) => Some(rhs),
                (_, Some(1)) => Some(lhs),
                _ => None,
            },
            BinaryOp::Div => (rc == Some(1)).then_some(lhs),
            BinaryOp::Mod => (rc == Some(1)).then(|| self.module.const_int(0)),
        }
    }

    pub fn build_unary(&mut self, op: UnaryOp, operand: ValueId) -> ValueId {
        let ty = match op {
            UnaryOp::Not => Type::Bool,
            UnaryOp::Pos | UnaryOp::Neg => Type::Int,
        };
        self.emit_cached(CseKey::Unary(op, operand), InstKind::Unary { op, operand }, ty)
    }

    pub fn build_compare(&mut self, op: CompareOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let (a, b) = if op.is_commutative() {
            normalized(self.module, lhs, rhs)
        } else {
            (lhs, rhs)
        };
        self.emit_cached(
            CseKey::Compare(op, a, b),
            InstKind::Compare { op, lhs, rhs },
            Type::Bool,
        )
    }

    pub fn build_logical(&mut self, op: LogicalOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit_cached(
            CseKey::Logical(op, lhs, rhs),
            InstKind::Logical { op, lhs, rhs },
            Type::Bool,
        )
    }

    pub fn build_zext(&mut self, operand: ValueId) -> ValueId {
        self.emit_cached(CseKey::ZExt(operand), InstKind::ZExt { operand }, Type::Int)
    }

    /// Emits a load through `addr`, reusing the value of a previous load from
    /// the same address when no store or call has intervened.
    pub fn build_load(&mut self, addr: ValueId) -> ValueId {
        if self.cur_block.is_none() {
            return self.module.const_int(0);
        }
        if let Some(&hit) = self.loads.get(&addr) {
            return hit;
        }
        let id = self.emit(InstKind::Load { addr }, Type::Int);
        self.loads.insert(addr, id);
        id
    }

    pub fn build_store(&mut self, value: ValueId, addr: ValueId) {
        if self.cur_block.is_none() {
            return;
        }
        self.loads.remove(&addr);
        self.emit(InstKind::Store { value, addr }, Type::Void);
    }

    /// Element address computation. For a sized array base the indices are
    /// `[0, i]`; for a decayed base they are `[i]`. The result is the decayed
    /// element address.
    pub fn build_gep(&mut self, base: ValueId, indices: Vec<ValueId>) -> ValueId {
        let elem = self
            .module
            .ty(base)
            .element()
            .expect("gep base must have array type")
            .clone();
        self.emit_cached(
            CseKey::Gep(base, indices.clone()),
            InstKind::GetElementPtr { base, indices },
            Type::Array(Box::new(elem), crate::DECAYED),
        )
    }

    /// Emits a call. The per-block load cache is flushed: the callee may have
    /// written any address.
    pub fn build_call(&mut self, callee: ValueId, args: Vec<ValueId>) -> ValueId {
        if self.cur_block.is_none() {
            return self.module.const_int(0);
        }
        self.loads.clear();
        let ret_ty = self.module.ty(callee).clone();
        self.emit(InstKind::Call { callee, args }, ret_ty)
    }

    // ---- terminators ---------------------------------------------------

    /// Emits a jump and clears the current block. A no-op when the block is
    /// already terminated.
    pub fn build_jump(&mut self, target: ValueId) {
        self.terminate(InstKind::Jump { target });
    }

    pub fn build_branch(&mut self, cond: ValueId, then_block: ValueId, else_block: ValueId) {
        self.terminate(InstKind::Branch { cond, then_block, else_block });
    }

    pub fn build_return(&mut self, value: Option<ValueId>) {
        self.terminate(InstKind::Return { value });
    }

    fn terminate(&mut self, kind: InstKind) {
        debug_assert!(kind.is_terminator());
        if let Some(block) = self.cur_block.take() {
            self.module.append_inst(block, kind, Type::Void);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_module_with_func() -> (Module, ValueId) {
        let mut module = Module::new();
        let func = module.add_function("f", Type::Int, &[], false);
        (module, func)
    }

    #[test]
    fn build_time_identities() {
        let (mut module, func) = new_module_with_func();
        let mut b = IrBuilder::new(&mut module, func);
        let x = b.alloca(Type::Int);
        let x = b.build_load(x);
        let zero = b.const_int(0);
        let one = b.const_int(1);
        assert_eq!(b.build_binary(BinaryOp::Add, x, zero), x);
        assert_eq!(b.build_binary(BinaryOp::Add, zero, x), x);
        assert_eq!(b.build_binary(BinaryOp::Sub, x, zero), x);
        assert_eq!(b.build_binary(BinaryOp::Mul, x, one), x);
        assert_eq!(b.build_binary(BinaryOp::Div, x, one), x);
        let product = b.build_binary(BinaryOp::Mul, x, zero);
        assert_eq!(b.module().as_const_int(product), Some(0));
        let rem = b.build_binary(BinaryOp::Mod, x, one);
        assert_eq!(b.module().as_const_int(rem), Some(0));
    }

    #[test]
    fn cse_hits_within_block() {
        let (mut module, func) = new_module_with_func();
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        let x = b.build_load(slot);
        let y = b.build_load(slot);
        assert_eq!(x, y, "same-address load reuses the previous load");

        let two = b.const_int(2);
        let s1 = b.build_binary(BinaryOp::Add, x, two);
        let s2 = b.build_binary(BinaryOp::Add, two, x);
        assert_eq!(s1, s2, "addition is normalized for commutativity");

        let d1 = b.build_binary(BinaryOp::Sub, x, two);
        let d2 = b.build_binary(BinaryOp::Sub, two, x);
        assert_ne!(d1, d2, "subtraction is not commutative");
    }

    #[test]
    fn store_invalidates_load_cache() {
        let (mut module, func) = new_module_with_func();
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        let other = b.alloca(Type::Int);
        let x = b.build_load(slot);
        let y = b.build_load(other);
        let one = b.const_int(1);
        b.build_store(one, slot);
        let x2 = b.build_load(slot);
        assert_ne!(x, x2, "store to the address invalidates its entry");
        let y2 = b.build_load(other);
        assert_eq!(y, y2, "store to another address leaves the entry alone");
    }

    #[test]
    fn call_flushes_load_cache() {
        let (mut module, func) = new_module_with_func();
        let callee = module.add_function("getint", Type::Int, &[], true);
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        let x = b.build_load(slot);
        b.build_call(callee, vec![]);
        let x2 = b.build_load(slot);
        assert_ne!(x, x2);
    }

    #[test]
    fn caches_reset_at_block_boundary() {
        let (mut module, func) = new_module_with_func();
        let mut b = IrBuilder::new(&mut module, func);
        let slot = b.alloca(Type::Int);
        let x = b.build_load(slot);
        let next = b.new_block("next");
        b.build_jump(next);
        b.position_at(next);
        let x2 = b.build_load(slot);
        assert_ne!(x, x2, "the load cache never reuses across blocks");
    }

    #[test]
    fn emission_after_terminator_is_noop() {
        let (mut module, func) = new_module_with_func();
        let mut b = IrBuilder::new(&mut module, func);
        let zero = b.const_int(0);
        b.build_return(Some(zero));
        assert!(b.current_block().is_none());
        let slotless = b.build_binary(BinaryOp::Add, zero, zero);
        assert_eq!(b.module().as_const_int(slotless), Some(0));
        b.build_return(Some(zero));
        let entry = b.module().entry_block(func);
        assert_eq!(b.module().insts(entry).len(), 1, "exactly one terminator");
    }

    #[test]
    fn allocas_stay_in_entry_prefix() {
        let (mut module, func) = new_module_with_func();
        let mut b = IrBuilder::new(&mut module, func);
        let a = b.alloca(Type::Int);
        let one = b.const_int(1);
        b.build_store(one, a);
        let c = b.alloca(Type::int_array(3));
        let entry = b.module().entry_block(func);
        let insts = b.module().insts(entry);
        assert_eq!(insts[0], a);
        assert_eq!(insts[1], c, "late allocas insert before the first non-alloca");
        assert!(matches!(b.module().inst(insts[2]), InstKind::Store { .. }));
    }
}
