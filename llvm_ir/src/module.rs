use crate::{
    Argument, Block, Function, Global, Inst, InstKind, Type, ValueData, ValueId, ValueKind,
};
use generational_arena::Arena;
use std::collections::HashSet;

/// The top-level IR container.
///
/// A module exclusively owns every IR node through a single arena: globals,
/// functions, their arguments and blocks, and each block's instructions. All
/// mutation goes through the module so that the use/def graph stays accurate:
/// creating an instruction records a use for each operand, removing one drops
/// them first.
pub struct Module {
    values: Arena<ValueData>,
    globals: Vec<ValueId>,
    functions: Vec<ValueId>,
    entry: Option<ValueId>,
    next_seq: u32,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    pub fn new() -> Self {
        Self {
            values: Arena::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            entry: None,
            next_seq: 0,
        }
    }

    fn insert(&mut self, ty: Type, name: Option<String>, kind: ValueKind) -> ValueId {
        let seq = self.next_seq;
        self.next_seq += 1;
        ValueId(self.values.insert(ValueData {
            ty,
            name,
            seq,
            uses: Vec::new(),
            kind,
        }))
    }

    /// The value's creation sequence number: an arbitrary but stable total
    /// order over the module's values.
    pub fn seq(&self, id: ValueId) -> u32 {
        self.values[id.0].seq
    }

    /// Whether the handle still points at a live value. Handles go stale when
    /// their value is removed; any other access through one panics.
    pub fn contains(&self, id: ValueId) -> bool {
        self.values.get(id.0).is_some()
    }

    // ---- accessors -----------------------------------------------------

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.0]
    }

    pub fn ty(&self, id: ValueId) -> &Type {
        &self.values[id.0].ty
    }

    pub fn name(&self, id: ValueId) -> Option<&str> {
        self.values[id.0].name.as_deref()
    }

    pub fn as_const_int(&self, id: ValueId) -> Option<i32> {
        self.values[id.0].as_const_int()
    }

    pub fn globals(&self) -> &[ValueId] {
        &self.globals
    }

    pub fn functions(&self) -> &[ValueId] {
        &self.functions
    }

    pub fn function(&self, id: ValueId) -> &Function {
        match &self.values[id.0].kind {
            ValueKind::Function(function) => function,
            other => panic!("expected function, found {other:?}"),
        }
    }

    fn function_mut(&mut self, id: ValueId) -> &mut Function {
        match &mut self.values[id.0].kind {
            ValueKind::Function(function) => function,
            other => panic!("expected function, found {other:?}"),
        }
    }

    pub fn block(&self, id: ValueId) -> &Block {
        match &self.values[id.0].kind {
            ValueKind::Block(block) => block,
            other => panic!("expected block, found {other:?}"),
        }
    }

    fn block_mut(&mut self, id: ValueId) -> &mut Block {
        match &mut self.values[id.0].kind {
            ValueKind::Block(block) => block,
            other => panic!("expected block, found {other:?}"),
        }
    }

    pub fn inst(&self, id: ValueId) -> &InstKind {
        match &self.values[id.0].kind {
            ValueKind::Inst(inst) => &inst.kind,
            other => panic!("expected instruction, found {other:?}"),
        }
    }

    /// The block an instruction lives in.
    pub fn inst_block(&self, id: ValueId) -> ValueId {
        match &self.values[id.0].kind {
            ValueKind::Inst(inst) => inst.block,
            other => panic!("expected instruction, found {other:?}"),
        }
    }

    pub fn blocks(&self, func: ValueId) -> &[ValueId] {
        &self.function(func).blocks
    }

    /// The entry block of a function. Every defined function has one from the
    /// moment it is created.
    pub fn entry_block(&self, func: ValueId) -> ValueId {
        self.function(func).blocks[0]
    }

    pub fn insts(&self, block: ValueId) -> &[ValueId] {
        &self.block(block).insts
    }

    /// The last instruction of a block, if it is a terminator.
    pub fn terminator(&self, block: ValueId) -> Option<ValueId> {
        let last = *self.block(block).insts.last()?;
        self.values[last.0]
            .as_inst()
            .is_some_and(InstKind::is_terminator)
            .then_some(last)
    }

    // ---- entry function ------------------------------------------------

    /// Designates the module entry. Setting it twice is a programmer error.
    pub fn set_entry(&mut self, func: ValueId) {
        assert!(self.entry.is_none(), "module entry set twice");
        self.entry = Some(func);
    }

    pub fn entry(&self) -> Option<ValueId> {
        self.entry
    }

    // ---- constants -----------------------------------------------------

    pub fn const_int(&mut self, value: i32) -> ValueId {
        self.const_int_of(Type::Int, value)
    }

    /// A constant with an explicit type, used when folding a `Bool`-typed
    /// instruction in place.
    pub fn const_int_of(&mut self, ty: Type, value: i32) -> ValueId {
        self.insert(ty, None, ValueKind::ConstInt(value))
    }

    pub fn const_array(&mut self, elems: Vec<i32>) -> ValueId {
        let ty = Type::int_array(elems.len() as i32);
        self.insert(ty, None, ValueKind::ConstArray(elems))
    }

    // ---- globals and functions -----------------------------------------

    /// Defines a module global. The name is made unique with a numeric suffix
    /// if an earlier global already claimed it (static locals from different
    /// functions may share a source name).
    pub fn add_global(
        &mut self,
        name: &str,
        ty: Type,
        initializer: Option<ValueId>,
        is_const: bool,
    ) -> ValueId {
        if let Some(init) = initializer {
            assert_eq!(
                &self.values[init.0].ty, &ty,
                "global initializer type must match the global"
            );
        }
        let name = self.unique_global_name(name);
        let id = self.insert(ty, Some(name), ValueKind::Global(Global { initializer, is_const }));
        self.globals.push(id);
        id
    }

    fn unique_global_name(&self, name: &str) -> String {
        let taken: HashSet<&str> = self
            .globals
            .iter()
            .chain(&self.functions)
            .filter_map(|id| self.values[id.0].name.as_deref())
            .collect();
        if !taken.contains(name) {
            return name.to_owned();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{name}.{n}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Creates a function with its arguments and, unless it is a builtin, an
    /// entry block. The function is appended to the module in declaration
    /// order.
    pub fn add_function(
        &mut self,
        name: &str,
        ret_ty: Type,
        params: &[(&str, Type)],
        is_builtin: bool,
    ) -> ValueId {
        let args: Vec<ValueId> = params
            .iter()
            .enumerate()
            .map(|(index, (name, ty))| {
                self.insert(
                    ty.clone(),
                    Some((*name).to_owned()),
                    ValueKind::Argument(Argument { index }),
                )
            })
            .collect();
        let func = self.insert(
            ret_ty,
            Some(name.to_owned()),
            ValueKind::Function(Function {
                params: args,
                blocks: Vec::new(),
                is_builtin,
            }),
        );
        self.functions.push(func);
        if !is_builtin {
            self.add_block(func, "entry");
        }
        func
    }

    /// Appends a new empty block to a function.
    pub fn add_block(&mut self, func: ValueId, name: &str) -> ValueId {
        let block = self.insert(
            Type::Void,
            Some(name.to_owned()),
            ValueKind::Block(Block { insts: Vec::new() }),
        );
        self.function_mut(func).blocks.push(block);
        block
    }

    // ---- instructions --------------------------------------------------

    /// Appends an instruction to a block and records a use for each operand.
    pub fn append_inst(&mut self, block: ValueId, kind: InstKind, ty: Type) -> ValueId {
        let operands = kind.operands();
        let id = self.insert(ty, None, ValueKind::Inst(Inst { kind, block }));
        for op in operands {
            self.values[op.0].uses.push(id);
        }
        self.block_mut(block).insts.push(id);
        id
    }

    /// Creates an `Alloca` in the function's entry block, after any existing
    /// allocas and before the first other instruction.
    pub fn insert_alloca(&mut self, func: ValueId, alloc_ty: Type) -> ValueId {
        let entry = self.entry_block(func);
        let id = self.insert(
            alloc_ty.clone(),
            None,
            ValueKind::Inst(Inst {
                kind: InstKind::Alloca { alloc_ty },
                block: entry,
            }),
        );
        let insts = &self.block(entry).insts;
        let at = insts
            .iter()
            .position(|&inst| !matches!(self.inst(inst), InstKind::Alloca { .. }))
            .unwrap_or(insts.len());
        self.block_mut(entry).insts.insert(at, id);
        id
    }

    // ---- use/def graph -------------------------------------------------

    pub fn use_count(&self, id: ValueId) -> usize {
        self.values[id.0].uses.len()
    }

    pub fn users(&self, id: ValueId) -> &[ValueId] {
        &self.values[id.0].uses
    }

    /// Rewrites every user of `old` to reference `new` instead; afterwards
    /// `old` has no uses. This is the single privileged mutation that rewires
    /// use/def edges.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        assert_ne!(old, new, "cannot replace a value with itself");
        let users = std::mem::take(&mut self.values[old.0].uses);
        for &user in &users {
            match &mut self.values[user.0].kind {
                ValueKind::Inst(inst) => inst.kind.replace_operand(old, new),
                other => panic!("user is not an instruction: {other:?}"),
            }
        }
        self.values[new.0].uses.extend(users);
    }

    fn drop_operand_uses(&mut self, inst: ValueId) {
        for op in self.inst(inst).operands() {
            let uses = &mut self.values[op.0].uses;
            if let Some(at) = uses.iter().position(|&user| user == inst) {
                uses.swap_remove(at);
            }
        }
    }

    /// Removes an instruction from its block. Operand uses are dropped first
    /// so use counts stay accurate. The instruction must itself be unused.
    pub fn remove_inst(&mut self, inst: ValueId) {
        assert_eq!(
            self.use_count(inst),
            0,
            "removing an instruction that still has uses"
        );
        self.drop_operand_uses(inst);
        let block = self.inst_block(inst);
        self.block_mut(block).insts.retain(|&i| i != inst);
        self.values.remove(inst.0);
    }

    /// Removes blocks from a function wholesale, dropping all operand uses of
    /// their instructions first so that cross-references between the removed
    /// blocks cannot leave the graph inconsistent.
    pub fn remove_blocks(&mut self, func: ValueId, blocks: &[ValueId]) {
        for &block in blocks {
            for inst in self.block(block).insts.to_vec() {
                self.drop_operand_uses(inst);
            }
        }
        for &block in blocks {
            for inst in std::mem::take(&mut self.block_mut(block).insts) {
                self.values.remove(inst.0);
            }
            self.values.remove(block.0);
        }
        self.function_mut(func).blocks.retain(|b| !blocks.contains(b));
    }
}
