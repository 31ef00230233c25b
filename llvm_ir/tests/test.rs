use llvm_ir::{opt, validator, BinaryOp, InstKind, IrBuilder, Module, Type, ValueId};

/// Builds `int f() { return 1 + 2 * 3; }` by hand, without the build-time
/// evaluator, so the optimizer has something to fold.
fn build_arith_function(module: &mut Module) -> ValueId {
    let func = module.add_function("f", Type::Int, &[], false);
    let mut b = IrBuilder::new(module, func);
    let one = b.const_int(1);
    let two = b.const_int(2);
    let three = b.const_int(3);
    let product = b.build_binary(BinaryOp::Mul, two, three);
    let sum = b.build_binary(BinaryOp::Add, one, product);
    b.build_return(Some(sum));
    func
}

#[test]
fn use_def_links_stay_consistent() {
    let mut module = Module::new();
    let func = module.add_function("f", Type::Int, &[], false);
    let mut b = IrBuilder::new(&mut module, func);
    let slot = b.alloca(Type::Int);
    let x = b.build_load(slot);
    let y = b.build_binary(BinaryOp::Add, x, x);
    b.build_return(Some(y));

    assert_eq!(module.use_count(x), 2, "one use per operand slot");
    assert_eq!(module.use_count(y), 1);
    for &user in module.users(x) {
        assert!(
            module.inst(user).operands().contains(&x),
            "every user must reference the value in an operand slot"
        );
    }
}

#[test]
fn replace_all_uses_with_rewires_every_user() {
    let mut module = Module::new();
    let func = module.add_function("f", Type::Int, &[], false);
    let mut b = IrBuilder::new(&mut module, func);
    let slot = b.alloca(Type::Int);
    let x = b.build_load(slot);
    let y = b.build_binary(BinaryOp::Add, x, x);
    b.build_return(Some(y));

    let seven = module.const_int(7);
    module.replace_all_uses_with(x, seven);
    assert_eq!(module.use_count(x), 0);
    assert_eq!(module.use_count(seven), 2);
    assert_eq!(
        module.inst(y).operands(),
        vec![seven, seven],
        "both operand slots rewritten"
    );
}

#[test]
fn optimizer_folds_constant_return() {
    let mut module = Module::new();
    let func = build_arith_function(&mut module);
    opt::optimize(&mut module);

    let blocks = module.blocks(func);
    assert_eq!(blocks.len(), 1);
    let insts = module.insts(blocks[0]);
    assert_eq!(insts.len(), 1, "only the return remains");
    match module.inst(insts[0]) {
        InstKind::Return { value: Some(v) } => {
            assert_eq!(module.as_const_int(*v), Some(7));
        }
        other => panic!("expected constant return, found {other:?}"),
    }
}

#[test]
fn optimizer_is_confluent() {
    let mut once = Module::new();
    let f1 = build_arith_function(&mut once);
    opt::optimize(&mut once);
    let mut twice = Module::new();
    let f2 = build_arith_function(&mut twice);
    opt::optimize(&mut twice);
    opt::optimize(&mut twice);
    assert_eq!(llvm_ir::print_module(&once), llvm_ir::print_module(&twice));
    assert_eq!(once.blocks(f1).len(), twice.blocks(f2).len());
}

#[test]
fn division_by_zero_is_not_folded() {
    let mut module = Module::new();
    let func = module.add_function("f", Type::Int, &[], false);
    let mut b = IrBuilder::new(&mut module, func);
    let one = b.const_int(1);
    let zero = b.const_int(0);
    let quotient = b.build_binary(BinaryOp::Div, one, zero);
    b.build_return(Some(quotient));
    opt::optimize(&mut module);

    let entry = module.entry_block(func);
    let insts = module.insts(entry);
    assert_eq!(insts.len(), 2, "the division survives for the target to handle");
    assert!(matches!(
        module.inst(insts[0]),
        InstKind::Binary { op: BinaryOp::Div, .. }
    ));
}

#[test]
fn dce_removes_store_only_alloca() {
    let mut module = Module::new();
    let func = module.add_function("f", Type::Void, &[], false);
    let mut b = IrBuilder::new(&mut module, func);
    let slot = b.alloca(Type::Int);
    let five = b.const_int(5);
    b.build_store(five, slot);
    b.build_return(None);
    opt::optimize(&mut module);

    let entry = module.entry_block(func);
    let insts = module.insts(entry);
    assert_eq!(insts.len(), 1);
    assert!(matches!(module.inst(insts[0]), InstKind::Return { value: None }));
}

#[test]
fn cfg_simplify_resolves_constant_branch() {
    let mut module = Module::new();
    let func = module.add_function("f", Type::Int, &[], false);
    let mut b = IrBuilder::new(&mut module, func);
    let then_block = b.new_block("then");
    let else_block = b.new_block("else");
    let cond = b.const_int(1);
    b.build_branch(cond, then_block, else_block);
    b.position_at(then_block);
    let one = b.const_int(1);
    b.build_return(Some(one));
    b.position_at(else_block);
    let two = b.const_int(2);
    b.build_return(Some(two));
    opt::optimize(&mut module);

    // After folding the branch, the untaken side is unreachable and removed,
    // and every remaining block is reachable from the entry.
    let blocks = module.blocks(func).to_vec();
    assert!(!blocks.is_empty());
    for &block in &blocks {
        let term = module.terminator(block).expect("every block ends terminated");
        assert!(module.inst(term).is_terminator());
    }
    let mut reached = vec![module.entry_block(func)];
    let mut i = 0;
    while i < reached.len() {
        let term = module.terminator(reached[i]).unwrap();
        match module.inst(term) {
            InstKind::Jump { target } => {
                if !reached.contains(target) {
                    reached.push(*target);
                }
            }
            InstKind::Branch { then_block, else_block, .. } => {
                for t in [*then_block, *else_block] {
                    if !reached.contains(&t) {
                        reached.push(t);
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }
    assert_eq!(reached.len(), blocks.len(), "all blocks reachable after simplify");
}

#[test]
fn printer_output_shape() {
    let mut module = Module::new();
    module.add_function("getint", Type::Int, &[], true);
    let init = module.const_array(vec![1, 2, 3]);
    module.add_global("a", Type::int_array(3), Some(init), true);
    module.add_global("x", Type::Int, None, false);
    let func = module.add_function("main", Type::Int, &[], false);
    let mut b = IrBuilder::new(&mut module, func);
    let zero = b.const_int(0);
    b.build_return(Some(zero));

    let text = llvm_ir::print_module(&module);
    assert!(text.contains("declare i32 @getint()"));
    assert!(text.contains("@a = constant [3 x i32] [i32 1, i32 2, i32 3]"));
    assert!(text.contains("@x = global i32 zeroinitializer"));
    assert!(text.contains("define i32 @main() {"));
    assert!(text.contains("  ret i32 0"));
}

#[test]
fn validator_accepts_built_and_optimized_ir() {
    let mut module = Module::new();
    let func = module.add_function("f", Type::Int, &[("x", Type::Int)], false);
    let arg = module.function(func).params[0];
    let mut b = IrBuilder::new(&mut module, func);
    let slot = b.alloca(Type::Int);
    b.build_store(arg, slot);
    let then_block = b.new_block("then");
    let end_block = b.new_block("end");
    let x = b.build_load(slot);
    let zero = b.const_int(0);
    let cond = b.build_compare(llvm_ir::CompareOp::Lt, x, zero);
    b.build_branch(cond, then_block, end_block);
    b.position_at(then_block);
    let one = b.const_int(1);
    b.build_return(Some(one));
    b.position_at(end_block);
    let x2 = b.build_load(slot);
    b.build_return(Some(x2));

    validator::validate(&module).expect("fresh IR is well-formed");
    opt::optimize(&mut module);
    validator::validate(&module).expect("optimized IR is well-formed");

    // After CFG simplification every remaining block is reachable.
    let reachable = validator::reachable_blocks(&module, func);
    assert_eq!(reachable.len(), module.blocks(func).len());
}

#[test]
fn validator_rejects_misplaced_alloca() {
    let mut module = Module::new();
    let func = module.add_function("f", Type::Void, &[], false);
    let entry = module.entry_block(func);
    let slot = module.append_inst(
        entry,
        InstKind::Return { value: None },
        Type::Void,
    );
    let _ = slot;
    // An alloca appended after the terminator breaks the entry prefix rule.
    module.append_inst(
        entry,
        InstKind::Alloca { alloc_ty: Type::Int },
        Type::Int,
    );
    assert!(validator::validate(&module).is_err());
}

#[test]
#[should_panic(expected = "entry set twice")]
fn double_set_entry_is_a_bug() {
    let mut module = Module::new();
    let func = module.add_function("main", Type::Int, &[], false);
    module.set_entry(func);
    module.set_entry(func);
}
