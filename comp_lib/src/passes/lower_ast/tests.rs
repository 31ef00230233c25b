use super::{build_ir_from_ast, Lowering};
use crate::diagnostic::DiagnosticSink;
use crate::parser;
use llvm_ir::{InstKind, Module, ValueId};

fn lower(source: &str) -> (Lowering, DiagnosticSink) {
    let mut sink = DiagnosticSink::new();
    let ast = parser::parse(source, &mut sink);
    let lowering = build_ir_from_ast(&ast, &mut sink);
    (lowering, sink)
}

fn main_func(module: &Module) -> ValueId {
    module.entry().expect("main sets the module entry")
}

fn block_names(module: &Module, func: ValueId) -> Vec<String> {
    module
        .blocks(func)
        .iter()
        .map(|&block| module.name(block).unwrap_or("?").to_owned())
        .collect()
}

#[test]
fn literal_return_folds_at_build_time() {
    let (lowering, sink) = lower("int main() { return 1 + 2 * 3; }");
    assert!(sink.is_empty());
    let module = &lowering.module;
    let main = main_func(module);
    let entry = module.entry_block(main);
    let insts = module.insts(entry);
    assert_eq!(insts.len(), 1);
    match module.inst(insts[0]) {
        InstKind::Return { value: Some(value) } => {
            assert_eq!(module.as_const_int(*value), Some(7));
        }
        other => panic!("expected folded return, got {other:?}"),
    }
}

#[test]
fn const_symbols_fold_through_expressions() {
    let (lowering, sink) =
        lower("const int N = 5;\nint main() { return N * N - 5; }");
    assert!(sink.is_empty());
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    match module.inst(module.insts(entry)[0]) {
        InstKind::Return { value: Some(value) } => {
            assert_eq!(module.as_const_int(*value), Some(20));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unwritten_global_array_reads_fold() {
    let (lowering, sink) = lower(
        "const int N = 5;\nint a[N] = {1, 2, 3, 4, 5};\nint main() { return a[2]; }",
    );
    assert!(sink.is_empty());
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    match module.inst(module.insts(entry)[0]) {
        InstKind::Return { value: Some(value) } => {
            assert_eq!(module.as_const_int(*value), Some(3));
        }
        other => panic!("unexpected {other:?}"),
    }
    // The global itself still exists with its initializer.
    assert!(module
        .globals()
        .iter()
        .any(|&g| module.name(g) == Some("a")));
}

#[test]
fn written_global_array_reads_do_not_fold() {
    let (lowering, sink) =
        lower("int a[3] = {1, 2, 3};\nint main() { a[0] = 9; return a[2]; }");
    assert!(sink.is_empty());
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    let has_load = module
        .insts(entry)
        .iter()
        .any(|&inst| matches!(module.inst(inst), InstKind::Load { .. }));
    assert!(has_load, "a read of a written array must load");
}

#[test]
fn for_loop_emits_the_four_blocks() {
    let (lowering, sink) = lower(
        "int main() { int a = 0; for (int i = 0; i < 3; i = i + 1) a = a + i; return a; }",
    );
    assert!(sink.is_empty());
    let module = &lowering.module;
    let names = block_names(module, main_func(module));
    assert_eq!(names, vec!["entry", "for.cond", "for.body", "for.step", "for.end"]);
    for &block in module.blocks(main_func(module)) {
        assert!(module.terminator(block).is_some(), "{:?} unterminated", module.name(block));
    }
}

#[test]
fn short_circuit_or_branches_without_materializing() {
    let (lowering, sink) = lower(
        "int main() { int a = 1; int b = 2; if (a == 1 || b == 2) return 1; return 0; }",
    );
    assert!(sink.is_empty());
    let module = &lowering.module;
    let main = main_func(module);
    let names = block_names(module, main);
    assert!(names.contains(&"lor.rhs".to_owned()), "blocks: {names:?}");
    for &block in module.blocks(main) {
        for &inst in module.insts(block) {
            assert!(
                !matches!(module.inst(inst), InstKind::Logical { .. }),
                "control context must not emit logical instructions"
            );
        }
    }
}

#[test]
fn value_context_logical_materializes() {
    let (lowering, sink) =
        lower("int main() { int a = getint(); int b = a && 1; return b; }");
    assert!(sink.is_empty());
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    let has_logical = module
        .insts(entry)
        .iter()
        .any(|&inst| matches!(module.inst(inst), InstKind::Logical { .. }));
    assert!(has_logical);
}

#[test]
fn scalar_params_get_entry_allocas_array_params_do_not() {
    let (lowering, sink) = lower(
        "int f(int x, int arr[]) { return x + arr[0]; }\nint main() { return 0; }",
    );
    assert!(sink.is_empty());
    let module = &lowering.module;
    let func = module.functions()[4]; // after the four builtins
    assert_eq!(module.name(func), Some("f"));
    let entry = module.entry_block(func);
    let allocas = module
        .insts(entry)
        .iter()
        .filter(|&&inst| matches!(module.inst(inst), InstKind::Alloca { .. }))
        .count();
    assert_eq!(allocas, 1, "only the scalar parameter gets a home slot");
}

#[test]
fn sized_array_argument_decays_via_gep() {
    let (lowering, sink) = lower(
        "int sum(int arr[]) { return arr[0]; }\n\
         int data[4] = {1, 2, 3, 4};\n\
         int main() { return sum(data); }",
    );
    assert!(sink.is_empty());
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    let call = module
        .insts(entry)
        .iter()
        .find(|&&inst| matches!(module.inst(inst), InstKind::Call { .. }))
        .copied()
        .expect("main calls sum");
    let InstKind::Call { args, .. } = module.inst(call) else { unreachable!() };
    let InstKind::GetElementPtr { indices, .. } = module.inst(args[0]) else {
        panic!("array argument must decay through a gep");
    };
    assert_eq!(indices.len(), 2);
    assert_eq!(module.as_const_int(indices[0]), Some(0));
    assert_eq!(module.as_const_int(indices[1]), Some(0));
}

#[test]
fn static_locals_become_module_globals() {
    let (lowering, sink) = lower(
        "void bump() { static int n = 0; n = n + 1; }\n\
         int main() { bump(); return 0; }",
    );
    assert!(sink.is_empty());
    let module = &lowering.module;
    assert!(module.globals().iter().any(|&g| module.name(g) == Some("n")));
}

#[test]
fn redefinition_keeps_first_and_reports_b() {
    let (lowering, sink) = lower("int main() {\nint x = 1; int x = 2;\nreturn x;\n}");
    assert_eq!(sink.dump(), "2 b\n");
    // Still produces a usable module.
    assert!(lowering.module.entry().is_some());
}

#[test]
fn break_outside_loop_reports_m_and_continues() {
    let (lowering, sink) = lower("int main() {\nbreak;\nreturn 0;\n}");
    assert_eq!(sink.dump(), "2 m\n");
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    assert!(module.terminator(entry).is_some(), "emission continues after the error");
}

#[test]
fn undefined_name_reports_c() {
    let (_, sink) = lower("int main() {\nreturn y;\n}");
    assert_eq!(sink.dump(), "2 c\n");
}

#[test]
fn assignment_to_const_reports_h() {
    let (_, sink) = lower("const int N = 1;\nint main() {\nN = 2;\nreturn 0;\n}");
    assert_eq!(sink.dump(), "3 h\n");
}

#[test]
fn call_mismatches_report_d_and_e() {
    let (_, sink) = lower(
        "int f(int x) { return x; }\n\
         int a[2] = {1, 2};\n\
         int main() {\n\
         f(1, 2);\n\
         f(a);\n\
         return 0;\n\
         }",
    );
    assert_eq!(sink.dump(), "4 d\n5 e\n");
}

#[test]
fn return_value_in_void_reports_f() {
    let (_, sink) = lower("void f() {\nreturn 1;\n}\nint main() { f(); return 0; }");
    assert_eq!(sink.dump(), "2 f\n");
}

#[test]
fn missing_return_reports_g_at_closing_brace() {
    let (_, sink) = lower("int f() {\nint x = 1;\n}\nint main() { return f(); }");
    assert_eq!(sink.dump(), "3 g\n");
}

#[test]
fn printf_count_mismatch_reports_l() {
    let (_, sink) = lower("int main() {\nprintf(\"%d %d\", 1);\nreturn 0;\n}");
    assert_eq!(sink.dump(), "2 l\n");
}

#[test]
fn printf_expands_to_runtime_calls() {
    let (lowering, sink) = lower("int main() { printf(\"a=%d\\n\", 5); return 0; }");
    assert!(sink.is_empty());
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    let callees: Vec<&str> = module
        .insts(entry)
        .iter()
        .filter_map(|&inst| match module.inst(inst) {
            InstKind::Call { callee, .. } => module.name(*callee),
            _ => None,
        })
        .collect();
    // 'a', '=', then the argument, then the newline.
    assert_eq!(callees, vec!["putch", "putch", "putint", "putch"]);
}

#[test]
fn scope_dump_lists_scopes_depth_first() {
    let (lowering, sink) = lower(
        "int g = 1;\nint main() { int a = 2; { int b = 3; } return 0; }",
    );
    assert!(sink.is_empty());
    let dump = lowering.scopes.dump();
    let g_at = dump.find("int g").expect("global listed");
    let a_at = dump.find("int a").expect("main's local listed");
    let b_at = dump.find("int b").expect("inner local listed");
    assert!(g_at < a_at && a_at < b_at);
}

#[test]
fn dead_code_after_return_is_swallowed() {
    let (lowering, sink) = lower("int main() { return 0; int x = 1; x = x + 2; }");
    assert!(sink.is_empty());
    let module = &lowering.module;
    let entry = module.entry_block(main_func(module));
    // The alloca survives (entry prefix), but no store or arithmetic follows
    // the return.
    let insts = module.insts(entry);
    let ret_at = insts
        .iter()
        .position(|&inst| matches!(module.inst(inst), InstKind::Return { .. }))
        .expect("return present");
    assert_eq!(ret_at, insts.len() - 1, "nothing is emitted after the return");
}

#[test]
fn clean_programs_produce_well_formed_ir() {
    let sources = [
        "int main() { return 0; }",
        "int main() { int a = 0; for (int i = 0; i < 3; i = i + 1) a = a + i; return a; }",
        "int f(int x, int arr[]) { return x + arr[x]; }\n\
         int data[3] = {1, 2, 3};\n\
         int main() { return f(getint(), data); }",
        "int main() { int a = getint(); if (a == 1 || a > 5 && !(a == 7)) putint(a); return 0; }",
        "void show(int n) { printf(\"n=%d\\n\", n); }\n\
         int main() { show(42); return 0; }",
        "int abs(int x) { if (x < 0) return 0 - x; return x; }\n\
         int main() { return abs(0 - 5); }",
    ];
    for source in sources {
        let (mut lowering, sink) = lower(source);
        assert!(sink.is_empty(), "{source:?}: {}", sink.dump());
        llvm_ir::validator::validate(&lowering.module)
            .unwrap_or_else(|reason| panic!("fresh IR invalid for {source:?}: {reason:?}"));
        llvm_ir::opt::optimize(&mut lowering.module);
        llvm_ir::validator::validate(&lowering.module)
            .unwrap_or_else(|reason| panic!("optimized IR invalid for {source:?}: {reason:?}"));
    }
}

#[test]
fn builtins_are_predeclared() {
    let (lowering, sink) = lower("int main() { putint(getint()); return 0; }");
    assert!(sink.is_empty());
    let module = &lowering.module;
    let names: Vec<_> = module
        .functions()
        .iter()
        .take(4)
        .map(|&f| module.name(f).unwrap_or("?"))
        .collect();
    assert_eq!(names, vec!["getint", "putint", "putch", "putstr"]);
}
