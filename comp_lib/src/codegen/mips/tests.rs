use crate::compile::{compile, CompileOpts};

fn mips(source: &str) -> String {
    let output = compile(source, CompileOpts::default());
    assert!(output.sink.is_empty(), "diagnostics: {}", output.sink.dump());
    output.mips_text
}

#[test]
fn start_stub_and_builtins_are_emitted() {
    let text = mips("int main() { return 0; }");
    assert!(text.contains(".globl _start"));
    assert!(text.contains("_start:\n  jal main\n  nop\n  li $v0, 10\n  syscall"));
    for (name, syscall) in [("getint", 5), ("putint", 1), ("putch", 11), ("putstr", 4)] {
        assert!(text.contains(&format!("{name}:")), "{name} missing");
        assert!(text.contains(&format!("li $v0, {syscall}")));
    }
}

#[test]
fn globals_land_in_data() {
    let text = mips(
        "int x = 7;\nint zeroed[3];\nint init[2] = {1, 2};\n\
         int main() { x = x + 1; zeroed[0] = init[0]; return 0; }",
    );
    assert!(text.contains("x:\n  .word 7"));
    assert!(text.contains("zeroed:\n  .space 12"));
    assert!(text.contains("init:\n  .word 1, 2"));
}

#[test]
fn leaf_function_omits_prologue() {
    let text = mips("int f() { return 3; }\nint main() { return f(); }");
    let f_body: &str = text.split("\nf:\n").nth(1).expect("f emitted");
    let f_body = &f_body[..f_body.find("f_ret:").unwrap()];
    assert!(
        !f_body.contains("$sp"),
        "a leaf without spills needs no frame, got:\n{f_body}"
    );
    // main calls, so it keeps the full prologue.
    let main_body: &str = text.split("\nmain:\n").nth(1).expect("main emitted");
    assert!(main_body.contains("sw $ra"));
    assert!(main_body.contains("addi $fp, $sp"));
}

#[test]
fn loop_pins_induction_variable_in_t7() {
    let text = mips(
        "int main() { int a = 0; for (int i = 0; i < 100; i = i + 1) a = a + i; return a; }",
    );
    assert!(text.contains("main_for.cond:"));
    assert!(text.contains("main_for.body:"));
    assert!(text.contains("main_for.step:"));
    assert!(text.contains("main_for.end:"));
    assert!(
        text.contains("lw $t7"),
        "entering the loop seeds $t7 from the induction slot:\n{text}"
    );
    assert!(text.contains("move $t7"), "stores to the induction variable mirror into $t7");
}

#[test]
fn branches_fuse_their_compare() {
    let text = mips(
        "int main() { int a = getint(); if (a < 5) return 1; return 0; }",
    );
    // The compare feeds only the branch: slt + bne, no standalone compare
    // materialization via xori.
    assert!(text.contains("slt "));
    assert!(text.contains("bne "));
    assert!(!text.contains("xori"));
}

#[test]
fn calls_push_extra_arguments_and_restore_sp() {
    let text = mips(
        "int sum(int a, int b, int c, int d, int e, int f) {\n\
         return a + b + c + d + e + f;\n\
         }\n\
         int main() { return sum(1, 2, 3, 4, 5, 6); }",
    );
    assert!(text.contains("jal sum"));
    // Two stack arguments pushed, then the stack pointer is restored.
    assert!(text.contains("addi $sp, $sp, 8"));
    // The callee reads them from above the frame pointer.
    assert!(text.contains("($fp)"));
}

#[test]
fn adjacent_array_updates_fuse_into_a_counted_loop() {
    let text = mips(
        "int a[4] = {1, 2, 3, 4};\n\
         int main() {\n\
         int d = getint();\n\
         a[0] = a[0] + d;\n\
         a[1] = a[1] + d;\n\
         a[2] = a[2] + d;\n\
         return 0;\n\
         }",
    );
    assert!(text.contains("loop.opt.0:"), "fused loop emitted:\n{text}");
    assert!(text.contains("bne "));
    let stores = text.matches("sw ").count();
    // One store inside the fused loop plus frame traffic; three unrolled
    // element stores would show up as three `sw x, 0(reg)` pairs.
    assert!(
        text.matches(", 0(").count() < 6,
        "straight-line element traffic should be gone:\n{text} ({stores} stores)"
    );
}

#[test]
fn every_jump_gets_a_delay_slot_nop() {
    let text = mips("int main() { if (getint()) return 1; return 0; }");
    for (at, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if ["j ", "jal ", "jr ", "beq ", "bne "]
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
        {
            let next = text.lines().nth(at + 1).unwrap_or("");
            assert_eq!(next.trim(), "nop", "missing delay slot after `{trimmed}`");
        }
    }
}

#[test]
fn sixteen_bit_immediates_use_addiu() {
    let text = mips("int main() { int x = getint(); return x + 100; }");
    assert!(text.contains("addiu"));
}
