use crate::{DataDirective, GlobalData, Instruction, Label, Reg, Root};

fn output(root: &Root) -> String {
    root.to_string()
}

#[test]
fn empty_root() {
    let root = Root::new();
    assert_eq!(output(&root), ".data\n\n.text\n");
}

#[test]
fn data_directives() {
    let mut root = Root::new();
    root.add_data(GlobalData::new("x".into(), DataDirective::Word(7)));
    root.add_data(GlobalData::new("a".into(), DataDirective::Words(vec![1, 2, 3])));
    root.add_data(GlobalData::new("b".into(), DataDirective::Space(16)));
    assert_eq!(
        output(&root),
        ".data\n\
         x:\n  .word 7\n\
         a:\n  .word 1, 2, 3\n\
         b:\n  .space 16\n\
         \n.text\n"
    );
}

#[test]
fn text_stream() {
    let mut root = Root::new();
    root.push_global("main".into());
    root.push_label("main".into());
    root.push(Instruction::Li(Reg::V0, 0));
    root.push_with_delay_slot(Instruction::Jr(Reg::RA));
    assert_eq!(
        output(&root),
        ".data\n\n.text\n\
         .globl main\n\
         main:\n  li $v0, 0\n  jr $ra\n  nop\n"
    );
}

#[test]
fn label_sanitizing() {
    let label = Label::sanitized("for.cond@1");
    assert_eq!(label.as_ref(), "for.cond_1");
    assert_eq!(Label::sanitized("").as_ref(), "label");
}

#[test]
#[should_panic]
fn delay_slot_only_for_jumps() {
    let mut root = Root::new();
    root.push_with_delay_slot(Instruction::Nop);
}
