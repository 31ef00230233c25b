//! MIPS-32 code generation targeting the SPIM runtime.
//!
//! The module's globals become `.data` items; the text segment starts with a
//! `_start` stub that calls the entry function and exits through syscall 10,
//! followed by the four runtime builtins and then every defined function.

mod frame;
mod function_generator;
mod loops;
#[cfg(test)]
mod tests;

use function_generator::FunctionGenerator;
use llvm_ir::{Module, ValueId, ValueKind};
use mips_ir::{DataDirective, GlobalData, Instruction as I, Label, Reg, Root};
use std::collections::HashMap;

pub fn generate(module: &Module) -> Root {
    let mut root = Root::new();

    let global_labels = emit_data(module, &mut root);

    let func_labels: HashMap<ValueId, Label> = module
        .functions()
        .iter()
        .map(|&func| {
            let name = module.name(func).unwrap_or("func");
            (func, Label::sanitized(name))
        })
        .collect();

    if let Some(entry) = module.entry() {
        emit_start_stub(&mut root, &func_labels[&entry]);
    }
    emit_builtins(&mut root);

    let mut loop_counter = 0;
    for &func in module.functions() {
        if module.function(func).is_builtin {
            continue;
        }
        root.push_blank();
        FunctionGenerator::new(
            module,
            &mut root,
            &global_labels,
            &func_labels,
            &mut loop_counter,
            func,
        )
        .generate();
    }

    root
}

fn emit_data(module: &Module, root: &mut Root) -> HashMap<ValueId, Label> {
    let mut labels = HashMap::new();
    for &global in module.globals() {
        let label = Label::sanitized(module.name(global).unwrap_or("global"));
        labels.insert(global, label.clone());

        let ValueKind::Global(data) = &module.value(global).kind else {
            unreachable!("module globals are global variables");
        };
        let ty = module.ty(global);
        let directive = if ty.is_array() {
            let len = ty.len().unwrap_or(0).max(0) as u32;
            match data.initializer.map(|init| &module.value(init).kind) {
                Some(ValueKind::ConstArray(elems)) if !elems.is_empty() => {
                    DataDirective::Words(elems.clone())
                }
                _ => DataDirective::Space(len * 4),
            }
        } else {
            let value = data
                .initializer
                .and_then(|init| module.as_const_int(init))
                .unwrap_or(0);
            DataDirective::Word(value)
        };
        root.add_data(GlobalData::new(label, directive));
    }
    labels
}

fn emit_start_stub(root: &mut Root, entry: &Label) {
    root.push_blank();
    root.push_global(Label::from("_start"));
    root.push_label(Label::from("_start"));
    root.push_with_delay_slot(I::Jal(entry.clone()));
    root.push(I::Li(Reg::V0, 10));
    root.push(I::Syscall);
}

/// The runtime: `getint`, `putint`, `putch`, `putstr`, each a canonical
/// prologue/epilogue around one SPIM syscall (5, 1, 11, 4).
fn emit_builtins(root: &mut Root) {
    for (name, syscall) in [("getint", 5), ("putint", 1), ("putch", 11), ("putstr", 4)] {
        let frame_size = 8;
        root.push_blank();
        root.push_global(Label::from(name));
        root.push_label(Label::from(name));
        root.push(I::Addi(Reg::SP, Reg::SP, -frame_size));
        root.push(I::Sw(Reg::RA, frame_size - 4, Reg::SP));
        root.push(I::Sw(Reg::FP, frame_size - 8, Reg::SP));
        root.push(I::Addi(Reg::FP, Reg::SP, frame_size));
        root.push(I::Li(Reg::V0, syscall));
        root.push(I::Syscall);
        root.push(I::Lw(Reg::RA, frame_size - 4, Reg::SP));
        root.push(I::Lw(Reg::FP, frame_size - 8, Reg::SP));
        root.push(I::Addi(Reg::SP, Reg::SP, frame_size));
        root.push_with_delay_slot(I::Jr(Reg::RA));
    }
}
