use crate::{BinaryOp, CompareOp, InstKind, LogicalOp, Module, Type, UnaryOp, ValueId, ValueKind};
use std::collections::HashMap;
use std::fmt::Write;

/// Serializes a module to the textual IR form.
///
/// Globals print as `@name = constant|global T init`, functions as
/// `define RetTy @name(args) { … }` with one instruction per line.
/// Temporaries are numbered `%t0, %t1, …` per function in emission order;
/// blocks keep their given names (made unique per function) or get `L<n>`.
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    for &func in module.functions() {
        if module.function(func).is_builtin {
            write_declare(&mut out, module, func);
        }
    }
    for &global in module.globals() {
        write_global(&mut out, module, global);
    }
    for &func in module.functions() {
        if !module.function(func).is_builtin {
            out.push('\n');
            write_function(&mut out, module, func);
        }
    }
    out
}

fn write_declare(out: &mut String, module: &Module, func: ValueId) {
    let params = module
        .function(func)
        .params
        .iter()
        .map(|&p| module.ty(p).to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let name = module.name(func).unwrap_or("?");
    let _ = writeln!(out, "declare {} @{}({})", module.ty(func), name, params);
}

fn write_global(out: &mut String, module: &Module, global: ValueId) {
    let name = module.name(global).unwrap_or("?");
    let ValueKind::Global(data) = &module.value(global).kind else {
        panic!("module globals list must hold globals");
    };
    let keyword = if data.is_const { "constant" } else { "global" };
    let ty = module.ty(global);
    let _ = match data.initializer.map(|init| &module.value(init).kind) {
        Some(ValueKind::ConstInt(v)) => writeln!(out, "@{name} = {keyword} {ty} {v}"),
        Some(ValueKind::ConstArray(elems)) => {
            let body = elems
                .iter()
                .map(|e| format!("i32 {e}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "@{name} = {keyword} {ty} [{body}]")
        }
        Some(other) => panic!("global initializer must be constant, found {other:?}"),
        None => writeln!(out, "@{name} = {keyword} {ty} zeroinitializer"),
    };
}

/// Per-function namer for temporaries and block labels.
struct Names {
    values: HashMap<ValueId, String>,
    next_temp: usize,
    next_label: usize,
    taken_labels: HashMap<String, usize>,
}

impl Names {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            next_temp: 0,
            next_label: 0,
            taken_labels: HashMap::new(),
        }
    }

    fn temp(&mut self, id: ValueId) -> String {
        if let Some(name) = self.values.get(&id) {
            return name.clone();
        }
        let name = format!("%t{}", self.next_temp);
        self.next_temp += 1;
        self.values.insert(id, name.clone());
        name
    }

    fn label(&mut self, module: &Module, block: ValueId) -> String {
        if let Some(name) = self.values.get(&block) {
            return name.clone();
        }
        let base = match module.name(block) {
            Some(name) => name.to_owned(),
            None => {
                let name = format!("L{}", self.next_label);
                self.next_label += 1;
                name
            }
        };
        let times = self.taken_labels.entry(base.clone()).or_insert(0);
        let name = if *times == 0 { base.clone() } else { format!("{base}{}", *times) };
        *times += 1;
        self.values.insert(block, name.clone());
        name
    }
}

fn write_function(out: &mut String, module: &Module, func: ValueId) {
    let mut names = Names::new();
    let params = module
        .function(func)
        .params
        .iter()
        .map(|&p| {
            let name = format!("%{}", module.name(p).unwrap_or("arg"));
            names.values.insert(p, name.clone());
            format!("{} {}", module.ty(p), name)
        })
        .collect::<Vec<_>>()
        .join(", ");
    let name = module.name(func).unwrap_or("?");
    let _ = writeln!(out, "define {} @{}({}) {{", module.ty(func), name, params);

    let blocks = module.blocks(func);
    for (i, &block) in blocks.iter().enumerate() {
        if i > 0 {
            let _ = writeln!(out, "{}:", names.label(module, block));
        }
        for &inst in module.insts(block) {
            write_inst(out, module, &mut names, inst);
        }
    }
    let _ = writeln!(out, "}}");
}

/// The printed form of an operand: a literal for constants, `%`/`@` names
/// otherwise.
fn operand(module: &Module, names: &mut Names, id: ValueId) -> String {
    match &module.value(id).kind {
        ValueKind::ConstInt(v) => v.to_string(),
        ValueKind::Global(_) | ValueKind::Function(_) => {
            format!("@{}", module.name(id).unwrap_or("?"))
        }
        ValueKind::Argument(_) => names.values[&id].clone(),
        ValueKind::Inst(_) => names.temp(id),
        other => panic!("unprintable operand: {other:?}"),
    }
}

/// The pointer type a memory operand is addressed through.
fn addr_ty(module: &Module, addr: ValueId) -> String {
    let ty = module.ty(addr);
    if ty.is_decayed() {
        ty.to_string()
    } else {
        format!("{ty}*")
    }
}

fn write_inst(out: &mut String, module: &Module, names: &mut Names, id: ValueId) {
    let kind = module.inst(id).clone();
    let line = match kind {
        InstKind::Alloca { alloc_ty } => {
            format!("{} = alloca {}", names.temp(id), alloc_ty)
        }
        InstKind::Load { addr } => {
            let a = operand(module, names, addr);
            format!("{} = load i32, {} {}", names.temp(id), addr_ty(module, addr), a)
        }
        InstKind::Store { value, addr } => {
            let v = operand(module, names, value);
            let a = operand(module, names, addr);
            format!("store i32 {v}, {} {a}", addr_ty(module, addr))
        }
        InstKind::GetElementPtr { base, indices } => {
            let base_ty = module.ty(base).clone();
            let pointee = if base_ty.is_decayed() {
                Type::Int.to_string()
            } else {
                base_ty.to_string()
            };
            let mut line = format!(
                "{} = getelementptr {}, {} {}",
                names.temp(id),
                pointee,
                addr_ty(module, base),
                operand(module, names, base),
            );
            for index in indices {
                let _ = write!(line, ", i32 {}", operand(module, names, index));
            }
            line
        }
        InstKind::Binary { op, lhs, rhs } => {
            let opcode = match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::Div => "sdiv",
                BinaryOp::Mod => "srem",
            };
            format!(
                "{} = {} i32 {}, {}",
                names.temp(id),
                opcode,
                operand(module, names, lhs),
                operand(module, names, rhs)
            )
        }
        InstKind::Unary { op, operand: inner } => {
            let opcode = match op {
                UnaryOp::Pos => "pos",
                UnaryOp::Neg => "neg",
                UnaryOp::Not => "not",
            };
            format!(
                "{} = {} i32 {}",
                names.temp(id),
                opcode,
                operand(module, names, inner)
            )
        }
        InstKind::ZExt { operand: inner } => {
            format!(
                "{} = zext i1 {} to i32",
                names.temp(id),
                operand(module, names, inner)
            )
        }
        InstKind::Compare { op, lhs, rhs } => {
            let cond = match op {
                CompareOp::Eq => "eq",
                CompareOp::Ne => "ne",
                CompareOp::Lt => "slt",
                CompareOp::Gt => "sgt",
                CompareOp::Le => "sle",
                CompareOp::Ge => "sge",
            };
            format!(
                "{} = icmp {} i32 {}, {}",
                names.temp(id),
                cond,
                operand(module, names, lhs),
                operand(module, names, rhs)
            )
        }
        InstKind::Logical { op, lhs, rhs } => {
            let opcode = match op {
                LogicalOp::And => "and",
                LogicalOp::Or => "or",
            };
            format!(
                "{} = {} i32 {}, {}",
                names.temp(id),
                opcode,
                operand(module, names, lhs),
                operand(module, names, rhs)
            )
        }
        InstKind::Jump { target } => {
            format!("br label %{}", names.label(module, target))
        }
        InstKind::Branch { cond, then_block, else_block } => {
            format!(
                "br i1 {}, label %{}, label %{}",
                operand(module, names, cond),
                names.label(module, then_block),
                names.label(module, else_block)
            )
        }
        InstKind::Return { value } => match value {
            Some(value) => format!("ret i32 {}", operand(module, names, value)),
            None => "ret void".to_owned(),
        },
        InstKind::Call { callee, args } => {
            let args = args
                .iter()
                .map(|&arg| format!("{} {}", module.ty(arg), operand(module, names, arg)))
                .collect::<Vec<_>>()
                .join(", ");
            let callee_name = module.name(callee).unwrap_or("?");
            let ret_ty = module.ty(callee);
            if ret_ty.is_void() {
                format!("call void @{callee_name}({args})")
            } else {
                format!("{} = call {} @{}({})", names.temp(id), ret_ty, callee_name, args)
            }
        }
    };
    let _ = writeln!(out, "  {line}");
}
