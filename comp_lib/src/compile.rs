//! The compilation pipeline: parse, lower, optimize, emit.

use crate::codegen;
use crate::diagnostic::DiagnosticSink;
use crate::parser;
use crate::passes::lower_ast;

#[derive(Debug, Clone, Copy)]
pub struct CompileOpts {
    /// Run the IR optimizer (constant folding, DCE, CFG simplification).
    pub optimize: bool,
}

impl Default for CompileOpts {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Everything one compilation produces. The diagnostic sink must be consulted
/// before trusting the IR or the assembly: an erroneous compile still fills
/// them in best-effort form.
pub struct CompileOutput {
    pub sink: DiagnosticSink,
    pub ast_debug: String,
    pub ir_text: String,
    pub mips_text: String,
    pub symbol_table: String,
}

pub fn compile(source: &str, opts: CompileOpts) -> CompileOutput {
    let mut sink = DiagnosticSink::new();
    let ast = parser::parse(source, &mut sink);
    let ast_debug = format!("{ast:#?}\n");
    let mut lowering = lower_ast::build_ir_from_ast(&ast, &mut sink);

    if opts.optimize {
        llvm_ir::opt::optimize(&mut lowering.module);
    }

    let ir_text = llvm_ir::print_module(&lowering.module);
    let mips_text = codegen::mips::generate(&lowering.module).to_string();
    let symbol_table = lowering.scopes.dump();

    CompileOutput { sink, ast_debug, ir_text, mips_text, symbol_table }
}
