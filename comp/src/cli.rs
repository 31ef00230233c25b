use clap::{Parser, ValueEnum};
use comp_lib::compile::CompileOpts;
use std::path::PathBuf;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum EmitFormat {
    AstDbg,
    LlvmIr,
    MipsAsm,
    SymbolTable,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum SkippablePass {
    Opt,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The input source file.
    #[arg(default_value = "testfile.txt")]
    pub input: PathBuf,

    /// Where the graded diagnostic report is written.
    #[arg(long, value_name = "FILE", default_value = "error.txt")]
    pub error_output: PathBuf,

    /// Where the textual IR is written.
    #[arg(long, value_name = "FILE", default_value = "llvm_ir.txt")]
    pub ir_output: PathBuf,

    /// Where the MIPS assembly is written.
    #[arg(long, value_name = "FILE", default_value = "mips.txt")]
    pub mips_output: PathBuf,

    /// Print a single artifact to stdout instead of writing the files.
    #[arg(short, long, value_enum)]
    pub emit: Option<EmitFormat>,

    /// Zero or more passes to skip.
    #[arg(long = "skip", value_name = "PASS", value_enum)]
    pub skips: Vec<SkippablePass>,
}

pub fn extract_compile_opts(args: &Args) -> CompileOpts {
    CompileOpts {
        optimize: !args.skips.contains(&SkippablePass::Opt),
    }
}
