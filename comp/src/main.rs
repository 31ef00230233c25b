mod cli;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use codespan_reporting::files::SimpleFile;
use comp_lib::compile::compile;
use std::fs;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read input file `{}`", args.input.display()))?;

    let opts = cli::extract_compile_opts(&args);
    let output = compile(&source, opts);

    if !output.sink.is_empty() {
        let file = SimpleFile::new(args.input.display().to_string(), source);
        report::eprint_diagnostics(&output.sink, &file);
    }

    // Semantic errors do not change the exit code; callers distinguish by the
    // presence of records in the error report.
    match args.emit {
        Some(cli::EmitFormat::AstDbg) => print!("{}", output.ast_debug),
        Some(cli::EmitFormat::LlvmIr) => print!("{}", output.ir_text),
        Some(cli::EmitFormat::MipsAsm) => print!("{}", output.mips_text),
        Some(cli::EmitFormat::SymbolTable) => print!("{}", output.symbol_table),
        None => {
            write(&args.error_output, &output.sink.dump())?;
            write(&args.ir_output, &output.ir_text)?;
            write(&args.mips_output, &output.mips_text)?;
        }
    }

    Ok(())
}

fn write(path: &std::path::Path, contents: &str) -> Result<()> {
    fs::write(path, contents)
        .with_context(|| format!("failed to write output file `{}`", path.display()))
}
