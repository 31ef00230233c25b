pub mod lexer;
pub mod parser;
pub mod token;

use crate::diagnostic::DiagnosticSink;
use crate::structures::ast::CompUnit;

/// Lexes and parses one source file. Lexical and syntactic diagnostics
/// (codes `a`, `i`, `j`, `k`) go to the sink; the returned tree is always
/// usable.
pub fn parse(source: &str, sink: &mut DiagnosticSink) -> CompUnit {
    let tokens = lexer::lex(source, sink);
    parser::Parser::new(tokens, sink).comp_unit()
}
