use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use comp_lib::diagnostic::DiagnosticSink;

/// Pretty-prints the sink to stderr. The graded `error.txt` report is
/// produced separately by [`DiagnosticSink::dump`]; this rendering is for
/// humans.
pub fn eprint_diagnostics(sink: &DiagnosticSink, file: &SimpleFile<String, String>) {
    let mut writer = term::termcolor::StandardStream::stderr(term::termcolor::ColorChoice::Auto);
    let config = term::Config::default();

    for record in sink.sorted() {
        let mut diagnostic = Diagnostic::error()
            .with_message(record.code.message())
            .with_code(record.code.letter().to_string());
        if !record.span.is_empty() {
            diagnostic =
                diagnostic.with_labels(vec![Label::primary((), std::ops::Range::from(record.span))]);
        }
        let _ = term::emit(&mut writer, &config, file, &diagnostic);
    }
}
