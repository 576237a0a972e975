use crate::language::errors::{SyntaxError, SyntaxErrors};
use crate::runtime::error::RuntimeError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{message}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource, err: SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message,
        }
    }
}

pub fn syntax_reports(name: &str, source: &str, errors: &SyntaxErrors) -> Vec<Report> {
    errors
        .errors
        .iter()
        .map(|err| {
            let src = NamedSource::new(name.to_string(), source.to_string());
            Report::new(SyntaxDiagnostic::from_error(src, err.clone()))
        })
        .collect()
}

pub fn emit_syntax_errors(name: &str, source: &str, errors: &SyntaxErrors) {
    for report in syntax_reports(name, source, errors) {
        eprintln!("{:?}", report);
    }
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
}
