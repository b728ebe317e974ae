//! Engine error types

use chartcheck_core::CoreError;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A rendered document could not be read as a Kubernetes object
    #[error("invalid {kind} in {template}: {message}")]
    InvalidObject {
        template: String,
        kind: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Io(e) => CoreError::Io(e),
            EngineError::Template(e) => CoreError::render_with_source(e.to_string(), e),
            other => CoreError::render(other.to_string()),
        }
    }
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{template}: {message}")]
#[diagnostic(code(chartcheck::template::render))]
pub struct TemplateError {
    pub message: String,

    /// Name of the template that failed
    pub template: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,
}

impl TemplateError {
    /// Create a new template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let kind = categorize(&err);
        let message = err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        let span = err
            .line()
            .and_then(|line| calculate_span(template_source, line));

        Self {
            message,
            template: template_name.to_string(),
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    match err.kind() {
        minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => TemplateErrorKind::Other,
    }
}

/// Calculate the source span for a given line number
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (idx, line) in source.lines().enumerate() {
        if idx + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_span() {
        let source = "a: 1\nbb: {{ x }}\n";
        let span = calculate_span(source, 2).unwrap();
        assert_eq!(span.offset(), 5);
        assert_eq!(span.len(), 10);
        assert!(calculate_span(source, 5).is_none());
    }

    #[test]
    fn test_syntax_error_kind() {
        let env = minijinja::Environment::new();
        let err = env.template_from_str("{{ oops").unwrap_err();
        let err = TemplateError::from_minijinja(err, "deployment.yaml", "{{ oops");
        assert_eq!(err.kind(), TemplateErrorKind::SyntaxError);
        assert!(err.to_string().starts_with("deployment.yaml: "));
    }

    #[test]
    fn test_into_core_error() {
        let err = EngineError::InvalidObject {
            template: "deployment.yaml".into(),
            kind: "Deployment".into(),
            message: "missing field".into(),
        };
        let core: CoreError = err.into();
        assert_eq!(
            core.to_string(),
            "render error: invalid Deployment in deployment.yaml: missing field"
        );
    }

    #[test]
    fn test_template_error_survives_into_core_error() {
        let env = minijinja::Environment::new();
        let err = env.template_from_str("{{ oops").unwrap_err();
        let err = TemplateError::from_minijinja(err, "deployment.yaml", "{{ oops");

        let core: CoreError = EngineError::from(err).into();
        assert!(core.to_string().starts_with("render error: deployment.yaml: "));

        let source = std::error::Error::source(&core).unwrap();
        let template = source.downcast_ref::<TemplateError>().unwrap();
        assert_eq!(template.kind(), TemplateErrorKind::SyntaxError);
        assert!(template.span.is_some());
    }
}
