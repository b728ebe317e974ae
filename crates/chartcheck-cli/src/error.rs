//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use chartcheck_core::CoreError;
use chartcheck_engine::TemplateError;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// A manifest, identity, rule or budget check failed
    #[error("Validation failed: {message}")]
    #[diagnostic(code(chartcheck::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Manifest or chart rendering failed
    #[error("Template error: {message}")]
    #[diagnostic(code(chartcheck::cli::template))]
    Template {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A template failed to render, pointing at the failing line
    #[error("Template error: {message}")]
    #[diagnostic(code(chartcheck::cli::template))]
    Render {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("error occurred here")]
        span: Option<SourceSpan>,
    },

    /// Bundle layout or loading error
    #[error("Bundle error: {message}")]
    #[diagnostic(code(chartcheck::cli::bundle))]
    Bundle {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartcheck::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Template { .. } | CliError::Render { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Bundle { .. } => exit_codes::BUNDLE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    /// Short category label used in JSON output
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Validation { .. } => "validation",
            CliError::Template { .. } | CliError::Render { .. } => "template",
            CliError::Bundle { .. } => "bundle",
            CliError::Io { .. } => "io",
        }
    }

    /// The underlying message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            CliError::Validation { message, .. }
            | CliError::Template { message, .. }
            | CliError::Render { message, .. }
            | CliError::Bundle { message, .. }
            | CliError::Io { message } => message,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
            help: None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Format { .. } | CoreError::YamlParse(_) => CliError::Bundle {
                message,
                help: Some("expected Chart.yaml, values.yaml, templates/ and OlaresManifest.yaml in the bundle folder".into()),
            },
            CoreError::Render { source, .. } => {
                match source.and_then(|s| s.downcast::<TemplateError>().ok()) {
                    Some(template) => CliError::Render {
                        message,
                        src: template.src,
                        span: template.span,
                    },
                    None => CliError::template(message),
                }
            }
            CoreError::Io(_) => CliError::Io { message },
            CoreError::ResourceBudget(_) => CliError::validation_with_help(
                message,
                "set requests and limits on every container and keep their sum within spec.requiredCpu/limitedCpu and spec.requiredMemory/limitedMemory",
            ),
            CoreError::FieldConstraint(_)
            | CoreError::IdentityMismatch(_)
            | CoreError::Semantic(_)
            | CoreError::Custom { .. } => CliError::validation(message),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chartcheck_core::{SemanticViolation, ViolationList};

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let cases = [
            (CoreError::format("no Chart.yaml"), exit_codes::BUNDLE_ERROR),
            (CoreError::render("bad template"), exit_codes::TEMPLATE_ERROR),
            (
                CoreError::Semantic(SemanticViolation::EmptyArchitecture),
                exit_codes::VALIDATION_ERROR,
            ),
            (
                CoreError::ResourceBudget(ViolationList::new()),
                exit_codes::VALIDATION_ERROR,
            ),
            (
                CoreError::Io(std::io::Error::other("denied")),
                exit_codes::IO_ERROR,
            ),
        ];

        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn test_render_error_keeps_source_span() {
        use chartcheck_core::{BundleRenderer, RenderIdentity};
        use chartcheck_engine::ChartRenderer;

        let core = ChartRenderer::default()
            .render_manifest("name: {{ values.admin", &RenderIdentity::default())
            .unwrap_err();
        let err = CliError::from(core);

        assert!(matches!(err, CliError::Render { span: Some(_), .. }));
        assert_eq!(err.exit_code(), exit_codes::TEMPLATE_ERROR);
        assert_eq!(err.category(), "template");
        assert!(err.source_code().is_some());
        assert!(err.message().contains("OlaresManifest.yaml"));
    }

    #[test]
    fn test_message_keeps_core_text() {
        let err = CliError::from(CoreError::custom("bad app"));
        assert_eq!(err.message(), "bad app");
        assert_eq!(err.category(), "validation");
        assert_eq!(err.to_string(), "Validation failed: bad app");
    }
}
