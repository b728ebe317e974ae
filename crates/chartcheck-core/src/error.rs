//! Core error types

use std::fmt;

use thiserror::Error;

use crate::images::ImageViolation;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing or unparsable bundle files, bad folder layout
    #[error("{message}")]
    Format { message: String },

    #[error(transparent)]
    FieldConstraint(#[from] FieldViolation),

    #[error(transparent)]
    IdentityMismatch(#[from] IdentityMismatch),

    #[error(transparent)]
    Semantic(#[from] SemanticViolation),

    #[error(transparent)]
    ResourceBudget(#[from] ViolationList),

    /// Rendering failed; `source` keeps the renderer's own error when it has one
    #[error("render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failure reported by a caller-supplied validator
    #[error("{message}")]
    Custom { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
            source: None,
        }
    }

    pub fn render_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Render {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// First failing field constraint of a manifest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed: {path}, msg: {message}")]
pub struct FieldViolation {
    /// Concrete field path, e.g. `entrances[1].host`
    pub path: String,
    pub message: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityMismatch {
    #[error(
        "inconsistent info. name must be the same in chart. name in Chart.yaml:{chart}, chartFolder:{folder}, OlaresManifest.yaml:{manifest}"
    )]
    Name {
        chart: String,
        folder: String,
        manifest: String,
    },

    #[error(
        "inconsistent info. name must be the same in chart. name in Chart.yaml:{chart}, chartFolder:{folder}, folder in title:{title}, OlaresManifest.yaml:{manifest}"
    )]
    NameWithTitle {
        chart: String,
        folder: String,
        title: String,
        manifest: String,
    },

    #[error(
        "inconsistent info. Version must be the same in chart. version in OlaresManifest.yaml:{manifest}, Chart.yaml:{chart}"
    )]
    Version { manifest: String, chart: String },

    #[error(
        "inconsistent info. Version must be the same in chart. version in OlaresManifest.yaml:{manifest}, Chart.yaml:{chart}, title:{title}"
    )]
    VersionWithTitle {
        manifest: String,
        chart: String,
        title: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticViolation {
    #[error("entrances:[{index}] name has replicated")]
    DuplicateEntrance { index: usize },

    #[error("spec.supportArch can not be empty")]
    EmptyArchitecture,

    #[error("unsupported arch: {arch}")]
    UnsupportedArchitecture { arch: String },

    #[error("categories {categories:?} invalid, must in {allowed:?}")]
    InvalidCategories {
        categories: Vec<String>,
        allowed: Vec<String>,
    },

    #[error("foldername {name} in reserved foldername list, invalid")]
    ReservedFolderName { name: String },

    #[error(
        "found .Values.userspace.appdata in {file}, but not set permission.appData in OlaresManifest.yaml"
    )]
    AppDataPermission { file: String },

    #[error(transparent)]
    InvalidImage(#[from] ImageViolation),

    #[error("can not find volumemount path equal upload Dest: {dest}")]
    MissingUploadMount { dest: String },
}

/// Independent violations collected in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationList(pub Vec<String>);

impl ViolationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn extend(&mut self, other: ViolationList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> std::result::Result<(), ViolationList> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ViolationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [single] => f.write_str(single),
            many => write!(f, "[{}]", many.join(", ")),
        }
    }
}

impl std::error::Error for ViolationList {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_list_display() {
        let mut list = ViolationList::new();
        assert_eq!(list.to_string(), "");

        list.push("first");
        assert_eq!(list.to_string(), "first");

        list.push("second");
        insta::assert_snapshot!(list.to_string(), @"[first, second]");
    }

    #[test]
    fn test_violation_list_into_result() {
        assert!(ViolationList::new().into_result().is_ok());

        let mut list = ViolationList::new();
        list.push("boom");
        let err = list.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_identity_message_lists_all_values() {
        let err = IdentityMismatch::Name {
            chart: "firefox".to_string(),
            folder: "other".to_string(),
            manifest: "firefox".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("firefox"));
        assert!(msg.contains("chartFolder:other"));
    }
}
