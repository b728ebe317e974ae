//! Chartcheck Core - model and validation rules for application bundles
//!
//! This crate checks an application bundle (a chart directory plus its
//! `OlaresManifest.yaml`) without rendering anything itself:
//! - `Manifest`: the application manifest model
//! - `FieldValidator`: schema-driven field constraints
//! - `check_identity`: name and version agreement
//! - `rules` and `images`: semantic business rules
//! - `resource`: budget, namespace and RBAC checks over rendered objects
//! - `Linter`: runs everything in order through a `BundleRenderer`

pub mod chart;
pub mod error;
pub mod identity;
pub mod images;
pub mod lint;
pub mod manifest;
pub mod quantity;
pub mod resource;
pub mod rules;
pub mod schema;

pub use chart::{Bundle, ChartMetadata};
pub use error::{
    CoreError, FieldViolation, IdentityMismatch, Result, SemanticViolation, ViolationList,
};
pub use identity::{ChangeKind, TitleInfo, check_identity};
pub use images::{ImageKind, ImagePolicy, ImageRule, ImageSource, ImageViolation, LocalImageSource};
pub use lint::{BundleRenderer, CustomValidator, LintOptions, Linter, RenderIdentity};
pub use manifest::{MANIFEST_FILE, Manifest};
pub use quantity::{Quantity, QuantityError};
pub use resource::{AccessRule, Container, RELEASE_NAMESPACE, RenderedResource};
pub use schema::{Check, DefaultFormatter, FieldRule, FieldValidator, MessageFormatter};
