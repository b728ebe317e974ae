//! Chartcheck Engine - template rendering for bundle linting
//!
//! Renders `OlaresManifest.yaml` and chart templates with MiniJinja, then
//! reduces the output to the resource model consumed by `chartcheck-core`.

pub mod context;
pub mod engine;
pub mod error;
pub mod filters;
pub mod renderer;
pub mod resources;
pub mod values;

pub use context::{ChartInfo, ReleaseInfo, RenderContext};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use renderer::ChartRenderer;
pub use resources::parse_documents;
pub use values::Values;
