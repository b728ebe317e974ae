//! `BundleRenderer` backed by the MiniJinja engine

use chartcheck_core::chart::{CHART_FILE, TEMPLATES_DIR, VALUES_FILE};
use chartcheck_core::{
    BundleRenderer, ChartMetadata, CoreError, Manifest, RELEASE_NAMESPACE, RenderIdentity,
    RenderedResource,
};
use std::path::Path;

use crate::context::RenderContext;
use crate::engine::Engine;
use crate::resources::parse_documents;
use crate::values::Values;

/// Renders manifests and chart templates from disk
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    engine: Engine,
}

impl ChartRenderer {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Chart values merged with the platform values for `identity`
    pub fn values(&self, root: &Path, identity: &RenderIdentity) -> chartcheck_core::Result<Values> {
        let values_path = root.join(VALUES_FILE);
        let mut values = if values_path.is_file() {
            Values::from_file(&values_path)?
        } else {
            Values::new()
        };
        values.merge(&Values::platform(identity));
        Ok(values)
    }
}

fn read_chart(root: &Path) -> chartcheck_core::Result<ChartMetadata> {
    let content = std::fs::read_to_string(root.join(CHART_FILE)).map_err(|e| {
        CoreError::format(format!(
            "failed to read Chart.yaml in folder '{}': {}",
            root.display(),
            e
        ))
    })?;
    ChartMetadata::from_yaml(&content).map_err(|e| {
        CoreError::format(format!(
            "failed to parse Chart.yaml in folder '{}': {}",
            root.display(),
            e
        ))
    })
}

impl BundleRenderer for ChartRenderer {
    fn render_manifest(
        &self,
        content: &str,
        identity: &RenderIdentity,
    ) -> chartcheck_core::Result<String> {
        let context = RenderContext::for_manifest(Values::for_manifest(identity));
        Ok(self
            .engine
            .render_string(content, &context, chartcheck_core::MANIFEST_FILE)?)
    }

    fn render_resources(
        &self,
        root: &Path,
        manifest: &Manifest,
        identity: &RenderIdentity,
    ) -> chartcheck_core::Result<Vec<RenderedResource>> {
        let chart = read_chart(root)?;
        let context = RenderContext::new(self.values(root, identity)?, &chart);

        let rendered = self.engine.render_dir(&root.join(TEMPLATES_DIR), &context)?;
        tracing::debug!(
            app = %manifest.metadata.name,
            templates = rendered.len(),
            "rendered chart templates"
        );

        let mut resources = Vec::new();
        for (template, output) in &rendered {
            resources.extend(parse_documents(template, output, RELEASE_NAMESPACE)?);
        }
        Ok(resources)
    }
}
