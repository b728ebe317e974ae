//! Template rendering context

use chartcheck_core::{ChartMetadata, RELEASE_NAMESPACE};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::values::Values;

/// Chart name used when rendering a manifest on its own
pub const MANIFEST_CHART_NAME: &str = "chart";
pub const MANIFEST_CHART_VERSION: &str = "0.0.1";

/// Context available to all templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderContext {
    pub values: JsonValue,
    pub release: ReleaseInfo,
    pub chart: ChartInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub name: String,
    pub version: String,
    pub app_version: String,
}

impl From<&ChartMetadata> for ChartInfo {
    fn from(chart: &ChartMetadata) -> Self {
        Self {
            name: chart.name.clone(),
            version: chart.version.clone(),
            app_version: chart.app_version.clone(),
        }
    }
}

impl RenderContext {
    /// Context for a chart release into the app namespace
    pub fn new(values: Values, chart: &ChartMetadata) -> Self {
        Self {
            values: values.into_inner(),
            release: ReleaseInfo {
                name: chart.name.clone(),
                namespace: RELEASE_NAMESPACE.to_string(),
            },
            chart: chart.into(),
        }
    }

    /// Context for rendering a manifest outside of any chart
    pub fn for_manifest(values: Values) -> Self {
        let chart = ChartMetadata {
            name: MANIFEST_CHART_NAME.to_string(),
            version: MANIFEST_CHART_VERSION.to_string(),
            ..Default::default()
        };
        Self::new(values, &chart)
    }
}
