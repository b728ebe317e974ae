//! Bundle layout and chart metadata

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::manifest::MANIFEST_FILE;

pub const CHART_FILE: &str = "Chart.yaml";
pub const VALUES_FILE: &str = "values.yaml";
pub const TEMPLATES_DIR: &str = "templates";

static FOLDER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]{1,30}$").expect("folder name regex is valid"));

/// `Chart.yaml` contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChartMetadata {
    pub api_version: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub app_version: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ChartMetadata {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// Whether a folder base name is acceptable for a bundle
pub fn is_valid_folder_name(name: &str) -> bool {
    FOLDER_NAME.is_match(name)
}

/// A bundle directory whose layout has been checked
#[derive(Debug, Clone)]
pub struct Bundle {
    pub chart: ChartMetadata,

    /// Root directory of the bundle
    pub root: PathBuf,

    /// Base name of the root directory
    pub folder_name: String,

    pub templates_dir: PathBuf,
    pub values_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl Bundle {
    /// Open a bundle, checking its layout in a fixed order
    ///
    /// The first problem found is returned as [`CoreError::Format`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let shown = root.display().to_string();

        let folder_name = folder_name(&root);
        if !is_valid_folder_name(&folder_name) {
            return Err(CoreError::format(format!(
                "invalid folder name: '{}' must '^[a-z0-9]{{1,30}}$'",
                shown
            )));
        }

        if !root.is_dir() {
            return Err(CoreError::format(format!(
                "folder does not exist: '{}'",
                shown
            )));
        }

        let chart_path = root.join(CHART_FILE);
        if !chart_path.is_file() {
            return Err(CoreError::format(format!(
                "missing Chart.yaml in folder: '{}'",
                shown
            )));
        }

        let content = std::fs::read_to_string(&chart_path).map_err(|e| {
            CoreError::format(format!(
                "failed to read Chart.yaml in folder '{}': {}",
                shown, e
            ))
        })?;
        let chart = ChartMetadata::from_yaml(&content).map_err(|e| {
            CoreError::format(format!(
                "failed to parse Chart.yaml in folder '{}': {}",
                shown, e
            ))
        })?;
        check_chart_fields(&chart, &shown)?;

        let values_path = root.join(VALUES_FILE);
        if !values_path.is_file() {
            return Err(CoreError::format(format!(
                "missing values.yaml in folder: '{}'",
                shown
            )));
        }

        let templates_dir = root.join(TEMPLATES_DIR);
        if !templates_dir.is_dir() {
            return Err(CoreError::format(format!(
                "missing templates folder in folder: '{}'",
                shown
            )));
        }

        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(CoreError::format(format!(
                "missing OlaresManifest.yaml in folder: '{}'",
                shown
            )));
        }

        tracing::debug!(bundle = %shown, chart = %chart.name, "bundle layout ok");

        Ok(Self {
            chart,
            root,
            folder_name,
            templates_dir,
            values_path,
            manifest_path,
        })
    }

    /// Template files under `templates/`, sorted
    pub fn template_files(&self) -> Vec<PathBuf> {
        template_files(&self.templates_dir)
    }
}

fn folder_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn check_chart_fields(chart: &ChartMetadata, folder: &str) -> Result<()> {
    let missing = if chart.api_version.is_empty() {
        Some("apiVersion")
    } else if chart.name.is_empty() {
        Some("name")
    } else if chart.version.is_empty() {
        Some("version")
    } else {
        None
    };

    match missing {
        Some(field) => Err(CoreError::format(format!(
            "{} field empty in Chart.yaml in chart '{}'",
            field, folder
        ))),
        None => Ok(()),
    }
}

/// Renderable template files below `dir`, sorted for deterministic output
pub fn template_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_lowercase();
                    matches!(ext.as_str(), "yaml" | "yml" | "tpl" | "txt" | "json")
                })
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    files
}
