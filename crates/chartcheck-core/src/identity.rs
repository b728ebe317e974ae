//! Name and version agreement across a bundle

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::chart::ChartMetadata;
use crate::error::{CoreError, IdentityMismatch, Result};
use crate::manifest::AppMetadata;

const TITLE_FORMAT_ERROR: &str = "Invalid PR format. PR title must conform to the following format: [pr type][foldername][version]title";

static TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[([^\]]+)\]\[([^\]]+)\]\[([^\]]+)\](.*)$").expect("title regex is valid")
});

/// Kind of change a submission title announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Update,
    Remove,
    Suspend,
}

impl FromStr for ChangeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(ChangeKind::New),
            "UPDATE" => Ok(ChangeKind::Update),
            "REMOVE" => Ok(ChangeKind::Remove),
            "SUSPEND" => Ok(ChangeKind::Suspend),
            _ => Err(CoreError::format(TITLE_FORMAT_ERROR)),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::New => "NEW",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Remove => "REMOVE",
            ChangeKind::Suspend => "SUSPEND",
        };
        f.write_str(s)
    }
}

/// Parsed `[type][folder][version]summary` submission title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleInfo {
    pub kind: ChangeKind,
    pub folder: String,
    pub version: String,
    pub summary: String,
}

impl TitleInfo {
    pub fn parse(title: &str) -> Result<Self> {
        let caps = TITLE
            .captures(title.trim())
            .ok_or_else(|| CoreError::format(TITLE_FORMAT_ERROR))?;

        Ok(Self {
            kind: caps[1].trim().parse()?,
            folder: caps[2].trim().to_string(),
            version: caps[3].trim().to_string(),
            summary: caps[4].trim().to_string(),
        })
    }
}

impl FromStr for TitleInfo {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check that chart, folder, manifest and optional title agree
///
/// Names are compared first, then versions.
pub fn check_identity(
    chart: &ChartMetadata,
    folder: &str,
    meta: &AppMetadata,
    title: Option<&TitleInfo>,
) -> std::result::Result<(), IdentityMismatch> {
    match title {
        None => {
            if chart.name != folder || meta.name != folder {
                return Err(IdentityMismatch::Name {
                    chart: chart.name.clone(),
                    folder: folder.to_string(),
                    manifest: meta.name.clone(),
                });
            }
            if meta.version != chart.version {
                return Err(IdentityMismatch::Version {
                    manifest: meta.version.clone(),
                    chart: chart.version.clone(),
                });
            }
        }
        Some(title) => {
            if chart.name != folder || title.folder != folder || meta.name != folder {
                return Err(IdentityMismatch::NameWithTitle {
                    chart: chart.name.clone(),
                    folder: folder.to_string(),
                    title: title.folder.clone(),
                    manifest: meta.name.clone(),
                });
            }
            if meta.version != chart.version || title.version != chart.version {
                return Err(IdentityMismatch::VersionWithTitle {
                    manifest: meta.version.clone(),
                    chart: chart.version.clone(),
                    title: title.version.clone(),
                });
            }
        }
    }
    Ok(())
}
