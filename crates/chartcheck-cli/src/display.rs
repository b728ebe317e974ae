//! Display formatting for CLI output
//!
//! Human output uses `console` styling on stdout. With `--json` a single
//! [`LintReport`] document is printed instead.

use console::style;
use serde::Serialize;
use std::path::Path;

use crate::error::CliError;

/// Lint phases in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Manifest,
    Validators,
    Resources,
    Folder,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Manifest => "manifest fields, architecture and entrances",
            Phase::Validators => "custom validators",
            Phase::Resources => "resource budget, namespaces and RBAC",
            Phase::Folder => "bundle layout and identity",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportError {
    pub kind: &'static str,
    pub message: String,
}

/// Machine readable lint outcome
#[derive(Debug, Clone, Serialize)]
pub struct LintReport {
    pub bundle: String,
    pub valid: bool,
    pub owner: String,
    pub admin: String,
    pub checked: Vec<Phase>,
    pub skipped: Vec<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

impl LintReport {
    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("failed to encode report: {}", e),
        }
    }
}

impl From<&CliError> for ReportError {
    fn from(err: &CliError) -> Self {
        Self {
            kind: err.category(),
            message: err.message().to_string(),
        }
    }
}

/// Print the "→ <action> <path>" header line
pub fn header(action: &str, path: &Path) {
    println!("{} {} {}", style("→").blue(), action, path.display());
}

pub fn phase_checked(phase: Phase) {
    println!("  {} {}", style("✓").green(), phase.label());
}

pub fn phase_skipped(phase: Phase) {
    println!(
        "  {} {} {}",
        style("-").dim(),
        phase.label(),
        style("(skipped)").dim()
    );
}

pub fn success(message: &str) {
    println!();
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn failure(message: &str) {
    println!();
    println!("{} {}", style("✗").red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_shape() {
        let report = LintReport {
            bundle: "firefox".into(),
            valid: false,
            owner: "default".into(),
            admin: "default".into(),
            checked: vec![Phase::Manifest],
            skipped: vec![Phase::Folder],
            error: Some(ReportError::from(&CliError::validation("spec.supportArch can not be empty"))),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["checked"][0], "manifest");
        assert_eq!(json["skipped"][0], "folder");
        assert_eq!(json["error"]["kind"], "validation");
        assert_eq!(json["error"]["message"], "spec.supportArch can not be empty");
    }

    #[test]
    fn test_report_without_error_omits_field() {
        let report = LintReport {
            bundle: "firefox".into(),
            valid: true,
            owner: "default".into(),
            admin: "default".into(),
            checked: vec![],
            skipped: vec![],
            error: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("error").is_none());
    }
}
