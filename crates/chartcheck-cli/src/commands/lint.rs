//! Lint command - run every check against a bundle directory

use chartcheck_core::{LintOptions, Linter};
use chartcheck_engine::ChartRenderer;
use std::path::Path;

use crate::display::{self, LintReport, Phase, ReportError};
use crate::error::{CliError, Result};

/// Knobs of a lint run
#[derive(Debug, Clone, Default)]
pub struct LintFlags {
    pub owner: Option<String>,
    pub admin: Option<String>,
    pub skip_manifest: bool,
    pub skip_resources: bool,
    pub skip_folder: bool,
    pub check_appdata: bool,
}

impl LintFlags {
    pub fn options(&self) -> LintOptions {
        let mut builder = LintOptions::builder();
        if let Some(owner) = &self.owner {
            builder = builder.owner(owner.clone());
        }
        if let Some(admin) = &self.admin {
            builder = builder.admin(admin.clone());
        }
        if self.skip_manifest {
            builder = builder.skip_manifest();
        }
        if self.skip_resources {
            builder = builder.skip_resources();
        }
        if self.skip_folder {
            builder = builder.skip_folder();
        }
        if self.check_appdata {
            builder = builder.app_data_validator();
        }
        builder.build()
    }

    /// Split phases into those that run and those that are skipped
    fn phases(&self) -> (Vec<Phase>, Vec<Phase>) {
        let mut checked = Vec::new();
        let mut skipped = Vec::new();
        for (phase, skip) in [
            (Phase::Manifest, self.skip_manifest),
            (Phase::Validators, !self.check_appdata),
            (Phase::Resources, self.skip_resources),
            (Phase::Folder, self.skip_folder),
        ] {
            if skip {
                skipped.push(phase);
            } else {
                checked.push(phase);
            }
        }
        (checked, skipped)
    }
}

pub fn run(path: &Path, flags: &LintFlags, json: bool) -> Result<()> {
    let options = flags.options();
    let identity = options.identity();
    let linter = Linter::new(ChartRenderer::default(), options);
    let (checked, skipped) = flags.phases();

    if !json {
        display::header("Linting bundle at", path);
    }

    let outcome = linter.lint(path).map_err(CliError::from);

    if json {
        LintReport {
            bundle: path.display().to_string(),
            valid: outcome.is_ok(),
            owner: identity.owner,
            admin: identity.admin,
            checked,
            skipped,
            error: outcome.as_ref().err().map(ReportError::from),
        }
        .print();
        return outcome;
    }

    match &outcome {
        Ok(()) => {
            for phase in &checked {
                display::phase_checked(*phase);
            }
            for phase in &skipped {
                display::phase_skipped(*phase);
            }
            display::success("Lint passed!");
        }
        Err(e) => display::failure(&format!("Lint failed: {}", e.message())),
    }
    outcome
}
