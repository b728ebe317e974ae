//! Manifest command - validate a single OlaresManifest.yaml

use chartcheck_core::Linter;
use chartcheck_engine::ChartRenderer;
use console::style;
use std::path::Path;

use super::lint::LintFlags;
use crate::display;
use crate::error::Result;

pub fn run(file: &Path, flags: &LintFlags) -> Result<()> {
    display::header("Checking manifest", file);

    let linter = Linter::new(ChartRenderer::default(), flags.options());
    let manifest = linter.check_manifest_file(file).inspect_err(|e| {
        display::failure(&format!("Manifest check failed: {}", e));
    })?;

    println!(
        "  {} {} v{} ({} entrance(s), arch {})",
        style("✓").green(),
        manifest.metadata.name,
        manifest.metadata.version,
        manifest.entrances.len(),
        manifest.spec.support_arch.join(", ")
    );
    display::success("Manifest is valid!");
    Ok(())
}
