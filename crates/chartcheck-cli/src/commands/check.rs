//! Check command - submission checks for a chart folder

use chartcheck_core::{Linter, TitleInfo};
use chartcheck_engine::ChartRenderer;
use std::path::Path;

use super::lint::LintFlags;
use crate::display;
use crate::error::Result;

/// Without a title the full chart check runs; with one, the title driven
/// submission checks run instead.
pub fn run(path: &Path, title: Option<&str>, flags: &LintFlags) -> Result<()> {
    let linter = Linter::new(ChartRenderer::default(), flags.options());

    let outcome = match title {
        Some(title) => {
            display::header("Checking submission for", path);
            let info = TitleInfo::parse(title)?;
            tracing::debug!(kind = %info.kind, folder = %info.folder, "parsed title");
            linter.check_chart_with_title(path, &info)
        }
        None => {
            display::header("Checking chart at", path);
            linter.check_chart(path)
        }
    };

    match outcome {
        Ok(()) => {
            display::success("Check passed!");
            Ok(())
        }
        Err(e) => {
            display::failure(&format!("Check failed: {}", e));
            Err(e.into())
        }
    }
}
