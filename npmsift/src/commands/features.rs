//! `npmsift features`: feature rows for a dataset.

use super::{batch_options, discover, load_config, print_summary, GlobalArgs};
use crate::observability;
use anyhow::{Context, Result};
use npmsift_engine::records::{self, RecordWriter};
use npmsift_engine::{run_batch, PackageLayout};
use std::path::Path;

pub fn extract_dataset(
    global: &GlobalArgs,
    dir: &Path,
    layout: PackageLayout,
    label: Option<&str>,
    output: Option<&Path>,
    resume: bool,
) -> Result<()> {
    let config = load_config(global)?;
    let targets = discover(dir, layout)?;

    let mut options = batch_options(config)?;
    options.fingerprint = false;
    if let (true, Some(path)) = (resume, output) {
        options.skip = records::load_processed(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    let header = records::feature_header(label.is_some());
    let mut writer = RecordWriter::open(output, &header, resume)
        .with_context(|| format!("Failed to open {}", records::describe_output(output)))?;

    let summary = run_batch(&targets, &options, |outcome| {
        observability::audit_package_processed(outcome);
        let Some(report) = &outcome.features else {
            return Ok(());
        };
        for d in &report.degradations {
            tracing::debug!(package = %outcome.identity, "{}", d);
        }
        writer.write_row(records::feature_row(&outcome.identity, &report.vector, label))
    })?;

    print_summary(&summary);
    if output.is_some() {
        eprintln!(
            "Wrote {} feature row(s) to {}",
            writer.rows(),
            records::describe_output(output)
        );
    }
    Ok(())
}
