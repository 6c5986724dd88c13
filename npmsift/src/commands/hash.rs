//! `npmsift hash`: fingerprint rows for a dataset.

use super::{batch_options, discover, load_config, print_summary, GlobalArgs};
use crate::observability;
use anyhow::{Context, Result};
use npmsift_engine::records::{self, RecordWriter};
use npmsift_engine::{run_batch, PackageLayout};
use std::path::Path;

pub fn hash_dataset(
    global: &GlobalArgs,
    dir: &Path,
    layout: PackageLayout,
    output: Option<&Path>,
    resume: bool,
) -> Result<()> {
    let config = load_config(global)?;
    let targets = discover(dir, layout)?;

    let mut options = batch_options(config)?;
    options.features = false;
    if let (true, Some(path)) = (resume, output) {
        options.skip = records::load_processed(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    let header: Vec<String> = records::FINGERPRINT_HEADER.iter().map(|s| s.to_string()).collect();
    let mut writer = RecordWriter::open(output, &header, resume)
        .with_context(|| format!("Failed to open {}", records::describe_output(output)))?;

    let summary = run_batch(&targets, &options, |outcome| {
        observability::audit_package_processed(outcome);
        match &outcome.fingerprint {
            Some(fp) => writer.write_row(records::fingerprint_row(&outcome.identity, fp)),
            None => Ok(()),
        }
    })?;

    print_summary(&summary);
    if output.is_some() {
        eprintln!(
            "Wrote {} fingerprint(s) to {}",
            writer.rows(),
            records::describe_output(output)
        );
    }
    Ok(())
}
