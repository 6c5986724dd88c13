//! `npmsift clones`: exact-match clone report.

use crate::observability;
use anyhow::{Context, Result};
use npmsift_engine::records::{self, RecordWriter};
use npmsift_engine::{match_candidates, CloneCorpus, CloneMatch};
use std::path::Path;

/// Write the clone report and return the matches. Unusable input files are
/// warned about and treated as empty.
pub fn detect_clones(known: &Path, candidates: &Path, output: Option<&Path>) -> Result<Vec<CloneMatch>> {
    let corpus = match records::load_corpus(known) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("known-malicious corpus unusable, matching against nothing: {}", e);
            CloneCorpus::new()
        }
    };
    if corpus.is_empty() {
        tracing::warn!(path = %known.display(), "known-malicious corpus is empty");
    }

    let candidates = match records::read_candidates(candidates) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("candidate file unusable, nothing to check: {}", e);
            Vec::new()
        }
    };
    if candidates.is_empty() {
        tracing::warn!("no candidate fingerprints");
    }

    let matches = match_candidates(&corpus, &candidates);

    let header: Vec<String> = records::CLONE_HEADER.iter().map(|s| s.to_string()).collect();
    let mut writer = RecordWriter::open(output, &header, false)
        .with_context(|| format!("Failed to open {}", records::describe_output(output)))?;
    for m in &matches {
        observability::audit_clone_detected(m);
        writer.write_row(records::clone_row(m))?;
    }

    if matches.is_empty() {
        eprintln!("No clones of known-malicious packages among {} candidate(s).", candidates.len());
    } else {
        eprintln!(
            "ALERT: {} clone match(es) of known-malicious packages among {} candidate(s):",
            matches.len(),
            candidates.len()
        );
        for m in &matches {
            eprintln!("  {} == {} ({})", m.candidate, m.known, m.fingerprint);
        }
        if output.is_some() {
            eprintln!("Saved to {}", records::describe_output(output));
        }
    }
    Ok(matches)
}
