//! Exact-match clone detection against a corpus of known-malicious
//! fingerprints.

use crate::fingerprint::Fingerprint;
use crate::types::PackageIdentity;
use serde::Serialize;
use std::collections::HashMap;

/// Fingerprint → every identity it was seen under.
#[derive(Debug, Clone, Default)]
pub struct CloneCorpus {
    by_fingerprint: HashMap<Fingerprint, Vec<PackageIdentity>>,
}

impl CloneCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one identity. Re-adding a known pair is a no-op.
    pub fn insert(&mut self, fingerprint: Fingerprint, identity: PackageIdentity) {
        let known = self.by_fingerprint.entry(fingerprint).or_default();
        if !known.contains(&identity) {
            known.push(identity);
        }
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> &[PackageIdentity] {
        self.by_fingerprint
            .get(fingerprint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distinct fingerprints.
    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}

impl FromIterator<(Fingerprint, PackageIdentity)> for CloneCorpus {
    fn from_iter<I: IntoIterator<Item = (Fingerprint, PackageIdentity)>>(iter: I) -> Self {
        let mut corpus = Self::new();
        for (fingerprint, identity) in iter {
            corpus.insert(fingerprint, identity);
        }
        corpus
    }
}

/// A package to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub identity: PackageIdentity,
    pub fingerprint: Fingerprint,
}

/// One candidate matched to one known identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneMatch {
    pub candidate: PackageIdentity,
    pub fingerprint: Fingerprint,
    pub known: PackageIdentity,
}

/// Every candidate whose fingerprint is in `corpus`, once per known identity,
/// in candidate order.
pub fn match_candidates(corpus: &CloneCorpus, candidates: &[Candidate]) -> Vec<CloneMatch> {
    if corpus.is_empty() {
        return Vec::new();
    }
    candidates
        .iter()
        .flat_map(|c| {
            corpus.lookup(&c.fingerprint).iter().map(move |known| CloneMatch {
                candidate: c.identity.clone(),
                fingerprint: c.fingerprint.clone(),
                known: known.clone(),
            })
        })
        .collect()
}
