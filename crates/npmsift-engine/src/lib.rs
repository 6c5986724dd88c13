//! npmsift engine: deterministic fingerprints and static behavioral features
//! for unpacked npm packages, plus exact-match clone detection.
//!
//! Everything here is a pure function of the package tree on disk. No network
//! access, no persistent state.

pub mod batch;
pub mod clone;
pub mod discovery;
pub mod error;
pub mod features;
pub mod fingerprint;
pub mod lexical;
pub mod manifest;
pub mod metadata;
pub mod records;
pub mod syntax;
pub mod tree;
pub mod types;

pub use batch::{
    process_package, process_package_until, run_batch, BatchOptions, BatchSummary, PackageOutcome,
    ProcessedSet,
};
pub use clone::{match_candidates, Candidate, CloneCorpus, CloneMatch};
pub use discovery::{discover_packages, PackageLayout, PackageTarget};
pub use error::{BatchError, CorpusError, FeatureError, FingerprintError, OutputError, TreeError};
pub use features::{
    extract_features, extract_features_from_tree, FeatureReport, FeatureValue, FeatureVector,
    FEATURE_NAMES, FEATURE_SCHEMA_VERSION,
};
pub use fingerprint::{fingerprint_package, fingerprint_tree, Fingerprint};
pub use tree::PackageTree;
pub use types::{Degradation, DegradationKind, PackageIdentity, PackageStatus};
