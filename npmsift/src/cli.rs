use clap::{Parser, Subcommand};
use npmsift_engine::PackageLayout;
use std::path::PathBuf;

/// npmsift - fingerprint npm packages, extract static behavioral features and
/// detect clones of known-malicious packages
#[derive(Parser, Debug)]
#[command(name = "npmsift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file (default: npmsift.yaml in the working directory, then ~/.npmsift/config.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Worker threads (default: from config, env or one per core)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Per-package time budget in seconds, 0 = unlimited (default: from config or 120)
    #[arg(long, global = true, value_name = "SECS")]
    pub package_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fingerprint every package under a dataset directory
    Hash {
        /// Dataset root
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Directory layout: nested (<pkg>/<version>/), flat (<pkg>[@version]/) or single
        #[arg(long, default_value = "flat")]
        layout: PackageLayout,

        /// Output CSV (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Append to the output, skipping packages already in it
        #[arg(long, requires = "output")]
        resume: bool,
    },

    /// Extract the feature vector of every package under a dataset directory
    Features {
        /// Dataset root
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Directory layout: nested, flat or single
        #[arg(long, default_value = "flat")]
        layout: PackageLayout,

        /// Value of an extra `label` column (e.g. 1 = malicious, 0 = benign)
        #[arg(long)]
        label: Option<String>,

        /// Output CSV (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Append to the output, skipping packages already in it
        #[arg(long, requires = "output")]
        resume: bool,
    },

    /// Report candidates whose fingerprint matches a known-malicious one
    Clones {
        /// Known-malicious fingerprints (package,version,hash)
        #[arg(value_name = "KNOWN_CSV")]
        known: PathBuf,

        /// Candidate fingerprints (package,version,hash)
        #[arg(value_name = "CANDIDATES_CSV")]
        candidates: PathBuf,

        /// Clone report CSV (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Fingerprint and extract features in one pass
    Scan {
        /// Dataset root
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Directory layout: nested, flat or single
        #[arg(long, default_value = "flat")]
        layout: PackageLayout,

        /// Fingerprint CSV
        #[arg(long, value_name = "FILE")]
        hashes: PathBuf,

        /// Feature CSV
        #[arg(long, value_name = "FILE")]
        features: PathBuf,

        /// Value of an extra `label` column in the feature CSV
        #[arg(long)]
        label: Option<String>,

        /// Append to both outputs, skipping packages already in both
        #[arg(long)]
        resume: bool,
    },

    /// Print one package's fingerprint, features and degradations as JSON
    Inspect {
        /// Package directory
        #[arg(value_name = "PACKAGE_DIR")]
        package_dir: PathBuf,

        /// Compact single-line JSON
        #[arg(long, default_value = "false")]
        compact: bool,
    },
}
