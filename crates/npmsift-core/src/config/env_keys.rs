//! Environment variable keys and their aliases.
//!
//! The primary name is always `NPMSIFT_*`; aliases are checked in order when
//! the primary is unset.

/// Scan tuning
pub mod scan {
    pub const NPMSIFT_CONFIG: &str = "NPMSIFT_CONFIG";

    pub const NPMSIFT_WORKERS: &str = "NPMSIFT_WORKERS";
    pub const WORKERS_ALIASES: &[&str] = &["RAYON_NUM_THREADS"];

    pub const NPMSIFT_PACKAGE_TIMEOUT_SECS: &str = "NPMSIFT_PACKAGE_TIMEOUT_SECS";

    pub const NPMSIFT_PARSE_TIMEOUT_MS: &str = "NPMSIFT_PARSE_TIMEOUT_MS";

    pub const NPMSIFT_MAX_SCRIPT_BYTES: &str = "NPMSIFT_MAX_SCRIPT_BYTES";

    /// Comma separated, e.g. "js,mjs,cjs"
    pub const NPMSIFT_SCRIPT_EXTENSIONS: &str = "NPMSIFT_SCRIPT_EXTENSIONS";
}

/// Logging and audit output
pub mod observability {
    pub const NPMSIFT_QUIET: &str = "NPMSIFT_QUIET";
    pub const QUIET_ALIASES: &[&str] = &[];

    pub const NPMSIFT_LOG_LEVEL: &str = "NPMSIFT_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["NPMSIFT_LOG"];

    pub const NPMSIFT_LOG_JSON: &str = "NPMSIFT_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &[];

    pub const NPMSIFT_AUDIT_LOG: &str = "NPMSIFT_AUDIT_LOG";
    pub const AUDIT_LOG_ALIASES: &[&str] = &[];
}
