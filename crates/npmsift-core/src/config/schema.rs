//! Configuration structs grouped by concern.
//!
//! `ScanConfig` layers: built-in defaults < YAML file < environment. The CLI
//! applies its own flags on top.

use super::env_keys::{observability as obv_keys, scan as scan_keys};
use super::loader::{env_bool, env_optional, env_or, env_parse, load_dotenv};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names looked up in the working directory when no config is given.
pub const CONFIG_FILE_NAMES: &[&str] = &["npmsift.yaml", "npmsift.yml", ".npmsift.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tuning for fingerprinting and feature extraction runs.
///
/// # Example YAML
///
/// ```yaml
/// # npmsift.yaml
/// workers: 8
/// package_timeout_secs: 120
/// parse_timeout_ms: 10000
/// max_script_bytes: 0
/// script_extensions: ["js", "mjs", "cjs"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Worker threads for batch runs; `None` lets rayon pick one per core
    pub workers: Option<usize>,
    /// Per-package time budget for feature extraction; 0 disables it
    pub package_timeout_secs: u64,
    /// Upper bound for parsing one script; 0 disables it
    pub parse_timeout_ms: u64,
    /// Scripts larger than this skip syntax analysis (lexical stats still count); 0 = no limit
    pub max_script_bytes: u64,
    /// File extensions (without dot, case-insensitive) treated as JavaScript
    pub script_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: None,
            package_timeout_secs: 120,
            parse_timeout_ms: 10_000,
            max_script_bytes: 0,
            script_extensions: vec!["js".to_string(), "mjs".to_string(), "cjs".to_string()],
        }
    }
}

impl ScanConfig {
    /// Load a YAML config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve the config file to use, if any.
    ///
    /// Order: explicit path, `NPMSIFT_CONFIG`, `npmsift.yaml` (and variants) in
    /// the working directory, `~/.npmsift/config.yaml`.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }
        if let Some(p) = env_optional(scan_keys::NPMSIFT_CONFIG, &[]) {
            return Some(PathBuf::from(p));
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| cwd.join(name))
            .find(|p| p.is_file())
            .or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".npmsift").join("config.yaml"))
                    .filter(|p| p.is_file())
            })
    }

    /// Defaults, then the located YAML file, then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        load_dotenv();
        let mut cfg = match Self::locate(explicit) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading scan config");
                Self::load_from_file(&path)?
            }
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `NPMSIFT_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Some(n) = env_parse::<usize>(scan_keys::NPMSIFT_WORKERS, scan_keys::WORKERS_ALIASES) {
            self.workers = Some(n);
        }
        if let Some(secs) = env_parse::<u64>(scan_keys::NPMSIFT_PACKAGE_TIMEOUT_SECS, &[]) {
            self.package_timeout_secs = secs;
        }
        if let Some(ms) = env_parse::<u64>(scan_keys::NPMSIFT_PARSE_TIMEOUT_MS, &[]) {
            self.parse_timeout_ms = ms;
        }
        if let Some(bytes) = env_parse::<u64>(scan_keys::NPMSIFT_MAX_SCRIPT_BYTES, &[]) {
            self.max_script_bytes = bytes;
        }
        if let Some(exts) = env_optional(scan_keys::NPMSIFT_SCRIPT_EXTENSIONS, &[]) {
            self.script_extensions = exts
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.script_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "script_extensions must name at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `ext` (without dot) is a script extension.
    pub fn is_script_extension(&self, ext: &str) -> bool {
        self.script_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Logging config: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::NPMSIFT_QUIET, obv_keys::QUIET_ALIASES, false),
                log_level: env_or(obv_keys::NPMSIFT_LOG_LEVEL, obv_keys::LOG_LEVEL_ALIASES, || {
                    "npmsift=info,npmsift_engine=info".to_string()
                }),
                log_json: env_bool(obv_keys::NPMSIFT_LOG_JSON, obv_keys::LOG_JSON_ALIASES, false),
                audit_log: env_optional(obv_keys::NPMSIFT_AUDIT_LOG, obv_keys::AUDIT_LOG_ALIASES),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ScanConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.is_script_extension("js"));
        assert!(cfg.is_script_extension("MJS"));
        assert!(!cfg.is_script_extension("ts"));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers: 4\npackage_timeout_secs: 30\nscript_extensions: [js, jsx]").unwrap();
        let cfg = ScanConfig::load_from_file(file.path()).unwrap();
        assert_eq!(cfg.workers, Some(4));
        assert_eq!(cfg.package_timeout_secs, 30);
        // unspecified fields keep their defaults
        assert_eq!(cfg.parse_timeout_ms, 10_000);
        assert!(cfg.is_script_extension("jsx"));
        assert!(!cfg.is_script_extension("cjs"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wrokers: 4").unwrap();
        assert!(matches!(
            ScanConfig::load_from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_workers_invalid() {
        let cfg = ScanConfig {
            workers: Some(0),
            ..ScanConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let err = ScanConfig::load_from_file(Path::new("/nonexistent/npmsift.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
