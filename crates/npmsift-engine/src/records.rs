//! CSV interfaces: fingerprint rows, feature rows and clone reports.
//!
//! Writers flush after every row so a crash or Ctrl-C never leaves a
//! half-written record behind more than the last line.

use crate::batch::ProcessedSet;
use crate::clone::{Candidate, CloneCorpus, CloneMatch};
use crate::error::{CorpusError, OutputError};
use crate::features::{FeatureVector, FEATURE_NAMES};
use crate::fingerprint::Fingerprint;
use crate::types::PackageIdentity;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const FINGERPRINT_HEADER: [&str; 3] = ["package", "version", "hash"];

pub const CLONE_HEADER: [&str; 5] = ["package", "version", "hash", "known_package", "known_version"];

pub const LABEL_COLUMN: &str = "label";

/// `package_name,version,<features>[,label]`
pub fn feature_header(with_label: bool) -> Vec<String> {
    let mut header = vec!["package_name".to_string(), "version".to_string()];
    header.extend(FEATURE_NAMES.iter().map(|n| n.to_string()));
    if with_label {
        header.push(LABEL_COLUMN.to_string());
    }
    header
}

pub fn fingerprint_row(identity: &PackageIdentity, fingerprint: &Fingerprint) -> Vec<String> {
    vec![
        identity.name.clone(),
        identity.version_str().to_string(),
        fingerprint.to_string(),
    ]
}

pub fn feature_row(identity: &PackageIdentity, vector: &FeatureVector, label: Option<&str>) -> Vec<String> {
    let mut row = vec![identity.name.clone(), identity.version_str().to_string()];
    row.extend(vector.values().iter().map(|v| v.to_string()));
    if let Some(label) = label {
        row.push(label.to_string());
    }
    row
}

pub fn clone_row(m: &CloneMatch) -> Vec<String> {
    vec![
        m.candidate.name.clone(),
        m.candidate.version_str().to_string(),
        m.fingerprint.to_string(),
        m.known.name.clone(),
        m.known.version_str().to_string(),
    ]
}

/// Row sink that flushes after every record.
pub struct RecordWriter {
    inner: csv::Writer<Box<dyn Write>>,
    rows: usize,
}

impl RecordWriter {
    fn from_writer(writer: Box<dyn Write>, header: Option<&[String]>) -> Result<Self, OutputError> {
        let mut inner = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        if let Some(header) = header {
            inner.write_record(header)?;
            inner.flush()?;
        }
        Ok(Self { inner, rows: 0 })
    }

    /// Write to stdout.
    pub fn stdout(header: &[String]) -> Result<Self, OutputError> {
        Self::from_writer(Box::new(io::stdout()), Some(header))
    }

    /// Create or truncate `path`.
    pub fn create(path: &Path, header: &[String]) -> Result<Self, OutputError> {
        let file = File::create(path).map_err(|source| OutputError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_writer(Box::new(file), Some(header))
    }

    /// Append to `path`. The header is written only when the file is new or
    /// empty; an existing header must match `header` exactly.
    pub fn append(path: &Path, header: &[String]) -> Result<Self, OutputError> {
        let existing = read_header(path)?;
        if let Some(found) = &existing {
            if found.as_slice() != header {
                return Err(OutputError::HeaderMismatch {
                    path: path.to_path_buf(),
                    expected: header.to_vec(),
                    found: found.clone(),
                });
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| OutputError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let header = if existing.is_none() { Some(header) } else { None };
        Self::from_writer(Box::new(file), header)
    }

    /// `path` or stdout when `None`; append mode only applies to files.
    pub fn open(path: Option<&Path>, header: &[String], append: bool) -> Result<Self, OutputError> {
        match path {
            None => Self::stdout(header),
            Some(p) if append => Self::append(p, header),
            Some(p) => Self::create(p, header),
        }
    }

    pub fn write_row<I, T>(&mut self, row: I) -> Result<(), OutputError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.inner.write_record(row)?;
        self.inner.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written through this writer (header excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Header of an existing CSV file, `None` if it does not exist or is empty.
fn read_header(path: &Path) -> Result<Option<Vec<String>>, OutputError> {
    match fs::metadata(path) {
        Ok(m) if m.len() == 0 => return Ok(None),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(OutputError::Open {
                path: path.to_path_buf(),
                source,
            })
        }
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    Ok((!header.is_empty()).then_some(header))
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, CorpusError> {
    if !path.exists() {
        return Err(CorpusError::NotFound(path.to_path_buf()));
    }
    let csv_err = |source| CorpusError::Csv {
        path: path.to_path_buf(),
        source,
    };
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)
}

fn column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| names.contains(&h))
}

/// Read `package,version,hash` rows. `package_name` is accepted for
/// `package` and the `version` column may be missing. Rows with an empty or
/// non-hex hash are skipped with a warning. An empty file yields no rows.
pub fn read_fingerprint_rows(path: &Path) -> Result<Vec<(PackageIdentity, Fingerprint)>, CorpusError> {
    let mut reader = open_reader(path)?;
    let csv_err = |source| CorpusError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let missing = |column: &'static str| CorpusError::MissingColumn {
        path: path.to_path_buf(),
        column,
    };
    let name_col = column(&headers, &["package", "package_name"]).ok_or_else(|| missing("package"))?;
    let hash_col = column(&headers, &["hash"]).ok_or_else(|| missing("hash"))?;
    let version_col = column(&headers, &["version"]);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let raw_hash = record.get(hash_col).unwrap_or("");
        let fingerprint = match raw_hash.parse::<Fingerprint>() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %path.display(), row = line + 1, "skipping row: {}", e);
                continue;
            }
        };
        let name = record.get(name_col).unwrap_or("").to_string();
        let version = version_col
            .and_then(|c| record.get(c))
            .map(str::to_string);
        rows.push((PackageIdentity::new(name, version), fingerprint));
    }
    Ok(rows)
}

pub fn load_corpus(path: &Path) -> Result<CloneCorpus, CorpusError> {
    let corpus: CloneCorpus = read_fingerprint_rows(path)?
        .into_iter()
        .map(|(identity, fingerprint)| (fingerprint, identity))
        .collect();
    tracing::info!(path = %path.display(), fingerprints = corpus.len(), "loaded corpus");
    Ok(corpus)
}

pub fn read_candidates(path: &Path) -> Result<Vec<Candidate>, CorpusError> {
    Ok(read_fingerprint_rows(path)?
        .into_iter()
        .map(|(identity, fingerprint)| Candidate { identity, fingerprint })
        .collect())
}

/// Packages already present in a feature CSV, for resuming. A missing file
/// is an empty set.
pub fn load_processed(path: &Path) -> Result<ProcessedSet, OutputError> {
    let mut processed = ProcessedSet::default();
    if read_header(path)?.is_none() {
        return Ok(processed);
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let Some(name_col) = column(&headers, &["package_name", "package"]) else {
        return Ok(processed);
    };
    let version_col = column(&headers, &["version"]);
    for record in reader.records() {
        let record = record?;
        let name = record.get(name_col).unwrap_or("");
        if name.is_empty() {
            continue;
        }
        let version = version_col.and_then(|c| record.get(c)).map(str::to_string);
        processed.insert(PackageIdentity::new(name, version));
    }
    tracing::info!(path = %path.display(), packages = processed.len(), "resuming");
    Ok(processed)
}

/// Where to write, for messages.
pub fn describe_output(path: Option<&Path>) -> String {
    path.map_or_else(|| "stdout".to_string(), |p| p.display().to_string())
}

/// Default clone report path next to the candidate file:
/// `<dir>/<stem>_clones_detected.csv`.
pub fn default_clone_report_path(candidates: &Path) -> PathBuf {
    let stem = candidates
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "candidates".to_string());
    candidates.with_file_name(format!("{}_clones_detected.csv", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_reads_package_name_header_without_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known.csv");
        fs::write(&path, "package_name,hash\nevil,AA11\nbad,not-a-hash\n").unwrap();
        let rows = read_fingerprint_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, PackageIdentity::unversioned("evil"));
        assert_eq!(rows[0].1.as_str(), "aa11");
    }

    #[test]
    fn test_corpus_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_corpus(&dir.path().join("missing.csv")),
            Err(CorpusError::NotFound(_))
        ));

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "").unwrap();
        assert!(load_corpus(&empty).unwrap().is_empty());

        let no_hash = dir.path().join("nohash.csv");
        fs::write(&no_hash, "package,version\na,1\n").unwrap();
        assert!(matches!(
            load_corpus(&no_hash),
            Err(CorpusError::MissingColumn { column: "hash", .. })
        ));
    }

    #[test]
    fn test_create_then_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashes.csv");
        let h = header(&FINGERPRINT_HEADER);
        let fp: Fingerprint = "ab".parse().unwrap();

        let mut w = RecordWriter::append(&path, &h).unwrap();
        w.write_row(fingerprint_row(&PackageIdentity::new("a", Some("1".into())), &fp))
            .unwrap();
        drop(w);
        let mut w = RecordWriter::append(&path, &h).unwrap();
        w.write_row(fingerprint_row(&PackageIdentity::unversioned("b"), &fp))
            .unwrap();
        assert_eq!(w.rows(), 1);
        drop(w);

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "package,version,hash\na,1,ab\nb,,ab\n"
        );
        let rows = read_fingerprint_rows(&path).unwrap();
        assert_eq!(rows[1].0.version, None);
    }

    #[test]
    fn test_append_rejects_other_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        fs::write(&path, "x,y\n1,2\n").unwrap();
        let err = RecordWriter::append(&path, &feature_header(false)).err().unwrap();
        assert!(matches!(err, OutputError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_feature_row_shape() {
        let id = PackageIdentity::new("p", Some("1.0.0".into()));
        let row = feature_row(&id, &FeatureVector::default(), Some("1"));
        assert_eq!(row.len(), feature_header(true).len());
        assert_eq!(row[0], "p");
        assert_eq!(row[2], "0");
        assert_eq!(row.last().map(String::as_str), Some("1"));
        assert_eq!(feature_row(&id, &FeatureVector::default(), None).len(), 18);
    }

    #[test]
    fn test_load_processed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        assert!(load_processed(&path).unwrap().is_empty());

        let mut w = RecordWriter::create(&path, &feature_header(false)).unwrap();
        let a = PackageIdentity::new("a", Some("1.0.0".into()));
        w.write_row(feature_row(&a, &FeatureVector::default(), None)).unwrap();
        drop(w);

        let processed = load_processed(&path).unwrap();
        assert!(processed.contains(&a));
        assert!(!processed.contains(&PackageIdentity::new("a", Some("2.0.0".into()))));
    }

    #[test]
    fn test_default_clone_report_path() {
        assert_eq!(
            default_clone_report_path(Path::new("/data/new_hashes.csv")),
            PathBuf::from("/data/new_hashes_clones_detected.csv")
        );
    }
}
