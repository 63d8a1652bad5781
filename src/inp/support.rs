//! Support file resolution
//!
//!     Three sections can reference external data files: rain gages with a
//!     FILE source, the files section's USE entries, and time series backed by
//!     a file. When support-file handling is on, each referenced path is
//!     resolved (as given first, then relative to the document's directory),
//!     its content is fingerprinted, and the in-record value is normalized to
//!     the quoted basename so a relocated document keeps working next to its
//!     data files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::inp::error::InpError;
use crate::inp::merge::Store;
use crate::inp::record::{Record, FILE_TOKEN};
use crate::inp::schema::{self, SectionKind};

/// Which records of which section reference a file, and through which field.
struct FileField {
    kind: SectionKind,
    field: &'static str,
    applies: fn(&Record) -> bool,
}

const FILE_FIELDS: &[FileField] = &[
    FileField {
        kind: SectionKind::RainGages,
        field: "SourceName",
        applies: |r| r.text("Source").map(|s| s.eq_ignore_ascii_case("FILE")) == Some(true),
    },
    FileField {
        kind: SectionKind::Files,
        field: "FileName",
        applies: |r| r.text("Usage").map(|s| s.eq_ignore_ascii_case("USE")) == Some(true),
    },
    FileField {
        kind: SectionKind::TimeSeries,
        field: "FileName",
        applies: |r| r.contains("FileName"),
    },
];

/// Resolved support files: absolute path to content fingerprint.
#[derive(Debug, Clone, Default)]
pub struct SupportFiles {
    manifest: BTreeMap<PathBuf, String>,
}

impl SupportFiles {
    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.manifest.iter().map(|(p, t)| (p.as_path(), t.as_str()))
    }

    pub fn token(&self, path: &Path) -> Option<&str> {
        self.manifest.get(path).map(String::as_str)
    }
}

/// Resolve every referenced support file in the store, rewriting references
/// to quoted basenames and stamping each record with its file's fingerprint.
pub fn resolve(store: &mut Store, base_dir: Option<&Path>) -> Result<SupportFiles, InpError> {
    let mut support = SupportFiles::default();
    for spec in FILE_FIELDS {
        let section = schema::schema(spec.kind);
        let Some(records) = store.get_mut(&spec.kind) else {
            continue;
        };
        for record in records.iter_mut() {
            if !(spec.applies)(record) {
                continue;
            }
            let Some(raw) = record.text(spec.field) else {
                continue;
            };
            let reference = raw.trim_matches('"').to_string();
            let path = locate(&reference, base_dir).ok_or_else(|| {
                InpError::MissingSupportFile {
                    section: section.label,
                    field: spec.field,
                    path: reference.clone(),
                }
            })?;
            let token = fingerprint(&path)?;
            let basename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(reference);
            record.set(
                spec.field,
                crate::inp::value::Value::text(format!("\"{}\"", basename)),
            );
            record.set(FILE_TOKEN, crate::inp::value::Value::text(token.clone()));
            support.manifest.insert(path, token);
        }
    }
    Ok(support)
}

/// Try the reference as given, then relative to the document's directory.
/// The returned path is absolute so the manifest is stable across cwd changes.
fn locate(reference: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
    let literal = PathBuf::from(reference);
    if literal.is_file() {
        return fs::canonicalize(literal).ok();
    }
    let joined = base_dir?.join(reference);
    if joined.is_file() {
        fs::canonicalize(joined).ok()
    } else {
        None
    }
}

/// Content fingerprint of a file, as lowercase hex.
fn fingerprint(path: &Path) -> Result<String, InpError> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inp::value::Value;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("swmm-inp-{}-{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reference_normalized_to_quoted_basename() {
        let path = scratch_file("rain.dat", "07/01/2019 12:00 0.5\n");
        let mut record = Record::new();
        record.set("TimeSeries", Value::text("TS1"));
        record.set("FileName", Value::text(path.to_string_lossy().into_owned()));
        let mut store = Store::new();
        store.insert(SectionKind::TimeSeries, vec![record]);

        let support = resolve(&mut store, None).unwrap();
        let record = &store[&SectionKind::TimeSeries][0];
        let name = record.text("FileName").unwrap();
        assert!(name.starts_with('"') && name.ends_with('"'));
        assert!(name.contains("rain.dat"));
        let resolved = fs::canonicalize(&path).unwrap();
        assert_eq!(record.text(FILE_TOKEN), support.token(&resolved));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut record = Record::new();
        record.set("Usage", Value::text("USE"));
        record.set("FileType", Value::text("RAINFALL"));
        record.set("FileName", Value::text("no-such-file.dat"));
        let mut store = Store::new();
        store.insert(SectionKind::Files, vec![record]);

        let err = resolve(&mut store, None).unwrap_err();
        assert!(matches!(err, InpError::MissingSupportFile { .. }));
    }

    #[test]
    fn test_save_entries_are_not_resolved() {
        let mut record = Record::new();
        record.set("Usage", Value::text("SAVE"));
        record.set("FileType", Value::text("OUTFLOWS"));
        record.set("FileName", Value::text("future-output.txt"));
        let mut store = Store::new();
        store.insert(SectionKind::Files, vec![record]);

        let support = resolve(&mut store, None).unwrap();
        assert!(support.is_empty());
    }

    #[test]
    fn test_relative_reference_resolves_against_base_dir() {
        let path = scratch_file("gage.dat", "data\n");
        let base = path.parent().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        let mut record = Record::new();
        record.set("Name", Value::text("G1"));
        record.set("Source", Value::text("FILE"));
        record.set("SourceName", Value::text(name));
        let mut store = Store::new();
        store.insert(SectionKind::RainGages, vec![record]);

        let support = resolve(&mut store, Some(&base)).unwrap();
        assert_eq!(support.iter().count(), 1);
        fs::remove_file(path).unwrap();
    }
}
