use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub(crate) const CONTENT_REPORT_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModReport {
    pub mod_id: String,
    pub mod_load_index: u32,
    pub xml_file_count: usize,
    pub input_hash_sha256_hex: String,
}

/// What was loaded, written next to the cache so the next start can tell
/// which mods changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReport {
    pub format_version: u16,
    pub enabled_mods_hash_sha256_hex: String,
    pub mods: Vec<ModReport>,
    pub tables: BTreeMap<String, usize>,
}

impl ContentReport {
    pub fn status_label(&self) -> String {
        let rows = self.tables.values().sum::<usize>();
        format!(
            "{} mods, {} tables, {} rows",
            self.mods.len(),
            self.tables.len(),
            rows
        )
    }

    pub(crate) fn mod_input_hash(&self, mod_id: &str) -> Option<&str> {
        self.mods
            .iter()
            .find(|entry| entry.mod_id == mod_id)
            .map(|entry| entry.input_hash_sha256_hex.as_str())
    }
}

pub(crate) fn content_report_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("content_report.json")
}

/// Unreadable or outdated reports are treated as absent.
pub(crate) fn read_content_report(path: &Path) -> Option<ContentReport> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str::<ContentReport>(&raw)
        .ok()
        .filter(|report| report.format_version == CONTENT_REPORT_FORMAT_VERSION)
}

/// Writes through a sibling temp file so a crash never leaves half a report.
pub(crate) fn write_content_report(path: &Path, report: &ContentReport) -> io::Result<()> {
    let text = serde_json::to_string_pretty(report)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = staging_path(path);
    fs::write(&staging, text)?;
    fs::rename(&staging, path).inspect_err(|_| {
        let _ = fs::remove_file(&staging);
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn sample() -> ContentReport {
        ContentReport {
            format_version: CONTENT_REPORT_FORMAT_VERSION,
            enabled_mods_hash_sha256_hex: "abc".to_string(),
            mods: vec![ModReport {
                mod_id: "base".to_string(),
                mod_load_index: 0,
                xml_file_count: 2,
                input_hash_sha256_hex: "def".to_string(),
            }],
            tables: BTreeMap::from([("Yields".to_string(), 6), ("Ages".to_string(), 3)]),
        }
    }

    #[test]
    fn report_survives_write_and_read() {
        let temp = TempDir::new().expect("tempdir");
        let path = content_report_path(temp.path());

        write_content_report(&path, &sample()).expect("write");

        let loaded = read_content_report(&path).expect("report");
        assert_eq!(loaded.mod_input_hash("base"), Some("def"));
        assert_eq!(loaded.status_label(), "1 mods, 2 tables, 9 rows");
    }

    #[test]
    fn rewrite_replaces_report_and_cleans_staging() {
        let temp = TempDir::new().expect("tempdir");
        let path = content_report_path(&temp.path().join("cache"));

        write_content_report(&path, &sample()).expect("first");
        let mut next = sample();
        next.mods[0].input_hash_sha256_hex = "fed".to_string();
        write_content_report(&path, &next).expect("second");

        let loaded = read_content_report(&path).expect("report");
        assert_eq!(loaded.mod_input_hash("base"), Some("fed"));
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn garbage_or_old_format_reads_as_absent() {
        let temp = TempDir::new().expect("tempdir");
        let path = content_report_path(temp.path());
        fs::write(&path, "{not json").expect("write garbage");
        assert!(read_content_report(&path).is_none());

        let mut old = sample();
        old.format_version = 0;
        write_content_report(&path, &old).expect("write old");
        assert!(read_content_report(&path).is_none());
    }
}
