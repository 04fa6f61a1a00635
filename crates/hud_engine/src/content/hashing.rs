use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::discovery::DiscoveryError;

/// Stable 32-bit id for a definition type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeHash(pub u32);

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

pub fn type_hash(type_name: &str) -> TypeHash {
    let digest = Sha256::digest(type_name.as_bytes());
    TypeHash(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

#[derive(Debug, Clone)]
pub(crate) struct ModInputHash {
    pub xml_file_count: usize,
    pub hash_hex: String,
}

/// One XML input, with its path relative to the mod root joined by `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct XmlSource {
    pub rel_path: String,
    pub abs_path: PathBuf,
}

/// NUL-separated SHA-256 over a sequence of fields.
struct Fingerprint(Sha256);

impl Fingerprint {
    fn new() -> Self {
        Self(Sha256::new())
    }

    fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(bytes);
        self.0.update([0u8]);
        self
    }

    fn finish(self) -> String {
        self.0
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

pub(crate) fn hash_enabled_mods_list(mod_ids_in_order: &[String]) -> String {
    let mut fingerprint = Fingerprint::new();
    for mod_id in mod_ids_in_order {
        fingerprint.field(mod_id.as_bytes());
    }
    fingerprint.finish()
}

pub(crate) fn hash_mod_xml_inputs(mod_dir: &Path) -> Result<ModInputHash, DiscoveryError> {
    let sources = collect_xml_files(mod_dir)?;
    let mut fingerprint = Fingerprint::new();
    for source in &sources {
        let bytes = fs::read(&source.abs_path).map_err(|err| DiscoveryError::ReadFile {
            path: source.abs_path.clone(),
            source: err,
        })?;
        fingerprint.field(source.rel_path.as_bytes()).field(&bytes);
    }
    Ok(ModInputHash {
        xml_file_count: sources.len(),
        hash_hex: fingerprint.finish(),
    })
}

/// XML files anywhere under `root`, ordered by relative path.
pub(crate) fn collect_xml_files(root: &Path) -> Result<Vec<XmlSource>, DiscoveryError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let read_dir_err = |source: std::io::Error| DiscoveryError::ReadDir {
            path: dir.clone(),
            source,
        };
        for entry in fs::read_dir(&dir).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_xml_extension(&path) {
                found.push(XmlSource {
                    rel_path: relative_slash_path(root, &path),
                    abs_path: path,
                });
            }
        }
    }
    found.sort();
    Ok(found)
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts = rel
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn type_hash_is_stable_and_distinct() {
        assert_eq!(type_hash("YIELD_FOOD"), type_hash("YIELD_FOOD"));
        assert_ne!(type_hash("YIELD_FOOD"), type_hash("YIELD_GOLD"));
        assert_eq!(type_hash("").to_string(), "e3b0c442");
    }

    #[test]
    fn enabled_mods_hash_order_sensitive() {
        let a = hash_enabled_mods_list(&["base".to_string(), "a".to_string(), "b".to_string()]);
        let b = hash_enabled_mods_list(&["base".to_string(), "b".to_string(), "a".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn input_hash_ignores_non_xml_and_tracks_edits() {
        let temp = TempDir::new().expect("tempdir");
        let dir = temp.path();
        fs::create_dir_all(dir.join("nested")).expect("mkdir");
        fs::write(dir.join("nested").join("yields.xml"), "<GameInfo/>").expect("write xml");
        fs::write(dir.join("notes.txt"), "ignore me").expect("write txt");

        let first = hash_mod_xml_inputs(dir).expect("hash");
        assert_eq!(first.xml_file_count, 1);

        fs::write(
            dir.join("nested").join("yields.xml"),
            "<GameInfo><Yields/></GameInfo>",
        )
        .expect("edit");
        let second = hash_mod_xml_inputs(dir).expect("hash");
        assert_ne!(first.hash_hex, second.hash_hex);
    }

    #[test]
    fn collected_files_are_sorted_by_relative_path() {
        let temp = TempDir::new().expect("tempdir");
        let dir = temp.path();
        fs::create_dir_all(dir.join("b")).expect("mkdir");
        fs::write(dir.join("b").join("z.xml"), "<GameInfo/>").expect("write");
        fs::write(dir.join("a.xml"), "<GameInfo/>").expect("write");

        let files = collect_xml_files(dir).expect("collect");
        let names = files
            .iter()
            .map(|file| file.rel_path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.xml", "b/z.xml"]);
    }
}
