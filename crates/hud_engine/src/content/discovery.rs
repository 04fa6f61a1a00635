use std::path::PathBuf;

use thiserror::Error;

use crate::AppPaths;

pub(crate) const BASE_MOD_ID: &str = "base";

/// Mods to layer over base content, in load order.
#[derive(Debug, Clone, Default)]
pub struct ContentRequest {
    pub enabled_mods: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("enabled mod list contains a blank entry")]
    EmptyEnabledMod,
    #[error("mod id '{mod_id}' is not a plain directory name")]
    InvalidModId { mod_id: String },
    #[error("mod '{mod_id}' is enabled twice")]
    DuplicateEnabledMod { mod_id: String },
    #[error("mod '{mod_id}' is enabled but {expected_dir} is not a directory")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
    #[error("base content directory {path} does not exist")]
    BaseContentMissing { path: PathBuf },
    #[error("cannot list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub mod_load_index: u32,
    pub source_dir: PathBuf,
}

/// Base content first, then each enabled mod in request order.
pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Vec<ModSource>, DiscoveryError> {
    if !app_paths.base_content_dir.is_dir() {
        return Err(DiscoveryError::BaseContentMissing {
            path: app_paths.base_content_dir.clone(),
        });
    }

    let mut sources = Vec::with_capacity(request.enabled_mods.len() + 1);
    sources.push(ModSource {
        mod_id: BASE_MOD_ID.to_string(),
        mod_load_index: 0,
        source_dir: app_paths.base_content_dir.clone(),
    });

    for raw in &request.enabled_mods {
        let mod_id = checked_mod_id(raw)?;
        if sources.iter().any(|source| source.mod_id == mod_id) {
            return Err(DiscoveryError::DuplicateEnabledMod {
                mod_id: mod_id.to_string(),
            });
        }
        let source_dir = app_paths.mods_dir.join(mod_id);
        if !source_dir.is_dir() {
            return Err(DiscoveryError::EnabledModMissing {
                mod_id: mod_id.to_string(),
                expected_dir: source_dir,
            });
        }
        sources.push(ModSource {
            mod_id: mod_id.to_string(),
            mod_load_index: u32::try_from(sources.len()).unwrap_or(u32::MAX),
            source_dir,
        });
    }

    Ok(sources)
}

fn checked_mod_id(raw: &str) -> Result<&str, DiscoveryError> {
    let mod_id = raw.trim();
    if mod_id.is_empty() {
        return Err(DiscoveryError::EmptyEnabledMod);
    }
    if mod_id == "." || mod_id == ".." || mod_id.contains(['/', '\\']) {
        return Err(DiscoveryError::InvalidModId {
            mod_id: mod_id.to_string(),
        });
    }
    Ok(mod_id)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn base_is_first_then_enabled_order() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = AppPaths::under(temp.path());
        fs::create_dir_all(&app_paths.base_content_dir).expect("create base");
        fs::create_dir_all(app_paths.mods_dir.join("b")).expect("create mod b");
        fs::create_dir_all(app_paths.mods_dir.join("a")).expect("create mod a");
        let request = ContentRequest {
            enabled_mods: vec!["b".to_string(), " a ".to_string()],
        };

        let sources = discover_mod_sources(&app_paths, &request).expect("discover");
        let ids = sources.iter().map(|s| s.mod_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["base", "b", "a"]);
        assert_eq!(sources[2].mod_load_index, 2);
    }

    #[test]
    fn duplicate_and_missing_mods_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = AppPaths::under(temp.path());
        fs::create_dir_all(&app_paths.base_content_dir).expect("create base");
        fs::create_dir_all(app_paths.mods_dir.join("a")).expect("create mod a");

        let duplicate = ContentRequest {
            enabled_mods: vec!["a".to_string(), "a".to_string()],
        };
        assert!(matches!(
            discover_mod_sources(&app_paths, &duplicate),
            Err(DiscoveryError::DuplicateEnabledMod { .. })
        ));

        let missing = ContentRequest {
            enabled_mods: vec!["ghost".to_string()],
        };
        assert!(matches!(
            discover_mod_sources(&app_paths, &missing),
            Err(DiscoveryError::EnabledModMissing { .. })
        ));
    }

    #[test]
    fn mod_ids_must_be_plain_names_other_than_base() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = AppPaths::under(temp.path());
        fs::create_dir_all(&app_paths.base_content_dir).expect("create base");
        fs::create_dir_all(app_paths.mods_dir.join("base")).expect("create shadow");

        for bad in ["../assets", "a/b", ".."] {
            let request = ContentRequest {
                enabled_mods: vec![bad.to_string()],
            };
            assert!(matches!(
                discover_mod_sources(&app_paths, &request),
                Err(DiscoveryError::InvalidModId { .. })
            ));
        }

        let shadow = ContentRequest {
            enabled_mods: vec!["base".to_string()],
        };
        assert!(matches!(
            discover_mod_sources(&app_paths, &shadow),
            Err(DiscoveryError::DuplicateEnabledMod { .. })
        ));
    }

    #[test]
    fn missing_base_directory_is_reported() {
        let temp = TempDir::new().expect("tempdir");
        let err = discover_mod_sources(&AppPaths::under(temp.path()), &ContentRequest::default())
            .expect_err("no base");
        assert!(matches!(err, DiscoveryError::BaseContentMissing { .. }));
    }
}
