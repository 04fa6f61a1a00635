use thiserror::Error;
use tracing::{info, warn};

use crate::AppPaths;

use super::compiler::{compile_sources, ContentCompileError};
use super::database::GameInfo;
use super::discovery::{discover_mod_sources, ContentRequest, DiscoveryError};
use super::hashing::{hash_enabled_mods_list, hash_mod_xml_inputs};
use super::report::{
    content_report_path, read_content_report, write_content_report, ContentReport, ModReport,
    CONTENT_REPORT_FORMAT_VERSION,
};

#[derive(Debug, Error)]
pub enum ContentLoadError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Compile(#[from] ContentCompileError),
}

#[derive(Debug, Clone)]
pub struct LoadedContent {
    pub game_info: GameInfo,
    pub report: ContentReport,
}

pub fn load_game_info(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<LoadedContent, ContentLoadError> {
    let sources = discover_mod_sources(app_paths, request)?;
    let report_path = content_report_path(&app_paths.cache_dir);
    let previous = read_content_report(&report_path);

    let mut mods = Vec::with_capacity(sources.len());
    for source in &sources {
        let input = hash_mod_xml_inputs(&source.source_dir)?;
        let changed = previous
            .as_ref()
            .and_then(|report| report.mod_input_hash(&source.mod_id))
            .map_or(true, |hash| hash != input.hash_hex);
        info!(
            mod_id = %source.mod_id,
            mod_load_index = source.mod_load_index,
            xml_file_count = input.xml_file_count,
            input_hash = %input.hash_hex,
            changed,
            "content_source_loaded"
        );
        mods.push(ModReport {
            mod_id: source.mod_id.clone(),
            mod_load_index: source.mod_load_index,
            xml_file_count: input.xml_file_count,
            input_hash_sha256_hex: input.hash_hex,
        });
    }

    let game_info = compile_sources(&sources)?;
    let mod_ids = sources
        .iter()
        .map(|source| source.mod_id.clone())
        .collect::<Vec<_>>();
    let report = ContentReport {
        format_version: CONTENT_REPORT_FORMAT_VERSION,
        enabled_mods_hash_sha256_hex: hash_enabled_mods_list(&mod_ids),
        mods,
        tables: game_info.table_sizes(),
    };

    if let Err(error) = write_content_report(&report_path, &report) {
        warn!(
            path = %report_path.display(),
            error = %error,
            "content_report_write_failed"
        );
    }
    info!(status = %report.status_label(), "content_loaded");

    Ok(LoadedContent { game_info, report })
}
