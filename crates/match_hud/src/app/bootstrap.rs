use std::env;
use std::path::{Path, PathBuf};

use hud_engine::{
    resolve_app_paths, AppPaths, ContentLoadError, ContentRequest, LoopConfig, StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::scenario::ScenarioError;

const ENABLED_MODS_ENV_VAR: &str = "MATCHHUD_ENABLED_MODS";
const SCENARIO_ENV_VAR: &str = "MATCHHUD_SCENARIO";
const DEFAULT_SCENARIO_FILE: &str = "demo.json";

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentLoadError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) paths: AppPaths,
    pub(crate) content_request: ContentRequest,
    pub(crate) scenario_path: PathBuf,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Match HUD Startup ===");

    let paths = resolve_app_paths()?;
    let scenario_path = resolve_scenario_path(&paths, env::var(SCENARIO_ENV_VAR).ok());
    let content_request = ContentRequest {
        enabled_mods: parse_enabled_mods(env::var(ENABLED_MODS_ENV_VAR).ok().as_deref()),
    };
    info!(
        root = %paths.root.display(),
        scenario = %scenario_path.display(),
        enabled_mods = content_request.enabled_mods.len(),
        "app_configured"
    );

    Ok(AppWiring {
        config: LoopConfig::default(),
        paths,
        content_request,
        scenario_path,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_enabled_mods(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    })
    .unwrap_or_default()
}

fn resolve_scenario_path(paths: &AppPaths, raw: Option<String>) -> PathBuf {
    match raw.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => {
            let candidate = PathBuf::from(value);
            if candidate.is_absolute() {
                candidate
            } else {
                paths.root.join(candidate)
            }
        }
        _ => default_scenario_path(&paths.scenarios_dir),
    }
}

fn default_scenario_path(scenarios_dir: &Path) -> PathBuf {
    scenarios_dir.join(DEFAULT_SCENARIO_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> AppPaths {
        AppPaths::under(Path::new("/srv/match-hud"))
    }

    #[test]
    fn enabled_mods_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_enabled_mods(Some(" banners_plus , ,lens_tweaks,")),
            vec!["banners_plus".to_string(), "lens_tweaks".to_string()]
        );
        assert!(parse_enabled_mods(None).is_empty());
    }

    #[test]
    fn scenario_path_defaults_to_demo() {
        let paths = paths();
        assert_eq!(
            resolve_scenario_path(&paths, None),
            paths.scenarios_dir.join("demo.json")
        );
        assert_eq!(
            resolve_scenario_path(&paths, Some("   ".to_string())),
            paths.scenarios_dir.join("demo.json")
        );
    }

    #[test]
    fn relative_scenario_paths_resolve_against_root() {
        let paths = paths();
        assert_eq!(
            resolve_scenario_path(&paths, Some("tests/siege.json".to_string())),
            paths.root.join("tests/siege.json")
        );
        assert_eq!(
            resolve_scenario_path(&paths, Some("/tmp/other.json".to_string())),
            PathBuf::from("/tmp/other.json")
        );
    }
}
