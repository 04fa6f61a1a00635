use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub mod app;
pub mod content;

pub use app::{
    build_overlay_lines, needs_refresh, run_loop, AnchorHandle, ChangeDetector, Coalesce,
    DeferredQueue, DirtyBatch, DispatchReport, DriverStatus, Element, ElementTable,
    EntityRegistry, EventBus, FlushReport, FontSpec, FrameDriver, FrameRequester, GridCoord,
    HostEvent, HostTotals, LoopConfig, LoopMetricsSnapshot, LoopSummary, MetricsHandle,
    ObservedSnapshot, OverlayData, Recompute, RedrawScheduler, Redraw, ScheduledFlush,
    SchedulerStats, SpriteGrid, SpriteItem, SyncPoint, Vec3, View, ViewContext, ViewHost, ViewId,
    ViewOverlay, WorldAnchor, WorldAnchors, MAX_FRAMES_ENV_VAR,
};
pub use content::{
    compile_game_info, load_game_info, type_hash, ContentCompileError, ContentErrorCode,
    ContentLoadError, ContentReport, ContentRequest, DefRow, DefTable, DiscoveryError, GameInfo,
    LoadedContent, SourceLocation, TypeHash,
};

pub const ROOT_ENV_VAR: &str = "MATCHHUD_ROOT";

/// Directories the runtime reads from and writes to, all under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub scenarios_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    /// Standard layout below `root`. Nothing is created on disk.
    pub fn under(root: &Path) -> Self {
        let assets = root.join("assets");
        Self {
            root: root.to_path_buf(),
            base_content_dir: assets.join("base"),
            mods_dir: root.join("mods"),
            scenarios_dir: assets.join("scenarios"),
            cache_dir: root.join("cache"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{var} is not valid unicode: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("executable path {0} has no parent directory")]
    ExeHasNoParent(PathBuf),
    #[error("cannot create cache directory {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{var}={path} is not a match hud root (needs Cargo.toml and assets/base/)")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "no match hud root above {start_dir} (looked for Cargo.toml next to assets/base/); \
set {var} to the checkout directory"
    )]
    RootNotFound { start_dir: PathBuf, var: &'static str },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match root_from_env()? {
        Some(root) => root,
        None => root_above_executable()?,
    };
    let paths = AppPaths::under(&root);
    fs::create_dir_all(&paths.cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: paths.cache_dir.clone(),
        source,
    })?;
    debug!(root = %paths.root.display(), "app_root_resolved");
    Ok(paths)
}

fn root_from_env() -> Result<Option<PathBuf>, StartupError> {
    let raw = match env::var(ROOT_ENV_VAR) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };
    let path = canonical_or_raw(Path::new(raw.trim()));
    if looks_like_root(&path) {
        Ok(Some(path))
    } else {
        Err(StartupError::InvalidEnvRoot {
            var: ROOT_ENV_VAR,
            path,
        })
    }
}

fn root_above_executable() -> Result<PathBuf, StartupError> {
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let start = exe
        .parent()
        .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
    find_root_above(start).ok_or_else(|| StartupError::RootNotFound {
        start_dir: canonical_or_raw(start),
        var: ROOT_ENV_VAR,
    })
}

fn find_root_above(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| looks_like_root(candidate))
        .map(canonical_or_raw)
}

fn looks_like_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").join("base").is_dir()
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn make_root(dir: &Path) {
        fs::write(dir.join("Cargo.toml"), "[workspace]").expect("manifest");
        fs::create_dir_all(dir.join("assets").join("base")).expect("base");
    }

    #[test]
    fn root_needs_manifest_and_base_content() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]").expect("manifest");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(!looks_like_root(temp.path()));

        fs::create_dir_all(temp.path().join("assets").join("base")).expect("base");
        assert!(looks_like_root(temp.path()));
    }

    #[test]
    fn search_walks_up_from_nested_build_dirs() {
        let temp = TempDir::new().expect("temp");
        make_root(temp.path());
        let nested = temp.path().join("target").join("debug").join("deps");
        fs::create_dir_all(&nested).expect("nested");

        let found = find_root_above(&nested).expect("root");
        assert_eq!(found, canonical_or_raw(temp.path()));
    }

    #[test]
    fn search_gives_up_without_a_marker() {
        let temp = TempDir::new().expect("temp");
        let nested = temp.path().join("bin");
        fs::create_dir_all(&nested).expect("nested");
        assert!(find_root_above(&nested)
            .map_or(true, |root| !root.starts_with(temp.path())));
    }

    #[test]
    fn layout_places_scenarios_beside_base_content() {
        let paths = AppPaths::under(Path::new("/srv/hud"));
        assert_eq!(paths.base_content_dir, Path::new("/srv/hud/assets/base"));
        assert_eq!(paths.scenarios_dir, Path::new("/srv/hud/assets/scenarios"));
        assert_eq!(paths.mods_dir, Path::new("/srv/hud/mods"));
        assert_eq!(paths.cache_dir, Path::new("/srv/hud/cache"));
    }
}
