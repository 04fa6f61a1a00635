mod overlay;
mod perf_stats;

pub use overlay::{build_overlay_lines, OverlayData};
pub use perf_stats::{PerfStats, PerfStatsSnapshot, RollingMsStats};
