mod change;
mod deferred;
mod events;
mod host;
mod loop_runner;
mod metrics;
mod scheduler;
mod surface;
mod tools;

pub use change::{needs_refresh, ChangeDetector, ObservedSnapshot};
pub use deferred::{DeferredQueue, FrameRequester, ScheduledFlush, SyncPoint, ViewId};
pub use events::{EventBus, HostEvent};
pub use host::{DispatchReport, HostTotals, View, ViewContext, ViewHost, ViewOverlay};
pub use loop_runner::{
    run_loop, DriverStatus, FrameDriver, LoopConfig, LoopSummary, MAX_FRAMES_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scheduler::{
    Coalesce, DirtyBatch, EntityRegistry, FlushReport, Recompute, RedrawScheduler, Redraw,
    SchedulerStats,
};
pub use surface::{
    AnchorHandle, Element, ElementTable, FontSpec, GridCoord, SpriteGrid, SpriteItem, Vec3,
    WorldAnchor, WorldAnchors,
};
pub use tools::{build_overlay_lines, OverlayData, PerfStatsSnapshot, RollingMsStats};
