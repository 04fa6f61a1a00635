use std::process::ExitCode;

use hud_engine::{
    build_overlay_lines, load_game_info, run_loop, LoopSummary, MetricsHandle, OverlayData,
    ViewHost,
};
use tracing::{error, info, warn};

use super::bootstrap::{AppError, AppWiring};
use super::events::GameEvent;
use super::model::MatchState;
use super::scenario::load_scenario;
use super::views::{CityBanners, SubSystemDock, YieldsLens};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_match(app) {
        Ok(summary) => {
            if !summary.completed {
                warn!(frames = summary.frames, "scenario_not_drained");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_match(app: AppWiring) -> Result<LoopSummary, AppError> {
    let content = load_game_info(&app.paths, &app.content_request)?;
    let scenario = load_scenario(&app.scenario_path)?;
    let (mut state, mut driver) = scenario.into_parts();
    state.set_game_info(content.game_info);

    let mut host: ViewHost<MatchState, GameEvent> = ViewHost::new();
    host.attach(Box::new(YieldsLens::default()), &state);
    let banners = host.attach(Box::new(CityBanners::new()), &state);
    let dock = host.attach(Box::new(SubSystemDock::new()), &state);

    let metrics = MetricsHandle::default();
    let summary = run_loop(&app.config, &mut host, &mut state, &mut driver, &metrics);

    let dialogs = host
        .with_view_mut::<SubSystemDock, _>(dock, &state, |dock, _| dock.take_dialogs())
        .unwrap_or_default();
    for dialog in dialogs {
        info!(title = dialog.title, body = dialog.body, "dialog_raised");
    }
    let screens = host
        .with_view_mut::<SubSystemDock, _>(dock, &state, |dock, _| dock.take_screens())
        .unwrap_or_default();
    for screen in screens {
        info!(screen, "screen_requested");
    }
    let actions = host
        .with_view_mut::<CityBanners, _>(banners, &state, |banners, _| banners.take_actions())
        .unwrap_or_default();
    for action in actions {
        info!(?action, "banner_action_raised");
    }

    let overlay = build_overlay_lines(&OverlayData {
        metrics: metrics.snapshot(),
        frame: summary.frames,
        target_fps: app.config.target_fps,
        content_status: content.report.status_label(),
        views: host.overlay_views(),
    });
    for line in overlay.iter().filter(|line| !line.is_empty()) {
        info!("{line}");
    }

    info!(
        frames = summary.frames,
        events = summary.events,
        deferred_events = summary.deferred_events,
        recomputes = summary.totals.report.keys,
        applied = summary.totals.report.applied,
        failed = summary.totals.report.failed,
        rejected_patches = driver.rejected_patches(),
        "match_hud_finished"
    );
    Ok(summary)
}
