use std::any::Any;
use std::collections::BTreeMap;

use hud_engine::{
    ChangeDetector, EntityRegistry, FlushReport, FontSpec, GridCoord, ObservedSnapshot, Recompute,
    Redraw, SpriteGrid, SyncPoint, Vec3, View, ViewContext,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::events::GameEvent;
use crate::app::model::{MatchModel, RevealedState};

pub(crate) const YIELDS_LAYER_NAME: &str = "fxs-yields-layer";
pub(crate) const TOGGLE_YIELDS_HOTKEY: &str = "toggle-yields-layer";
pub(crate) const YIELDS_SPRITE_GROUP: &str = "AllYields_SpriteGroup";
const YIELD_ICON_TIERS: i32 = 5;
// Never registered, so off-grid marks flush as skipped.
const OFF_GRID_PLOT: i64 = -1;

const SUBSCRIPTIONS: &[&str] = &[
    "PlotVisibilityChanged",
    "PlotYieldChanged",
    "ConstructibleAddedToMap",
    "ConstructibleRemovedFromMap",
    "GameCoreEventPlaybackComplete",
    "LayerHotkey",
];

#[cfg(test)]
pub(crate) type PlotSnapshot = ObservedSnapshot<RevealedState, String, i32>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct YieldsLensConfig {
    pub(crate) sprite_padding: f32,
    pub(crate) sprite_height: f32,
    pub(crate) improved_scale: f32,
    pub(crate) unimproved_scale: f32,
    pub(crate) label_font: FontSpec,
}

impl Default for YieldsLensConfig {
    fn default() -> Self {
        Self {
            sprite_padding: 12.0,
            sprite_height: 2.0,
            improved_scale: 1.0,
            unimproved_scale: 0.66,
            label_font: FontSpec {
                font: "TitleFont".to_string(),
                size: 5.0,
                face_camera: true,
            },
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum LensError {
    #[error("plot {index} at ({x}, {y}) has no revealed state")]
    MissingRevealedState { index: i64, x: i32, y: i32 },
    #[error("plot key {0} does not fit a sprite grid index")]
    InvalidPlotKey(i64),
}

#[derive(Debug, Clone)]
struct PlotState {
    location: GridCoord,
    detector: ChangeDetector<RevealedState, String, i32>,
}

/// Map layer that draws per-plot yield icons, refreshed once per simulation
/// batch for the plots that reported a change.
#[derive(Debug)]
pub(crate) struct YieldsLens {
    config: YieldsLensConfig,
    icons: BTreeMap<String, Vec<String>>,
    plots: EntityRegistry<i64, PlotState>,
    sprites: SpriteGrid,
    active: bool,
}

impl YieldsLens {
    pub(crate) fn new(config: YieldsLensConfig) -> Self {
        Self {
            config,
            icons: BTreeMap::new(),
            plots: EntityRegistry::new(SyncPoint::BatchComplete),
            sprites: SpriteGrid::new(YIELDS_SPRITE_GROUP),
            active: false,
        }
    }

    /// Recomputes every plot and shows the sprite group.
    pub(crate) fn apply_layer<M: MatchModel>(&mut self, model: &M) -> FlushReport {
        let report = self.refresh_layer(model);
        self.sprites.set_visible(true);
        self.active = true;
        info!(layer = YIELDS_LAYER_NAME, applied = report.applied, "lens_layer_applied");
        report
    }

    pub(crate) fn remove_layer(&mut self) {
        self.sprites.set_visible(false);
        self.active = false;
        info!(layer = YIELDS_LAYER_NAME, "lens_layer_removed");
    }

    pub(crate) fn toggle<M: MatchModel>(&mut self, model: &M) -> bool {
        if self.active {
            self.remove_layer();
        } else {
            self.apply_layer(model);
        }
        self.active
    }

    fn refresh_layer<M: MatchModel>(&mut self, model: &M) -> FlushReport {
        let Self {
            config,
            icons,
            plots,
            sprites,
            ..
        } = self;
        let mut report = FlushReport::default();
        for (index, state) in plots.iter_mut() {
            match refresh_plot(model, config, icons, sprites, *index, state) {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    report.keys = report.keys.saturating_add(1);
                    report.failed = report.failed.saturating_add(1);
                    warn!(plot = index, error = %err, "plot_refresh_failed");
                }
            }
        }
        report
    }

    fn cache_icons<M: MatchModel>(&mut self, model: &M) {
        self.icons.clear();
        let Some(yields) = model.game_info().table("Yields") else {
            return;
        };
        for row in yields.rows() {
            let tiers = (1..=YIELD_ICON_TIERS)
                .map(|tier| format!("{}_{tier}", row.type_name))
                .collect();
            self.icons.insert(row.type_name.clone(), tiers);
        }
    }
}

#[cfg(test)]
impl YieldsLens {
    pub(crate) fn sprites(&self) -> &SpriteGrid {
        &self.sprites
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn plot_snapshot(&self, index: i64) -> Option<&PlotSnapshot> {
        self.plots.get(&index).map(|state| state.detector.applied())
    }

    pub(crate) fn pending_plots(&self) -> usize {
        self.plots.scheduler().dirty_len()
    }
}

impl Default for YieldsLens {
    fn default() -> Self {
        Self::new(YieldsLensConfig::default())
    }
}

impl<M: MatchModel> View<M, GameEvent> for YieldsLens {
    fn name(&self) -> &'static str {
        "yields_lens"
    }

    fn subscriptions(&self) -> &'static [&'static str] {
        SUBSCRIPTIONS
    }

    fn attach(&mut self, cx: &mut ViewContext<'_, M>) {
        let model = cx.model();
        self.cache_icons(model);
        for index in 0..model.plot_count() {
            let Some(location) = model.location_from_index(index) else {
                continue;
            };
            self.plots.register(
                i64::from(index),
                PlotState {
                    location,
                    detector: ChangeDetector::new(ObservedSnapshot::new(RevealedState::Hidden)),
                },
            );
        }
        let report = self.refresh_layer(model);
        self.sprites.set_visible(false);
        info!(
            plots = self.plots.len(),
            yield_types = self.icons.len(),
            drawn = report.applied,
            "yields_lens_initialized"
        );
    }

    fn handle_event(&mut self, event: &GameEvent, cx: &mut ViewContext<'_, M>) {
        let location = match event {
            GameEvent::PlotVisibilityChanged { location, .. }
            | GameEvent::PlotYieldChanged { location }
            | GameEvent::ConstructibleAddedToMap { location }
            | GameEvent::ConstructibleRemovedFromMap { location } => *location,
            GameEvent::LayerHotkey { name } => {
                if name == TOGGLE_YIELDS_HOTKEY {
                    self.toggle(cx.model());
                }
                return;
            }
            _ => return,
        };
        let key = match cx.model().plot_index(location) {
            Some(index) => i64::from(index),
            None => {
                debug!(x = location.x, y = location.y, "plot_off_grid");
                OFF_GRID_PLOT
            }
        };
        self.plots.mark_dirty(key, Redraw, cx.frames());
    }

    fn flush(&mut self, _point: SyncPoint, cx: &mut ViewContext<'_, M>) -> FlushReport {
        let model = cx.model();
        let Self {
            config,
            icons,
            plots,
            sprites,
            ..
        } = self;
        let batch = plots.take_batch();
        batch.run(|key, _| {
            let Some(state) = plots.get_mut(&key) else {
                return Ok(Recompute::Skipped);
            };
            refresh_plot(model, config, icons, sprites, key, state)
        })
    }

    fn detach(&mut self) {
        self.plots.clear();
        self.sprites.set_visible(false);
        self.active = false;
    }

    fn debug_lines(&self) -> Vec<String> {
        vec![format!(
            "active={} plots={} drawn={} dirty={}",
            self.active,
            self.plots.len(),
            self.sprites.occupied_plots(),
            self.plots.scheduler().dirty_len()
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn refresh_plot<M: MatchModel>(
    model: &M,
    config: &YieldsLensConfig,
    icons: &BTreeMap<String, Vec<String>>,
    sprites: &mut SpriteGrid,
    index: i64,
    state: &mut PlotState,
) -> Result<Recompute, LensError> {
    let plot = u32::try_from(index).map_err(|_| LensError::InvalidPlotKey(index))?;
    let location = state.location;
    let revealed = model
        .revealed_state(model.local_player(), location)
        .ok_or(LensError::MissingRevealedState {
            index,
            x: location.x,
            y: location.y,
        })?;
    let constructibles = model.constructible_count(location);

    if revealed == RevealedState::Hidden {
        let was_hidden = state.detector.applied().visibility == RevealedState::Hidden;
        let mut hidden = ObservedSnapshot::new(RevealedState::Hidden);
        hidden.aux_count = constructibles;
        state.detector.reset(hidden);
        if was_hidden {
            return Ok(Recompute::Unchanged);
        }
        sprites.clear_plot(plot);
        return Ok(Recompute::Applied);
    }

    let yields = model.plot_yields(location, model.local_player());
    let fresh = ObservedSnapshot {
        visibility: revealed,
        amounts: yields.iter().cloned().collect(),
        aux_count: constructibles,
    };
    if !state.detector.observe(fresh) {
        return Ok(Recompute::Unchanged);
    }

    let scale = if constructibles > 0 {
        config.improved_scale
    } else {
        config.unimproved_scale
    };
    let spacing = config.sprite_padding * scale;
    let group_width = yields.len().saturating_sub(1) as f32 * spacing;
    let group_offset = group_width / 2.0 - group_width;

    sprites.clear_plot(plot);
    let mut slot = 0u32;
    for (yield_type, amount) in &yields {
        if model.game_info().lookup("Yields", yield_type).is_none() {
            continue;
        }
        let Some(tiers) = icons.get(yield_type) else {
            continue;
        };
        let Some(icon) = icon_tier(*amount).and_then(|tier| tiers.get(tier)) else {
            continue;
        };
        let position = Vec3::new(
            slot as f32 * spacing + group_offset,
            0.0,
            config.sprite_height,
        );
        sprites.add_sprite(plot, icon.as_str(), position, scale);
        if *amount >= YIELD_ICON_TIERS {
            sprites.add_text(plot, amount.to_string(), position, config.label_font.clone());
        }
        slot += 1;
    }
    Ok(Recompute::Applied)
}

/// Icon slot for a yield amount: one icon per amount up to four, then the
/// last icon with a number label. Non-positive amounts draw nothing.
fn icon_tier(amount: i32) -> Option<usize> {
    if amount < 1 {
        return None;
    }
    usize::try_from(amount.min(YIELD_ICON_TIERS) - 1).ok()
}
