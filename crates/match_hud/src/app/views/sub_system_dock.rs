use std::any::Any;

use hud_engine::{
    ElementTable, FlushReport, GameInfo, Recompute, Redraw, RedrawScheduler, SyncPoint, View,
    ViewContext,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::app::events::{GameEvent, YIELD_CULTURE, YIELD_SCIENCE};
use crate::app::model::{
    ActiveNode, MatchModel, PlayerRecord, ProgressionRecord, AGE_ANTIQUITY, AGE_EXPLORATION,
    AGE_MODERN,
};

const MYSTICISM_NODE: &str = "NODE_CIVIC_AQ_MAIN_MYSTICISM";
const COUNTER_HIDDEN_CLASS: &str = "ssb-button__turn-counter--hidden";
const CELEBRATION_COLOR: &str = "orange";

const SUBSCRIPTIONS: &[&str] = &[
    "PlayerTurnActivated",
    "ScienceYieldChanged",
    "TechTreeChanged",
    "TechNodeCompleted",
    "CultureYieldChanged",
    "CultureTreeChanged",
    "CultureNodeCompleted",
    "PlayerYieldChanged",
    "PlayerYieldGranted",
    "AgeProgressionChanged",
    "ResourceAssigned",
    "PlotOwnershipChanged",
    "FocusSubSystem",
    "SubSystemButtonPressed",
];

const ALL_SLOTS: [DockSlot; 5] = [
    DockSlot::Age,
    DockSlot::Tech,
    DockSlot::Culture,
    DockSlot::Policies,
    DockSlot::Resources,
];

/// Dock areas that redraw from live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DockSlot {
    Age,
    Tech,
    Culture,
    Policies,
    Resources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum DockButton {
    Age,
    Tech,
    Culture,
    Policies,
    Resources,
    GreatWorks,
    Religion,
    Unlocks,
}

impl DockButton {
    fn tooltip(self) -> &'static str {
        match self {
            Self::Age => "Victory Progress",
            Self::Tech => "View Technology Tree",
            Self::Culture => "View Civics Tree",
            Self::Policies => "View Traditions",
            Self::Resources => "View Resource Allocation",
            Self::GreatWorks => "View Great Works",
            Self::Religion => "View Religion",
            Self::Unlocks => "View Unlocks",
        }
    }

    fn modifier_class(self) -> &'static str {
        match self {
            Self::Age => "ssb__button--age",
            Self::Tech => "ssb__button--tech",
            Self::Culture => "ssb__button--culture",
            Self::Policies => "ssb__button--gov",
            Self::Resources => "ssb__button--resources",
            Self::GreatWorks => "ssb__button--greatworks",
            Self::Religion => "ssb__button--religion",
            Self::Unlocks => "ssb__button--unlocks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DockPart {
    Button(DockButton),
    Ring(DockButton),
    TurnCounter(DockButton),
    Icon(DockButton),
    CelebrationCounter,
    ResourcesCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DockDialog {
    pub(crate) title: &'static str,
    pub(crate) body: &'static str,
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum DockError {
    #[error("no local player")]
    MissingLocalPlayer,
    #[error("local player has no {0} state")]
    MissingPlayerState(&'static str),
    #[error("religion is unavailable in {0}")]
    ReligionUnavailable(String),
}

/// Shortcut buttons for the empire subsystems, with live turn counters.
#[derive(Debug)]
pub(crate) struct SubSystemDock {
    slots: RedrawScheduler<DockSlot>,
    elements: ElementTable<DockPart>,
    buttons: Vec<DockButton>,
    dialogs: Vec<DockDialog>,
    screens: Vec<&'static str>,
    tech_focused: bool,
}

impl Default for SubSystemDock {
    fn default() -> Self {
        Self::new()
    }
}

impl SubSystemDock {
    pub(crate) fn new() -> Self {
        Self {
            slots: RedrawScheduler::new(SyncPoint::NextFrame),
            elements: ElementTable::new(),
            buttons: Vec::new(),
            dialogs: Vec::new(),
            screens: Vec::new(),
            tech_focused: false,
        }
    }

    pub(crate) fn take_dialogs(&mut self) -> Vec<DockDialog> {
        std::mem::take(&mut self.dialogs)
    }

    /// Screens requested by button presses since the last call.
    pub(crate) fn take_screens(&mut self) -> Vec<&'static str> {
        std::mem::take(&mut self.screens)
    }

    fn build_buttons(&mut self, age: &str) {
        self.buttons = vec![
            DockButton::Age,
            DockButton::Tech,
            DockButton::Culture,
            DockButton::Policies,
            DockButton::Resources,
            DockButton::GreatWorks,
        ];
        if age != AGE_MODERN {
            self.buttons.push(DockButton::Religion);
        }
        self.buttons.push(DockButton::Unlocks);

        for button in self.buttons.clone() {
            let element = self.elements.entry(DockPart::Button(button));
            element.add_class("ssb__button");
            element.add_class(button.modifier_class());
            element.set_attribute("data-tooltip-content", button.tooltip());
        }
        for ringed in [DockButton::Age, DockButton::Tech, DockButton::Culture] {
            let ring = self.elements.entry(DockPart::Ring(ringed));
            ring.set_attribute("min-value", "0");
            ring.set_attribute("max-value", "100");
        }
    }

    /// Screen to push when `button` is pressed.
    pub(crate) fn activate<M: MatchModel>(
        &self,
        model: &M,
        button: DockButton,
    ) -> Result<&'static str, DockError> {
        let screen = match button {
            DockButton::Age => "screen-victory-progress",
            DockButton::Tech => "screen-tech-tree-chooser",
            DockButton::Culture => "screen-culture-tree-chooser",
            DockButton::Policies => "screen-policies",
            DockButton::Resources => "screen-resource-allocation",
            DockButton::GreatWorks => "screen-great-works",
            DockButton::Unlocks => "screen-unlocks",
            DockButton::Religion => religion_screen(model)?,
        };
        debug!(?button, screen, "dock_button_activated");
        Ok(screen)
    }

    fn toggle_focus(&mut self) {
        self.tech_focused = !self.tech_focused;
        self.elements
            .entry(DockPart::Button(DockButton::Tech))
            .toggle_class("focused", self.tech_focused);
    }

    fn mark_all(&mut self, cx: &mut ViewContext<'_, impl MatchModel>) {
        for slot in ALL_SLOTS {
            self.slots.mark_dirty(slot, Redraw, cx.frames());
        }
    }

    fn refresh_slot<M: MatchModel>(
        &mut self,
        model: &M,
        slot: DockSlot,
    ) -> Result<Recompute, DockError> {
        if slot == DockSlot::Age {
            self.refresh_age(model);
            return Ok(Recompute::Applied);
        }
        let Some(player) = model.player(model.local_player()) else {
            // autoplay has no local player
            return Ok(Recompute::Skipped);
        };
        let info = model.game_info();
        match slot {
            DockSlot::Age => {}
            DockSlot::Tech => {
                if player.techs.is_none() {
                    error!("local_player_techs_missing");
                }
                self.refresh_progression(info, player.techs.as_ref(), ProgressionKind::Tech);
            }
            DockSlot::Culture => {
                if player.culture.is_none() {
                    error!("local_player_culture_missing");
                }
                self.refresh_progression(info, player.culture.as_ref(), ProgressionKind::Culture);
            }
            DockSlot::Policies => self.refresh_policies(player)?,
            DockSlot::Resources => {
                let resources = player
                    .resources
                    .as_ref()
                    .ok_or(DockError::MissingPlayerState("resources"))?;
                let count = self.elements.entry(DockPart::ResourcesCount);
                let display = if resources.resources_to_assign > 0 {
                    "flex"
                } else {
                    "none"
                };
                count.set_style("display", display);
                count.set_text(resources.resources_to_assign.to_string());
            }
        }
        Ok(Recompute::Applied)
    }

    fn refresh_age<M: MatchModel>(&mut self, model: &M) {
        let progress = model.age_progress();
        let tooltip = if model.max_turns() > 0 {
            format!("Turn {}/{}", model.turn(), model.max_turns())
        } else {
            let age_name = model
                .game_info()
                .lookup("Ages", model.age())
                .and_then(|row| row.name())
                .unwrap_or_default();
            format!("{age_name}: {}/{}", progress.current, progress.max)
        };
        self.elements
            .entry(DockPart::Ring(DockButton::Age))
            .set_attribute("data-tooltip-content", tooltip);
        self.update_victory_meter(progress.current, progress.max);
    }

    fn update_victory_meter(&mut self, current: u32, max: u32) {
        let ring = self.elements.entry(DockPart::Ring(DockButton::Age));
        ring.set_attribute("min-value", "0");
        ring.set_attribute("max-value", max.to_string());
        ring.set_attribute("value", current.to_string());
        let percent = if max == 0 {
            0
        } else {
            (f64::from(current) / f64::from(max) * 100.0).round() as i64
        };
        self.update_turn_counter(DockButton::Age, &format!("{percent}%"));
    }

    fn update_turn_counter(&mut self, button: DockButton, turns: &str) {
        let counter = self.elements.entry(DockPart::TurnCounter(button));
        counter.set_text(turns);
        counter.toggle_class(COUNTER_HIDDEN_CLASS, turns.is_empty() || turns == "0");
    }

    fn refresh_progression(
        &mut self,
        info: &GameInfo,
        record: Option<&ProgressionRecord>,
        kind: ProgressionKind,
    ) {
        let button = kind.button();
        let active = record
            .and_then(|record| record.active_node.as_ref())
            .and_then(|node| {
                info.lookup("ProgressionTreeNodes", &node.node_type)
                    .map(|row| (node, row.name().unwrap_or(row.type_name.as_str()).to_string()))
            });

        let (turns, tooltip, ring_value) = match active {
            Some((node, base_name)) => {
                let name = node_display_name(&base_name, node);
                let icon = self.elements.entry(DockPart::Icon(button));
                icon.set_style("background-image", format!("url('icon:{}')", node.node_type));
                (
                    node.turns_left,
                    kind.current_tooltip(&name, node.turns_left),
                    progress_ring_value(node),
                )
            }
            None => {
                self.elements
                    .entry(DockPart::Icon(button))
                    .remove_style("background-image");
                (0, kind.idle_tooltip().to_string(), 0.0)
            }
        };

        self.update_turn_counter(button, &turns.to_string());
        self.elements
            .entry(DockPart::Button(button))
            .set_attribute("data-tooltip-content", tooltip);
        self.elements
            .entry(DockPart::Ring(button))
            .set_attribute("value", ring_value.to_string());
    }

    fn refresh_policies(&mut self, player: &PlayerRecord) -> Result<(), DockError> {
        let happiness = player
            .happiness
            .as_ref()
            .ok_or(DockError::MissingPlayerState("happiness"))?;
        let stats = player
            .stats
            .as_ref()
            .ok_or(DockError::MissingPlayerState("stats"))?;

        let (tooltip, counter, color) = if happiness.in_golden_age {
            let turns = happiness.golden_age_turns_left;
            (
                format!("Celebration ends in {turns} turns"),
                turns.to_string(),
                Some(CELEBRATION_COLOR),
            )
        } else {
            let per_turn = stats.net_happiness_per_turn.unwrap_or(-1.0);
            match turns_until_celebration(
                happiness.next_golden_age_threshold,
                stats.lifetime_happiness,
                per_turn,
            ) {
                Some(turns) => (
                    format!("Celebration begins in {turns} turns"),
                    turns.to_string(),
                    None,
                ),
                None => ("No celebration in sight".to_string(), String::new(), None),
            }
        };

        self.elements
            .entry(DockPart::Button(DockButton::Policies))
            .set_attribute("data-tooltip-content", tooltip);
        let celebration = self.elements.entry(DockPart::CelebrationCounter);
        celebration.set_text(counter);
        match color {
            Some(color) => celebration.set_style("color", color),
            None => celebration.remove_style("color"),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ProgressionKind {
    Tech,
    Culture,
}

impl ProgressionKind {
    fn button(self) -> DockButton {
        match self {
            Self::Tech => DockButton::Tech,
            Self::Culture => DockButton::Culture,
        }
    }

    fn current_tooltip(self, name: &str, turns: i32) -> String {
        match self {
            Self::Tech => format!("Researching {name}: {turns} turns"),
            Self::Culture => format!("Studying {name}: {turns} turns"),
        }
    }

    fn idle_tooltip(self) -> &'static str {
        match self {
            Self::Tech => "No technology being researched",
            Self::Culture => "No civic being studied",
        }
    }
}

fn node_display_name(base: &str, node: &ActiveNode) -> String {
    if node.depth_unlocked >= 1 {
        let numeral = roman_numeral(node.depth_unlocked + 1);
        if !numeral.is_empty() {
            return format!("{base} {numeral}");
        }
    }
    base.to_string()
}

fn progress_ring_value(node: &ActiveNode) -> f32 {
    if node.cost <= 0.0 {
        return 0.0;
    }
    let remaining = 1.0 - node.progress / node.cost;
    100.0 - remaining * 100.0
}

/// Turns until the next celebration, or `None` when the rate never gets
/// there in finite time.
pub(crate) fn turns_until_celebration(threshold: f64, lifetime: f64, per_turn: f64) -> Option<i64> {
    let turns = ((threshold - lifetime.ceil()) / per_turn).ceil();
    turns.is_finite().then_some(turns as i64)
}

pub(crate) fn roman_numeral(mut value: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (step, glyph) in TABLE {
        while value >= step {
            out.push_str(glyph);
            value -= step;
        }
    }
    out
}

fn religion_screen<M: MatchModel>(model: &M) -> Result<&'static str, DockError> {
    let age = model.age();
    if age != AGE_ANTIQUITY && age != AGE_EXPLORATION {
        error!(age, "religion_button_outside_religion_ages");
        return Err(DockError::ReligionUnavailable(age.to_string()));
    }
    let player = model
        .player(model.local_player())
        .ok_or(DockError::MissingLocalPlayer)?;
    let religion = player
        .religion
        .as_ref()
        .ok_or(DockError::MissingPlayerState("religion"))?;

    if age == AGE_ANTIQUITY {
        let culture = player
            .culture
            .as_ref()
            .ok_or(DockError::MissingPlayerState("culture"))?;
        if culture.is_node_unlocked(MYSTICISM_NODE) && religion.pantheons_to_add > 0 {
            return Ok("screen-pantheon-chooser");
        }
        return Ok("panel-pantheon-complete");
    }
    if religion.can_create_religion && !religion.has_created_religion {
        Ok("panel-religion-picker")
    } else {
        Ok("panel-belief-picker")
    }
}

#[cfg(test)]
impl SubSystemDock {
    pub(crate) fn buttons(&self) -> &[DockButton] {
        &self.buttons
    }

    pub(crate) fn element(&self, part: DockPart) -> Option<&hud_engine::Element> {
        self.elements.get(part)
    }

    pub(crate) fn is_pending(&self, slot: DockSlot) -> bool {
        self.slots.is_dirty(&slot)
    }

    pub(crate) fn is_tech_focused(&self) -> bool {
        self.tech_focused
    }
}

impl<M: MatchModel> View<M, GameEvent> for SubSystemDock {
    fn name(&self) -> &'static str {
        "sub_system_dock"
    }

    fn subscriptions(&self) -> &'static [&'static str] {
        SUBSCRIPTIONS
    }

    fn attach(&mut self, cx: &mut ViewContext<'_, M>) {
        let model = cx.model();
        self.build_buttons(model.age());
        for slot in ALL_SLOTS {
            if let Err(err) = self.refresh_slot(model, slot) {
                error!(?slot, error = %err, "dock_slot_refresh_failed");
            }
        }
        info!(buttons = self.buttons.len(), "sub_system_dock_attached");
    }

    fn handle_event(&mut self, event: &GameEvent, cx: &mut ViewContext<'_, M>) {
        let local = cx.model().local_player();
        if event.player().is_some_and(|player| player != local) {
            return;
        }
        let slot = match event {
            GameEvent::PlayerTurnActivated { .. } => {
                self.mark_all(cx);
                return;
            }
            GameEvent::ScienceYieldChanged { .. }
            | GameEvent::TechTreeChanged { .. }
            | GameEvent::TechNodeCompleted { .. } => DockSlot::Tech,
            GameEvent::CultureYieldChanged { .. }
            | GameEvent::CultureTreeChanged { .. }
            | GameEvent::CultureNodeCompleted { .. } => DockSlot::Culture,
            GameEvent::PlayerYieldChanged { yield_type, .. }
            | GameEvent::PlayerYieldGranted { yield_type, .. } => match yield_type.as_str() {
                YIELD_CULTURE => DockSlot::Culture,
                YIELD_SCIENCE => DockSlot::Tech,
                _ => return,
            },
            GameEvent::ResourceAssigned { .. } | GameEvent::PlotOwnershipChanged { .. } => {
                DockSlot::Resources
            }
            GameEvent::AgeProgressionChanged {
                progression_total,
                age_is_ending,
            } => {
                let max = cx.model().age_progress().max;
                self.update_victory_meter(*progression_total, max);
                if local.is_valid() && age_is_ending.unwrap_or(false) {
                    self.dialogs.push(DockDialog {
                        title: "Game Ending Soon",
                        body: "The age is about to end.",
                    });
                    info!("age_ending_dialog_queued");
                }
                return;
            }
            GameEvent::FocusSubSystem => {
                self.toggle_focus();
                return;
            }
            GameEvent::SubSystemButtonPressed { button } => {
                if !self.buttons.contains(button) {
                    warn!(?button, "dock_button_not_shown");
                    return;
                }
                match self.activate(cx.model(), *button) {
                    Ok(screen) => self.screens.push(screen),
                    Err(err) => warn!(?button, error = %err, "dock_button_rejected"),
                }
                return;
            }
            _ => return,
        };
        self.slots.mark_dirty(slot, Redraw, cx.frames());
    }

    fn flush(&mut self, _point: SyncPoint, cx: &mut ViewContext<'_, M>) -> FlushReport {
        let model = cx.model();
        let batch = self.slots.take_batch();
        batch.run(|slot, _| self.refresh_slot(model, slot))
    }

    fn debug_lines(&self) -> Vec<String> {
        vec![format!(
            "buttons={} dirty={} dialogs={} screens={}",
            self.buttons.len(),
            self.slots.dirty_len(),
            self.dialogs.len(),
            self.screens.len()
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
