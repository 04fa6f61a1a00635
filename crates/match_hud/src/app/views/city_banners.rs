use std::any::Any;

use hud_engine::{
    AnchorHandle, Coalesce, Element, ElementTable, EntityRegistry, FlushReport, GameInfo,
    GridCoord, Recompute, SyncPoint, Vec3, View, ViewContext, WorldAnchors,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::app::events::{BannerInput, GameEvent};
use crate::app::model::{
    CityRecord, CityReligion, ComponentId, IndependentRelationship, MatchModel, PlayerId, PlayerRecord,
    ProductionKind, RevealedState,
};

const BANNER_ANCHOR_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 42.0);
const UNREADABLE_PRIMARY_COLOR: &str = "rgb(155, 0, 0)";
const DEFAULT_TRANSFER_UNREST_TURNS: i32 = 10;
const ANGRY_HAPPINESS_THRESHOLD: f32 = -10.0;

const SUBSCRIPTIONS: &[&str] = &[
    "CityAddedToMap",
    "CityRemovedFromMap",
    "CityNameChanged",
    "CityProductionChanged",
    "CityPopulationChanged",
    "CityYieldChanged",
    "CityReligionChanged",
    "PlotVisibilityChanged",
    "PlayerTurnActivated",
    "CityBannerInput",
    "BeforeUnload",
];

const VARIANT_CLASSES: &[&str] = &[
    "city-banner--town",
    "city-banner--city",
    "city-banner--city-other",
    "city-banner--citystate",
    "city-banner--village",
];

const INPUT_PARTS: &[BannerPart] = &[
    BannerPart::Container,
    BannerPart::ProductionQueue,
    BannerPart::Portrait,
];

/// How much of a banner a pending mark must redo. Coarser kinds include
/// the finer ones, so a pending `Full` absorbs later `Builds` marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum BannerRefresh {
    Visibility,
    Builds,
    Full,
}

impl Coalesce for BannerRefresh {
    fn coalesce(self, incoming: Self) -> Self {
        self.max(incoming)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BannerType {
    City,
    Town,
    CityState,
    Village,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum BannerPart {
    Root,
    Container,
    CapitalIndicator,
    CityStateIcon,
    CityName,
    Portrait,
    PortraitIcon,
    ProductionQueue,
    ProductionIcon,
    ProductionTurns,
    ProductionMeter,
    GrowthQueue,
    GrowthMeter,
    GrowthTurns,
    PopCount,
    StatusIcon,
    UnrestTurns,
    RazedTurns,
    UrbanReligion,
    RuralReligion,
    RuralReligionBackground,
    CivPattern,
    CivSymbol,
    ConqueredIcon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CityStatus {
    Happy,
    Unhappy,
    Angry,
    Plague,
}

impl CityStatus {
    fn from_city(happiness: f32, infected: bool) -> Self {
        if infected {
            Self::Plague
        } else if happiness < ANGRY_HAPPINESS_THRESHOLD {
            Self::Angry
        } else if happiness < 0.0 {
            Self::Unhappy
        } else {
            Self::Happy
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Self::Happy => "CITY_STATUS_HAPPY",
            Self::Unhappy => "CITY_STATUS_UNHAPPY",
            Self::Angry => "CITY_STATUS_ANGRY",
            Self::Plague => "CITY_STATUS_PLAGUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BannerAction {
    SelectCity(ComponentId),
    OpenDiplomacy(PlayerId),
    Ignore,
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum RegisterError {
    #[error("city banner cannot track invalid component id {0}")]
    InvalidId(ComponentId),
    #[error("city banner for {0} has no location and no city to take one from")]
    NoLocation(ComponentId),
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum BannerError {
    #[error("unable to build banner {id}: no player {owner}")]
    MissingPlayer { id: ComponentId, owner: PlayerId },
}

struct CityStateStyle {
    color: &'static str,
    icon: &'static str,
    yield_type: Option<&'static str>,
}

fn city_state_style(kind: Option<&str>) -> CityStateStyle {
    match kind {
        Some("MILITARISTIC") => CityStateStyle {
            color: "#AF1B1C",
            icon: "url('fs://game/bonustype_militaristic.png')",
            yield_type: None,
        },
        Some("SCIENTIFIC") => CityStateStyle {
            color: "#4D7C96",
            icon: "url('fs://game/bonustype_scientific.png')",
            yield_type: Some("YIELD_SCIENCE"),
        },
        Some("ECONOMIC") => CityStateStyle {
            color: "#FFD553",
            icon: "url('fs://game/bonustype_economic.png')",
            yield_type: Some("YIELD_GOLD"),
        },
        Some("CULTURAL") => CityStateStyle {
            color: "#892BB3",
            icon: "url('fs://game/bonustype_cultural.png')",
            yield_type: Some("YIELD_CULTURE"),
        },
        _ => CityStateStyle {
            color: "",
            icon: "",
            yield_type: None,
        },
    }
}

fn icon_url(id: &str) -> String {
    format!("url('icon:{id}')")
}

#[derive(Debug)]
pub(crate) struct CityBanner {
    id: ComponentId,
    location: GridCoord,
    anchor: AnchorHandle,
    manually_hidden: bool,
    // Fixed at registration: a banner placed without a city behind it.
    village: bool,
    banner_type: Option<BannerType>,
    elements: ElementTable<BannerPart>,
}

#[cfg(test)]
impl CityBanner {
    pub(crate) fn location(&self) -> GridCoord {
        self.location
    }

    pub(crate) fn anchor(&self) -> AnchorHandle {
        self.anchor
    }

    pub(crate) fn banner_type(&self) -> Option<BannerType> {
        self.banner_type
    }
}

impl CityBanner {
    pub(crate) fn element(&self, part: BannerPart) -> Option<&Element> {
        self.elements.get(part)
    }

    pub(crate) fn root_has_class(&self, class: &str) -> bool {
        self.element(BannerPart::Root)
            .is_some_and(|root| root.has_class(class))
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.root_has_class("disabled")
    }

    pub(crate) fn writes(&self) -> u64 {
        self.elements.writes()
    }

    fn part(&mut self, part: BannerPart) -> &mut Element {
        self.elements.entry(part)
    }

    fn set_visibility(&mut self, state: RevealedState) {
        if self.manually_hidden {
            return;
        }
        let hidden = state == RevealedState::Hidden;
        self.part(BannerPart::Root).toggle_class("hidden", hidden);
    }

    fn refresh_visibility<M: MatchModel>(&mut self, model: &M) {
        let state = model
            .revealed_state(model.local_observer(), self.location)
            .unwrap_or_default();
        self.set_visibility(state);
    }

    fn rebuild<M: MatchModel>(&mut self, model: &M) -> Result<(), BannerError> {
        let owner = self.id.owner;
        let player = model.player(owner).ok_or(BannerError::MissingPlayer {
            id: self.id,
            owner,
        })?;
        let info = model.game_info();
        let city = model.city(self.id);
        let banner_type = match city {
            None => BannerType::Village,
            Some(_) if player.is_minor => BannerType::CityState,
            Some(city) if city.is_town => BannerType::Town,
            Some(_) => BannerType::City,
        };

        let mut bonus_name = None;
        let civ_symbol = if matches!(banner_type, BannerType::CityState | BannerType::Village) {
            if let Some(bonus) = player.city_state_bonus.as_deref() {
                match info.lookup("CityStateBonuses", bonus) {
                    Some(row) => bonus_name = row.name().map(ToString::to_string),
                    None => error!(banner = %self.id, bonus, "city_state_bonus_definition_missing"),
                }
            }
            let style = city_state_style(independent_kind(info, player).as_deref());
            let city_state_icon = self.part(BannerPart::CityStateIcon);
            city_state_icon.set_style("background-image", style.icon);
            city_state_icon.set_style("fxs-background-image-tint", style.color);
            match style.yield_type {
                Some(yield_type) => icon_url(yield_type),
                None => "url('fs://game/Action_Attack.png')".to_string(),
            }
        } else {
            icon_url(&player.civilization_type)
        };

        let mut portrait = format!("icon:{}", player.leader_type);
        let mut leader_name = info
            .lookup("Leaders", &player.leader_type)
            .and_then(|row| row.name())
            .unwrap_or("Unknown Leader")
            .to_string();
        let civ_name = model.owner_name(self.location).unwrap_or_default();
        let independent_owner = matches!(banner_type, BannerType::Town | BannerType::City)
            && player.is_independent;
        if banner_type == BannerType::Village || independent_owner {
            leader_name = player.name.clone();
        }

        let tooltip = match player.suzerain.filter(|_| player.is_minor) {
            Some(suzerain) => {
                let mut tooltip = String::new();
                if let Some(suzerain) = model.player(suzerain) {
                    portrait = format!("icon:{}", suzerain.leader_type);
                    tooltip = format!("<div>{}</div><div>{civ_name}</div>", suzerain.name);
                }
                if let Some(bonus) = &bonus_name {
                    tooltip.push_str(&format!("<div>{bonus}</div>"));
                }
                self.update_affinity(model);
                tooltip
            }
            None => format!("<div>{leader_name}</div><div>{civ_name}</div>"),
        };

        let name = city.map_or_else(
            || player.civilization_full_name.clone(),
            |city| city.name.clone(),
        );
        self.set_city_info(model, player, city, &name, &portrait, &tooltip, banner_type);
        self.banner_type = Some(banner_type);

        if let Some(city) = city {
            self.set_population(city);
            self.realize_builds(info, city);
            self.realize_happiness(model, info, city);
            self.realize_religion(info, city);
        }
        if banner_type == BannerType::Village {
            self.update_affinity(model);
        }
        self.realize_player_colors(player);
        self.realize_heraldry(player, &civ_symbol);
        self.update_conquered(model, city);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn set_city_info<M: MatchModel>(
        &mut self,
        model: &M,
        player: &PlayerRecord,
        city: Option<&CityRecord>,
        name: &str,
        portrait: &str,
        tooltip: &str,
        banner_type: BannerType,
    ) {
        self.part(BannerPart::CityName).set_text(name.to_uppercase());
        self.part(BannerPart::PortraitIcon)
            .set_style("background-image", format!("url('{portrait}')"));
        self.part(BannerPart::Portrait)
            .set_attribute("data-tooltip-content", tooltip);

        let local = self.id.owner == model.local_observer();
        let wanted: &[&str] = match banner_type {
            BannerType::Town => &["city-banner--town"],
            BannerType::CityState => &["city-banner--citystate"],
            BannerType::Village => &["city-banner--village", "city-banner--town"],
            BannerType::City if local => &["city-banner--city"],
            BannerType::City => &["city-banner--city-other"],
        };
        let root = self.part(BannerPart::Root);
        for class in VARIANT_CLASSES {
            root.toggle_class(class, wanted.contains(class));
        }
        let container_tooltip = match banner_type {
            BannerType::Town => "Town",
            _ => tooltip,
        };
        self.part(BannerPart::Container)
            .set_attribute("data-tooltip-content", container_tooltip);
        if let Some(city) = city.filter(|_| banner_type == BannerType::City) {
            let hide_star = !city.is_capital || player.is_independent;
            self.part(BannerPart::CapitalIndicator)
                .toggle_class("hidden", hide_star);
        }
    }

    fn set_population(&mut self, city: &CityRecord) {
        self.part(BannerPart::PopCount)
            .set_text(city.population.to_string());

        let mut tooltip = format!("Population {}", city.population);
        match &city.growth {
            Some(growth) => {
                let current = growth.current_food.round() as i64;
                let required = growth.next_growth_threshold.round() as i64;
                let net = city
                    .yields
                    .as_ref()
                    .map_or(0, |yields| yields.net_food.round() as i64);
                tooltip.push_str(&format!(
                    "\nFood {current}/{required} ({net:+})\n{} turns until growth",
                    growth.turns_until_growth
                ));
            }
            None => debug!(banner = %self.id, "city_growth_missing_for_tooltip"),
        }
        tooltip.push_str(&format!(
            "\nUrban population: {}\nRural population: {}",
            city.urban_population, city.rural_population
        ));
        self.part(BannerPart::GrowthQueue)
            .set_attribute("data-tooltip-content", tooltip);
    }

    fn realize_builds(&mut self, info: &GameInfo, city: &CityRecord) {
        match &city.build_queue {
            Some(queue) => {
                let production = self.part(BannerPart::ProductionQueue);
                match queue.current.as_deref().filter(|_| queue.turns_left > 0) {
                    Some(current) => {
                        production.remove_class("queue-none");
                        let table = match queue.kind {
                            ProductionKind::Unit => "Units",
                            ProductionKind::Constructible | ProductionKind::Project => {
                                "Constructibles"
                            }
                        };
                        match info.lookup(table, current).and_then(|row| row.name()) {
                            Some(name) => production.set_attribute(
                                "data-tooltip-content",
                                format!("<div>Production</div><div>{name}</div>"),
                            ),
                            None => error!(
                                banner = %self.id,
                                production = current,
                                "production_name_missing"
                            ),
                        }
                        let icon = self.part(BannerPart::ProductionIcon);
                        icon.set_style("background-image", icon_url(current));
                        icon.toggle_class(
                            "city-banner__queue-img--unit",
                            queue.kind == ProductionKind::Unit,
                        );
                    }
                    None => production.add_class("queue-none"),
                }
                self.part(BannerPart::ProductionTurns)
                    .set_text(queue.turns_left.to_string());
                self.part(BannerPart::ProductionMeter)
                    .set_attribute("value", queue.percent_complete.to_string());
            }
            None => error!(banner = %self.id, "city_build_queue_missing"),
        }

        match &city.growth {
            Some(growth) => {
                let meter = self.part(BannerPart::GrowthMeter);
                meter.set_attribute("value", growth.current_food.to_string());
                meter.set_attribute("max-value", growth.next_growth_threshold.to_string());
                let turns = self.part(BannerPart::GrowthTurns);
                if growth.turns_until_growth >= 0 {
                    turns.set_text(growth.turns_until_growth.to_string());
                    turns.remove_class("hidden");
                } else {
                    turns.add_class("hidden");
                }
            }
            None => error!(banner = %self.id, "city_growth_missing"),
        }
    }

    fn realize_happiness<M: MatchModel>(&mut self, model: &M, info: &GameInfo, city: &CityRecord) {
        let Some(happiness) = city.yields.as_ref().and_then(|yields| yields.happiness) else {
            error!(banner = %self.id, "city_happiness_yield_missing");
            return;
        };
        let status = CityStatus::from_city(happiness, city.is_infected);
        self.part(BannerPart::StatusIcon)
            .set_style("background-image", icon_url(status.icon()));
        let local = self.id.owner == model.local_observer();
        self.part(BannerPart::CityName)
            .toggle_class("city-banner__status--hidden", !local);

        if city.happiness.is_none() {
            error!(banner = %self.id, "city_happiness_missing");
        }
        let unrest = city.happiness.as_ref();
        self.part(BannerPart::Root).toggle_class(
            "city-banner--unrest",
            unrest.is_some_and(|happiness| happiness.has_unrest),
        );
        if let Some(turns) = unrest
            .and_then(|happiness| happiness.turns_of_unrest)
            .filter(|turns| *turns >= 0)
        {
            let remaining = (transfer_unrest_turns(info) - turns).max(0);
            self.part(BannerPart::UnrestTurns)
                .set_text(remaining.to_string());
        }

        self.part(BannerPart::Root)
            .toggle_class("city-banner--razing", city.is_being_razed);
        self.part(BannerPart::RazedTurns)
            .set_text(city.turns_until_razed.to_string());
    }

    fn realize_religion(&mut self, info: &GameInfo, city: &CityRecord) {
        let has_religion = city
            .religion
            .as_ref()
            .is_some_and(|religion| self.realize_religion_icons(info, religion));
        self.part(BannerPart::Root)
            .toggle_class("city-banner--has-religion", has_religion);
        self.part(BannerPart::CityName)
            .toggle_class("city-banner__icons-below-name", has_religion);
    }

    fn realize_religion_icons(&mut self, info: &GameInfo, religion: &CityReligion) -> bool {
        let known = |religion: Option<&String>| {
            religion
                .and_then(|religion| info.lookup("Religions", religion))
                .map(|row| icon_url(&row.type_name))
        };

        if let Some(icon) = known(religion.majority.as_ref()) {
            self.part(BannerPart::UrbanReligion)
                .set_style("background-image", icon.clone());
            self.part(BannerPart::RuralReligion)
                .set_style("background-image", icon);
            return true;
        }
        let mut shown = false;
        if let Some(icon) = known(religion.urban.as_ref()) {
            self.part(BannerPart::UrbanReligion)
                .set_style("background-image", icon);
            shown = true;
        }
        if let Some(icon) = known(religion.rural.as_ref()) {
            self.part(BannerPart::RuralReligion)
                .set_style("background-image", icon);
            self.part(BannerPart::RuralReligionBackground)
                .set_style("filter", "fxs-color-tint(red)");
            shown = true;
        }
        shown
    }

    fn update_affinity<M: MatchModel>(&mut self, model: &M) {
        let relationship = model.independent_relationship(self.id.owner, model.local_player());
        if relationship == IndependentRelationship::NotApplicable {
            warn!(banner = %self.id, "village_affinity_unknown");
            return;
        }
        let root = self.part(BannerPart::Root);
        root.toggle_class(
            "city-banner--friendly",
            relationship == IndependentRelationship::Friendly,
        );
        root.toggle_class(
            "city-banner--hostile",
            relationship == IndependentRelationship::Hostile,
        );
        root.toggle_class(
            "city-banner--neutral",
            relationship == IndependentRelationship::Neutral,
        );
    }

    fn realize_player_colors(&mut self, player: &PlayerRecord) {
        let primary = if player.primary_color == player.secondary_color {
            UNREADABLE_PRIMARY_COLOR
        } else {
            player.primary_color.as_str()
        };
        let root = self.part(BannerPart::Root);
        root.set_style("--player-color-primary", primary);
        root.set_style("--player-color-secondary", player.secondary_color.as_str());
        root.set_style("display", "flex");
    }

    fn realize_heraldry(&mut self, player: &PlayerRecord, civ_symbol: &str) {
        self.part(BannerPart::CivPattern).set_style(
            "background-image",
            icon_url(&format!("{}_PATTERN", player.civilization_type)),
        );
        self.part(BannerPart::CivSymbol)
            .set_style("background-image", civ_symbol);
    }

    fn update_conquered<M: MatchModel>(&mut self, model: &M, city: Option<&CityRecord>) {
        let conquered = city.is_some_and(|city| {
            city.original_owner() != city.owner() && city.owner() == model.local_observer()
        });
        if conquered {
            self.part(BannerPart::ConqueredIcon)
                .set_attribute("data-tooltip-content", "Conquered");
        }
        self.part(BannerPart::Root)
            .toggle_class("city-banner--conquered", conquered);
    }

    fn refresh<M: MatchModel>(
        &mut self,
        model: &M,
        update: BannerRefresh,
    ) -> Result<Recompute, BannerError> {
        let city = model.city(self.id);
        if city.is_none() && !self.village {
            debug!(banner = %self.id, kind = ?self.banner_type, ?update, "banner_city_gone");
            return Ok(Recompute::Skipped);
        }
        let before = self.writes();
        self.refresh_visibility(model);
        match (update, city) {
            (BannerRefresh::Visibility, _) | (BannerRefresh::Builds, None) => {}
            (BannerRefresh::Builds, Some(city)) => {
                let info = model.game_info();
                self.realize_builds(info, city);
                self.realize_happiness(model, info, city);
                self.realize_religion(info, city);
                self.set_population(city);
            }
            (BannerRefresh::Full, _) => self.rebuild(model)?,
        }
        if self.writes() == before {
            Ok(Recompute::Unchanged)
        } else {
            Ok(Recompute::Applied)
        }
    }
}

fn independent_kind(info: &GameInfo, player: &PlayerRecord) -> Option<String> {
    let mut kind = info
        .lookup("Civilizations", &player.civilization_type)
        .map(|row| row.type_name.clone());
    if let Some(independents) = info.table("Independents") {
        for row in independents.rows() {
            if row.attribute("CityStateName") == Some(player.civilization_adjective.as_str()) {
                kind = row.attribute("CityStateType").map(ToString::to_string);
            }
        }
    }
    kind
}

fn transfer_unrest_turns(info: &GameInfo) -> i32 {
    info.lookup("UnhappinessEffects", "StandardCityTransferUnrest")
        .and_then(|row| row.parse_attribute::<i32>("Amount"))
        .unwrap_or(DEFAULT_TRANSFER_UNREST_TURNS)
}

/// Screen-space status banners for every city, town, city-state and
/// village on the map.
#[derive(Debug)]
pub(crate) struct CityBanners {
    banners: EntityRegistry<ComponentId, CityBanner, BannerRefresh>,
    anchors: WorldAnchors,
    actions: Vec<BannerAction>,
}

impl Default for CityBanners {
    fn default() -> Self {
        Self::new()
    }
}

impl CityBanners {
    pub(crate) fn new() -> Self {
        Self {
            banners: EntityRegistry::new(SyncPoint::NextFrame),
            anchors: WorldAnchors::new(),
            actions: Vec::new(),
        }
    }

    /// Actions raised by banner clicks since the last call.
    pub(crate) fn take_actions(&mut self) -> Vec<BannerAction> {
        std::mem::take(&mut self.actions)
    }

    /// Starts tracking a banner and builds it immediately. `location` is
    /// taken from the city when not given.
    pub(crate) fn register<M: MatchModel>(
        &mut self,
        model: &M,
        id: ComponentId,
        location: Option<GridCoord>,
    ) -> Result<(), RegisterError> {
        if !id.is_valid() {
            return Err(RegisterError::InvalidId(id));
        }
        let location = location
            .or_else(|| model.city(id).map(|city| city.location))
            .ok_or(RegisterError::NoLocation(id))?;

        if let Some(previous) = self.banners.unregister(&id) {
            self.anchors.release(previous.anchor);
        }
        let mut banner = CityBanner {
            id,
            location,
            anchor: self.anchors.register_fixed(location, BANNER_ANCHOR_OFFSET),
            manually_hidden: false,
            village: model.city(id).is_none(),
            banner_type: None,
            elements: ElementTable::new(),
        };
        banner.refresh_visibility(model);
        if let Err(err) = banner.rebuild(model) {
            error!(banner = %id, error = %err, "banner_build_failed");
        }
        self.banners.register(id, banner);
        debug!(banner = %id, x = location.x, y = location.y, "banner_registered");
        Ok(())
    }

    pub(crate) fn unregister(&mut self, id: ComponentId) -> bool {
        match self.banners.unregister(&id) {
            Some(banner) => {
                self.anchors.release(banner.anchor);
                debug!(banner = %id, "banner_unregistered");
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.banners.clear();
        for (_, banner) in &removed {
            self.anchors.release(banner.anchor);
        }
        removed.len()
    }

    pub(crate) fn hide(&mut self, id: ComponentId) {
        if let Some(banner) = self.banners.get_mut(&id) {
            if banner.manually_hidden {
                return;
            }
            banner.manually_hidden = true;
            banner.part(BannerPart::Root).add_class("hidden");
        }
    }

    pub(crate) fn show<M: MatchModel>(&mut self, model: &M, id: ComponentId) {
        if let Some(banner) = self.banners.get_mut(&id) {
            if !banner.manually_hidden {
                return;
            }
            banner.manually_hidden = false;
            banner.refresh_visibility(model);
        }
    }

    pub(crate) fn disable(&mut self, id: ComponentId) {
        self.set_disabled(id, true);
    }

    pub(crate) fn enable(&mut self, id: ComponentId) {
        self.set_disabled(id, false);
    }

    fn set_disabled(&mut self, id: ComponentId, disabled: bool) {
        if let Some(banner) = self.banners.get_mut(&id) {
            banner.part(BannerPart::Root).toggle_class("disabled", disabled);
            for part in INPUT_PARTS {
                banner.part(*part).toggle_class("disabled", disabled);
            }
        }
    }

    /// What a click on the banner should do.
    pub(crate) fn activate<M: MatchModel>(&self, model: &M, id: ComponentId) -> BannerAction {
        let local = model.local_player();
        if id.owner == local {
            return BannerAction::SelectCity(id);
        }
        let Some(other) = model.player(id.owner) else {
            error!(banner = %id, "banner_owner_missing");
            return BannerAction::Ignore;
        };
        if (other.is_major || other.is_minor || other.is_independent)
            && model.has_met(local, id.owner)
        {
            return BannerAction::OpenDiplomacy(id.owner);
        }
        BannerAction::Ignore
    }

    fn apply_input<M: MatchModel>(&mut self, model: &M, id: ComponentId, input: BannerInput) {
        match input {
            BannerInput::Activate => {
                let Some(banner) = self.banners.get(&id) else {
                    debug!(banner = %id, "banner_input_for_unknown_banner");
                    return;
                };
                if banner.is_disabled() {
                    return;
                }
                let action = self.activate(model, id);
                debug!(banner = %id, ?action, "banner_activated");
                if action != BannerAction::Ignore {
                    self.actions.push(action);
                }
            }
            BannerInput::Hide => self.hide(id),
            BannerInput::Show => self.show(model, id),
            BannerInput::Disable => self.disable(id),
            BannerInput::Enable => self.enable(id),
        }
    }

    fn mark_all_cities(&mut self, update: BannerRefresh, cx: &mut ViewContext<'_, impl MatchModel>) {
        let model = cx.model();
        let ids: Vec<ComponentId> = self
            .banners
            .keys()
            .filter(|id| model.city(*id).is_some())
            .collect();
        for id in ids {
            self.banners.mark_dirty(id, update, cx.frames());
        }
    }
}

#[cfg(test)]
impl CityBanners {
    pub(crate) fn banner(&self, id: ComponentId) -> Option<&CityBanner> {
        self.banners.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.banners.len()
    }

    pub(crate) fn anchors(&self) -> &WorldAnchors {
        &self.anchors
    }

    pub(crate) fn pending(&self, id: ComponentId) -> Option<BannerRefresh> {
        self.banners.scheduler().pending(&id)
    }
}

impl<M: MatchModel> View<M, GameEvent> for CityBanners {
    fn name(&self) -> &'static str {
        "city_banners"
    }

    fn subscriptions(&self) -> &'static [&'static str] {
        SUBSCRIPTIONS
    }

    fn attach(&mut self, cx: &mut ViewContext<'_, M>) {
        let model = cx.model();
        for id in model.city_ids() {
            if let Err(err) = self.register(model, id, None) {
                warn!(error = %err, "banner_register_failed");
            }
        }
        info!(banners = self.banners.len(), "city_banners_attached");
    }

    fn handle_event(&mut self, event: &GameEvent, cx: &mut ViewContext<'_, M>) {
        match event {
            GameEvent::CityAddedToMap { city } => {
                if let Err(err) = self.register(cx.model(), *city, None) {
                    warn!(error = %err, "banner_register_failed");
                }
            }
            GameEvent::CityRemovedFromMap { city } => {
                self.unregister(*city);
            }
            GameEvent::CityNameChanged { city } => {
                self.banners.mark_dirty(*city, BannerRefresh::Full, cx.frames());
            }
            GameEvent::CityProductionChanged { city }
            | GameEvent::CityPopulationChanged { city }
            | GameEvent::CityYieldChanged { city }
            | GameEvent::CityReligionChanged { city } => {
                self.banners
                    .mark_dirty(*city, BannerRefresh::Builds, cx.frames());
            }
            GameEvent::PlotVisibilityChanged { location, .. } => {
                let ids: Vec<ComponentId> = self
                    .banners
                    .iter()
                    .filter(|(_, banner)| banner.location == *location)
                    .map(|(id, _)| *id)
                    .collect();
                for id in ids {
                    self.banners
                        .mark_dirty(id, BannerRefresh::Visibility, cx.frames());
                }
            }
            GameEvent::PlayerTurnActivated { .. } => {
                self.mark_all_cities(BannerRefresh::Builds, cx);
            }
            GameEvent::CityBannerInput { city, input } => {
                self.apply_input(cx.model(), *city, *input);
            }
            GameEvent::BeforeUnload => {
                let removed = self.clear();
                info!(removed, "city_banners_unloaded");
            }
            _ => {}
        }
    }

    fn flush(&mut self, _point: SyncPoint, cx: &mut ViewContext<'_, M>) -> FlushReport {
        let model = cx.model();
        let batch = self.banners.take_batch();
        batch.run(|id, update| {
            let Some(banner) = self.banners.get_mut(&id) else {
                return Ok(Recompute::Skipped);
            };
            banner.refresh(model, update)
        })
    }

    fn detach(&mut self) {
        self.clear();
    }

    fn debug_lines(&self) -> Vec<String> {
        vec![format!(
            "banners={} anchors={} dirty={} actions={}",
            self.banners.len(),
            self.anchors.len(),
            self.banners.scheduler().dirty_len(),
            self.actions.len()
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
