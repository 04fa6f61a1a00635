use std::fmt;

use hud_engine::{GameInfo, GridCoord};
use serde::{Deserialize, Serialize};

mod state;

pub(crate) use state::{MatchState, StatePatch};

pub(crate) const AGE_ANTIQUITY: &str = "AGE_ANTIQUITY";
pub(crate) const AGE_EXPLORATION: &str = "AGE_EXPLORATION";
pub(crate) const AGE_MODERN: &str = "AGE_MODERN";

pub(crate) type PlotYields = Vec<(String, i32)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct PlayerId(pub(crate) i32);

impl PlayerId {
    pub(crate) const INVALID: Self = Self(-1);

    pub(crate) fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) struct ComponentId {
    pub(crate) owner: PlayerId,
    pub(crate) id: u32,
}

impl ComponentId {
    #[cfg(test)]
    pub(crate) const INVALID: Self = Self {
        owner: PlayerId::INVALID,
        id: 0,
    };

    pub(crate) fn is_valid(self) -> bool {
        self.owner.is_valid()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner.0, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum RevealedState {
    #[default]
    Hidden,
    Revealed,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum IndependentRelationship {
    Friendly,
    Hostile,
    Neutral,
    #[default]
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ProductionKind {
    #[default]
    Unit,
    Constructible,
    Project,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerRecord {
    pub(crate) id: PlayerId,
    pub(crate) name: String,
    pub(crate) leader_type: String,
    pub(crate) civilization_type: String,
    pub(crate) civilization_adjective: String,
    pub(crate) civilization_full_name: String,
    pub(crate) is_major: bool,
    pub(crate) is_minor: bool,
    pub(crate) is_independent: bool,
    pub(crate) suzerain: Option<PlayerId>,
    pub(crate) city_state_bonus: Option<String>,
    pub(crate) primary_color: String,
    pub(crate) secondary_color: String,
    pub(crate) techs: Option<ProgressionRecord>,
    pub(crate) culture: Option<ProgressionRecord>,
    pub(crate) happiness: Option<PlayerHappiness>,
    pub(crate) stats: Option<PlayerStats>,
    pub(crate) resources: Option<PlayerResources>,
    pub(crate) religion: Option<PlayerReligion>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ProgressionRecord {
    pub(crate) active_node: Option<ActiveNode>,
    pub(crate) unlocked_nodes: Vec<String>,
}

impl ProgressionRecord {
    pub(crate) fn is_node_unlocked(&self, node_type: &str) -> bool {
        self.unlocked_nodes.iter().any(|node| node == node_type)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ActiveNode {
    pub(crate) node_type: String,
    pub(crate) depth_unlocked: u32,
    pub(crate) progress: f32,
    pub(crate) cost: f32,
    pub(crate) turns_left: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerHappiness {
    pub(crate) in_golden_age: bool,
    pub(crate) golden_age_turns_left: i32,
    pub(crate) next_golden_age_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerStats {
    pub(crate) net_happiness_per_turn: Option<f64>,
    pub(crate) lifetime_happiness: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerResources {
    pub(crate) resources_to_assign: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerReligion {
    pub(crate) pantheons_to_add: u32,
    pub(crate) can_create_religion: bool,
    pub(crate) has_created_religion: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CityRecord {
    pub(crate) id: ComponentId,
    pub(crate) name: String,
    pub(crate) location: GridCoord,
    #[serde(default)]
    pub(crate) population: u32,
    #[serde(default)]
    pub(crate) urban_population: u32,
    #[serde(default)]
    pub(crate) rural_population: u32,
    #[serde(default)]
    pub(crate) is_town: bool,
    #[serde(default)]
    pub(crate) is_capital: bool,
    #[serde(default)]
    pub(crate) is_infected: bool,
    #[serde(default)]
    pub(crate) is_being_razed: bool,
    #[serde(default)]
    pub(crate) turns_until_razed: i32,
    #[serde(default)]
    pub(crate) original_owner: Option<PlayerId>,
    #[serde(default)]
    pub(crate) growth: Option<CityGrowth>,
    #[serde(default)]
    pub(crate) build_queue: Option<BuildQueue>,
    #[serde(default)]
    pub(crate) yields: Option<CityYields>,
    #[serde(default)]
    pub(crate) happiness: Option<CityHappiness>,
    #[serde(default)]
    pub(crate) religion: Option<CityReligion>,
}

impl CityRecord {
    pub(crate) fn owner(&self) -> PlayerId {
        self.id.owner
    }

    pub(crate) fn original_owner(&self) -> PlayerId {
        self.original_owner.unwrap_or(self.id.owner)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CityGrowth {
    pub(crate) current_food: f32,
    pub(crate) next_growth_threshold: f32,
    pub(crate) turns_until_growth: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct BuildQueue {
    pub(crate) current: Option<String>,
    pub(crate) kind: ProductionKind,
    pub(crate) turns_left: i32,
    pub(crate) percent_complete: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CityYields {
    pub(crate) happiness: Option<f32>,
    pub(crate) net_food: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CityHappiness {
    pub(crate) has_unrest: bool,
    pub(crate) turns_of_unrest: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CityReligion {
    pub(crate) majority: Option<String>,
    pub(crate) urban: Option<String>,
    pub(crate) rural: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) struct AgeProgress {
    pub(crate) current: u32,
    pub(crate) max: u32,
}

/// Read-only access to the running match. Every accessor may come back
/// empty; callers log and skip rather than fail.
pub(crate) trait MatchModel {
    fn game_info(&self) -> &GameInfo;
    fn local_player(&self) -> PlayerId;
    fn local_observer(&self) -> PlayerId;
    fn grid_width(&self) -> u32;
    fn grid_height(&self) -> u32;
    fn revealed_state(&self, observer: PlayerId, location: GridCoord) -> Option<RevealedState>;
    fn plot_yields(&self, location: GridCoord, player: PlayerId) -> PlotYields;
    fn constructible_count(&self, location: GridCoord) -> usize;
    fn owner_name(&self, location: GridCoord) -> Option<String>;
    fn player(&self, id: PlayerId) -> Option<&PlayerRecord>;
    fn city(&self, id: ComponentId) -> Option<&CityRecord>;
    fn city_ids(&self) -> Vec<ComponentId>;
    fn independent_relationship(
        &self,
        independent: PlayerId,
        observer: PlayerId,
    ) -> IndependentRelationship;
    fn has_met(&self, a: PlayerId, b: PlayerId) -> bool;
    fn turn(&self) -> u32;
    fn max_turns(&self) -> u32;
    fn age(&self) -> &str;
    fn age_progress(&self) -> AgeProgress;

    fn plot_count(&self) -> u32 {
        self.grid_width().saturating_mul(self.grid_height())
    }

    fn plot_index(&self, location: GridCoord) -> Option<u32> {
        let width = i64::from(self.grid_width());
        let height = i64::from(self.grid_height());
        let (x, y) = (i64::from(location.x), i64::from(location.y));
        if x < 0 || y < 0 || x >= width || y >= height {
            return None;
        }
        u32::try_from(x + width * y).ok()
    }

    fn location_from_index(&self, index: u32) -> Option<GridCoord> {
        let width = self.grid_width();
        if width == 0 || index >= self.plot_count() {
            return None;
        }
        Some(GridCoord {
            x: i32::try_from(index % width).ok()?,
            y: i32::try_from(index / width).ok()?,
        })
    }
}
