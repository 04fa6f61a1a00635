use hud_engine::{GameInfo, GridCoord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    ActiveNode, AgeProgress, CityRecord, ComponentId, IndependentRelationship, MatchModel,
    PlayerHappiness, PlayerId, PlayerRecord, PlotYields, RevealedState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct GridSize {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PlotRecord {
    pub(crate) location: GridCoord,
    #[serde(default)]
    pub(crate) revealed: RevealedState,
    #[serde(default)]
    pub(crate) yields: PlotYields,
    #[serde(default)]
    pub(crate) constructibles: usize,
    #[serde(default)]
    pub(crate) owner: Option<PlayerId>,
}

impl PlotRecord {
    fn empty(location: GridCoord) -> Self {
        Self {
            location,
            revealed: RevealedState::Hidden,
            yields: Vec::new(),
            constructibles: 0,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RelationshipRecord {
    pub(crate) independent: PlayerId,
    pub(crate) observer: PlayerId,
    pub(crate) relationship: IndependentRelationship,
}

/// In-memory match used by the headless runner and the tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MatchState {
    pub(crate) local_player: PlayerId,
    #[serde(default)]
    pub(crate) local_observer: Option<PlayerId>,
    pub(crate) grid: GridSize,
    #[serde(default)]
    pub(crate) turn: u32,
    #[serde(default)]
    pub(crate) max_turns: u32,
    pub(crate) age: String,
    #[serde(default)]
    pub(crate) age_progress: AgeProgress,
    #[serde(default)]
    pub(crate) players: Vec<PlayerRecord>,
    #[serde(default)]
    pub(crate) cities: Vec<CityRecord>,
    #[serde(default)]
    pub(crate) plots: Vec<PlotRecord>,
    #[serde(default)]
    pub(crate) relationships: Vec<RelationshipRecord>,
    #[serde(default)]
    pub(crate) met: Vec<(PlayerId, PlayerId)>,
    #[serde(skip)]
    game_info: GameInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "patch")]
pub(crate) enum StatePatch {
    SetRevealed {
        location: GridCoord,
        revealed: RevealedState,
    },
    SetPlotYields {
        location: GridCoord,
        yields: PlotYields,
    },
    SetConstructibles {
        location: GridCoord,
        count: usize,
    },
    UpsertCity {
        city: Box<CityRecord>,
    },
    RemoveCity {
        id: ComponentId,
    },
    RenameCity {
        id: ComponentId,
        name: String,
    },
    SetCityPopulation {
        id: ComponentId,
        population: u32,
    },
    SetCityHappiness {
        id: ComponentId,
        happiness: f32,
    },
    UpsertPlayer {
        player: Box<PlayerRecord>,
    },
    SetActiveTech {
        player: PlayerId,
        node: Option<ActiveNode>,
    },
    SetActiveCulture {
        player: PlayerId,
        node: Option<ActiveNode>,
    },
    SetPlayerHappiness {
        player: PlayerId,
        happiness: PlayerHappiness,
    },
    SetResourcesToAssign {
        player: PlayerId,
        count: u32,
    },
    SetTurn {
        turn: u32,
    },
    SetAgeProgress {
        current: u32,
    },
    Meet {
        a: PlayerId,
        b: PlayerId,
    },
    SetRelationship {
        independent: PlayerId,
        observer: PlayerId,
        relationship: IndependentRelationship,
    },
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum PatchError {
    #[error("plot ({x}, {y}) is outside the {width}x{height} grid")]
    PlotOutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    #[error("no city with id {0}")]
    UnknownCity(ComponentId),
    #[error("no player with id {0}")]
    UnknownPlayer(PlayerId),
}

impl MatchState {
    #[cfg(test)]
    pub(crate) fn new(local_player: PlayerId, width: u32, height: u32, age: &str) -> Self {
        Self {
            local_player,
            local_observer: None,
            grid: GridSize { width, height },
            turn: 1,
            max_turns: 0,
            age: age.to_string(),
            age_progress: AgeProgress::default(),
            players: Vec::new(),
            cities: Vec::new(),
            plots: Vec::new(),
            relationships: Vec::new(),
            met: Vec::new(),
            game_info: GameInfo::new(),
        }
    }

    pub(crate) fn set_game_info(&mut self, game_info: GameInfo) {
        self.game_info = game_info;
    }

    pub(crate) fn plot(&self, location: GridCoord) -> Option<&PlotRecord> {
        self.plots.iter().find(|plot| plot.location == location)
    }

    fn plot_mut(&mut self, location: GridCoord) -> Result<&mut PlotRecord, PatchError> {
        if self.plot_index(location).is_none() {
            return Err(PatchError::PlotOutOfBounds {
                x: location.x,
                y: location.y,
                width: self.grid.width,
                height: self.grid.height,
            });
        }
        let index = match self.plots.iter().position(|plot| plot.location == location) {
            Some(index) => index,
            None => {
                self.plots.push(PlotRecord::empty(location));
                self.plots.len() - 1
            }
        };
        Ok(&mut self.plots[index])
    }

    fn city_mut(&mut self, id: ComponentId) -> Result<&mut CityRecord, PatchError> {
        self.cities
            .iter_mut()
            .find(|city| city.id == id)
            .ok_or(PatchError::UnknownCity(id))
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut PlayerRecord, PatchError> {
        self.players
            .iter_mut()
            .find(|player| player.id == id)
            .ok_or(PatchError::UnknownPlayer(id))
    }

    pub(crate) fn apply_patch(&mut self, patch: StatePatch) -> Result<(), PatchError> {
        match patch {
            StatePatch::SetRevealed { location, revealed } => {
                self.plot_mut(location)?.revealed = revealed;
            }
            StatePatch::SetPlotYields { location, yields } => {
                self.plot_mut(location)?.yields = yields;
            }
            StatePatch::SetConstructibles { location, count } => {
                self.plot_mut(location)?.constructibles = count;
            }
            StatePatch::UpsertCity { city } => {
                match self.cities.iter_mut().find(|existing| existing.id == city.id) {
                    Some(existing) => *existing = *city,
                    None => self.cities.push(*city),
                }
            }
            StatePatch::RemoveCity { id } => {
                let before = self.cities.len();
                self.cities.retain(|city| city.id != id);
                if self.cities.len() == before {
                    return Err(PatchError::UnknownCity(id));
                }
            }
            StatePatch::RenameCity { id, name } => {
                self.city_mut(id)?.name = name;
            }
            StatePatch::SetCityPopulation { id, population } => {
                self.city_mut(id)?.population = population;
            }
            StatePatch::SetCityHappiness { id, happiness } => {
                self.city_mut(id)?
                    .yields
                    .get_or_insert_with(Default::default)
                    .happiness = Some(happiness);
            }
            StatePatch::UpsertPlayer { player } => {
                match self.players.iter_mut().find(|existing| existing.id == player.id) {
                    Some(existing) => *existing = *player,
                    None => self.players.push(*player),
                }
            }
            StatePatch::SetActiveTech { player, node } => {
                self.player_mut(player)?
                    .techs
                    .get_or_insert_with(Default::default)
                    .active_node = node;
            }
            StatePatch::SetActiveCulture { player, node } => {
                self.player_mut(player)?
                    .culture
                    .get_or_insert_with(Default::default)
                    .active_node = node;
            }
            StatePatch::SetPlayerHappiness { player, happiness } => {
                self.player_mut(player)?.happiness = Some(happiness);
            }
            StatePatch::SetResourcesToAssign { player, count } => {
                self.player_mut(player)?
                    .resources
                    .get_or_insert_with(Default::default)
                    .resources_to_assign = count;
            }
            StatePatch::SetTurn { turn } => {
                self.turn = turn;
            }
            StatePatch::SetAgeProgress { current } => {
                self.age_progress.current = current;
            }
            StatePatch::Meet { a, b } => {
                if !self.has_met(a, b) {
                    self.met.push((a, b));
                }
            }
            StatePatch::SetRelationship {
                independent,
                observer,
                relationship,
            } => {
                self.relationships.retain(|record| {
                    !(record.independent == independent && record.observer == observer)
                });
                self.relationships.push(RelationshipRecord {
                    independent,
                    observer,
                    relationship,
                });
            }
        }
        Ok(())
    }
}

impl MatchModel for MatchState {
    fn game_info(&self) -> &GameInfo {
        &self.game_info
    }

    fn local_player(&self) -> PlayerId {
        self.local_player
    }

    fn local_observer(&self) -> PlayerId {
        self.local_observer.unwrap_or(self.local_player)
    }

    fn grid_width(&self) -> u32 {
        self.grid.width
    }

    fn grid_height(&self) -> u32 {
        self.grid.height
    }

    fn revealed_state(&self, observer: PlayerId, location: GridCoord) -> Option<RevealedState> {
        self.plot_index(location)?;
        if observer != self.local_observer() {
            return Some(RevealedState::Hidden);
        }
        Some(
            self.plot(location)
                .map_or(RevealedState::Hidden, |plot| plot.revealed),
        )
    }

    fn plot_yields(&self, location: GridCoord, _player: PlayerId) -> PlotYields {
        self.plot(location)
            .map(|plot| plot.yields.clone())
            .unwrap_or_default()
    }

    fn constructible_count(&self, location: GridCoord) -> usize {
        self.plot(location).map_or(0, |plot| plot.constructibles)
    }

    fn owner_name(&self, location: GridCoord) -> Option<String> {
        let owner = self.plot(location)?.owner?;
        self.player(owner)
            .map(|player| player.civilization_full_name.clone())
    }

    fn player(&self, id: PlayerId) -> Option<&PlayerRecord> {
        self.players.iter().find(|player| player.id == id)
    }

    fn city(&self, id: ComponentId) -> Option<&CityRecord> {
        self.cities.iter().find(|city| city.id == id)
    }

    fn city_ids(&self) -> Vec<ComponentId> {
        self.cities.iter().map(|city| city.id).collect()
    }

    fn independent_relationship(
        &self,
        independent: PlayerId,
        observer: PlayerId,
    ) -> IndependentRelationship {
        self.relationships
            .iter()
            .find(|record| record.independent == independent && record.observer == observer)
            .map_or(IndependentRelationship::NotApplicable, |record| {
                record.relationship
            })
    }

    fn has_met(&self, a: PlayerId, b: PlayerId) -> bool {
        a == b
            || self
                .met
                .iter()
                .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    fn turn(&self) -> u32 {
        self.turn
    }

    fn max_turns(&self) -> u32 {
        self.max_turns
    }

    fn age(&self) -> &str {
        &self.age
    }

    fn age_progress(&self) -> AgeProgress {
        self.age_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(x: i32, y: i32) -> GridCoord {
        GridCoord { x, y }
    }

    #[test]
    fn plot_index_round_trips_inside_grid() {
        let state = MatchState::new(PlayerId(0), 4, 3, "AGE_ANTIQUITY");

        assert_eq!(state.plot_index(coord(1, 2)), Some(9));
        assert_eq!(state.location_from_index(9), Some(coord(1, 2)));
        assert_eq!(state.plot_index(coord(4, 0)), None);
        assert_eq!(state.plot_index(coord(-1, 0)), None);
        assert_eq!(state.location_from_index(12), None);
    }

    #[test]
    fn unknown_plots_read_as_hidden_and_empty() {
        let state = MatchState::new(PlayerId(0), 4, 3, "AGE_ANTIQUITY");

        assert_eq!(
            state.revealed_state(PlayerId(0), coord(2, 2)),
            Some(RevealedState::Hidden)
        );
        assert!(state.plot_yields(coord(2, 2), PlayerId(0)).is_empty());
        assert_eq!(state.revealed_state(PlayerId(0), coord(9, 9)), None);
    }

    #[test]
    fn patches_create_plots_and_reject_out_of_bounds() {
        let mut state = MatchState::new(PlayerId(0), 4, 3, "AGE_ANTIQUITY");

        state
            .apply_patch(StatePatch::SetPlotYields {
                location: coord(1, 1),
                yields: vec![("YIELD_FOOD".to_string(), 2)],
            })
            .expect("in bounds");
        assert_eq!(state.plot_yields(coord(1, 1), PlayerId(0)).len(), 1);

        let err = state
            .apply_patch(StatePatch::SetConstructibles {
                location: coord(7, 1),
                count: 1,
            })
            .expect_err("out of bounds");
        assert!(matches!(err, PatchError::PlotOutOfBounds { x: 7, .. }));
    }

    #[test]
    fn city_patches_require_known_city() {
        let mut state = MatchState::new(PlayerId(0), 4, 3, "AGE_ANTIQUITY");
        let id = ComponentId {
            owner: PlayerId(0),
            id: 65536,
        };

        assert_eq!(
            state.apply_patch(StatePatch::RenameCity {
                id,
                name: "Roma".to_string()
            }),
            Err(PatchError::UnknownCity(id))
        );
        assert_eq!(
            state.apply_patch(StatePatch::RemoveCity { id }),
            Err(PatchError::UnknownCity(id))
        );
    }

    #[test]
    fn has_met_is_symmetric() {
        let mut state = MatchState::new(PlayerId(0), 1, 1, "AGE_ANTIQUITY");
        state
            .apply_patch(StatePatch::Meet {
                a: PlayerId(0),
                b: PlayerId(3),
            })
            .expect("meet");

        assert!(state.has_met(PlayerId(3), PlayerId(0)));
        assert!(!state.has_met(PlayerId(0), PlayerId(4)));
    }
}
