use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use hud_engine::{DriverStatus, FrameDriver, GridCoord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::GameEvent;
use super::model::{MatchState, StatePatch};

pub(crate) const SCENARIO_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    #[error("read scenario '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse scenario json at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("scenario validation failed at {path}: {message}")]
    Validation { path: String, message: String },
}

/// One scripted frame: state changes first, then the events they raise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ScenarioFrame {
    pub(crate) patches: Vec<StatePatch>,
    pub(crate) events: Vec<GameEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Scenario {
    pub(crate) scenario_version: u32,
    #[serde(default)]
    pub(crate) name: String,
    pub(crate) state: MatchState,
    #[serde(default)]
    pub(crate) frames: Vec<ScenarioFrame>,
}

impl Scenario {
    pub(crate) fn into_parts(self) -> (MatchState, ScenarioDriver) {
        (self.state, ScenarioDriver::new(self.frames))
    }
}

pub(crate) fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let scenario = parse_scenario(&raw)?;
    info!(
        path = %path.display(),
        name = %scenario.name,
        frames = scenario.frames.len(),
        cities = scenario.state.cities.len(),
        "scenario_loaded"
    );
    Ok(scenario)
}

pub(crate) fn parse_scenario(raw: &str) -> Result<Scenario, ScenarioError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let scenario = serde_path_to_error::deserialize::<_, Scenario>(&mut deserializer).map_err(
        |error| {
            let path = error.path().to_string();
            let message = error.into_inner().to_string();
            ScenarioError::Parse {
                path: if path.is_empty() { ".".to_string() } else { path },
                message,
            }
        },
    )?;
    validate_scenario(&scenario)?;
    Ok(scenario)
}

fn validation_err(path: impl Into<String>, message: impl Into<String>) -> ScenarioError {
    ScenarioError::Validation {
        path: path.into(),
        message: message.into(),
    }
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> ScenarioError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

fn validate_scenario(scenario: &Scenario) -> Result<(), ScenarioError> {
    if scenario.scenario_version != SCENARIO_VERSION {
        return Err(expected_actual(
            "scenario_version",
            SCENARIO_VERSION,
            scenario.scenario_version,
        ));
    }

    let state = &scenario.state;
    if state.grid.width == 0 || state.grid.height == 0 {
        return Err(expected_actual(
            "state.grid",
            "non-empty grid",
            format!("{}x{}", state.grid.width, state.grid.height),
        ));
    }
    let in_grid = |location: GridCoord| {
        location.x >= 0
            && location.y >= 0
            && (location.x as u32) < state.grid.width
            && (location.y as u32) < state.grid.height
    };

    let mut known_players = HashMap::with_capacity(state.players.len());
    for (index, player) in state.players.iter().enumerate() {
        if let Some(first) = known_players.insert(player.id, index) {
            return Err(validation_err(
                format!("state.players[{index}].id"),
                format!(
                    "duplicate player id {} (first seen at state.players[{first}].id)",
                    player.id.0
                ),
            ));
        }
    }

    for (index, plot) in state.plots.iter().enumerate() {
        if !in_grid(plot.location) {
            return Err(expected_actual(
                &format!("state.plots[{index}].location"),
                "location inside the grid",
                format!("({}, {})", plot.location.x, plot.location.y),
            ));
        }
    }

    let mut known_cities = HashMap::with_capacity(state.cities.len());
    for (index, city) in state.cities.iter().enumerate() {
        if let Some(first) = known_cities.insert(city.id, index) {
            return Err(validation_err(
                format!("state.cities[{index}].id"),
                format!("duplicate city id {} (first seen at state.cities[{first}].id)", city.id),
            ));
        }
        if !known_players.contains_key(&city.owner()) {
            return Err(validation_err(
                format!("state.cities[{index}].id.owner"),
                format!("unknown owner {}", city.owner()),
            ));
        }
        if !in_grid(city.location) {
            return Err(expected_actual(
                &format!("state.cities[{index}].location"),
                "location inside the grid",
                format!("({}, {})", city.location.x, city.location.y),
            ));
        }
    }
    Ok(())
}

/// Replays scenario frames into the loop, one scripted frame per loop frame.
#[derive(Debug, Default)]
pub(crate) struct ScenarioDriver {
    frames: Vec<ScenarioFrame>,
    rejected_patches: usize,
}

impl ScenarioDriver {
    pub(crate) fn new(frames: Vec<ScenarioFrame>) -> Self {
        Self {
            frames,
            rejected_patches: 0,
        }
    }

    pub(crate) fn rejected_patches(&self) -> usize {
        self.rejected_patches
    }
}

impl FrameDriver<MatchState, GameEvent> for ScenarioDriver {
    fn poll(
        &mut self,
        frame: u64,
        model: &mut MatchState,
        events: &mut Vec<GameEvent>,
    ) -> DriverStatus {
        let index = usize::try_from(frame).unwrap_or(usize::MAX);
        if let Some(scripted) = self.frames.get(index) {
            for patch in &scripted.patches {
                if let Err(err) = model.apply_patch(patch.clone()) {
                    self.rejected_patches += 1;
                    warn!(frame, error = %err, "scenario_patch_rejected");
                }
            }
            events.extend(scripted.events.iter().cloned());
            debug!(
                frame,
                patches = scripted.patches.len(),
                events = scripted.events.len(),
                "scenario_frame_played"
            );
        }
        if index.saturating_add(1) >= self.frames.len() {
            DriverStatus::Finished
        } else {
            DriverStatus::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::app::model::{ComponentId, MatchModel, PlayerId};

    const MINIMAL: &str = r#"{
        "scenario_version": 1,
        "name": "minimal",
        "state": {
            "local_player": 0,
            "grid": { "width": 4, "height": 3 },
            "age": "AGE_ANTIQUITY",
            "players": [{ "id": 0, "name": "Augustus" }],
            "cities": [{ "id": { "owner": 0, "id": 1 }, "name": "Roma", "location": { "x": 1, "y": 2 } }]
        },
        "frames": [
            {
                "patches": [{ "patch": "RenameCity", "id": { "owner": 0, "id": 1 }, "name": "Roma Nova" }],
                "events": [{ "event": "CityNameChanged", "city": { "owner": 0, "id": 1 } }]
            },
            {
                "patches": [{ "patch": "RenameCity", "id": { "owner": 0, "id": 9 }, "name": "Nowhere" }],
                "events": [{ "event": "GameCoreEventPlaybackComplete" }]
            }
        ]
    }"#;

    #[test]
    fn minimal_scenario_parses_with_defaults() {
        let scenario = parse_scenario(MINIMAL).expect("parse");

        assert_eq!(scenario.name, "minimal");
        assert_eq!(scenario.frames.len(), 2);
        let roma = ComponentId {
            owner: PlayerId(0),
            id: 1,
        };
        let city = scenario.state.city(roma).expect("roma");
        assert_eq!(city.population, 0);
        assert!(city.build_queue.is_none());
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let raw = MINIMAL.replace(r#""width": 4"#, r#""width": "wide""#);
        let err = parse_scenario(&raw).expect_err("bad width");

        match err {
            ScenarioError::Parse { path, .. } => assert_eq!(path, "state.grid.width"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        let raw = MINIMAL.replace(r#""scenario_version": 1"#, r#""scenario_version": 7"#);
        let err = parse_scenario(&raw).expect_err("version");
        assert_eq!(
            err.to_string(),
            "scenario validation failed at scenario_version: expected 1, got 7"
        );
    }

    #[test]
    fn cities_must_have_known_owners_and_fit_the_grid() {
        let raw = MINIMAL.replace(r#""x": 1, "y": 2"#, r#""x": 1, "y": 3"#);
        let err = parse_scenario(&raw).expect_err("outside");
        assert!(err.to_string().contains("state.cities[0].location"));

        let raw = MINIMAL.replace(
            r#""owner": 0, "id": 1 }, "name": "Roma""#,
            r#""owner": 5, "id": 1 }, "name": "Roma""#,
        );
        let err = parse_scenario(&raw).expect_err("owner");
        assert!(err.to_string().contains("state.cities[0].id.owner"));
    }

    #[test]
    fn driver_applies_patches_and_finishes_on_last_frame() {
        let (mut state, mut driver) = parse_scenario(MINIMAL).expect("parse").into_parts();
        let mut events = Vec::new();

        assert_eq!(driver.poll(0, &mut state, &mut events), DriverStatus::Running);
        assert_eq!(events.len(), 1);
        let roma = ComponentId {
            owner: PlayerId(0),
            id: 1,
        };
        assert_eq!(state.city(roma).expect("roma").name, "Roma Nova");

        assert_eq!(driver.poll(1, &mut state, &mut events), DriverStatus::Finished);
        assert_eq!(events.len(), 2);
        assert_eq!(driver.rejected_patches(), 1);
    }

    #[test]
    fn load_reports_missing_file_and_reads_from_disk() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("scenario.json");

        let err = load_scenario(&path).expect_err("missing");
        assert!(matches!(err, ScenarioError::Read { .. }));

        fs::write(&path, MINIMAL).expect("write");
        let scenario = load_scenario(&path).expect("load");
        assert_eq!(scenario.state.grid_width(), 4);
    }
}
