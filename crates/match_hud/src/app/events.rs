use hud_engine::{GridCoord, HostEvent};
use serde::{Deserialize, Serialize};

use super::model::{ComponentId, PlayerId, RevealedState};
use super::views::sub_system_dock::DockButton;

pub(crate) const YIELD_CULTURE: &str = "YIELD_CULTURE";
pub(crate) const YIELD_SCIENCE: &str = "YIELD_SCIENCE";

/// Pointer input aimed at one city banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum BannerInput {
    Activate,
    Hide,
    Show,
    Disable,
    Enable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub(crate) enum GameEvent {
    PlotVisibilityChanged {
        location: GridCoord,
        visibility: RevealedState,
    },
    PlotYieldChanged {
        location: GridCoord,
    },
    PlotOwnershipChanged {
        location: GridCoord,
    },
    ConstructibleAddedToMap {
        location: GridCoord,
    },
    ConstructibleRemovedFromMap {
        location: GridCoord,
    },
    GameCoreEventPlaybackComplete,
    CityAddedToMap {
        city: ComponentId,
    },
    CityRemovedFromMap {
        city: ComponentId,
    },
    CityNameChanged {
        city: ComponentId,
    },
    CityProductionChanged {
        city: ComponentId,
    },
    CityPopulationChanged {
        city: ComponentId,
    },
    CityYieldChanged {
        city: ComponentId,
    },
    CityReligionChanged {
        city: ComponentId,
    },
    PlayerTurnActivated {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    ScienceYieldChanged {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    TechTreeChanged {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    TechNodeCompleted {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    CultureYieldChanged {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    CultureTreeChanged {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    CultureNodeCompleted {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    PlayerYieldChanged {
        #[serde(default)]
        player: Option<PlayerId>,
        yield_type: String,
    },
    PlayerYieldGranted {
        #[serde(default)]
        player: Option<PlayerId>,
        yield_type: String,
    },
    AgeProgressionChanged {
        progression_total: u32,
        #[serde(default)]
        age_is_ending: Option<bool>,
    },
    ResourceAssigned {
        #[serde(default)]
        player: Option<PlayerId>,
    },
    LayerHotkey {
        name: String,
    },
    FocusSubSystem,
    CityBannerInput {
        city: ComponentId,
        input: BannerInput,
    },
    SubSystemButtonPressed {
        button: DockButton,
    },
    BeforeUnload,
}

impl GameEvent {
    /// Player the event is about, when it carries one.
    pub(crate) fn player(&self) -> Option<PlayerId> {
        match self {
            Self::PlayerTurnActivated { player }
            | Self::ScienceYieldChanged { player }
            | Self::TechTreeChanged { player }
            | Self::TechNodeCompleted { player }
            | Self::CultureYieldChanged { player }
            | Self::CultureTreeChanged { player }
            | Self::CultureNodeCompleted { player }
            | Self::PlayerYieldChanged { player, .. }
            | Self::PlayerYieldGranted { player, .. }
            | Self::ResourceAssigned { player } => *player,
            _ => None,
        }
    }
}

impl HostEvent for GameEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::PlotVisibilityChanged { .. } => "PlotVisibilityChanged",
            Self::PlotYieldChanged { .. } => "PlotYieldChanged",
            Self::PlotOwnershipChanged { .. } => "PlotOwnershipChanged",
            Self::ConstructibleAddedToMap { .. } => "ConstructibleAddedToMap",
            Self::ConstructibleRemovedFromMap { .. } => "ConstructibleRemovedFromMap",
            Self::GameCoreEventPlaybackComplete => "GameCoreEventPlaybackComplete",
            Self::CityAddedToMap { .. } => "CityAddedToMap",
            Self::CityRemovedFromMap { .. } => "CityRemovedFromMap",
            Self::CityNameChanged { .. } => "CityNameChanged",
            Self::CityProductionChanged { .. } => "CityProductionChanged",
            Self::CityPopulationChanged { .. } => "CityPopulationChanged",
            Self::CityYieldChanged { .. } => "CityYieldChanged",
            Self::CityReligionChanged { .. } => "CityReligionChanged",
            Self::PlayerTurnActivated { .. } => "PlayerTurnActivated",
            Self::ScienceYieldChanged { .. } => "ScienceYieldChanged",
            Self::TechTreeChanged { .. } => "TechTreeChanged",
            Self::TechNodeCompleted { .. } => "TechNodeCompleted",
            Self::CultureYieldChanged { .. } => "CultureYieldChanged",
            Self::CultureTreeChanged { .. } => "CultureTreeChanged",
            Self::CultureNodeCompleted { .. } => "CultureNodeCompleted",
            Self::PlayerYieldChanged { .. } => "PlayerYieldChanged",
            Self::PlayerYieldGranted { .. } => "PlayerYieldGranted",
            Self::AgeProgressionChanged { .. } => "AgeProgressionChanged",
            Self::ResourceAssigned { .. } => "ResourceAssigned",
            Self::LayerHotkey { .. } => "LayerHotkey",
            Self::FocusSubSystem => "FocusSubSystem",
            Self::CityBannerInput { .. } => "CityBannerInput",
            Self::SubSystemButtonPressed { .. } => "SubSystemButtonPressed",
            Self::BeforeUnload => "BeforeUnload",
        }
    }

    fn completes_batch(&self) -> bool {
        matches!(self, Self::GameCoreEventPlaybackComplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_decode_from_tagged_json() {
        let event: GameEvent = serde_json::from_str(
            r#"{"event":"PlotVisibilityChanged","location":{"x":3,"y":1},"visibility":"REVEALED"}"#,
        )
        .expect("decode");

        assert_eq!(
            event,
            GameEvent::PlotVisibilityChanged {
                location: GridCoord { x: 3, y: 1 },
                visibility: RevealedState::Revealed,
            }
        );
        assert_eq!(event.name(), "PlotVisibilityChanged");
        assert!(!event.completes_batch());
    }

    #[test]
    fn playback_complete_ends_the_batch() {
        let event: GameEvent =
            serde_json::from_str(r#"{"event":"GameCoreEventPlaybackComplete"}"#).expect("decode");
        assert!(event.completes_batch());
    }

    #[test]
    fn ui_input_events_use_screaming_names() {
        let event: GameEvent = serde_json::from_str(
            r#"{"event":"CityBannerInput","city":{"owner":1,"id":7},"input":"ACTIVATE"}"#,
        )
        .expect("decode");
        assert_eq!(
            event,
            GameEvent::CityBannerInput {
                city: ComponentId {
                    owner: PlayerId(1),
                    id: 7
                },
                input: BannerInput::Activate,
            }
        );

        let event: GameEvent =
            serde_json::from_str(r#"{"event":"SubSystemButtonPressed","button":"GREAT_WORKS"}"#)
                .expect("decode");
        assert_eq!(
            event,
            GameEvent::SubSystemButtonPressed {
                button: DockButton::GreatWorks
            }
        );
        assert_eq!(event.player(), None);
    }

    #[test]
    fn player_field_is_optional() {
        let event: GameEvent =
            serde_json::from_str(r#"{"event":"TechNodeCompleted"}"#).expect("decode");
        assert_eq!(event.player(), None);

        let event: GameEvent =
            serde_json::from_str(r#"{"event":"ResourceAssigned","player":2}"#).expect("decode");
        assert_eq!(event.player(), Some(PlayerId(2)));
    }
}
