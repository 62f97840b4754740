//! Overlay UI state as an immutable snapshot driven by named actions.

use crate::overlay::event::{TrackId, VideoId};
use crate::overlay::geometry::NormPoint;
use crate::overlay::zone::{ZonePolygon, ZoneStore, ZONE_VERTEX_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visualization {
    Hud,
    Heatmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewMode {
    pub visualization: Visualization,
    pub show_zones: bool,
}

impl Default for ViewMode {
    fn default() -> Self {
        Self {
            visualization: Visualization::Hud,
            show_zones: true,
        }
    }
}

impl ViewMode {
    pub fn hud(&self) -> bool {
        self.visualization == Visualization::Hud
    }

    pub fn heatmap(&self) -> bool {
        self.visualization == Visualization::Heatmap
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawPhase {
    Idle,
    /// Accepting clicks; the draft holds fewer than four points.
    Collecting,
    /// Four points collected and handed to the backend.
    Committing,
    /// The save failed; the points stay for a retry or cancel.
    Rejected { error: String },
}

impl DrawPhase {
    pub fn is_drawing(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

pub fn can_transition(from: &DrawPhase, to: &DrawPhase) -> bool {
    use DrawPhase::*;
    matches!(
        (from, to),
        (Idle, Collecting)
            | (Collecting, Collecting)
            | (Collecting, Committing)
            | (Collecting, Idle)
            | (Committing, Idle)
            | (Committing, Rejected { .. })
            | (Rejected { .. }, Committing)
            | (Rejected { .. }, Idle)
    ) || from == to
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayAction {
    SelectVideo(Option<VideoId>),
    ShowHud,
    ShowHeatmap,
    ToggleZones,
    /// Toolbar pencil button: enters draw mode, or cancels when drawing.
    ToggleDrawMode,
    EnterDrawMode,
    CancelDraw,
    CanvasClick(NormPoint),
    HoverChanged(Option<TrackId>),
    PointerLeft,
    ZoneLoaded(ZonePolygon),
    ZoneSaveSucceeded,
    ZoneSaveFailed(String),
    RetrySave,
}

/// Side effects the engine must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEffect {
    SaveZone {
        video_id: VideoId,
        points: Vec<NormPoint>,
    },
    /// Drop events, zone and pollers of the previous selection.
    ResetSelection { video_id: Option<VideoId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: OverlayState,
    pub effect: Option<OverlayEffect>,
}

impl Transition {
    fn to(state: OverlayState) -> Self {
        Self {
            state,
            effect: None,
        }
    }

    fn with_effect(state: OverlayState, effect: OverlayEffect) -> Self {
        Self {
            state,
            effect: Some(effect),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    pub video_id: Option<VideoId>,
    pub view: ViewMode,
    pub phase: DrawPhase,
    pub zones: ZoneStore,
    pub hover: Option<TrackId>,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            video_id: None,
            view: ViewMode::default(),
            phase: DrawPhase::Idle,
            zones: ZoneStore::default(),
            hover: None,
        }
    }
}

impl OverlayState {
    pub fn draw_mode(&self) -> bool {
        self.phase.is_drawing()
    }

    /// Hover only runs outside draw mode.
    pub fn accepts_hover(&self) -> bool {
        !self.draw_mode()
    }

    pub fn reduce(&self, action: OverlayAction) -> Transition {
        match action {
            OverlayAction::SelectVideo(video_id) => Transition::with_effect(
                OverlayState {
                    video_id,
                    view: self.view,
                    ..OverlayState::default()
                },
                OverlayEffect::ResetSelection { video_id },
            ),
            OverlayAction::ShowHud => Transition::to(OverlayState {
                view: ViewMode {
                    visualization: Visualization::Hud,
                    ..self.view
                },
                ..self.clone()
            }),
            OverlayAction::ShowHeatmap => Transition::to(OverlayState {
                view: ViewMode {
                    visualization: Visualization::Heatmap,
                    ..self.view
                },
                ..self.clone()
            }),
            OverlayAction::ToggleZones => Transition::to(OverlayState {
                view: ViewMode {
                    show_zones: !self.view.show_zones,
                    ..self.view
                },
                ..self.clone()
            }),
            OverlayAction::ToggleDrawMode => {
                if self.draw_mode() {
                    self.reduce(OverlayAction::CancelDraw)
                } else {
                    self.reduce(OverlayAction::EnterDrawMode)
                }
            }
            OverlayAction::EnterDrawMode => {
                if self.draw_mode() || self.video_id.is_none() {
                    return Transition::to(self.clone());
                }
                self.moved_to(DrawPhase::Collecting, self.zones.without_draft(), None)
            }
            OverlayAction::CancelDraw => {
                if matches!(self.phase, DrawPhase::Idle | DrawPhase::Committing) {
                    return Transition::to(self.clone());
                }
                self.moved_to(DrawPhase::Idle, self.zones.without_draft(), self.hover)
            }
            OverlayAction::CanvasClick(point) => self.on_click(point),
            OverlayAction::HoverChanged(track) => {
                if !self.accepts_hover() {
                    return Transition::to(self.clone());
                }
                Transition::to(OverlayState {
                    hover: track,
                    ..self.clone()
                })
            }
            OverlayAction::PointerLeft => Transition::to(OverlayState {
                hover: None,
                ..self.clone()
            }),
            OverlayAction::ZoneLoaded(zone) => Transition::to(OverlayState {
                zones: self.zones.with_active(zone),
                ..self.clone()
            }),
            OverlayAction::ZoneSaveSucceeded => {
                if self.phase != DrawPhase::Committing {
                    return Transition::to(self.clone());
                }
                self.moved_to(DrawPhase::Idle, self.zones.committed(), None)
            }
            OverlayAction::ZoneSaveFailed(error) => {
                if self.phase != DrawPhase::Committing {
                    return Transition::to(self.clone());
                }
                self.moved_to(DrawPhase::Rejected { error }, self.zones.clone(), None)
            }
            OverlayAction::RetrySave => {
                if !matches!(self.phase, DrawPhase::Rejected { .. }) {
                    return Transition::to(self.clone());
                }
                self.commit()
            }
        }
    }

    fn on_click(&self, point: NormPoint) -> Transition {
        if self.phase != DrawPhase::Collecting || !point.is_valid() {
            return Transition::to(self.clone());
        }
        let zones = self.zones.with_draft_point(point);
        let next = OverlayState {
            zones,
            ..self.clone()
        };
        if next.zones.draft_is_full() {
            return next.commit();
        }
        Transition::to(next)
    }

    fn commit(&self) -> Transition {
        let Some(video_id) = self.video_id else {
            return Transition::to(self.clone());
        };
        let points = self.zones.draft().to_vec();
        debug_assert_eq!(points.len(), ZONE_VERTEX_COUNT);
        let next = OverlayState {
            phase: DrawPhase::Committing,
            ..self.clone()
        };
        Transition::with_effect(next, OverlayEffect::SaveZone { video_id, points })
    }

    fn moved_to(&self, phase: DrawPhase, zones: ZoneStore, hover: Option<TrackId>) -> Transition {
        if !can_transition(&self.phase, &phase) {
            tracing::warn!(from = ?self.phase, to = ?phase, "rejected draw phase transition");
            return Transition::to(self.clone());
        }
        Transition::to(OverlayState {
            phase,
            zones,
            hover,
            ..self.clone()
        })
    }
}
