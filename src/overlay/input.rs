use crate::overlay::event::{EventIndex, TrackId};
use crate::overlay::geometry::CoordinateMapper;
use crate::overlay::model::Point;
use crate::overlay::state::{DrawPhase, OverlayAction, OverlayState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Position in canvas pixels.
    Move(Point),
    Click(Point),
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Other,
}

/// Translate raw pointer input into reducer actions. Reads geometry only.
pub fn handle_pointer(
    state: &OverlayState,
    index: &EventIndex,
    mapper: Option<&CoordinateMapper>,
    event: PointerEvent,
) -> Option<OverlayAction> {
    match event {
        PointerEvent::Leave => Some(OverlayAction::PointerLeft),
        PointerEvent::Move(point) => {
            if !state.accepts_hover() {
                return None;
            }
            let hit = mapper.and_then(|mapper| hit_test(index, mapper, point));
            (hit != state.hover).then_some(OverlayAction::HoverChanged(hit))
        }
        PointerEvent::Click(point) => {
            if !state.draw_mode() {
                return None;
            }
            let normalized = mapper?.canvas_to_normalized(point)?;
            Some(OverlayAction::CanvasClick(normalized))
        }
    }
}

pub fn handle_key(state: &OverlayState, key: Key) -> Option<OverlayAction> {
    match key {
        Key::Escape if state.draw_mode() => Some(OverlayAction::CancelDraw),
        Key::Enter if matches!(state.phase, DrawPhase::Rejected { .. }) => Some(OverlayAction::RetrySave),
        _ => None,
    }
}

/// Track whose projected box contains `point`. Boxes are tested in index
/// order and a later match replaces an earlier one.
pub fn hit_test(index: &EventIndex, mapper: &CoordinateMapper, point: Point) -> Option<TrackId> {
    if !mapper.is_meaningful() {
        return None;
    }
    let mut found = None;
    for (track_id, event) in index.iter_latest() {
        let Some(bbox) = event.bbox() else {
            continue;
        };
        if mapper.project_bbox(&bbox).contains(point) {
            found = Some(track_id);
        }
    }
    found
}
