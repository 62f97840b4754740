use crate::overlay::geometry::{polygon_contains, NormPoint};
use serde::{Deserialize, Serialize};

/// Number of vertices a drawn zone must have before it is committed.
pub const ZONE_VERTEX_COUNT: usize = 4;

pub const DANGER_ZONE_LABEL: &str = "Danger Zone";
pub const SAFE_ZONE_LABEL: &str = "Safe Zone";

/// Ordered normalized polygon describing a restricted area.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZonePolygon {
    points: Vec<NormPoint>,
}

impl ZonePolygon {
    pub fn new(points: Vec<NormPoint>) -> Self {
        Self { points }
    }

    /// Build from backend `[x, y]` pairs, dropping pairs outside [0,1]².
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Self {
        let points: Vec<NormPoint> = pairs
            .iter()
            .copied()
            .map(NormPoint::from)
            .filter(NormPoint::is_valid)
            .collect();
        if points.len() != pairs.len() {
            tracing::warn!(
                dropped = pairs.len() - points.len(),
                "ignoring zone points outside the normalized range"
            );
        }
        Self { points }
    }

    pub fn points(&self) -> &[NormPoint] {
        &self.points
    }

    pub fn to_pairs(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| p.to_pair()).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A polygon needs three vertices to enclose anything.
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 3
    }

    pub fn contains(&self, point: NormPoint) -> bool {
        polygon_contains(&self.points, point)
    }

    /// Zone label for a normalized position, matching the backend's wording.
    pub fn classify_point(&self, point: NormPoint) -> &'static str {
        if self.contains(point) {
            DANGER_ZONE_LABEL
        } else {
            SAFE_ZONE_LABEL
        }
    }
}

/// The persisted zone and the one being drawn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZoneStore {
    active: Option<ZonePolygon>,
    draft: Vec<NormPoint>,
}

impl ZoneStore {
    pub fn active(&self) -> Option<&ZonePolygon> {
        self.active.as_ref()
    }

    pub fn draft(&self) -> &[NormPoint] {
        &self.draft
    }

    pub fn draft_is_full(&self) -> bool {
        self.draft.len() >= ZONE_VERTEX_COUNT
    }

    /// Empty polygons clear the active zone.
    pub fn with_active(&self, zone: ZonePolygon) -> Self {
        Self {
            active: (!zone.is_empty()).then_some(zone),
            draft: self.draft.clone(),
        }
    }

    pub fn with_draft_point(&self, point: NormPoint) -> Self {
        let mut next = self.clone();
        if !next.draft_is_full() {
            next.draft.push(point);
        }
        next
    }

    pub fn without_draft(&self) -> Self {
        Self {
            active: self.active.clone(),
            draft: Vec::new(),
        }
    }

    /// Promote the draft to the active zone.
    pub fn committed(&self) -> Self {
        Self {
            active: Some(ZonePolygon::new(self.draft.clone())),
            draft: Vec::new(),
        }
    }
}
