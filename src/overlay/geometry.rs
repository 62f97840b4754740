//! Native video space, canvas space and normalized space conversions.

use crate::overlay::model::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Backing-store size used when the video element reports no displayed size.
pub const FALLBACK_CANVAS_SIZE: (u32, u32) = (800, 450);

/// A point in [0,1]² relative to the video frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct NormPoint {
    pub x: f64,
    pub y: f64,
}

impl NormPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
    }

    pub fn to_pair(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for NormPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<NormPoint> for [f64; 2] {
    fn from(point: NormPoint) -> Self {
        point.to_pair()
    }
}

/// Axis-aligned box `[x1, y1, x2, y2]` in native video pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// `None` unless the slice holds exactly four finite numbers.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let [x1, y1, x2, y2] = <[f64; 4]>::try_from(values).ok()?;
        if [x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            Some(Self::new(x1, y1, x2, y2))
        } else {
            None
        }
    }

    pub fn centroid(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Canvas backing-store dimensions, kept equal to the displayed video size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSurface {
    width: u32,
    height: u32,
}

impl Default for CanvasSurface {
    fn default() -> Self {
        Self {
            width: FALLBACK_CANVAS_SIZE.0,
            height: FALLBACK_CANVAS_SIZE.1,
        }
    }
}

impl CanvasSurface {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize the backing store when it drifted from the displayed size.
    /// Returns `true` when a resize happened.
    pub fn sync_to_display(&mut self, display: (u32, u32)) -> bool {
        let target = (
            if display.0 == 0 {
                FALLBACK_CANVAS_SIZE.0
            } else {
                display.0
            },
            if display.1 == 0 {
                FALLBACK_CANVAS_SIZE.1
            } else {
                display.1
            },
        );
        if target == self.size() {
            return false;
        }
        self.width = target.0;
        self.height = target.1;
        true
    }
}

/// Scale factors between native video space and the current canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    canvas_w: f64,
    canvas_h: f64,
    scale_x: f64,
    scale_y: f64,
    native_known: bool,
}

impl CoordinateMapper {
    pub fn new(native: (u32, u32), canvas: (u32, u32)) -> Self {
        let native_known = native.0 > 0 && native.1 > 0;
        let video_w = native.0.max(1) as f64;
        let video_h = native.1.max(1) as f64;
        let canvas_w = canvas.0 as f64;
        let canvas_h = canvas.1 as f64;
        Self {
            canvas_w,
            canvas_h,
            scale_x: canvas_w / video_w,
            scale_y: canvas_h / video_h,
            native_known,
        }
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        (self.canvas_w, self.canvas_h)
    }

    /// `false` while the video has not reported its native resolution.
    pub fn is_meaningful(&self) -> bool {
        self.native_known
    }

    pub fn native_to_canvas(&self, x: f64, y: f64) -> Point {
        Point::new(x * self.scale_x, y * self.scale_y)
    }

    pub fn project_bbox(&self, bbox: &BBox) -> Rect {
        let top_left = self.native_to_canvas(bbox.x1, bbox.y1);
        Rect::new(
            top_left.x,
            top_left.y,
            (bbox.x2 - bbox.x1) * self.scale_x,
            (bbox.y2 - bbox.y1) * self.scale_y,
        )
    }

    pub fn normalized_to_canvas(&self, point: NormPoint) -> Point {
        Point::new(point.x * self.canvas_w, point.y * self.canvas_h)
    }

    /// Inverse of [`Self::normalized_to_canvas`], clamped into [0,1]².
    pub fn canvas_to_normalized(&self, point: Point) -> Option<NormPoint> {
        if self.canvas_w <= 0.0 || self.canvas_h <= 0.0 {
            return None;
        }
        let x = point.x / self.canvas_w;
        let y = point.y / self.canvas_h;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some(NormPoint::new(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)))
    }
}

/// Even-odd ray cast; points on an edge count as inside.
pub fn polygon_contains(polygon: &[NormPoint], point: NormPoint) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if on_segment(a, b, point) {
            return true;
        }
        if (a.y > point.y) != (b.y > point.y) {
            let cross_x = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(a: NormPoint, b: NormPoint, p: NormPoint) -> bool {
    const EPS: f64 = 1e-9;
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross.abs() > EPS {
        return false;
    }
    p.x >= a.x.min(b.x) - EPS
        && p.x <= a.x.max(b.x) + EPS
        && p.y >= a.y.min(b.y) - EPS
        && p.y <= a.y.max(b.y) + EPS
}
