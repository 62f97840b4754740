//! Per-frame overlay composition.
//!
//! Every time-update produces a complete [`Scene`] in a fixed z-order:
//! zone layer, then heatmap blobs *or* the tactical HUD, then the hover
//! panel. Scenes are pure data; a [`SceneRenderer`] executes them.

use crate::overlay::event::{EventIndex, SafetyEvent, Severity, SeverityClassifier};
use crate::overlay::geometry::{CanvasSurface, CoordinateMapper};
use crate::overlay::model::{
    Color, DrawCommand, FontStyle, Layer, Point, Rect, Scene, SceneRenderer, StrokeStyle,
};
use crate::overlay::settings::{OverlaySettings, Palette};
use crate::overlay::state::{DrawPhase, OverlayState};
use crate::overlay::zone::ZonePolygon;
use anyhow::Result;

const DRAFT_STROKE_WIDTH: f64 = 3.0;
const DRAFT_DASH: (f64, f64) = (5.0, 5.0);
const VERTEX_MARKER: f64 = 8.0;
const ZONE_STROKE_WIDTH: f64 = 2.0;
const ZONE_LABEL: &str = "RESTRICTED";
const ZONE_LABEL_SIZE: (f64, f64) = (100.0, 20.0);
const BRACKET_WIDTH: f64 = 2.0;
const HUD_FONT: FontStyle = FontStyle::bold(11.0);
const HUD_LABEL_HEIGHT: f64 = 18.0;
const HUD_LABEL_PADDING: f64 = 8.0;
const DEFAULT_ACTION: &str = "TRACKING";
const PANEL_OFFSET: f64 = 10.0;
const PANEL_SIZE: (f64, f64) = (180.0, 90.0);
const PANEL_TITLE: &str = "PERSONNEL DATA";
const PANEL_FONT: FontStyle = FontStyle::regular(11.0);
const TITLE_FONT: FontStyle = FontStyle::bold(12.0);
/// Advance of one monospace glyph relative to the font size.
const GLYPH_ADVANCE: f64 = 0.6;

/// What the video element reports at a time-update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrame {
    pub current_time: f64,
    /// Intrinsic resolution; zero until metadata is loaded.
    pub native_size: (u32, u32),
    /// Size the element is displayed at.
    pub display_size: (u32, u32),
}

/// Tunables the composition needs from [`OverlaySettings`].
#[derive(Debug, Clone)]
pub struct SceneStyle {
    pub palette: Palette,
    pub hud_window_secs: f64,
    pub heatmap_radius: f64,
    pub heatmap_alpha: f32,
    pub bracket_ratio: f64,
    pub classifier: SeverityClassifier,
}

impl SceneStyle {
    pub fn from_settings(settings: &OverlaySettings) -> Result<Self> {
        Ok(Self {
            palette: settings.palette,
            hud_window_secs: settings.hud_window_secs,
            heatmap_radius: settings.heatmap_radius,
            heatmap_alpha: settings.heatmap_alpha,
            bracket_ratio: settings.bracket_ratio,
            classifier: settings.classifier()?,
        })
    }
}

pub fn text_width(text: &str, font: FontStyle) -> f64 {
    text.chars().count() as f64 * font.size * GLYPH_ADVANCE
}

/// Build the full frame for the given state at `current_time`.
pub fn compose_scene(
    state: &OverlayState,
    index: &EventIndex,
    mapper: &CoordinateMapper,
    current_time: f64,
    style: &SceneStyle,
) -> Scene {
    let (width, height) = mapper.canvas_size();
    let mut scene = Scene::new(width as u32, height as u32);

    if state.view.show_zones {
        compose_zone_layer(&mut scene, state, mapper, &style.palette);
    }

    if state.view.heatmap() {
        if mapper.is_meaningful() {
            compose_heatmap_layer(&mut scene, index, mapper, style);
        }
        return scene;
    }

    if state.view.hud() && mapper.is_meaningful() {
        compose_hud_layer(&mut scene, index, mapper, current_time, style);
    }

    if let Some(track_id) = state.hover {
        if !state.draw_mode() && mapper.is_meaningful() {
            if let Some(event) = index.latest(track_id) {
                compose_hover_layer(&mut scene, event, mapper, &style.palette);
            }
        }
    }

    scene
}

fn compose_zone_layer(
    scene: &mut Scene,
    state: &OverlayState,
    mapper: &CoordinateMapper,
    palette: &Palette,
) {
    let draft = state.zones.draft();
    if state.draw_mode() && !draft.is_empty() {
        let points: Vec<Point> = draft
            .iter()
            .map(|p| mapper.normalized_to_canvas(*p))
            .collect();
        let stroke_color = match state.phase {
            DrawPhase::Rejected { .. } => palette.danger,
            _ => palette.primary,
        };
        scene.push(
            Layer::Zone,
            DrawCommand::Polyline {
                points: points.clone(),
                stroke: StrokeStyle::dashed(
                    DRAFT_STROKE_WIDTH,
                    stroke_color,
                    DRAFT_DASH.0,
                    DRAFT_DASH.1,
                ),
            },
        );
        let half = VERTEX_MARKER / 2.0;
        for point in points {
            scene.push(
                Layer::Zone,
                DrawCommand::FillRect {
                    rect: Rect::new(point.x - half, point.y - half, VERTEX_MARKER, VERTEX_MARKER),
                    color: Color::WHITE,
                },
            );
        }
        return;
    }

    let Some(zone) = state.zones.active().filter(|zone| zone.is_drawable()) else {
        return;
    };
    compose_active_zone(scene, zone, mapper, palette);
}

fn compose_active_zone(
    scene: &mut Scene,
    zone: &ZonePolygon,
    mapper: &CoordinateMapper,
    palette: &Palette,
) {
    let points: Vec<Point> = zone
        .points()
        .iter()
        .map(|p| mapper.normalized_to_canvas(*p))
        .collect();
    let anchor = points[0];
    scene.push(
        Layer::Zone,
        DrawCommand::Polygon {
            points,
            fill: Some(palette.zone_fill),
            stroke: Some(StrokeStyle::solid(ZONE_STROKE_WIDTH, palette.danger)),
        },
    );
    scene.push(
        Layer::Zone,
        DrawCommand::FillRect {
            rect: Rect::new(
                anchor.x,
                anchor.y - ZONE_LABEL_SIZE.1,
                ZONE_LABEL_SIZE.0,
                ZONE_LABEL_SIZE.1,
            ),
            color: palette.danger,
        },
    );
    scene.push(
        Layer::Zone,
        DrawCommand::Text {
            origin: Point::new(anchor.x + 5.0, anchor.y - 5.0),
            text: ZONE_LABEL.to_string(),
            font: TITLE_FONT,
            color: Color::BLACK,
        },
    );
}

fn compose_heatmap_layer(
    scene: &mut Scene,
    index: &EventIndex,
    mapper: &CoordinateMapper,
    style: &SceneStyle,
) {
    let color = style.palette.danger.with_alpha(style.heatmap_alpha);
    for bbox in index.events().iter().filter_map(SafetyEvent::bbox) {
        let (cx, cy) = bbox.centroid();
        scene.push(
            Layer::Heatmap,
            DrawCommand::FillCircle {
                center: mapper.native_to_canvas(cx, cy),
                radius: style.heatmap_radius,
                color,
            },
        );
    }
}

struct SeverityColors {
    stroke: Color,
    label_background: Color,
    label_text: Color,
}

fn severity_colors(severity: Severity, palette: &Palette) -> SeverityColors {
    match severity {
        Severity::Danger => SeverityColors {
            stroke: palette.danger,
            label_background: palette.danger,
            label_text: Color::WHITE,
        },
        Severity::Warning => SeverityColors {
            stroke: palette.primary,
            label_background: palette.primary,
            label_text: Color::BLACK,
        },
        Severity::Neutral => SeverityColors {
            stroke: palette.safe,
            label_background: palette.neutral_label,
            label_text: Color::BLACK,
        },
    }
}

/// Upper HUD label, e.g. `ID:7 | WALKING`.
pub fn hud_label(event: &SafetyEvent) -> String {
    let action = event
        .action
        .as_deref()
        .filter(|action| !action.trim().is_empty())
        .unwrap_or(DEFAULT_ACTION)
        .to_uppercase();
    match event.track_id {
        Some(track_id) => format!("ID:{track_id} | {action}"),
        None => format!("ID:? | {action}"),
    }
}

fn compose_hud_layer(
    scene: &mut Scene,
    index: &EventIndex,
    mapper: &CoordinateMapper,
    current_time: f64,
    style: &SceneStyle,
) {
    for event in index.active_at(current_time, style.hud_window_secs) {
        let Some(bbox) = event.bbox() else {
            continue;
        };
        let rect = mapper.project_bbox(&bbox);
        let severity = style.classifier.classify(&event.kind);
        let colors = severity_colors(severity, &style.palette);

        let corner = rect.width.min(rect.height) * style.bracket_ratio;
        for bracket in corner_brackets(rect, corner) {
            scene.push(
                Layer::Hud,
                DrawCommand::Polyline {
                    points: bracket.to_vec(),
                    stroke: StrokeStyle::solid(BRACKET_WIDTH, colors.stroke),
                },
            );
        }

        let upper = hud_label(event);
        push_label(
            scene,
            &upper,
            Point::new(rect.x, rect.y - HUD_LABEL_HEIGHT - 2.0),
            Point::new(rect.x + 4.0, rect.y - 8.0),
            &colors,
        );

        if severity.is_violation() {
            let lower = event.display_kind();
            push_label(
                scene,
                &lower,
                Point::new(rect.x, rect.bottom() + 4.0),
                Point::new(rect.x + 4.0, rect.bottom() + 16.0),
                &colors,
            );
        }
    }
}

fn push_label(
    scene: &mut Scene,
    text: &str,
    background_at: Point,
    text_at: Point,
    colors: &SeverityColors,
) {
    scene.push(
        Layer::Hud,
        DrawCommand::FillRect {
            rect: Rect::new(
                background_at.x,
                background_at.y,
                text_width(text, HUD_FONT) + HUD_LABEL_PADDING,
                HUD_LABEL_HEIGHT,
            ),
            color: colors.label_background,
        },
    );
    scene.push(
        Layer::Hud,
        DrawCommand::Text {
            origin: text_at,
            text: text.to_string(),
            font: HUD_FONT,
            color: colors.label_text,
        },
    );
}

/// Four L-shaped corner marks, each `corner` pixels long per arm.
pub fn corner_brackets(rect: Rect, corner: f64) -> [[Point; 3]; 4] {
    let (x, y, r, b) = (rect.x, rect.y, rect.right(), rect.bottom());
    [
        [
            Point::new(x, y + corner),
            Point::new(x, y),
            Point::new(x + corner, y),
        ],
        [
            Point::new(r - corner, y),
            Point::new(r, y),
            Point::new(r, y + corner),
        ],
        [
            Point::new(r, b - corner),
            Point::new(r, b),
            Point::new(r - corner, b),
        ],
        [
            Point::new(x + corner, b),
            Point::new(x, b),
            Point::new(x, b - corner),
        ],
    ]
}

fn compose_hover_layer(
    scene: &mut Scene,
    event: &SafetyEvent,
    mapper: &CoordinateMapper,
    palette: &Palette,
) {
    let Some(bbox) = event.bbox() else {
        return;
    };
    let rect = mapper.project_bbox(&bbox);
    scene.push(
        Layer::Hover,
        DrawCommand::StrokeRect {
            rect,
            stroke: StrokeStyle::solid(2.0, palette.primary),
        },
    );

    let panel = Rect::new(
        rect.right() + PANEL_OFFSET,
        rect.y,
        PANEL_SIZE.0,
        PANEL_SIZE.1,
    );
    scene.push(
        Layer::Hover,
        DrawCommand::FillRect {
            rect: panel,
            color: palette.panel_background,
        },
    );
    scene.push(
        Layer::Hover,
        DrawCommand::StrokeRect {
            rect: panel,
            stroke: StrokeStyle::solid(1.0, palette.primary),
        },
    );

    let zone = event.zone.as_deref().unwrap_or("SAFE");
    let zone_color = if zone.contains("Danger") {
        palette.danger
    } else {
        palette.safe_zone_text
    };
    let track = event
        .track_id
        .map(|id| format!("#{id}"))
        .unwrap_or_else(|| "#?".to_string());
    let action = event.action.as_deref().unwrap_or("N/A");

    let rows: [(&str, f64, f64, FontStyle, Color); 7] = [
        (PANEL_TITLE, 10.0, 20.0, TITLE_FONT, Color::WHITE),
        ("ID:", 10.0, 40.0, PANEL_FONT, palette.panel_caption),
        (track.as_str(), 40.0, 40.0, PANEL_FONT, palette.primary),
        ("STATUS:", 10.0, 55.0, PANEL_FONT, palette.panel_caption),
        (action, 60.0, 55.0, PANEL_FONT, Color::WHITE),
        ("ZONE:", 10.0, 70.0, PANEL_FONT, palette.panel_caption),
        (zone, 60.0, 70.0, PANEL_FONT, zone_color),
    ];
    for (text, dx, dy, font, color) in rows {
        scene.push(
            Layer::Hover,
            DrawCommand::Text {
                origin: Point::new(panel.x + dx, panel.y + dy),
                text: text.to_string(),
                font,
                color,
            },
        );
    }
}

/// Owns the canvas surface and the renderer; the only writer of either.
pub struct RenderPipeline<R: SceneRenderer> {
    style: SceneStyle,
    surface: CanvasSurface,
    renderer: R,
    mapper: Option<CoordinateMapper>,
    passes: u64,
}

impl<R: SceneRenderer> RenderPipeline<R> {
    pub fn new(settings: &OverlaySettings, renderer: R) -> Result<Self> {
        Ok(Self {
            style: SceneStyle::from_settings(settings)?,
            surface: CanvasSurface::default(),
            renderer,
            mapper: None,
            passes: 0,
        })
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn surface(&self) -> &CanvasSurface {
        &self.surface
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Mapper of the most recent pass; `None` before the first frame.
    pub fn mapper(&self) -> Option<&CoordinateMapper> {
        self.mapper.as_ref()
    }

    pub fn forget_frame(&mut self) {
        self.mapper = None;
    }

    /// One synchronous pass for a time-update notification.
    pub fn render(&mut self, frame: &VideoFrame, state: &OverlayState, index: &EventIndex) -> Scene {
        if self.surface.sync_to_display(frame.display_size) {
            tracing::debug!(size = ?self.surface.size(), "overlay canvas resized");
        }
        let mapper = CoordinateMapper::new(frame.native_size, self.surface.size());
        let current_time = if frame.current_time.is_finite() {
            frame.current_time
        } else {
            0.0
        };
        let scene = compose_scene(state, index, &mapper, current_time, &self.style);
        self.renderer.execute(&scene);
        self.mapper = Some(mapper);
        self.passes += 1;
        scene
    }
}
