use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Same color with its alpha scaled by `alpha` (0.0..=1.0).
    pub fn with_alpha(self, alpha: f32) -> Self {
        let a = (self.a as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// A point in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Point at parameter `t` along `self..other`.
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Axis-aligned rectangle in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub width: f64,
    pub color: Color,
    /// `(dash, gap)` lengths; `None` is a solid line.
    pub dash: Option<(f64, f64)>,
}

impl StrokeStyle {
    pub const fn solid(width: f64, color: Color) -> Self {
        Self {
            width,
            color,
            dash: None,
        }
    }

    pub const fn dashed(width: f64, color: Color, dash: f64, gap: f64) -> Self {
        Self {
            width,
            color,
            dash: Some((dash, gap)),
        }
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self::solid(2.0, Color::WHITE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontStyle {
    pub size: f64,
    pub bold: bool,
}

impl FontStyle {
    pub const fn regular(size: f64) -> Self {
        Self { size, bold: false }
    }

    pub const fn bold(size: f64) -> Self {
        Self { size, bold: true }
    }
}

/// One primitive of an overlay frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Clear {
        width: u32,
        height: u32,
    },
    /// Open polyline; a set of disjoint segments when drawn as brackets.
    Polyline {
        points: Vec<Point>,
        stroke: StrokeStyle,
    },
    Polygon {
        points: Vec<Point>,
        fill: Option<Color>,
        stroke: Option<StrokeStyle>,
    },
    FillRect {
        rect: Rect,
        color: Color,
    },
    StrokeRect {
        rect: Rect,
        stroke: StrokeStyle,
    },
    FillCircle {
        center: Point,
        radius: f64,
        color: Color,
    },
    /// `origin` is the text baseline start.
    Text {
        origin: Point,
        text: String,
        font: FontStyle,
        color: Color,
    },
}

/// Which part of the pipeline emitted a group of commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Background,
    Zone,
    Heatmap,
    Hud,
    Hover,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredCommand {
    pub layer: Layer,
    pub command: DrawCommand,
}

/// Declarative list of commands describing one complete overlay frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub commands: Vec<LayeredCommand>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: vec![LayeredCommand {
                layer: Layer::Background,
                command: DrawCommand::Clear { width, height },
            }],
        }
    }

    pub fn push(&mut self, layer: Layer, command: DrawCommand) {
        self.commands.push(LayeredCommand { layer, command });
    }

    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &DrawCommand> + '_ {
        self.commands
            .iter()
            .filter(move |entry| entry.layer == layer)
            .map(|entry| &entry.command)
    }

    pub fn has_layer(&self, layer: Layer) -> bool {
        self.layer(layer).next().is_some()
    }

    /// Text of every label in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|entry| match &entry.command {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Layers in the order they first appear; used to check z-ordering.
    pub fn layer_order(&self) -> Vec<Layer> {
        let mut order: Vec<Layer> = Vec::new();
        for entry in &self.commands {
            if order.last() != Some(&entry.layer) {
                order.push(entry.layer);
            }
        }
        order
    }
}

/// Executes scenes against a drawing surface.
pub trait SceneRenderer {
    fn execute(&mut self, scene: &Scene);
}

/// Keeps the last executed scene; handy for hosts that paint elsewhere.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: usize,
    pub last: Option<Scene>,
}

impl SceneRenderer for RecordingRenderer {
    fn execute(&mut self, scene: &Scene) {
        self.frames += 1;
        self.last = Some(scene.clone());
    }
}
