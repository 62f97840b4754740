use crate::overlay::model::{Color, DrawCommand, Point, Rect, Scene, SceneRenderer, StrokeStyle};
use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// CPU frame buffer that executes overlay scenes into straight RGBA pixels.
///
/// Text commands carry no glyph data and are counted instead of drawn; label
/// backgrounds are separate rectangles and do appear.
#[derive(Debug, Default)]
pub struct RasterRenderer {
    rgba: Vec<u8>,
    size: (u32, u32),
    skipped_text: usize,
    #[cfg(test)]
    allocation_count: usize,
}

impl SceneRenderer for RasterRenderer {
    fn execute(&mut self, scene: &Scene) {
        self.skipped_text = 0;
        for entry in &scene.commands {
            self.draw(&entry.command);
        }
    }
}

impl RasterRenderer {
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn rgba_pixels(&self) -> &[u8] {
        &self.rgba
    }

    pub fn skipped_text(&self) -> usize {
        self.skipped_text
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.0 || y >= self.size.1 {
            return None;
        }
        let idx = ((y * self.size.0 + x) * 4) as usize;
        self.rgba
            .get(idx..idx + 4)
            .and_then(|px| <[u8; 4]>::try_from(px).ok())
    }

    pub fn painted_pixels(&self) -> usize {
        self.rgba.chunks_exact(4).filter(|px| px[3] != 0).count()
    }

    pub fn to_image(&self) -> Result<image::RgbaImage> {
        image::RgbaImage::from_raw(self.size.0, self.size.1, self.rgba.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {:?}", self.size))
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write overlay snapshot {}", path.display()))
    }

    #[cfg(test)]
    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    fn ensure_size(&mut self, size: (u32, u32)) {
        let target_len = (size.0 as usize)
            .saturating_mul(size.1 as usize)
            .saturating_mul(4);
        if self.size != size || self.rgba.len() != target_len {
            self.rgba = vec![0; target_len];
            self.size = size;
            #[cfg(test)]
            {
                self.allocation_count += 1;
            }
        }
    }

    fn draw(&mut self, command: &DrawCommand) {
        match command {
            DrawCommand::Clear { width, height } => {
                self.ensure_size((*width, *height));
                self.rgba.fill(0);
            }
            DrawCommand::Polyline { points, stroke } => self.stroke_polyline(points, *stroke),
            DrawCommand::Polygon {
                points,
                fill,
                stroke,
            } => {
                if let Some(color) = fill {
                    self.fill_polygon(points, *color);
                }
                if let Some(stroke) = stroke {
                    let mut closed = points.clone();
                    if let Some(first) = points.first() {
                        closed.push(*first);
                    }
                    self.stroke_polyline(&closed, *stroke);
                }
            }
            DrawCommand::FillRect { rect, color } => self.fill_rect(*rect, *color),
            DrawCommand::StrokeRect { rect, stroke } => {
                let corners = [
                    Point::new(rect.x, rect.y),
                    Point::new(rect.right(), rect.y),
                    Point::new(rect.right(), rect.bottom()),
                    Point::new(rect.x, rect.bottom()),
                    Point::new(rect.x, rect.y),
                ];
                self.stroke_polyline(&corners, *stroke);
            }
            DrawCommand::FillCircle {
                center,
                radius,
                color,
            } => self.fill_circle(*center, *radius, *color),
            DrawCommand::Text { .. } => {
                self.skipped_text += 1;
            }
        }
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.size.0) && y < i64::from(self.size.1)
    }

    fn pixel_index(&self, x: i64, y: i64) -> usize {
        ((y as usize) * (self.size.0 as usize) + x as usize) * 4
    }

    fn blend_pixel(&mut self, x: i64, y: i64, color: Color) {
        if !self.contains(x, y) {
            return;
        }
        let idx = self.pixel_index(x, y);
        let Some(dst) = self.rgba.get_mut(idx..idx + 4) else {
            return;
        };
        let src_a = color.a as f32 / 255.0;
        if src_a <= 0.0 {
            return;
        }
        let dst_a = dst[3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        let channel = |src: u8, dst: u8| -> u8 {
            let value =
                (src as f32 * src_a + dst as f32 * dst_a * (1.0 - src_a)) / out_a.max(f32::EPSILON);
            value.round().clamp(0.0, 255.0) as u8
        };
        dst[0] = channel(color.r, dst[0]);
        dst[1] = channel(color.g, dst[1]);
        dst[2] = channel(color.b, dst[2]);
        dst[3] = (out_a * 255.0).round() as u8;
    }

    /// Clamp a pixel coordinate range to `0..=limit - 1`, or `None` when it
    /// misses the canvas entirely.
    fn clamp_span(low: f64, high: f64, limit: u32) -> Option<(i64, i64)> {
        let max = f64::from(limit) - 1.0;
        if limit == 0 || high < 0.0 || low > max {
            return None;
        }
        Some((low.max(0.0) as i64, high.min(max) as i64))
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if ![rect.x, rect.y, rect.width, rect.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return;
        }
        let x0 = rect.x.min(rect.right()).round();
        let x1 = rect.x.max(rect.right()).round() - 1.0;
        let y0 = rect.y.min(rect.bottom()).round();
        let y1 = rect.y.max(rect.bottom()).round() - 1.0;
        let (Some((x0, x1)), Some((y0, y1))) = (
            Self::clamp_span(x0, x1, self.size.0),
            Self::clamp_span(y0, y1, self.size.1),
        ) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.blend_pixel(x, y, color);
            }
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) {
        if !(radius.is_finite() && radius > 0.0 && center.x.is_finite() && center.y.is_finite()) {
            return;
        }
        let (cx, cy) = (center.x.round(), center.y.round());
        let reach = radius.ceil();
        let (Some((x0, x1)), Some((y0, y1))) = (
            Self::clamp_span(cx - reach, cx + reach, self.size.0),
            Self::clamp_span(cy - reach, cy + reach, self.size.1),
        ) else {
            return;
        };
        let r_sq = radius * radius;
        for y in y0..=y1 {
            let dy = y as f64 - cy;
            for x in x0..=x1 {
                let dx = x as f64 - cx;
                if dx * dx + dy * dy <= r_sq {
                    self.blend_pixel(x, y, color);
                }
            }
        }
    }

    /// Even-odd scanline fill sampled at pixel centers.
    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        if !(min_y.is_finite() && max_y.is_finite()) {
            return;
        }
        let Some((y_start, y_end)) = Self::clamp_span(min_y.floor(), max_y.ceil(), self.size.1)
        else {
            return;
        };
        let mut crossings: Vec<f64> = Vec::with_capacity(points.len());
        for y in y_start..=y_end {
            let sample_y = y as f64 + 0.5;
            crossings.clear();
            let mut j = points.len() - 1;
            for i in 0..points.len() {
                let (a, b) = (points[i], points[j]);
                if (a.y > sample_y) != (b.y > sample_y) {
                    crossings.push(a.x + (sample_y - a.y) * (b.x - a.x) / (b.y - a.y));
                }
                j = i;
            }
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks_exact(2) {
                let span = Self::clamp_span(
                    (pair[0] - 0.5).ceil(),
                    (pair[1] - 0.5).floor(),
                    self.size.0,
                );
                if let Some((x0, x1)) = span {
                    for x in x0..=x1 {
                        self.blend_pixel(x, y, color);
                    }
                }
            }
        }
    }

    /// Brush radius in pixels; a brush wider than the canvas covers it anyway.
    fn brush_radius(&self, stroke: StrokeStyle) -> i64 {
        let limit = f64::from(self.size.0.max(self.size.1)) + 1.0;
        ((stroke.width.max(1.0).min(limit) - 1.0) / 2.0).round() as i64
    }

    fn stroke_polyline(&mut self, points: &[Point], stroke: StrokeStyle) {
        if points.is_empty() {
            return;
        }
        let radius = self.brush_radius(stroke);
        if points.len() == 1 {
            let p = points[0];
            if self.clip_segment(p, p, radius).is_some() {
                self.draw_brush((p.x.round() as i64, p.y.round() as i64), radius, stroke.color);
            }
            return;
        }
        let mut dash = stroke.dash.map(DashCursor::new);
        for segment in points.windows(2) {
            let (start, end) = (segment[0], segment[1]);
            let length = start.distance(end);
            let Some((t0, t1)) = self.clip_segment(start, end, radius) else {
                if let Some(dash) = dash.as_mut() {
                    dash.advance(length);
                }
                continue;
            };
            let a = if t0 > 0.0 { start.lerp(end, t0) } else { start };
            let b = if t1 < 1.0 { start.lerp(end, t1) } else { end };
            match dash.as_mut() {
                None => self.draw_segment(a, b, radius, stroke.color),
                Some(dash) => {
                    dash.advance(length * t0);
                    for (from, to) in dash.visible_parts(a, b) {
                        self.draw_segment(from, to, radius, stroke.color);
                    }
                    dash.advance(length * (1.0 - t1));
                }
            }
        }
    }

    /// Liang-Barsky clip of `start..end` against the canvas grown by the brush
    /// radius. Returns the visible parameter range along the segment.
    fn clip_segment(&self, start: Point, end: Point, radius: i64) -> Option<(f64, f64)> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return None;
        }
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        if ![start.x, start.y, dx, dy].iter().all(|v| v.is_finite()) {
            return None;
        }
        let margin = radius as f64 + 1.0;
        let (min_x, min_y) = (-margin, -margin);
        let max_x = f64::from(self.size.0) - 1.0 + margin;
        let max_y = f64::from(self.size.1) - 1.0 + margin;

        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        for (p, q) in [
            (-dx, start.x - min_x),
            (dx, max_x - start.x),
            (-dy, start.y - min_y),
            (dy, max_y - start.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        Some((t0, t1))
    }

    /// Bresenham between two points already clipped near the canvas.
    fn draw_segment(&mut self, start: Point, end: Point, radius: i64, color: Color) {
        if ![start.x, start.y, end.x, end.y].iter().all(|v| v.is_finite()) {
            return;
        }
        let mut x0 = start.x.round() as i64;
        let mut y0 = start.y.round() as i64;
        let x1 = end.x.round() as i64;
        let y1 = end.y.round() as i64;

        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.draw_brush((x0, y0), radius, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn draw_brush(&mut self, center: (i64, i64), radius: i64, color: Color) {
        let (cx, cy) = center;
        let x_range = (cx - radius).max(0)..=(cx + radius).min(i64::from(self.size.0) - 1);
        let y_range = (cy - radius).max(0)..=(cy + radius).min(i64::from(self.size.1) - 1);
        for y in y_range {
            for x in x_range.clone() {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= radius * radius {
                    self.set_opaque_or_blend(x, y, color);
                }
            }
        }
    }

    /// Overlapping brush stamps would compound translucent strokes.
    fn set_opaque_or_blend(&mut self, x: i64, y: i64, color: Color) {
        if color.a == 255 {
            if !self.contains(x, y) {
                return;
            }
            let idx = self.pixel_index(x, y);
            if let Some(dst) = self.rgba.get_mut(idx..idx + 4) {
                dst.copy_from_slice(&[color.r, color.g, color.b, color.a]);
            }
        } else {
            self.blend_pixel(x, y, color);
        }
    }
}

/// Carries dash phase across the segments of one polyline.
struct DashCursor {
    on: f64,
    off: f64,
    offset: f64,
}

impl DashCursor {
    fn new((on, off): (f64, f64)) -> Self {
        Self {
            on: on.max(0.5),
            off: off.max(0.0),
            offset: 0.0,
        }
    }

    fn period(&self) -> f64 {
        self.on + self.off
    }

    /// Move the phase along a stretch of the line that is not drawn.
    fn advance(&mut self, length: f64) {
        let period = self.period();
        if length.is_finite() && period.is_finite() {
            self.offset = (self.offset + length) % period;
        }
    }

    fn visible_parts(&mut self, start: Point, end: Point) -> Vec<(Point, Point)> {
        let length = start.distance(end);
        let mut parts = Vec::new();
        if !length.is_finite() || length == 0.0 {
            return parts;
        }
        let period = self.period();
        let along = |t: f64| start.lerp(end, t / length);
        let mut travelled = 0.0;
        while travelled < length {
            let phase = self.offset % period;
            let (visible, remaining) = if phase < self.on {
                (true, self.on - phase)
            } else {
                (false, period - phase)
            };
            let step = remaining.min(length - travelled);
            if visible {
                parts.push((along(travelled), along(travelled + step)));
            }
            travelled += step;
            self.offset = (self.offset + step) % period;
        }
        parts
    }
}
