use crate::overlay::event::SeverityClassifier;
use crate::overlay::model::Color;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_DANGER_PATTERN: &str = "fall|zone";
pub const DEFAULT_WARNING_PATTERN: &str = "helmet|glove|mask";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api/v1";

const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Palette {
    pub primary: Color,
    pub danger: Color,
    pub safe: Color,
    pub neutral_label: Color,
    pub panel_background: Color,
    pub panel_caption: Color,
    pub zone_fill: Color,
    pub safe_zone_text: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: Color::rgb(0xFF, 0xD7, 0x00),
            danger: Color::rgb(0xFF, 0x3D, 0x00),
            safe: Color::WHITE,
            neutral_label: Color::rgba(255, 255, 255, 230),
            panel_background: Color::rgba(10, 10, 15, 230),
            panel_caption: Color::rgb(0xAA, 0xAA, 0xAA),
            zone_fill: Color::rgba(255, 61, 0, 51),
            safe_zone_text: Color::rgb(0x00, 0xE6, 0x76),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlaySettings {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_event_poll_interval_ms")]
    pub event_poll_interval_ms: u64,
    /// Half-width of the window, in seconds, in which HUD boxes are shown.
    #[serde(default = "default_hud_window_secs")]
    pub hud_window_secs: f64,
    #[serde(default = "default_heatmap_radius")]
    pub heatmap_radius: f64,
    #[serde(default = "default_heatmap_alpha")]
    pub heatmap_alpha: f32,
    #[serde(default = "default_bracket_ratio")]
    pub bracket_ratio: f64,
    #[serde(default = "default_danger_pattern")]
    pub danger_pattern: String,
    #[serde(default = "default_warning_pattern")]
    pub warning_pattern: String,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_event_poll_interval_ms() -> u64 {
    1000
}

fn default_hud_window_secs() -> f64 {
    0.4
}

fn default_heatmap_radius() -> f64 {
    30.0
}

fn default_heatmap_alpha() -> f32 {
    0.4
}

fn default_bracket_ratio() -> f64 {
    0.25
}

fn default_danger_pattern() -> String {
    DEFAULT_DANGER_PATTERN.to_string()
}

fn default_warning_pattern() -> String {
    DEFAULT_WARNING_PATTERN.to_string()
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            event_poll_interval_ms: default_event_poll_interval_ms(),
            hud_window_secs: default_hud_window_secs(),
            heatmap_radius: default_heatmap_radius(),
            heatmap_alpha: default_heatmap_alpha(),
            bracket_ratio: default_bracket_ratio(),
            danger_pattern: default_danger_pattern(),
            warning_pattern: default_warning_pattern(),
            palette: Palette::default(),
            debug_logging: false,
        }
    }
}

impl OverlaySettings {
    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn classifier(&self) -> Result<SeverityClassifier> {
        SeverityClassifier::new(&self.danger_pattern, &self.warning_pattern)
    }

    /// Replace values that would make the overlay misbehave with defaults.
    pub fn sanitize(&mut self) {
        if self.event_poll_interval_ms < MIN_POLL_INTERVAL_MS {
            tracing::warn!(
                interval_ms = self.event_poll_interval_ms,
                "event poll interval too small; clamping"
            );
            self.event_poll_interval_ms = MIN_POLL_INTERVAL_MS;
        }
        if !self.hud_window_secs.is_finite() || self.hud_window_secs <= 0.0 {
            self.hud_window_secs = default_hud_window_secs();
        }
        if !self.heatmap_radius.is_finite() || self.heatmap_radius <= 0.0 {
            self.heatmap_radius = default_heatmap_radius();
        }
        if !self.heatmap_alpha.is_finite() {
            self.heatmap_alpha = default_heatmap_alpha();
        }
        self.heatmap_alpha = self.heatmap_alpha.clamp(0.0, 1.0);
        if !self.bracket_ratio.is_finite() || !(0.0..=0.5).contains(&self.bracket_ratio) {
            self.bracket_ratio = default_bracket_ratio();
        }
        if self.classifier().is_err() {
            tracing::warn!("invalid severity patterns in settings; using defaults");
            self.danger_pattern = default_danger_pattern();
            self.warning_pattern = default_warning_pattern();
        }
        let trimmed = self.backend_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            self.backend_url = default_backend_url();
        } else if trimmed.len() != self.backend_url.len() {
            self.backend_url = trimmed.to_string();
        }
    }
}
