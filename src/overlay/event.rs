use crate::overlay::geometry::BBox;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use hashlink::LinkedHashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type TrackId = i64;
pub type VideoId = i64;

/// One detection instance as reported by the analytics backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub kind: String,
    #[serde(default)]
    pub track_id: Option<TrackId>,
    /// Position in the video, in seconds. Unset for events the backend has
    /// not aligned to the timeline yet.
    #[serde(default)]
    pub video_timestamp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

impl SafetyEvent {
    pub fn new(kind: impl Into<String>, track_id: TrackId, video_timestamp: f64) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            track_id: Some(track_id),
            video_timestamp: Some(video_timestamp),
            timestamp: None,
            bbox: None,
            confidence: None,
            action: None,
            zone: None,
        }
    }

    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = Some(bbox.to_vec());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// The box in native pixels, or `None` for non-visual or malformed events.
    pub fn bbox(&self) -> Option<BBox> {
        self.bbox.as_deref().and_then(BBox::from_slice)
    }

    /// Events without a finite video timestamp are never active.
    pub fn is_active_at(&self, time: f64, window: f64) -> bool {
        self.video_timestamp
            .map_or(false, |at| at.is_finite() && (at - time).abs() < window)
    }

    /// Type label for display. Every underscore becomes a space, so
    /// `no_safety_vest` reads `NO SAFETY VEST` rather than `NO SAFETY_VEST`.
    pub fn display_kind(&self) -> String {
        self.kind.to_uppercase().replace('_', " ")
    }
}

/// Decode an event batch entry by entry. A malformed entry is logged and
/// skipped so it cannot take the rest of the batch down with it.
pub fn decode_batch(values: Vec<serde_json::Value>) -> Vec<SafetyEvent> {
    let total = values.len();
    let events: Vec<SafetyEvent> = values
        .into_iter()
        .enumerate()
        .filter_map(|(position, value)| match serde_json::from_value(value) {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(position, error = %err, "skipping malformed event");
                None
            }
        })
        .collect();
    if events.len() < total {
        tracing::debug!(kept = events.len(), total, "event batch partially decoded");
    }
    events
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 as well as the naive ISO strings the backend emits for
/// UTC columns. Anything unparseable becomes `None` instead of failing the
/// whole batch.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Latest event per track plus the full batch it was built from.
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    events: Vec<SafetyEvent>,
    latest: LinkedHashMap<TrackId, SafetyEvent>,
}

impl EventIndex {
    /// Rebuild from a complete batch. Later events replace earlier ones for
    /// the same track but keep that track's original position.
    pub fn from_batch(events: Vec<SafetyEvent>) -> Self {
        let mut latest: LinkedHashMap<TrackId, SafetyEvent> = LinkedHashMap::new();
        for event in &events {
            let Some(track_id) = event.track_id else {
                continue;
            };
            if let Some(slot) = latest.get_mut(&track_id) {
                *slot = event.clone();
            } else {
                latest.insert(track_id, event.clone());
            }
        }
        Self { events, latest }
    }

    pub fn replace(&mut self, events: Vec<SafetyEvent>) {
        *self = Self::from_batch(events);
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.latest.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SafetyEvent] {
        &self.events
    }

    pub fn len_tracks(&self) -> usize {
        self.latest.len()
    }

    pub fn latest(&self, track_id: TrackId) -> Option<&SafetyEvent> {
        self.latest.get(&track_id)
    }

    /// Latest events in index order.
    pub fn iter_latest(&self) -> impl Iterator<Item = (TrackId, &SafetyEvent)> + '_ {
        self.latest.iter().map(|(id, event)| (*id, event))
    }

    /// Events recorded within `window` seconds of `time` (exclusive bound).
    pub fn active_at(&self, time: f64, window: f64) -> impl Iterator<Item = &SafetyEvent> + '_ {
        self.events
            .iter()
            .filter(move |event| event.is_active_at(time, window))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Danger,
    Warning,
    Neutral,
}

impl Severity {
    pub fn is_violation(self) -> bool {
        !matches!(self, Severity::Neutral)
    }
}

/// Maps an event type onto a severity using two regular expressions.
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    danger: Regex,
    warning: Regex,
}

impl SeverityClassifier {
    pub fn new(danger_pattern: &str, warning_pattern: &str) -> Result<Self> {
        let danger = Regex::new(danger_pattern)
            .with_context(|| format!("compile danger pattern {danger_pattern:?}"))?;
        let warning = Regex::new(warning_pattern)
            .with_context(|| format!("compile warning pattern {warning_pattern:?}"))?;
        Ok(Self { danger, warning })
    }

    pub fn classify(&self, kind: &str) -> Severity {
        if self.danger.is_match(kind) {
            Severity::Danger
        } else if self.warning.is_match(kind) {
            Severity::Warning
        } else {
            Severity::Neutral
        }
    }
}
