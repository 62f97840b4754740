use crate::overlay::event::{SafetyEvent, VideoId};

/// Identifies one video selection. Workers stamp every message with the
/// generation they were spawned for.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    EventsFetched {
        generation: Generation,
        events: Vec<SafetyEvent>,
    },
    ZoneFetched {
        generation: Generation,
        points: Vec<[f64; 2]>,
    },
    ZoneSaved {
        generation: Generation,
        result: Result<(), String>,
    },
    Reprocessed {
        generation: Generation,
        video_id: VideoId,
        result: Result<(), String>,
    },
}

impl WorkerMessage {
    pub fn generation(&self) -> Generation {
        match self {
            Self::EventsFetched { generation, .. }
            | Self::ZoneFetched { generation, .. }
            | Self::ZoneSaved { generation, .. }
            | Self::Reprocessed { generation, .. } => *generation,
        }
    }
}

/// User-facing notifications the host surfaces (toasts, dialogs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayNotice {
    ZoneSaved,
    /// Blocking: the host should show this until acknowledged.
    ZoneSaveFailed { error: String },
    ReprocessStarted { video_id: VideoId },
    ReprocessFailed { video_id: VideoId, error: String },
}

impl OverlayNotice {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::ZoneSaveFailed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackRequest {
    Seek { seconds: f64 },
}
