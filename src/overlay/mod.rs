pub mod client;
pub mod event;
pub mod geometry;
pub mod input;
pub mod messages;
pub mod model;
pub mod poller;
pub mod raster;
pub mod render;
pub mod service;
pub mod settings;
pub mod settings_store;
pub mod state;
pub mod zone;

pub use client::{HttpBackend, SafetyBackend};
pub use event::{EventIndex, SafetyEvent, Severity, SeverityClassifier, TrackId, VideoId};
pub use geometry::{CoordinateMapper, NormPoint};
pub use input::{Key, PointerEvent};
pub use messages::OverlayNotice;
pub use model::{DrawCommand, Layer, Scene, SceneRenderer};
pub use raster::RasterRenderer;
pub use render::VideoFrame;
pub use service::{OverlayEngine, PlayerHandle};
pub use settings::OverlaySettings;
pub use state::{OverlayAction, OverlayState};
