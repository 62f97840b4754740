use anyhow::Result;
use safety_overlay::overlay::event::{EventIndex, SafetyEvent};
use safety_overlay::overlay::model::{Layer, RecordingRenderer};
use safety_overlay::overlay::raster::RasterRenderer;
use safety_overlay::overlay::render::{RenderPipeline, VideoFrame};
use safety_overlay::overlay::settings::OverlaySettings;
use safety_overlay::overlay::state::{OverlayAction, OverlayState};
use safety_overlay::overlay::zone::ZonePolygon;

fn frame() -> VideoFrame {
    VideoFrame {
        current_time: 1.0,
        native_size: (1920, 1080),
        display_size: (960, 540),
    }
}

fn state_with_zone() -> OverlayState {
    OverlayState::default()
        .reduce(OverlayAction::SelectVideo(Some(1)))
        .state
        .reduce(OverlayAction::ZoneLoaded(ZonePolygon::from_pairs(&[
            [0.5, 0.5],
            [0.9, 0.5],
            [0.9, 0.9],
            [0.5, 0.9],
        ])))
        .state
}

#[test]
fn zone_fill_lands_inside_the_polygon_only() -> Result<()> {
    let settings = OverlaySettings::default();
    let mut pipeline = RenderPipeline::new(&settings, RasterRenderer::default())?;
    pipeline.render(&frame(), &state_with_zone(), &EventIndex::default());

    let raster = pipeline.renderer();
    assert_eq!(raster.size(), (960, 540));
    let inside = raster.pixel(700, 400).expect("inside pixel");
    assert_eq!(&inside[..3], &[255, 61, 0]);
    assert!(inside[3] > 0);
    assert_eq!(raster.pixel(100, 100), Some([0, 0, 0, 0]));
    Ok(())
}

#[test]
fn hud_brackets_use_the_warning_color() -> Result<()> {
    let settings = OverlaySettings::default();
    let primary = settings.palette.primary;
    let mut pipeline = RenderPipeline::new(&settings, RasterRenderer::default())?;
    let index = EventIndex::from_batch(vec![
        SafetyEvent::new("no_helmet", 7, 1.0).with_bbox([100.0, 100.0, 300.0, 300.0])
    ]);
    let state = OverlayState::default()
        .reduce(OverlayAction::SelectVideo(Some(1)))
        .state;
    pipeline.render(&frame(), &state, &index);

    // Top-left bracket corner of the box projected to (50,50)-(150,150).
    let corner = pipeline.renderer().pixel(50, 60).expect("corner pixel");
    assert_eq!(corner, [primary.r, primary.g, primary.b, 255]);
    Ok(())
}

#[test]
fn unaligned_events_skip_the_hud_but_feed_the_heatmap() -> Result<()> {
    let batch: Vec<SafetyEvent> = serde_json::from_value(serde_json::json!([
        {"type": "no_helmet", "track_id": 7, "video_timestamp": 1.0,
         "bbox": [100.0, 100.0, 300.0, 300.0], "action": "walking"},
        {"type": null, "track_id": 8, "video_timestamp": null,
         "bbox": [1000.0, 600.0, 1200.0, 800.0]}
    ]))?;
    let index = EventIndex::from_batch(batch);
    let settings = OverlaySettings::default();
    let mut pipeline = RenderPipeline::new(&settings, RecordingRenderer::default())?;
    let state = OverlayState::default()
        .reduce(OverlayAction::SelectVideo(Some(1)))
        .state;

    let scene = pipeline.render(&frame(), &state, &index);
    let labels = scene.texts();
    assert!(labels.contains(&"ID:7 | WALKING"));
    assert!(!labels.iter().any(|label| label.starts_with("ID:8")));

    let state = state.reduce(OverlayAction::ShowHeatmap).state;
    let scene = pipeline.render(&frame(), &state, &index);
    let blobs = scene
        .commands
        .iter()
        .filter(|command| command.layer == Layer::Heatmap)
        .count();
    assert_eq!(blobs, 2);
    Ok(())
}

#[test]
fn snapshot_is_written_as_png() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("overlay.png");
    let settings = OverlaySettings::default();
    let mut pipeline = RenderPipeline::new(&settings, RasterRenderer::default())?;
    pipeline.render(&frame(), &state_with_zone(), &EventIndex::default());
    pipeline.renderer().save_png(&path)?;

    let image = image::open(&path)?.to_rgba8();
    assert_eq!(image.dimensions(), (960, 540));
    Ok(())
}
