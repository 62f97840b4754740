use anyhow::{anyhow, Result};
use safety_overlay::overlay::client::SafetyBackend;
use safety_overlay::overlay::event::{SafetyEvent, VideoId};
use safety_overlay::overlay::input::{Key, PointerEvent};
use safety_overlay::overlay::messages::OverlayNotice;
use safety_overlay::overlay::model::{Layer, Point, RecordingRenderer};
use safety_overlay::overlay::render::VideoFrame;
use safety_overlay::overlay::service::OverlayEngine;
use safety_overlay::overlay::settings::OverlaySettings;
use safety_overlay::overlay::state::DrawPhase;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct ScriptedBackend {
    events: Mutex<HashMap<VideoId, Vec<SafetyEvent>>>,
    zones: Mutex<HashMap<VideoId, Vec<[f64; 2]>>>,
    fail_saves: AtomicBool,
    save_calls: AtomicUsize,
    reprocess_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn with_events(self, video_id: VideoId, events: Vec<SafetyEvent>) -> Self {
        self.events.lock().expect("events lock").insert(video_id, events);
        self
    }
}

impl SafetyBackend for ScriptedBackend {
    fn fetch_events(&self, video_id: VideoId) -> Result<Vec<SafetyEvent>> {
        Ok(self
            .events
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .get(&video_id)
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_zone(&self, video_id: VideoId) -> Result<Vec<[f64; 2]>> {
        Ok(self
            .zones
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .get(&video_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_zone(&self, video_id: VideoId, points: &[[f64; 2]]) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("503 service unavailable"));
        }
        self.zones
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .insert(video_id, points.to_vec());
        Ok(())
    }

    fn reprocess(&self, _video_id: VideoId) -> Result<()> {
        self.reprocess_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn settings() -> OverlaySettings {
    let mut settings = OverlaySettings::default();
    settings.event_poll_interval_ms = 100;
    settings
}

fn frame(current_time: f64) -> VideoFrame {
    VideoFrame {
        current_time,
        native_size: (1920, 1080),
        display_size: (960, 540),
    }
}

fn wait_for(
    engine: &mut OverlayEngine<RecordingRenderer>,
    done: impl Fn(&OverlayEngine<RecordingRenderer>) -> bool,
) {
    for _ in 0..100 {
        engine.pump_messages_timeout(Duration::from_millis(50));
        if done(engine) {
            return;
        }
    }
    panic!("engine never reached the expected state");
}

fn draw_square(engine: &mut OverlayEngine<RecordingRenderer>) {
    for (x, y) in [(96.0, 54.0), (864.0, 54.0), (864.0, 486.0), (96.0, 486.0)] {
        engine.pointer(PointerEvent::Click(Point::new(x, y)));
    }
}

#[test]
fn switching_videos_never_shows_previous_geometry() -> Result<()> {
    let backend = ScriptedBackend::default()
        .with_events(
            1,
            vec![SafetyEvent::new("no_helmet", 7, 1.0)
                .with_bbox([100.0, 100.0, 300.0, 300.0])
                .with_action("walking")],
        )
        .with_events(2, vec![SafetyEvent::new("fall", 9, 1.0).with_bbox([0.0, 0.0, 50.0, 50.0])]);
    backend.zones.lock().expect("zones lock").insert(
        1,
        vec![[0.1, 0.1], [0.5, 0.1], [0.5, 0.5], [0.1, 0.5]],
    );
    let mut engine = OverlayEngine::new(settings(), Arc::new(backend), RecordingRenderer::default())?;

    engine.select_video(Some(1), None);
    wait_for(&mut engine, |e| e.index().latest(7).is_some());
    let scene = engine.on_time_update(frame(1.1));
    assert!(scene.texts().contains(&"ID:7 | WALKING"));
    assert!(scene.has_layer(Layer::Zone));

    engine.select_video(Some(2), None);
    let scene = engine.on_time_update(frame(1.1));
    assert!(!scene.texts().iter().any(|t| t.starts_with("ID:7")));
    assert!(!scene.has_layer(Layer::Zone));

    wait_for(&mut engine, |e| e.index().latest(9).is_some());
    assert!(engine.index().latest(7).is_none());
    Ok(())
}

#[test]
fn failed_save_can_be_retried_from_the_keyboard() -> Result<()> {
    let backend = Arc::new(
        ScriptedBackend::default().with_events(5, vec![SafetyEvent::new("walking", 1, 30.0)]),
    );
    backend.fail_saves.store(true, Ordering::SeqCst);
    let mut engine = OverlayEngine::new(settings(), backend.clone(), RecordingRenderer::default())?;
    engine.select_video(Some(5), None);
    // The initial zone fetch lands before the first event batch.
    wait_for(&mut engine, |e| !e.index().is_empty());
    engine.on_time_update(frame(0.0));

    engine.toggle_draw_mode();
    draw_square(&mut engine);
    wait_for(&mut engine, |e| matches!(e.state().phase, DrawPhase::Rejected { .. }));
    assert_eq!(engine.state().zones.draft().len(), 4);
    let notices = engine.take_notices();
    assert!(matches!(
        notices.as_slice(),
        [OverlayNotice::ZoneSaveFailed { error }] if error.contains("503")
    ));

    backend.fail_saves.store(false, Ordering::SeqCst);
    engine.key(Key::Enter);
    assert_eq!(engine.state().phase, DrawPhase::Committing);
    wait_for(&mut engine, |e| e.state().phase == DrawPhase::Idle);

    assert_eq!(backend.save_calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.take_notices(), vec![OverlayNotice::ZoneSaved]);
    let active = engine.state().zones.active().expect("zone committed");
    assert_eq!(active.len(), 4);
    Ok(())
}

#[test]
fn escape_discards_a_partial_draft() -> Result<()> {
    let backend = Arc::new(ScriptedBackend::default());
    let mut engine = OverlayEngine::new(settings(), backend.clone(), RecordingRenderer::default())?;
    engine.select_video(Some(5), None);
    engine.on_time_update(frame(0.0));

    engine.toggle_draw_mode();
    engine.pointer(PointerEvent::Click(Point::new(96.0, 54.0)));
    let scene = engine
        .pointer(PointerEvent::Click(Point::new(864.0, 54.0)))
        .expect("click re-renders");
    assert!(scene.has_layer(Layer::Zone));

    engine.key(Key::Escape);
    assert!(!engine.state().draw_mode());
    assert!(engine.state().zones.draft().is_empty());
    assert_eq!(backend.save_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn hover_panel_follows_the_pointer() -> Result<()> {
    let backend = ScriptedBackend::default().with_events(
        3,
        vec![SafetyEvent::new("no_helmet", 7, 1.0)
            .with_bbox([100.0, 100.0, 300.0, 300.0])
            .with_zone("Danger Zone")],
    );
    let mut engine = OverlayEngine::new(settings(), Arc::new(backend), RecordingRenderer::default())?;
    engine.select_video(Some(3), None);
    wait_for(&mut engine, |e| !e.index().is_empty());
    engine.on_time_update(frame(1.0));

    let scene = engine
        .pointer(PointerEvent::Move(Point::new(60.0, 60.0)))
        .expect("hover re-renders");
    assert!(scene.has_layer(Layer::Hover));
    assert_eq!(engine.state().hover, Some(7));

    let scene = engine.pointer(PointerEvent::Leave).expect("leave re-renders");
    assert!(!scene.has_layer(Layer::Hover));
    Ok(())
}

#[test]
fn reprocess_clears_events_until_next_poll() -> Result<()> {
    let backend = Arc::new(
        ScriptedBackend::default().with_events(4, vec![SafetyEvent::new("fall", 1, 0.0)]),
    );
    let mut settings = settings();
    settings.event_poll_interval_ms = 60_000;
    let mut engine = OverlayEngine::new(settings, backend.clone(), RecordingRenderer::default())?;
    engine.select_video(Some(4), None);
    wait_for(&mut engine, |e| !e.index().is_empty());

    assert!(engine.reprocess());
    wait_for(&mut engine, |e| e.index().is_empty());
    assert_eq!(backend.reprocess_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn heatmap_and_hud_are_exclusive_through_the_engine() -> Result<()> {
    let backend = ScriptedBackend::default().with_events(
        1,
        vec![SafetyEvent::new("no_helmet", 7, 1.0).with_bbox([100.0, 100.0, 300.0, 300.0])],
    );
    let mut engine = OverlayEngine::new(settings(), Arc::new(backend), RecordingRenderer::default())?;
    engine.select_video(Some(1), None);
    wait_for(&mut engine, |e| !e.index().is_empty());

    engine.show_heatmap();
    let scene = engine.on_time_update(frame(1.0));
    assert!(scene.has_layer(Layer::Heatmap));
    assert!(!scene.has_layer(Layer::Hud));

    engine.show_hud();
    let scene = engine.on_time_update(frame(1.0));
    assert!(scene.has_layer(Layer::Hud));
    assert!(!scene.has_layer(Layer::Heatmap));
    Ok(())
}

#[test]
fn player_handle_is_usable_from_another_thread() -> Result<()> {
    let mut engine = OverlayEngine::new(
        settings(),
        Arc::new(ScriptedBackend::default()),
        RecordingRenderer::default(),
    )?;
    let handle = engine.player_handle();
    std::thread::spawn(move || {
        handle.seek_to(42.0);
        handle.seek_to(-1.0);
    })
    .join()
    .map_err(|_| anyhow!("seek thread panicked"))?;
    assert_eq!(engine.take_seek_requests(), vec![42.0, 0.0]);
    Ok(())
}
