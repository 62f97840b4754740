use crate::overlay::client::SafetyBackend;
use crate::overlay::event::{EventIndex, VideoId};
use crate::overlay::geometry::NormPoint;
use crate::overlay::input::{handle_key, handle_pointer, Key, PointerEvent};
use crate::overlay::messages::{Generation, OverlayNotice, PlaybackRequest, WorkerMessage};
use crate::overlay::model::{Scene, SceneRenderer};
use crate::overlay::poller::PollTask;
use crate::overlay::render::{RenderPipeline, VideoFrame};
use crate::overlay::settings::OverlaySettings;
use crate::overlay::state::{OverlayAction, OverlayEffect, OverlayState, Transition};
use crate::overlay::zone::{ZonePolygon, SAFE_ZONE_LABEL};
use anyhow::Result;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cloneable handle the host dashboard uses to move the player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: Sender<PlaybackRequest>,
}

impl PlayerHandle {
    /// Queue a seek; negative and NaN times clamp to the start.
    pub fn seek_to(&self, seconds: f64) -> bool {
        let seconds = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
        self.tx.send(PlaybackRequest::Seek { seconds }).is_ok()
    }
}

/// Single-owner overlay for one player element.
///
/// The host drives it from its UI thread: time updates, pointer input and
/// toolbar toggles go in, scenes and notices come out. Backend calls run on
/// worker threads and are folded back in by [`OverlayEngine::tick`].
pub struct OverlayEngine<R: SceneRenderer> {
    backend: Arc<dyn SafetyBackend>,
    poll_interval: Duration,
    state: OverlayState,
    index: EventIndex,
    pipeline: RenderPipeline<R>,
    generation: Generation,
    poll: Option<PollTask>,
    worker_tx: Sender<WorkerMessage>,
    worker_rx: Receiver<WorkerMessage>,
    notices: Vec<OverlayNotice>,
    playback_url: Option<String>,
    seek_tx: Sender<PlaybackRequest>,
    seek_rx: Receiver<PlaybackRequest>,
    last_frame: Option<VideoFrame>,
}

impl<R: SceneRenderer> OverlayEngine<R> {
    pub fn new(
        mut settings: OverlaySettings,
        backend: Arc<dyn SafetyBackend>,
        renderer: R,
    ) -> Result<Self> {
        settings.sanitize();
        let pipeline = RenderPipeline::new(&settings, renderer)?;
        let (worker_tx, worker_rx) = channel();
        let (seek_tx, seek_rx) = channel();
        Ok(Self {
            backend,
            poll_interval: settings.event_poll_interval(),
            state: OverlayState::default(),
            index: EventIndex::default(),
            pipeline,
            generation: 0,
            poll: None,
            worker_tx,
            worker_rx,
            notices: Vec::new(),
            playback_url: None,
            seek_tx,
            seek_rx,
            last_frame: None,
        })
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    pub fn pipeline(&self) -> &RenderPipeline<R> {
        &self.pipeline
    }

    pub fn renderer(&self) -> &R {
        self.pipeline.renderer()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn playback_url(&self) -> Option<&str> {
        self.playback_url.as_deref()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    /// Switch the displayed video. Everything tied to the previous video is
    /// dropped before new polls start.
    pub fn select_video(&mut self, video_id: Option<VideoId>, playback_url: Option<String>) {
        self.playback_url = playback_url;
        self.dispatch(OverlayAction::SelectVideo(video_id));
    }

    pub fn dispatch(&mut self, action: OverlayAction) {
        tracing::trace!(?action, "overlay action");
        let Transition { state, effect } = self.state.reduce(action);
        self.state = state;
        if let Some(effect) = effect {
            self.apply_effect(effect);
        }
    }

    fn apply_effect(&mut self, effect: OverlayEffect) {
        match effect {
            OverlayEffect::ResetSelection { video_id } => self.reset_selection(video_id),
            OverlayEffect::SaveZone { video_id, points } => self.spawn_save(video_id, points),
        }
    }

    fn reset_selection(&mut self, video_id: Option<VideoId>) {
        self.poll = None;
        self.generation += 1;
        self.index.clear();
        self.pipeline.forget_frame();
        self.last_frame = None;
        let Some(video_id) = video_id else {
            tracing::info!("overlay cleared");
            return;
        };
        match PollTask::spawn(
            Arc::clone(&self.backend),
            video_id,
            self.generation,
            self.poll_interval,
            self.worker_tx.clone(),
        ) {
            Ok(task) => {
                tracing::info!(video_id, generation = self.generation, "overlay polling started");
                self.poll = Some(task);
            }
            Err(err) => tracing::error!(video_id, error = %err, "failed to start overlay polling"),
        }
    }

    fn spawn_save(&mut self, video_id: VideoId, points: Vec<NormPoint>) {
        let backend = Arc::clone(&self.backend);
        let tx = self.worker_tx.clone();
        let generation = self.generation;
        let pairs: Vec<[f64; 2]> = points.iter().map(|p| p.to_pair()).collect();
        let spawned = thread::Builder::new()
            .name("overlay-zone-save".to_string())
            .spawn(move || {
                let result = backend
                    .save_zone(video_id, &pairs)
                    .map_err(|err| format!("{err:#}"));
                let _ = tx.send(WorkerMessage::ZoneSaved { generation, result });
            });
        if let Err(err) = spawned {
            self.finish_save(Err(format!("unable to start zone save: {err}")));
        }
    }

    /// Ask the backend to regenerate events for the selected video.
    pub fn reprocess(&mut self) -> bool {
        let Some(video_id) = self.state.video_id else {
            return false;
        };
        let backend = Arc::clone(&self.backend);
        let tx = self.worker_tx.clone();
        let generation = self.generation;
        let spawned = thread::Builder::new()
            .name("overlay-reprocess".to_string())
            .spawn(move || {
                let result = backend.reprocess(video_id).map_err(|err| format!("{err:#}"));
                let _ = tx.send(WorkerMessage::Reprocessed {
                    generation,
                    video_id,
                    result,
                });
            });
        match spawned {
            Ok(_) => {
                self.notices.push(OverlayNotice::ReprocessStarted { video_id });
                true
            }
            Err(err) => {
                self.notices.push(OverlayNotice::ReprocessFailed {
                    video_id,
                    error: err.to_string(),
                });
                false
            }
        }
    }

    /// Apply every worker message that has arrived. Returns how many were
    /// applied; messages from earlier selections are discarded.
    pub fn tick(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.worker_rx.try_recv() {
                Ok(message) => {
                    if self.apply_message(message) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Wait up to `timeout` for the next message, then drain the rest.
    pub fn pump_messages_timeout(&mut self, timeout: Duration) -> usize {
        match self.worker_rx.recv_timeout(timeout) {
            Ok(message) => usize::from(self.apply_message(message)) + self.tick(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply_message(&mut self, message: WorkerMessage) -> bool {
        if message.generation() != self.generation {
            tracing::debug!(
                stale = message.generation(),
                current = self.generation,
                "dropping stale worker message"
            );
            return false;
        }
        match message {
            WorkerMessage::EventsFetched { events, .. } => self.index.replace(events),
            WorkerMessage::ZoneFetched { points, .. } => {
                self.dispatch(OverlayAction::ZoneLoaded(ZonePolygon::from_pairs(&points)));
            }
            WorkerMessage::ZoneSaved { result, .. } => self.finish_save(result),
            WorkerMessage::Reprocessed {
                video_id, result, ..
            } => match result {
                Ok(()) => {
                    tracing::info!(video_id, "reprocess accepted; clearing events");
                    self.index.clear();
                }
                Err(error) => {
                    tracing::warn!(video_id, %error, "reprocess failed");
                    self.notices
                        .push(OverlayNotice::ReprocessFailed { video_id, error });
                }
            },
        }
        true
    }

    fn finish_save(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                tracing::info!(video_id = ?self.state.video_id, "zone saved");
                self.dispatch(OverlayAction::ZoneSaveSucceeded);
                self.notices.push(OverlayNotice::ZoneSaved);
            }
            Err(error) => {
                tracing::warn!(video_id = ?self.state.video_id, %error, "zone save failed");
                self.dispatch(OverlayAction::ZoneSaveFailed(error.clone()));
                self.notices.push(OverlayNotice::ZoneSaveFailed { error });
            }
        }
    }

    /// Time-advanced notification: fold in pending data and render one pass.
    pub fn on_time_update(&mut self, frame: VideoFrame) -> Scene {
        self.tick();
        self.last_frame = Some(frame);
        self.pipeline.render(&frame, &self.state, &self.index)
    }

    /// Re-render the last frame after an input-driven state change.
    pub fn rerender(&mut self) -> Option<Scene> {
        let frame = self.last_frame?;
        Some(self.pipeline.render(&frame, &self.state, &self.index))
    }

    /// Route pointer input. Returns a fresh scene when the state changed.
    pub fn pointer(&mut self, event: PointerEvent) -> Option<Scene> {
        let action = handle_pointer(&self.state, &self.index, self.pipeline.mapper(), event)?;
        self.apply_input(action)
    }

    pub fn key(&mut self, key: Key) -> Option<Scene> {
        let action = handle_key(&self.state, key)?;
        self.apply_input(action)
    }

    fn apply_input(&mut self, action: OverlayAction) -> Option<Scene> {
        let before = self.state.clone();
        self.dispatch(action);
        if self.state == before {
            return None;
        }
        self.rerender()
    }

    pub fn show_hud(&mut self) {
        self.dispatch(OverlayAction::ShowHud);
    }

    pub fn show_heatmap(&mut self) {
        self.dispatch(OverlayAction::ShowHeatmap);
    }

    pub fn toggle_zones(&mut self) {
        self.dispatch(OverlayAction::ToggleZones);
    }

    pub fn toggle_draw_mode(&mut self) {
        self.dispatch(OverlayAction::ToggleDrawMode);
    }

    pub fn cancel_draw(&mut self) {
        self.dispatch(OverlayAction::CancelDraw);
    }

    pub fn retry_save(&mut self) {
        self.dispatch(OverlayAction::RetrySave);
    }

    pub fn take_notices(&mut self) -> Vec<OverlayNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn player_handle(&self) -> PlayerHandle {
        PlayerHandle {
            tx: self.seek_tx.clone(),
        }
    }

    /// Seek targets queued through [`PlayerHandle`], oldest first.
    pub fn take_seek_requests(&mut self) -> Vec<f64> {
        self.seek_rx
            .try_iter()
            .map(|PlaybackRequest::Seek { seconds }| seconds)
            .collect()
    }

    /// Backend zone label for a normalized position under the active zone.
    pub fn classify_point(&self, point: NormPoint) -> &'static str {
        self.state
            .zones
            .active()
            .map_or(SAFE_ZONE_LABEL, |zone| zone.classify_point(point))
    }
}
