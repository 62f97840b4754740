use crate::overlay::client::SafetyBackend;
use crate::overlay::event::VideoId;
use crate::overlay::messages::{Generation, WorkerMessage};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background fetch loop bound to one video selection.
///
/// Loads the zone once, then refreshes events every `interval` until
/// cancelled. Dropping the task cancels it; an in-flight request finishes on
/// its own and its result is discarded by generation.
pub struct PollTask {
    video_id: VideoId,
    generation: Generation,
    cancelled: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    pub fn spawn(
        backend: Arc<dyn SafetyBackend>,
        video_id: VideoId,
        generation: Generation,
        interval: Duration,
        tx: Sender<WorkerMessage>,
    ) -> Result<Self> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = channel::<()>();
        let flag = Arc::clone(&cancelled);
        let handle = thread::Builder::new()
            .name(format!("overlay-poll-{video_id}"))
            .spawn(move || {
                match backend.fetch_zone(video_id) {
                    Ok(points) => {
                        if tx.send(WorkerMessage::ZoneFetched { generation, points }).is_err() {
                            return;
                        }
                    }
                    Err(err) => tracing::warn!(video_id, error = %err, "zone fetch failed"),
                }

                loop {
                    if flag.load(Ordering::SeqCst) {
                        break;
                    }
                    match backend.fetch_events(video_id) {
                        Ok(events) => {
                            tracing::debug!(video_id, count = events.len(), "fetched events");
                            if tx
                                .send(WorkerMessage::EventsFetched { generation, events })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(err) => tracing::warn!(video_id, error = %err, "event fetch failed"),
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!(video_id, generation, "poll task stopped");
            })
            .context("spawn poll thread")?;

        Ok(Self {
            video_id,
            generation,
            cancelled,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn video_id(&self) -> VideoId {
        self.video_id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    /// Cancel and wait for the thread. Blocks for as long as an in-flight
    /// request takes.
    pub fn join(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(video_id = self.video_id, "poll thread panicked");
            }
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
