use anyhow::{anyhow, bail, Context, Result};
use safety_overlay::logging;
use safety_overlay::overlay::client::{HttpBackend, SafetyBackend};
use safety_overlay::overlay::event::EventIndex;
use safety_overlay::overlay::raster::RasterRenderer;
use safety_overlay::overlay::render::{RenderPipeline, VideoFrame};
use safety_overlay::overlay::settings_store;
use safety_overlay::overlay::state::{OverlayAction, OverlayState};
use safety_overlay::overlay::zone::ZonePolygon;
use std::path::PathBuf;

const USAGE: &str = "usage: safety_overlay <base-url> <video-id> <time-seconds> <native WxH> <canvas WxH> <out.png> [--heatmap] [--debug]";

struct SnapshotArgs {
    base_url: String,
    video_id: i64,
    time: f64,
    native_size: (u32, u32),
    canvas_size: (u32, u32),
    output: PathBuf,
    heatmap: bool,
    debug: bool,
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (w, h) = value
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(|| anyhow!("expected WxH, got {value:?}"))?;
    Ok((
        w.trim().parse().with_context(|| format!("width in {value:?}"))?,
        h.trim().parse().with_context(|| format!("height in {value:?}"))?,
    ))
}

fn parse_args(args: Vec<String>) -> Result<SnapshotArgs> {
    let (flags, positional): (Vec<String>, Vec<String>) =
        args.into_iter().partition(|arg| arg.starts_with("--"));
    for flag in &flags {
        if flag != "--heatmap" && flag != "--debug" {
            bail!("unknown flag {flag}\n{USAGE}");
        }
    }
    let [base_url, video_id, time, native, canvas, output] =
        <[String; 6]>::try_from(positional).map_err(|_| anyhow!(USAGE))?;
    Ok(SnapshotArgs {
        base_url,
        video_id: video_id
            .parse()
            .with_context(|| format!("video id {video_id:?}"))?,
        time: time.parse().with_context(|| format!("time {time:?}"))?,
        native_size: parse_size(&native)?,
        canvas_size: parse_size(&canvas)?,
        output: PathBuf::from(output),
        heatmap: flags.iter().any(|f| f == "--heatmap"),
        debug: flags.iter().any(|f| f == "--debug"),
    })
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let mut settings = settings_store::load().unwrap_or_else(|err| {
        eprintln!("failed to load overlay settings, using defaults: {err:#}");
        Default::default()
    });
    logging::init(args.debug || settings.debug_logging, None);
    settings.backend_url = args.base_url.clone();
    settings.sanitize();

    let backend = HttpBackend::new(&settings.backend_url)?;
    let events = backend
        .fetch_events(args.video_id)
        .context("fetch events for snapshot")?;
    let zone = match backend.fetch_zone(args.video_id) {
        Ok(points) => ZonePolygon::from_pairs(&points),
        Err(err) => {
            tracing::warn!(error = %err, "zone unavailable; rendering without it");
            ZonePolygon::default()
        }
    };

    let mut state = OverlayState::default()
        .reduce(OverlayAction::SelectVideo(Some(args.video_id)))
        .state
        .reduce(OverlayAction::ZoneLoaded(zone))
        .state;
    if args.heatmap {
        state = state.reduce(OverlayAction::ShowHeatmap).state;
    }
    let index = EventIndex::from_batch(events);

    let mut pipeline = RenderPipeline::new(&settings, RasterRenderer::default())?;
    let frame = VideoFrame {
        current_time: args.time,
        native_size: args.native_size,
        display_size: args.canvas_size,
    };
    let scene = pipeline.render(&frame, &state, &index);
    pipeline.renderer().save_png(&args.output)?;
    tracing::info!(
        commands = scene.commands.len(),
        tracks = index.len_tracks(),
        path = %args.output.display(),
        "snapshot written"
    );
    Ok(())
}
