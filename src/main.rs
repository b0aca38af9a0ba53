use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lanemark::{
    ChannelPublisher, EncodedFrame, FrameDispatcher, FramePipeline, HoughSegmentDetector,
    ParameterStore, PipelineParams, params,
};

#[derive(Parser)]
#[command(name = "lanemark")]
#[command(about = "Detect colored lane-marking segments in a camera frame stream")]
struct Cli {
    /// Image file, or directory of images replayed as a frame stream
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// JSON parameter file, re-read every second while running
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Replay rate for directory input
    #[arg(long, default_value_t = 10.0)]
    fps: f64,

    /// Latch white-balance correction from the first frame
    #[arg(long)]
    white_balance: bool,

    /// Also publish per-color masks and the edge image
    #[arg(short, long)]
    verbose: bool,

    /// Directory for annotated output frames
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Frame files to replay, in name order.
fn collect_frames(input: &PathBuf) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.clone()]);
    }
    let mut frames: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("Failed to read input directory {}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("png" | "jpg" | "jpeg" | "bmp")
            )
        })
        .collect();
    frames.sort();
    if frames.is_empty() {
        bail!("No image files found in {}", input.display());
    }
    Ok(frames)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Cli::parse();

    let store = Arc::new(match &args.params {
        Some(path) => ParameterStore::from_file(path)?,
        None => ParameterStore::fixed(PipelineParams::default()),
    });
    let _refresh = params::spawn_refresh(Arc::downgrade(&store), Duration::from_secs(1));

    let (publisher, mut segments_rx, mut images_rx, mut diagnostics_rx) =
        ChannelPublisher::channel(8);
    let pipeline = FramePipeline::new(
        store.clone(),
        Arc::new(HoughSegmentDetector),
        Arc::new(publisher),
    )
    .with_verbose(args.verbose);
    let dispatcher = FrameDispatcher::new(pipeline);
    if args.white_balance {
        dispatcher.pipeline().set_white_balance(true);
    }

    if let Some(dir) = &args.out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }
    let out_dir = args.out.clone();

    let consumer = tokio::spawn(async move {
        let mut frame_index = 0usize;
        loop {
            tokio::select! {
                Some(list) = segments_rx.recv() => {
                    info!(segments = list.segments.len(), "segment list published");
                }
                Some(frame) = images_rx.recv() => {
                    if let Some(dir) = &out_dir {
                        let path = dir.join(format!("frame_{frame_index:05}.png"));
                        if let Err(err) = frame.image.save(&path) {
                            warn!("Failed to save annotated frame: {err}");
                        }
                    }
                    frame_index += 1;
                }
                Some(diag) = diagnostics_rx.recv() => {
                    info!(masks = diag.masks.len(), "diagnostics published");
                }
                else => break,
            }
        }
    });

    let frames = collect_frames(&args.input)?;
    info!(frames = frames.len(), fps = args.fps, "replaying frame stream");

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / args.fps.max(0.1)));
    for path in &frames {
        ticker.tick().await;
        let payload = std::fs::read(path)
            .with_context(|| format!("Failed to read frame {}", path.display()))?;
        let frame = EncodedFrame {
            stamp: OffsetDateTime::now_utc(),
            payload,
        };
        dispatcher.submit(frame);
    }

    // Let the last admitted run drain before tearing the channels down.
    while !dispatcher.idle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    info!(dropped = dispatcher.dropped_frames(), "replay finished");
    drop(dispatcher);
    let _ = consumer.await;

    Ok(())
}
