use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::ColorClass;

/// An HSV bound in OpenCV convention: H in `[0,180]`, S and V in `[0,255]`.
pub type Hsv = [f32; 3];

/// One fully formed configuration snapshot. A pipeline run captures a
/// snapshot at its start and uses it end-to-end; refresh replaces the whole
/// value, never individual fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineParams {
    /// Processing resolution as `[height, width]`, row-major like the camera.
    pub img_size: [u32; 2],
    /// Rows removed from the top of the frame before detection (sky, hood).
    pub top_cutoff: u32,

    pub hsv_white1: Hsv,
    pub hsv_white2: Hsv,
    pub hsv_yellow1: Hsv,
    pub hsv_yellow2: Hsv,
    /// Red needs two disjoint ranges because its hue wraps around the wheel.
    pub hsv_red1: Hsv,
    pub hsv_red2: Hsv,
    pub hsv_red3: Hsv,
    pub hsv_red4: Hsv,

    pub dilation_kernel_size: u32,
    /// `[low, high]` hysteresis thresholds for the Canny pass.
    pub canny_thresholds: [f32; 2],
    pub hough_min_line_length: f32,
    pub hough_max_line_gap: f32,
    pub hough_threshold: u32,
}

impl PipelineParams {
    pub fn height(&self) -> u32 {
        self.img_size[0]
    }

    pub fn width(&self) -> u32 {
        self.img_size[1]
    }

    /// Inclusive HSV ranges for one color class.
    pub fn hsv_ranges(&self, color: ColorClass) -> Vec<(Hsv, Hsv)> {
        match color {
            ColorClass::White => vec![(self.hsv_white1, self.hsv_white2)],
            ColorClass::Yellow => vec![(self.hsv_yellow1, self.hsv_yellow2)],
            ColorClass::Red => vec![
                (self.hsv_red1, self.hsv_red2),
                (self.hsv_red3, self.hsv_red4),
            ],
        }
    }
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            img_size: [120, 160],
            top_cutoff: 40,
            hsv_white1: [0.0, 0.0, 150.0],
            hsv_white2: [180.0, 100.0, 255.0],
            hsv_yellow1: [25.0, 140.0, 100.0],
            hsv_yellow2: [45.0, 255.0, 255.0],
            hsv_red1: [0.0, 140.0, 100.0],
            hsv_red2: [15.0, 255.0, 255.0],
            hsv_red3: [165.0, 140.0, 100.0],
            hsv_red4: [180.0, 255.0, 255.0],
            dilation_kernel_size: 3,
            canny_thresholds: [80.0, 200.0],
            hough_min_line_length: 3.0,
            hough_max_line_gap: 1.0,
            hough_threshold: 20,
        }
    }
}

/// Holds the configuration snapshot in effect. Readers clone an `Arc` out
/// of a watch channel and never contend with the refresher; a refresh
/// publishes a fully built replacement or keeps the last-known-good value.
pub struct ParameterStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Arc<PipelineParams>>,
}

impl ParameterStore {
    /// A store with no backing file; `refresh` is a no-op.
    pub fn fixed(params: PipelineParams) -> Self {
        let (tx, _) = watch::channel(Arc::new(params));
        Self { path: None, tx }
    }

    /// A store backed by a JSON parameter file. The initial load must
    /// succeed; later refreshes fall back to the last good snapshot.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let params = Self::load(&path)?;
        let (tx, _) = watch::channel(Arc::new(params));
        Ok(Self {
            path: Some(path),
            tx,
        })
    }

    /// The snapshot currently in effect, always fully formed.
    pub fn current(&self) -> Arc<PipelineParams> {
        self.tx.borrow().clone()
    }

    /// Re-read the parameter file and atomically swap in the new snapshot.
    /// Parse or IO failures leave the previous snapshot in place.
    pub fn refresh(&self) {
        let Some(path) = &self.path else {
            return;
        };
        match Self::load(path) {
            Ok(params) => {
                self.tx.send_if_modified(|current| {
                    if **current == params {
                        false
                    } else {
                        debug!(path = %path.display(), "parameters updated");
                        *current = Arc::new(params);
                        true
                    }
                });
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    "parameter refresh failed, keeping previous values: {err:#}"
                );
            }
        }
    }

    fn load(path: &Path) -> Result<PipelineParams> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse parameter file {}", path.display()))
    }
}

/// Periodically refresh the store, independent of frame arrival. The task
/// holds only a weak handle and stops once the store is dropped.
pub fn spawn_refresh(store: Weak<ParameterStore>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately; skip it so a fresh store is not
        // re-read right after construction.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            store.refresh();
        }
    })
}
