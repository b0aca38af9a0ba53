use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::debug;

use crate::annotate;
use crate::detection::white_balance::{GrayWorld, WbLatch};
use crate::detection::{Detection, Detector, preprocessing};
use crate::error::PipelineError;
use crate::models::{AnnotatedFrame, ColorClass, Diagnostics, EncodedFrame, SegmentList};
use crate::params::ParameterStore;
use crate::publish::Publisher;
use crate::segments::SegmentEncoder;

/// Per-frame sequential pipeline: decode, resize/crop, white-balance, one
/// detection pass per color class, annotate, normalize, publish.
///
/// One instance is shared by all runs, but the dispatcher guarantees at
/// most one run is active at a time; the white-balance latch is the only
/// state carried across frames.
pub struct FramePipeline {
    params: Arc<ParameterStore>,
    detector: Arc<dyn Detector>,
    publisher: Arc<dyn Publisher>,
    white_balance: Mutex<WbLatch>,
    verbose: bool,
}

impl FramePipeline {
    pub fn new(
        params: Arc<ParameterStore>,
        detector: Arc<dyn Detector>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            params,
            detector,
            publisher,
            white_balance: Mutex::new(WbLatch::new(Box::new(GrayWorld))),
            verbose: false,
        }
    }

    /// Also publish per-class masks and the edge image for each frame.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Arm or reset the white-balance latch. Arming captures the correction
    /// off the next processed frame.
    pub fn set_white_balance(&self, enabled: bool) {
        self.lock_white_balance().set_enabled(enabled);
    }

    fn lock_white_balance(&self) -> std::sync::MutexGuard<'_, WbLatch> {
        self.white_balance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Process one frame end-to-end with the snapshot in effect at entry.
    /// Any error aborts this run only; nothing is published for the frame.
    pub fn process(&self, frame: &EncodedFrame) -> Result<(), PipelineError> {
        let started = Instant::now();
        let params = self.params.current();

        let decoded = image::load_from_memory(&frame.payload)
            .map_err(|err| PipelineError::Decode(err.to_string()))?
            .to_rgb8();

        if params.top_cutoff >= params.height() {
            return Err(PipelineError::BadCutoff {
                height: params.height(),
                cutoff: params.top_cutoff,
            });
        }

        let resized = preprocessing::resize_to(decoded, params.width(), params.height());
        let mut working = preprocessing::crop_top(&resized, params.top_cutoff);

        self.lock_white_balance().observe(&mut working);

        let mut passes: Vec<(ColorClass, Detection)> = Vec::with_capacity(ColorClass::ALL.len());
        for color in ColorClass::ALL {
            let detection = self
                .detector
                .detect(&working, color, &params)
                .map_err(|err| PipelineError::Detector {
                    color,
                    message: format!("{err:#}"),
                })?;
            passes.push((color, detection));
        }

        let mut annotated = working.clone();
        for (color, detection) in &passes {
            annotate::draw_segments(&mut annotated, &detection.segments, *color);
        }

        // Same snapshot that produced the preprocessing, so coordinates and
        // geometry can never mix generations within a run.
        let encoder = SegmentEncoder::new(&params);
        let mut segments = Vec::new();
        for (color, detection) in &passes {
            segments.extend(encoder.normalize(*color, &detection.segments));
        }

        if self.verbose {
            for (color, detection) in &passes {
                debug!(
                    color = color.label(),
                    count = detection.segments.len(),
                    "segments detected"
                );
            }
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "frame processed");
        }

        self.publisher.publish_segments(SegmentList {
            stamp: frame.stamp,
            segments,
        });
        self.publisher.publish_image(AnnotatedFrame {
            stamp: frame.stamp,
            image: annotated,
        });

        if self.verbose {
            let edges = passes
                .first()
                .map(|(_, detection)| detection.edges.clone())
                .unwrap_or_else(|| image::GrayImage::new(0, 0));
            let masks = passes
                .into_iter()
                .map(|(color, detection)| (color, detection.mask))
                .collect();
            self.publisher.publish_diagnostics(Diagnostics {
                stamp: frame.stamp,
                edges,
                masks,
            });
        }

        Ok(())
    }
}
