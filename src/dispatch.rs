use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::models::EncodedFrame;
use crate::pipeline::FramePipeline;

/// Admission control for the frame stream. A single-permit semaphore is the
/// processing slot: a frame is admitted only if the permit is free right
/// now, otherwise it is dropped — freshness matters more than completeness
/// for a real-time perception stream, so there is no queue.
pub struct FrameDispatcher {
    pipeline: Arc<FramePipeline>,
    slot: Arc<Semaphore>,
    enabled: AtomicBool,
    dropped: AtomicU64,
}

impl FrameDispatcher {
    pub fn new(pipeline: FramePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            slot: Arc::new(Semaphore::new(1)),
            enabled: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        }
    }

    /// Gate submission. While disabled every frame is dropped without
    /// touching the slot; an in-flight run is not cancelled.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Frames dropped because the slot was busy. Diagnostic only.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True when no pipeline run is in flight.
    pub fn idle(&self) -> bool {
        self.slot.available_permits() > 0
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    /// Admit or drop one arriving frame. Never blocks and never waits on a
    /// busy slot: either a pipeline run is launched for this frame and the
    /// call returns immediately, or the frame is gone. Returns whether the
    /// frame was admitted.
    pub fn submit(&self, frame: EncodedFrame) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            return false;
        }

        let permit = match self.slot.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(dropped_total = dropped, "detection busy, dropping frame");
                return false;
            }
        };

        let pipeline = self.pipeline.clone();
        // Detection is CPU-bound; run it off the async workers. The permit
        // moves into the task and is released on every exit path, success
        // or failure.
        tokio::task::spawn_blocking(move || {
            if let Err(err) = pipeline.process(&frame) {
                error!("Frame processing aborted: {err}");
            }
            drop(permit);
        });
        true
    }
}
