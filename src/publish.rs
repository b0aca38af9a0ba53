use tokio::sync::mpsc;
use tracing::debug;

use crate::models::{AnnotatedFrame, Diagnostics, SegmentList};

/// Delivery seam toward downstream consumers (lane-pose estimation,
/// visualization). Implementations must not block the pipeline.
pub trait Publisher: Send + Sync {
    fn publish_segments(&self, list: SegmentList);
    fn publish_image(&self, frame: AnnotatedFrame);
    fn publish_diagnostics(&self, _diag: Diagnostics) {}
}

/// Bounded-channel publisher with lossy sends: a consumer that falls behind
/// sees fresh frames rather than a growing backlog, the same posture the
/// dispatcher takes on admission.
pub struct ChannelPublisher {
    segments: mpsc::Sender<SegmentList>,
    images: mpsc::Sender<AnnotatedFrame>,
    diagnostics: mpsc::Sender<Diagnostics>,
}

impl ChannelPublisher {
    #[allow(clippy::type_complexity)]
    pub fn channel(
        capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<SegmentList>,
        mpsc::Receiver<AnnotatedFrame>,
        mpsc::Receiver<Diagnostics>,
    ) {
        let (segments_tx, segments_rx) = mpsc::channel(capacity);
        let (images_tx, images_rx) = mpsc::channel(capacity);
        let (diagnostics_tx, diagnostics_rx) = mpsc::channel(capacity);
        (
            Self {
                segments: segments_tx,
                images: images_tx,
                diagnostics: diagnostics_tx,
            },
            segments_rx,
            images_rx,
            diagnostics_rx,
        )
    }
}

impl Publisher for ChannelPublisher {
    fn publish_segments(&self, list: SegmentList) {
        if self.segments.try_send(list).is_err() {
            debug!("segment consumer behind, dropping output");
        }
    }

    fn publish_image(&self, frame: AnnotatedFrame) {
        if self.images.try_send(frame).is_err() {
            debug!("image consumer behind, dropping output");
        }
    }

    fn publish_diagnostics(&self, diag: Diagnostics) {
        if self.diagnostics.try_send(diag).is_err() {
            debug!("diagnostics consumer behind, dropping output");
        }
    }
}
