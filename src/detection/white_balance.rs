use image::RgbImage;
use tracing::info;

/// Per-channel gains estimated from a reference frame. Gains are global
/// ratios, so a latched correction stays valid across resolution or crop
/// changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub gains: [f32; 3],
}

impl Correction {
    /// Apply the correction in place.
    pub fn apply(&self, img: &mut RgbImage) {
        for px in img.pixels_mut() {
            for (channel, gain) in px.0.iter_mut().zip(self.gains) {
                *channel = (*channel as f32 * gain).min(255.0) as u8;
            }
        }
    }
}

/// Estimator seam: given a reference frame, compute a correction.
pub trait WhiteBalance: Send + Sync {
    fn fit(&self, reference: &RgbImage) -> Correction;
}

/// Gray-world estimator: scale each channel so its mean matches the mean
/// luminance of the reference frame.
pub struct GrayWorld;

impl WhiteBalance for GrayWorld {
    fn fit(&self, reference: &RgbImage) -> Correction {
        let mut sums = [0u64; 3];
        for px in reference.pixels() {
            for (sum, channel) in sums.iter_mut().zip(px.0) {
                *sum += channel as u64;
            }
        }
        let count = (reference.width() as u64 * reference.height() as u64).max(1);
        let means = sums.map(|s| s as f32 / count as f32);
        let target = (means[0] + means[1] + means[2]) / 3.0;
        let gains = means.map(|m| if m > 0.0 { target / m } else { 1.0 });
        Correction { gains }
    }
}

/// One-shot white-balance state: disabled → armed → latched. Arming
/// captures a correction off the next observed frame and keeps it until the
/// latch is disabled and re-armed; it is never recomputed mid-stream.
enum WbState {
    Disabled,
    Armed,
    Latched(Correction),
}

pub struct WbLatch {
    state: WbState,
    estimator: Box<dyn WhiteBalance>,
}

impl WbLatch {
    pub fn new(estimator: Box<dyn WhiteBalance>) -> Self {
        Self {
            state: WbState::Disabled,
            estimator,
        }
    }

    /// Disabling always resets; enabling arms only from the disabled state,
    /// so an already latched correction survives repeated enables.
    pub fn set_enabled(&mut self, enabled: bool) {
        match (enabled, &self.state) {
            (false, _) => self.state = WbState::Disabled,
            (true, WbState::Disabled) => self.state = WbState::Armed,
            (true, _) => {}
        }
    }

    pub fn is_latched(&self) -> bool {
        matches!(self.state, WbState::Latched(_))
    }

    /// Run one frame through the latch. The first frame after arming serves
    /// as the reference and is itself corrected.
    pub fn observe(&mut self, frame: &mut RgbImage) {
        match &self.state {
            WbState::Disabled => {}
            WbState::Armed => {
                let correction = self.estimator.fit(frame);
                info!(gains = ?correction.gains, "white balance latched");
                correction.apply(frame);
                self.state = WbState::Latched(correction);
            }
            WbState::Latched(correction) => correction.apply(frame),
        }
    }
}
