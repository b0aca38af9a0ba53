use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use image::{GrayImage, Rgb, RgbImage};
use time::OffsetDateTime;

use lanemark::detection::{Detection, Detector};
use lanemark::models::{AnnotatedFrame, ColorClass, Diagnostics, EncodedFrame, SegmentList};
use lanemark::params::PipelineParams;
use lanemark::publish::Publisher;
use lanemark::{FrameDispatcher, RawSegment};

/// Detector double: returns configured segments per color, optionally
/// sleeps to simulate a slow pass, optionally fails a pass, and records
/// concurrency plus which frames it actually saw.
pub struct MockDetector {
    pub delay: Duration,
    pub fail_on: Option<ColorClass>,
    pub white: Vec<RawSegment>,
    pub yellow: Vec<RawSegment>,
    pub red: Vec<RawSegment>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    /// Top-left pixel of every frame seen by the white pass, i.e. one entry
    /// per processed frame.
    frames_seen: Mutex<Vec<[u8; 3]>>,
}

impl MockDetector {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            fail_on: None,
            white: Vec::new(),
            yellow: Vec::new(),
            red: Vec::new(),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            frames_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failure(mut self, color: ColorClass) -> Self {
        self.fail_on = Some(color);
        self
    }

    pub fn with_segments(mut self, color: ColorClass, segments: Vec<RawSegment>) -> Self {
        match color {
            ColorClass::White => self.white = segments,
            ColorClass::Yellow => self.yellow = segments,
            ColorClass::Red => self.red = segments,
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn frames_seen(&self) -> Vec<[u8; 3]> {
        self.frames_seen.lock().unwrap().clone()
    }
}

impl Detector for MockDetector {
    fn detect(
        &self,
        frame: &RgbImage,
        color: ColorClass,
        _params: &PipelineParams,
    ) -> Result<Detection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if color == ColorClass::White {
            self.frames_seen
                .lock()
                .unwrap()
                .push(frame.get_pixel(0, 0).0);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = if self.fail_on == Some(color) {
            Err(anyhow::anyhow!("injected {} failure", color.label()))
        } else {
            let segments = match color {
                ColorClass::White => self.white.clone(),
                ColorClass::Yellow => self.yellow.clone(),
                ColorClass::Red => self.red.clone(),
            };
            Ok(Detection {
                segments,
                mask: GrayImage::new(frame.width(), frame.height()),
                edges: GrayImage::new(frame.width(), frame.height()),
            })
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Publisher double that keeps everything it receives.
#[derive(Default)]
pub struct CollectingSink {
    pub segment_lists: Mutex<Vec<SegmentList>>,
    pub images: Mutex<Vec<AnnotatedFrame>>,
    pub diagnostics_count: AtomicUsize,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment_lists(&self) -> Vec<SegmentList> {
        self.segment_lists.lock().unwrap().clone()
    }

    pub fn images(&self) -> Vec<AnnotatedFrame> {
        self.images.lock().unwrap().clone()
    }
}

impl Publisher for CollectingSink {
    fn publish_segments(&self, list: SegmentList) {
        self.segment_lists.lock().unwrap().push(list);
    }

    fn publish_image(&self, frame: AnnotatedFrame) {
        self.images.lock().unwrap().push(frame);
    }

    fn publish_diagnostics(&self, _diag: Diagnostics) {
        self.diagnostics_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// PNG-encoded uniform frame, identifiable by its fill color.
pub fn encode_frame(width: u32, height: u32, fill: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(fill));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png encode");
    bytes.into_inner()
}

pub fn frame_with_fill(width: u32, height: u32, fill: [u8; 3]) -> EncodedFrame {
    EncodedFrame {
        stamp: OffsetDateTime::now_utc(),
        payload: encode_frame(width, height, fill),
    }
}

/// Parameters with the given processing geometry and defaults elsewhere.
pub fn test_params(img_size: [u32; 2], top_cutoff: u32) -> PipelineParams {
    PipelineParams {
        img_size,
        top_cutoff,
        ..PipelineParams::default()
    }
}

/// Poll until the dispatcher's slot is free again.
pub async fn wait_idle(dispatcher: &FrameDispatcher) {
    for _ in 0..500 {
        if dispatcher.idle() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dispatcher never became idle");
}
