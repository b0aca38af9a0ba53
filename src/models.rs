use image::{GrayImage, RgbImage};
use time::OffsetDateTime;

/// Lane-marking color classes, each detected in an independent pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorClass {
    White,
    Yellow,
    Red,
}

impl ColorClass {
    /// Detection (and output) order within one frame.
    pub const ALL: [ColorClass; 3] = [ColorClass::White, ColorClass::Yellow, ColorClass::Red];

    pub fn label(self) -> &'static str {
        match self {
            ColorClass::White => "white",
            ColorClass::Yellow => "yellow",
            ColorClass::Red => "red",
        }
    }
}

/// A compressed camera frame as it arrives from the transport layer.
#[derive(Clone)]
pub struct EncodedFrame {
    /// Capture time, carried through to every output derived from this frame.
    pub stamp: OffsetDateTime,
    pub payload: Vec<u8>,
}

/// Pixel-space line segment in the coordinate frame of the cropped,
/// resized image, as returned by the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSegment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Unit normal of the fitted line.
    pub normal: (f32, f32),
}

impl RawSegment {
    pub fn length(&self) -> f32 {
        let dx = self.x2 - self.x1;
        let dy = self.y2 - self.y1;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Line segment in resolution-independent `[0,1]×[0,1]` coordinates of the
/// pre-crop image. Consumers never need to know the processing resolution
/// or crop offset that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedSegment {
    pub color: ColorClass,
    pub endpoint1: (f32, f32),
    pub endpoint2: (f32, f32),
    pub normal: (f32, f32),
}

/// All segments detected in one frame, ordered white, yellow, red, each in
/// detector-return order.
#[derive(Clone)]
pub struct SegmentList {
    pub stamp: OffsetDateTime,
    pub segments: Vec<NormalizedSegment>,
}

/// The preprocessed frame with detected segments drawn on it, stamped
/// identically to the segment list for correlation downstream.
#[derive(Clone)]
pub struct AnnotatedFrame {
    pub stamp: OffsetDateTime,
    pub image: RgbImage,
}

/// Per-frame intermediate images, published only in verbose mode.
#[derive(Clone)]
pub struct Diagnostics {
    pub stamp: OffsetDateTime,
    /// Canny edge image of the preprocessed frame.
    pub edges: GrayImage,
    /// Dilated color mask per class, in detection order.
    pub masks: Vec<(ColorClass, GrayImage)>,
}
