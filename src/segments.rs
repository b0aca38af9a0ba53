use crate::models::{ColorClass, NormalizedSegment, RawSegment};
use crate::params::PipelineParams;

/// Converts detector output in cropped-pixel space into segments normalized
/// to the `[0,1]×[0,1]` range of the pre-crop image: endpoints are shifted
/// by the crop offset and divided by the processing resolution. Normals are
/// unit vectors and pass through unscaled.
#[derive(Debug, Clone, Copy)]
pub struct SegmentEncoder {
    crop_x: f32,
    crop_y: f32,
    width: f32,
    height: f32,
}

impl SegmentEncoder {
    /// Encoder for the snapshot used by the current run. Only the top of
    /// the frame is cropped, so the x offset is zero.
    pub fn new(params: &PipelineParams) -> Self {
        Self::from_geometry(params.width(), params.height(), 0, params.top_cutoff)
    }

    pub fn from_geometry(width: u32, height: u32, crop_x: u32, crop_y: u32) -> Self {
        Self {
            crop_x: crop_x as f32,
            crop_y: crop_y as f32,
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn normalize(&self, color: ColorClass, segments: &[RawSegment]) -> Vec<NormalizedSegment> {
        segments
            .iter()
            .map(|seg| NormalizedSegment {
                color,
                endpoint1: self.point(seg.x1, seg.y1),
                endpoint2: self.point(seg.x2, seg.y2),
                normal: seg.normal,
            })
            .collect()
    }

    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        ((x + self.crop_x) / self.width, (y + self.crop_y) / self.height)
    }
}
