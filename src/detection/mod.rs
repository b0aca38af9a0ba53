pub mod preprocessing;
pub mod white_balance;

use anyhow::Result;
use image::{GrayImage, RgbImage};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};

use crate::models::{ColorClass, RawSegment};
use crate::params::PipelineParams;

/// Output of one color pass.
pub struct Detection {
    /// Segments in cropped-image pixel coordinates, detector order.
    pub segments: Vec<RawSegment>,
    /// Dilated binary mask of the color class.
    pub mask: GrayImage,
    /// Canny edge image of the whole preprocessed frame. Identical across
    /// the passes of one frame.
    pub edges: GrayImage,
}

/// The detection seam: given a preprocessed frame and a color class, return
/// the segments of that class. The pipeline treats this as a bounded-latency
/// external call and never runs two passes of different frames concurrently.
pub trait Detector: Send + Sync {
    fn detect(
        &self,
        frame: &RgbImage,
        color: ColorClass,
        params: &PipelineParams,
    ) -> Result<Detection>;
}

/// Reference detector: HSV in-range mask (two ranges OR-ed for red),
/// square dilation, Canny on the frame, Hough voting on the masked edges,
/// then mask-guided extraction of finite segments along each voted line.
pub struct HoughSegmentDetector;

impl Detector for HoughSegmentDetector {
    fn detect(
        &self,
        frame: &RgbImage,
        color: ColorClass,
        params: &PipelineParams,
    ) -> Result<Detection> {
        let ranges = params.hsv_ranges(color);
        let mask = preprocessing::hsv_mask(frame, &ranges);
        let mask = preprocessing::dilate_mask(&mask, params.dilation_kernel_size);
        let edges = preprocessing::edge_map(
            frame,
            params.canny_thresholds[0],
            params.canny_thresholds[1],
        );
        let color_edges = preprocessing::mask_and(&mask, &edges);

        let lines = detect_lines(
            &color_edges,
            LineDetectionOptions {
                vote_threshold: params.hough_threshold,
                suppression_radius: 8,
            },
        );

        let mut segments = Vec::new();
        for line in lines {
            segments.extend(segments_along_line(
                &color_edges,
                line,
                params.hough_min_line_length,
                params.hough_max_line_gap,
            ));
        }

        Ok(Detection {
            segments,
            mask,
            edges,
        })
    }
}

/// Walk a voted polar line across the edge mask in unit steps, collecting
/// runs of set pixels. Gaps up to `max_gap` merge into one run; runs shorter
/// than `min_length` are discarded. The polar angle gives the unit normal.
fn segments_along_line(
    mask: &GrayImage,
    line: PolarLine,
    min_length: f32,
    max_gap: f32,
) -> Vec<RawSegment> {
    let (width, height) = mask.dimensions();
    let theta = (line.angle_in_degrees as f32).to_radians();
    let (sin, cos) = theta.sin_cos();
    // Foot of the perpendicular from the origin; the line direction is the
    // normal rotated a quarter turn.
    let base = (line.r * cos, line.r * sin);
    let dir = (-sin, cos);
    let diag = ((width * width + height * height) as f32).sqrt().ceil() as i64;

    let mut segments = Vec::new();
    let mut run: Option<(f32, f32)> = None;

    let emit = |start: f32, end: f32, segments: &mut Vec<RawSegment>| {
        if end - start >= min_length {
            segments.push(RawSegment {
                x1: base.0 + start * dir.0,
                y1: base.1 + start * dir.1,
                x2: base.0 + end * dir.0,
                y2: base.1 + end * dir.1,
                normal: (cos, sin),
            });
        }
    };

    for step in -diag..=diag {
        let t = step as f32;
        let x = (base.0 + t * dir.0).round();
        let y = (base.1 + t * dir.1).round();
        let hit = x >= 0.0
            && y >= 0.0
            && (x as u32) < width
            && (y as u32) < height
            && mask.get_pixel(x as u32, y as u32)[0] > 0;
        if !hit {
            continue;
        }

        run = match run {
            None => Some((t, t)),
            // Steps are unit-sized, so two set pixels `max_gap` apart are
            // still the same run.
            Some((start, end)) if t - end > max_gap + 1.0 => {
                emit(start, end, &mut segments);
                Some((t, t))
            }
            Some((start, _)) => Some((start, t)),
        };
    }
    if let Some((start, end)) = run {
        emit(start, end, &mut segments);
    }

    segments
}
