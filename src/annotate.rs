use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::models::{ColorClass, RawSegment};

/// Drawing color per class: deliberately different from the marking color
/// itself so annotations stay visible on top of the markings.
pub fn class_color(color: ColorClass) -> Rgb<u8> {
    match color {
        ColorClass::White => Rgb([0, 0, 0]),
        ColorClass::Yellow => Rgb([0, 0, 255]),
        ColorClass::Red => Rgb([0, 255, 0]),
    }
}

/// Draw the detected segments of one class onto the output frame.
pub fn draw_segments(canvas: &mut RgbImage, segments: &[RawSegment], color: ColorClass) {
    let paint = class_color(color);
    for seg in segments {
        draw_line_segment_mut(canvas, (seg.x1, seg.y1), (seg.x2, seg.y2), paint);
    }
}
