use image::{GrayImage, Luma, RgbImage, imageops};
use imageproc::edges::canny;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::params::Hsv;

/// Resize to the processing resolution iff the decoded dimensions differ.
/// Nearest-neighbor on purpose: line-edge geometry drives detection, not
/// smoothness.
pub fn resize_to(img: RgbImage, width: u32, height: u32) -> RgbImage {
    if img.width() == width && img.height() == height {
        img
    } else {
        imageops::resize(&img, width, height, imageops::FilterType::Nearest)
    }
}

/// Drop `rows` from the top of the frame. All later pixel coordinates are
/// relative to the cropped image.
pub fn crop_top(img: &RgbImage, rows: u32) -> RgbImage {
    imageops::crop_imm(img, 0, rows, img.width(), img.height() - rows).to_image()
}

/// RGB to HSV in OpenCV convention: H in `[0,180)`, S and V in `[0,255]`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue_deg / 2.0, saturation * 255.0, max * 255.0)
}

/// Binary mask (255/0) of pixels falling inside any of the given inclusive
/// HSV ranges.
pub fn hsv_mask(img: &RgbImage, ranges: &[(Hsv, Hsv)]) -> GrayImage {
    let mut mask = GrayImage::new(img.width(), img.height());
    for (x, y, px) in img.enumerate_pixels() {
        let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
        let inside = ranges.iter().any(|(lo, hi)| {
            h >= lo[0] && h <= hi[0] && s >= lo[1] && s <= hi[1] && v >= lo[2] && v <= hi[2]
        });
        if inside {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

/// Square-kernel dilation, matching a `size×size` structuring element.
pub fn dilate_mask(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return mask.clone();
    }
    dilate(mask, Norm::LInf, (kernel_size / 2) as u8)
}

/// Canny edge image of the whole preprocessed frame.
pub fn edge_map(img: &RgbImage, low: f32, high: f32) -> GrayImage {
    let gray = imageops::grayscale(img);
    canny(&gray, low, high)
}

/// Pixel-wise AND of two binary masks.
pub fn mask_and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(a.width(), a.height());
    for (x, y, px) in out.enumerate_pixels_mut() {
        if a.get_pixel(x, y)[0] > 0 && b.get_pixel(x, y)[0] > 0 {
            *px = Luma([255]);
        }
    }
    out
}
