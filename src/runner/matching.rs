//! Template matching on captured frames.
//!
//! Uses normalized cross-correlation over grayscale versions of the capture
//! and the reference image. Scoring is left to the caller: the best match is
//! returned with its score so the confidence threshold lives in one place.

use image::{GrayImage, RgbaImage};
use imageproc::template_matching::{
    MatchTemplateMethod, find_extremes, match_template_parallel,
};

/// Best placement of a template within a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateMatch {
    /// Center of the matched region, in the frame's pixel space.
    pub center: (u32, u32),
    /// NCC score in `0.0..=1.0`; higher is better.
    pub score: f32,
}

/// Find the best NCC match of `template` inside `frame`.
///
/// Returns `None` when the template is empty or larger than the frame, which
/// makes a meaningful match impossible.
pub fn locate_template(frame: &RgbaImage, template: &RgbaImage) -> Option<TemplateMatch> {
    let (tpl_w, tpl_h) = template.dimensions();
    if tpl_w == 0 || tpl_h == 0 {
        return None;
    }
    if tpl_w > frame.width() || tpl_h > frame.height() {
        return None;
    }

    // Grayscale matching, like the capture pipeline: faster and the score is
    // insensitive to the alpha channel.
    let frame_gray: GrayImage = image::imageops::grayscale(frame);
    let template_gray: GrayImage = image::imageops::grayscale(template);

    let result = match_template_parallel(
        &frame_gray,
        &template_gray,
        MatchTemplateMethod::CrossCorrelationNormalized,
    );
    let extremes = find_extremes(&result);

    let (best_x, best_y) = extremes.max_value_location;
    Some(TemplateMatch {
        center: (best_x + tpl_w / 2, best_y + tpl_h / 2),
        score: extremes.max_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Frame with a flat background and an 8x8-checkered block pasted at
    /// (x, y). The checker gives the template structure, so a flat region
    /// cannot reach a perfect score.
    fn frame_with_block(x: u32, y: u32, block_w: u32, block_h: u32) -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(160, 120, Rgba([30, 30, 30, 255]));
        for dy in 0..block_h {
            for dx in 0..block_w {
                let v = if ((dx / 4) + (dy / 4)) % 2 == 0 { 40 } else { 220 };
                frame.put_pixel(x + dx, y + dy, Rgba([v, v, v, 255]));
            }
        }
        frame
    }

    fn checker_template(w: u32, h: u32) -> RgbaImage {
        let mut template = RgbaImage::new(w, h);
        for (dx, dy, pixel) in template.enumerate_pixels_mut() {
            let v = if ((dx / 4) + (dy / 4)) % 2 == 0 { 40 } else { 220 };
            *pixel = Rgba([v, v, v, 255]);
        }
        template
    }

    #[test]
    fn exact_match_is_found_at_the_block_center() {
        let frame = frame_with_block(20, 10, 16, 16);
        let template = checker_template(16, 16);

        let m = locate_template(&frame, &template).unwrap();
        assert_eq!(m.center, (28, 18));
        assert!(m.score > 0.99, "score was {}", m.score);
    }

    #[test]
    fn absent_template_scores_below_threshold() {
        // Flat frame, structured template: the best correlation anywhere is
        // mean/rms of the checker, well under the 0.9 default confidence.
        let frame = RgbaImage::from_pixel(160, 120, Rgba([50, 50, 50, 255]));
        let template = checker_template(16, 16);

        let m = locate_template(&frame, &template).unwrap();
        assert!(m.score < 0.9, "score was {}", m.score);
    }

    #[test]
    fn oversized_or_empty_template_is_rejected() {
        let frame = RgbaImage::from_pixel(32, 32, Rgba([50, 50, 50, 255]));

        let too_wide = RgbaImage::from_pixel(64, 16, Rgba([0, 0, 0, 255]));
        assert!(locate_template(&frame, &too_wide).is_none());

        let empty = RgbaImage::new(0, 0);
        assert!(locate_template(&frame, &empty).is_none());
    }
}
