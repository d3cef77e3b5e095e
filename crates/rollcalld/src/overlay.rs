//! Draws match results onto a display frame.

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rollcall_core::{BoundingBox, MatchResult};
use std::path::Path;

const KNOWN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: u32 = 2;
const LABEL_BAND_HEIGHT: u32 = 35;
const LABEL_SCALE: f32 = 24.0;
const STATUS_SCALE: f32 = 20.0;

/// Renders boxes, name bands, and a status line.
///
/// Text is only drawn when a font was supplied.
#[derive(Default)]
pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TrueType/OpenType font for labels.
    pub fn with_font_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("invalid font {}: {e}", path.display()))?;
        Ok(Self { font: Some(font) })
    }

    pub fn annotate(&self, frame: &GrayImage, results: &[MatchResult], status: &str) -> RgbImage {
        let mut canvas = DynamicImage::ImageLuma8(frame.clone()).to_rgb8();
        for result in results {
            self.draw_result(&mut canvas, result);
        }
        if let Some(font) = &self.font {
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                10,
                10,
                PxScale::from(STATUS_SCALE),
                font,
                status,
            );
        }
        canvas
    }

    fn draw_result(&self, canvas: &mut RgbImage, result: &MatchResult) {
        let color = if result.identity.is_known() {
            KNOWN_COLOR
        } else {
            UNKNOWN_COLOR
        };
        let Some(outline) = face_rect(&result.bounding_box, canvas.width(), canvas.height()) else {
            return;
        };

        for inset in 0..BOX_THICKNESS as i32 {
            let w = outline.width().saturating_sub(2 * inset as u32);
            let h = outline.height().saturating_sub(2 * inset as u32);
            if w == 0 || h == 0 {
                break;
            }
            draw_hollow_rect_mut(
                canvas,
                Rect::at(outline.left() + inset, outline.top() + inset).of_size(w, h),
                color,
            );
        }

        let band_h = LABEL_BAND_HEIGHT.min(outline.height());
        let band_top = outline.bottom() + 1 - band_h as i32;
        draw_filled_rect_mut(
            canvas,
            Rect::at(outline.left(), band_top).of_size(outline.width(), band_h),
            color,
        );

        if let Some(font) = &self.font {
            draw_text_mut(
                canvas,
                TEXT_COLOR,
                outline.left() + 6,
                band_top + 5,
                PxScale::from(LABEL_SCALE),
                font,
                &result.identity.to_string(),
            );
        }
    }
}

/// Clip a face box to the canvas; `None` if nothing is left.
fn face_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    let left = bbox.left.min(width);
    let top = bbox.top.min(height);
    let right = bbox.right.min(width);
    let bottom = bbox.bottom.min(height);
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::at(left as i32, top as i32).of_size(right - left, bottom - top))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::Identity;

    fn result(name: Option<&str>, bbox: BoundingBox) -> MatchResult {
        MatchResult {
            bounding_box: bbox,
            identity: name.map_or(Identity::Unknown, |n| Identity::Known(n.into())),
        }
    }

    #[test]
    fn test_known_face_drawn_green() {
        let frame = GrayImage::new(100, 100);
        let out = Overlay::new().annotate(
            &frame,
            &[result(Some("Alice"), BoundingBox::new(10, 80, 90, 20))],
            "",
        );
        assert_eq!(*out.get_pixel(20, 10), KNOWN_COLOR);
        assert_eq!(*out.get_pixel(21, 11), KNOWN_COLOR);
        // Inside the box, above the label band.
        assert_eq!(*out.get_pixel(50, 30), Rgb([0, 0, 0]));
        // Inside the label band.
        assert_eq!(*out.get_pixel(50, 80), KNOWN_COLOR);
    }

    #[test]
    fn test_unknown_face_drawn_red() {
        let frame = GrayImage::new(100, 100);
        let out = Overlay::new().annotate(
            &frame,
            &[result(None, BoundingBox::new(10, 80, 90, 20))],
            "",
        );
        assert_eq!(*out.get_pixel(20, 10), UNKNOWN_COLOR);
    }

    #[test]
    fn test_no_results_keeps_frame() {
        let frame = GrayImage::from_pixel(8, 8, image::Luma([77]));
        let out = Overlay::new().annotate(&frame, &[], "status");
        assert!(out.pixels().all(|p| *p == Rgb([77, 77, 77])));
    }

    #[test]
    fn test_face_rect_clips_and_rejects_empty() {
        let r = face_rect(&BoundingBox::new(90, 130, 120, 80), 100, 100).unwrap();
        assert_eq!((r.left(), r.top(), r.width(), r.height()), (80, 90, 20, 10));
        assert!(face_rect(&BoundingBox::new(10, 10, 20, 10), 100, 100).is_none());
        assert!(face_rect(&BoundingBox::new(120, 150, 130, 110), 100, 100).is_none());
    }

    #[test]
    fn test_small_box_does_not_panic() {
        let frame = GrayImage::new(10, 10);
        let out = Overlay::new().annotate(
            &frame,
            &[result(Some("Bob"), BoundingBox::new(4, 6, 6, 4))],
            "",
        );
        assert_eq!(*out.get_pixel(4, 4), KNOWN_COLOR);
    }
}
