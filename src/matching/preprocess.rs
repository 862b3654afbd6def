use image::{DynamicImage, GenericImageView};

// Fractions of the mirrored frame occupied by chrome around the profile
// card: app/status bars on top, action buttons on the bottom, side gutters.
const CROP_TOP: f64 = 0.20;
const CROP_BOTTOM: f64 = 0.10;
const CROP_SIDES: f64 = 0.10;

// Frames smaller than this are not worth cropping; the margins would eat
// most of the signal.
const MIN_CROP_DIMENSION: u32 = 40;

/// Best-effort isolation of the profile-photo region of a screenshot.
///
/// Falls back to the full frame when the input is too small for the margin
/// crop to leave anything meaningful. Never fails.
pub fn isolate_profile_region(screenshot: &DynamicImage) -> DynamicImage {
    let (width, height) = screenshot.dimensions();

    if width < MIN_CROP_DIMENSION || height < MIN_CROP_DIMENSION {
        return screenshot.clone();
    }

    let left = (f64::from(width) * CROP_SIDES) as u32;
    let top = (f64::from(height) * CROP_TOP) as u32;
    let cropped_width = width - 2 * left;
    let cropped_height = height - top - (f64::from(height) * CROP_BOTTOM) as u32;

    if cropped_width == 0 || cropped_height == 0 {
        return screenshot.clone();
    }

    screenshot.crop_imm(left, top, cropped_width, cropped_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
    }

    #[test]
    fn crops_chrome_margins() {
        let cropped = isolate_profile_region(&frame(1000, 2000));
        assert_eq!(cropped.dimensions(), (800, 1400));
    }

    #[test]
    fn tiny_frames_pass_through_unchanged() {
        let cropped = isolate_profile_region(&frame(20, 20));
        assert_eq!(cropped.dimensions(), (20, 20));
    }
}
