use anyhow::Result;
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};

/// Seam onto the visual similarity capability. Implementations return a
/// normalized score in [0, 1]; higher means more visually similar.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, candidate: &DynamicImage, reference: &DynamicImage) -> Result<f64>;
}

/// Default scorer: perceptual gradient hashes compared by Hamming distance.
/// Coarse but cheap, and robust against the resizing/compression the
/// mirroring pipeline applies to profile photos.
#[derive(Debug, Default)]
pub struct PhashScorer;

impl PhashScorer {
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityScorer for PhashScorer {
    fn score(&self, candidate: &DynamicImage, reference: &DynamicImage) -> Result<f64> {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::DoubleGradient)
            .hash_size(8, 8)
            .to_hasher();

        let candidate_hash = hasher.hash_image(candidate);
        let reference_hash = hasher.hash_image(reference);

        let bits = (candidate_hash.as_bytes().len() * 8).max(1);
        let distance = candidate_hash.dist(&reference_hash);

        let similarity = 1.0 - f64::from(distance) / bits as f64;
        Ok(similarity.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn identical_images_score_one() {
        let scorer = PhashScorer::new();
        let img = gradient(64, 64);
        let score = scorer.score(&img, &img).unwrap();
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let scorer = PhashScorer::new();
        let a = gradient(64, 64);
        let b = solid(64, 64, [255, 255, 255]);
        let score = scorer.score(&a, &b).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn scoring_is_symmetric() {
        let scorer = PhashScorer::new();
        let a = gradient(48, 96);
        let b = solid(48, 96, [10, 200, 30]);
        let ab = scorer.score(&a, &b).unwrap();
        let ba = scorer.score(&b, &a).unwrap();
        assert!((ab - ba).abs() < f64::EPSILON);
    }
}
