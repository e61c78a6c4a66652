//! Geometric jitter for training minibatches.
//!
//! Each augmented sample is a copy of a randomly chosen minibatch image pushed through a
//! small rotation, translation and shear, composed into one affine map and resampled
//! bilinearly with zero fill.

use rand::{rngs::StdRng, Rng};

use crate::{
    config::AugmentationConfig,
    dataset::{SignImage, SignItem, CHANNELS, IMAGE_SIZE},
};

/// Number of augmented samples added to each minibatch at `epoch` (0-based).
pub fn augment_count(base_count: usize, epoch: usize) -> usize {
    base_count / (epoch + 1)
}

/// 2×3 affine map of pixel coordinates (`x` right, `y` down).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    m: [[f32; 3]; 2],
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }

    /// Counter-clockwise rotation by `degrees` about `(cx, cy)`.
    pub fn rotation(cx: f32, cy: f32, degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            m: [
                [cos, sin, (1.0 - cos) * cx - sin * cy],
                [-sin, cos, sin * cx + (1.0 - cos) * cy],
            ],
        }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self {
            m: [[1.0, 0.0, tx], [0.0, 1.0, ty]],
        }
    }

    /// Map taking the control points (5,5), (20,5), (5,20) to (p1,5), (p2,p1), (5,p2).
    pub fn shear(p1: f32, p2: f32) -> Self {
        let a = (p2 - p1) / 15.0;
        let b = (5.0 - p1) / 15.0;
        let d = (p1 - 5.0) / 15.0;
        let e = (p2 - 5.0) / 15.0;
        Self {
            m: [
                [a, b, p1 - 5.0 * a - 5.0 * b],
                [d, e, 5.0 - 5.0 * d - 5.0 * e],
            ],
        }
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        let [[a, b, c], [d, e, f]] = self.m;
        let [[na, nb, nc], [nd, ne, nf]] = next.m;
        Affine {
            m: [
                [na * a + nb * d, na * b + nb * e, na * c + nb * f + nc],
                [nd * a + ne * d, nd * b + ne * e, nd * c + ne * f + nf],
            ],
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [[a, b, c], [d, e, f]] = self.m;
        (a * x + b * y + c, d * x + e * y + f)
    }

    /// `None` for degenerate maps.
    pub fn inverse(&self) -> Option<Affine> {
        let [[a, b, c], [d, e, f]] = self.m;
        let det = a * e - b * d;
        if det.abs() < 1e-8 {
            return None;
        }
        let (ia, ib, id, ie) = (e / det, -b / det, -d / det, a / det);
        Some(Affine {
            m: [
                [ia, ib, -(ia * c + ib * f)],
                [id, ie, -(id * c + ie * f)],
            ],
        })
    }
}

/// Resample `image` under `transform`; destination pixels whose source falls outside are zero.
pub fn warp_affine(image: &SignImage, transform: &Affine) -> SignImage {
    let Some(inverse) = transform.inverse() else {
        return SignImage::filled(0.0);
    };

    let mut pixels = Vec::with_capacity(image.pixels().len());
    for y in 0..IMAGE_SIZE {
        for x in 0..IMAGE_SIZE {
            let (sx, sy) = inverse.apply(x as f32, y as f32);
            for channel in 0..CHANNELS {
                pixels.push(bilinear(image, sx, sy, channel));
            }
        }
    }

    SignImage::from_raw(pixels)
}

fn bilinear(image: &SignImage, x: f32, y: f32, channel: usize) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let sample = |xi: f32, yi: f32| -> f32 {
        if xi < 0.0 || yi < 0.0 || xi >= IMAGE_SIZE as f32 || yi >= IMAGE_SIZE as f32 {
            0.0
        } else {
            image.pixel(yi as usize, xi as usize, channel)
        }
    };

    let top = sample(x0, y0) * (1.0 - fx) + sample(x0 + 1.0, y0) * fx;
    let bottom = sample(x0, y0 + 1.0) * (1.0 - fx) + sample(x0 + 1.0, y0 + 1.0) * fx;
    top * (1.0 - fy) + bottom * fy
}

fn jitter(rng: &mut StdRng, range: f32) -> f32 {
    if range <= 0.0 {
        0.0
    } else {
        rng.gen_range(-range / 2.0..=range / 2.0)
    }
}

#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    pub fn count(&self, epoch: usize) -> usize {
        augment_count(self.config.base_count, epoch)
    }

    /// Rotation, then translation, then shear, each drawn from its configured range.
    pub fn random_transform(&self, rng: &mut StdRng) -> Affine {
        let centre = IMAGE_SIZE as f32 / 2.0;
        let rotation = Affine::rotation(centre, centre, jitter(rng, self.config.rotation_deg));
        let translation = Affine::translation(
            jitter(rng, self.config.translation_px),
            jitter(rng, self.config.translation_px),
        );
        let shear = Affine::shear(
            5.0 + jitter(rng, self.config.shear_px),
            20.0 + jitter(rng, self.config.shear_px),
        );

        rotation.then(&translation).then(&shear)
    }

    /// Extra samples for one minibatch, drawn with replacement from `batch`.
    pub fn augment(&self, batch: &[SignItem], epoch: usize, rng: &mut StdRng) -> Vec<SignItem> {
        if batch.is_empty() {
            return Vec::new();
        }

        (0..self.count(epoch))
            .map(|_| {
                let source = &batch[rng.gen_range(0..batch.len())];
                let transform = self.random_transform(rng);
                SignItem {
                    image: warp_affine(&source.image, &transform),
                    label: source.label.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use signnet_core::seeded_rng;

    use super::*;
    use crate::dataset::{OneHot, PIXELS_PER_IMAGE};

    fn gradient_image() -> SignImage {
        let pixels = (0..PIXELS_PER_IMAGE)
            .map(|i| (i % 97) as f32 / 97.0)
            .collect();
        SignImage::new(pixels).unwrap()
    }

    #[test]
    fn count_never_increases() {
        let mut previous = augment_count(50, 0);
        assert_eq!(previous, 50);
        for epoch in 1..200 {
            let current = augment_count(50, epoch);
            assert!(current <= previous, "epoch {epoch}: {current} > {previous}");
            previous = current;
        }
        assert_eq!(augment_count(50, 1), 25);
        assert_eq!(augment_count(50, 50), 0);
    }

    #[test]
    fn identity_warp_keeps_image() {
        let image = gradient_image();
        let warped = warp_affine(&image, &Affine::identity());
        for (a, b) in image.pixels().iter().zip(warped.pixels()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn unit_translation_shifts_pixels() {
        let image = gradient_image();
        let warped = warp_affine(&image, &Affine::translation(1.0, 0.0));

        for y in 0..IMAGE_SIZE {
            assert_eq!(warped.pixel(y, 0, 0), 0.0);
            for x in 1..IMAGE_SIZE {
                assert!((warped.pixel(y, x, 2) - image.pixel(y, x - 1, 2)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn unperturbed_shear_is_identity() {
        let shear = Affine::shear(5.0, 20.0);
        let (x, y) = shear.apply(12.0, 7.0);
        assert!((x - 12.0).abs() < 1e-5 && (y - 7.0).abs() < 1e-5);
    }

    #[test]
    fn composition_inverts() {
        let map = Affine::rotation(15.0, 15.0, 1.3)
            .then(&Affine::translation(0.7, -1.1))
            .then(&Affine::shear(4.2, 21.0));
        let inverse = map.inverse().unwrap();
        let (x, y) = map.apply(3.0, 25.0);
        let (bx, by) = inverse.apply(x, y);
        assert!((bx - 3.0).abs() < 1e-3 && (by - 25.0).abs() < 1e-3);
    }

    #[test]
    fn augment_samples_from_batch() {
        let batch = vec![
            SignItem {
                image: gradient_image(),
                label: OneHot::new(3).unwrap(),
            },
            SignItem {
                image: SignImage::filled(0.5),
                label: OneHot::new(9).unwrap(),
            },
        ];
        let augmenter = Augmenter::new(AugmentationConfig::default());
        let mut rng = seeded_rng(5);

        let extra = augmenter.augment(&batch, 0, &mut rng);
        assert_eq!(extra.len(), 50);
        assert!(extra.iter().all(|item| [3, 9].contains(&item.label.class())));

        assert_eq!(augmenter.augment(&batch, 60, &mut rng).len(), 0);
        assert!(augmenter.augment(&[], 0, &mut rng).is_empty());
    }
}
