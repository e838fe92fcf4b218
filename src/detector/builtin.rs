use std::path::Path;

use anyhow::{bail, Context};
use image::{GrayImage, Luma};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{connected_components, Connectivity};
use log::debug;

use super::{Detection, Detector};
use crate::geometry::{points_on_ellipse, Ellipse, Point};

/// Boundary points reported alongside a detected ellipse.
const BOUNDARY_POINTS: usize = 5;

/// Fixed frame the placeholder detectors pretend to see.
const PLACEHOLDER_SIZE: f64 = 192.0;

// ── Pupil ───────────────────────────────────────────────────────────────────

/// Dark-pupil detector: blurs the grayscale image, keeps the largest
/// connected region close to the darkest intensity and describes it by the
/// ellipse with the same second moments.
#[derive(Clone, Debug)]
pub struct DarkPupilDetector {
    pub blur_sigma: f32,
    /// Intensities up to `darkest + threshold_offset` count as pupil.
    pub threshold_offset: u8,
    pub min_area: usize,
    /// Regions covering more of the image than this are rejected.
    pub max_area_fraction: f64,
}

impl Default for DarkPupilDetector {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            threshold_offset: 40,
            min_area: 12,
            max_area_fraction: 0.5,
        }
    }
}

impl Detector for DarkPupilDetector {
    fn name(&self) -> &str {
        "Pupil Core"
    }

    fn detect(&self, image_path: &Path) -> anyhow::Result<Detection> {
        let image = image::open(image_path)
            .with_context(|| format!("failed to load image from {}", image_path.display()))?
            .to_luma8();
        let blurred = gaussian_blur_f32(&image, self.blur_sigma);

        let darkest = blurred
            .pixels()
            .map(|p| p.0[0])
            .min()
            .context("image is empty")?;
        let cutoff = darkest.saturating_add(self.threshold_offset);

        let region = largest_dark_region(&blurred, cutoff);
        let total = (blurred.width() as usize) * (blurred.height() as usize);
        if region.len() < self.min_area {
            bail!("no dark region large enough for a pupil");
        }
        if region.len() as f64 > self.max_area_fraction * total as f64 {
            bail!("no distinct dark region (image too uniform)");
        }

        let ellipse = moment_ellipse(&region);
        debug!(
            "dark region of {} px -> centre ({:.1}, {:.1})",
            region.len(),
            ellipse.center.x,
            ellipse.center.y
        );
        Ok(Detection::Ellipse {
            points: points_on_ellipse(&ellipse, BOUNDARY_POINTS),
            ellipse,
        })
    }
}

/// Largest 4-connected set of pixels at or below `cutoff`. Ties go to the
/// region found first in raster order.
fn largest_dark_region(image: &GrayImage, cutoff: u8) -> Vec<(u32, u32)> {
    let mask = threshold(image, cutoff, ThresholdType::BinaryInverted);
    let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));

    let mut areas: Vec<usize> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0] as usize) {
        if label == 0 {
            continue;
        }
        if areas.len() < label {
            areas.resize(label, 0);
        }
        areas[label - 1] += 1;
    }

    let Some(largest) = areas
        .iter()
        .enumerate()
        .max_by(|(i, a), (j, b)| a.cmp(b).then(j.cmp(i)))
        .map(|(i, _)| i as u32 + 1)
    else {
        return Vec::new();
    };

    labels
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] == largest)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// A filled ellipse with semi-axis `a` has variance `a² / 4` along it.
fn moment_ellipse(region: &[(u32, u32)]) -> Ellipse {
    let n = region.len() as f64;
    let (sx, sy) = region
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + f64::from(x), sy + f64::from(y)));
    let (mx, my) = (sx / n, sy / n);

    let (mut xx, mut yy, mut xy) = (0.0, 0.0, 0.0);
    for &(x, y) in region {
        let dx = f64::from(x) - mx;
        let dy = f64::from(y) - my;
        xx += dx * dx;
        yy += dy * dy;
        xy += dx * dy;
    }
    xx /= n;
    yy /= n;
    xy /= n;

    let half_trace = 0.5 * (xx + yy);
    let spread = (0.25 * (xx - yy).powi(2) + xy * xy).sqrt();
    let major = (half_trace + spread).max(0.0);
    let minor = (half_trace - spread).max(0.0);
    let angle = 0.5 * (2.0 * xy).atan2(xx - yy);

    Ellipse::new(
        Point::new(mx, my),
        (4.0 * major.sqrt(), 4.0 * minor.sqrt()),
        angle.to_degrees(),
    )
}

// ── Placeholders ────────────────────────────────────────────────────────────

/// Ignores the image and reports a centred circle on a 192 px frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderIrisDetector;

impl Detector for PlaceholderIrisDetector {
    fn name(&self) -> &str {
        "test"
    }

    fn detect(&self, _image_path: &Path) -> anyhow::Result<Detection> {
        let half = PLACEHOLDER_SIZE / 2.0;
        let ellipse = Ellipse::new(Point::new(half, half), (half, half), 0.0);
        Ok(Detection::Ellipse {
            points: points_on_ellipse(&ellipse, BOUNDARY_POINTS),
            ellipse,
        })
    }
}

/// Ignores the image and reports a four-point upper lid curve.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderEyelidDetector;

impl Detector for PlaceholderEyelidDetector {
    fn name(&self) -> &str {
        "test"
    }

    fn detect(&self, _image_path: &Path) -> anyhow::Result<Detection> {
        let s = PLACEHOLDER_SIZE;
        Ok(Detection::Contour(vec![
            Point::new(s * 0.2, s * 0.3),
            Point::new(s * 0.4, s * 0.2),
            Point::new(s * 0.6, s * 0.2),
            Point::new(s * 0.8, s * 0.3),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_eye(dir: &Path, cx: f64, cy: f64, a: f64, b: f64) -> std::path::PathBuf {
        let img = GrayImage::from_fn(160, 120, |x, y| {
            let dx = (f64::from(x) - cx) / a;
            let dy = (f64::from(y) - cy) / b;
            if dx * dx + dy * dy <= 1.0 {
                Luma([10])
            } else {
                Luma([200])
            }
        });
        let path = dir.join("eye.png");
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_dark_pupil_finds_ellipse() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_eye(dir.path(), 70.0, 55.0, 20.0, 12.0);

        let detection = DarkPupilDetector::default().detect(&path).unwrap();
        let Detection::Ellipse { ellipse, points } = detection else {
            panic!("expected an ellipse");
        };

        assert!((ellipse.center.x - 70.0).abs() < 1.0, "{ellipse:?}");
        assert!((ellipse.center.y - 55.0).abs() < 1.0, "{ellipse:?}");
        assert!((ellipse.size.0 - 40.0).abs() < 4.0, "{ellipse:?}");
        assert!((ellipse.size.1 - 24.0).abs() < 4.0, "{ellipse:?}");
        assert!(ellipse.angle.abs() < 2.0, "{ellipse:?}");
        assert_eq!(points.len(), 5);
    }

    #[test]
    fn test_largest_region_is_four_connected() {
        let mut img = GrayImage::from_pixel(12, 8, Luma([220]));
        // Three pixels touching only at corners, then a 2x2 block.
        for (x, y) in [(1, 1), (2, 2), (3, 3), (8, 2), (9, 2), (8, 3), (9, 3)] {
            img.put_pixel(x, y, Luma([20]));
        }

        let region = largest_dark_region(&img, 60);

        assert_eq!(region, vec![(8, 2), (9, 2), (8, 3), (9, 3)]);
        assert!(largest_dark_region(&img, 10).is_empty());
    }

    #[test]
    fn test_dark_pupil_rejects_uniform_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        GrayImage::from_pixel(64, 64, Luma([128])).save(&path).unwrap();

        assert!(DarkPupilDetector::default().detect(&path).is_err());
    }

    #[test]
    fn test_dark_pupil_missing_file() {
        let err = DarkPupilDetector::default()
            .detect(Path::new("/definitely/not/here.png"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to load image"));
    }

    #[test]
    fn test_placeholder_iris() {
        let Detection::Ellipse { ellipse, points } =
            PlaceholderIrisDetector.detect(Path::new("unused.png")).unwrap()
        else {
            panic!("expected an ellipse");
        };
        assert_eq!(ellipse, Ellipse::new(Point::new(96.0, 96.0), (96.0, 96.0), 0.0));
        assert_eq!(points.len(), 5);
    }

    #[test]
    fn test_placeholder_eyelid() {
        let detection = PlaceholderEyelidDetector.detect(Path::new("unused.png")).unwrap();
        let Detection::Contour(points) = detection else {
            panic!("expected a contour");
        };
        assert_eq!(points.len(), 4);
        assert!((points[0].x - 38.4).abs() < 1e-9);
    }
}
