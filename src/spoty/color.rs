//! Dominant color extraction.
//!
//! Deterministic k-means over a downscaled copy of the image: identical
//! pixels always produce the identical color.

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::error::ImageError;

/// Images are downscaled to fit this edge before clustering.
const MAX_EDGE: u32 = 256;
const CLUSTERS: usize = 4;
const MAX_ITERATIONS: usize = 20;
/// Pixels more transparent than this are ignored.
const MIN_ALPHA: u8 = 128;

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `#RRGGBB`, uppercase.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Decode raw image bytes and compute their dominant color.
pub fn analyze(bytes: &[u8]) -> Result<Rgba, ImageError> {
    let image = image::load_from_memory(bytes)?;
    Ok(dominant_color(&image))
}

type Point = [f64; 3];

fn distance(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn mean(points: &[Point]) -> Point {
    let mut sum = [0.0; 3];
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
    }
    let n = points.len().max(1) as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

fn nearest(point: &Point, centroids: &[Point]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance(point, c)))
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
        .0
}

/// Farthest-point seeding, starting from the mean color.
fn seed(points: &[Point], k: usize) -> Vec<Point> {
    let mut centroids = vec![mean(points)];

    while centroids.len() < k {
        let farthest = points
            .iter()
            .map(|p| {
                let d = centroids
                    .iter()
                    .map(|c| distance(p, c))
                    .fold(f64::INFINITY, f64::min);
                (p, d)
            })
            .fold((None, 0.0), |best, (p, d)| {
                if d > best.1 {
                    (Some(p), d)
                } else {
                    best
                }
            });

        match farthest {
            (Some(p), _) => centroids.push(*p),
            // every pixel already sits on a centroid
            (None, _) => break,
        }
    }

    centroids
}

/// The single most representative color of `image`.
pub fn dominant_color(image: &DynamicImage) -> Rgba {
    let (width, height) = image.dimensions();
    let thumbnail = if width > MAX_EDGE || height > MAX_EDGE {
        image.thumbnail(MAX_EDGE, MAX_EDGE)
    } else {
        image.clone()
    };
    let rgba = thumbnail.to_rgba8();

    let opaque: Vec<Point> = rgba
        .pixels()
        .filter(|p| p[3] >= MIN_ALPHA)
        .map(|p| [f64::from(p[0]), f64::from(p[1]), f64::from(p[2])])
        .collect();
    let points = if opaque.is_empty() {
        rgba.pixels()
            .map(|p| [f64::from(p[0]), f64::from(p[1]), f64::from(p[2])])
            .collect()
    } else {
        opaque
    };

    if points.is_empty() {
        return Rgba::new(0, 0, 0, 255);
    }

    let mut centroids = seed(&points, CLUSTERS);
    let mut assignments = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (slot, point) in assignments.iter_mut().zip(&points) {
            let cluster = nearest(point, &centroids);
            if *slot != cluster {
                *slot = cluster;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        for (i, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<Point> = points
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == i)
                .map(|(p, _)| *p)
                .collect();
            if !members.is_empty() {
                *centroid = mean(&members);
            }
        }
    }

    let mut counts = vec![0usize; centroids.len()];
    for &a in &assignments {
        counts[a] += 1;
    }

    let largest = counts
        .iter()
        .enumerate()
        .fold(0, |best, (i, &count)| if count > counts[best] { i } else { best });
    let color = centroids[largest];

    Rgba::new(
        color[0].round().clamp(0.0, 255.0) as u8,
        color[1].round().clamp(0.0, 255.0) as u8,
        color[2].round().clamp(0.0, 255.0) as u8,
        255,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn encode_png(image: RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_hex() {
        assert_eq!(Rgba::new(255, 0, 16, 255).to_hex(), "#FF0010");
        assert_eq!(Rgba::new(0, 0, 0, 0).to_hex(), "#000000");
    }

    #[test]
    fn test_solid_image() {
        let image = RgbaImage::from_pixel(32, 32, image::Rgba([200, 30, 40, 255]));
        let color = dominant_color(&DynamicImage::ImageRgba8(image));
        assert_eq!(color, Rgba::new(200, 30, 40, 255));
    }

    #[test]
    fn test_majority_color_wins() {
        // three quarters blue, one quarter yellow
        let image = RgbaImage::from_fn(40, 40, |x, _| {
            if x < 30 {
                image::Rgba([10, 20, 220, 255])
            } else {
                image::Rgba([250, 240, 0, 255])
            }
        });
        let color = dominant_color(&DynamicImage::ImageRgba8(image));
        assert_eq!(color.to_hex(), "#0A14DC");
    }

    #[test]
    fn test_transparent_pixels_ignored() {
        let image = RgbaImage::from_fn(20, 20, |x, _| {
            if x < 15 {
                image::Rgba([255, 255, 255, 0])
            } else {
                image::Rgba([0, 128, 0, 255])
            }
        });
        let color = dominant_color(&DynamicImage::ImageRgba8(image));
        assert_eq!(color, Rgba::new(0, 128, 0, 255));
    }

    #[test]
    fn test_large_image_is_downscaled_deterministically() {
        let image = RgbaImage::from_fn(600, 400, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
        });
        let image = DynamicImage::ImageRgba8(image);
        assert_eq!(dominant_color(&image), dominant_color(&image));
    }

    #[test]
    fn test_analyze_png_bytes() {
        let bytes = encode_png(RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 255])));
        assert_eq!(analyze(&bytes).unwrap(), Rgba::new(1, 2, 3, 255));
    }

    #[test]
    fn test_analyze_rejects_garbage() {
        assert!(matches!(
            analyze(b"definitely not an image"),
            Err(ImageError::Decode(_))
        ));
    }
}
