use image::{Rgb, RgbImage};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::error::{ReelError, Result};

const BORDER_INSET: u32 = 20;
const BORDER_WIDTH: u32 = 3;

/// One placeholder still to render
#[derive(Debug, Clone)]
pub struct PlaceholderSpec {
    pub path: PathBuf,
    pub label: String,
    /// Fixed base color; derived from the label when absent
    pub color: Option<[u8; 3]>,
}

impl PlaceholderSpec {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, label: S) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }
}

/// Renders gradient placeholder stills for scenes without real images
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderRenderer {
    width: u32,
    height: u32,
}

impl PlaceholderRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Render a batch in parallel off the async runtime
    pub async fn render_all(&self, specs: Vec<PlaceholderSpec>) -> Result<Vec<PathBuf>> {
        let renderer = *self;
        tokio::task::spawn_blocking(move || {
            specs
                .par_iter()
                .map(|spec| renderer.render(spec))
                .collect::<Result<Vec<PathBuf>>>()
        })
        .await
        .map_err(|e| ReelError::generic(format!("Placeholder render task failed: {}", e)))?
    }

    pub fn render(&self, spec: &PlaceholderSpec) -> Result<PathBuf> {
        let base = spec.color.unwrap_or_else(|| color_for(&spec.label));
        let image = self.draw(base, &spec.label);

        if let Some(parent) = spec.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image
            .save(&spec.path)
            .map_err(|e| ReelError::generic(format!("Failed to save {}: {}", spec.path.display(), e)))?;

        Ok(spec.path.clone())
    }

    /// Vertical gradient, a darker caption band and a white border
    fn draw(&self, base: [u8; 3], label: &str) -> RgbImage {
        let (w, h) = (self.width, self.height);
        let band_top = h / 2 - h / 10;
        let band_bottom = h / 2 + h / 10;
        // band width follows the label length so different labels look different
        let band_half = ((label.chars().count() as u32 * w / 60).max(w / 6)).min((w / 2).saturating_sub(BORDER_INSET * 2));

        RgbImage::from_fn(w, h, |x, y| {
            let on_border = is_border(x, y, w, h);
            if on_border {
                return Rgb([255, 255, 255]);
            }

            let shade = 1.0 - 0.35 * (y as f32 / h as f32);
            let mut pixel = base.map(|c| (c as f32 * shade) as u8);

            let in_band = y >= band_top && y < band_bottom && x + band_half >= w / 2 && x < w / 2 + band_half;
            if in_band {
                pixel = pixel.map(|c| c / 2);
            }

            Rgb(pixel)
        })
    }
}

fn is_border(x: u32, y: u32, w: u32, h: u32) -> bool {
    let near = |v: u32, edge: u32| v >= edge && v < edge + BORDER_WIDTH;
    let inside_x = x >= BORDER_INSET && x < w.saturating_sub(BORDER_INSET);
    let inside_y = y >= BORDER_INSET && y < h.saturating_sub(BORDER_INSET);

    (inside_x && (near(y, BORDER_INSET) || near(y, h.saturating_sub(BORDER_INSET + BORDER_WIDTH))))
        || (inside_y && (near(x, BORDER_INSET) || near(x, w.saturating_sub(BORDER_INSET + BORDER_WIDTH))))
}

/// Deterministic muted color for a label
pub fn color_for(label: &str) -> [u8; 3] {
    let mut hasher = DefaultHasher::new();
    label.hash(&mut hasher);
    let mut rng = SmallRng::seed_from_u64(hasher.finish());

    let hue = rng.gen_range(0.0..360.0);
    let saturation = rng.gen_range(0.25..0.45);
    let value = rng.gen_range(0.45..0.65);
    hsv_to_rgb(hue, saturation, value)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}

/// Whether `path` looks like an image this crate can hand to the encoder
pub fn is_image_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp")
    )
}
