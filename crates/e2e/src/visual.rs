//! Visual snapshots: capture during scenarios, compare out-of-band
//!
//! The runner only stores PNGs. Comparing them against baselines is a separate
//! pass and never changes a scenario's verdict.

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Per-channel difference tolerated as anti-aliasing noise
const CHANNEL_TOLERANCE: i32 = 5;

/// Lowercase, dash-separated file stem for a human title
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("snapshot");
    }
    slug
}

/// Where captured snapshots are written
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative key `<scenario-slug>/<name-slug>` for a checkpoint
    pub fn key(scenario: &str, name: &str) -> String {
        format!("{}/{}", slugify(scenario), slugify(name))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.png", key))
    }

    pub fn save(&self, key: &str, png: &[u8]) -> E2eResult<PathBuf> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, png)?;
        debug!("Saved snapshot {}", path.display());
        Ok(path)
    }
}

/// Result of a visual comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiff {
    pub name: String,

    /// Whether the images match (within threshold)
    pub matches: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    pub diff_pixels: u64,
    pub total_pixels: u64,

    /// Path to the diff image (if generated)
    pub diff_image_path: Option<PathBuf>,

    pub actual_hash: String,
    pub baseline_hash: String,
}

/// Outcome of comparing every captured snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualReport {
    pub compared: Vec<VisualDiff>,
    /// Snapshots without a baseline
    pub missing_baselines: Vec<String>,
}

impl VisualReport {
    pub fn regressions(&self) -> impl Iterator<Item = &VisualDiff> {
        self.compared.iter().filter(|d| !d.matches)
    }

    pub fn is_clean(&self) -> bool {
        self.regressions().next().is_none()
    }
}

/// Visual regression testing utilities
pub struct VisualTester {
    baseline_dir: PathBuf,
    actual_dir: PathBuf,
    diff_dir: PathBuf,

    /// Default threshold (0.0 - 100.0 percent)
    threshold: f64,

    /// Whether to adopt the actual image when a baseline is missing
    auto_update: bool,
}

impl VisualTester {
    pub fn new(config: VisualConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.snapshot_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;

        Ok(Self {
            baseline_dir: config.baseline_dir,
            actual_dir: config.snapshot_dir,
            diff_dir: config.diff_dir,
            threshold: config.threshold,
            auto_update: config.auto_update,
        })
    }

    /// Keys (`scenario/name`) of every captured snapshot
    pub fn captured(&self) -> E2eResult<Vec<String>> {
        list_pngs(&self.actual_dir)
    }

    pub fn list_baselines(&self) -> E2eResult<Vec<String>> {
        list_pngs(&self.baseline_dir)
    }

    /// Compare every captured snapshot with its baseline
    pub fn compare_all(&self, threshold: Option<f64>) -> E2eResult<VisualReport> {
        let mut report = VisualReport::default();
        for key in self.captured()? {
            match self.compare(&key, threshold) {
                Ok(diff) => report.compared.push(diff),
                Err(E2eError::BaselineNotFound(_)) => {
                    info!("No baseline for '{}' - run update-baselines to create it", key);
                    report.missing_baselines.push(key);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Compare a snapshot against its baseline
    pub fn compare(&self, key: &str, threshold: Option<f64>) -> E2eResult<VisualDiff> {
        let threshold = threshold.unwrap_or(self.threshold);

        let actual_path = self.actual_dir.join(format!("{}.png", key));
        let baseline_path = self.baseline_dir.join(format!("{}.png", key));

        if !actual_path.exists() {
            return Err(E2eError::VisualRegression(format!(
                "Snapshot not found: {}",
                actual_path.display()
            )));
        }

        if !baseline_path.exists() {
            if !self.auto_update {
                return Err(E2eError::BaselineNotFound(baseline_path.display().to_string()));
            }
            info!("Creating baseline for '{}' (auto-update enabled)", key);
            self.update_baseline(key)?;
        }

        let actual_hash = hash_file(&actual_path)?;
        let baseline_hash = hash_file(&baseline_path)?;

        let actual_img = image::open(&actual_path)?;

        if actual_hash == baseline_hash {
            debug!("Snapshot '{}' matches exactly (same hash)", key);
            return Ok(VisualDiff {
                name: key.to_string(),
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: u64::from(actual_img.width()) * u64::from(actual_img.height()),
                diff_image_path: None,
                actual_hash,
                baseline_hash,
            });
        }

        let baseline_img = image::open(&baseline_path)?;
        let same_size = actual_img.dimensions() == baseline_img.dimensions();
        if !same_size {
            warn!(
                "Snapshot dimensions differ for '{}': actual {:?} vs baseline {:?}",
                key,
                actual_img.dimensions(),
                baseline_img.dimensions()
            );
        }

        let actual = actual_img.to_rgba8();
        let baseline = baseline_img.to_rgba8();
        let (diff_img, diff_pixels, total_pixels) = pixel_diff(&actual, &baseline);

        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            (diff_pixels as f64 / total_pixels as f64) * 100.0
        };
        // A resized or cropped capture is a regression at any threshold
        let matches = same_size && diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{}-diff.png", key));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                key, diff_percent, threshold
            );
        }

        Ok(VisualDiff {
            name: key.to_string(),
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
            actual_hash,
            baseline_hash,
        })
    }

    /// Adopt the captured snapshot as the new baseline
    pub fn update_baseline(&self, key: &str) -> E2eResult<()> {
        let actual_path = self.actual_dir.join(format!("{}.png", key));
        let baseline_path = self.baseline_dir.join(format!("{}.png", key));

        if !actual_path.exists() {
            return Err(E2eError::VisualRegression(format!(
                "Cannot update baseline: snapshot not found: {}",
                actual_path.display()
            )));
        }

        if let Some(parent) = baseline_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&actual_path, &baseline_path)?;
        info!("Updated baseline for '{}'", key);
        Ok(())
    }

    pub fn update_all(&self) -> E2eResult<usize> {
        let keys = self.captured()?;
        for key in &keys {
            self.update_baseline(key)?;
        }
        Ok(keys.len())
    }

    /// Remove previously generated diff images
    pub fn clean_diffs(&self) -> E2eResult<()> {
        if self.diff_dir.exists() {
            std::fs::remove_dir_all(&self.diff_dir)?;
        }
        std::fs::create_dir_all(&self.diff_dir)?;
        Ok(())
    }
}

/// Red marks differing pixels; matching ones are dimmed. Compared over the
/// union of both images, so area present in only one of them counts as differing.
fn pixel_diff(actual: &RgbaImage, baseline: &RgbaImage) -> (RgbaImage, u64, u64) {
    let width = actual.width().max(baseline.width());
    let height = actual.height().max(baseline.height());
    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;
    let total_pixels = u64::from(width) * u64::from(height);

    for y in 0..height {
        for x in 0..width {
            let a = pixel_at(actual, x, y);
            let b = pixel_at(baseline, x, y);
            match (a, b) {
                (Some(a), Some(b)) if !pixels_differ(a, b) => {
                    let c = a.channels();
                    diff_img.put_pixel(x, y, Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
                _ => {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                }
            }
        }
    }

    (diff_img, diff_pixels, total_pixels)
}

fn pixel_at(img: &RgbaImage, x: u32, y: u32) -> Option<&Rgba<u8>> {
    (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y))
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() > CHANNEL_TOLERANCE)
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&data)))
}

/// PNG keys relative to `dir`, without extension, `/`-separated
fn list_pngs(dir: &Path) -> E2eResult<Vec<String>> {
    let mut keys = Vec::new();
    if !dir.exists() {
        return Ok(keys);
    }

    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| E2eError::Io(e.into()))?;
        let path = entry.path();
        if !path.extension().map(|e| e == "png").unwrap_or(false) {
            continue;
        }
        if let Ok(rel) = path.with_extension("").strip_prefix(dir) {
            let key: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            keys.push(key.join("/"));
        }
    }
    Ok(keys)
}

/// Configuration for visual testing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub snapshot_dir: PathBuf,
    pub baseline_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub threshold: f64,
    pub auto_update: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("test-results/snapshots"),
            baseline_dir: PathBuf::from("test-results/baselines"),
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }
}
