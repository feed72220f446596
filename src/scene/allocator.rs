use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{InputError, ReelError, Result};
use crate::scene::types::{Scene, ScriptSection};

/// Default drift allowed between scene total and narration before rescaling
pub const DEFAULT_SYNC_TOLERANCE: f64 = 0.5;

/// Converts script sections, images and a narration length into timed scenes
///
/// Narration pacing follows character count, so each section's share of the
/// narration is its share of spoken characters. Sections are walked in the
/// order given; each takes the next image and the last image is reused once
/// the images run out.
#[derive(Debug, Clone)]
pub struct SceneAllocator {
    tolerance: f64,
}

impl SceneAllocator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Allocate `target_duration` seconds across `sections`
    pub fn allocate(
        &self,
        sections: &[ScriptSection],
        images: &[PathBuf],
        target_duration: f64,
    ) -> Result<Vec<Scene>> {
        if images.is_empty() {
            return Err(ReelError::NoImages);
        }

        if !(target_duration.is_finite() && target_duration > 0.0) {
            return Err(InputError::InvalidNarrationDuration { duration: target_duration }.into());
        }

        let spoken: Vec<(&ScriptSection, usize)> = sections
            .iter()
            .map(|section| (section, section.spoken_chars()))
            .filter(|(_, chars)| *chars > 0)
            .collect();

        let total_chars: usize = spoken.iter().map(|(_, chars)| chars).sum();
        if total_chars == 0 {
            return Err(InputError::EmptyScript.into());
        }

        let mut durations: Vec<f64> = spoken
            .iter()
            .map(|(_, chars)| (*chars as f64 / total_chars as f64) * target_duration)
            .collect();

        let ratio = rescale_durations(&mut durations, target_duration, self.tolerance);
        if ratio != 1.0 {
            debug!("Rescaled scene durations by {:.4}", ratio);
        }

        let scenes: Vec<Scene> = spoken
            .iter()
            .zip(durations)
            .enumerate()
            .map(|(index, ((section, _), duration))| Scene {
                index,
                section: section.tag.clone(),
                text: section.text.clone(),
                duration,
                image_path: image_for(index, images),
            })
            .collect();

        info!(
            "Allocated {:.1}s across {} scenes using {} images",
            target_duration,
            scenes.len(),
            images.len().min(scenes.len())
        );

        Ok(scenes)
    }
}

impl Default for SceneAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_TOLERANCE)
    }
}

/// Next unused image, or the last one once they are exhausted
fn image_for(index: usize, images: &[PathBuf]) -> PathBuf {
    images
        .get(index)
        .or_else(|| images.last())
        .cloned()
        .unwrap_or_default()
}

/// Stretch `durations` so they tile `target` when they drift past `tolerance`
///
/// Returns the applied ratio; 1.0 means the durations were left untouched.
pub fn rescale_durations(durations: &mut [f64], target: f64, tolerance: f64) -> f64 {
    let total: f64 = durations.iter().sum();
    if total <= 0.0 || (total - target).abs() <= tolerance {
        return 1.0;
    }

    let ratio = target / total;
    for duration in durations.iter_mut() {
        *duration *= ratio;
    }
    ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::types::total_duration;

    fn images(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("img_{}.png", i))).collect()
    }

    fn sections(texts: &[&str]) -> Vec<ScriptSection> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| ScriptSection::new(format!("part_{}", i + 1), *text))
            .collect()
    }

    #[test]
    fn test_no_images() {
        let allocator = SceneAllocator::default();
        let result = allocator.allocate(&sections(&["hello"]), &[], 10.0);
        assert!(matches!(result, Err(ReelError::NoImages)));
    }

    #[test]
    fn test_weights_follow_spoken_characters() {
        let allocator = SceneAllocator::default();
        // 10 and 30 spoken characters, whitespace ignored
        let scenes = allocator
            .allocate(&sections(&["abcde fghij", "abcdefghij\nabcdefghij abcdefghij"]), &images(2), 20.0)
            .unwrap();

        assert_eq!(scenes.len(), 2);
        assert!((scenes[0].duration - 5.0).abs() < 1e-9);
        assert!((scenes[1].duration - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_tiling() {
        let allocator = SceneAllocator::default();
        let texts = ["intro text", "a much longer overview section", "price", "closing words here"];
        for target in [3.0, 17.25, 60.0, 412.9] {
            let scenes = allocator.allocate(&sections(&texts), &images(3), target).unwrap();
            assert!((total_duration(&scenes) - target).abs() <= 0.5);
            assert!(scenes.iter().all(|s| s.duration > 0.0));
        }
    }

    #[test]
    fn test_image_exhaustion_reuses_last() {
        let allocator = SceneAllocator::default();
        let scenes = allocator
            .allocate(&sections(&["one", "two", "three", "four"]), &images(2), 12.0)
            .unwrap();

        assert_eq!(scenes[0].image_path, PathBuf::from("img_0.png"));
        assert_eq!(scenes[1].image_path, PathBuf::from("img_1.png"));
        assert_eq!(scenes[2].image_path, PathBuf::from("img_1.png"));
        assert_eq!(scenes[3].image_path, PathBuf::from("img_1.png"));
    }

    #[test]
    fn test_scenes_numbered_in_section_order() {
        let allocator = SceneAllocator::default();
        let scenes = allocator
            .allocate(&sections(&["first", "", "third", "fourth"]), &images(5), 9.0)
            .unwrap();

        // the blank section is skipped and numbering stays contiguous
        let indices: Vec<usize> = scenes.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        let tags: Vec<&str> = scenes.iter().map(|s| s.section.as_str()).collect();
        assert_eq!(tags, vec!["part_1", "part_3", "part_4"]);
    }

    #[test]
    fn test_empty_script_rejected() {
        let allocator = SceneAllocator::default();
        let result = allocator.allocate(&sections(&["  ", "\n"]), &images(1), 10.0);
        assert!(matches!(result, Err(ReelError::Input(InputError::EmptyScript))));
    }

    #[test]
    fn test_invalid_target_rejected() {
        let allocator = SceneAllocator::default();
        assert!(allocator.allocate(&sections(&["x"]), &images(1), 0.0).is_err());
        assert!(allocator.allocate(&sections(&["x"]), &images(1), f64::NAN).is_err());
    }

    #[test]
    fn test_rescale_within_tolerance_is_noop() {
        let mut durations = vec![4.0, 5.0, 5.8];
        let ratio = rescale_durations(&mut durations, 15.0, 0.5);
        assert_eq!(ratio, 1.0);
        assert_eq!(durations, vec![4.0, 5.0, 5.8]);
    }

    #[test]
    fn test_rescale_tiles_target_exactly() {
        let mut durations = vec![10.0, 20.0, 30.0];
        let ratio = rescale_durations(&mut durations, 45.0, 0.5);
        assert!((ratio - 0.75).abs() < 1e-12);
        let total: f64 = durations.iter().sum();
        assert!((total - 45.0).abs() < 1e-9);

        // a second pass is a no-op
        assert_eq!(rescale_durations(&mut durations, 45.0, 0.5), 1.0);
    }
}
