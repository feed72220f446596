use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TransitionError;

/// Default cross-fade length in seconds
pub const DEFAULT_TRANSITION_LENGTH: f64 = 0.5;

/// Smallest gap between two consecutive cross-fade offsets
pub const MIN_OFFSET_STEP: f64 = 0.1;

/// Named cross-fade styles between consecutive scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    #[default]
    Fade,
    Slide,
    Zoom,
    Dissolve,
    Wipe,
    /// Hard cut
    None,
}

impl TransitionStyle {
    pub const ALL: [TransitionStyle; 6] = [
        Self::Fade,
        Self::Slide,
        Self::Zoom,
        Self::Dissolve,
        Self::Wipe,
        Self::None,
    ];

    /// Name of the ffmpeg `xfade` transition, `None` for a hard cut
    pub fn xfade_name(&self) -> Option<&'static str> {
        match self {
            Self::Fade => Some("fade"),
            Self::Slide => Some("slideleft"),
            Self::Zoom => Some("circleopen"),
            Self::Dissolve => Some("dissolve"),
            Self::Wipe => Some("wiperight"),
            Self::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Slide => "slide",
            Self::Zoom => "zoom",
            Self::Dissolve => "dissolve",
            Self::Wipe => "wipe",
            Self::None => "none",
        }
    }

    pub fn is_cut(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == name)
            .ok_or_else(|| {
                format!(
                    "unknown transition '{}' (expected one of: fade, slide, zoom, dissolve, wipe, none)",
                    s
                )
            })
    }
}

/// Transition style plus the fixed cross-fade length
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub style: TransitionStyle,
    pub length: f64,
}

impl TransitionSpec {
    pub fn new(style: TransitionStyle, length: f64) -> Self {
        Self { style, length }
    }

    pub fn cut() -> Self {
        Self::new(TransitionStyle::None, DEFAULT_TRANSITION_LENGTH)
    }
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self::new(TransitionStyle::Fade, DEFAULT_TRANSITION_LENGTH)
    }
}

/// Start time of every clip on a cross-faded timeline
///
/// `t_0 = 0` and `t_i = t_{i-1} + d_{i-1} - length`. When a clip is not longer
/// than the transition the candidate would not move forward, so it is clamped
/// to `t_{i-1} + MIN_OFFSET_STEP`.
pub fn crossfade_offsets(durations: &[f64], length: f64) -> Result<Vec<f64>, TransitionError> {
    for (index, &duration) in durations.iter().enumerate() {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(TransitionError::InvalidClip { index, duration });
        }
    }

    let mut offsets = Vec::with_capacity(durations.len());
    if durations.is_empty() {
        return Ok(offsets);
    }

    offsets.push(0.0);
    for i in 1..durations.len() {
        let previous = offsets[i - 1];
        let candidate = previous + durations[i - 1] - length;
        offsets.push(if candidate > previous {
            candidate
        } else {
            previous + MIN_OFFSET_STEP
        });
    }

    Ok(offsets)
}

/// Pairwise `xfade` chain over a clip list
#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadeGraph {
    pub style: TransitionStyle,
    pub length: f64,
    pub durations: Vec<f64>,
    pub offsets: Vec<f64>,
}

impl CrossfadeGraph {
    pub fn build(durations: Vec<f64>, spec: TransitionSpec) -> Result<Self, TransitionError> {
        if spec.style.is_cut() {
            return Err(TransitionError::RenderFailed {
                reason: "hard cut has no cross-fade graph".to_string(),
            });
        }

        if durations.len() < 2 {
            return Err(TransitionError::RenderFailed {
                reason: format!("cross-fade needs at least 2 clips, got {}", durations.len()),
            });
        }

        let offsets = crossfade_offsets(&durations, spec.length)?;
        Ok(Self {
            style: spec.style,
            length: spec.length,
            durations,
            offsets,
        })
    }

    /// Length of the composed video
    pub fn expected_length(&self) -> f64 {
        match (self.offsets.last(), self.durations.last()) {
            (Some(offset), Some(duration)) => offset + duration,
            _ => 0.0,
        }
    }

    /// `filter_complex` expression; the composed stream is labelled `[vout]`
    pub fn filter_complex(&self) -> String {
        let name = self.style.xfade_name().unwrap_or("fade");
        let last = self.offsets.len() - 1;

        self.offsets
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, offset)| {
                let left = if i == 1 { "[0:v]".to_string() } else { format!("[x{}]", i - 1) };
                let out = if i == last { "[vout]".to_string() } else { format!("[x{}]", i) };
                format!(
                    "{}[{}:v]xfade=transition={}:duration={:.3}:offset={:.3}{}",
                    left, i, name, self.length, offset, out
                )
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing() {
        assert_eq!("fade".parse::<TransitionStyle>().unwrap(), TransitionStyle::Fade);
        assert_eq!(" Wipe ".parse::<TransitionStyle>().unwrap(), TransitionStyle::Wipe);
        assert_eq!("none".parse::<TransitionStyle>().unwrap(), TransitionStyle::None);
        assert!("spiral".parse::<TransitionStyle>().is_err());
    }

    #[test]
    fn test_xfade_names() {
        assert_eq!(TransitionStyle::Slide.xfade_name(), Some("slideleft"));
        assert_eq!(TransitionStyle::Zoom.xfade_name(), Some("circleopen"));
        assert_eq!(TransitionStyle::None.xfade_name(), None);
    }

    #[test]
    fn test_three_equal_clips() {
        let offsets = crossfade_offsets(&[5.0, 5.0, 5.0], 0.5).unwrap();
        assert_eq!(offsets, vec![0.0, 4.5, 9.0]);

        let graph = CrossfadeGraph::build(vec![5.0, 5.0, 5.0], TransitionSpec::default()).unwrap();
        assert!((graph.expected_length() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_offsets_strictly_increasing() {
        let durations = [3.2, 0.4, 0.5, 7.0, 0.05, 2.0];
        let offsets = crossfade_offsets(&durations, 0.5).unwrap();

        let mut cumulative = 0.0;
        for i in 0..offsets.len() {
            if i > 0 {
                assert!(offsets[i] > offsets[i - 1]);
            }
            cumulative += durations[i];
            assert!(offsets[i] <= cumulative);
        }
    }

    #[test]
    fn test_short_clip_is_clamped() {
        let offsets = crossfade_offsets(&[2.0, 0.3, 4.0], 0.5).unwrap();
        assert!((offsets[1] - 1.5).abs() < 1e-9);
        assert!((offsets[2] - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_is_invalid() {
        let result = crossfade_offsets(&[2.0, 0.0, 4.0], 0.5);
        assert!(matches!(result, Err(TransitionError::InvalidClip { index: 1, .. })));
    }

    #[test]
    fn test_filter_complex_chains_clips() {
        let graph = CrossfadeGraph::build(vec![5.0, 5.0, 5.0], TransitionSpec::default()).unwrap();
        assert_eq!(
            graph.filter_complex(),
            "[0:v][1:v]xfade=transition=fade:duration=0.500:offset=4.500[x1];\
             [x1][2:v]xfade=transition=fade:duration=0.500:offset=9.000[vout]"
        );
    }

    #[test]
    fn test_graph_rejects_cut_and_single_clip() {
        assert!(CrossfadeGraph::build(vec![1.0, 2.0], TransitionSpec::cut()).is_err());
        assert!(CrossfadeGraph::build(vec![1.0], TransitionSpec::default()).is_err());
    }
}
