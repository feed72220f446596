use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::composition::transition::CrossfadeGraph;
use crate::config::{AudioConfig, Config, VideoConfig};
use crate::error::{EncodingError, ReelError, Result, TransitionError};

/// Media operations the composition engine needs
///
/// Calls block until the underlying process exits; the engine dispatches them
/// with `spawn_blocking`.
pub trait MediaEncoder: Send + Sync {
    /// Fail if the encoder cannot run at all
    fn check_available(&self) -> Result<()>;

    /// Hold one still image for `duration` seconds
    fn render_still(&self, image: &Path, duration: f64, output: &Path) -> Result<()>;

    /// Chain `clips` through the cross-fade graph
    fn crossfade(
        &self,
        clips: &[PathBuf],
        graph: &CrossfadeGraph,
        output: &Path,
    ) -> std::result::Result<(), TransitionError>;

    /// Stream-copy concatenation via a concat list file
    fn concat(&self, clips: &[PathBuf], list_path: &Path, output: &Path) -> Result<()>;

    /// Copy the video stream and encode the narration into it
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    /// Container duration in seconds
    fn probe_duration(&self, media: &Path) -> Result<f64>;
}

/// Encoder driving the `ffmpeg` and `ffprobe` command line tools
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    video: VideoConfig,
    audio: AudioConfig,
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl FfmpegEncoder {
    pub fn new(video: VideoConfig, audio: AudioConfig) -> Self {
        Self {
            video,
            audio,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            video: config.video.clone(),
            audio: config.audio.clone(),
            ffmpeg_bin: config.composition.ffmpeg_bin.clone(),
            ffprobe_bin: config.composition.ffprobe_bin.clone(),
        }
    }

    /// Whether a binary answers `-version`
    pub fn binary_available(bin: &str) -> bool {
        Command::new(bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Map a 0-100 quality setting onto x264's CRF scale (lower is better)
    pub fn quality_to_crf(quality: u8) -> u8 {
        (51 - ((quality.min(100) as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }

    fn size(&self) -> String {
        format!("{}x{}", self.video.width, self.video.height)
    }

    /// Per-still filter chain: fit, pad, optional slow zoom, normalize
    pub fn still_filter(&self, duration: f64) -> String {
        let (w, h, fps) = (self.video.width, self.video.height, self.video.fps);
        let mut filters = vec![
            format!("scale={}:{}:force_original_aspect_ratio=decrease", w, h),
            format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", w, h),
            "setsar=1".to_string(),
        ];

        if self.video.ken_burns {
            let frames = (duration * fps as f64).ceil().max(1.0);
            let step = (self.video.zoom_ceiling - 1.0) / frames;
            filters.push(format!(
                "zoompan=z='min(1+{:.6}*on,{})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={}:fps={}",
                step,
                self.video.zoom_ceiling,
                self.size(),
                fps
            ));
        }

        filters.push(format!("fps={}", fps));
        filters.push(format!("format={}", self.video.pixel_format));
        filters.join(",")
    }

    fn encode_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.video.codec.clone(),
            "-preset".to_string(),
            self.video.preset.clone(),
            "-crf".to_string(),
            Self::quality_to_crf(self.video.quality).to_string(),
            "-pix_fmt".to_string(),
            self.video.pixel_format.clone(),
        ]
    }

    pub fn still_args(&self, image: &Path, duration: f64, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            self.video.fps.to_string(),
            "-t".to_string(),
            format!("{:.3}", duration),
            "-i".to_string(),
            image.display().to_string(),
            "-vf".to_string(),
            self.still_filter(duration),
            "-t".to_string(),
            format!("{:.3}", duration),
        ];
        args.extend(self.encode_args());
        args.push("-an".to_string());
        args.push(output.display().to_string());
        args
    }

    pub fn crossfade_args(&self, clips: &[PathBuf], graph: &CrossfadeGraph, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string()];
        for clip in clips {
            args.push("-i".to_string());
            args.push(clip.display().to_string());
        }
        args.extend([
            "-filter_complex".to_string(),
            graph.filter_complex(),
            "-map".to_string(),
            "[vout]".to_string(),
        ]);
        args.extend(self.encode_args());
        args.push(output.display().to_string());
        args
    }

    pub fn concat_args(&self, list_path: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list_path.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.display().to_string(),
        ]
    }

    pub fn mux_args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-i".to_string(),
            audio.display().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            self.audio.codec.clone(),
            "-b:a".to_string(),
            self.audio.bitrate.clone(),
            "-shortest".to_string(),
            output.display().to_string(),
        ]
    }

    /// Run ffmpeg, returning stderr on failure
    fn run_ffmpeg(&self, args: &[String]) -> std::result::Result<(), String> {
        debug!("{} {}", self.ffmpeg_bin, args.join(" "));

        let output = Command::new(&self.ffmpeg_bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| format!("FFmpeg execution failed: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("FFmpeg failed: {}", last_lines(&stderr, 5)));
        }

        Ok(())
    }
}

impl MediaEncoder for FfmpegEncoder {
    fn check_available(&self) -> Result<()> {
        for bin in [&self.ffmpeg_bin, &self.ffprobe_bin] {
            if !Self::binary_available(bin) {
                return Err(EncodingError::EncoderUnavailable {
                    reason: format!("'{}' did not run", bin),
                }
                .into());
            }
        }
        Ok(())
    }

    fn render_still(&self, image: &Path, duration: f64, output: &Path) -> Result<()> {
        self.run_ffmpeg(&self.still_args(image, duration, output))
            .map_err(|reason| {
                EncodingError::ClipFailed {
                    scene: scene_number(output),
                    reason,
                }
                .into()
            })
    }

    fn crossfade(
        &self,
        clips: &[PathBuf],
        graph: &CrossfadeGraph,
        output: &Path,
    ) -> std::result::Result<(), TransitionError> {
        self.run_ffmpeg(&self.crossfade_args(clips, graph, output))
            .map_err(|reason| TransitionError::RenderFailed { reason })
    }

    fn concat(&self, clips: &[PathBuf], list_path: &Path, output: &Path) -> Result<()> {
        write_concat_list(clips, list_path)?;
        self.run_ffmpeg(&self.concat_args(list_path, output))
            .map_err(|reason| EncodingError::ConcatFailed { reason }.into())
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.run_ffmpeg(&self.mux_args(video, audio, output))
            .map_err(|reason| EncodingError::MuxFailed { reason }.into())
    }

    fn probe_duration(&self, media: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media)
            .output()?;

        if !output.status.success() {
            return Err(ReelError::generic(format!(
                "ffprobe failed on {}: {}",
                media.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ReelError::generic(format!("ffprobe returned no duration for {}", media.display()))
        })
    }
}

/// Write an ffmpeg concat demuxer list with absolute, quoted paths
pub fn write_concat_list(clips: &[PathBuf], list_path: &Path) -> Result<()> {
    let mut file = File::create(list_path)?;
    for clip in clips {
        let absolute = clip.canonicalize().unwrap_or_else(|_| clip.clone());
        let escaped = absolute.display().to_string().replace('\'', "'\\''");
        writeln!(file, "file '{}'", escaped)?;
    }
    Ok(())
}

/// Parse `ffprobe -show_entries format=duration` output
pub fn parse_probe_output(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|d| d.is_finite())
}

/// `scene_007.mp4` -> 7
fn scene_number(path: &Path) -> usize {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('_').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join(" | ")
}
