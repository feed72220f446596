use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, SynthesisError};

/// Basic facts about a narration audio file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    /// Seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Reads narration audio headers and measures durations
pub struct AudioLoader;

impl AudioLoader {
    /// Measure an audio file without keeping its samples
    pub async fn probe<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::probe_blocking(&path))
            .await
            .map_err(|e| crate::error::ReelError::generic(format!("Audio probe task failed: {}", e)))?
    }

    /// Duration in seconds
    pub async fn duration<P: AsRef<Path>>(path: P) -> Result<f64> {
        Ok(Self::probe(path).await?.duration)
    }

    pub fn probe_blocking(path: &Path) -> Result<AudioInfo> {
        let extension = Self::detect_format(path).unwrap_or_default();

        match extension.as_str() {
            "wav" => Self::probe_wav(path),
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Self::probe_with_symphonia(path),
            _ => Err(SynthesisError::UnsupportedFormat { format: extension }.into()),
        }
    }

    /// WAV headers through hound
    fn probe_wav(path: &Path) -> Result<AudioInfo> {
        let reader = hound::WavReader::open(path).map_err(|_| invalid(path))?;
        let spec = reader.spec();

        // duration() counts frames, not interleaved samples
        let frames = reader.duration();
        Ok(AudioInfo {
            duration: frames as f64 / spec.sample_rate as f64,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }

    /// Compressed formats through Symphonia
    fn probe_with_symphonia(path: &Path) -> Result<AudioInfo> {
        let file = File::open(path).map_err(|_| invalid(path))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|_| invalid(path))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| invalid(path))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params.sample_rate.ok_or_else(|| invalid(path))?;
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(1);

        // Container knows the length: no need to decode
        if let Some(frames) = codec_params.n_frames {
            return Ok(AudioInfo {
                duration: frames as f64 / sample_rate as f64,
                sample_rate,
                channels,
            });
        }

        let dec_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &dec_opts)
            .map_err(|_| invalid(path))?;

        let mut frames: u64 = 0;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => frames += decoded.frames() as u64,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(_) => break,
            }
        }

        Ok(AudioInfo {
            duration: frames as f64 / sample_rate as f64,
            sample_rate,
            channels,
        })
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

fn invalid(path: &Path) -> crate::error::ReelError {
    SynthesisError::InvalidAudio {
        path: path.display().to_string(),
    }
    .into()
}
