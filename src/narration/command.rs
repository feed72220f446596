use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::audio::AudioLoader;
use crate::config::VoiceConfig;
use crate::error::{InputError, Result, SynthesisError};
use crate::narration::NarrationSynthesizer;
use crate::scene::NarrationTrack;

/// Runs an external TTS program and measures what it wrote
///
/// The script is handed over in a text file next to the output; argument
/// placeholders `{text_file}`, `{output}`, `{voice}`, `{language}`, `{speed}`
/// and `{pitch}` are substituted per call.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    extension: String,
}

impl CommandSynthesizer {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>, extension: S) -> Self {
        Self {
            program: program.into(),
            args,
            extension: extension.into(),
        }
    }

    /// Arguments with every placeholder filled in
    pub fn render_args(&self, text_file: &Path, output: &Path, voice: &VoiceConfig) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{text_file}", &text_file.display().to_string())
                    .replace("{output}", &output.display().to_string())
                    .replace("{voice}", &voice.name)
                    .replace("{language}", &voice.language)
                    .replace("{speed}", &voice.speed.to_string())
                    .replace("{pitch}", &voice.pitch.to_string())
            })
            .collect()
    }
}

#[async_trait]
impl NarrationSynthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        "command"
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    async fn synthesize(&self, text: &str, voice: &VoiceConfig, output: &Path) -> Result<NarrationTrack> {
        if text.trim().is_empty() {
            return Err(InputError::EmptyScript.into());
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let text_file = output.with_extension("txt");
        tokio::fs::write(&text_file, text).await?;

        let args = self.render_args(&text_file, output, voice);
        debug!("{} {}", self.program, args.join(" "));

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SynthesisError::BackendFailed {
                reason: format!("could not start '{}': {}", self.program, e),
            })?;

        if !result.status.success() {
            return Err(SynthesisError::BackendFailed {
                reason: format!(
                    "'{}' exited with {}: {}",
                    self.program,
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            }
            .into());
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(SynthesisError::BackendFailed {
                reason: format!("'{}' wrote no audio to {}", self.program, output.display()),
            }
            .into());
        }

        let duration = AudioLoader::duration(output).await?;
        info!("Synthesized {:.1}s of narration with {}", duration, self.program);
        Ok(NarrationTrack::new(output, duration))
    }
}
