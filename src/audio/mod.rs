//! # Audio Module
//!
//! Measures narration audio. WAV files are read with `hound`; compressed
//! formats go through Symphonia's probe and, when the container does not
//! state its length, a decode pass that counts frames.
//!
//! ```rust,no_run
//! use reel_compositor::audio::AudioLoader;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let seconds = AudioLoader::duration("narration.mp3").await?;
//! println!("Narration runs {:.1}s", seconds);
//! # Ok(())
//! # }
//! ```

pub mod loader;

pub use loader::{AudioInfo, AudioLoader};
