// Quick end-to-end check of the render path: placeholder images, mock
// narration and ffmpeg, without jobs or data sources.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use reel_compositor::{
    composition::{CompositionEngine, FfmpegEncoder, TransitionSpec, TransitionStyle},
    config::Config,
    narration::{MockSynthesizer, NarrationSynthesizer},
    scene::SceneAllocator,
    script::{sections_from_text, ScriptGenerator, TemplateScriptWriter},
    sources::{PlaceholderRenderer, PlaceholderSpec, PropertyRecord},
};

#[derive(Parser)]
#[command(name = "preview", about = "Render a sample reel from placeholder images")]
struct Args {
    /// Number of placeholder images
    #[arg(short, long, default_value_t = 4)]
    images: usize,

    /// Transition style (fade, slide, zoom, dissolve, wipe, none)
    #[arg(short, long, default_value = "fade")]
    transition: TransitionStyle,

    /// Narrate this script file instead of the sample property script
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Working and output directory
    #[arg(short, long, default_value = "preview_output")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::default();
    println!("🎬 Reel-Compositor preview");

    // 1. Script
    println!("\n1. Writing script...");
    let sections = match &args.script {
        Some(path) => sections_from_text(&tokio::fs::read_to_string(path).await?),
        None => TemplateScriptWriter::new(config.sources.channel_name.clone())
            .generate(&PropertyRecord::template())?
            .sections,
    };
    let text = sections.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("\n\n");
    println!("   {} sections, {} characters", sections.len(), text.chars().count());

    // 2. Images
    println!("\n2. Rendering {} placeholder images...", args.images);
    let renderer = PlaceholderRenderer::new(config.video.width, config.video.height);
    let specs = (1..=args.images.max(1))
        .map(|i| {
            PlaceholderSpec::new(
                args.output.join(format!("image_{:02}.png", i)),
                format!("Preview Image {}", i),
            )
        })
        .collect();
    let images = renderer.render_all(specs).await?;

    // 3. Narration
    println!("\n3. Synthesizing mock narration...");
    let narration = config.narration.clone();
    let synth = MockSynthesizer::new(narration.chars_per_minute, narration.min_duration, narration.max_duration);
    let track = synth
        .synthesize(&text, &narration.voice, &args.output.join("narration.wav"))
        .await?;
    println!("   Narration: {:.1}s", track.duration);

    // 4. Scenes
    println!("\n4. Allocating scenes...");
    let allocator = SceneAllocator::new(config.composition.sync_tolerance);
    let scenes = allocator.allocate(&sections, &images, track.duration)?;
    for scene in &scenes {
        println!("   [{}] {:<18} {:>6.2}s  {}", scene.index, scene.section, scene.duration,
                 scene.image_path.display());
    }

    // 5. Compose
    println!("\n5. Composing with '{}' transitions...", args.transition);
    let engine = CompositionEngine::new(Arc::new(FfmpegEncoder::from_config(&config)), &args.output);
    if let Err(e) = engine.check_encoder().await {
        println!("   ❌ {}", e.user_message());
        return Err(e.into());
    }

    let transition = TransitionSpec::new(args.transition, config.composition.transition_length);
    let artifact = engine
        .compose(&scenes, &track, transition, &args.output.join("render"), "preview.mp4")
        .await?;

    println!("\n🎉 Preview ready: {}", artifact.display());
    Ok(())
}
