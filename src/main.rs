//! Headless replay tool: streams a recorded chunk log through a viewer
//! session on the recording device and prints what loaded.
//!
//! Usage: cargo run --release -- --manifest <FILE> --chunks <FILE> [OPTIONS]
//!
//! Options:
//!   --manifest, -m <FILE>   Model manifest JSON
//!   --chunks, -c <FILE>     Decoded chunk log (JSON array)
//!   --materials <FILE>      Material library JSON (default: all white)
//!   --config <FILE>         Viewer config JSON (default: built-in)
//!   --textures <DIR>        Resolve texture URLs below DIR (default: no textures)
//!   --width <PX>            Client width (default: 1280)
//!   --height <PX>           Client height (default: 720)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use meshstream::core::config::ViewerConfig;
use meshstream::core::logging;
use meshstream::core::types::Result;
use meshstream::render::program::ShaderSources;
use meshstream::render::recording::RecordingDevice;
use meshstream::render::texture::{FileTextureFetcher, NoTextures, TextureFetcher};
use meshstream::session::{Session, ViewerEvent};
use meshstream::streaming::chunk::DecodedChunk;
use meshstream::streaming::manifest::Manifest;
use meshstream::streaming::material::MaterialTable;

/// How long to keep polling for outstanding textures after the last chunk
const TEXTURE_GRACE: Duration = Duration::from_secs(5);

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let config = match parse_path_arg(&args, &["--config"]) {
        Some(path) => match ViewerConfig::load_sync(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => ViewerConfig::default(),
    };
    logging::init_with_filter(&config.log_filter);

    let (Some(manifest), Some(chunks)) = (
        parse_path_arg(&args, &["--manifest", "-m"]),
        parse_path_arg(&args, &["--chunks", "-c"]),
    ) else {
        eprintln!("Usage: meshstream --manifest <FILE> --chunks <FILE> [--materials <FILE>] [--config <FILE>] [--textures <DIR>] [--width <PX>] [--height <PX>]");
        std::process::exit(2);
    };

    if let Err(e) = replay(&args, &config, manifest, chunks) {
        log::error!("Replay failed: {}", e);
        std::process::exit(1);
    }
}

fn replay(args: &[String], config: &ViewerConfig, manifest: PathBuf, chunks: PathBuf) -> Result<()> {
    let start = Instant::now();
    let manifest = Manifest::load_sync(&manifest)?;
    let chunks = DecodedChunk::load_log(&chunks)?;
    let materials = match parse_path_arg(args, &["--materials"]) {
        Some(path) => MaterialTable::load_sync(&path)?,
        None => MaterialTable::new(),
    };
    let fetcher: Box<dyn TextureFetcher> = match parse_path_arg(args, &["--textures"]) {
        Some(root) => Box::new(FileTextureFetcher::new(root)?),
        None => Box::new(NoTextures),
    };
    let width = parse_f32_arg(args, "--width").unwrap_or(1280.0);
    let height = parse_f32_arg(args, "--height").unwrap_or(720.0);

    log::info!(
        "Replaying {} chunks for {} meshes at {}x{}",
        chunks.len(),
        manifest.entry_count(),
        width,
        height
    );

    let mut session = Session::new(
        RecordingDevice::new(),
        &manifest,
        Arc::new(materials),
        fetcher,
        config,
        &ShaderSources::default(),
    )?;

    let events = std::iter::once(ViewerEvent::Resize { width, height })
        .chain(chunks.into_iter().map(ViewerEvent::Chunk))
        .chain(std::iter::once(ViewerEvent::PollTextures));
    session.run(events)?;

    let deadline = Instant::now() + TEXTURE_GRACE;
    while session.renderer().pending_textures() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
        session.run([ViewerEvent::PollTextures])?;
    }
    if session.renderer().pending_textures() > 0 {
        log::warn!("{} textures still pending", session.renderer().pending_textures());
    }

    let device = session.renderer().device();
    print!("{}", session.report());
    println!(
        "{} frames, {} draw calls in the last frame, {} live buffers, {} live textures",
        session.renderer().frames(),
        last_frame_draws(device),
        device.live_buffers(),
        device.live_textures()
    );
    log::info!("Replay finished in {:.2?}", start.elapsed());
    Ok(())
}

/// Draw calls issued since the last clear
fn last_frame_draws(device: &RecordingDevice) -> usize {
    use meshstream::render::recording::Command;
    device
        .commands()
        .iter()
        .rev()
        .take_while(|c| !matches!(c, Command::Clear))
        .filter(|c| matches!(c, Command::DrawIndexed { .. }))
        .count()
}

/// Parse a path argument given under any of `names`
fn parse_path_arg(args: &[String], names: &[&str]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

/// Parse a numeric argument
fn parse_f32_arg(args: &[String], name: &str) -> Option<f32> {
    for i in 0..args.len() {
        if args[i] == name {
            if let Some(value) = args.get(i + 1) {
                return value.parse().ok();
            }
        }
    }
    None
}
