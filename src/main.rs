mod demo;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pagerender::panic_handler::initialize_panic_handler;
use pagerender::render::{
    DocumentHandle, DocumentView, ImageTarget, RectI, RenderCache, RenderDelay, Rotation, SizeI,
};
use pagerender::settings::{RenderSettings, config_path, load_settings_from};

use crate::demo::DemoView;

#[derive(Parser, Debug)]
#[command(
    name = "pagerender",
    version,
    about = "Paint a procedural document through the tiled render cache"
)]
struct Args {
    /// Number of pages in the document
    #[arg(long, default_value_t = 5)]
    pages: usize,

    /// Zoom factor (1.0 = 100%)
    #[arg(short, long, default_value_t = 1.0)]
    zoom: f32,

    /// Page scrolled to the top of the viewport
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    /// Rotation in degrees
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    rotation: i32,

    #[arg(long, default_value_t = 1024)]
    width: i32,

    #[arg(long, default_value_t = 768)]
    height: i32,

    /// Give up after painting this many frames
    #[arg(long, default_value_t = 20)]
    frames: usize,

    /// Write the last painted frame to this PNG file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "pagerender.log")]
    log_file: PathBuf,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

fn load_settings(args: &Args) -> Result<RenderSettings> {
    let path = args.config.clone().or_else(config_path);
    match path {
        Some(path) => load_settings_from(&path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(RenderSettings::default()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        args.log_level,
        Config::default(),
        File::create(&args.log_file)
            .with_context(|| format!("creating log file {}", args.log_file.display()))?,
    )?;
    initialize_panic_handler();
    info!("Starting pagerender");

    let res = run(&args);
    if let Err(err) = &res {
        error!("Application error: {err:?}");
    }
    info!("Shutting down pagerender");
    res
}

fn run(args: &Args) -> Result<()> {
    let settings = load_settings(args)?;
    let cache = RenderCache::new(&settings)?;

    let viewport = SizeI::new(args.width.max(1), args.height.max(1));
    let view = Arc::new(DemoView::new(
        args.pages,
        args.zoom,
        Rotation::normalize(args.rotation),
        viewport,
        args.page,
    ));
    let doc = DocumentHandle::new(view.clone());
    let bounds = RectI::from_size(viewport);

    for page in view.visible_pages() {
        cache.request_rendering(&doc, page);
    }

    let mut frame = None;
    for n in 1..=args.frames.max(1) {
        let mut target = ImageTarget::new(viewport.dx as u32, viewport.dy as u32, [0x80; 3]);
        let mut worst = RenderDelay::Ready;
        let mut stale = false;
        for page in view.visible_pages() {
            let Some(on_screen) = view.page_on_screen(page) else {
                continue;
            };
            let outcome = cache.paint(&mut target, bounds, &doc, page, on_screen);
            debug!("Frame {n}, page {page}: {outcome:?}");
            worst = worst.max(outcome.delay);
            stale |= outcome.out_of_date_cue;
        }
        frame = Some(target);

        if !matches!(worst, RenderDelay::Pending(_) | RenderDelay::Undefined) {
            info!("Frame {n} settled: {worst:?}");
            println!("frame {n}: {worst:?}");
            break;
        }
        println!("frame {n}: {worst:?}{}", if stale { " (stale)" } else { "" });

        // block until the worker finished something worth repainting
        if let Ok(event) = cache.events().recv_timeout(Duration::from_millis(500)) {
            debug!("{event:?}");
        }
        for event in cache.poll_events() {
            debug!("{event:?}");
        }
    }

    if let (Some(path), Some(frame)) = (&args.output, frame) {
        frame
            .into_image()
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Saved to: {}", path.display());
    }
    Ok(())
}
