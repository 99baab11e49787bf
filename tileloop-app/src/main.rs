use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tileloop::{
    ApiKeyCredentials, BaseLayer, LatLng, LayerCatalog, LayerGroup, LoopConfig, LoopContext,
    LoopOverlay, MapRect, OverlayEvent,
};

/// Renders a looping weather layer over a lat/lng box into PNG frames
#[derive(Debug, Parser)]
#[command(name = "tileloop-app", version)]
struct Args {
    /// Base layer: radar, satellite or a product id
    #[arg(long, default_value = "radar")]
    layer: String,

    /// Thematic group drawn over the base layer (needs --catalog)
    #[arg(long)]
    group: Option<String>,

    /// Layer catalog JSON
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Pipeline configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 37.0)]
    north: f64,
    #[arg(long, default_value_t = 33.0)]
    south: f64,
    #[arg(long, default_value_t = -95.0)]
    east: f64,
    #[arg(long, default_value_t = -100.0)]
    west: f64,

    #[arg(long, default_value_t = 7)]
    zoom: u8,

    /// Number of displayed frames to write before stopping
    #[arg(long, default_value_t = 12)]
    frames: usize,

    #[arg(long, default_value = "frames")]
    out: PathBuf,
}

fn base_layer(name: &str) -> BaseLayer {
    match name {
        "radar" => BaseLayer::Radar,
        "satellite" => BaseLayer::Satellite,
        other => BaseLayer::parse(other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LoopConfig::from_json_file(path)?,
        None => LoopConfig::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => LayerCatalog::from_json_file(path)?,
        None => LayerCatalog::default(),
    };

    let ctx = LoopContext::builder()
        .config(config)
        .credentials(ApiKeyCredentials::from_env())
        .build()
        .context("set TILELOOP_APP_ID and TILELOOP_APP_KEY")?;

    let base = base_layer(&args.layer);
    let layer = match &args.group {
        Some(group) => catalog.for_group(LayerGroup::parse(group), base),
        None => catalog.for_base_layer(base),
    };
    log::info!("looping {} over {}", layer.name, base);

    let overlay = LoopOverlay::new(ctx, layer);
    overlay.query_times().await.context("querying valid times")?;
    let axis = overlay.time_axis();
    if axis.is_empty() {
        anyhow::bail!("no valid times for {}", overlay.layer().name);
    }
    log::info!("{} frames, latest {:?}", axis.len(), overlay.latest_date());

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let viewport = MapRect::from_coordinates(
        LatLng::new(args.north, args.east),
        LatLng::new(args.south, args.west),
    );
    let progress = overlay.begin_loop(viewport, args.zoom);
    let mut fraction = progress.subscribe();
    while *fraction.borrow() < 1.0 {
        fraction.changed().await?;
        log::info!("loading {:.0}%", *fraction.borrow() * 100.0);
    }

    let mut written = 0;
    while written < args.frames {
        for event in overlay.try_recv_events() {
            match event {
                OverlayEvent::FrameChanged {
                    index,
                    timestamp,
                    image: Some(image),
                    ..
                } => {
                    let path = args.out.join(format!("frame_{:03}_{}.png", written, index));
                    image
                        .save(&path)
                        .with_context(|| format!("writing {}", path.display()))?;
                    log::info!("frame {} ({}) -> {}", index, timestamp, path.display());
                    written += 1;
                }
                OverlayEvent::FramesReady { frame_count } => {
                    log::info!("{} frames ready", frame_count);
                }
                _ => {}
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    overlay.stop_animating(true);
    overlay.detach();
    Ok(())
}
