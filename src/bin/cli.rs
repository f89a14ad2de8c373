//! tourmap CLI
//!
//! Renders the itinerary page and exercises the map, tile, clock and
//! engagement components from the terminal.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tourmap::{
    error::{AppError, Result},
    models::{Config, PlaceKind, TileRange, TripData},
    pipeline,
    services::{
        DualClock, EngagementCounter, HeadlessMap, MapContext,
        tiles::{
            DownloadOptions, HttpTileFetcher, LocalTileFetcher, TileDownloader, TileLoader,
            TileStrategy,
        },
        view::HostPage,
    },
    storage::LocalStorage,
    utils::resolve_path,
};

/// tourmap - Travel itinerary renderer
#[derive(Parser, Debug)]
#[command(
    name = "tourmap",
    version,
    about = "Single-trip itinerary renderer with a resilient tile map"
)]
struct Cli {
    /// Path to storage directory containing config.toml, counters and tiles
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Trip data file (default: [paths].data_file or the built-in data set)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the host page, map scene and data copy
    Render {
        /// Host page template (default: {storage_dir}/host.html or the built-in page)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Output directory (default: {storage_dir}/dist)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Check the trip data set
    Validate,

    /// Print the itinerary
    Show {
        /// Only this day, with its detailed schedule
        #[arg(long)]
        day: Option<u32>,
    },

    /// Fit the map to one day's route and print the viewport
    Route {
        #[arg(long)]
        day: u32,
    },

    /// Fly to a location such as `hotel-hotel-1` and print the viewport
    Focus { value: String },

    /// Basemap tile operations
    Tiles {
        #[command(subcommand)]
        command: TilesCommand,
    },

    /// Print both clocks every second
    Clock {
        /// Stop after this many readings
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Count a page view
    Visit,

    /// Count a like
    Like,

    /// Show counters without counting a view
    Stats,

    /// Write the trip data set as JSON
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum TilesCommand {
    /// Load the initial viewport with the configured strategy
    Probe,

    /// Fill the offline tile bundle
    Download {
        /// Only fetch tiles absent from the bundle
        #[arg(long)]
        missing_only: bool,

        /// Restrict to one zoom level
        #[arg(long)]
        zoom: Option<u8>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Per-zoom coverage of the offline bundle
    Status {
        #[arg(long)]
        zoom: Option<u8>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_trip(cli: &Cli, config: &Config) -> Result<TripData> {
    let path = cli.data.clone().or_else(|| {
        config
            .paths
            .data_file
            .as_deref()
            .map(|p| resolve_path(&cli.storage_dir, p))
    });
    TripData::load_or_builtin(path.as_deref())
}

fn load_host(path: &Path) -> Result<HostPage> {
    if path.exists() {
        log::info!("Using host page {}", path.display());
        Ok(HostPage::new(std::fs::read_to_string(path)?))
    } else {
        log::info!("No host page at {}, using the built-in page", path.display());
        Ok(HostPage::builtin())
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_itinerary(trip: &TripData, day: Option<u32>) -> Result<()> {
    println!("{} {} ({})", trip.info.tour_no, trip.info.destination, trip.info.dates);
    let days: Vec<_> = match day {
        Some(n) => vec![
            trip.day(n)
                .ok_or_else(|| AppError::validation(format!("no itinerary for day {n}")))?,
        ],
        None => trip.itinerary.iter().collect(),
    };

    for itinerary in days {
        println!();
        println!("第{}天 {} {}", itinerary.day, itinerary.date, itinerary.title);
        let names: Vec<&str> = trip
            .resolve_attractions(itinerary)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        if names.is_empty() {
            println!("  （行程结束）");
        } else {
            println!("  {}", names.join("、"));
        }
        if day.is_some() {
            for activity in &itinerary.activities {
                println!("  {}  {} @{}", activity.time, activity.activity, activity.location);
            }
        }
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load configuration
    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    config.validate()?;

    log::debug!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = LocalStorage::with_counters_file(&cli.storage_dir, &config.paths.counters_file);
    let tiles_dir = resolve_path(&cli.storage_dir, &config.paths.tiles_dir);

    match &cli.command {
        Command::Render { template, out } => {
            let trip = load_trip(&cli, &config)?;
            let template = template
                .clone()
                .unwrap_or_else(|| resolve_path(&cli.storage_dir, &config.paths.template));
            let out = out
                .clone()
                .unwrap_or_else(|| resolve_path(&cli.storage_dir, &config.paths.output_dir));

            let counter = EngagementCounter::load(Arc::new(storage), config.engagement.clone()).await;
            let summary = pipeline::run_render(
                &trip,
                &config,
                load_host(&template)?,
                &LocalStorage::new(&out),
                Some(counter.counts()),
            )
            .await?;

            log::info!(
                "Rendered {}/{} panels into {} (data {})",
                summary.injected,
                summary.fragments,
                summary.output_dir.display(),
                &summary.fingerprint[..12.min(summary.fingerprint.len())]
            );
            if !summary.map_ready {
                log::warn!("The map could not be initialised; the page shows an error in its place");
            }
        }

        Command::Validate => {
            log::info!("Validating trip data...");
            let trip = load_trip(&cli, &config)?;
            let report = pipeline::validate_trip(&trip, &config.region);

            for item in &report.passed {
                log::info!("✓ {}", item);
            }
            for item in &report.warnings {
                log::warn!("⚠ {}", item);
            }
            for item in &report.failed {
                log::error!("✗ {}", item);
            }
            log::info!("{}", report);

            if !report.is_ok() {
                return Err(AppError::validation(format!(
                    "{} check(s) failed",
                    report.failed.len()
                )));
            }
        }

        Command::Show { day } => {
            let trip = load_trip(&cli, &config)?;
            print_itinerary(&trip, *day)?;
        }

        Command::Route { day } => {
            let trip = load_trip(&cli, &config)?;
            let surface = HeadlessMap::new(&config.map);
            let mut map = MapContext::new(&trip, config.map.clone(), surface).await?;
            if map.show_route(*day).await? {
                println!("{}", map.viewport());
            } else {
                log::warn!("Day {} has no attractions to show", day);
            }
        }

        Command::Focus { value } => {
            let trip = load_trip(&cli, &config)?;
            let surface = HeadlessMap::new(&config.map);
            let mut map = MapContext::new(&trip, config.map.clone(), surface).await?;
            if map.focus_location(value).await? {
                println!("{}", map.viewport());
                if let Some(marker) = map.marker(value) {
                    println!("{}", serde_json::to_string_pretty(&marker.popup)?);
                }
            } else {
                let kinds = [PlaceKind::Airport, PlaceKind::Hotel, PlaceKind::Attraction];
                log::warn!(
                    "Unknown location '{}' (expected <{}>-<id>)",
                    value,
                    kinds.map(|k| k.as_str()).join("|")
                );
            }
        }

        Command::Tiles { command } => match command {
            TilesCommand::Probe => {
                let strategy = TileStrategy::from_config(&config.tiles)?;
                let map = &config.map;
                let zoom = map.zoom.round().clamp(0.0, 19.0) as u8;
                let tiles: Vec<_> = TileRange::viewport(map.center, zoom, map.width, map.height)
                    .iter()
                    .collect();
                log::info!(
                    "Probing {} tiles at zoom {} with the {:?} strategy",
                    tiles.len(),
                    zoom,
                    strategy.kind()
                );

                let loader = TileLoader::new(
                    Arc::new(LocalTileFetcher::new(&cli.storage_dir)),
                    Arc::new(HttpTileFetcher::from_config(&config.download)?),
                );
                let report = loader.run(strategy, &tiles).await;
                println!("{}", serde_json::to_string_pretty(&report)?);
                if let Some(message) = &report.error_panel {
                    return Err(AppError::tile("basemap", message));
                }
            }

            TilesCommand::Download {
                missing_only,
                zoom,
                yes,
            } => {
                let fetcher = Arc::new(HttpTileFetcher::from_config(&config.download)?);
                let downloader = TileDownloader::new(
                    config.download.clone(),
                    LocalStorage::new(&tiles_dir),
                    fetcher,
                );

                let plan = downloader.plan(*zoom)?;
                for range in &plan {
                    log::info!("Zoom {}: {} tiles", range.z, range.count());
                }
                let total: usize = plan.iter().map(|r| r.count()).sum();
                if !yes && !confirm(&format!("Download up to {total} tiles into {}?", tiles_dir.display()))? {
                    log::info!("Cancelled");
                    return Ok(());
                }

                let report = downloader
                    .download(DownloadOptions {
                        missing_only: *missing_only,
                        zoom: *zoom,
                    })
                    .await?;
                for stats in &report.zooms {
                    log::info!(
                        "Zoom {}: {} downloaded, {} existing, {} failed",
                        stats.zoom,
                        stats.downloaded,
                        stats.existing,
                        stats.failed
                    );
                }
                log::info!(
                    "Done: {} downloaded, {} existing, {} failed of {}",
                    report.downloaded(),
                    report.existing(),
                    report.failed(),
                    report.total()
                );
            }

            TilesCommand::Status { zoom } => {
                let downloader = TileDownloader::new(
                    config.download.clone(),
                    LocalStorage::new(&tiles_dir),
                    Arc::new(LocalTileFetcher::new(&tiles_dir)),
                );
                for coverage in downloader.coverage(*zoom).await? {
                    println!(
                        "z{:<2} {:>5}/{:<5} {:>3}% {} x {}-{} y {}-{}",
                        coverage.zoom,
                        coverage.present,
                        coverage.total,
                        coverage.percent(),
                        if coverage.is_complete() { "✓" } else { "⚠" },
                        coverage.x_min,
                        coverage.x_max,
                        coverage.y_min,
                        coverage.y_max
                    );
                }
            }
        },

        Command::Clock { ticks } => {
            let clock = DualClock::from_config(&config.clock)?;
            tokio::select! {
                _ = clock.run(*ticks, |reading| println!("{reading}")) => {}
                _ = tokio::signal::ctrl_c() => log::info!("Clock stopped"),
            }
        }

        Command::Visit => {
            let counter = EngagementCounter::load(Arc::new(storage), config.engagement.clone()).await;
            let counts = counter.counts();
            log::info!("👁️ {} views, ❤️ {} likes", counts.views, counts.likes);
        }

        Command::Like => {
            let mut counter =
                EngagementCounter::open(Arc::new(storage), config.engagement.clone()).await;
            let burst = counter.like().await;
            burst.play(|p| print!("{}", p.glyph)).await;
            println!();
            log::info!("❤️ {} likes", counter.counts().likes);
        }

        Command::Stats => {
            use tourmap::storage::CounterStore;
            let views = storage.get(&config.engagement.views_key).await?;
            let likes = storage.get(&config.engagement.likes_key).await?;
            println!(
                "{}",
                serde_json::json!({
                    "views": views,
                    "likes": likes,
                    "file": storage.path(&config.paths.counters_file),
                })
            );
        }

        Command::Export { out } => {
            let trip = load_trip(&cli, &config)?;
            trip.save(out)?;
            log::info!("Exported trip data to {}", out.display());
        }
    }

    Ok(())
}
