mod arc;
mod colors;
mod config;
mod controller;
mod geo;
mod help;
mod path;
mod projection;
mod render;
mod scene;
mod settings;
mod terminal;
mod topology;
mod viz;
mod world;

use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use config::{parse_rotation, GlobeConfig, SnapshotConfig};
use env_logger::{Env, Target};
use log::info;
use scene::{compose, FrameState, ViewState};
use serde::Serialize;
use settings::Settings;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use topology::source::{HttpSource, TopologySource, TopologyState};
use topology::TopologyStats;
use world::{placeholder_world, world_or_placeholder, DEFAULT_WORLD_URL};

#[derive(Parser)]
#[command(name = "netglobe")]
#[command(version = "0.1.0")]
#[command(about = "Network topology on a globe that unrolls into a flat map", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive globe with live topology
    Run {
        /// Topology service base URL (GET <endpoint>/api/topology)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// World TopoJSON URL or file path
        #[arg(short, long)]
        world: Option<String>,

        /// Demo topology and placeholder world, no network
        #[arg(long)]
        offline: bool,

        /// Build topology from capture lines piped on stdin
        #[arg(long, conflicts_with = "endpoint")]
        stdin: bool,

        /// Animation speed (seconds per frame)
        #[arg(short, long)]
        time: Option<f32>,
    },

    /// Render a single frame and exit
    Snapshot {
        /// Globe (0) to map (1) blend
        #[arg(short, long, default_value = "0.0")]
        progress: f64,

        /// Rotation angles in degrees: lambda,phi
        #[arg(short, long, value_parser = parse_rotation, allow_hyphen_values = true)]
        rotate: Option<projection::Rotation>,

        /// Packet phase (0-100)
        #[arg(long, default_value = "0.0")]
        phase: f64,

        /// Width in terminal columns
        #[arg(long, default_value = "80")]
        cols: u16,

        /// Height in terminal rows
        #[arg(long, default_value = "24")]
        rows: u16,

        /// Write an SVG document here instead of printing braille
        #[arg(long)]
        svg: Option<PathBuf>,

        /// Demo topology and placeholder world, no network
        #[arg(long)]
        offline: bool,
    },

    /// Fetch the topology once and print a JSON summary
    Stats {
        /// Topology service base URL
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Skip the fetch and summarize the demo topology
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Serialize)]
struct Summary {
    connectivity: &'static str,
    #[serde(flatten)]
    stats: TopologyStats,
}

fn init_logging(to_file: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if to_file {
        // the terminal belongs to the globe, so interactive logs go to a file
        let dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("netglobe");
        let file = fs::create_dir_all(&dir).and_then(|_| {
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("netglobe.log"))
        });
        match file {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

fn fetch_once(endpoint: &str, timeout: Duration) -> TopologyState {
    let source = HttpSource::new(endpoint, timeout);
    let mut state = TopologyState::demo();
    state.apply(source.fetch());
    state
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(matches!(cli.command, Commands::Run { .. }));
    let settings = Settings::load();

    match cli.command {
        Commands::Run {
            endpoint,
            world,
            offline,
            stdin,
            time,
        } => {
            let config = GlobeConfig::merge(&settings, endpoint, world, offline, stdin, time);
            info!("starting interactive globe: {:?}", config.source);
            let mut term = terminal::Terminal::new(true)?;
            viz::globe::run(&mut term, &config)?;
        }
        Commands::Snapshot {
            progress,
            rotate,
            phase,
            cols,
            rows,
            svg,
            offline,
        } => {
            let config = SnapshotConfig {
                progress: progress.clamp(0.0, 1.0),
                rotation: rotate.unwrap_or_default(),
                phase: phase.clamp(0.0, 100.0),
                cols: cols.max(10),
                rows: rows.max(5),
                svg,
                offline,
            };
            let timeout = Duration::from_millis(settings.source.timeout_ms);
            let (world, topology) = if config.offline {
                (placeholder_world(), TopologyState::demo())
            } else {
                let url = settings.world.url.as_deref().unwrap_or(DEFAULT_WORLD_URL);
                (world_or_placeholder(url, timeout), fetch_once(&settings.source.endpoint, timeout))
            };
            let view = ViewState {
                progress: config.progress,
                rotation: config.rotation,
                packet_phase: config.phase,
                ..ViewState::default()
            };

            match &config.svg {
                Some(path) => {
                    let frame = FrameState {
                        world: &world,
                        topology: topology.data(),
                        view,
                        hovered: None,
                    };
                    let document = render::svg::to_svg(&compose(&frame));
                    fs::write(path, document).wrap_err_with(|| format!("writing {}", path.display()))?;
                    info!("wrote {}", path.display());
                }
                None => {
                    let term = viz::globe::render_snapshot(&world, topology.data(), view, config.cols, config.rows);
                    term.print_to_stdout()?;
                }
            }
        }
        Commands::Stats { endpoint, offline } => {
            let state = if offline {
                TopologyState::demo()
            } else {
                let endpoint = endpoint.unwrap_or_else(|| settings.source.endpoint.clone());
                fetch_once(&endpoint, Duration::from_millis(settings.source.timeout_ms))
            };
            let summary = Summary {
                connectivity: match state.connectivity() {
                    topology::source::Connectivity::Live => "live",
                    _ => "demo",
                },
                stats: state.data().stats(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
