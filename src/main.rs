use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use undersea_trace::cables::{CableCatalog, CableMatcher, DEFAULT_TOLERANCE_KM};
use undersea_trace::config::{validate_hops, Config, LogLevel, DEFAULT_DATASET_PATH, DEFAULT_HOPS, DEFAULT_MAX_CONCURRENCY};
use undersea_trace::geo::GeoPoint;
use undersea_trace::pipeline::Pipeline;
use undersea_trace::{logging, server, traceroute};

/// Undersea: follow a traceroute across the ocean floor.
///
/// Geolocates each hop, pins it to the nearest peering facility, and
/// names the submarine cable that most plausibly carried it.
///
/// Examples:
///   undersea serve --port 8000
///   undersea locate 8.8.8.8 62.115.0.1
///   undersea trace example.com --hops 30
///   undersea cable 51.5 -0.12 40.71 -74.0 --tol 50
#[derive(Parser)]
#[command(name = "undersea", version, about, long_about = None)]
struct Cli {
    /// GeoJSON cable dataset.
    #[arg(long, global = true, env = "UNDERSEA_DATASET", default_value = DEFAULT_DATASET_PATH)]
    dataset: PathBuf,

    /// Maximum in-flight provider requests.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    concurrency: usize,

    /// Cable acceptance radius in km.
    #[arg(long, global = true, default_value_t = DEFAULT_TOLERANCE_KM)]
    tolerance: f64,

    /// PeeringDB API key. Read from the environment or a .env file.
    #[arg(long, global = true, env = "PEERING_DB_API_KEY", hide_env_values = true)]
    peeringdb_api_key: Option<String>,

    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, short = 'p', default_value_t = 8000)]
        port: u16,

        /// Run tcptraceroute without sudo.
        #[arg(long)]
        no_sudo: bool,
    },

    /// Enrich and merge a list of hop addresses.
    Locate {
        #[arg(required = true)]
        ips: Vec<String>,
    },

    /// Traceroute a host, then enrich the hops.
    Trace {
        host: String,

        #[arg(long, default_value_t = DEFAULT_HOPS)]
        hops: u32,

        #[arg(long)]
        no_sudo: bool,
    },

    /// Find the cable between two points.
    Cable {
        #[arg(allow_hyphen_values = true)]
        lat_a: f64,
        #[arg(allow_hyphen_values = true)]
        lon_a: f64,
        #[arg(allow_hyphen_values = true)]
        lat_b: f64,
        #[arg(allow_hyphen_values = true)]
        lon_b: f64,

        /// Override --tolerance for this query.
        #[arg(long)]
        tol: Option<f64>,
    },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config {
            dataset_path: self.dataset.clone(),
            peeringdb_api_key: self.peeringdb_api_key.clone().filter(|k| !k.is_empty()),
            max_concurrency: self.concurrency,
            cable_tolerance_km: self.tolerance,
            log_level: self.log_level,
            ..Config::default()
        };
        match &self.command {
            Command::Serve { host, port, no_sudo } => {
                config.host = host.clone();
                config.port = *port;
                config.trace_use_sudo &= !no_sudo;
            }
            Command::Trace { no_sudo, .. } => config.trace_use_sudo &= !no_sudo,
            Command::Locate { .. } | Command::Cable { .. } => {}
        }
        config
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = cli.config();
    config.validate()?;
    logging::init(config.log_level.into())?;

    let catalog = CableCatalog::load(&config.dataset_path)
        .with_context(|| format!("Cannot start without a cable dataset ({})", config.dataset_path.display()))?;
    let catalog = Arc::new(catalog);

    match cli.command {
        Command::Serve { .. } => {
            server::start(&config, catalog)
                .await
                .with_context(|| format!("Server error on {}", config.bind_addr()))?;
        }
        Command::Locate { ips } => {
            let merged = Pipeline::live(&config, catalog).run(&ips).await;
            print_json(&merged)?;
        }
        Command::Trace { host, hops, .. } => {
            let hops = validate_hops(hops)?;
            let trace = traceroute::run(&host, hops, config.trace_use_sudo).await?;
            if trace.ip_addresses.is_empty() {
                log::warn!("Traceroute to {} returned no addresses", host);
            }
            let locations = Pipeline::live(&config, catalog).run(&trace.ip_addresses).await;
            print_json(&serde_json::json!({ "trace": trace, "locations": locations }))?;
        }
        Command::Cable { lat_a, lon_a, lat_b, lon_b, tol } => {
            let tolerance = tol.unwrap_or(config.cable_tolerance_km);
            let found = CableMatcher::new(&catalog).find_nearest_cable(
                GeoPoint::new(lat_a, lon_a),
                GeoPoint::new(lat_b, lon_b),
                tolerance,
            );
            if found.is_none() {
                log::info!("No cable within {} km of both points", tolerance);
            }
            print_json(&found)?;
        }
    }

    Ok(())
}
