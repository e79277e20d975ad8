//! lb-ipset
//!
//! ipset-style packet classification sets for a user-space load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!   config file ──▶│  config (load, validate, watch)                      │
//!   SIGHUP ───────▶│        │                                             │
//!                  │        ▼                                             │
//!                  │  control (ControlPlane actor ──▶ SetManager)         │
//!                  │        │  add / del / test / list / flush            │
//!                  │        ▼                                             │
//!                  │  ipset::IpSet ──▶ TypeVariant ──▶ HashTable (ArcSwap) │
//!                  │        ▲                                             │
//!   packets ──────▶│  IpSet::test_packet (lock-free multi-length lookup)  │
//!                  │                                                      │
//!                  │  observability (tracing, metrics) · lifecycle        │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use lb_ipset::config::{load_config, EngineConfig};
use lb_ipset::control::SetManager;
use lb_ipset::ipset::{SetRequest, TypeRegistry};
use lb_ipset::lifecycle::startup;
use lb_ipset::observability::logging;

#[derive(Parser)]
#[command(name = "lb-ipset")]
#[command(about = "ipset-style classification sets for a load-balancer data plane", long_about = None)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, default_value = "lb-ipset.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the configured sets and serve them until SIGINT/SIGTERM; SIGHUP reloads
    Run,
    /// Validate the configuration and build every set
    Check,
    /// Print set members
    List {
        /// Only this set
        #[arg(short, long)]
        set: Option<String>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
    /// Classify an entry against a set
    Test {
        #[arg(short, long)]
        set: String,
        /// Entry in ipset syntax, e.g. 10.0.0.5,tcp:80,192.168.1.9
        entry: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let registry = Arc::new(TypeRegistry::builtin());
    let config = load_config(&cli.config, &registry)?;

    match cli.command {
        Commands::Run => {
            logging::init(&config.observability)?;
            tracing::info!(
                config = %cli.config.display(),
                sets = config.sets.len(),
                "lb-ipset v{} starting",
                env!("CARGO_PKG_VERSION")
            );
            startup::run(&cli.config, config, registry).await?;
        }
        Commands::Check => {
            let manager = build(&config, registry)?;
            for summary in manager.summaries() {
                println!(
                    "{}\t{}\t{}\t{} elements",
                    summary.name, summary.type_name, summary.family, summary.elements
                );
            }
            println!("configuration OK");
        }
        Commands::List { set, json } => {
            let manager = build(&config, registry)?;
            let names = match set {
                Some(name) => vec![name],
                None => manager.names(),
            };
            for name in names {
                let members = manager.list(&name)?;
                if json {
                    let out = serde_json::json!({ "name": name, "members": members });
                    println!("{}", serde_json::to_string(&out)?);
                } else {
                    println!("Name: {name}");
                    println!("Members:");
                    for member in members {
                        println!("{member}");
                    }
                }
            }
        }
        Commands::Test { set, entry } => {
            let manager = build(&config, registry)?;
            let request: SetRequest = entry.parse()?;
            let result = manager.test(&set, &request)?;
            println!("{entry}: {result}");
        }
    }

    Ok(())
}

/// Build the configured sets with warnings-only logging.
fn build(
    config: &EngineConfig,
    registry: Arc<TypeRegistry>,
) -> Result<SetManager, Box<dyn std::error::Error>> {
    let mut observability = config.observability.clone();
    observability.log_level = "warn".to_string();
    logging::init(&observability)?;
    Ok(SetManager::from_config(registry, config)?)
}
