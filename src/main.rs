use clap::Parser;
use ohmlink::config::SearchPaths;
use ohmlink::output;
use ohmlink::stats::Stats;
use ohmlink::{Engine, EngineOptions, Netlist};
use std::io;
use std::path::PathBuf;
use std::time::Instant;

/// Run a SPICE netlist through the ngspice shared library and print the results as CSV
#[derive(Parser)]
#[command(name = "ohmlink", version)]
struct Cli {
    /// SPICE netlist file to simulate
    netlist: PathBuf,

    /// ngspice shared library to load instead of searching for one
    #[arg(long)]
    lib: Option<PathBuf>,

    /// TOML file with per-platform library search paths
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run on the engine's background thread and wait for it
    #[arg(long)]
    background: bool,

    /// Copy engine output to stderr
    #[arg(long)]
    echo: bool,

    /// Print the engine version banner summary to stderr
    #[arg(long)]
    engine_version: bool,

    /// Also write each plot's vector/unit table
    #[arg(long)]
    units: bool,

    /// Print run statistics to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(Stats::new()) } else { None };

    let mut options = EngineOptions::default();
    if let Some(lib) = cli.lib {
        options = options.with_library(lib);
    }
    if let Some(config) = &cli.config {
        let paths = SearchPaths::load(config).unwrap_or_else(|e| {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        });
        options = options.with_search_paths(paths);
    }
    if cli.echo {
        options = options.with_sink(io::stderr());
    }

    let start = Instant::now();
    let engine = Engine::with_options(options).unwrap_or_else(|e| {
        eprintln!("Engine error: {}", e);
        std::process::exit(1);
    });
    if let Some(ref mut s) = stats {
        s.add_phase("attach", start.elapsed());
    }

    if cli.engine_version {
        match engine.version() {
            Ok(v) => eprintln!(
                "ngspice {} (cider: {}, xspice: {}, openmp: {})",
                v.engine,
                v.cider.as_deref().unwrap_or("no"),
                v.xspice,
                v.openmp
            ),
            Err(e) => eprintln!("Version query failed: {}", e),
        }
    }

    let start = Instant::now();
    let netlist = Netlist::Path(cli.netlist.clone());
    let results = if cli.background {
        engine
            .bg_run(Some(netlist))
            .and_then(|_| {
                engine.wait_background();
                engine.results()
            })
    } else {
        engine.run(Some(netlist))
    }
    .unwrap_or_else(|e| {
        eprintln!("Simulation error: {}", e);
        std::process::exit(1);
    });
    if let Some(ref mut s) = stats {
        s.add_phase("simulate", start.elapsed());
    }

    let mut stdout = io::stdout();
    output::write_results_csv(&results, &mut stdout)
        .and_then(|_| {
            if cli.units {
                output::write_results_units_csv(&results, &mut stdout)?;
            }
            Ok(())
        })
        .unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });

    if let Some(ref mut s) = stats {
        s.record_results(&results);
        s.counts = engine.counts();
        s.display();
    }
}
