#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use spindle_core::{close_monitoring, initialize_monitoring, Config};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(author, version, about = "Module resolution and parallel asset graph builds", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve one specifier as if imported from a file
    Resolve {
        /// The specifier, e.g. "./util", "react" or "#internal"
        specifier: String,

        /// The importing file
        #[arg(long, value_name = "FILE")]
        from: PathBuf,

        /// Export conditions to match (e.g. --condition browser,production)
        #[arg(long = "condition", value_delimiter = ',')]
        conditions: Vec<String>,

        /// How the specifier was written: esm, commonjs, url or custom
        #[arg(long, default_value = "esm")]
        kind: String,
    },

    /// Print the asset graph reachable from the entries
    Graph {
        /// Entry files
        #[arg(required = true)]
        entries: Vec<String>,

        /// Number of build workers
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Build the entries: asset graph, fingerprints and output names
    Build {
        /// Entry files
        #[arg(required = true)]
        entries: Vec<String>,

        /// Number of build workers
        #[arg(long)]
        threads: Option<usize>,

        /// Write a JSON manifest of the outputs
        #[arg(long, value_name = "PATH")]
        manifest: Option<PathBuf>,
    },

    /// Print the content hash of a string or file
    Hash {
        /// String to hash
        #[arg(conflicts_with = "file")]
        input: Option<String>,

        /// File to hash
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Show the worker count policy
    Threads,

    /// Show which resolutions a file change would invalidate
    Invalidations {
        /// The changed (or created) file
        path: PathBuf,

        /// Entry files whose graph fills the ledger
        #[arg(long, required = true, num_args = 1..)]
        from: Vec<String>,

        /// Treat the file as newly created
        #[arg(long)]
        created: bool,

        /// Number of build workers
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);
    initialize_monitoring();

    let json = cli.json;
    let result = match cli.command {
        Some(Commands::Version) | None => commands::version::run(json),
        Some(Commands::Resolve {
            specifier,
            from,
            conditions,
            kind,
        }) => {
            let span = tracing::info_span!("resolve", cmd = "resolve", cwd = %cwd.display());
            let _guard = span.enter();
            commands::resolve::run(
                &config,
                commands::resolve::ResolveAction {
                    specifier,
                    from,
                    conditions,
                    kind,
                },
                json,
            )
        }
        Some(Commands::Graph { entries, threads }) => {
            let span = tracing::info_span!("graph", cmd = "graph", cwd = %cwd.display());
            let _guard = span.enter();
            commands::graph::run(&config, &entries, threads, json)
        }
        Some(Commands::Build {
            entries,
            threads,
            manifest,
        }) => {
            let span = tracing::info_span!("build", cmd = "build", cwd = %cwd.display());
            let _guard = span.enter();
            commands::build::run(
                &config,
                commands::build::BuildAction {
                    entries,
                    threads,
                    manifest,
                },
                json,
            )
        }
        Some(Commands::Hash { input, file }) => commands::hash::run(&cwd, file, input, json),
        Some(Commands::Threads) => commands::threads::run(json),
        Some(Commands::Invalidations {
            path,
            from,
            created,
            threads,
        }) => {
            let span = tracing::info_span!("invalidations", cmd = "invalidations", cwd = %cwd.display());
            let _guard = span.enter();
            commands::invalidations::run(
                &config,
                commands::invalidations::InvalidationsAction {
                    path,
                    from,
                    threads,
                    created,
                },
                json,
            )
        }
    };

    if let Some(report) = close_monitoring() {
        debug!(
            duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            events = ?report.events,
            "session closed"
        );
    }
    result
}
